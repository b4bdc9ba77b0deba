//! The external fetch tool as seen by the pipeline.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::{Child, Command};

use super::types::FetchPlan;
use crate::config::FetcherConfig;
use crate::metrics::TOOL_SPAWNS;

/// A yt-dlp compatible command-line downloader.
///
/// Implementations must never go through a shell for the real tool: every
/// argument is passed as its own argv element.
#[async_trait]
pub trait FetchTool: Send + Sync {
    /// Returns the name of this tool implementation.
    fn name(&self) -> &str;

    /// Runs the tool once in metadata mode and captures its output.
    ///
    /// The returned future owns the child; dropping it kills the process.
    async fn run_probe(&self, url: &str) -> std::io::Result<Output>;

    /// Spawns the real download with stdout and stderr piped and stdin closed.
    fn spawn_fetch(&self, plan: &FetchPlan) -> std::io::Result<Child>;
}

/// Builds a command with the stdio layout the supervisor expects.
pub(crate) fn piped_command(program: impl AsRef<OsStr>) -> Command {
    let mut command = Command::new(program);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// yt-dlp invoked directly from `fetcher.tool_path`.
#[derive(Debug, Clone)]
pub struct YtDlpTool {
    path: PathBuf,
    format: String,
    extra_args: Vec<String>,
}

impl YtDlpTool {
    pub fn new(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            path: config.tool_path.clone(),
            format: config.format.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    /// Arguments for the metadata probe.
    pub fn probe_args(url: &str) -> Vec<String> {
        vec![
            "-j".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ]
    }

    /// Arguments for the download itself.
    pub fn fetch_args(&self, plan: &FetchPlan) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.format.clone(),
            "-o".to_string(),
            plan.output_template().to_string_lossy().to_string(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--restrict-filenames".to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        // Ends option parsing so the URL can never be read as a flag
        args.push("--".to_string());
        args.push(plan.url.clone());
        args
    }

    /// Returns the tool's version string, confirming the binary runs.
    pub async fn version(&self) -> std::io::Result<String> {
        let output = Command::new(&self.path)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "{} --version exited with {}",
                self.path.display(),
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl FetchTool for YtDlpTool {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn run_probe(&self, url: &str) -> std::io::Result<Output> {
        TOOL_SPAWNS.with_label_values(&["probe"]).inc();
        piped_command(&self.path)
            .args(Self::probe_args(url))
            .output()
            .await
    }

    fn spawn_fetch(&self, plan: &FetchPlan) -> std::io::Result<Child> {
        TOOL_SPAWNS.with_label_values(&["fetch"]).inc();
        piped_command(&self.path).args(self.fetch_args(plan)).spawn()
    }
}
