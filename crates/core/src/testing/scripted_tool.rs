//! Scripted stand-in for the fetch tool.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Output;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Child;

use crate::fetch::tool::{piped_command, FetchTool};
use crate::fetch::FetchPlan;

/// A [`FetchTool`] that replays shell scripts instead of running yt-dlp.
///
/// The fetch script runs under `sh -c` with `FETCH_DIR`, `FETCH_BASENAME`
/// and `FETCH_URL` in its environment, so it can create the artifact the
/// real tool would have written. Every spawn attempt is counted.
///
/// # Example
///
/// ```rust,ignore
/// use marquee_core::testing::ScriptedTool;
///
/// let tool = ScriptedTool::new(
///     r#"echo '[download]  50.0%'; printf data > "$FETCH_DIR/$FETCH_BASENAME.mp4""#,
/// )
/// .with_metadata(r#"{"title":"Lobby Loop","filesize":4}"#);
///
/// // ... run a fetch ...
/// assert_eq!(tool.fetch_count(), 1);
/// ```
#[derive(Debug)]
pub struct ScriptedTool {
    program: PathBuf,
    fetch_script: String,
    probe_json: Option<String>,
    probe_delay: Duration,
    fetch_count: AtomicUsize,
    probe_count: AtomicUsize,
    plans: Mutex<Vec<FetchPlan>>,
}

impl ScriptedTool {
    /// Create a tool whose download runs `fetch_script`. The probe fails
    /// until [`ScriptedTool::with_metadata`] is used.
    pub fn new(fetch_script: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from("sh"),
            fetch_script: fetch_script.into(),
            probe_json: None,
            probe_delay: Duration::ZERO,
            fetch_count: AtomicUsize::new(0),
            probe_count: AtomicUsize::new(0),
            plans: Mutex::new(Vec::new()),
        }
    }

    /// A tool whose binary does not exist; every spawn fails.
    pub fn unspawnable() -> Self {
        Self {
            program: PathBuf::from("/nonexistent/marquee-test-tool"),
            ..Self::new("")
        }
    }

    /// Script that writes `bytes` bytes to the expected artifact and exits 0.
    pub fn writing_artifact(ext: &str, bytes: usize) -> Self {
        Self::new(format!(
            "echo '[download] Destination: '\"$FETCH_DIR/$FETCH_BASENAME.{ext}\"; \
             echo '[download]  50.0% of ~1.00KiB at 1.00KiB/s ETA 00:01'; \
             head -c {bytes} /dev/zero > \"$FETCH_DIR/$FETCH_BASENAME.{ext}\"; \
             echo '[download] 100% of 1.00KiB in 00:00:01'"
        ))
    }

    /// Make the probe print `json` and exit 0.
    pub fn with_metadata(mut self, json: impl Into<String>) -> Self {
        self.probe_json = Some(json.into());
        self
    }

    /// Delay the probe before it starts its process.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Download spawn attempts, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    /// Probe and download spawn attempts combined.
    pub fn spawn_count(&self) -> usize {
        self.fetch_count() + self.probe_count()
    }

    /// Plans handed to the download, in order.
    pub fn plans(&self) -> Vec<FetchPlan> {
        self.plans.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchTool for ScriptedTool {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run_probe(&self, _url: &str) -> std::io::Result<Output> {
        self.probe_count.fetch_add(1, Ordering::SeqCst);
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }

        let mut command = piped_command(&self.program);
        match &self.probe_json {
            Some(json) => command
                .arg("-c")
                .arg("printf '%s\\n' \"$PROBE_JSON\"")
                .env("PROBE_JSON", json),
            None => command
                .arg("-c")
                .arg("echo 'ERROR: no metadata' >&2; exit 1"),
        };
        command.output().await
    }

    fn spawn_fetch(&self, plan: &FetchPlan) -> std::io::Result<Child> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.plans.lock().unwrap().push(plan.clone());

        piped_command(&self.program)
            .arg("-c")
            .arg(&self.fetch_script)
            .env("FETCH_DIR", &plan.directory)
            .env("FETCH_BASENAME", &plan.basename)
            .env("FETCH_URL", &plan.url)
            .spawn()
    }
}
