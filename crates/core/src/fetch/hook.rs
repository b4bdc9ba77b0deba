//! Notifying the player that the media library changed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::PlaylistHookConfig;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to run playlist hook: {0}")]
    Io(#[from] std::io::Error),

    #[error("playlist hook exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("playlist hook timed out after {secs} seconds")]
    Timeout { secs: u64 },
}

/// Called after every successful fetch.
#[async_trait]
pub trait PlaylistHook: Send + Sync {
    fn name(&self) -> &str;

    async fn playlist_changed(&self, artifact: &Path) -> Result<(), HookError>;
}

/// Does nothing; used when no hook is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopHook;

#[async_trait]
impl PlaylistHook for NoopHook {
    fn name(&self) -> &str {
        "noop"
    }

    async fn playlist_changed(&self, _artifact: &Path) -> Result<(), HookError> {
        Ok(())
    }
}

/// Runs an external program, e.g. a playlist refresh script.
///
/// The artifact path is exposed as `MARQUEE_ARTIFACT` in the environment
/// rather than appended to the argv.
#[derive(Debug, Clone)]
pub struct CommandHook {
    command: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandHook {
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &PlaylistHookConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl PlaylistHook for CommandHook {
    fn name(&self) -> &str {
        "command"
    }

    async fn playlist_changed(&self, artifact: &Path) -> Result<(), HookError> {
        debug!(command = %self.command.display(), "Running playlist hook");

        let output = Command::new(&self.command)
            .args(&self.args)
            .env("MARQUEE_ARTIFACT", artifact)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| HookError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            return Err(HookError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(command = %self.command.display(), "Playlist refreshed");
        Ok(())
    }
}

/// Picks the hook implementation for an optional config section.
pub fn create_hook(config: Option<&PlaylistHookConfig>) -> Box<dyn PlaylistHook> {
    match config {
        Some(c) => Box::new(CommandHook::from_config(c)),
        None => Box::new(NoopHook),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_command_hook_sees_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let hook = CommandHook::new(
            "sh",
            vec![
                "-c".to_string(),
                format!("printf '%s' \"$MARQUEE_ARTIFACT\" > {}", marker.display()),
            ],
            Duration::from_secs(5),
        );

        hook.playlist_changed(Path::new("/media/clip.mp4"))
            .await
            .unwrap();
        let written = tokio::fs::read_to_string(&marker).await.unwrap();
        assert_eq!(written, "/media/clip.mp4");
    }

    #[tokio::test]
    async fn test_command_hook_failure() {
        let hook = CommandHook::new(
            "sh",
            vec!["-c".to_string(), "echo nope >&2; exit 3".to_string()],
            Duration::from_secs(5),
        );
        let err = hook.playlist_changed(Path::new("/x")).await.unwrap_err();
        match err {
            HookError::Failed { stderr, .. } => assert_eq!(stderr, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_command_hook_timeout() {
        let hook = CommandHook::new(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(100),
        );
        let err = hook.playlist_changed(Path::new("/x")).await.unwrap_err();
        assert!(matches!(err, HookError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_create_hook() {
        assert_eq!(create_hook(None).name(), "noop");
        let config = PlaylistHookConfig {
            command: PathBuf::from("/opt/scripts/update-playlist.sh"),
            args: Vec::new(),
            timeout_secs: 30,
        };
        assert_eq!(create_hook(Some(&config)).name(), "command");
    }
}
