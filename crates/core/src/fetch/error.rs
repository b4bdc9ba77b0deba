//! Error types for the fetch pipeline.

use thiserror::Error;

/// Every way a fetch can end without a usable artifact.
///
/// Each variant surfaces to the client exactly once, as the terminal
/// `error` event carrying [`FetchError::user_message`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL did not parse or its host is not on the allow-list.
    #[error("invalid or disallowed URL: {url}")]
    InvalidUrl { url: String },

    /// Destination lacks room for the estimated download.
    #[error("insufficient disk space: {free_bytes} bytes free, {required_bytes} required")]
    InsufficientSpace { free_bytes: u64, required_bytes: u64 },

    /// The tool binary could not be executed.
    #[error("failed to start downloader: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The tool printed an `ERROR:` line and then exited non-zero.
    #[error("{0}")]
    ToolReported(String),

    /// The tool exited non-zero without an error line.
    #[error("download failed (exit code {0})")]
    ExitCode(i32),

    /// The tool was terminated by a signal.
    #[error("download failed (terminated by signal)")]
    Killed,

    #[error("download timed out after {secs} seconds")]
    Timeout { secs: u64 },

    /// The HTTP client went away and the tool was stopped.
    #[error("client disconnected")]
    Disconnected,

    /// The tool exited zero but no artifact was found.
    #[error("downloaded file missing")]
    ArtifactMissing,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Message carried by the terminal `error` event.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl { .. } => "invalid or disallowed URL".to_string(),
            Self::InsufficientSpace { .. } => "insufficient disk space".to_string(),
            Self::SpawnFailed(_) => "failed to start downloader".to_string(),
            Self::Io(e) => format!("download failed: {}", e),
            other => other.to_string(),
        }
    }

    /// Short label for the fetch result metric.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "invalid_url",
            Self::InsufficientSpace { .. } => "insufficient_space",
            Self::SpawnFailed(_) => "spawn_failed",
            Self::ToolReported(_) | Self::ExitCode(_) | Self::Killed => "tool_failed",
            Self::Timeout { .. } => "timeout",
            Self::Disconnected => "disconnected",
            Self::ArtifactMissing => "artifact_missing",
            Self::Io(_) => "io_error",
        }
    }

    /// Whether the failure happened before any fetch process was spawned.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. } | Self::InsufficientSpace { .. }
        )
    }
}
