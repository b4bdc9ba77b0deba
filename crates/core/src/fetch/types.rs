//! Data types shared across the fetch pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::verifier::format_file_size;

/// Inbound fetch request as submitted by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Preferred file name; the remote title is used when absent.
    #[serde(default)]
    pub title: Option<String>,
    /// Forward unrecognized tool output as `console` events.
    #[serde(default)]
    pub verbose: bool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            verbose: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// One record of the streamed progress protocol.
///
/// Exactly one terminal event (`Success` or `Error`) ends every exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Info {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video_info: Option<VideoInfo>,
    },
    Progress {
        percent: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eta: Option<String>,
    },
    Console {
        message: String,
    },
    Error {
        message: String,
    },
    Success {
        message: String,
        final_path: String,
        size_bytes: u64,
    },
}

impl ProgressEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
            video_info: None,
        }
    }

    /// `Video found: <title>` carrying the probed details, if a title is known.
    pub fn video_found(metadata: &VideoMetadata) -> Option<Self> {
        let info = metadata.summary()?;
        Some(Self::Info {
            message: format!("Video found: {}", info.title),
            video_info: Some(info),
        })
    }

    pub fn console(message: impl Into<String>) -> Self {
        Self::Console {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Progress with only a percentage.
    pub fn percent(percent: f64) -> Self {
        Self::Progress {
            percent,
            size: None,
            speed: None,
            eta: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }

    /// Wire name of the variant (`"info"`, `"progress"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Info { .. } => "info",
            Self::Progress { .. } => "progress",
            Self::Console { .. } => "console",
            Self::Error { .. } => "error",
            Self::Success { .. } => "success",
        }
    }

    /// Serializes the event as a single newline-terminated JSON record.
    pub fn to_ndjson(&self) -> String {
        match serde_json::to_string(self) {
            Ok(mut line) => {
                line.push('\n');
                line
            }
            Err(_) => "{\"type\":\"error\",\"message\":\"unserializable event\"}\n".to_string(),
        }
    }
}

/// Metadata reported by the tool's info mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_bytes: Option<u64>,
}

/// Display-ready summary sent alongside the `Video found` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<String>,
}

impl VideoMetadata {
    /// `None` when the tool reported no title.
    pub fn summary(&self) -> Option<VideoInfo> {
        let title = self.title.clone()?;
        Some(VideoInfo {
            title,
            duration: self.duration_display(),
            resolution: self.resolution.clone(),
            filesize: self.estimated_bytes.map(format_file_size),
        })
    }

    /// Duration as `HH:MM:SS`.
    pub fn duration_display(&self) -> Option<String> {
        self.duration_secs.filter(|d| *d >= 0.0).map(|d| {
            let total = d.round() as u64;
            format!(
                "{:02}:{:02}:{:02}",
                total / 3600,
                (total % 3600) / 60,
                total % 60
            )
        })
    }
}

/// Free space versus what the download is expected to need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceCheck {
    pub free_bytes: u64,
    /// `None` (or zero) means the size is unknown and the check is skipped.
    pub estimated_bytes: Option<u64>,
}

impl ResourceCheck {
    /// Required free space is `estimated * HEADROOM_NUM / HEADROOM_DEN`.
    const HEADROOM_NUM: u128 = 11;
    const HEADROOM_DEN: u128 = 10;

    pub fn new(free_bytes: u64, estimated_bytes: Option<u64>) -> Self {
        Self {
            free_bytes,
            estimated_bytes,
        }
    }

    /// Bytes that must be free for the download to start.
    pub fn required_bytes(&self) -> Option<u64> {
        self.estimated_bytes.filter(|b| *b > 0).map(|b| {
            let required = (u128::from(b) * Self::HEADROOM_NUM).div_ceil(Self::HEADROOM_DEN);
            u64::try_from(required).unwrap_or(u64::MAX)
        })
    }

    /// `free >= estimated * 1.1`, computed without floating point.
    pub fn passes(&self) -> bool {
        match self.estimated_bytes.filter(|b| *b > 0) {
            Some(estimated) => {
                u128::from(self.free_bytes) * Self::HEADROOM_DEN
                    >= u128::from(estimated) * Self::HEADROOM_NUM
            }
            None => true,
        }
    }
}

/// A validated request, ready to hand to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub url: String,
    /// Sanitized file stem; the tool picks the extension.
    pub basename: String,
    pub directory: PathBuf,
    pub verbose: bool,
    pub metadata: Option<VideoMetadata>,
}

impl FetchPlan {
    /// Output template handed to the tool (`<dir>/<basename>.%(ext)s`).
    pub fn output_template(&self) -> PathBuf {
        self.directory.join(format!("{}.%(ext)s", self.basename))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}
