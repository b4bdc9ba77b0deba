//! Space probe and playlist hook doubles.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::fetch::{HookError, PlaylistHook, SpaceProbe};

/// Reports a fixed amount of free space.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpace(pub u64);

#[async_trait]
impl SpaceProbe for FixedSpace {
    async fn free_bytes(&self, _dir: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}

/// Always fails, as if `df` were unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSpace;

#[async_trait]
impl SpaceProbe for FailingSpace {
    async fn free_bytes(&self, _dir: &Path) -> std::io::Result<u64> {
        Err(std::io::Error::other("free space unavailable"))
    }
}

/// Records every artifact it is notified about.
#[derive(Debug, Default)]
pub struct RecordingHook {
    calls: Mutex<Vec<PathBuf>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook that records the call and then reports failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A hook that sleeps for `delay` before recording the call.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaylistHook for RecordingHook {
    fn name(&self) -> &str {
        "recording"
    }

    async fn playlist_changed(&self, artifact: &Path) -> Result<(), HookError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(artifact.to_path_buf());
        if self.fail {
            return Err(HookError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "refresh failed".to_string(),
            });
        }
        Ok(())
    }
}
