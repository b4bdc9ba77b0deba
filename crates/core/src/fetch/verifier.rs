//! Confirms that a finished fetch left a usable file behind.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::types::ProgressEvent;

/// Extensions the tool uses for in-flight or sidecar files.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// A completed download on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn is_partial(name: &str) -> bool {
    PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) || name.contains(".part-Frag")
}

/// Finds `<basename>.<ext>` in `dir`, ignoring partials and empty files.
///
/// When several candidates exist (e.g. separate audio and video streams
/// left behind), the largest wins.
pub async fn locate_artifact(dir: &Path, basename: &str) -> std::io::Result<Option<Artifact>> {
    let prefix = format!("{}.", basename);
    let mut best: Option<Artifact> = None;

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(ext) = name.strip_prefix(&prefix) else {
            continue;
        };
        if ext.is_empty() || is_partial(&name) {
            debug!(file = %name, "Skipping partial file");
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() || metadata.len() == 0 {
            continue;
        }

        if best.as_ref().is_none_or(|b| metadata.len() > b.size_bytes) {
            best = Some(Artifact {
                path: entry.path(),
                size_bytes: metadata.len(),
            });
        }
    }

    Ok(best)
}

/// Human-readable size with 1024-based units, e.g. `12.3MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

/// Terminal success event for a located artifact.
pub fn success_event(artifact: &Artifact) -> ProgressEvent {
    ProgressEvent::Success {
        message: format!(
            "Downloaded: {} ({})",
            artifact.file_name(),
            format_file_size(artifact.size_bytes)
        ),
        final_path: artifact.path.to_string_lossy().to_string(),
        size_bytes: artifact.size_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(dir: &TempDir, name: &str, len: usize) {
        tokio::fs::write(dir.path().join(name), vec![0u8; len])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        write(&dir, "other.mp4", 10).await;
        assert_eq!(locate_artifact(dir.path(), "clip").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("nope");
        assert_eq!(locate_artifact(&gone, "clip").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partials_and_empty_files_ignored() {
        let dir = TempDir::new().unwrap();
        write(&dir, "clip.mp4.part", 500).await;
        write(&dir, "clip.mp4.ytdl", 50).await;
        write(&dir, "clip.f137.mp4.part-Frag3", 50).await;
        write(&dir, "clip.webm", 0).await;
        assert_eq!(locate_artifact(dir.path(), "clip").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefers_largest_match() {
        let dir = TempDir::new().unwrap();
        write(&dir, "clip.m4a", 100).await;
        write(&dir, "clip.mp4", 300).await;
        write(&dir, "clip_1.mp4", 900).await;

        let artifact = locate_artifact(dir.path(), "clip").await.unwrap().unwrap();
        assert_eq!(artifact.file_name(), "clip.mp4");
        assert_eq!(artifact.size_bytes, 300);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0B");
        assert_eq!(format_file_size(512), "512B");
        assert_eq!(format_file_size(1536), "1.5KB");
        assert_eq!(format_file_size(12_897_485), "12.3MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.0GB");
    }

    #[test]
    fn test_success_event() {
        let artifact = Artifact {
            path: PathBuf::from("/media/clip.mp4"),
            size_bytes: 12_897_485,
        };
        assert_eq!(
            success_event(&artifact),
            ProgressEvent::Success {
                message: "Downloaded: clip.mp4 (12.3MB)".to_string(),
                final_path: "/media/clip.mp4".to_string(),
                size_bytes: 12_897_485,
            }
        );
    }
}
