//! Metadata probe: one info-mode run of the tool before the real fetch.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::tool::FetchTool;
use super::types::VideoMetadata;

/// Runs the tool in info mode and parses what it reports.
///
/// Every failure (spawn error, non-zero exit, unparseable output, timeout)
/// is logged and yields `None`; a missing probe never blocks a fetch.
pub async fn probe_metadata(
    tool: &dyn FetchTool,
    url: &str,
    timeout: Duration,
) -> Option<VideoMetadata> {
    let output = match tokio::time::timeout(timeout, tool.run_probe(url)).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(tool = tool.name(), error = %e, "Metadata probe could not run");
            return None;
        }
        Err(_) => {
            warn!(
                tool = tool.name(),
                timeout_secs = timeout.as_secs(),
                "Metadata probe timed out"
            );
            return None;
        }
    };

    if !output.status.success() {
        warn!(
            tool = tool.name(),
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Metadata probe failed"
        );
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_metadata(&stdout) {
        Some(metadata) => {
            debug!(title = ?metadata.title, bytes = ?metadata.estimated_bytes, "Metadata probed");
            Some(metadata)
        }
        None => {
            warn!(tool = tool.name(), "Metadata probe output was not valid JSON");
            None
        }
    }
}

/// Parses the JSON document printed by `-j`.
///
/// Only the first line that looks like a JSON object is considered, so
/// stray warnings ahead of it are tolerated.
pub fn parse_metadata(stdout: &str) -> Option<VideoMetadata> {
    #[derive(Deserialize)]
    struct InfoJson {
        title: Option<String>,
        duration: Option<f64>,
        ext: Option<String>,
        format: Option<String>,
        resolution: Option<String>,
        format_note: Option<String>,
        filesize: Option<f64>,
        filesize_approx: Option<f64>,
    }

    let line = stdout.lines().map(str::trim).find(|l| l.starts_with('{'))?;
    let info: InfoJson = serde_json::from_str(line).ok()?;

    let estimated_bytes = info
        .filesize
        .or(info.filesize_approx)
        .filter(|b| b.is_finite() && *b > 0.0)
        .map(|b| b as u64);

    let title = info.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    Some(VideoMetadata {
        title,
        duration_secs: info.duration.filter(|d| d.is_finite() && *d >= 0.0),
        format: info.ext.or(info.format),
        resolution: info.resolution.or(info.format_note),
        estimated_bytes,
    })
}
