//! Turns raw tool output lines into progress events.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::Path;

use super::types::ProgressEvent;

/// `[download]  42.0% of ~10.00MiB at 1.20MiB/s ETA 00:08`
static FULL_PROGRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[download\]\s+(\d+(?:\.\d+)?)%\s+of\s+~?\s*(\d+(?:\.\d+)?\s?[KMGTP]?i?B)\s+at\s+(\d+(?:\.\d+)?\s?[KMGTP]?i?B/s)\s+ETA\s+(\d+(?::\d+)+)",
    )
    .unwrap()
});

static BARE_PROGRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").unwrap());

static INFO_FETCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[[^\]]+\][^:]*:\s+Downloading\s+(?:webpage|.*(?:info|JSON))").unwrap()
});

static DESTINATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[download\]\s+Destination:\s+(.+)$").unwrap());

const ALREADY_DOWNLOADED: &str = "has already been downloaded";
const ERROR_MARKER: &str = "ERROR:";

/// Per-request classifier.
///
/// Owns the dedup state for progress events, so each fetch gets its own.
#[derive(Debug, Clone)]
pub struct OutputClassifier {
    verbose: bool,
    last_emitted_percent: i64,
}

impl OutputClassifier {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            last_emitted_percent: -1,
        }
    }

    pub fn last_emitted_percent(&self) -> i64 {
        self.last_emitted_percent
    }

    /// Maps one line to an event, ignoring dedup and verbosity.
    pub fn classify(line: &str) -> Option<ProgressEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(caps) = FULL_PROGRESS.captures(line) {
            if let Ok(percent) = caps[1].parse::<f64>() {
                return Some(ProgressEvent::Progress {
                    percent,
                    size: Some(caps[2].to_string()),
                    speed: Some(caps[3].to_string()),
                    eta: Some(caps[4].to_string()),
                });
            }
        }

        if let Some(caps) = BARE_PROGRESS.captures(line) {
            if let Ok(percent) = caps[1].parse::<f64>() {
                return Some(ProgressEvent::percent(percent));
            }
        }

        if INFO_FETCH.is_match(line) {
            return Some(ProgressEvent::info("Fetching video information..."));
        }

        if let Some(caps) = DESTINATION.captures(line) {
            let target = caps[1].trim();
            let name = Path::new(target)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| target.to_string());
            return Some(ProgressEvent::info(format!("Downloading to: {}", name)));
        }

        if line.contains(ALREADY_DOWNLOADED) {
            return Some(ProgressEvent::percent(100.0));
        }

        if let Some(idx) = line.find(ERROR_MARKER) {
            let reason = line[idx + ERROR_MARKER.len()..].trim();
            let reason = if reason.is_empty() {
                "download failed"
            } else {
                reason
            };
            return Some(ProgressEvent::error(reason));
        }

        Some(ProgressEvent::console(line))
    }

    /// Classifies a line and applies the forwarding rules.
    ///
    /// Progress is forwarded only when its integer part advances; console
    /// output only in verbose mode. `Error` results are returned as-is and
    /// it is up to the caller to hold them back.
    pub fn accept(&mut self, line: &str) -> Option<ProgressEvent> {
        let event = Self::classify(line)?;
        match &event {
            ProgressEvent::Progress { percent, .. } => {
                let whole = percent.floor() as i64;
                if whole <= self.last_emitted_percent {
                    return None;
                }
                self.last_emitted_percent = whole;
                Some(event)
            }
            ProgressEvent::Console { .. } if !self.verbose => None,
            _ => Some(event),
        }
    }
}
