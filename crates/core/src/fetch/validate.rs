//! Request validation and the pre-spawn resource guard.
//!
//! Nothing in here starts a process: a request that fails any of these
//! checks never reaches the tool.

use chrono::{DateTime, Utc};
use std::path::Path;
use url::Url;

use super::error::FetchError;
use super::types::ResourceCheck;
use crate::config::FetcherConfig;

/// Longest stem we hand to the tool.
const MAX_BASENAME_LEN: usize = 120;

/// Punctuation dropped outright instead of being replaced by `_`.
const DROPPED_CHARS: &[char] = &['!', '?', '\'', '"', ',', ';', ':', '`'];

/// Highest numeric suffix tried before falling back to a timestamp.
const MAX_COLLISION_SUFFIX: u32 = 999;

/// Checks inbound URLs against the configured host allow-list.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    allowed_hosts: Vec<String>,
}

impl RequestValidator {
    pub fn new<I, S>(allowed_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(&config.allowed_hosts)
    }

    /// Parses `raw` and accepts it only for http(s) URLs on an allowed host.
    pub fn validate_url(&self, raw: &str) -> Result<Url, FetchError> {
        let invalid = || FetchError::InvalidUrl {
            url: raw.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }
        let host = url.host_str().ok_or_else(invalid)?;
        if !self.host_allowed(host) {
            return Err(invalid());
        }
        Ok(url)
    }

    /// Exact match or subdomain of an allowed host.
    pub fn host_allowed(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.allowed_hosts.iter().any(|allowed| {
            host == *allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Maps a free-form title onto `[A-Za-z0-9._-]`.
///
/// Quote-like and sentence punctuation is dropped, every other disallowed
/// character becomes `_`, and a leading `.` becomes `_` so the result is
/// never a hidden file. May return an empty string.
pub fn sanitize_filename(title: &str) -> String {
    let mut out: String = title
        .trim()
        .chars()
        .filter(|c| !DROPPED_CHARS.contains(c))
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BASENAME_LEN)
        .collect();

    if out.starts_with('.') {
        out.replace_range(..1, "_");
    }
    out
}

/// Picks the file stem: the requested title, else the remote title, else
/// `video_<unix timestamp>`.
pub fn derive_basename(
    requested: Option<&str>,
    remote: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    [requested, remote]
        .into_iter()
        .flatten()
        .map(sanitize_filename)
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| format!("video_{}", now.timestamp()))
}

/// Whether `dir` holds any `<basename>.<ext>` file.
pub async fn basename_taken(dir: &Path, basename: &str) -> std::io::Result<bool> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name
            .strip_prefix(basename)
            .is_some_and(|rest| rest.starts_with('.'))
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Appends `_1`, `_2`, ... until no existing artifact shares the stem.
pub async fn unique_basename(
    dir: &Path,
    basename: &str,
    now: DateTime<Utc>,
) -> std::io::Result<String> {
    if !basename_taken(dir, basename).await? {
        return Ok(basename.to_string());
    }
    for n in 1..=MAX_COLLISION_SUFFIX {
        let candidate = format!("{}_{}", basename, n);
        if !basename_taken(dir, &candidate).await? {
            return Ok(candidate);
        }
    }
    Ok(format!("{}_{}", basename, now.timestamp_millis()))
}

/// Rejects the request when the estimate plus headroom does not fit.
pub fn guard_resources(check: ResourceCheck) -> Result<ResourceCheck, FetchError> {
    if check.passes() {
        Ok(check)
    } else {
        Err(FetchError::InsufficientSpace {
            free_bytes: check.free_bytes,
            required_bytes: check.required_bytes().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn youtube() -> RequestValidator {
        RequestValidator::new(["youtube.com", "youtu.be"])
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_accepts_allowed_hosts() {
        let v = youtube();
        assert!(v.validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(v.validate_url("https://youtu.be/dQw4w9WgXcQ").is_ok());
        assert!(v.validate_url("http://m.youtube.com/watch?v=abc").is_ok());
        assert!(v.validate_url("  https://YouTube.com/shorts/abc  ").is_ok());
    }

    #[test]
    fn test_rejects_disallowed_host() {
        let err = youtube()
            .validate_url("https://evil.example/video")
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_rejects_lookalike_hosts() {
        let v = youtube();
        assert!(v.validate_url("https://notyoutube.com/watch?v=abc").is_err());
        assert!(v.validate_url("https://youtube.com.evil.example/x").is_err());
    }

    #[test]
    fn test_rejects_malformed_and_non_http() {
        let v = youtube();
        assert!(v.validate_url("not a url").is_err());
        assert!(v.validate_url("").is_err());
        assert!(v.validate_url("ftp://youtube.com/video").is_err());
        assert!(v.validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_sanitize_drops_punctuation() {
        assert_eq!(sanitize_filename("My Clip! #1"), "My_Clip__1");
    }

    #[test]
    fn test_sanitize_only_allowed_characters() {
        let inputs = [
            "Ünïcödé tïtle",
            "../../etc/passwd",
            "a/b\\c",
            "   spaced   ",
            "émoji 🎬 clip",
            "tab\tand\nnewline",
            ".hidden",
            "$(rm -rf /)",
        ];
        for input in inputs {
            let name = sanitize_filename(input);
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')),
                "{:?} -> {:?}",
                input,
                name
            );
            assert!(!name.starts_with('.'), "{:?} -> {:?}", input, name);
        }
    }

    #[test]
    fn test_sanitize_strips_traversal() {
        let name = sanitize_filename("../../etc/passwd");
        assert!(!name.contains('/'));
        assert_eq!(name, "_._.._etc_passwd");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_filename(&long).len(), MAX_BASENAME_LEN);
    }

    #[test]
    fn test_derive_basename_prefers_requested_title() {
        let name = derive_basename(Some("Lobby Loop"), Some("Remote"), fixed_now());
        assert_eq!(name, "Lobby_Loop");
    }

    #[test]
    fn test_derive_basename_falls_back_to_remote_then_timestamp() {
        assert_eq!(
            derive_basename(Some("!!!"), Some("Remote Title"), fixed_now()),
            "Remote_Title"
        );
        assert_eq!(
            derive_basename(None, None, fixed_now()),
            format!("video_{}", fixed_now().timestamp())
        );
        assert_eq!(
            derive_basename(Some("?"), Some(""), fixed_now()),
            format!("video_{}", fixed_now().timestamp())
        );
    }

    #[tokio::test]
    async fn test_unique_basename_appends_suffix() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            unique_basename(dir.path(), "clip", fixed_now()).await.unwrap(),
            "clip"
        );

        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        assert_eq!(
            unique_basename(dir.path(), "clip", fixed_now()).await.unwrap(),
            "clip_1"
        );

        std::fs::write(dir.path().join("clip_1.webm"), b"x").unwrap();
        assert_eq!(
            unique_basename(dir.path(), "clip", fixed_now()).await.unwrap(),
            "clip_2"
        );
    }

    #[tokio::test]
    async fn test_basename_taken_ignores_prefix_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip_extended.mp4"), b"x").unwrap();
        assert!(!basename_taken(dir.path(), "clip").await.unwrap());
        assert!(!basename_taken(&dir.path().join("missing"), "clip").await.unwrap());
    }

    #[test]
    fn test_guard_resources() {
        assert!(guard_resources(ResourceCheck::new(2_000, Some(1_000))).is_ok());
        assert!(guard_resources(ResourceCheck::new(0, None)).is_ok());

        let err = guard_resources(ResourceCheck::new(1_000, Some(1_000))).unwrap_err();
        match err {
            FetchError::InsufficientSpace {
                free_bytes,
                required_bytes,
            } => {
                assert_eq!(free_bytes, 1_000);
                assert_eq!(required_bytes, 1_100);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
