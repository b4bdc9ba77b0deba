//! Free-space figures for the destination directory.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Source of the free-space figure for a directory.
#[async_trait]
pub trait SpaceProbe: Send + Sync {
    /// Bytes available to unprivileged writers under `dir`.
    async fn free_bytes(&self, dir: &Path) -> std::io::Result<u64>;
}

/// Asks `df` for the available blocks, POSIX output format.
#[derive(Debug, Clone, Default)]
pub struct DfSpaceProbe;

#[async_trait]
impl SpaceProbe for DfSpaceProbe {
    async fn free_bytes(&self, dir: &Path) -> std::io::Result<u64> {
        let output = Command::new("df")
            .arg("-Pk")
            .arg(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "df failed for {}: {}",
                dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_df_available(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "unexpected df output")
        })
    }
}

/// Parses `df -Pk` output into available bytes.
///
/// Columns: Filesystem 1024-blocks Used Available Capacity Mounted-on
pub fn parse_df_available(output: &str) -> Option<u64> {
    let data = output.lines().nth(1)?;
    let available_kb: u64 = data.split_whitespace().nth(3)?.parse().ok()?;
    available_kb.checked_mul(1024)
}
