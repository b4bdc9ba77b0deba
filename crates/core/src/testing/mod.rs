//! Test doubles for the fetch pipeline.
//!
//! These stand in for the external tool, the free-space source and the
//! playlist hook, so the whole pipeline can run without yt-dlp.
//!
//! # Example
//!
//! ```rust,ignore
//! use marquee_core::testing::{FixedSpace, RecordingHook, ScriptedTool};
//!
//! let tool = Arc::new(ScriptedTool::writing_artifact("mp4", 2048));
//! let fetcher = MediaFetcher::new(
//!     FetcherConfig::default(),
//!     media_dir,
//!     tool.clone(),
//!     Arc::new(FixedSpace(u64::MAX)),
//!     Arc::new(RecordingHook::new()),
//! );
//! ```

mod doubles;
mod scripted_tool;

pub use doubles::{FailingSpace, FixedSpace, RecordingHook};
pub use scripted_tool::ScriptedTool;
