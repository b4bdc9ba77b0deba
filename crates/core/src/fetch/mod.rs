//! Media fetch subsystem.
//!
//! A fetch request flows through these stages, each in its own module:
//!
//! 1. [`validate`]: URL allow-list, filename derivation, free-space guard
//! 2. [`probe`]: one metadata-only run of the tool
//! 3. [`supervisor`]: spawns the real download and multiplexes its pipes
//! 4. [`classifier`]: raw output lines to [`ProgressEvent`]s
//! 5. [`emitter`]: ordered delivery to the HTTP response
//! 6. [`verifier`]: confirms the artifact and fires the playlist [`hook`]
//!
//! [`MediaFetcher`] wires the stages together for a single request.

pub mod classifier;
pub mod emitter;
mod error;
pub mod fetcher;
pub mod hook;
pub mod probe;
pub mod space;
pub mod supervisor;
pub mod tool;
mod types;
pub mod validate;
pub mod verifier;

pub use classifier::OutputClassifier;
pub use emitter::EventEmitter;
pub use error::FetchError;
pub use fetcher::MediaFetcher;
pub use hook::{create_hook, CommandHook, HookError, NoopHook, PlaylistHook};
pub use probe::{parse_metadata, probe_metadata};
pub use space::{DfSpaceProbe, SpaceProbe};
pub use supervisor::{ProcessSupervisor, SupervisorOptions, SupervisorReport, SupervisorState};
pub use tool::{FetchTool, YtDlpTool};
pub use types::{FetchPlan, FetchRequest, ProgressEvent, ResourceCheck, VideoInfo, VideoMetadata};
pub use validate::{derive_basename, sanitize_filename, RequestValidator};
pub use verifier::{format_file_size, locate_artifact, Artifact};
