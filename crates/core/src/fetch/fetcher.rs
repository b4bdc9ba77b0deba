//! One fetch, end to end: validate, probe, guard, supervise, verify.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::classifier::OutputClassifier;
use super::emitter::EventEmitter;
use super::error::FetchError;
use super::hook::{create_hook, PlaylistHook};
use super::probe::probe_metadata;
use super::space::{DfSpaceProbe, SpaceProbe};
use super::supervisor::{ProcessSupervisor, SupervisorOptions, SupervisorReport};
use super::tool::{FetchTool, YtDlpTool};
use super::types::{FetchPlan, FetchRequest, ProgressEvent, ResourceCheck, VideoMetadata};
use super::validate::{derive_basename, guard_resources, unique_basename, RequestValidator};
use super::verifier::{locate_artifact, success_event, Artifact};
use crate::config::{Config, DisconnectPolicy, FetcherConfig};
use crate::metrics::{
    FETCHES_ACTIVE, FETCHES_STARTED, FETCH_DURATION, FETCH_RESULTS, PLAYLIST_HOOK_RUNS,
};

/// Runs media fetches into a single destination directory.
///
/// Holds no per-request state; one instance serves every request.
pub struct MediaFetcher {
    config: FetcherConfig,
    media_dir: PathBuf,
    validator: RequestValidator,
    tool: Arc<dyn FetchTool>,
    space: Arc<dyn SpaceProbe>,
    hook: Arc<dyn PlaylistHook>,
}

impl MediaFetcher {
    pub fn new(
        config: FetcherConfig,
        media_dir: impl Into<PathBuf>,
        tool: Arc<dyn FetchTool>,
        space: Arc<dyn SpaceProbe>,
        hook: Arc<dyn PlaylistHook>,
    ) -> Self {
        Self {
            validator: RequestValidator::from_config(&config),
            config,
            media_dir: media_dir.into(),
            tool,
            space,
            hook,
        }
    }

    /// Production wiring: yt-dlp, `df`, and the configured playlist hook.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.fetcher.clone(),
            config.media.directory.clone(),
            Arc::new(YtDlpTool::from_config(&config.fetcher)),
            Arc::new(DfSpaceProbe),
            Arc::from(create_hook(config.playlist_hook.as_ref())),
        )
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub fn channel_capacity(&self) -> usize {
        self.config.channel_capacity
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.config.probe_timeout_secs)
    }

    /// Metadata for `url` without downloading anything.
    ///
    /// Disallowed URLs are rejected before the tool runs.
    pub async fn probe(&self, url: &str) -> Result<Option<VideoMetadata>, FetchError> {
        let url = self.validator.validate_url(url)?;
        Ok(probe_metadata(self.tool.as_ref(), url.as_str(), self.probe_timeout()).await)
    }

    /// Performs `request`, streaming events into `emitter`.
    ///
    /// Always ends with exactly one terminal event, which is also returned.
    /// The playlist hook runs after the terminal event has been sent.
    pub async fn run(&self, request: FetchRequest, mut emitter: EventEmitter) -> ProgressEvent {
        let started = Instant::now();
        FETCHES_STARTED.inc();
        FETCHES_ACTIVE.inc();

        let outcome = self.execute(&request, &mut emitter).await;

        let (terminal, result) = match &outcome {
            Ok(artifact) => {
                info!(
                    path = %artifact.path.display(),
                    size_bytes = artifact.size_bytes,
                    "Fetch completed"
                );
                (success_event(artifact), "success")
            }
            Err(e) => {
                if e.is_rejection() {
                    info!(url = %request.url, error = %e, "Fetch rejected");
                } else {
                    warn!(url = %request.url, error = %e, "Fetch failed");
                }
                (ProgressEvent::error(e.user_message()), e.metric_label())
            }
        };

        FETCH_RESULTS.with_label_values(&[result]).inc();
        FETCH_DURATION
            .with_label_values(&[result])
            .observe(started.elapsed().as_secs_f64());
        FETCHES_ACTIVE.dec();

        emitter.finish(terminal.clone()).await;

        if let Ok(artifact) = &outcome {
            self.notify_hook(artifact).await;
        }
        terminal
    }

    async fn execute(
        &self,
        request: &FetchRequest,
        emitter: &mut EventEmitter,
    ) -> Result<Artifact, FetchError> {
        let plan = self.plan(request).await?;

        self.notify(emitter, ProgressEvent::info("Initializing download..."))
            .await?;
        if let Some(found) = plan.metadata.as_ref().and_then(ProgressEvent::video_found) {
            self.notify(emitter, found).await?;
        }

        let mut classifier = OutputClassifier::new(plan.verbose);
        let mut supervisor = ProcessSupervisor::new(SupervisorOptions::from_config(&self.config));
        let report = supervisor
            .run(self.tool.as_ref(), &plan, &mut classifier, emitter)
            .await?;

        self.verify(&plan, report).await
    }

    /// Everything that happens before a fetch process may be spawned.
    async fn plan(&self, request: &FetchRequest) -> Result<FetchPlan, FetchError> {
        let url = self.validator.validate_url(&request.url)?;

        let metadata = probe_metadata(self.tool.as_ref(), url.as_str(), self.probe_timeout()).await;
        let estimated_bytes = metadata.as_ref().and_then(|m| m.estimated_bytes);

        tokio::fs::create_dir_all(&self.media_dir).await?;

        if estimated_bytes.is_some() {
            match self.space.free_bytes(&self.media_dir).await {
                Ok(free_bytes) => {
                    let check = guard_resources(ResourceCheck::new(free_bytes, estimated_bytes))?;
                    debug!(
                        free_bytes = check.free_bytes,
                        required_bytes = ?check.required_bytes(),
                        "Resource check passed"
                    );
                }
                Err(e) => {
                    warn!(dir = %self.media_dir.display(), error = %e, "Free space unknown, skipping check");
                }
            }
        }

        let now = Utc::now();
        let remote_title = metadata.as_ref().and_then(|m| m.title.as_deref());
        let basename = derive_basename(request.title.as_deref(), remote_title, now);
        let basename = unique_basename(&self.media_dir, &basename, now).await?;

        info!(
            url = %url,
            basename = %basename,
            dir = %self.media_dir.display(),
            estimated_bytes = ?estimated_bytes,
            "Fetch planned"
        );

        Ok(FetchPlan {
            url: url.to_string(),
            basename,
            directory: self.media_dir.clone(),
            verbose: request.verbose,
            metadata,
        })
    }

    async fn verify(&self, plan: &FetchPlan, report: SupervisorReport) -> Result<Artifact, FetchError> {
        if !report.status.success() {
            if let Some(reason) = report.tool_error {
                return Err(FetchError::ToolReported(reason));
            }
            return Err(match report.status.code() {
                Some(code) => FetchError::ExitCode(code),
                None => FetchError::Killed,
            });
        }

        let artifact = locate_artifact(plan.directory(), &plan.basename)
            .await?
            .ok_or(FetchError::ArtifactMissing)?;

        if let Some(reason) = report.tool_error {
            warn!(reason = %reason, "Tool reported an error but exited cleanly");
        }
        Ok(artifact)
    }

    /// Sends a pre-spawn event; a gone client only aborts under `kill`.
    async fn notify(
        &self,
        emitter: &mut EventEmitter,
        event: ProgressEvent,
    ) -> Result<(), FetchError> {
        match emitter.emit(event).await {
            Err(e) if self.config.on_disconnect == DisconnectPolicy::Kill => Err(e),
            _ => Ok(()),
        }
    }

    async fn notify_hook(&self, artifact: &Artifact) {
        match self.hook.playlist_changed(&artifact.path).await {
            Ok(()) => {
                PLAYLIST_HOOK_RUNS.with_label_values(&["ok"]).inc();
            }
            Err(e) => {
                PLAYLIST_HOOK_RUNS.with_label_values(&["failed"]).inc();
                warn!(hook = self.hook.name(), error = %e, "Playlist hook failed");
            }
        }
    }
}

impl std::fmt::Debug for MediaFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFetcher")
            .field("media_dir", &self.media_dir)
            .field("tool", &self.tool.name())
            .field("hook", &self.hook.name())
            .finish()
    }
}
