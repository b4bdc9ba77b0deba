//! Runs the fetch tool and funnels its output through the classifier.

use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::classifier::OutputClassifier;
use super::emitter::EventEmitter;
use super::error::FetchError;
use super::tool::FetchTool;
use super::types::{FetchPlan, ProgressEvent};
use crate::config::{DisconnectPolicy, FetcherConfig};

/// Lifecycle of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotStarted,
    /// Both pipes open.
    Running,
    /// One pipe has reached EOF.
    Draining,
    /// Both pipes closed, exit status not yet collected.
    Exited,
    Reaped,
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// How often the loop wakes to look for a departed client.
    pub poll_interval: Duration,
    /// Overall limit for the download; `None` waits forever.
    pub timeout: Option<Duration>,
    pub on_disconnect: DisconnectPolicy,
}

impl SupervisorOptions {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            timeout: (config.download_timeout_secs > 0)
                .then(|| Duration::from_secs(config.download_timeout_secs)),
            on_disconnect: config.on_disconnect,
        }
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

/// What the supervisor observed once the process was reaped.
#[derive(Debug)]
pub struct SupervisorReport {
    pub status: ExitStatus,
    /// First `ERROR:` reason the tool printed, held back for the terminal event.
    pub tool_error: Option<String>,
    /// Non-blank lines read from both pipes.
    pub lines: usize,
    /// Client went away and the process was left to finish.
    pub disconnected: bool,
}

enum Step {
    Stdout(std::io::Result<Option<String>>),
    Stderr(std::io::Result<Option<String>>),
    Tick,
    Deadline,
}

/// Reads lossy UTF-8 lines, surviving cancellation inside `select!`.
struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator; `None` at EOF.
    ///
    /// Partial reads stay in `buf` when the future is dropped, so a
    /// cancelled call resumes where it left off.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}

async fn read_from<R: AsyncRead + Unpin>(
    reader: &mut Option<LineReader<R>>,
) -> std::io::Result<Option<String>> {
    match reader {
        Some(r) => r.next_line().await,
        None => std::future::pending().await,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Drives a single fetch process from spawn to reap.
#[derive(Debug)]
pub struct ProcessSupervisor {
    options: SupervisorOptions,
    state: SupervisorState,
}

impl ProcessSupervisor {
    pub fn new(options: SupervisorOptions) -> Self {
        Self {
            options,
            state: SupervisorState::NotStarted,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Supervisor state change");
            self.state = next;
        }
    }

    /// Spawns the tool for `plan` and streams classified output to `emitter`.
    ///
    /// Returns once the process has been reaped. Non-terminal events only:
    /// the terminal event is the caller's to send.
    pub async fn run(
        &mut self,
        tool: &dyn FetchTool,
        plan: &FetchPlan,
        classifier: &mut OutputClassifier,
        emitter: &mut EventEmitter,
    ) -> Result<SupervisorReport, FetchError> {
        let mut child = match tool.spawn_fetch(plan) {
            Ok(child) => child,
            Err(e) => {
                self.transition(SupervisorState::Reaped);
                warn!(tool = tool.name(), error = %e, "Failed to spawn fetch tool");
                return Err(FetchError::SpawnFailed(e));
            }
        };
        self.transition(SupervisorState::Running);
        info!(
            tool = tool.name(),
            pid = child.id(),
            basename = %plan.basename,
            "Fetch process started"
        );

        let mut stdout = child.stdout.take().map(LineReader::new);
        let mut stderr = child.stderr.take().map(LineReader::new);

        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let deadline = self.options.timeout.map(|t| Instant::now() + t);

        let mut tool_error: Option<String> = None;
        let mut lines = 0usize;
        let mut disconnected = false;

        while stdout.is_some() || stderr.is_some() {
            let step = tokio::select! {
                line = read_from(&mut stdout), if stdout.is_some() => Step::Stdout(line),
                line = read_from(&mut stderr), if stderr.is_some() => Step::Stderr(line),
                _ = ticker.tick() => Step::Tick,
                _ = deadline_reached(deadline) => Step::Deadline,
            };

            let line = match step {
                Step::Stdout(Ok(Some(line))) | Step::Stderr(Ok(Some(line))) => line,
                Step::Stdout(result) => {
                    if let Err(e) = result {
                        warn!(error = %e, "Error reading tool stdout");
                    }
                    stdout = None;
                    self.transition(SupervisorState::Draining);
                    continue;
                }
                Step::Stderr(result) => {
                    if let Err(e) = result {
                        warn!(error = %e, "Error reading tool stderr");
                    }
                    stderr = None;
                    self.transition(SupervisorState::Draining);
                    continue;
                }
                Step::Tick => {
                    if !disconnected && emitter.is_closed() {
                        disconnected = self.client_gone(&mut child).await?;
                    }
                    continue;
                }
                Step::Deadline => return Err(self.timed_out(&mut child).await),
            };

            if line.trim().is_empty() {
                continue;
            }
            lines += 1;

            let Some(event) = classifier.accept(&line) else {
                continue;
            };

            let event = match event {
                ProgressEvent::Error { message } => {
                    if tool_error.is_none() {
                        tool_error = Some(message);
                    } else {
                        warn!(reason = %message, "Additional tool error");
                    }
                    if !plan.verbose {
                        continue;
                    }
                    ProgressEvent::console(line.trim())
                }
                other => other,
            };

            if disconnected {
                continue;
            }
            // A slow reader can hold the send; the deadline still applies.
            let sent = match deadline {
                Some(at) => match tokio::time::timeout_at(at, emitter.emit(event)).await {
                    Ok(sent) => sent,
                    Err(_) => return Err(self.timed_out(&mut child).await),
                },
                None => emitter.emit(event).await,
            };
            if sent.is_err() {
                disconnected = self.client_gone(&mut child).await?;
            }
        }

        self.transition(SupervisorState::Exited);
        let status = match deadline {
            Some(at) => match tokio::time::timeout_at(at, child.wait()).await {
                Ok(status) => status?,
                Err(_) => return Err(self.timed_out(&mut child).await),
            },
            None => child.wait().await?,
        };
        self.transition(SupervisorState::Reaped);

        debug!(%status, lines, "Fetch process reaped");
        Ok(SupervisorReport {
            status,
            tool_error,
            lines,
            disconnected,
        })
    }

    /// Applies the disconnect policy. `Ok(true)` means keep draining.
    async fn client_gone(&mut self, child: &mut Child) -> Result<bool, FetchError> {
        match self.options.on_disconnect {
            DisconnectPolicy::Kill => {
                warn!(pid = child.id(), "Client disconnected, stopping fetch process");
                self.kill(child).await;
                Err(FetchError::Disconnected)
            }
            DisconnectPolicy::Continue => {
                info!(pid = child.id(), "Client disconnected, letting fetch finish");
                Ok(true)
            }
        }
    }

    async fn timed_out(&mut self, child: &mut Child) -> FetchError {
        let secs = self.options.timeout.map(|t| t.as_secs()).unwrap_or_default();
        warn!(pid = child.id(), timeout_secs = secs, "Fetch process timed out");
        self.kill(child).await;
        FetchError::Timeout { secs }
    }

    async fn kill(&mut self, child: &mut Child) {
        if let Err(e) = child.kill().await {
            debug!(error = %e, "Kill failed, process likely already gone");
        }
        self.transition(SupervisorState::Reaped);
    }
}
