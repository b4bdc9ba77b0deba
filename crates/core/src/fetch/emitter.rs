//! Ordered, flush-per-event delivery of progress events.

use tokio::sync::mpsc;
use tracing::debug;

use super::error::FetchError;
use super::types::ProgressEvent;

/// Sending half of one request's event stream.
///
/// Non-terminal events go through [`EventEmitter::emit`]; the single
/// terminal event goes through [`EventEmitter::finish`], which consumes
/// the emitter so nothing can follow it.
#[derive(Debug)]
pub struct EventEmitter {
    tx: mpsc::Sender<ProgressEvent>,
    sent: usize,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx, sent: 0 }
    }

    /// Creates an emitter together with the receiver the transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends a non-terminal event, waiting for channel room.
    pub async fn emit(&mut self, event: ProgressEvent) -> Result<(), FetchError> {
        debug_assert!(!event.is_terminal(), "terminal events go through finish()");
        self.tx
            .send(event)
            .await
            .map_err(|_| FetchError::Disconnected)?;
        self.sent += 1;
        Ok(())
    }

    /// Sends the terminal event. Returns whether the client received it.
    pub async fn finish(self, terminal: ProgressEvent) -> bool {
        debug_assert!(terminal.is_terminal(), "finish() requires success or error");
        let kind = terminal.kind();
        match self.tx.send(terminal).await {
            Ok(()) => true,
            Err(_) => {
                debug!(kind, sent = self.sent, "Terminal event dropped, client gone");
                false
            }
        }
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of non-terminal events delivered so far.
    pub fn sent(&self) -> usize {
        self.sent
    }
}
