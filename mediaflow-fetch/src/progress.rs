//! Producer half of an orchestration's event stream.

use mediaflow_core::ProgressEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default channel capacity between an orchestration and its client.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Sends [`ProgressEvent`]s to the client and shares its cancellation token.
///
/// When the receiving side is gone the client has disconnected; the first
/// failed send cancels the token so in-flight work stops.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
}

impl ProgressSink {
    /// Creates a sink and the receiver that feeds the client.
    pub fn channel(capacity: usize, cancel: CancellationToken) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, cancel }, rx)
    }

    /// Sends one event. Returns false once the client is gone.
    pub async fn emit(&self, event: ProgressEvent) -> bool {
        if self.tx.send(event).await.is_ok() {
            return true;
        }
        if !self.cancel.is_cancelled() {
            debug!("Event receiver dropped, cancelling operation");
            self.cancel.cancel();
        }
        false
    }

    /// Token cancelled on client disconnect.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True once the operation should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
