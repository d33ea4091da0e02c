//! SSE side of an orchestration's event stream.
//!
//! Each [`ProgressEvent`] becomes one `event: <type>` / `data: <json>` frame.
//! After the first `Done`, or when the producer goes away, a single
//! `data: [DONE]` sentinel is written and the stream ends. Dropping the stream
//! before that point means the client left; the orchestration is cancelled.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, stream};
use mediaflow_core::ProgressEvent;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Transport end-of-stream marker.
pub const SENTINEL: &str = "[DONE]";

enum Phase {
    Streaming,
    Sentinel,
    Finished,
}

struct BridgeState {
    rx: mpsc::Receiver<ProgressEvent>,
    guard: Option<DropGuard>,
    phase: Phase,
}

/// Encodes one event as an SSE frame.
pub fn encode(event: &ProgressEvent) -> Event {
    match Event::default().event(event.event_type()).json_data(event) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, event = event.event_type(), "Failed to encode event");
            Event::default().comment("unencodable event")
        }
    }
}

fn sentinel() -> Event {
    Event::default().data(SENTINEL)
}

/// Turns the receiver into a stream of SSE frames ending with the sentinel.
///
/// `cancel` fires if the stream is dropped before the sentinel is produced.
pub fn event_stream(
    rx: mpsc::Receiver<ProgressEvent>,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let state = BridgeState {
        rx,
        guard: Some(cancel.drop_guard()),
        phase: Phase::Streaming,
    };

    stream::unfold(state, |mut st| async move {
        match st.phase {
            Phase::Streaming => match st.rx.recv().await {
                Some(event) => {
                    if matches!(event, ProgressEvent::Done) {
                        st.phase = Phase::Sentinel;
                    }
                    Some((Ok(encode(&event)), st))
                }
                None => {
                    debug!("Producer closed without Done");
                    st.phase = Phase::Finished;
                    Some((Ok(sentinel()), st))
                }
            },
            Phase::Sentinel => {
                st.phase = Phase::Finished;
                Some((Ok(sentinel()), st))
            }
            Phase::Finished => {
                if let Some(guard) = st.guard.take() {
                    guard.disarm();
                }
                None
            }
        }
    })
}

/// Wraps [`event_stream`] in an axum SSE response with keep-alives.
pub fn sse(
    rx: mpsc::Receiver<ProgressEvent>,
    cancel: CancellationToken,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    Sse::new(event_stream(rx, cancel)).keep_alive(KeepAlive::default())
}
