use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use spotlight_core::error::SpotlightError;
use spotlight_core::event::CanonicalEvent;

use crate::frame::{keepalive, WireFrame};

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `Done` or `Error` was delivered.
    Completed,
    /// The source ended early and a synthesized `Error` was delivered.
    Drained,
    /// The client went away.
    Disconnected,
    /// The cancellation token fired.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Draining,
    Terminated(Termination),
}

/// Result of one write into the response body.
enum Delivery {
    Sent,
    Closed,
    Cancelled,
}

/// Pumps one execution's events into its response body.
///
/// Each iteration races cancellation, client disconnect, the next event and
/// the keepalive timer, in that priority order. The timer restarts after
/// every write. Nothing is written after a terminal event.
pub struct EventStreamController {
    trace_id: String,
    keepalive: Duration,
    cancel: CancellationToken,
}

impl EventStreamController {
    pub fn new(trace_id: impl Into<String>, keepalive: Duration, cancel: CancellationToken) -> Self {
        Self {
            trace_id: trace_id.into(),
            keepalive,
            cancel,
        }
    }

    /// Drive `events` into `sink` until a terminal state. The event stream is
    /// dropped before returning, which abandons any in-flight model or tool
    /// call.
    pub async fn run(
        self,
        mut events: BoxStream<'static, CanonicalEvent>,
        sink: mpsc::Sender<Bytes>,
    ) -> Termination {
        let timer = tokio::time::sleep(self.keepalive);
        tokio::pin!(timer);
        let mut state = State::Running;
        let mut frames = 0usize;

        while state == State::Running {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Execution cancelled");
                    state = State::Terminated(Termination::Cancelled);
                }
                _ = sink.closed() => {
                    state = State::Terminated(Termination::Disconnected);
                }
                next = events.next() => match next {
                    Some(event) => {
                        let terminal = event.is_terminal();
                        let frame = WireFrame::from_event(&event, &self.trace_id);
                        match self.deliver(&sink, frame.encode()).await {
                            Delivery::Sent => {
                                frames += 1;
                                timer.as_mut().reset(Instant::now() + self.keepalive);
                                if terminal {
                                    state = State::Terminated(Termination::Completed);
                                }
                            }
                            Delivery::Closed => state = State::Terminated(Termination::Disconnected),
                            Delivery::Cancelled => state = State::Terminated(Termination::Cancelled),
                        }
                    }
                    None => state = State::Draining,
                },
                _ = &mut timer => {
                    match self.deliver(&sink, keepalive()).await {
                        Delivery::Sent => {
                            debug!("Sent keepalive");
                            timer.as_mut().reset(Instant::now() + self.keepalive);
                        }
                        Delivery::Closed => state = State::Terminated(Termination::Disconnected),
                        Delivery::Cancelled => state = State::Terminated(Termination::Cancelled),
                    }
                }
            }
        }

        if state == State::Draining {
            let e = SpotlightError::Internal("event source ended without a terminal event".into());
            error!(error = %e, "Closing stream with a synthesized error");
            let frame = WireFrame::from_event(
                &CanonicalEvent::error(e.wire_code(), e.wire_message()),
                &self.trace_id,
            );
            state = State::Terminated(match self.deliver(&sink, frame.encode()).await {
                Delivery::Sent => {
                    frames += 1;
                    Termination::Drained
                }
                Delivery::Closed => Termination::Disconnected,
                Delivery::Cancelled => Termination::Cancelled,
            });
        }

        drop(events);

        let termination = match state {
            State::Terminated(t) => t,
            _ => Termination::Completed,
        };
        if termination == Termination::Disconnected {
            warn!(frames, "Client disconnected, cancelling execution");
            self.cancel.cancel();
        } else {
            info!(frames, termination = ?termination, "Event stream closed");
        }
        termination
    }

    /// Write one frame, waiting for buffer space unless cancelled first.
    async fn deliver(&self, sink: &mpsc::Sender<Bytes>, frame: Bytes) -> Delivery {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Delivery::Cancelled,
            sent = sink.send(frame) => match sent {
                Ok(()) => Delivery::Sent,
                Err(_) => Delivery::Closed,
            },
        }
    }
}
