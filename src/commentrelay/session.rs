//! Streaming session
//!
//! A session bridges one client connection to the broker for one video. It
//! owns exactly one subscription and multiplexes three sources until one of
//! them ends the session: the connection's cancellation token, a heartbeat
//! timer and the subscription's endpoint.
//!
//! Output is written as server-sent events into a channel that the
//! transport drains into an `Sse` response.

use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::commentrelay::broker::{Endpoint, EventBroker, Unsubscribe};
use crate::commentrelay::event::CommentEvent;
use crate::error::{CommentRelayError, ErrorCode, Result};

/// Broker carrying shared, immutable comment events
pub type CommentBroker = EventBroker<Arc<CommentEvent>>;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection's cancellation token fired
    Cancelled,
    /// The endpoint was closed from the broker side
    EndpointClosed,
    /// The transport stopped accepting frames
    ClientGone,
}

pub struct StreamSession {
    // Declared first so a dropped session deregisters before its endpoint closes.
    release: Unsubscribe<Arc<CommentEvent>>,
    endpoint: Endpoint<Arc<CommentEvent>>,
    heartbeat: Duration,
    cancel: CancellationToken,
}

impl StreamSession {
    /// Validates the topic key and subscribes.
    ///
    /// A missing or empty key is rejected before the broker is touched.
    pub fn open(
        broker: &Arc<CommentBroker>,
        topic: Option<&str>,
        heartbeat: Duration,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let topic = match topic {
            Some(topic) if !topic.is_empty() => topic,
            _ => return Err(CommentRelayError::from_code(ErrorCode::MissingTopicKey)),
        };

        let (endpoint, release) = broker.subscribe(topic);
        info!("Stream session {} opened for video {}", endpoint.id(), topic);

        Ok(Self {
            release,
            endpoint,
            heartbeat,
            cancel,
        })
    }

    pub fn topic(&self) -> &str {
        self.endpoint.topic()
    }

    /// Runs until cancelled, the endpoint closes or the client goes away.
    ///
    /// The subscription is released on return; if the future is dropped
    /// mid-wait the release happens when the session itself is dropped.
    pub async fn run(mut self, frames: Sender<Event>) -> SessionEnd {
        let mut heartbeat = interval_at(Instant::now() + self.heartbeat, self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break SessionEnd::Cancelled,
                _ = heartbeat.tick() => {
                    debug!("Heartbeat for session {}", self.endpoint.id());
                    if let Some(end) = emit(&self.cancel, &frames, heartbeat_frame()).await {
                        break end;
                    }
                }
                next = self.endpoint.recv() => {
                    let event = match next {
                        Some(event) => event,
                        None => break SessionEnd::EndpointClosed,
                    };
                    let frame = match encode_event(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Skipping event {}: {}", event.event_id, e);
                            continue;
                        }
                    };
                    if let Some(end) = emit(&self.cancel, &frames, frame).await {
                        break end;
                    }
                }
            }
        };

        info!("Stream session {} for video {} ended: {:?}", self.endpoint.id(), self.topic(), end);
        self.release.unsubscribe();
        end
    }
}

/// Hands a frame to the transport, still honouring cancellation.
async fn emit(cancel: &CancellationToken, frames: &Sender<Event>, frame: Event) -> Option<SessionEnd> {
    tokio::select! {
        _ = cancel.cancelled() => Some(SessionEnd::Cancelled),
        sent = frames.send(frame) => match sent {
            Ok(()) => None,
            Err(_) => Some(SessionEnd::ClientGone),
        },
    }
}

/// Wraps one comment event as the `data` of an unnamed SSE event
pub fn encode_event(event: &CommentEvent) -> Result<Event> {
    Event::default()
        .json_data(event)
        .map_err(|e| CommentRelayError::new(ErrorCode::InternalServerError, e.to_string()))
}

/// Named `heartbeat` event with an empty JSON object as data
pub fn heartbeat_frame() -> Event {
    Event::default().event("heartbeat").data("{}")
}
