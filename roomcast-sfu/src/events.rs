//! Domain events published by the relay
//!
//! External observers subscribe through an [`EventPublisher`], which is
//! constructed by the embedder and handed to the relay at construction.
//! Events carry the reduced [`PeerInfo`] record, never connection handles.

use crate::engine::{ConnectionDirection, StateKind};
use crate::error::RelayError;
use crate::peer::PeerInfo;
use crate::types::PeerId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Events republished for external observers.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    PeerDidEnter {
        peer: PeerInfo,
    },
    PeerDidLeave {
        peer: PeerInfo,
    },
    TrackDidAdd {
        peer: PeerInfo,
    },
    TrackDidRemove {
        peer: PeerInfo,
    },
    /// One of a connection's engine state machines changed.
    StateDidChange {
        id: PeerId,
        direction: ConnectionDirection,
        state: StateKind,
        value: String,
    },
    Error {
        error: Arc<RelayError>,
    },
}

/// Publish interface injected into the relay.
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventPublisher {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Absent or lagging subscribers are not an error.
    pub fn publish(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }

    /// Log a relay failure and surface it as an `Error` event.
    pub(crate) fn publish_error(&self, error: RelayError) {
        warn!(code = error.code(), %error, "relay error");
        self.publish(RelayEvent::Error {
            error: Arc::new(error),
        });
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}
