//! Roomcast SFU relay
//!
//! Server-mediated multi-party media exchange: each participant feeds one
//! inbound connection into the server, and the server forwards that
//! participant's media to every co-present peer in the same namespace over
//! dedicated per-pair outbound connections, driving the
//! offer/answer/candidate exchange for all of them.
//!
//! ## Architecture
//!
//! - **`RelayManager`**: lifecycle controller reacting to signaling
//!   notifications and routing per-connection engine events
//! - **`GraphManager`**: maintains the per-namespace connection graph
//! - **`NegotiationEngine`**: drives offer/answer/candidate per connection
//! - **`Room`** / **`PeerSession`**: per-namespace peer registry
//! - **`MediaConnection`** / **`SignalingRelay`**: seams toward the external
//!   transport engine and signaling service
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roomcast_sfu::{EventPublisher, RelayConfig, RelayManager};
//!
//! let events = EventPublisher::new(256);
//! let manager = RelayManager::new(RelayConfig::default(), factory, relay, events.clone());
//!
//! // feed it the signaling service's notifications
//! manager.handle_notification(notification).await;
//! ```

mod config;
mod engine;
mod error;
mod events;
mod graph;
mod manager;
mod negotiation;
mod peer;
mod room;
mod signaling;
mod types;

pub use config::RelayConfig;
pub use engine::{
    ConnectionDirection, ConnectionEvent, ConnectionFactory, MediaConnection, MediaStream,
    MediaTrack, StateKind, TrackSender,
};
pub use error::{RelayError, Result};
pub use events::{EventPublisher, RelayEvent};
pub use graph::{GraphManager, PumpHook};
pub use manager::RelayManager;
pub use negotiation::NegotiationEngine;
pub use peer::{PeerInfo, PeerSession};
pub use room::Room;
pub use signaling::{Envelope, SignalPayload, SignalingNotification, SignalingRelay};
pub use types::{NamespaceId, PeerId};
