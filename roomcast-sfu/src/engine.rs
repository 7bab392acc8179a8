//! Transport engine boundary
//!
//! The relay drives every connection through these traits; ICE, DTLS and
//! the media plane live in an external real-time-media engine. Session
//! descriptions and candidates are the `webrtc` crate types, so payloads
//! relayed to clients keep the engine's own serialization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Which side of the server a connection faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionDirection {
    /// The peer's own media flowing into the server.
    In,
    /// The server forwarding media out to the peer.
    Out,
}

impl ConnectionDirection {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for ConnectionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which of the engine's state machines a state-change event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    Connection,
    IceConnection,
    IceGathering,
    Signaling,
}

impl StateKind {
    /// Name used in the published state-change event.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connectionState",
            Self::IceConnection => "iceConnectionState",
            Self::IceGathering => "iceGatheringState",
            Self::Signaling => "signalingState",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event pushed by the engine for a single connection.
pub enum ConnectionEvent {
    /// A local ICE candidate was gathered.
    IceCandidate(RTCIceCandidateInit),
    /// A remote media stream arrived (inbound connections only).
    Track(Arc<dyn MediaStream>),
    /// A track disappeared from the connection's current remote stream.
    TrackRemoved,
    /// The engine wants a (re)negotiation.
    NegotiationNeeded,
    /// One of the engine's state machines changed.
    StateChange { kind: StateKind, value: String },
}

impl fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IceCandidate(c) => f.debug_tuple("IceCandidate").field(&c.candidate).finish(),
            Self::Track(stream) => f.debug_tuple("Track").field(&stream.id()).finish(),
            Self::TrackRemoved => write!(f, "TrackRemoved"),
            Self::NegotiationNeeded => write!(f, "NegotiationNeeded"),
            Self::StateChange { kind, value } => f
                .debug_struct("StateChange")
                .field("kind", kind)
                .field("value", value)
                .finish(),
        }
    }
}

/// Handle to a media track owned by the engine.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;

    /// Stop the track and release its media resources.
    fn stop(&self);
}

/// Handle to a media stream (a set of tracks) owned by the engine.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>>;
}

/// Handle to an RTP sender installed on a connection.
pub trait TrackSender: Send + Sync {
    /// Id of the track currently bound to this sender, if any.
    fn track_id(&self) -> Option<String>;
}

/// A single transport connection.
///
/// The same surface serves both roles: the inbound connection terminating a
/// peer's media at the server (the server answers) and each outbound
/// connection forwarding media toward a peer (the server offers). The
/// engine owns the negotiation-state machine and is the only guard against
/// illegal concurrent transitions; callers catch and report its errors.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    async fn create_offer(&self) -> anyhow::Result<RTCSessionDescription>;

    async fn create_answer(&self) -> anyhow::Result<RTCSessionDescription>;

    async fn set_local_description(&self, desc: RTCSessionDescription) -> anyhow::Result<()>;

    async fn set_remote_description(&self, desc: RTCSessionDescription) -> anyhow::Result<()>;

    /// Current local description, reflecting any engine-side rewriting that
    /// happened after [`Self::set_local_description`].
    async fn local_description(&self) -> Option<RTCSessionDescription>;

    /// Apply a remote candidate. Candidates arriving before the matching
    /// description are buffered or rejected by the engine, not by the relay.
    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> anyhow::Result<()>;

    /// RTP senders currently installed on the connection.
    fn senders(&self) -> Vec<Arc<dyn TrackSender>>;

    fn add_track(
        &self,
        track: Arc<dyn MediaTrack>,
        stream: &Arc<dyn MediaStream>,
    ) -> anyhow::Result<Arc<dyn TrackSender>>;

    fn remove_track(&self, sender: &Arc<dyn TrackSender>) -> anyhow::Result<()>;

    /// Close the connection. Outstanding negotiation steps must fail safely
    /// afterwards, and the connection's event channel must end.
    async fn close(&self);
}

/// Creates engine connections; one factory serves the whole relay.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Create a connection configured with the given ICE servers, returning
    /// it together with the receiver of its engine events.
    async fn create_connection(
        &self,
        ice_servers: &[String],
    ) -> anyhow::Result<(Arc<dyn MediaConnection>, mpsc::Receiver<ConnectionEvent>)>;
}
