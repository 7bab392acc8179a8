//! Relay error types
//!
//! Every failure on the negotiation or signaling path is wrapped into a
//! [`RelayError`] carrying a stable numeric code and surfaced through the
//! `error` domain event. Failures never abort the event loop and never
//! leave the registry in an inconsistent state.

use crate::types::{NamespaceId, PeerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Establishing a transport connection with the engine failed.
    #[error("connection setup failed for peer {peer} in {namespace}: {cause}")]
    ConnectionSetup {
        namespace: NamespaceId,
        peer: PeerId,
        cause: anyhow::Error,
    },

    /// Offer creation, local application or relay of a renegotiation failed.
    #[error("renegotiation failed for peer {peer} (on {on:?}): {cause}")]
    Negotiation {
        peer: PeerId,
        on: Option<PeerId>,
        cause: anyhow::Error,
    },

    /// Answering an inbound offer failed.
    #[error("failed to answer offer from peer {peer}: {cause}")]
    OfferHandling { peer: PeerId, cause: anyhow::Error },

    /// Applying an inbound answer to the tagged outbound connection failed.
    #[error("failed to apply answer from peer {peer} on {on}: {cause}")]
    AnswerHandling {
        peer: PeerId,
        on: PeerId,
        cause: anyhow::Error,
    },

    /// Applying an ICE candidate failed (including candidates the engine
    /// rejects because they arrived before the matching description).
    #[error("failed to apply candidate from peer {peer} (on {on:?}): {cause}")]
    Candidate {
        peer: PeerId,
        on: Option<PeerId>,
        cause: anyhow::Error,
    },

    /// The signaling relay refused an outbound send or membership release.
    #[error("signaling relay call failed for peer {peer} in {namespace}: {cause}")]
    RelaySend {
        namespace: NamespaceId,
        peer: PeerId,
        cause: anyhow::Error,
    },

    /// An envelope targeted an outbound connection that does not exist, or
    /// an answer arrived without its target tag.
    #[error("no outbound connection on {on:?} for peer {peer}")]
    MissingConnection { peer: PeerId, on: Option<PeerId> },

    /// A peer-entered notification would exceed the namespace capacity.
    #[error("namespace {namespace} is full ({limit} peers)")]
    NamespaceFull { namespace: NamespaceId, limit: usize },
}

impl RelayError {
    /// Stable numeric code identifying the failure category.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::ConnectionSetup { .. } => 771_044,
            Self::Negotiation { .. } => 788_167,
            Self::OfferHandling { .. } => 352_177,
            Self::AnswerHandling { .. } => 645_167,
            Self::Candidate { .. } => 518_450,
            Self::RelaySend { .. } => 414_502,
            Self::MissingConnection { .. } => 627_310,
            Self::NamespaceFull { .. } => 556_120,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = RelayError::Negotiation {
            peer: PeerId::from("p1"),
            on: Some(PeerId::from("p2")),
            cause: anyhow::anyhow!("engine refused"),
        };
        assert_eq!(err.code(), 788_167);

        let err = RelayError::OfferHandling {
            peer: PeerId::from("p1"),
            cause: anyhow::anyhow!("bad sdp"),
        };
        assert_eq!(err.code(), 352_177);

        let err = RelayError::AnswerHandling {
            peer: PeerId::from("p1"),
            on: PeerId::from("p2"),
            cause: anyhow::anyhow!("wrong state"),
        };
        assert_eq!(err.code(), 645_167);

        let err = RelayError::Candidate {
            peer: PeerId::from("p1"),
            on: None,
            cause: anyhow::anyhow!("no remote description"),
        };
        assert_eq!(err.code(), 518_450);
    }

    #[test]
    fn test_error_display_names_the_peer() {
        let err = RelayError::MissingConnection {
            peer: PeerId::from("p1"),
            on: Some(PeerId::from("p9")),
        };
        let msg = err.to_string();
        assert!(msg.contains("p1"));
        assert!(msg.contains("p9"));
    }
}
