//! Signaling boundary
//!
//! Wire types exchanged through the external signaling service, and the
//! outbound trait the relay uses to reach it. Negotiation messages travel
//! as namespace broadcasts; envelopes carrying an explicit direct recipient
//! belong to the point-to-point delivery path and are not handled here.

use crate::types::{NamespaceId, PeerId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Typed payload of a negotiation envelope.
///
/// `on` disambiguates which of the addressed peer's outbound connections a
/// message targets; untagged SDP and candidate messages refer to the peer's
/// inbound connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "word")]
pub enum SignalPayload {
    /// Presence probe sent by clients; carries no negotiation state.
    #[serde(rename = "HELLO")]
    Hello {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on: Option<PeerId>,
    },

    /// A session description (offer or answer).
    #[serde(rename = "SDP")]
    Sdp {
        data: RTCSessionDescription,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on: Option<PeerId>,
    },

    /// An ICE candidate.
    #[serde(rename = "CDT")]
    Cdt {
        data: RTCIceCandidateInit,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on: Option<PeerId>,
    },
}

/// A signaling message passing through the namespace broadcast relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub namespace: NamespaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<PeerId>,
    /// Direct-recipient marker used by point-to-point delivery; envelopes
    /// carrying it are ignored by the relay core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<SignalPayload>,
}

/// Lifecycle and relay notifications pushed by the signaling service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingNotification {
    NamespaceCreated {
        namespace: NamespaceId,
    },
    PeerEntered {
        namespace: NamespaceId,
        peer: PeerId,
    },
    PeerLeft {
        namespace: NamespaceId,
        peer: PeerId,
    },
    EnvelopeToRelay {
        envelope: Envelope,
    },
}

/// Outbound surface of the external signaling service.
#[async_trait]
pub trait SignalingRelay: Send + Sync {
    /// Broadcast a negotiation payload to the namespace on behalf of a peer.
    async fn send(
        &self,
        namespace: &NamespaceId,
        payload: SignalPayload,
        from: &PeerId,
    ) -> anyhow::Result<()>;

    /// Release a peer's signaling-layer membership after departure.
    async fn close_membership(&self, namespace: &NamespaceId, peer: &PeerId)
        -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;

    fn offer() -> RTCSessionDescription {
        let mut desc = RTCSessionDescription::default();
        desc.sdp_type = RTCSdpType::Offer;
        desc.sdp = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n".to_string();
        desc
    }

    #[test]
    fn test_sdp_payload_wire_shape() {
        let payload = SignalPayload::Sdp {
            data: offer(),
            on: Some(PeerId::from("p2")),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["word"], "SDP");
        assert_eq!(json["data"]["type"], "offer");
        assert!(json["data"]["sdp"].as_str().unwrap().starts_with("v=0"));
        assert_eq!(json["on"], "p2");
    }

    #[test]
    fn test_untagged_sdp_omits_on() {
        let payload = SignalPayload::Sdp {
            data: offer(),
            on: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("on").is_none());
    }

    #[test]
    fn test_candidate_payload_round_trip() {
        let payload = SignalPayload::Cdt {
            data: RTCIceCandidateInit {
                candidate: "candidate:1 1 UDP 2130706431 192.168.1.1 54321 typ host".to_string(),
                sdp_mid: Some("0".to_string()),
                sdp_mline_index: Some(0),
                username_fragment: None,
            },
            on: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["word"], "CDT");
        assert_eq!(json["data"]["sdpMid"], "0");

        let back: SignalPayload = serde_json::from_value(json).unwrap();
        match back {
            SignalPayload::Cdt { data, on } => {
                assert!(data.candidate.starts_with("candidate:1"));
                assert!(on.is_none());
            }
            other => panic!("expected CDT payload, got {other:?}"),
        }
    }

    #[test]
    fn test_hello_ignores_extra_fields() {
        let back: SignalPayload =
            serde_json::from_str(r#"{"word":"HELLO","data":{"whatever":1}}"#).unwrap();
        assert!(matches!(back, SignalPayload::Hello { on: None }));
    }

    #[test]
    fn test_envelope_optional_fields() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"namespace":"room1","from":"p1","payload":{"word":"HELLO"}}"#,
        )
        .unwrap();

        assert_eq!(envelope.namespace, NamespaceId::from("room1"));
        assert_eq!(envelope.from, Some(PeerId::from("p1")));
        assert!(envelope.to.is_none());
        assert!(matches!(envelope.payload, Some(SignalPayload::Hello { .. })));
    }
}
