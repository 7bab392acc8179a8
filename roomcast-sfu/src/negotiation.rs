//! Negotiation engine
//!
//! Drives the offer/answer/candidate exchange per connection. Each
//! connection has exactly one offerer by construction: the relay offers on
//! the outbound connections it forwards media over, and only the origin
//! peer offers for its own inbound connection. That directionality is the
//! structural guard against offer/offer glare.
//!
//! Every failure here is wrapped into a coded [`RelayError`], published and
//! swallowed; the connection stays in whatever state the engine left it and
//! remains eligible for a later attempt.

use crate::engine::MediaConnection;
use crate::error::RelayError;
use crate::events::EventPublisher;
use crate::peer::PeerSession;
use crate::signaling::{SignalPayload, SignalingRelay};
use crate::types::{NamespaceId, PeerId};
use std::sync::Arc;
use tracing::debug;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

pub struct NegotiationEngine {
    relay: Arc<dyn SignalingRelay>,
    events: EventPublisher,
}

impl NegotiationEngine {
    pub fn new(relay: Arc<dyn SignalingRelay>, events: EventPublisher) -> Self {
        Self { relay, events }
    }

    /// Offer path: create an offer, apply it locally and relay it to the
    /// namespace, tagged with the forwarded peer's id when the connection
    /// is an outbound one.
    pub async fn negotiate(
        &self,
        conn: &Arc<dyn MediaConnection>,
        namespace: &NamespaceId,
        from: &PeerId,
        on: Option<&PeerId>,
    ) {
        debug!(namespace = %namespace, peer = %from, on = ?on, "negotiating");
        if let Err(cause) = self.try_negotiate(conn, namespace, from, on).await {
            self.events.publish_error(RelayError::Negotiation {
                peer: from.clone(),
                on: on.cloned(),
                cause,
            });
        }
    }

    async fn try_negotiate(
        &self,
        conn: &Arc<dyn MediaConnection>,
        namespace: &NamespaceId,
        from: &PeerId,
        on: Option<&PeerId>,
    ) -> anyhow::Result<()> {
        let offer = conn.create_offer().await?;
        conn.set_local_description(offer.clone()).await?;
        // relay whatever the engine settled on, not the pristine offer
        let data = conn.local_description().await.unwrap_or(offer);
        self.relay
            .send(
                namespace,
                SignalPayload::Sdp {
                    data,
                    on: on.cloned(),
                },
                from,
            )
            .await
    }

    /// Inbound offer: only the origin peer offers for its own upstream, so
    /// this always targets the sender's inbound connection. Apply the
    /// offer, answer it and relay the answer back untagged.
    pub async fn handle_offer(&self, session: &PeerSession, offer: RTCSessionDescription) {
        if let Err(cause) = self.try_handle_offer(session, offer).await {
            self.events.publish_error(RelayError::OfferHandling {
                peer: session.peer_id.clone(),
                cause,
            });
        }
    }

    async fn try_handle_offer(
        &self,
        session: &PeerSession,
        offer: RTCSessionDescription,
    ) -> anyhow::Result<()> {
        let conn = session.inbound();
        conn.set_remote_description(offer).await?;
        let answer = conn.create_answer().await?;
        conn.set_local_description(answer.clone()).await?;
        let data = conn.local_description().await.unwrap_or(answer);
        self.relay
            .send(
                &session.namespace,
                SignalPayload::Sdp { data, on: None },
                &session.peer_id,
            )
            .await
    }

    /// Inbound answer for the outbound connection named by the `on` tag. A
    /// missing tag or missing connection is a reported error, not a panic.
    pub async fn handle_answer(
        &self,
        session: &PeerSession,
        on: Option<PeerId>,
        answer: RTCSessionDescription,
    ) {
        let Some(on) = on else {
            self.events.publish_error(RelayError::MissingConnection {
                peer: session.peer_id.clone(),
                on: None,
            });
            return;
        };
        let Some(conn) = session.outbound_to(&on) else {
            self.events.publish_error(RelayError::MissingConnection {
                peer: session.peer_id.clone(),
                on: Some(on),
            });
            return;
        };
        if let Err(cause) = conn.set_remote_description(answer).await {
            self.events.publish_error(RelayError::AnswerHandling {
                peer: session.peer_id.clone(),
                on,
                cause,
            });
        }
    }

    /// Remote candidate: inbound connection when untagged, the tagged
    /// outbound connection otherwise. Early candidates the engine refuses
    /// to buffer come back as reported errors.
    pub async fn handle_candidate(
        &self,
        session: &PeerSession,
        on: Option<PeerId>,
        candidate: RTCIceCandidateInit,
    ) {
        let conn = match &on {
            Some(source) => match session.outbound_to(source) {
                Some(conn) => conn,
                None => {
                    self.events.publish_error(RelayError::MissingConnection {
                        peer: session.peer_id.clone(),
                        on,
                    });
                    return;
                }
            },
            None => session.inbound(),
        };
        if let Err(cause) = conn.add_ice_candidate(candidate).await {
            self.events.publish_error(RelayError::Candidate {
                peer: session.peer_id.clone(),
                on,
                cause,
            });
        }
    }

    /// Relay a locally gathered candidate to the namespace.
    pub async fn send_candidate(
        &self,
        namespace: &NamespaceId,
        from: &PeerId,
        on: Option<&PeerId>,
        candidate: RTCIceCandidateInit,
    ) {
        let payload = SignalPayload::Cdt {
            data: candidate,
            on: on.cloned(),
        };
        if let Err(cause) = self.relay.send(namespace, payload, from).await {
            self.events.publish_error(RelayError::RelaySend {
                namespace: namespace.clone(),
                peer: from.clone(),
                cause,
            });
        }
    }
}
