//! Connection graph manager
//!
//! Maintains the per-namespace graph invariant: every present peer owns one
//! inbound connection, and for every ordered pair of co-present peers there
//! is exactly one outbound connection forwarding the source peer's media
//! toward the other. Entries appear when peers join, are re-armed when
//! streams change, and disappear completely when either endpoint leaves.

use crate::engine::{ConnectionEvent, ConnectionFactory};
use crate::error::RelayError;
use crate::events::EventPublisher;
use crate::negotiation::NegotiationEngine;
use crate::peer::PeerSession;
use crate::room::Room;
use crate::types::{NamespaceId, PeerId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Hook receiving each new connection's engine-event stream, keyed by the
/// owning peer and, for outbound connections, the forwarded peer. The
/// lifecycle controller installs a hook that pumps events back into its
/// dispatcher; tests can install a no-op.
pub type PumpHook = Arc<
    dyn Fn(NamespaceId, PeerId, Option<PeerId>, mpsc::Receiver<ConnectionEvent>) + Send + Sync,
>;

pub struct GraphManager {
    factory: Arc<dyn ConnectionFactory>,
    negotiation: Arc<NegotiationEngine>,
    events: EventPublisher,
    ice_servers: Vec<String>,
    pump: PumpHook,
}

impl GraphManager {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        negotiation: Arc<NegotiationEngine>,
        events: EventPublisher,
        ice_servers: Vec<String>,
        pump: PumpHook,
    ) -> Self {
        Self {
            factory,
            negotiation,
            events,
            ice_servers,
            pump,
        }
    }

    /// Wire a newly entered peer into the namespace graph.
    ///
    /// Creates the peer's inbound connection, then for every peer already
    /// present: a connection pulling that peer's media toward the newcomer,
    /// and the reverse connection that will push the newcomer's media back.
    /// Both directions are armed and renegotiated immediately, so existing
    /// media reaches the newcomer without waiting for a re-offer. The two
    /// directions are independent; nothing orders them beyond this call.
    pub async fn add_peer(
        &self,
        room: &Arc<Room>,
        peer_id: PeerId,
    ) -> crate::error::Result<Arc<PeerSession>> {
        let (inbound, events) = self
            .factory
            .create_connection(&self.ice_servers)
            .await
            .map_err(|cause| RelayError::ConnectionSetup {
                namespace: room.id.clone(),
                peer: peer_id.clone(),
                cause,
            })?;

        let session = Arc::new(PeerSession::new(
            room.id.clone(),
            peer_id.clone(),
            inbound,
        ));
        if let Some(stale) = room.insert_peer(Arc::clone(&session)).await {
            // same id re-entered before the old session was torn down
            warn!(namespace = %room.id, peer = %peer_id, "displacing stale session");
            self.close_session(&stale).await;
        }
        (self.pump)(room.id.clone(), peer_id.clone(), None, events);

        for other in room.others(&peer_id).await {
            // pull the existing peer's media toward the newcomer
            self.attach_outbound(room, &session, other.peer_id.clone())
                .await;
            self.sync_outbound(&session, &other).await;

            // and prepare the newcomer's media for the existing peer
            self.attach_outbound(room, &other, peer_id.clone()).await;
            self.sync_outbound(&other, &session).await;
        }

        info!(
            namespace = %room.id,
            peer = %peer_id,
            others = session.outbound_count(),
            "peer wired into graph"
        );
        Ok(session)
    }

    /// Create the outbound connection on `owner` forwarding `source`'s
    /// media. Setup failures are reported and leave the pair unwired; the
    /// rest of the graph proceeds.
    async fn attach_outbound(&self, room: &Arc<Room>, owner: &Arc<PeerSession>, source: PeerId) {
        match self.factory.create_connection(&self.ice_servers).await {
            Ok((conn, events)) => {
                if let Some(stale) = owner.insert_outbound(source.clone(), conn) {
                    warn!(
                        namespace = %room.id,
                        peer = %owner.peer_id,
                        on = %source,
                        "displacing stale outbound connection"
                    );
                    stale.close().await;
                }
                (self.pump)(
                    room.id.clone(),
                    owner.peer_id.clone(),
                    Some(source),
                    events,
                );
            }
            Err(cause) => self.events.publish_error(RelayError::ConnectionSetup {
                namespace: room.id.clone(),
                peer: owner.peer_id.clone(),
                cause,
            }),
        }
    }

    /// Re-arm the owner's forwarding connection for `source` with the
    /// source's current stream: stale senders come off first, then the new
    /// tracks go on, then exactly one renegotiation is triggered.
    pub async fn sync_outbound(&self, owner: &Arc<PeerSession>, source: &Arc<PeerSession>) {
        let Some(conn) = owner.outbound_to(&source.peer_id) else {
            debug!(
                namespace = %owner.namespace,
                peer = %owner.peer_id,
                on = %source.peer_id,
                "no outbound connection to sync"
            );
            return;
        };

        for sender in conn.senders() {
            if let Err(cause) = conn.remove_track(&sender) {
                self.report_arming_failure(owner, source, cause);
            }
        }
        if let Some(stream) = source.stream() {
            for track in stream.tracks() {
                if let Err(cause) = conn.add_track(Arc::clone(&track), &stream) {
                    self.report_arming_failure(owner, source, cause);
                }
            }
        }

        self.negotiation
            .negotiate(&conn, &owner.namespace, &owner.peer_id, Some(&source.peer_id))
            .await;
    }

    /// Fan a peer's current stream out to every other present peer.
    pub async fn fan_out_stream(&self, room: &Arc<Room>, source: &Arc<PeerSession>) {
        for other in room.others(&source.peer_id).await {
            self.sync_outbound(&other, source).await;
        }
    }

    /// Tear a departing peer out of the graph: stop its stream's tracks,
    /// close the forwarding connections carrying its media at every other
    /// peer, close its own connections and drop it from the registry.
    /// Returns `None` when the peer was already gone, making departure
    /// idempotent.
    pub async fn remove_peer(
        &self,
        room: &Arc<Room>,
        peer_id: &PeerId,
    ) -> Option<Arc<PeerSession>> {
        let session = room.remove_peer(peer_id).await?;

        if let Some(stream) = session.stream() {
            for track in stream.tracks() {
                track.stop();
            }
        }
        for other in room.others(peer_id).await {
            if let Some(conn) = other.remove_outbound(peer_id) {
                conn.close().await;
            }
        }
        self.close_session(&session).await;

        info!(namespace = %room.id, peer = %peer_id, "peer removed from graph");
        Some(session)
    }

    async fn close_session(&self, session: &Arc<PeerSession>) {
        for (_, conn) in session.drain_outbound() {
            conn.close().await;
        }
        session.inbound().close().await;
    }

    fn report_arming_failure(
        &self,
        owner: &Arc<PeerSession>,
        source: &Arc<PeerSession>,
        cause: anyhow::Error,
    ) {
        self.events.publish_error(RelayError::Negotiation {
            peer: owner.peer_id.clone(),
            on: Some(source.peer_id.clone()),
            cause,
        });
    }
}
