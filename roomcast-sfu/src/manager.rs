//! Session lifecycle controller
//!
//! [`RelayManager`] is the top-level reactor: it consumes lifecycle
//! notifications and relayed envelopes from the signaling service,
//! translates them into registry/graph/negotiation calls, routes engine
//! events for every live connection, and republishes domain events through
//! the injected publisher.

use crate::config::RelayConfig;
use crate::engine::{ConnectionDirection, ConnectionEvent, ConnectionFactory, StateKind};
use crate::error::RelayError;
use crate::events::{EventPublisher, RelayEvent};
use crate::graph::{GraphManager, PumpHook};
use crate::negotiation::NegotiationEngine;
use crate::peer::PeerSession;
use crate::room::Room;
use crate::signaling::{Envelope, SignalPayload, SignalingNotification, SignalingRelay};
use crate::types::{NamespaceId, PeerId};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;

pub struct RelayManager {
    config: Arc<RelayConfig>,
    namespaces: DashMap<NamespaceId, Arc<Room>>,
    graph: Arc<GraphManager>,
    negotiation: Arc<NegotiationEngine>,
    relay: Arc<dyn SignalingRelay>,
    events: EventPublisher,
}

impl RelayManager {
    /// Build the relay. The engine factory, signaling relay and event
    /// publisher are injected; nothing here reaches for ambient state.
    pub fn new(
        config: RelayConfig,
        factory: Arc<dyn ConnectionFactory>,
        relay: Arc<dyn SignalingRelay>,
        events: EventPublisher,
    ) -> Arc<Self> {
        let negotiation = Arc::new(NegotiationEngine::new(Arc::clone(&relay), events.clone()));

        let manager = Arc::new_cyclic(move |weak: &Weak<Self>| {
            let pump_target = weak.clone();
            let pump: PumpHook = Arc::new(move |namespace, peer, on, rx| {
                let manager = pump_target.clone();
                tokio::spawn(async move {
                    Self::pump_connection(manager, namespace, peer, on, rx).await;
                });
            });
            let graph = Arc::new(GraphManager::new(
                factory,
                Arc::clone(&negotiation),
                events.clone(),
                config.ice_servers.clone(),
                pump,
            ));
            Self {
                config: Arc::new(config),
                namespaces: DashMap::new(),
                graph,
                negotiation,
                relay,
                events,
            }
        });

        info!(
            ice_servers = ?manager.config.ice_servers,
            max_peers_per_namespace = manager.config.max_peers_per_namespace,
            "relay manager initialized"
        );
        manager
    }

    /// React to one signaling notification.
    pub async fn handle_notification(&self, notification: SignalingNotification) {
        match notification {
            SignalingNotification::NamespaceCreated { namespace } => {
                self.create_namespace(namespace);
            }
            SignalingNotification::PeerEntered { namespace, peer } => {
                self.peer_entered(namespace, peer).await;
            }
            SignalingNotification::PeerLeft { namespace, peer } => {
                self.peer_left(&namespace, &peer).await;
            }
            SignalingNotification::EnvelopeToRelay { envelope } => {
                self.handle_envelope(envelope).await;
            }
        }
    }

    fn create_namespace(&self, namespace: NamespaceId) {
        info!(namespace = %namespace, "namespace created");
        self.namespaces
            .entry(namespace.clone())
            .or_insert_with(|| Arc::new(Room::new(namespace)));
    }

    async fn peer_entered(&self, namespace: NamespaceId, peer: PeerId) {
        // namespaces can have been pruned between creation and entry
        let room = Arc::clone(
            self.namespaces
                .entry(namespace.clone())
                .or_insert_with(|| Arc::new(Room::new(namespace.clone())))
                .value(),
        );

        let limit = self.config.max_peers_per_namespace;
        if limit > 0 && room.peer_count().await >= limit {
            warn!(namespace = %namespace, peer = %peer, limit, "namespace full, refusing peer");
            self.events.publish_error(RelayError::NamespaceFull {
                namespace: namespace.clone(),
                limit,
            });
            if let Err(cause) = self.relay.close_membership(&namespace, &peer).await {
                self.events.publish_error(RelayError::RelaySend {
                    namespace,
                    peer,
                    cause,
                });
            }
            return;
        }

        match self.graph.add_peer(&room, peer.clone()).await {
            Ok(session) => {
                info!(
                    namespace = %room.id,
                    peer = %peer,
                    peers = room.peer_count().await,
                    "peer entered"
                );
                self.events.publish(RelayEvent::PeerDidEnter {
                    peer: session.info(),
                });
            }
            Err(error) => self.events.publish_error(error),
        }
    }

    async fn peer_left(&self, namespace: &NamespaceId, peer: &PeerId) {
        let Some(room) = self.room(namespace) else {
            debug!(namespace = %namespace, peer = %peer, "departure from unknown namespace");
            return;
        };
        let Some(session) = self.graph.remove_peer(&room, peer).await else {
            debug!(namespace = %namespace, peer = %peer, "peer already departed");
            return;
        };

        if let Err(cause) = self.relay.close_membership(namespace, peer).await {
            self.events.publish_error(RelayError::RelaySend {
                namespace: namespace.clone(),
                peer: peer.clone(),
                cause,
            });
        }
        self.events.publish(RelayEvent::PeerDidLeave {
            peer: session.info(),
        });

        if self.config.prune_empty_namespaces && room.is_empty().await {
            self.namespaces.remove(namespace);
            debug!(namespace = %namespace, "pruned empty namespace");
        }
    }

    /// Handle an envelope from the namespace broadcast path. Envelopes
    /// addressed to a direct recipient belong to point-to-point delivery
    /// and are not ours; envelopes from senders we do not know are dropped
    /// after logging.
    async fn handle_envelope(&self, envelope: Envelope) {
        if envelope.to.is_some() {
            return;
        }
        let Some(payload) = envelope.payload else {
            return;
        };
        let Some(from) = envelope.from else {
            warn!(namespace = %envelope.namespace, "envelope without sender dropped");
            return;
        };
        let Some(session) = self.session(&envelope.namespace, &from).await else {
            warn!(
                namespace = %envelope.namespace,
                peer = %from,
                "envelope from unknown peer dropped"
            );
            return;
        };

        match payload {
            SignalPayload::Hello { .. } => {
                debug!(namespace = %envelope.namespace, peer = %from, "hello");
            }
            SignalPayload::Sdp { data, on } => match data.sdp_type {
                RTCSdpType::Offer => self.negotiation.handle_offer(&session, data).await,
                RTCSdpType::Answer => self.negotiation.handle_answer(&session, on, data).await,
                other => {
                    debug!(namespace = %envelope.namespace, peer = %from, sdp_type = %other, "ignoring sdp");
                }
            },
            SignalPayload::Cdt { data, on } => {
                self.negotiation.handle_candidate(&session, on, data).await;
            }
        }
    }

    /// Route one engine event for the identified connection.
    ///
    /// Every dispatch re-resolves namespace, session and connection through
    /// the registry; events for anything no longer registered are dropped.
    /// That check is what lets a departure race an in-flight negotiation
    /// without touching a closed connection.
    pub async fn dispatch_connection_event(
        &self,
        namespace: &NamespaceId,
        peer: &PeerId,
        on: Option<&PeerId>,
        event: ConnectionEvent,
    ) {
        let Some(room) = self.room(namespace) else {
            debug!(namespace = %namespace, "event for unknown namespace dropped");
            return;
        };
        let Some(session) = room.get(peer).await else {
            debug!(namespace = %namespace, peer = %peer, "event for departed peer dropped");
            return;
        };
        let conn = match on {
            Some(source) => match session.outbound_to(source) {
                Some(conn) => conn,
                None => {
                    debug!(
                        namespace = %namespace,
                        peer = %peer,
                        on = %source,
                        "event for closed outbound connection dropped"
                    );
                    return;
                }
            },
            None => session.inbound(),
        };

        match event {
            ConnectionEvent::IceCandidate(candidate) => {
                self.negotiation
                    .send_candidate(namespace, peer, on, candidate)
                    .await;
            }
            ConnectionEvent::NegotiationNeeded => {
                self.negotiation.negotiate(&conn, namespace, peer, on).await;
            }
            ConnectionEvent::StateChange { kind, value } => {
                if kind == StateKind::Connection && value == "disconnected" {
                    // observational only: membership truth stays with the
                    // signaling layer, which will report the departure
                    debug!(namespace = %namespace, peer = %peer, on = ?on, "connection disconnected");
                }
                let direction = if on.is_some() {
                    ConnectionDirection::Out
                } else {
                    ConnectionDirection::In
                };
                self.events.publish(RelayEvent::StateDidChange {
                    id: peer.clone(),
                    direction,
                    state: kind,
                    value,
                });
            }
            ConnectionEvent::Track(stream) => {
                if on.is_some() {
                    debug!(namespace = %namespace, peer = %peer, "track on outbound connection ignored");
                    return;
                }
                session.set_stream(stream);
                self.events.publish(RelayEvent::TrackDidAdd {
                    peer: session.info(),
                });
                self.graph.fan_out_stream(&room, &session).await;
            }
            ConnectionEvent::TrackRemoved => {
                if on.is_none() {
                    self.events.publish(RelayEvent::TrackDidRemove {
                        peer: session.info(),
                    });
                }
            }
        }
    }

    async fn pump_connection(
        manager: Weak<Self>,
        namespace: NamespaceId,
        peer: PeerId,
        on: Option<PeerId>,
        mut rx: mpsc::Receiver<ConnectionEvent>,
    ) {
        while let Some(event) = rx.recv().await {
            let Some(mgr) = manager.upgrade() else { break };
            mgr.dispatch_connection_event(&namespace, &peer, on.as_ref(), event)
                .await;
        }
        debug!(namespace = %namespace, peer = %peer, on = ?on, "connection event stream ended");
    }

    /// Subscribe to the relay's domain events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    /// Look up a peer session; `None` once the peer has departed.
    pub async fn session(
        &self,
        namespace: &NamespaceId,
        peer: &PeerId,
    ) -> Option<Arc<PeerSession>> {
        let room = self.room(namespace)?;
        room.get(peer).await
    }

    #[must_use]
    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    pub async fn peer_count(&self, namespace: &NamespaceId) -> usize {
        match self.room(namespace) {
            Some(room) => room.peer_count().await,
            None => 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    fn room(&self, namespace: &NamespaceId) -> Option<Arc<Room>> {
        self.namespaces
            .get(namespace)
            .map(|entry| Arc::clone(entry.value()))
    }
}
