//! Peer session records
//!
//! One [`PeerSession`] per connected participant: the single inbound
//! connection carrying the peer's media into the server, plus one outbound
//! connection per co-present peer forwarding that peer's media back out.

use crate::engine::{MediaConnection, MediaStream};
use crate::types::{NamespaceId, PeerId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Reduced peer record exposed in domain events. Connection handles never
/// leave the relay.
#[derive(Clone)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub stream: Option<Arc<dyn MediaStream>>,
}

impl fmt::Debug for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerInfo")
            .field("peer_id", &self.peer_id)
            .field("stream", &self.stream.as_ref().map(|s| s.id().to_string()))
            .finish()
    }
}

/// One connected participant and the connections it owns.
pub struct PeerSession {
    pub namespace: NamespaceId,
    pub peer_id: PeerId,
    inbound: Arc<dyn MediaConnection>,
    /// Outbound connections toward this peer, keyed by the peer whose media
    /// each of them forwards.
    outbound: RwLock<HashMap<PeerId, Arc<dyn MediaConnection>>>,
    /// Most recently received stream from the inbound connection.
    stream: RwLock<Option<Arc<dyn MediaStream>>>,
    pub joined_at: DateTime<Utc>,
}

impl PeerSession {
    pub fn new(namespace: NamespaceId, peer_id: PeerId, inbound: Arc<dyn MediaConnection>) -> Self {
        Self {
            namespace,
            peer_id,
            inbound,
            outbound: RwLock::new(HashMap::new()),
            stream: RwLock::new(None),
            joined_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn inbound(&self) -> Arc<dyn MediaConnection> {
        Arc::clone(&self.inbound)
    }

    /// The outbound connection forwarding `source`'s media to this peer.
    #[must_use]
    pub fn outbound_to(&self, source: &PeerId) -> Option<Arc<dyn MediaConnection>> {
        self.outbound.read().get(source).cloned()
    }

    /// Install the outbound connection for `source`, returning any
    /// connection it displaced.
    pub fn insert_outbound(
        &self,
        source: PeerId,
        conn: Arc<dyn MediaConnection>,
    ) -> Option<Arc<dyn MediaConnection>> {
        self.outbound.write().insert(source, conn)
    }

    pub fn remove_outbound(&self, source: &PeerId) -> Option<Arc<dyn MediaConnection>> {
        self.outbound.write().remove(source)
    }

    /// Remove and return every outbound connection.
    pub fn drain_outbound(&self) -> Vec<(PeerId, Arc<dyn MediaConnection>)> {
        self.outbound.write().drain().collect()
    }

    #[must_use]
    pub fn outbound_count(&self) -> usize {
        self.outbound.read().len()
    }

    #[must_use]
    pub fn outbound_sources(&self) -> Vec<PeerId> {
        self.outbound.read().keys().cloned().collect()
    }

    pub fn set_stream(&self, stream: Arc<dyn MediaStream>) {
        *self.stream.write() = Some(stream);
    }

    #[must_use]
    pub fn stream(&self) -> Option<Arc<dyn MediaStream>> {
        self.stream.read().clone()
    }

    #[must_use]
    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            peer_id: self.peer_id.clone(),
            stream: self.stream(),
        }
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        debug!(
            namespace = %self.namespace,
            peer = %self.peer_id,
            outbound = self.outbound.read().len(),
            "peer session dropped"
        );
    }
}
