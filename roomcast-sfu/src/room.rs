//! Namespace registry
//!
//! Per-namespace mapping of peer identity to session record. Departure and
//! message handling race against each other, so every lookup returns an
//! `Option` and callers treat absence as a handled condition, not a bug.

use crate::peer::PeerSession;
use crate::types::{NamespaceId, PeerId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The peers currently present in one namespace.
///
/// All mutations go through the write lock, giving single-writer semantics
/// per namespace.
pub struct Room {
    pub id: NamespaceId,
    peers: RwLock<HashMap<PeerId, Arc<PeerSession>>>,
}

impl Room {
    #[must_use]
    pub fn new(id: NamespaceId) -> Self {
        Self {
            id,
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session, returning any session it displaced.
    pub async fn insert_peer(&self, session: Arc<PeerSession>) -> Option<Arc<PeerSession>> {
        self.peers
            .write()
            .await
            .insert(session.peer_id.clone(), session)
    }

    /// Remove a peer. `None` means the peer already left; departure is
    /// idempotent on top of this.
    pub async fn remove_peer(&self, peer: &PeerId) -> Option<Arc<PeerSession>> {
        self.peers.write().await.remove(peer)
    }

    pub async fn get(&self, peer: &PeerId) -> Option<Arc<PeerSession>> {
        self.peers.read().await.get(peer).cloned()
    }

    /// All sessions in the namespace except the given peer's.
    pub async fn others(&self, peer: &PeerId) -> Vec<Arc<PeerSession>> {
        self.peers
            .read()
            .await
            .values()
            .filter(|session| session.peer_id != *peer)
            .cloned()
            .collect()
    }

    pub async fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.read().await.keys().cloned().collect()
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
