//! Peer Registry
//!
//! Connected eNBs (M2AP) or MCEs (M3AP), keyed by SCTP association id.
//! The registry keeps only an aggregate session count per peer; the
//! session-to-peer relation itself lives in the session peer-maps.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::session::SessionRegistry;
use crate::types::{AssocId, MbsfnArea, ServiceAreaId, StreamId};

/// Peer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerState {
    /// Association up, setup not completed
    #[default]
    Init,
    /// Setup completed
    Ready,
    /// Association reset, waiting for session references to drop
    Resetting,
    /// Association closed, waiting for session references to drop
    Shutdown,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerState::Init => write!(f, "INIT"),
            PeerState::Ready => write!(f, "READY"),
            PeerState::Resetting => write!(f, "RESETTING"),
            PeerState::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Peer descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MxapPeer {
    pub assoc_id: AssocId,
    /// Global eNB / MCE id, bound at setup
    pub peer_id: Option<u32>,
    pub name: Option<String>,
    /// Admitted service areas
    pub service_areas: Vec<ServiceAreaId>,
    /// MBSFN areas assigned by MCE_APP
    pub mbsfn_areas: Vec<MbsfnArea>,
    pub local_mbms_area: u8,
    pub state: PeerState,
    /// Sessions whose peer-map holds this association
    pub active_session_count: u32,
    pub in_streams: StreamId,
    pub out_streams: StreamId,
}

impl MxapPeer {
    pub fn new(assoc_id: AssocId, in_streams: StreamId, out_streams: StreamId) -> Self {
        Self {
            assoc_id,
            in_streams,
            out_streams,
            ..Default::default()
        }
    }

    pub fn serves(&self, sai: ServiceAreaId) -> bool {
        self.service_areas.contains(&sai)
    }

    /// Stream for MBMS-service-associated signalling
    pub fn mbms_stream(&self) -> StreamId {
        if self.out_streams > 1 {
            crate::MBMS_SERVICE_STREAM
        } else {
            crate::NON_MBMS_STREAM
        }
    }
}

/// What a decrement did to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Peer is gone or was never there
    Missing,
    /// Count went down, peer unchanged otherwise
    Decremented(u32),
    /// Count hit zero and a resetting peer went back to INIT
    BackToInit,
    /// Count hit zero and a shut-down peer was deleted
    Removed,
    /// Count was already zero
    Underflow,
}

/// Peer registry of one personality
pub struct PeerRegistry {
    peers: RwLock<HashMap<AssocId, MxapPeer>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new association. A known peer restarts from INIT and must
    /// run setup again. A peer still being torn down under the same
    /// association is not reused; `None` is returned instead.
    pub fn register_new_peer(
        &self,
        assoc_id: AssocId,
        in_streams: StreamId,
        out_streams: StreamId,
    ) -> Option<MxapPeer> {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = peers.get_mut(&assoc_id) {
            if matches!(existing.state, PeerState::Resetting | PeerState::Shutdown) {
                return None;
            }
            existing.state = PeerState::Init;
            existing.in_streams = in_streams;
            existing.out_streams = out_streams;
            return Some(existing.clone());
        }
        let peer = MxapPeer::new(assoc_id, in_streams, out_streams);
        peers.insert(assoc_id, peer.clone());
        Some(peer)
    }

    pub fn find(&self, assoc_id: AssocId) -> Option<MxapPeer> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&assoc_id)
            .cloned()
    }

    pub fn find_by_peer_id(&self, peer_id: u32) -> Option<MxapPeer> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|p| p.peer_id == Some(peer_id))
            .cloned()
    }

    pub fn update<R>(&self, assoc_id: AssocId, f: impl FnOnce(&mut MxapPeer) -> R) -> Option<R> {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&assoc_id)
            .map(f)
    }

    fn select(&self, pred: impl Fn(&MxapPeer) -> bool) -> Vec<MxapPeer> {
        let mut peers: Vec<MxapPeer> = self
            .peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|p| pred(p))
            .cloned()
            .collect();
        peers.sort_by_key(|p| p.assoc_id);
        peers
    }

    /// Setup-complete peers serving `sai`, ordered by association
    pub fn matching_service_area(&self, sai: ServiceAreaId) -> Vec<MxapPeer> {
        self.select(|p| p.state == PeerState::Ready && p.serves(sai))
    }

    /// Peers not serving `sai`, ordered by association
    pub fn not_matching_service_area(&self, sai: ServiceAreaId) -> Vec<MxapPeer> {
        self.select(|p| !(p.state == PeerState::Ready && p.serves(sai)))
    }

    pub fn increment_session_count(&self, assoc_id: AssocId) -> Option<u32> {
        self.update(assoc_id, |p| {
            p.active_session_count += 1;
            p.active_session_count
        })
    }

    /// Drop one session reference. Reaching zero moves a resetting peer
    /// back to INIT and deletes a shut-down peer.
    pub fn decrement_session_count(&self, assoc_id: AssocId) -> DecrementOutcome {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(peer) = peers.get_mut(&assoc_id) else {
            return DecrementOutcome::Missing;
        };
        if peer.active_session_count == 0 {
            debug_assert!(false, "session count underflow on association {assoc_id}");
            log::error!("Session count underflow on association {assoc_id}");
            return DecrementOutcome::Underflow;
        }
        peer.active_session_count -= 1;
        if peer.active_session_count > 0 {
            return DecrementOutcome::Decremented(peer.active_session_count);
        }
        let state = peer.state;
        match state {
            PeerState::Resetting => {
                peer.state = PeerState::Init;
                log::info!("Peer on association {assoc_id} idle, back to INIT");
                DecrementOutcome::BackToInit
            }
            PeerState::Shutdown => {
                peers.remove(&assoc_id);
                log::info!("Peer on association {assoc_id} released");
                DecrementOutcome::Removed
            }
            _ => DecrementOutcome::Decremented(0),
        }
    }

    /// Drop this association from every session without signalling, then
    /// zero the session count. Returns the affected session ids.
    pub fn full_reset(&self, assoc_id: AssocId, sessions: &SessionRegistry) -> Vec<u32> {
        let affected = sessions.remove_assoc_everywhere(assoc_id);
        for _ in &affected {
            self.decrement_session_count(assoc_id);
        }
        self.update(assoc_id, |p| {
            if p.active_session_count != 0 {
                log::warn!(
                    "Association {assoc_id} count {} left after reset, clearing",
                    p.active_session_count
                );
                p.active_session_count = 0;
            }
            if p.state == PeerState::Resetting {
                p.state = PeerState::Init;
            }
        });
        affected
    }

    /// Transport teardown: cascade `full_reset`, then delete the entry.
    /// Absent ids are a no-op.
    pub fn remove(&self, assoc_id: AssocId, sessions: &SessionRegistry) -> Option<MxapPeer> {
        let peer = self.update(assoc_id, |p| {
            p.state = PeerState::Shutdown;
            p.clone()
        })?;
        self.full_reset(assoc_id, sessions);
        // the last decrement may already have released the entry
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&assoc_id);
        Some(peer)
    }

    /// All peers ordered by association
    pub fn all(&self) -> Vec<MxapPeer> {
        self.select(|_| true)
    }

    pub fn count(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn ready_count(&self) -> usize {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|p| p.state == PeerState::Ready)
            .count()
    }

    pub fn clear(&self) {
        self.peers.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PeerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerRegistry")
            .field("peers", &self.count())
            .field("ready", &self.ready_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlmnId, Tmgi};

    fn ready_peer(reg: &PeerRegistry, assoc_id: AssocId, areas: &[ServiceAreaId]) {
        reg.register_new_peer(assoc_id, 2, 2).unwrap();
        reg.update(assoc_id, |p| {
            p.service_areas = areas.to_vec();
            p.state = PeerState::Ready;
        });
    }

    #[test]
    fn test_register_and_lookup() {
        let reg = PeerRegistry::new();
        let peer = reg.register_new_peer(5, 2, 2).unwrap();
        assert_eq!(peer.state, PeerState::Init);
        assert_eq!(peer.active_session_count, 0);
        reg.update(5, |p| p.peer_id = Some(0x1234));
        assert_eq!(reg.find_by_peer_id(0x1234).unwrap().assoc_id, 5);
        assert!(reg.find_by_peer_id(1).is_none());
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn test_register_rejected_during_teardown() {
        let reg = PeerRegistry::new();
        reg.register_new_peer(5, 2, 2).unwrap();
        reg.update(5, |p| p.state = PeerState::Resetting);
        assert!(reg.register_new_peer(5, 2, 2).is_none());
        reg.update(5, |p| p.state = PeerState::Shutdown);
        assert!(reg.register_new_peer(5, 2, 2).is_none());
        reg.update(5, |p| p.state = PeerState::Ready);
        assert!(reg.register_new_peer(5, 4, 4).is_some());
        let peer = reg.find(5).unwrap();
        assert_eq!(peer.out_streams, 4);
        assert_eq!(peer.state, PeerState::Init);
    }

    #[test]
    fn test_service_area_selection() {
        let reg = PeerRegistry::new();
        ready_peer(&reg, 2, &[100, 101]);
        ready_peer(&reg, 1, &[100]);
        ready_peer(&reg, 3, &[200]);
        reg.register_new_peer(4, 2, 2).unwrap();
        reg.update(4, |p| p.service_areas = vec![100]);

        let matching: Vec<AssocId> = reg.matching_service_area(100).iter().map(|p| p.assoc_id).collect();
        assert_eq!(matching, vec![1, 2]);
        let others: Vec<AssocId> =
            reg.not_matching_service_area(100).iter().map(|p| p.assoc_id).collect();
        assert_eq!(others, vec![3, 4]);
    }

    #[test]
    fn test_decrement_transitions() {
        let reg = PeerRegistry::new();
        reg.register_new_peer(1, 2, 2).unwrap();
        reg.increment_session_count(1);
        reg.increment_session_count(1);
        reg.update(1, |p| p.state = PeerState::Resetting);
        assert_eq!(reg.decrement_session_count(1), DecrementOutcome::Decremented(1));
        assert_eq!(reg.decrement_session_count(1), DecrementOutcome::BackToInit);
        assert_eq!(reg.find(1).unwrap().state, PeerState::Init);

        reg.increment_session_count(1);
        reg.update(1, |p| p.state = PeerState::Shutdown);
        assert_eq!(reg.decrement_session_count(1), DecrementOutcome::Removed);
        assert!(reg.find(1).is_none());
        assert_eq!(reg.decrement_session_count(1), DecrementOutcome::Missing);
    }

    #[test]
    fn test_full_reset_and_remove() {
        let reg = PeerRegistry::new();
        let sessions = SessionRegistry::new(0xffff, 16);
        ready_peer(&reg, 1, &[100]);
        ready_peer(&reg, 2, &[100]);
        let tmgi = Tmgi::new(PlmnId::new(208, 1, 2), 5);
        for sai in [100, 101] {
            let s = sessions.new_session(tmgi, sai).unwrap();
            for assoc in [1, 2] {
                sessions.insert_peer(s.local_id, assoc, 9).unwrap();
                reg.increment_session_count(assoc);
            }
        }

        assert_eq!(reg.full_reset(1, &sessions).len(), 2);
        assert_eq!(reg.find(1).unwrap().active_session_count, 0);
        assert_eq!(reg.find(1).unwrap().state, PeerState::Ready);
        assert_eq!(sessions.sessions_with_peer(1), 0);

        let removed = reg.remove(2, &sessions).unwrap();
        assert_eq!(removed.active_session_count, 2);
        assert!(reg.find(2).is_none());
        assert_eq!(sessions.sessions_with_peer(2), 0);
        assert_eq!(sessions.count(), 2);

        assert!(reg.remove(2, &sessions).is_none());
    }
}
