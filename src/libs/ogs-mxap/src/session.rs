//! MBMS Session Registry
//!
//! Active MBMS sessions of one personality, keyed by the locally generated
//! session id. Each session keeps the peer-map (association id to the
//! peer's own session id) and at most one pending action timer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::error::{MxapError, MxapResult};
use crate::timer::{ActionTimer, ActionTimerMgr, TimerKind};
use crate::types::{AssocId, BearerQos, IpMcDistribution, ServiceAreaId, Tmgi};

/// Reserved "no session" id
pub const INVALID_MBMS_ID: u32 = 0;

/// MBMS session descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct MbmsSession {
    /// Locally generated session id (primary key)
    pub local_id: u32,
    pub tmgi: Tmgi,
    pub service_area_id: ServiceAreaId,
    pub bearer_qos: BearerQos,
    pub ip_mc_distribution: IpMcDistribution,
    /// Association id -> remote session id
    pub peer_map: HashMap<AssocId, u32>,
    pub action_timer: ActionTimer,
}

impl MbmsSession {
    pub fn new(local_id: u32, tmgi: Tmgi, service_area_id: ServiceAreaId) -> Self {
        Self {
            local_id,
            tmgi,
            service_area_id,
            bearer_qos: BearerQos::default(),
            ip_mc_distribution: IpMcDistribution::default(),
            peer_map: HashMap::new(),
            action_timer: ActionTimer::inactive(),
        }
    }

    pub fn remote_id(&self, assoc_id: AssocId) -> Option<u32> {
        self.peer_map.get(&assoc_id).copied()
    }

    pub fn has_peer(&self, assoc_id: AssocId) -> bool {
        self.peer_map.contains_key(&assoc_id)
    }

    /// Peer-map associations in ascending order
    pub fn peer_assocs(&self) -> Vec<AssocId> {
        let mut assocs: Vec<AssocId> = self.peer_map.keys().copied().collect();
        assocs.sort_unstable();
        assocs
    }

    /// Neither a peer nor a pending action keeps this session alive
    pub fn is_idle(&self) -> bool {
        self.peer_map.is_empty() && !self.action_timer.is_active()
    }
}

impl fmt::Display for MbmsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} TMGI {} SAI {}", self.local_id, self.tmgi, self.service_area_id)
    }
}

/// Session registry of one personality
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u32, MbmsSession>>,
    next_id: AtomicU32,
    /// Valid bits of a local session id
    id_mask: u32,
    max_sessions: usize,
    timers: ActionTimerMgr,
}

impl SessionRegistry {
    pub fn new(id_mask: u32, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            id_mask,
            max_sessions,
            timers: ActionTimerMgr::new(),
        }
    }

    pub fn timers(&self) -> &ActionTimerMgr {
        &self.timers
    }

    /// Next id from the counter, wrapping within the id width and
    /// skipping the reserved zero.
    fn generate_id(&self) -> u32 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) & self.id_mask;
            if id != INVALID_MBMS_ID {
                return id;
            }
        }
    }

    /// Create a session with a fresh local id. (TMGI, SAI) uniqueness is
    /// the caller's job.
    pub fn new_session(&self, tmgi: Tmgi, service_area_id: ServiceAreaId) -> MxapResult<MbmsSession> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.len() >= self.max_sessions {
            return Err(MxapError::SessionLimit(self.max_sessions));
        }
        let local_id = self.generate_id();
        if sessions.contains_key(&local_id) {
            return Err(MxapError::DuplicateSession(local_id));
        }
        let session = MbmsSession::new(local_id, tmgi, service_area_id);
        sessions.insert(local_id, session.clone());
        Ok(session)
    }

    pub fn find(&self, local_id: u32) -> Option<MbmsSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&local_id)
            .cloned()
    }

    pub fn find_by_tmgi_and_sai(&self, tmgi: &Tmgi, sai: ServiceAreaId) -> Option<MbmsSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|s| s.tmgi == *tmgi && s.service_area_id == sai)
            .cloned()
    }

    /// Mutate a session in place
    pub fn update<R>(&self, local_id: u32, f: impl FnOnce(&mut MbmsSession) -> R) -> Option<R> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&local_id)
            .map(f)
    }

    /// Record a peer's acceptance. An association already in the peer-map
    /// is a bookkeeping desync.
    pub fn insert_peer(&self, local_id: u32, assoc_id: AssocId, remote_id: u32) -> MxapResult<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions
            .get_mut(&local_id)
            .ok_or(MxapError::SessionNotFound(local_id))?;
        if session.peer_map.contains_key(&assoc_id) {
            return Err(MxapError::PeerMapConflict { local_id, assoc_id });
        }
        session.peer_map.insert(assoc_id, remote_id);
        Ok(())
    }

    /// Drop one association from a session; returns its remote id
    pub fn remove_peer(&self, local_id: u32, assoc_id: AssocId) -> Option<u32> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&local_id)
            .and_then(|s| s.peer_map.remove(&assoc_id))
    }

    /// Drop an association from every session; returns the affected ids
    pub fn remove_assoc_everywhere(&self, assoc_id: AssocId) -> Vec<u32> {
        let mut affected: Vec<u32> = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .values_mut()
            .filter_map(|s| s.peer_map.remove(&assoc_id).map(|_| s.local_id))
            .collect();
        affected.sort_unstable();
        affected
    }

    /// Number of sessions whose peer-map holds `assoc_id`
    pub fn sessions_with_peer(&self, assoc_id: AssocId) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.peer_map.contains_key(&assoc_id))
            .count()
    }

    /// Arm the session's action timer, replacing any pending one
    pub fn arm_timer(
        &self,
        local_id: u32,
        kind: TimerKind,
        delay: Duration,
        now: Instant,
    ) -> MxapResult<u64> {
        let previous = self
            .find(local_id)
            .ok_or(MxapError::SessionNotFound(local_id))?
            .action_timer;
        if previous.is_active() {
            self.timers.cancel(previous.id);
        }
        let id = self.timers.start(kind, local_id, delay, now);
        self.update(local_id, |s| s.action_timer = ActionTimer { id, kind: Some(kind) });
        Ok(id)
    }

    /// Clear the session's timer handle and cancel the timer if still armed
    pub fn disarm_timer(&self, local_id: u32) {
        if let Some(timer) = self.update(local_id, |s| std::mem::take(&mut s.action_timer)) {
            if timer.is_active() {
                self.timers.cancel(timer.id);
            }
        }
    }

    /// Remove a session, releasing its timer. The peer-map goes with it;
    /// peer bookkeeping is the caller's job.
    pub fn remove(&self, local_id: u32) -> Option<MbmsSession> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&local_id);
        if let Some(session) = &removed {
            if session.action_timer.is_active() {
                self.timers.cancel(session.action_timer.id);
            }
        }
        removed
    }

    /// All sessions ordered by id
    pub fn all(&self) -> Vec<MbmsSession> {
        let mut all: Vec<MbmsSession> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by_key(|s| s.local_id);
        all
    }

    pub fn count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear(&self) {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.timers.clear();
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.count())
            .field("max_sessions", &self.max_sessions)
            .field("timers", &self.timers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlmnId;

    fn tmgi(service_id: u32) -> Tmgi {
        Tmgi::new(PlmnId::new(208, 1, 2), service_id)
    }

    #[test]
    fn test_new_session_ids_are_unique() {
        let reg = SessionRegistry::new(0xffff, 16);
        let a = reg.new_session(tmgi(1), 100).unwrap();
        let b = reg.new_session(tmgi(1), 101).unwrap();
        assert_ne!(a.local_id, b.local_id);
        assert_eq!(reg.count(), 2);
        assert_eq!(reg.find_by_tmgi_and_sai(&tmgi(1), 101).unwrap().local_id, b.local_id);
        assert!(reg.find_by_tmgi_and_sai(&tmgi(2), 100).is_none());
    }

    #[test]
    fn test_id_wraps_within_width() {
        let reg = SessionRegistry::new(0x3, 16);
        let ids: Vec<u32> = (0..3)
            .map(|i| {
                let s = reg.new_session(tmgi(i), 1).unwrap();
                reg.remove(s.local_id);
                s.local_id
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        // counter is now 4, masked to 0 which is reserved
        assert_eq!(reg.new_session(tmgi(9), 1).unwrap().local_id, 1);
    }

    #[test]
    fn test_live_id_collision_is_rejected() {
        let reg = SessionRegistry::new(0x1, 16);
        assert_eq!(reg.new_session(tmgi(1), 1).unwrap().local_id, 1);
        assert_eq!(reg.new_session(tmgi(2), 1).unwrap_err(), MxapError::DuplicateSession(1));
    }

    #[test]
    fn test_session_limit() {
        let reg = SessionRegistry::new(0xffff, 1);
        reg.new_session(tmgi(1), 1).unwrap();
        assert_eq!(reg.new_session(tmgi(2), 1).unwrap_err(), MxapError::SessionLimit(1));
    }

    #[test]
    fn test_peer_map() {
        let reg = SessionRegistry::new(0xffff, 16);
        let s = reg.new_session(tmgi(1), 100).unwrap();
        reg.insert_peer(s.local_id, 10, 7).unwrap();
        assert_eq!(
            reg.insert_peer(s.local_id, 10, 8).unwrap_err(),
            MxapError::PeerMapConflict { local_id: s.local_id, assoc_id: 10 }
        );
        assert_eq!(reg.find(s.local_id).unwrap().remote_id(10), Some(7));
        assert_eq!(reg.sessions_with_peer(10), 1);
        assert_eq!(reg.remove_peer(s.local_id, 10), Some(7));
        assert_eq!(reg.remove_peer(s.local_id, 10), None);
        assert!(reg.find(s.local_id).unwrap().is_idle());
    }

    #[test]
    fn test_remove_assoc_everywhere() {
        let reg = SessionRegistry::new(0xffff, 16);
        let a = reg.new_session(tmgi(1), 100).unwrap();
        let b = reg.new_session(tmgi(2), 100).unwrap();
        reg.insert_peer(a.local_id, 10, 1).unwrap();
        reg.insert_peer(b.local_id, 10, 2).unwrap();
        reg.insert_peer(b.local_id, 11, 3).unwrap();
        assert_eq!(reg.remove_assoc_everywhere(10), vec![a.local_id, b.local_id]);
        assert_eq!(reg.find(b.local_id).unwrap().peer_assocs(), vec![11]);
    }

    #[test]
    fn test_remove_cancels_timer() {
        let reg = SessionRegistry::new(0xffff, 16);
        let s = reg.new_session(tmgi(1), 100).unwrap();
        let now = Instant::now();
        let first = reg
            .arm_timer(s.local_id, TimerKind::DeferredStart, Duration::from_secs(5), now)
            .unwrap();
        let second = reg
            .arm_timer(s.local_id, TimerKind::DeferredUpdate, Duration::from_secs(5), now)
            .unwrap();
        assert!(!reg.timers().exists(first));
        assert!(reg.timers().exists(second));

        reg.remove(s.local_id);
        assert_eq!(reg.timers().count(), 0);
    }

    #[test]
    fn test_disarm_timer() {
        let reg = SessionRegistry::new(0xffff, 16);
        let s = reg.new_session(tmgi(1), 100).unwrap();
        let id = reg
            .arm_timer(s.local_id, TimerKind::DeferredStart, Duration::from_secs(5), Instant::now())
            .unwrap();
        reg.disarm_timer(s.local_id);
        assert!(!reg.timers().exists(id));
        assert!(!reg.find(s.local_id).unwrap().action_timer.is_active());
    }
}
