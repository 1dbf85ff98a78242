//! Action Timer Registry
//!
//! One-shot timers that defer a session start or update to an absolute
//! time. Each entry is a typed `(kind, session id)` pair indexed by timer
//! id; the personality task polls `next_expiration()` and turns every
//! drained entry into a `TimerExpired` event.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Timer id value meaning "no timer"
pub const TIMER_INACTIVE: u64 = 0;

/// What a session's action timer does on expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    DeferredStart,
    DeferredUpdate,
}

/// Handle kept in the session descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionTimer {
    pub id: u64,
    pub kind: Option<TimerKind>,
}

impl ActionTimer {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.id != TIMER_INACTIVE
    }
}

/// A fired action timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpiry {
    pub timer_id: u64,
    pub kind: TimerKind,
    pub session_id: u32,
}

#[derive(Debug, Clone)]
struct TimerEntry {
    kind: TimerKind,
    session_id: u32,
    expires_at: Instant,
}

/// Action timers of one personality
pub struct ActionTimerMgr {
    timers: RwLock<HashMap<u64, TimerEntry>>,
    next_id: AtomicU64,
}

impl ActionTimerMgr {
    pub fn new() -> Self {
        Self {
            timers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Arm a one-shot timer firing `delay` after `now`
    pub fn start(&self, kind: TimerKind, session_id: u32, delay: Duration, now: Instant) -> u64 {
        let mut id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if id == TIMER_INACTIVE {
            id = self.next_id.fetch_add(1, Ordering::SeqCst);
        }
        let expires_at = now.checked_add(delay).unwrap_or(now);
        self.timers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, TimerEntry { kind, session_id, expires_at });
        log::debug!(
            "Action timer started: id={id} kind={kind:?} session={session_id:#x} delay={delay:?}"
        );
        id
    }

    /// Cancel a timer; returns false when it already fired or never existed.
    pub fn cancel(&self, id: u64) -> bool {
        let removed = self
            .timers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(entry) => {
                log::debug!(
                    "Action timer cancelled: id={id} kind={:?} session={:#x}",
                    entry.kind,
                    entry.session_id
                );
                true
            }
            None => false,
        }
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn process_expired(&self, now: Instant) -> Vec<TimerExpiry> {
        let mut timers = self.timers.write().unwrap_or_else(PoisonError::into_inner);
        let mut due: Vec<(Instant, u64)> = timers
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(id, e)| (e.expires_at, *id))
            .collect();
        due.sort();
        due.into_iter()
            .filter_map(|(_, id)| {
                timers.remove(&id).map(|e| TimerExpiry {
                    timer_id: id,
                    kind: e.kind,
                    session_id: e.session_id,
                })
            })
            .collect()
    }

    /// Earliest deadline, if any timer is armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| e.expires_at)
            .min()
    }

    /// Time until the earliest deadline, zero when already due
    pub fn next_expiration(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|at| at.saturating_duration_since(now))
    }

    pub fn exists(&self, id: u64) -> bool {
        self.timers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.timers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear(&self) {
        self.timers.write().unwrap_or_else(PoisonError::into_inner).clear();
        log::debug!("Action timers cleared");
    }
}

impl Default for ActionTimerMgr {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionTimerMgr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTimerMgr")
            .field("armed", &self.count())
            .finish()
    }
}
