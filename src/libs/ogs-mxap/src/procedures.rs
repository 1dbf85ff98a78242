//! MBMS Session Procedures
//!
//! Start, update and stop requests from MCE_APP and the action-timer
//! expiry that resumes a deferred start or update. Every step looks the
//! session up again before touching it.

use std::time::{Instant, SystemTime};

use crate::context::MxapContext;
use crate::error::{MxapError, MxapResult};
use crate::event::{MbmsSessionStartReq, MbmsSessionStopReq, MbmsSessionUpdateReq};
use crate::personality::Personality;
use crate::timer::{ActionTimer, TimerExpiry, TimerKind};
use crate::types::{AbsoluteTime, AssocId, ServiceAreaId, StreamId};

impl<P: Personality> MxapContext<P> {
    // ========================================================================
    // Session Start
    // ========================================================================

    pub fn handle_session_start_request(&self, req: &MbmsSessionStartReq) -> MxapResult<()> {
        if let Some(old) = self
            .sessions()
            .find_by_tmgi_and_sai(&req.tmgi, req.service_area_id)
        {
            log::warn!(
                "[{}] session {old} restarted, stopping the existing one first",
                P::NAME
            );
            self.stop_session(old.local_id, true);
        }

        if self
            .peers()
            .matching_service_area(req.service_area_id)
            .is_empty()
        {
            log::warn!(
                "[{}] no peer serves SAI {}, start of TMGI {} dropped",
                P::NAME,
                req.service_area_id,
                req.tmgi
            );
            return Ok(());
        }

        let session = self.sessions().new_session(req.tmgi, req.service_area_id)?;
        let local_id = session.local_id;
        self.sessions().update(local_id, |s| {
            s.bearer_qos = req.bearer_qos;
            s.ip_mc_distribution = req.ip_mc_distribution;
        });
        log::info!(
            "[{}] session {session} created ({} sessions)",
            P::NAME,
            self.sessions().count()
        );

        if self.defer(local_id, TimerKind::DeferredStart, &req.abs_start_time) {
            return Ok(());
        }
        self.start_fanout(local_id)
    }

    /// Arm the session's action timer when `at` lies in the future.
    /// Returns false when the action must run now.
    fn defer(&self, local_id: u32, kind: TimerKind, at: &AbsoluteTime) -> bool {
        let Some(delay) = at.delay_from(SystemTime::now()) else {
            return false;
        };
        if delay.is_zero() {
            log::debug!(
                "[{}] {kind:?} time of session {local_id:#x} already passed",
                P::NAME
            );
            return false;
        }
        match self.sessions().arm_timer(local_id, kind, delay, Instant::now()) {
            Ok(timer_id) => {
                log::info!(
                    "[{}] {kind:?} of session {local_id:#x} in {delay:?} (timer {timer_id})",
                    P::NAME
                );
                true
            }
            Err(e) => {
                log::error!("[{}] cannot arm timer for session {local_id:#x}: {e}", P::NAME);
                false
            }
        }
    }

    /// Send a session start to every covering peer not yet in the
    /// peer-map. One encoded buffer serves the whole round.
    fn start_fanout(&self, local_id: u32) -> MxapResult<()> {
        let session = self
            .sessions()
            .find(local_id)
            .ok_or(MxapError::SessionNotFound(local_id))?;
        let peers = self.peers().matching_service_area(session.service_area_id);
        if peers.is_empty() {
            log::warn!(
                "[{}] no peer serves session {session} any more, removing it",
                P::NAME
            );
            self.remove_session(local_id);
            return Ok(());
        }

        let payload = match P::encode_start(&session) {
            Ok(payload) => payload,
            Err(e) => {
                self.remove_session(local_id);
                return Err(e);
            }
        };
        for peer in peers.iter().filter(|p| !session.has_peer(p.assoc_id)) {
            match self.send(peer.assoc_id, peer.mbms_stream(), payload.clone()) {
                Ok(()) => log::debug!(
                    "[{}] session start {local_id:#x} sent to association {}",
                    P::NAME,
                    peer.assoc_id
                ),
                Err(e) => log::error!(
                    "[{}] session start {local_id:#x} to association {}: {e}",
                    P::NAME,
                    peer.assoc_id
                ),
            }
        }
        Ok(())
    }

    // ========================================================================
    // Session Update
    // ========================================================================

    pub fn handle_session_update_request(&self, req: &MbmsSessionUpdateReq) -> MxapResult<()> {
        let Some(session) = self
            .sessions()
            .find_by_tmgi_and_sai(&req.tmgi, req.old_service_area_id)
        else {
            log::error!(
                "[{}] no session for TMGI {} SAI {}, update ignored",
                P::NAME,
                req.tmgi,
                req.old_service_area_id
            );
            return Ok(());
        };
        let local_id = session.local_id;

        if req.new_service_area_id != req.old_service_area_id {
            if let Some(other) = self
                .sessions()
                .find_by_tmgi_and_sai(&req.tmgi, req.new_service_area_id)
            {
                log::warn!(
                    "[{}] session {other} superseded by update of {session}",
                    P::NAME
                );
                self.stop_session(other.local_id, true);
            }
        }

        self.sessions().update(local_id, |s| {
            s.bearer_qos = req.bearer_qos;
            s.ip_mc_distribution = req.ip_mc_distribution;
        });

        if self
            .peers()
            .matching_service_area(req.new_service_area_id)
            .is_empty()
        {
            log::warn!(
                "[{}] no peer serves SAI {}, stopping session {session}",
                P::NAME,
                req.new_service_area_id
            );
            self.stop_session(local_id, true);
            return Ok(());
        }

        self.prune_uncovered(local_id, req.new_service_area_id);
        self.sessions()
            .update(local_id, |s| s.service_area_id = req.new_service_area_id);
        log::info!(
            "[{}] session {local_id:#x} updated to SAI {}",
            P::NAME,
            req.new_service_area_id
        );

        if self.defer(local_id, TimerKind::DeferredUpdate, &req.abs_update_time) {
            return Ok(());
        }
        // a pending deferred action is overtaken by this pass
        self.sessions().disarm_timer(local_id);
        self.reconcile_update(local_id)
    }

    /// Stop and drop every mapped peer that does not serve `sai`
    fn prune_uncovered(&self, local_id: u32, sai: ServiceAreaId) {
        let Some(session) = self.sessions().find(local_id) else {
            return;
        };
        for peer in self.peers().not_matching_service_area(sai) {
            let Some(remote_id) = session.remote_id(peer.assoc_id) else {
                continue;
            };
            let sent = P::encode_stop(local_id, Some(remote_id))
                .and_then(|payload| self.send(peer.assoc_id, peer.mbms_stream(), payload));
            if let Err(e) = sent {
                log::error!(
                    "[{}] session stop {local_id:#x} to association {}: {e}",
                    P::NAME,
                    peer.assoc_id
                );
            }
            self.prune_peer(local_id, peer.assoc_id);
            log::info!(
                "[{}] association {} left session {local_id:#x} (SAI {sai} not served)",
                P::NAME,
                peer.assoc_id
            );
        }
    }

    /// Update every mapped covering peer, start every unmapped one. A
    /// failed update only drops that peer.
    fn reconcile_update(&self, local_id: u32) -> MxapResult<()> {
        let session = self
            .sessions()
            .find(local_id)
            .ok_or(MxapError::SessionNotFound(local_id))?;
        let peers = self.peers().matching_service_area(session.service_area_id);
        if peers.is_empty() {
            self.stop_session(local_id, true);
            return Ok(());
        }

        let start_payload = if peers.iter().any(|p| !session.has_peer(p.assoc_id)) {
            match P::encode_start(&session) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    log::error!("[{}] session start {local_id:#x}: {e}", P::NAME);
                    None
                }
            }
        } else {
            None
        };
        for peer in peers {
            match session.remote_id(peer.assoc_id) {
                Some(remote_id) => {
                    let sent = P::encode_update(&session, remote_id)
                        .and_then(|payload| self.send(peer.assoc_id, peer.mbms_stream(), payload));
                    if let Err(e) = sent {
                        log::error!(
                            "[{}] session update {local_id:#x} to association {}: {e}",
                            P::NAME,
                            peer.assoc_id
                        );
                        self.prune_peer(local_id, peer.assoc_id);
                    }
                }
                None => {
                    let Some(payload) = &start_payload else {
                        continue;
                    };
                    if let Err(e) = self.send(peer.assoc_id, peer.mbms_stream(), payload.clone()) {
                        log::error!(
                            "[{}] session start {local_id:#x} to association {}: {e}",
                            P::NAME,
                            peer.assoc_id
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Coverage re-evaluation at timer expiry of a deferred update
    fn update_pass(&self, local_id: u32, sai: ServiceAreaId) -> MxapResult<()> {
        if self.peers().matching_service_area(sai).is_empty() {
            log::warn!(
                "[{}] no peer serves SAI {sai} any more, stopping session {local_id:#x}",
                P::NAME
            );
            self.stop_session(local_id, true);
            return Ok(());
        }
        self.prune_uncovered(local_id, sai);
        self.reconcile_update(local_id)
    }

    // ========================================================================
    // Session Stop
    // ========================================================================

    pub fn handle_session_stop_request(&self, req: &MbmsSessionStopReq) -> MxapResult<()> {
        match self
            .sessions()
            .find_by_tmgi_and_sai(&req.tmgi, req.service_area_id)
        {
            Some(session) => {
                self.stop_session(session.local_id, req.inform_peers);
                Ok(())
            }
            None => {
                log::error!(
                    "[{}] no session for TMGI {} SAI {}, stop ignored",
                    P::NAME,
                    req.tmgi,
                    req.service_area_id
                );
                Ok(())
            }
        }
    }

    /// Stop a session. With `inform_peers`, every covering peer gets a
    /// Session Stop, mapped or not, and so does any mapped peer outside
    /// the area. The session is removed either way.
    pub(crate) fn stop_session(&self, local_id: u32, inform_peers: bool) {
        let Some(session) = self.sessions().find(local_id) else {
            return;
        };
        if inform_peers {
            let mut targets: Vec<(AssocId, StreamId)> = self
                .peers()
                .matching_service_area(session.service_area_id)
                .iter()
                .map(|p| (p.assoc_id, p.mbms_stream()))
                .collect();
            for assoc_id in session.peer_assocs() {
                if targets.iter().any(|(a, _)| *a == assoc_id) {
                    continue;
                }
                if let Some(peer) = self.peers().find(assoc_id) {
                    targets.push((assoc_id, peer.mbms_stream()));
                }
            }
            for (assoc_id, stream) in targets {
                let sent = P::encode_stop(local_id, session.remote_id(assoc_id))
                    .and_then(|payload| self.send(assoc_id, stream, payload));
                if let Err(e) = sent {
                    log::error!(
                        "[{}] session stop {local_id:#x} to association {assoc_id}: {e}",
                        P::NAME
                    );
                }
            }
        }
        self.remove_session(local_id);
    }

    // ========================================================================
    // Action Timer
    // ========================================================================

    pub fn handle_timer_expired(&self, expiry: &TimerExpiry) -> MxapResult<()> {
        let Some(session) = self.sessions().find(expiry.session_id) else {
            log::warn!(
                "[{}] timer {} expired but session {:#x} is gone",
                P::NAME,
                expiry.timer_id,
                expiry.session_id
            );
            return Ok(());
        };
        if session.action_timer.id != expiry.timer_id {
            log::warn!(
                "[{}] stale timer {} for session {session} (current {})",
                P::NAME,
                expiry.timer_id,
                session.action_timer.id
            );
            return Ok(());
        }
        self.sessions()
            .update(session.local_id, |s| s.action_timer = ActionTimer::inactive());
        log::info!(
            "[{}] {:?} timer of session {session} expired",
            P::NAME,
            expiry.kind
        );

        if session.peer_map.is_empty() {
            self.start_fanout(session.local_id)
        } else {
            self.update_pass(session.local_id, session.service_area_id)
        }
    }
}
