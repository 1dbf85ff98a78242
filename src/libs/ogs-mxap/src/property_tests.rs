//! Property-Based Tests for the MBMS Directory
//!
//! Random operation sequences against both registries through the
//! procedure engine, checked after every step.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    use proptest::prelude::*;

    use crate::context::test_support::{tmgi, Harness};
    use crate::event::{MbmsSessionStartReq, MbmsSessionStopReq, MbmsSessionUpdateReq, MxapEvent};
    use crate::m2ap::M2ap;
    use crate::m3ap::M3ap;
    use crate::pdu::{ErrorIndication, Reset, SessionFailure, SessionIds};
    use crate::personality::Personality;
    use crate::types::{AbsoluteTime, AssocId, Cause, ResetType, ServiceAreaId};

    const PEERS: [(AssocId, &[ServiceAreaId]); 4] = [(1, &[1, 2]), (2, &[2, 3]), (3, &[1]), (4, &[3])];

    // ========================================================================
    // Strategies for generating test data
    // ========================================================================

    #[derive(Debug, Clone)]
    enum Op {
        Start { service: u32, sai: ServiceAreaId },
        Update { service: u32, old: ServiceAreaId, new: ServiceAreaId },
        Stop { service: u32, sai: ServiceAreaId, inform: bool },
        Accept { session: usize, peer: usize },
        UpdateFailure { session: usize, peer: usize },
        ErrorIndication { session: usize, peer: usize },
        Reset { peer: usize },
        Close { peer: usize },
        Reconnect { peer: usize },
    }

    fn arb_sai() -> impl Strategy<Value = ServiceAreaId> {
        1u16..5
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u32..4, arb_sai()).prop_map(|(service, sai)| Op::Start { service, sai }),
            2 => (0u32..4, arb_sai(), arb_sai())
                .prop_map(|(service, old, new)| Op::Update { service, old, new }),
            1 => (0u32..4, arb_sai(), any::<bool>())
                .prop_map(|(service, sai, inform)| Op::Stop { service, sai, inform }),
            5 => (any::<usize>(), any::<usize>())
                .prop_map(|(session, peer)| Op::Accept { session, peer }),
            1 => (any::<usize>(), any::<usize>())
                .prop_map(|(session, peer)| Op::UpdateFailure { session, peer }),
            1 => (any::<usize>(), any::<usize>())
                .prop_map(|(session, peer)| Op::ErrorIndication { session, peer }),
            1 => (0usize..4).prop_map(|peer| Op::Reset { peer }),
            1 => (0usize..4).prop_map(|peer| Op::Close { peer }),
            1 => (0usize..4).prop_map(|peer| Op::Reconnect { peer }),
        ]
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn harness<P: Personality>() -> Harness<P> {
        let h = Harness::<P>::new();
        for (assoc_id, areas) in PEERS {
            h.ready_peer(assoc_id, areas);
        }
        h
    }

    fn start_req(service: u32, sai: ServiceAreaId, abs_start_time: AbsoluteTime) -> MbmsSessionStartReq {
        MbmsSessionStartReq {
            tmgi: tmgi(service),
            service_area_id: sai,
            bearer_qos: Default::default(),
            ip_mc_distribution: Default::default(),
            abs_start_time,
        }
    }

    fn cause() -> Cause {
        Cause::Misc(crate::types::cause_misc::UNSPECIFIED)
    }

    /// Results are ignored: lookup misses are part of the exercise.
    fn apply<P: Personality>(h: &mut Harness<P>, op: &Op) {
        let sessions = h.ctx.sessions().all();
        let ctx = &h.ctx;
        match *op {
            Op::Start { service, sai } => {
                let _ = ctx.handle_session_start_request(&start_req(service, sai, AbsoluteTime::default()));
            }
            Op::Update { service, old, new } => {
                let _ = ctx.handle_session_update_request(&MbmsSessionUpdateReq {
                    tmgi: tmgi(service),
                    old_service_area_id: old,
                    new_service_area_id: new,
                    bearer_qos: Default::default(),
                    ip_mc_distribution: Default::default(),
                    abs_update_time: AbsoluteTime::default(),
                });
            }
            Op::Stop { service, sai, inform } => {
                let _ = ctx.handle_session_stop_request(&MbmsSessionStopReq {
                    tmgi: tmgi(service),
                    service_area_id: sai,
                    inform_peers: inform,
                });
            }
            Op::Accept { session, peer } => {
                if sessions.is_empty() {
                    return;
                }
                let s = &sessions[session % sessions.len()];
                let candidates = ctx.peers().matching_service_area(s.service_area_id);
                if candidates.is_empty() {
                    return;
                }
                let assoc_id = candidates[peer % candidates.len()].assoc_id;
                if s.has_peer(assoc_id) {
                    return;
                }
                let remote_id = (s.local_id % 1000) * 10 + assoc_id;
                let _ = ctx.handle_session_start_response(
                    assoc_id,
                    SessionIds { local_id: s.local_id, remote_id: Some(remote_id) },
                );
            }
            Op::UpdateFailure { session, peer } => {
                if sessions.is_empty() {
                    return;
                }
                let s = &sessions[session % sessions.len()];
                let members = s.peer_assocs();
                if members.is_empty() {
                    return;
                }
                let assoc_id = members[peer % members.len()];
                let _ = ctx.handle_session_update_failure(
                    assoc_id,
                    SessionFailure { local_id: s.local_id, remote_id: s.remote_id(assoc_id), cause: cause() },
                );
            }
            Op::ErrorIndication { session, peer } => {
                if sessions.is_empty() {
                    return;
                }
                let s = &sessions[session % sessions.len()];
                let assoc_id = PEERS[peer % PEERS.len()].0;
                let _ = ctx.handle_error_indication(
                    assoc_id,
                    crate::MBMS_SERVICE_STREAM,
                    ErrorIndication { local_id: Some(s.local_id), remote_id: None, cause: Some(cause()) },
                );
            }
            Op::Reset { peer } => {
                let _ = ctx.handle_reset(
                    PEERS[peer].0,
                    &Reset { cause: cause(), reset_type: ResetType::Interface },
                );
            }
            Op::Close { peer } => {
                ctx.handle_event(MxapEvent::AssociationClosed { assoc_id: PEERS[peer].0 });
            }
            Op::Reconnect { peer } => {
                let (assoc_id, areas) = PEERS[peer];
                if ctx.peers().find(assoc_id).is_none() {
                    h.ready_peer(assoc_id, areas);
                }
            }
        }
        h.drain();
    }

    fn check_directory<P: Personality>(h: &Harness<P>) -> Result<(), TestCaseError> {
        let sessions = h.ctx.sessions().all();
        for peer in h.ctx.peers().all() {
            prop_assert_eq!(
                peer.active_session_count as usize,
                h.ctx.sessions().sessions_with_peer(peer.assoc_id),
                "count of association {}",
                peer.assoc_id
            );
        }
        let mut keys = HashSet::new();
        for s in &sessions {
            prop_assert!(keys.insert((s.tmgi, s.service_area_id)), "duplicate session {}", s);
            for assoc_id in s.peer_assocs() {
                prop_assert!(h.ctx.peers().find(assoc_id).is_some());
            }
        }
        Ok(())
    }

    // ========================================================================
    // Peer count matches peer-map membership
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property 1: after every operation each peer's session count equals
        /// the number of peer-maps holding it (M2AP)
        #[test]
        fn prop_m2ap_session_count_matches_peer_maps(ops in prop::collection::vec(arb_op(), 1..60)) {
            let mut h = harness::<M2ap>();
            for op in &ops {
                apply(&mut h, op);
                check_directory(&h)?;
            }
        }

        /// Property 1: same for M3AP
        #[test]
        fn prop_m3ap_session_count_matches_peer_maps(ops in prop::collection::vec(arb_op(), 1..60)) {
            let mut h = harness::<M3ap>();
            for op in &ops {
                apply(&mut h, op);
                check_directory(&h)?;
            }
        }
    }

    // ========================================================================
    // No duplicate live session
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property 2: repeated starts for the same (TMGI, SAI) leave one session
        #[test]
        fn prop_restart_leaves_one_session(service in 0u32..4, sai in 1u16..4, repeats in 1usize..6) {
            let mut h = harness::<M2ap>();
            let mut last = None;
            for _ in 0..repeats {
                h.ctx.handle_session_start_request(&start_req(service, sai, AbsoluteTime::default())).unwrap();
                let current = h.ctx.sessions().find_by_tmgi_and_sai(&tmgi(service), sai).unwrap();
                prop_assert_ne!(Some(current.local_id), last);
                last = Some(current.local_id);
                h.drain();
            }
            prop_assert_eq!(h.ctx.session_count(), 1);
        }
    }

    // ========================================================================
    // Timer cancel-on-remove
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property 3: removed sessions leave no timer behind, and a late
        /// expiry for them is a no-op
        #[test]
        fn prop_removed_session_timer_is_inert(
            delays in prop::collection::vec(1u64..3600, 1..8),
            removed in prop::collection::vec(any::<bool>(), 8),
        ) {
            let mut h = harness::<M3ap>();
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
            for (service, delay) in delays.iter().enumerate() {
                let at = AbsoluteTime::new(now + delay, 0);
                h.ctx.handle_session_start_request(&start_req(service as u32, 1, at)).unwrap();
            }
            prop_assert!(h.drain().is_empty());

            let mut stale = Vec::new();
            for session in h.ctx.sessions().all() {
                if removed[session.tmgi.service_id as usize % removed.len()] {
                    let timer_id = session.action_timer.id;
                    prop_assert!(h.ctx.remove_session(session.local_id));
                    prop_assert!(!h.ctx.sessions().timers().exists(timer_id));
                    stale.push(crate::timer::TimerExpiry {
                        timer_id,
                        kind: crate::timer::TimerKind::DeferredStart,
                        session_id: session.local_id,
                    });
                }
            }
            let remaining = h.ctx.session_count();
            prop_assert_eq!(h.ctx.sessions().timers().count(), remaining);

            for expiry in &stale {
                h.ctx.handle_timer_expired(expiry).unwrap();
            }
            prop_assert_eq!(h.ctx.session_count(), remaining);
            prop_assert!(h.drain().is_empty());

            let fired = h.ctx.process_timers(Instant::now() + Duration::from_secs(7200));
            prop_assert_eq!(fired, remaining);
            prop_assert_eq!(h.ctx.sessions().timers().count(), 0);
        }
    }

    // ========================================================================
    // Idempotent peer removal
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property 5: removing a peer twice is safe; the second call changes
        /// nothing
        #[test]
        fn prop_peer_removal_is_idempotent(
            ops in prop::collection::vec(arb_op(), 0..30),
            victim in 0usize..4,
        ) {
            let mut h = harness::<M2ap>();
            for op in &ops {
                apply(&mut h, op);
            }
            let assoc_id = PEERS[victim].0;
            h.ctx.remove_peer(assoc_id);
            let sessions = h.ctx.sessions().all();
            let peers = h.ctx.peers().all();

            prop_assert!(!h.ctx.remove_peer(assoc_id));
            prop_assert_eq!(h.ctx.sessions().all(), sessions);
            prop_assert_eq!(h.ctx.peers().all(), peers);
            prop_assert_eq!(h.ctx.sessions().sessions_with_peer(assoc_id), 0);
            check_directory(&h)?;
        }
    }

    // ========================================================================
    // Codec robustness
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property 6: arbitrary octets never panic the decoders
        #[test]
        fn prop_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = M2ap::decode_pdu(&data);
            let _ = M3ap::decode_pdu(&data);
        }

        /// Property 7: arbitrary inbound octets never corrupt the directory
        #[test]
        fn prop_inbound_garbage_keeps_directory(
            ops in prop::collection::vec(arb_op(), 0..20),
            data in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            let mut h = harness::<M3ap>();
            for op in &ops {
                apply(&mut h, op);
            }
            h.ctx.handle_event(MxapEvent::InboundData {
                assoc_id: 1,
                stream: 0,
                payload: bytes::Bytes::from(data),
            });
            h.drain();
            check_directory(&h)?;
        }
    }
}
