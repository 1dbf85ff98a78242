//! MxAP Message Handlers
//!
//! Inbound PDUs from peers, setup answers from MCE_APP and transport
//! notifications. Each handler re-validates that the session and the peer
//! it touches still exist.

use crate::context::MxapContext;
use crate::error::{MxapError, MxapResult};
use crate::event::{PeerSetupResponse, UpstreamIndication};
use crate::pdu::*;
use crate::peer::PeerState;
use crate::personality::Personality;
use crate::session::INVALID_MBMS_ID;
use crate::types::{cause_misc, cause_protocol, AssocId, Cause, ResetItem, ResetType, StreamId, TimeToWait};
use crate::NON_MBMS_STREAM;

impl<P: Personality> MxapContext<P> {
    // ========================================================================
    // Session outcomes
    // ========================================================================

    /// A peer accepted a session start: record its id and count the session
    /// against the peer.
    pub fn handle_session_start_response(&self, assoc_id: AssocId, ids: SessionIds) -> MxapResult<()> {
        let local_id = ids.local_id;
        let remote_id = ids
            .remote_id
            .ok_or(MxapError::MissingRemoteId { local_id, assoc_id })?;
        self.peers()
            .find(assoc_id)
            .ok_or(MxapError::PeerNotFound(assoc_id))?;

        match self.sessions().insert_peer(local_id, assoc_id, remote_id) {
            Ok(()) => {}
            Err(e @ MxapError::PeerMapConflict { .. }) => {
                debug_assert!(false, "{e}");
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        let count = self.peers().increment_session_count(assoc_id).unwrap_or(0);
        log::info!(
            "[{}] session {local_id:#x} accepted by association {assoc_id} (remote {remote_id:#x}, {count} sessions)",
            P::NAME
        );
        Ok(())
    }

    pub fn handle_session_start_failure(&self, assoc_id: AssocId, failure: SessionFailure) -> MxapResult<()> {
        let local_id = failure.local_id;
        let session = self
            .sessions()
            .find(local_id)
            .ok_or(MxapError::SessionNotFound(local_id))?;
        if session.has_peer(assoc_id) {
            let e = MxapError::PeerMapConflict { local_id, assoc_id };
            debug_assert!(false, "{e}");
            return Err(e);
        }
        log::warn!(
            "[{}] session {session} rejected by association {assoc_id}: {:?}",
            P::NAME,
            failure.cause
        );
        Ok(())
    }

    pub fn handle_session_stop_response(&self, assoc_id: AssocId, ids: SessionIds) -> MxapResult<()> {
        log::debug!(
            "[{}] session stop {:#x} acknowledged by association {assoc_id}",
            P::NAME,
            ids.local_id
        );
        Ok(())
    }

    pub fn handle_session_update_response(&self, assoc_id: AssocId, ids: SessionIds) -> MxapResult<()> {
        let session = self
            .sessions()
            .find(ids.local_id)
            .ok_or(MxapError::SessionNotFound(ids.local_id))?;
        log::debug!(
            "[{}] session update {session} acknowledged by association {assoc_id}",
            P::NAME
        );
        Ok(())
    }

    /// The peer keeps its old parameters; it leaves the session without a
    /// stop.
    pub fn handle_session_update_failure(&self, assoc_id: AssocId, failure: SessionFailure) -> MxapResult<()> {
        let local_id = failure.local_id;
        self.sessions()
            .find(local_id)
            .ok_or(MxapError::SessionNotFound(local_id))?;
        self.peers()
            .find(assoc_id)
            .ok_or(MxapError::PeerNotFound(assoc_id))?;

        log::warn!(
            "[{}] session update {local_id:#x} failed on association {assoc_id}: {:?}",
            P::NAME,
            failure.cause
        );
        if self.prune_peer(local_id, assoc_id).is_none() {
            log::warn!(
                "[{}] association {assoc_id} was not in session {local_id:#x}",
                P::NAME
            );
            return Ok(());
        }
        self.reclaim_if_idle(local_id);
        Ok(())
    }

    // ========================================================================
    // Error Indication
    // ========================================================================

    /// Treated as a stop from that peer: stop it, prune it.
    pub fn handle_error_indication(
        &self,
        assoc_id: AssocId,
        stream: StreamId,
        ind: ErrorIndication,
    ) -> MxapResult<()> {
        let peer = self
            .peers()
            .find(assoc_id)
            .ok_or(MxapError::PeerNotFound(assoc_id))?;
        let local_id = ind
            .local_id
            .filter(|id| *id != INVALID_MBMS_ID)
            .ok_or(MxapError::MissingMandatoryIe("MBMS-AP-ID"))?;
        let session = self
            .sessions()
            .find(local_id)
            .ok_or(MxapError::SessionNotFound(local_id))?;

        log::warn!(
            "[{}] error indication for session {session} from association {assoc_id} stream {stream}: {:?}",
            P::NAME,
            ind.cause
        );

        let remote_id = session.remote_id(assoc_id).or(ind.remote_id);
        let sent = P::encode_stop(local_id, remote_id)
            .and_then(|payload| self.send(assoc_id, peer.mbms_stream(), payload));
        if let Err(e) = sent {
            log::error!(
                "[{}] session stop {local_id:#x} to association {assoc_id}: {e}",
                P::NAME
            );
        }
        if self.prune_peer(local_id, assoc_id).is_some() {
            self.reclaim_if_idle(local_id);
        }
        Ok(())
    }

    // ========================================================================
    // Reset
    // ========================================================================

    pub fn handle_reset(&self, assoc_id: AssocId, reset: &Reset) -> MxapResult<()> {
        let peer = self
            .peers()
            .find(assoc_id)
            .ok_or(MxapError::PeerNotFound(assoc_id))?;
        if peer.state != PeerState::Ready {
            log::warn!(
                "[{}] reset from association {assoc_id} in state {}, ignored",
                P::NAME,
                peer.state
            );
            return Ok(());
        }

        let items = match &reset.reset_type {
            ResetType::Interface => {
                let affected = self.peers().full_reset(assoc_id, self.sessions());
                log::info!(
                    "[{}] full reset of association {assoc_id} ({:?}), {} sessions affected",
                    P::NAME,
                    reset.cause,
                    affected.len()
                );
                Vec::new()
            }
            ResetType::PartOfInterface(items) => {
                let echoed = self.partial_reset(assoc_id, items);
                log::info!(
                    "[{}] partial reset of association {assoc_id} ({:?}), {} items",
                    P::NAME,
                    reset.cause,
                    echoed.len()
                );
                echoed
            }
        };

        self.send_message(
            assoc_id,
            NON_MBMS_STREAM,
            &MxapMessage::ResetAcknowledge(ResetAcknowledge { items }),
        )
    }

    /// Prune each listed connection; returns the items to acknowledge
    fn partial_reset(&self, assoc_id: AssocId, items: &[ResetItem]) -> Vec<ResetItem> {
        let mut echoed = Vec::with_capacity(items.len());
        for item in items {
            let Some(local_id) = item.local_id.filter(|id| *id != INVALID_MBMS_ID) else {
                log::debug!("[{}] reset item without local id skipped", P::NAME);
                continue;
            };
            echoed.push(*item);

            let Some(session) = self.sessions().find(local_id) else {
                log::warn!("[{}] reset item for unknown session {local_id:#x}", P::NAME);
                continue;
            };
            let Some(mapped) = session.remote_id(assoc_id) else {
                continue;
            };
            if let Some(remote_id) = item.remote_id {
                if remote_id != mapped {
                    log::warn!(
                        "[{}] reset item {local_id:#x}/{remote_id:#x} does not match remote id {mapped:#x}",
                        P::NAME
                    );
                    continue;
                }
            }
            self.prune_peer(local_id, assoc_id);
            self.reclaim_if_idle(local_id);
        }
        echoed
    }

    // ========================================================================
    // Setup
    // ========================================================================

    fn send_setup_failure(
        &self,
        assoc_id: AssocId,
        cause: Cause,
        time_to_wait: Option<TimeToWait>,
    ) -> MxapResult<()> {
        self.send_message(
            assoc_id,
            NON_MBMS_STREAM,
            &MxapMessage::SetupFailure(SetupFailure { cause, time_to_wait }),
        )
    }

    pub fn handle_setup_request(
        &self,
        assoc_id: AssocId,
        stream: StreamId,
        req: &SetupRequest,
    ) -> MxapResult<()> {
        if stream != NON_MBMS_STREAM {
            log::error!(
                "[{}] setup request from association {assoc_id} on stream {stream}",
                P::NAME
            );
            return self.send_setup_failure(
                assoc_id,
                Cause::Protocol(cause_protocol::UNSPECIFIED),
                None,
            );
        }

        let peer = self
            .peers()
            .find(assoc_id)
            .ok_or(MxapError::PeerNotFound(assoc_id))?;

        let max_peers = P::max_peers(self.config());
        let ready = self.ready_peer_count() - usize::from(peer.state == PeerState::Ready);
        if ready >= max_peers {
            log::error!(
                "[{}] setup from association {assoc_id} rejected, {ready} peers ready",
                P::NAME
            );
            self.send_setup_failure(
                assoc_id,
                Cause::Misc(cause_misc::CONTROL_PROCESSING_OVERLOAD),
                Some(TimeToWait::V20s),
            )?;
            return Err(MxapError::PeerLimit(max_peers));
        }

        if let Some(stale) = self
            .peers()
            .find_by_peer_id(req.global_id)
            .filter(|p| p.assoc_id != assoc_id)
        {
            log::error!(
                "[{}] global id {:#x} already bound to association {}, rejecting association {assoc_id}",
                P::NAME,
                req.global_id,
                stale.assoc_id
            );
            let sent = self.send_setup_failure(assoc_id, Cause::Misc(cause_misc::UNSPECIFIED), None);
            self.remove_peer(stale.assoc_id);
            return sent;
        }

        let service_areas = self.config().mbms.filter(&req.service_areas);
        self.peers().update(assoc_id, |p| {
            p.peer_id = Some(req.global_id);
            p.name = req.name.clone();
            p.service_areas = service_areas.clone();
        });
        log::info!(
            "[{}] setup request from {} (id {:#x}, PLMN {}) on association {assoc_id}, service areas {service_areas:?}",
            P::NAME,
            req.name.as_deref().unwrap_or("<unnamed>"),
            req.global_id,
            req.plmn_id
        );

        self.notify_upstream(UpstreamIndication::SetupRequest {
            personality: P::NAME,
            assoc_id,
            peer_id: req.global_id,
            service_areas,
        })
    }

    /// MCE_APP decided the peer's MBSFN areas: answer the setup.
    pub fn handle_peer_setup_response(&self, resp: &PeerSetupResponse) -> MxapResult<()> {
        let assoc_id = resp.assoc_id;
        let peer = self
            .peers()
            .find(assoc_id)
            .ok_or(MxapError::PeerNotFound(assoc_id))?;

        if resp.mbsfn_areas.is_empty() {
            log::error!(
                "[{}] no MBSFN area for association {assoc_id}, setup failed",
                P::NAME
            );
            return self.send_setup_failure(assoc_id, Cause::Misc(cause_misc::UNSPECIFIED), None);
        }

        let service_areas = if resp.service_areas.is_empty() {
            peer.service_areas.clone()
        } else {
            self.config().mbms.filter(&resp.service_areas)
        };
        self.peers().update(assoc_id, |p| {
            if p.peer_id.is_none() {
                p.peer_id = Some(resp.peer_id);
            }
            p.service_areas = service_areas;
            p.mbsfn_areas = resp.mbsfn_areas.clone();
            p.local_mbms_area = resp.local_mbms_area;
        });

        let config = self.config();
        self.send_message(
            assoc_id,
            NON_MBMS_STREAM,
            &MxapMessage::SetupResponse(SetupResponse {
                plmn_id: config.plmn.plmn_id(),
                global_id: config.global_mce_id,
                name: config.mce_name.clone(),
                mbsfn_areas: resp.mbsfn_areas.clone(),
            }),
        )?;
        self.peers().update(assoc_id, |p| p.state = PeerState::Ready);
        log::info!(
            "[{}] peer on association {assoc_id} ready ({} MBSFN areas, {} peers ready)",
            P::NAME,
            resp.mbsfn_areas.len(),
            self.ready_peer_count()
        );
        Ok(())
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub fn handle_new_association(
        &self,
        assoc_id: AssocId,
        in_streams: StreamId,
        out_streams: StreamId,
    ) -> MxapResult<()> {
        self.peers()
            .register_new_peer(assoc_id, in_streams, out_streams)
            .ok_or(MxapError::PeerBusy(assoc_id))?;
        log::info!(
            "[{}] association {assoc_id} up, streams {in_streams}/{out_streams} ({} peers)",
            P::NAME,
            self.peer_count()
        );
        Ok(())
    }

    /// The peer restarted its association: forget its sessions, keep the
    /// peer. It must run setup again.
    pub fn handle_association_reset(&self, assoc_id: AssocId) -> MxapResult<()> {
        self.peers()
            .update(assoc_id, |p| p.state = PeerState::Resetting)
            .ok_or(MxapError::PeerNotFound(assoc_id))?;
        let affected = self.peers().full_reset(assoc_id, self.sessions());
        log::info!(
            "[{}] association {assoc_id} reset, dropped from {} sessions",
            P::NAME,
            affected.len()
        );
        Ok(())
    }

    pub fn handle_association_closed(&self, assoc_id: AssocId) -> MxapResult<()> {
        if !self.remove_peer(assoc_id) {
            log::debug!("[{}] close of unknown association {assoc_id}", P::NAME);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{tmgi, Harness};
    use crate::event::MbmsSessionStartReq;
    use crate::m2ap::M2ap;
    use crate::m3ap::M3ap;
    use crate::types::{MbsfnArea, PlmnId, ServiceAreaId};

    fn start<P: Personality>(h: &mut Harness<P>, service_id: u32, sai: ServiceAreaId) -> u32 {
        h.ctx
            .handle_session_start_request(&MbmsSessionStartReq {
                tmgi: tmgi(service_id),
                service_area_id: sai,
                bearer_qos: Default::default(),
                ip_mc_distribution: Default::default(),
                abs_start_time: Default::default(),
            })
            .unwrap();
        let local_id = h
            .ctx
            .sessions()
            .find_by_tmgi_and_sai(&tmgi(service_id), sai)
            .unwrap()
            .local_id;
        h.drain();
        local_id
    }

    fn setup_request(global_id: u32, areas: Vec<ServiceAreaId>) -> SetupRequest {
        SetupRequest {
            plmn_id: PlmnId::new(208, 1, 2),
            global_id,
            name: Some(format!("enb-{global_id}")),
            service_areas: areas,
        }
    }

    #[test]
    fn test_start_response_requires_remote_id() {
        let mut h = Harness::<M2ap>::new();
        h.ready_peer(1, &[1]);
        let local_id = start(&mut h, 5, 1);
        assert_eq!(
            h.ctx.handle_session_start_response(1, SessionIds { local_id, remote_id: None }),
            Err(MxapError::MissingRemoteId { local_id, assoc_id: 1 })
        );
        assert_eq!(h.count_of(1), 0);
    }

    #[test]
    fn test_start_response_for_unknown_session() {
        let h = Harness::<M3ap>::new();
        h.ready_peer(1, &[1]);
        assert_eq!(
            h.ctx.handle_session_start_response(1, SessionIds { local_id: 77, remote_id: Some(1) }),
            Err(MxapError::SessionNotFound(77))
        );
        assert_eq!(h.count_of(1), 0);
    }

    #[test]
    fn test_start_failure_leaves_no_entry() {
        let mut h = Harness::<M2ap>::new();
        h.ready_peer(1, &[1]);
        h.ready_peer(2, &[1]);
        let local_id = start(&mut h, 5, 1);
        h.accept(2, local_id, 20);
        let failure = SessionFailure {
            local_id,
            remote_id: None,
            cause: Cause::Misc(cause_misc::UNSPECIFIED),
        };
        h.ctx.handle_session_start_failure(1, failure).unwrap();
        let session = h.ctx.sessions().find(local_id).unwrap();
        assert_eq!(session.peer_assocs(), vec![2]);
        assert_eq!(h.count_of(1), 0);
    }

    #[test]
    fn test_update_failure_prunes_without_stop() {
        let mut h = Harness::<M2ap>::new();
        h.ready_peer(1, &[1]);
        h.ready_peer(2, &[1]);
        let local_id = start(&mut h, 5, 1);
        h.accept(1, local_id, 10);
        h.accept(2, local_id, 20);

        let failure = SessionFailure {
            local_id,
            remote_id: Some(10),
            cause: Cause::Misc(cause_misc::UNSPECIFIED),
        };
        h.ctx.handle_session_update_failure(1, failure).unwrap();
        assert!(h.drain().is_empty());
        assert_eq!(h.ctx.sessions().find(local_id).unwrap().peer_assocs(), vec![2]);
        assert_eq!(h.count_of(1), 0);
        assert_eq!(h.count_of(2), 1);

        // last member gone and nothing pending: reclaimed
        h.ctx
            .handle_session_update_failure(2, SessionFailure { remote_id: Some(20), ..failure })
            .unwrap();
        assert_eq!(h.ctx.session_count(), 0);
    }

    #[test]
    fn test_error_indication_stops_and_prunes() {
        let mut h = Harness::<M3ap>::new();
        h.ready_peer(1, &[1]);
        h.ready_peer(2, &[1]);
        let local_id = start(&mut h, 5, 1);
        h.accept(1, local_id, 10);
        h.accept(2, local_id, 20);

        let ind = ErrorIndication {
            local_id: Some(local_id),
            remote_id: Some(10),
            cause: Some(Cause::Protocol(cause_protocol::SEMANTIC_ERROR)),
        };
        h.ctx.handle_error_indication(1, crate::MBMS_SERVICE_STREAM, ind).unwrap();
        let sent = h.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.assoc_id, 1);
        assert_eq!(
            sent[0].1.message,
            Some(MxapMessage::SessionStopRequest(SessionIds { local_id, remote_id: Some(10) }))
        );
        assert_eq!(h.ctx.sessions().find(local_id).unwrap().peer_assocs(), vec![2]);
        assert_eq!(h.count_of(1), 0);
    }

    #[test]
    fn test_error_indication_without_local_id_is_dropped() {
        let mut h = Harness::<M2ap>::new();
        h.ready_peer(1, &[1]);
        let ind = ErrorIndication { local_id: None, remote_id: Some(3), cause: None };
        assert!(matches!(
            h.ctx.handle_error_indication(1, NON_MBMS_STREAM, ind),
            Err(MxapError::MissingMandatoryIe(_))
        ));
        let ind = ErrorIndication { local_id: Some(0x42), remote_id: None, cause: None };
        assert_eq!(
            h.ctx.handle_error_indication(1, NON_MBMS_STREAM, ind),
            Err(MxapError::SessionNotFound(0x42))
        );
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_full_reset_acknowledged() {
        let mut h = Harness::<M2ap>::new();
        h.ready_peer(1, &[1]);
        let a = start(&mut h, 1, 1);
        let b = start(&mut h, 2, 1);
        h.accept(1, a, 10);
        h.accept(1, b, 11);

        let reset = Reset {
            cause: Cause::Misc(cause_misc::OM_INTERVENTION),
            reset_type: ResetType::Interface,
        };
        h.ctx.handle_reset(1, &reset).unwrap();
        let sent = h.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.stream, NON_MBMS_STREAM);
        assert_eq!(
            sent[0].1.message,
            Some(MxapMessage::ResetAcknowledge(ResetAcknowledge::default()))
        );
        assert_eq!(h.count_of(1), 0);
        assert_eq!(h.ctx.sessions().sessions_with_peer(1), 0);
        assert_eq!(h.ctx.peers().find(1).unwrap().state, PeerState::Ready);
    }

    #[test]
    fn test_partial_reset_items() {
        let mut h = Harness::<M3ap>::new();
        h.ready_peer(1, &[1]);
        h.ready_peer(2, &[1]);
        let a = start(&mut h, 1, 1);
        let b = start(&mut h, 2, 1);
        h.accept(1, a, 10);
        h.accept(2, a, 20);
        h.accept(1, b, 11);

        let items = vec![
            ResetItem { local_id: Some(a), remote_id: Some(10) },
            // wrong remote id: echoed, not applied
            ResetItem { local_id: Some(b), remote_id: Some(99) },
            ResetItem { local_id: None, remote_id: Some(11) },
            ResetItem { local_id: Some(0x7777), remote_id: None },
        ];
        let reset = Reset {
            cause: Cause::Misc(cause_misc::UNSPECIFIED),
            reset_type: ResetType::PartOfInterface(items.clone()),
        };
        h.ctx.handle_reset(1, &reset).unwrap();

        let sent = h.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1.message,
            Some(MxapMessage::ResetAcknowledge(ResetAcknowledge {
                items: vec![items[0], items[1], items[3]],
            }))
        );
        assert_eq!(h.ctx.sessions().find(a).unwrap().peer_assocs(), vec![2]);
        assert_eq!(h.ctx.sessions().find(b).unwrap().peer_assocs(), vec![1]);
        assert_eq!(h.count_of(1), 1);
    }

    #[test]
    fn test_reset_ignored_before_setup() {
        let mut h = Harness::<M2ap>::new();
        h.ctx.handle_new_association(1, 2, 2).unwrap();
        let reset = Reset {
            cause: Cause::Misc(cause_misc::UNSPECIFIED),
            reset_type: ResetType::Interface,
        };
        h.ctx.handle_reset(1, &reset).unwrap();
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_reannounced_association_needs_setup_again() {
        let mut h = Harness::<M2ap>::new();
        h.ready_peer(1, &[1]);
        h.ctx.handle_new_association(1, 2, 2).unwrap();
        assert_eq!(h.ctx.peers().find(1).unwrap().state, PeerState::Init);
        assert_eq!(h.ctx.ready_peer_count(), 0);

        h.ctx
            .handle_session_start_request(&MbmsSessionStartReq {
                tmgi: tmgi(5),
                service_area_id: 1,
                bearer_qos: Default::default(),
                ip_mc_distribution: Default::default(),
                abs_start_time: Default::default(),
            })
            .unwrap();
        assert!(h.drain().is_empty());
        assert_eq!(h.ctx.session_count(), 0);
    }

    #[test]
    fn test_setup_request_forwards_admitted_areas() {
        let mut config = crate::config::MxapConfig::default();
        config.mbms.global_service_area_types = 4;
        let mut h = Harness::<M2ap>::with_config(config);
        h.ctx.handle_new_association(1, 2, 2).unwrap();

        h.ctx
            .handle_setup_request(1, NON_MBMS_STREAM, &setup_request(0x1234, vec![2, 9, 4, 2]))
            .unwrap();
        assert!(h.drain().is_empty());
        assert_eq!(
            h.upstream_rx.try_recv().unwrap(),
            UpstreamIndication::SetupRequest {
                personality: "M2AP",
                assoc_id: 1,
                peer_id: 0x1234,
                service_areas: vec![2, 4],
            }
        );
        let peer = h.ctx.peers().find(1).unwrap();
        assert_eq!(peer.peer_id, Some(0x1234));
        assert_eq!(peer.name.as_deref(), Some("enb-4660"));
        assert_eq!(peer.state, PeerState::Init);
    }

    #[test]
    fn test_setup_request_on_wrong_stream() {
        let mut h = Harness::<M3ap>::new();
        h.ctx.handle_new_association(1, 2, 2).unwrap();
        h.ctx
            .handle_setup_request(1, crate::MBMS_SERVICE_STREAM, &setup_request(1, vec![1]))
            .unwrap();
        let sent = h.drain();
        assert_eq!(
            sent[0].1.message,
            Some(MxapMessage::SetupFailure(SetupFailure {
                cause: Cause::Protocol(cause_protocol::UNSPECIFIED),
                time_to_wait: None,
            }))
        );
        assert!(h.upstream_rx.try_recv().is_err());
    }

    #[test]
    fn test_setup_request_over_peer_limit() {
        let mut config = crate::config::MxapConfig::default();
        config.max_m2_enbs = 1;
        let mut h = Harness::<M2ap>::with_config(config);
        h.ready_peer(1, &[1]);
        h.ctx.handle_new_association(2, 2, 2).unwrap();

        assert_eq!(
            h.ctx.handle_setup_request(2, NON_MBMS_STREAM, &setup_request(2, vec![1])),
            Err(MxapError::PeerLimit(1))
        );
        let sent = h.drain();
        assert_eq!(sent[0].0.assoc_id, 2);
        assert_eq!(
            sent[0].1.message,
            Some(MxapMessage::SetupFailure(SetupFailure {
                cause: Cause::Misc(cause_misc::CONTROL_PROCESSING_OVERLOAD),
                time_to_wait: Some(TimeToWait::V20s),
            }))
        );
    }

    #[test]
    fn test_setup_request_with_duplicate_global_id() {
        let mut h = Harness::<M2ap>::new();
        h.ready_peer(1, &[1]);
        let stale_id = h.ctx.peers().find(1).unwrap().peer_id.unwrap();
        let local_id = start(&mut h, 5, 1);
        h.accept(1, local_id, 10);
        h.ctx.handle_new_association(2, 2, 2).unwrap();

        h.ctx
            .handle_setup_request(2, NON_MBMS_STREAM, &setup_request(stale_id, vec![1]))
            .unwrap();
        let sent = h.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.assoc_id, 2);
        assert!(matches!(sent[0].1.message, Some(MxapMessage::SetupFailure(_))));
        assert!(h.ctx.peers().find(1).is_none());
        assert!(h.ctx.peers().find(2).is_some());
        assert!(h.ctx.sessions().find(local_id).unwrap().peer_map.is_empty());
    }

    #[test]
    fn test_peer_setup_response_moves_peer_to_ready() {
        let mut h = Harness::<M3ap>::new();
        h.ctx.handle_new_association(1, 2, 2).unwrap();
        h.ctx
            .handle_setup_request(1, NON_MBMS_STREAM, &setup_request(9, vec![1]))
            .unwrap();
        let areas = vec![MbsfnArea { mbsfn_area_id: 1, service_area_id: 1 }];
        h.ctx
            .handle_peer_setup_response(&PeerSetupResponse {
                assoc_id: 1,
                peer_id: 9,
                service_areas: Vec::new(),
                mbsfn_areas: areas.clone(),
                local_mbms_area: 0,
            })
            .unwrap();

        let sent = h.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.stream, NON_MBMS_STREAM);
        match &sent[0].1.message {
            Some(MxapMessage::SetupResponse(resp)) => {
                assert_eq!(resp.global_id, h.ctx.config().global_mce_id);
                assert_eq!(resp.mbsfn_areas, areas);
            }
            other => panic!("expected setup response, got {other:?}"),
        }
        let peer = h.ctx.peers().find(1).unwrap();
        assert_eq!(peer.state, PeerState::Ready);
        assert_eq!(peer.service_areas, vec![1]);
        assert_eq!(h.ctx.ready_peer_count(), 1);
    }

    #[test]
    fn test_peer_setup_response_without_mbsfn_area() {
        let mut h = Harness::<M2ap>::new();
        h.ctx.handle_new_association(1, 2, 2).unwrap();
        h.ctx
            .handle_peer_setup_response(&PeerSetupResponse { assoc_id: 1, ..Default::default() })
            .unwrap();
        let sent = h.drain();
        assert!(matches!(sent[0].1.message, Some(MxapMessage::SetupFailure(_))));
        assert_eq!(h.ctx.peers().find(1).unwrap().state, PeerState::Init);
    }

    #[test]
    fn test_association_reset_keeps_peer_in_init() {
        let mut h = Harness::<M2ap>::new();
        h.ready_peer(1, &[1]);
        let local_id = start(&mut h, 5, 1);
        h.accept(1, local_id, 10);

        h.ctx.handle_association_reset(1).unwrap();
        let peer = h.ctx.peers().find(1).unwrap();
        assert_eq!(peer.state, PeerState::Init);
        assert_eq!(peer.active_session_count, 0);
        assert!(h.ctx.sessions().find(local_id).unwrap().peer_map.is_empty());
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_close_of_unknown_association() {
        let h = Harness::<M3ap>::new();
        assert!(h.ctx.handle_association_closed(9).is_ok());
        assert_eq!(h.ctx.peer_count(), 0);
    }
}
