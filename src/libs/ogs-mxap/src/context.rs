//! MxAP Context
//!
//! Per-personality state: both registries, the configuration and the
//! outbound channels. Owned by the personality task and handed to every
//! handler.

use std::marker::PhantomData;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::MxapConfig;
use crate::error::{MxapError, MxapResult};
use crate::event::{SctpRequest, UpstreamIndication};
use crate::pdu::MxapMessage;
use crate::peer::PeerRegistry;
use crate::personality::Personality;
use crate::session::SessionRegistry;
use crate::types::{AssocId, StreamId};

/// MBMS directory of one personality
pub struct MxapContext<P: Personality> {
    config: MxapConfig,
    peers: PeerRegistry,
    sessions: SessionRegistry,
    sctp_tx: mpsc::UnboundedSender<SctpRequest>,
    upstream_tx: mpsc::UnboundedSender<UpstreamIndication>,
    _personality: PhantomData<P>,
}

impl<P: Personality> MxapContext<P> {
    pub fn new(
        config: MxapConfig,
        sctp_tx: mpsc::UnboundedSender<SctpRequest>,
        upstream_tx: mpsc::UnboundedSender<UpstreamIndication>,
    ) -> Self {
        let sessions = SessionRegistry::new(P::local_id_mask(), config.max_mbms_services);
        log::info!(
            "[{}] context initialized (max {} sessions, max {} peers, outcome timer {:?})",
            P::NAME,
            config.max_mbms_services,
            P::max_peers(&config),
            P::outcome_timer(&config)
        );
        Self {
            config,
            peers: PeerRegistry::new(),
            sessions,
            sctp_tx,
            upstream_tx,
            _personality: PhantomData,
        }
    }

    pub fn config(&self) -> &MxapConfig {
        &self.config
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn peer_count(&self) -> usize {
        self.peers.count()
    }

    pub fn ready_peer_count(&self) -> usize {
        self.peers.ready_count()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.count()
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Hand an encoded PDU to the transport
    pub(crate) fn send(&self, assoc_id: AssocId, stream: StreamId, payload: Bytes) -> MxapResult<()> {
        log::debug!(
            "[{}] send {} octets on association {assoc_id} stream {stream}",
            P::NAME,
            payload.len()
        );
        self.sctp_tx
            .send(SctpRequest { assoc_id, stream, ppid: P::SCTP_PPID, payload })
            .map_err(|_| MxapError::ChannelClosed("sctp"))
    }

    pub(crate) fn send_message(
        &self,
        assoc_id: AssocId,
        stream: StreamId,
        msg: &MxapMessage,
    ) -> MxapResult<()> {
        let payload = P::encode(msg)?;
        self.send(assoc_id, stream, payload)
    }

    pub(crate) fn notify_upstream(&self, indication: UpstreamIndication) -> MxapResult<()> {
        self.upstream_tx
            .send(indication)
            .map_err(|_| MxapError::ChannelClosed("upstream"))
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    /// Drop one association from a session's peer-map and release the
    /// peer's reference. Returns the remote id that was mapped.
    pub(crate) fn prune_peer(&self, local_id: u32, assoc_id: AssocId) -> Option<u32> {
        let remote_id = self.sessions.remove_peer(local_id, assoc_id)?;
        self.peers.decrement_session_count(assoc_id);
        log::debug!(
            "[{}] association {assoc_id} pruned from session {local_id:#x}",
            P::NAME
        );
        Some(remote_id)
    }

    /// Remove a session left without peers and without a pending action
    pub(crate) fn reclaim_if_idle(&self, local_id: u32) -> bool {
        match self.sessions.find(local_id) {
            Some(session) if session.is_idle() => {
                self.sessions.remove(local_id);
                log::info!("[{}] idle session {session} reclaimed", P::NAME);
                true
            }
            _ => false,
        }
    }

    /// Remove a session: cancel its timer and release every peer still in
    /// its peer-map.
    pub fn remove_session(&self, local_id: u32) -> bool {
        let Some(session) = self.sessions.remove(local_id) else {
            return false;
        };
        for assoc_id in session.peer_assocs() {
            self.peers.decrement_session_count(assoc_id);
        }
        log::info!(
            "[{}] session {session} removed ({} sessions left)",
            P::NAME,
            self.sessions.count()
        );
        true
    }

    /// Transport teardown of one peer
    pub fn remove_peer(&self, assoc_id: AssocId) -> bool {
        match self.peers.remove(assoc_id, &self.sessions) {
            Some(peer) => {
                log::info!(
                    "[{}] peer {} on association {assoc_id} removed ({} peers left)",
                    P::NAME,
                    peer.name.as_deref().unwrap_or("<unnamed>"),
                    self.peers.count()
                );
                true
            }
            None => false,
        }
    }

    /// Drop all state
    pub fn clear(&self) {
        self.sessions.clear();
        self.peers.clear();
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn dump_peers(&self) {
        log::debug!("[{}] {} peers", P::NAME, self.peers.count());
        for peer in self.peers.all() {
            log::debug!(
                "[{}]   assoc {} id {} name {} state {} streams {}/{} sessions {} areas {:?}",
                P::NAME,
                peer.assoc_id,
                peer.peer_id.map(|id| format!("{id:#x}")).unwrap_or_else(|| "-".into()),
                peer.name.as_deref().unwrap_or("-"),
                peer.state,
                peer.in_streams,
                peer.out_streams,
                peer.active_session_count,
                peer.service_areas
            );
        }
    }

    pub fn dump_sessions(&self) {
        log::debug!("[{}] {} sessions", P::NAME, self.sessions.count());
        for session in self.sessions.all() {
            log::debug!(
                "[{}]   {session} peers {} timer {}",
                P::NAME,
                session.peer_map.len(),
                match session.action_timer.kind {
                    Some(kind) if session.action_timer.is_active() => format!("{kind:?}"),
                    _ => "inactive".into(),
                }
            );
        }
    }
}

impl<P: Personality> std::fmt::Debug for MxapContext<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MxapContext")
            .field("personality", &P::NAME)
            .field("peers", &self.peers)
            .field("sessions", &self.sessions)
            .finish()
    }
}
