//! Protocol Personality
//!
//! The MBMS directory and procedure engine are written once; everything
//! that differs between the M2AP (toward eNBs) and M3AP (toward MCEs/MME)
//! dialects sits behind the `Personality` trait.

use std::time::Duration;

use bytes::Bytes;

use crate::codec::{self, WireProfile};
use crate::config::MxapConfig;
use crate::error::MxapResult;
use crate::pdu::*;
use crate::session::MbmsSession;

/// Handlers a dispatch-table slot can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    SessionStartResponse,
    SessionStartFailure,
    SessionStopResponse,
    SessionUpdateResponse,
    SessionUpdateFailure,
    ErrorIndication,
    Reset,
    SetupRequest,
}

/// One row of a personality's dispatch table, indexed by wire procedure code
#[derive(Debug, Clone, Copy)]
pub struct DispatchEntry {
    pub code: u8,
    pub procedure: Procedure,
    /// Handler per direction: initiating, successful, unsuccessful
    pub handlers: [Option<HandlerKind>; 3],
}

impl DispatchEntry {
    pub const fn new(code: u8, procedure: Procedure, handlers: [Option<HandlerKind>; 3]) -> Self {
        Self { code, procedure, handlers }
    }

    pub fn handler(&self, direction: Direction) -> Option<HandlerKind> {
        self.handlers[direction.index()]
    }
}

/// Capability interface of one protocol dialect
pub trait Personality: Send + Sync + 'static {
    /// Log prefix and display name ("M2AP" / "M3AP")
    const NAME: &'static str;
    /// Well-known SCTP port
    const SCTP_PORT: u16;
    /// SCTP payload protocol identifier
    const SCTP_PPID: u32;

    /// Procedure-code and IE-id tables
    fn profile() -> &'static WireProfile;

    /// Handlers by wire procedure code
    fn dispatch_table() -> &'static [DispatchEntry];

    /// Configured peer limit for this personality
    fn max_peers(config: &MxapConfig) -> usize;

    /// Configured procedure outcome timer
    fn outcome_timer(config: &MxapConfig) -> Duration;

    /// Bits available to locally generated session ids
    fn local_id_mask() -> u32 {
        Self::profile().local_id_mask
    }

    fn encode(msg: &MxapMessage) -> MxapResult<Bytes> {
        codec::encode_message(Self::profile(), msg)
    }

    fn decode_pdu(data: &[u8]) -> MxapResult<MxapPdu> {
        codec::decode_pdu(Self::profile(), data)
    }

    /// Session start toward every peer of a fan-out round; carries no
    /// peer-specific field so one buffer serves all of them.
    fn encode_start(session: &MbmsSession) -> MxapResult<Bytes> {
        Self::encode(&MxapMessage::SessionStartRequest(SessionStartRequest {
            local_id: session.local_id,
            tmgi: session.tmgi,
            service_area_id: session.service_area_id,
            bearer_qos: session.bearer_qos,
            tnl: session.ip_mc_distribution,
        }))
    }

    fn encode_update(session: &MbmsSession, remote_id: u32) -> MxapResult<Bytes> {
        Self::encode(&MxapMessage::SessionUpdateRequest(SessionUpdateRequest {
            local_id: session.local_id,
            remote_id,
            tmgi: session.tmgi,
            service_area_id: session.service_area_id,
            bearer_qos: session.bearer_qos,
            tnl: session.ip_mc_distribution,
        }))
    }

    /// Session stop; the remote id is absent for peers that never answered
    /// the start.
    fn encode_stop(local_id: u32, remote_id: Option<u32>) -> MxapResult<Bytes> {
        Self::encode(&MxapMessage::SessionStopRequest(SessionIds { local_id, remote_id }))
    }

    /// Look up the dispatch entry of a wire procedure code
    fn dispatch_entry(code: u8) -> Option<&'static DispatchEntry> {
        let entry = Self::dispatch_table().get(code as usize)?;
        debug_assert_eq!(entry.code, code, "{} dispatch table out of order", Self::NAME);
        Some(entry)
    }
}

/// Handler slots shared by both dialects
pub(crate) mod slots {
    use super::HandlerKind::*;
    use super::HandlerKind;

    pub const NONE: [Option<HandlerKind>; 3] = [None, None, None];
    pub const SESSION_START: [Option<HandlerKind>; 3] =
        [None, Some(SessionStartResponse), Some(SessionStartFailure)];
    pub const SESSION_STOP: [Option<HandlerKind>; 3] = [None, Some(SessionStopResponse), None];
    pub const SESSION_UPDATE: [Option<HandlerKind>; 3] =
        [None, Some(SessionUpdateResponse), Some(SessionUpdateFailure)];
    pub const ERROR_INDICATION: [Option<HandlerKind>; 3] = [Some(ErrorIndication), None, None];
    pub const RESET: [Option<HandlerKind>; 3] = [Some(Reset), None, None];
    pub const SETUP: [Option<HandlerKind>; 3] = [Some(SetupRequest), None, None];
}
