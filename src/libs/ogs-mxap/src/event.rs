//! MxAP Task Events
//!
//! Everything a personality task consumes (`MxapEvent`) and produces
//! (`SctpRequest` toward the transport, `UpstreamIndication` toward
//! MCE_APP).

use bytes::Bytes;

use crate::timer::TimerExpiry;
use crate::types::*;

/// Session start request from MCE_APP
#[derive(Debug, Clone, PartialEq)]
pub struct MbmsSessionStartReq {
    pub tmgi: Tmgi,
    pub service_area_id: ServiceAreaId,
    pub bearer_qos: BearerQos,
    pub ip_mc_distribution: IpMcDistribution,
    /// Absolute start time, unset for an immediate start
    pub abs_start_time: AbsoluteTime,
}

/// Session update request from MCE_APP
#[derive(Debug, Clone, PartialEq)]
pub struct MbmsSessionUpdateReq {
    pub tmgi: Tmgi,
    pub old_service_area_id: ServiceAreaId,
    pub new_service_area_id: ServiceAreaId,
    pub bearer_qos: BearerQos,
    pub ip_mc_distribution: IpMcDistribution,
    pub abs_update_time: AbsoluteTime,
}

/// Session stop request from MCE_APP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbmsSessionStopReq {
    pub tmgi: Tmgi,
    pub service_area_id: ServiceAreaId,
    /// Send Session Stop to the peers of the service area
    pub inform_peers: bool,
}

/// MCE_APP answer to an `UpstreamIndication::SetupRequest`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSetupResponse {
    pub assoc_id: AssocId,
    pub peer_id: u32,
    /// Service areas confirmed by MCE_APP, empty to keep the admitted ones
    pub service_areas: Vec<ServiceAreaId>,
    pub mbsfn_areas: Vec<MbsfnArea>,
    pub local_mbms_area: u8,
}

/// Inbound event of a personality task
#[derive(Debug, Clone, PartialEq)]
pub enum MxapEvent {
    MbmsSessionStartReq(MbmsSessionStartReq),
    MbmsSessionUpdateReq(MbmsSessionUpdateReq),
    MbmsSessionStopReq(MbmsSessionStopReq),
    PeerSetupResponse(PeerSetupResponse),

    /// SCTP association established
    NewAssociation {
        assoc_id: AssocId,
        in_streams: StreamId,
        out_streams: StreamId,
    },
    /// SCTP association restarted by the peer
    AssociationReset { assoc_id: AssocId },
    /// SCTP association gone
    AssociationClosed { assoc_id: AssocId },
    /// SCTP data indication
    InboundData {
        assoc_id: AssocId,
        stream: StreamId,
        payload: Bytes,
    },

    TimerExpired(TimerExpiry),
    Terminate,
}

impl MxapEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MxapEvent::MbmsSessionStartReq(_) => "MBMS_SESSION_START_REQUEST",
            MxapEvent::MbmsSessionUpdateReq(_) => "MBMS_SESSION_UPDATE_REQUEST",
            MxapEvent::MbmsSessionStopReq(_) => "MBMS_SESSION_STOP_REQUEST",
            MxapEvent::PeerSetupResponse(_) => "PEER_SETUP_RESPONSE",
            MxapEvent::NewAssociation { .. } => "SCTP_NEW_ASSOCIATION",
            MxapEvent::AssociationReset { .. } => "SCTP_RESET_ASSOCIATION",
            MxapEvent::AssociationClosed { .. } => "SCTP_CLOSE_ASSOCIATION",
            MxapEvent::InboundData { .. } => "SCTP_DATA_IND",
            MxapEvent::TimerExpired(_) => "TIMER_HAS_EXPIRED",
            MxapEvent::Terminate => "TERMINATE",
        }
    }
}

/// Outbound PDU for the SCTP transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SctpRequest {
    pub assoc_id: AssocId,
    pub stream: StreamId,
    pub ppid: u32,
    pub payload: Bytes,
}

/// Indication toward MCE_APP
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamIndication {
    /// A peer asked for setup; MCE_APP decides its MBSFN areas
    SetupRequest {
        personality: &'static str,
        assoc_id: AssocId,
        peer_id: u32,
        service_areas: Vec<ServiceAreaId>,
    },
}
