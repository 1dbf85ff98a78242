//! MxAP PDU Model
//!
//! Typed elementary-procedure messages shared by both personalities.
//! Procedure codes and IE identifiers are personality specific and live in
//! the `m2ap` / `m3ap` modules.

use std::fmt;

use crate::types::{
    BearerQos, Cause, IpMcDistribution, MbsfnArea, PlmnId, ResetItem, ResetType,
    ServiceAreaId, TimeToWait, Tmgi,
};

/// Message direction (the PDU CHOICE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    InitiatingMessage = 0,
    SuccessfulOutcome = 1,
    UnsuccessfulOutcome = 2,
}

impl Direction {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::InitiatingMessage => "Initiating message",
            Direction::SuccessfulOutcome => "Successful outcome",
            Direction::UnsuccessfulOutcome => "Unsuccessful outcome",
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(Direction::InitiatingMessage),
            1 => Ok(Direction::SuccessfulOutcome),
            2 => Ok(Direction::UnsuccessfulOutcome),
            other => Err(other),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Criticality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Criticality {
    Reject = 0,
    Ignore = 1,
    Notify = 2,
}

impl TryFrom<u8> for Criticality {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(Criticality::Reject),
            1 => Ok(Criticality::Ignore),
            2 => Ok(Criticality::Notify),
            other => Err(other),
        }
    }
}

/// Elementary procedures known to the directory, independent of wire codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    SessionStart,
    SessionStop,
    SessionUpdate,
    ErrorIndication,
    Reset,
    Setup,
    PeerConfigurationUpdate,
    LocalConfigurationUpdate,
    PrivateMessage,
    SchedulingInformation,
    ServiceCounting,
    ServiceCountingResultsReport,
    OverloadNotification,
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Procedure::SessionStart => "MBMS Session Start",
            Procedure::SessionStop => "MBMS Session Stop",
            Procedure::SessionUpdate => "MBMS Session Update",
            Procedure::ErrorIndication => "Error Indication",
            Procedure::Reset => "Reset",
            Procedure::Setup => "Setup",
            Procedure::PeerConfigurationUpdate => "Peer Configuration Update",
            Procedure::LocalConfigurationUpdate => "Local Configuration Update",
            Procedure::PrivateMessage => "Private Message",
            Procedure::SchedulingInformation => "MBMS Scheduling Information",
            Procedure::ServiceCounting => "MBMS Service Counting",
            Procedure::ServiceCountingResultsReport => "MBMS Service Counting Results Report",
            Procedure::OverloadNotification => "MBMS Overload Notification",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Message bodies
// ============================================================================

/// MBMS Session Start Request
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStartRequest {
    pub local_id: u32,
    pub tmgi: Tmgi,
    pub service_area_id: ServiceAreaId,
    pub bearer_qos: BearerQos,
    pub tnl: IpMcDistribution,
}

/// MBMS Session Update Request
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdateRequest {
    pub local_id: u32,
    pub remote_id: u32,
    pub tmgi: Tmgi,
    pub service_area_id: ServiceAreaId,
    pub bearer_qos: BearerQos,
    pub tnl: IpMcDistribution,
}

/// Id pair carried by stop requests and by start/stop/update outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIds {
    pub local_id: u32,
    pub remote_id: Option<u32>,
}

/// Unsuccessful outcome of a session start or update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFailure {
    pub local_id: u32,
    pub remote_id: Option<u32>,
    pub cause: Cause,
}

/// Error Indication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorIndication {
    pub local_id: Option<u32>,
    pub remote_id: Option<u32>,
    pub cause: Option<Cause>,
}

/// M2 / M3 Setup Request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupRequest {
    pub plmn_id: PlmnId,
    pub global_id: u32,
    pub name: Option<String>,
    pub service_areas: Vec<ServiceAreaId>,
}

/// M2 / M3 Setup Response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupResponse {
    pub plmn_id: PlmnId,
    pub global_id: u32,
    pub name: Option<String>,
    pub mbsfn_areas: Vec<MbsfnArea>,
}

/// M2 / M3 Setup Failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupFailure {
    pub cause: Cause,
    pub time_to_wait: Option<TimeToWait>,
}

/// Reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reset {
    pub cause: Cause,
    pub reset_type: ResetType,
}

/// Reset Acknowledge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetAcknowledge {
    pub items: Vec<ResetItem>,
}

/// A decoded or to-be-encoded MxAP message
#[derive(Debug, Clone, PartialEq)]
pub enum MxapMessage {
    SessionStartRequest(SessionStartRequest),
    SessionStartResponse(SessionIds),
    SessionStartFailure(SessionFailure),
    SessionStopRequest(SessionIds),
    SessionStopResponse(SessionIds),
    SessionUpdateRequest(SessionUpdateRequest),
    SessionUpdateResponse(SessionIds),
    SessionUpdateFailure(SessionFailure),
    ErrorIndication(ErrorIndication),
    Reset(Reset),
    ResetAcknowledge(ResetAcknowledge),
    SetupRequest(SetupRequest),
    SetupResponse(SetupResponse),
    SetupFailure(SetupFailure),
}

impl MxapMessage {
    pub fn procedure(&self) -> Procedure {
        match self {
            MxapMessage::SessionStartRequest(_)
            | MxapMessage::SessionStartResponse(_)
            | MxapMessage::SessionStartFailure(_) => Procedure::SessionStart,
            MxapMessage::SessionStopRequest(_) | MxapMessage::SessionStopResponse(_) => {
                Procedure::SessionStop
            }
            MxapMessage::SessionUpdateRequest(_)
            | MxapMessage::SessionUpdateResponse(_)
            | MxapMessage::SessionUpdateFailure(_) => Procedure::SessionUpdate,
            MxapMessage::ErrorIndication(_) => Procedure::ErrorIndication,
            MxapMessage::Reset(_) | MxapMessage::ResetAcknowledge(_) => Procedure::Reset,
            MxapMessage::SetupRequest(_)
            | MxapMessage::SetupResponse(_)
            | MxapMessage::SetupFailure(_) => Procedure::Setup,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            MxapMessage::SessionStartRequest(_)
            | MxapMessage::SessionStopRequest(_)
            | MxapMessage::SessionUpdateRequest(_)
            | MxapMessage::ErrorIndication(_)
            | MxapMessage::Reset(_)
            | MxapMessage::SetupRequest(_) => Direction::InitiatingMessage,
            MxapMessage::SessionStartResponse(_)
            | MxapMessage::SessionStopResponse(_)
            | MxapMessage::SessionUpdateResponse(_)
            | MxapMessage::ResetAcknowledge(_)
            | MxapMessage::SetupResponse(_) => Direction::SuccessfulOutcome,
            MxapMessage::SessionStartFailure(_)
            | MxapMessage::SessionUpdateFailure(_)
            | MxapMessage::SetupFailure(_) => Direction::UnsuccessfulOutcome,
        }
    }

    /// Criticality of the procedure as sent by this node
    pub fn criticality(&self) -> Criticality {
        match self.procedure() {
            Procedure::SessionStop | Procedure::ErrorIndication => Criticality::Ignore,
            _ => Criticality::Reject,
        }
    }
}

/// A PDU as seen by the dispatcher: wire procedure code and direction,
/// plus the typed message when the personality knows how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct MxapPdu {
    pub procedure_code: u8,
    pub direction: Direction,
    pub message: Option<MxapMessage>,
}
