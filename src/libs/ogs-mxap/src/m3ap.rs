//! M3AP Personality (TS 36.444)
//!
//! MME-facing side of the M3 interface: local ids are MME-MBMS-M3AP-IDs,
//! remote ids are MCE-MBMS-M3AP-IDs, both 16 bits.

use std::time::Duration;

use crate::codec::{IeIds, WireProfile};
use crate::config::MxapConfig;
use crate::pdu::Procedure;
use crate::personality::{slots, DispatchEntry, Personality};

/// M3AP procedure codes
pub mod procedure_code {
    pub const SESSION_START: u8 = 0;
    pub const SESSION_STOP: u8 = 1;
    pub const ERROR_INDICATION: u8 = 2;
    pub const PRIVATE_MESSAGE: u8 = 3;
    pub const RESET: u8 = 4;
    pub const SESSION_UPDATE: u8 = 5;
    pub const MCE_CONFIGURATION_UPDATE: u8 = 6;
    pub const M3_SETUP: u8 = 7;
}

/// M3AP protocol IE identifiers
pub mod protocol_ie_id {
    pub const MME_MBMS_M3AP_ID: u16 = 0;
    pub const MCE_MBMS_M3AP_ID: u16 = 1;
    pub const TMGI: u16 = 2;
    pub const MBMS_E_RAB_QOS_PARAMETERS: u16 = 4;
    pub const MBMS_SERVICE_AREA: u16 = 6;
    pub const TNL_INFORMATION: u16 = 7;
    pub const CAUSE: u16 = 9;
    pub const MBMS_SERVICE_AREA_LIST: u16 = 10;
    pub const TIME_TO_WAIT: u16 = 12;
    pub const RESET_TYPE: u16 = 13;
    pub const MBMS_SERVICE_ASSOCIATED_LOGICAL_M3_CONNECTION_LIST_RES_ACK: u16 = 15;
    pub const GLOBAL_MCE_ID: u16 = 18;
    pub const MCE_NAME: u16 = 19;
    pub const MBMS_SERVICE_AREA_LIST_SETUP: u16 = 20;
}

/// MME-MBMS-M3AP-ID range
pub const MME_MBMS_M3AP_ID_MASK: u32 = 0xffff;
/// MCE-MBMS-M3AP-ID range
pub const MCE_MBMS_M3AP_ID_MASK: u32 = 0xffff;

static PROFILE: WireProfile = WireProfile {
    name: "M3AP",
    procedures: &[
        (procedure_code::SESSION_START, Procedure::SessionStart),
        (procedure_code::SESSION_STOP, Procedure::SessionStop),
        (procedure_code::ERROR_INDICATION, Procedure::ErrorIndication),
        (procedure_code::PRIVATE_MESSAGE, Procedure::PrivateMessage),
        (procedure_code::RESET, Procedure::Reset),
        (procedure_code::SESSION_UPDATE, Procedure::SessionUpdate),
        (procedure_code::MCE_CONFIGURATION_UPDATE, Procedure::PeerConfigurationUpdate),
        (procedure_code::M3_SETUP, Procedure::Setup),
    ],
    ie: IeIds {
        local_id: protocol_ie_id::MME_MBMS_M3AP_ID,
        remote_id: protocol_ie_id::MCE_MBMS_M3AP_ID,
        tmgi: protocol_ie_id::TMGI,
        service_area: protocol_ie_id::MBMS_SERVICE_AREA,
        qos: protocol_ie_id::MBMS_E_RAB_QOS_PARAMETERS,
        tnl_information: protocol_ie_id::TNL_INFORMATION,
        cause: protocol_ie_id::CAUSE,
        time_to_wait: protocol_ie_id::TIME_TO_WAIT,
        reset_type: protocol_ie_id::RESET_TYPE,
        reset_ack_list: protocol_ie_id::MBMS_SERVICE_ASSOCIATED_LOGICAL_M3_CONNECTION_LIST_RES_ACK,
        global_node_id: protocol_ie_id::GLOBAL_MCE_ID,
        node_name: protocol_ie_id::MCE_NAME,
        service_area_list: protocol_ie_id::MBMS_SERVICE_AREA_LIST_SETUP,
        mbsfn_area_list: protocol_ie_id::MBMS_SERVICE_AREA_LIST,
    },
    local_id_mask: MME_MBMS_M3AP_ID_MASK,
    remote_id_mask: MCE_MBMS_M3AP_ID_MASK,
};

static DISPATCH_TABLE: [DispatchEntry; 8] = [
    DispatchEntry::new(procedure_code::SESSION_START, Procedure::SessionStart, slots::SESSION_START),
    DispatchEntry::new(procedure_code::SESSION_STOP, Procedure::SessionStop, slots::SESSION_STOP),
    DispatchEntry::new(
        procedure_code::ERROR_INDICATION,
        Procedure::ErrorIndication,
        slots::ERROR_INDICATION,
    ),
    DispatchEntry::new(procedure_code::PRIVATE_MESSAGE, Procedure::PrivateMessage, slots::NONE),
    DispatchEntry::new(procedure_code::RESET, Procedure::Reset, slots::RESET),
    DispatchEntry::new(procedure_code::SESSION_UPDATE, Procedure::SessionUpdate, slots::SESSION_UPDATE),
    DispatchEntry::new(
        procedure_code::MCE_CONFIGURATION_UPDATE,
        Procedure::PeerConfigurationUpdate,
        slots::NONE,
    ),
    DispatchEntry::new(procedure_code::M3_SETUP, Procedure::Setup, slots::SETUP),
];

/// M3AP personality
#[derive(Debug, Clone, Copy, Default)]
pub struct M3ap;

impl Personality for M3ap {
    const NAME: &'static str = "M3AP";
    const SCTP_PORT: u16 = crate::M3AP_SCTP_PORT;
    const SCTP_PPID: u32 = crate::M3AP_SCTP_PPID;

    fn profile() -> &'static WireProfile {
        &PROFILE
    }

    fn dispatch_table() -> &'static [DispatchEntry] {
        &DISPATCH_TABLE
    }

    fn max_peers(config: &MxapConfig) -> usize {
        config.max_m3_mces
    }

    fn outcome_timer(config: &MxapConfig) -> Duration {
        Duration::from_secs(config.m3ap.outcome_timer)
    }
}
