//! M2AP Personality (TS 36.443)
//!
//! MCE side of the M2 interface: peers are eNBs, local ids are
//! MCE-MBMS-M2AP-IDs (24 bits), remote ids are ENB-MBMS-M2AP-IDs (16 bits).

use std::time::Duration;

use crate::codec::{IeIds, WireProfile};
use crate::config::MxapConfig;
use crate::pdu::Procedure;
use crate::personality::{slots, DispatchEntry, Personality};

/// M2AP procedure codes
pub mod procedure_code {
    pub const SESSION_START: u8 = 0;
    pub const SESSION_STOP: u8 = 1;
    pub const MBMS_SCHEDULING_INFORMATION: u8 = 2;
    pub const ERROR_INDICATION: u8 = 3;
    pub const RESET: u8 = 4;
    pub const M2_SETUP: u8 = 5;
    pub const ENB_CONFIGURATION_UPDATE: u8 = 6;
    pub const MCE_CONFIGURATION_UPDATE: u8 = 7;
    pub const PRIVATE_MESSAGE: u8 = 8;
    pub const SESSION_UPDATE: u8 = 9;
    pub const MBMS_SERVICE_COUNTING: u8 = 10;
    pub const MBMS_SERVICE_COUNTING_RESULTS_REPORT: u8 = 11;
    pub const MBMS_OVERLOAD_NOTIFICATION: u8 = 12;
}

/// M2AP protocol IE identifiers
pub mod protocol_ie_id {
    pub const MCE_MBMS_M2AP_ID: u16 = 0;
    pub const ENB_MBMS_M2AP_ID: u16 = 1;
    pub const TMGI: u16 = 2;
    pub const MBMS_E_RAB_QOS_PARAMETERS: u16 = 4;
    pub const MBMS_SERVICE_AREA: u16 = 6;
    pub const TNL_INFORMATION: u16 = 7;
    pub const CAUSE: u16 = 9;
    pub const GLOBAL_ENB_ID: u16 = 13;
    pub const ENB_NAME: u16 = 14;
    pub const ENB_MBMS_CONFIGURATION_DATA_LIST: u16 = 15;
    pub const GLOBAL_MCE_ID: u16 = 17;
    pub const MCE_NAME: u16 = 18;
    pub const MCCH_RELATED_BCCH_CONFIG_PER_MBSFN_AREA: u16 = 19;
    pub const TIME_TO_WAIT: u16 = 21;
    pub const RESET_TYPE: u16 = 30;
    pub const MBMS_SERVICE_ASSOCIATED_LOGICAL_M2_CONNECTION_LIST_RES_ACK: u16 = 31;
}

/// MCE-MBMS-M2AP-ID range
pub const MCE_MBMS_M2AP_ID_MASK: u32 = 0x00ff_ffff;
/// ENB-MBMS-M2AP-ID range
pub const ENB_MBMS_M2AP_ID_MASK: u32 = 0xffff;

static PROFILE: WireProfile = WireProfile {
    name: "M2AP",
    procedures: &[
        (procedure_code::SESSION_START, Procedure::SessionStart),
        (procedure_code::SESSION_STOP, Procedure::SessionStop),
        (procedure_code::MBMS_SCHEDULING_INFORMATION, Procedure::SchedulingInformation),
        (procedure_code::ERROR_INDICATION, Procedure::ErrorIndication),
        (procedure_code::RESET, Procedure::Reset),
        (procedure_code::M2_SETUP, Procedure::Setup),
        (procedure_code::ENB_CONFIGURATION_UPDATE, Procedure::PeerConfigurationUpdate),
        (procedure_code::MCE_CONFIGURATION_UPDATE, Procedure::LocalConfigurationUpdate),
        (procedure_code::PRIVATE_MESSAGE, Procedure::PrivateMessage),
        (procedure_code::SESSION_UPDATE, Procedure::SessionUpdate),
        (procedure_code::MBMS_SERVICE_COUNTING, Procedure::ServiceCounting),
        (
            procedure_code::MBMS_SERVICE_COUNTING_RESULTS_REPORT,
            Procedure::ServiceCountingResultsReport,
        ),
        (procedure_code::MBMS_OVERLOAD_NOTIFICATION, Procedure::OverloadNotification),
    ],
    ie: IeIds {
        local_id: protocol_ie_id::MCE_MBMS_M2AP_ID,
        remote_id: protocol_ie_id::ENB_MBMS_M2AP_ID,
        tmgi: protocol_ie_id::TMGI,
        service_area: protocol_ie_id::MBMS_SERVICE_AREA,
        qos: protocol_ie_id::MBMS_E_RAB_QOS_PARAMETERS,
        tnl_information: protocol_ie_id::TNL_INFORMATION,
        cause: protocol_ie_id::CAUSE,
        time_to_wait: protocol_ie_id::TIME_TO_WAIT,
        reset_type: protocol_ie_id::RESET_TYPE,
        reset_ack_list: protocol_ie_id::MBMS_SERVICE_ASSOCIATED_LOGICAL_M2_CONNECTION_LIST_RES_ACK,
        global_node_id: protocol_ie_id::GLOBAL_ENB_ID,
        node_name: protocol_ie_id::ENB_NAME,
        service_area_list: protocol_ie_id::ENB_MBMS_CONFIGURATION_DATA_LIST,
        mbsfn_area_list: protocol_ie_id::MCCH_RELATED_BCCH_CONFIG_PER_MBSFN_AREA,
    },
    local_id_mask: MCE_MBMS_M2AP_ID_MASK,
    remote_id_mask: ENB_MBMS_M2AP_ID_MASK,
};

static DISPATCH_TABLE: [DispatchEntry; 13] = [
    DispatchEntry::new(procedure_code::SESSION_START, Procedure::SessionStart, slots::SESSION_START),
    DispatchEntry::new(procedure_code::SESSION_STOP, Procedure::SessionStop, slots::SESSION_STOP),
    DispatchEntry::new(
        procedure_code::MBMS_SCHEDULING_INFORMATION,
        Procedure::SchedulingInformation,
        slots::NONE,
    ),
    DispatchEntry::new(
        procedure_code::ERROR_INDICATION,
        Procedure::ErrorIndication,
        slots::ERROR_INDICATION,
    ),
    DispatchEntry::new(procedure_code::RESET, Procedure::Reset, slots::RESET),
    DispatchEntry::new(procedure_code::M2_SETUP, Procedure::Setup, slots::SETUP),
    DispatchEntry::new(
        procedure_code::ENB_CONFIGURATION_UPDATE,
        Procedure::PeerConfigurationUpdate,
        slots::NONE,
    ),
    DispatchEntry::new(
        procedure_code::MCE_CONFIGURATION_UPDATE,
        Procedure::LocalConfigurationUpdate,
        slots::NONE,
    ),
    DispatchEntry::new(procedure_code::PRIVATE_MESSAGE, Procedure::PrivateMessage, slots::NONE),
    DispatchEntry::new(procedure_code::SESSION_UPDATE, Procedure::SessionUpdate, slots::SESSION_UPDATE),
    DispatchEntry::new(procedure_code::MBMS_SERVICE_COUNTING, Procedure::ServiceCounting, slots::NONE),
    DispatchEntry::new(
        procedure_code::MBMS_SERVICE_COUNTING_RESULTS_REPORT,
        Procedure::ServiceCountingResultsReport,
        slots::NONE,
    ),
    DispatchEntry::new(
        procedure_code::MBMS_OVERLOAD_NOTIFICATION,
        Procedure::OverloadNotification,
        slots::NONE,
    ),
];

/// M2AP personality
#[derive(Debug, Clone, Copy, Default)]
pub struct M2ap;

impl Personality for M2ap {
    const NAME: &'static str = "M2AP";
    const SCTP_PORT: u16 = crate::M2AP_SCTP_PORT;
    const SCTP_PPID: u32 = crate::M2AP_SCTP_PPID;

    fn profile() -> &'static WireProfile {
        &PROFILE
    }

    fn dispatch_table() -> &'static [DispatchEntry] {
        &DISPATCH_TABLE
    }

    fn max_peers(config: &MxapConfig) -> usize {
        config.max_m2_enbs
    }

    fn outcome_timer(config: &MxapConfig) -> Duration {
        Duration::from_secs(config.m2ap.outcome_timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::Direction;
    use crate::personality::HandlerKind;

    #[test]
    fn test_dispatch_table_indexed_by_code() {
        for (i, entry) in M2ap::dispatch_table().iter().enumerate() {
            assert_eq!(entry.code as usize, i);
            assert_eq!(M2ap::profile().procedure(entry.code), Some(entry.procedure));
        }
    }

    #[test]
    fn test_dispatch_entries() {
        let update = M2ap::dispatch_entry(procedure_code::SESSION_UPDATE).unwrap();
        assert_eq!(update.procedure, Procedure::SessionUpdate);
        assert_eq!(
            update.handler(Direction::UnsuccessfulOutcome),
            Some(HandlerKind::SessionUpdateFailure)
        );
        assert_eq!(update.handler(Direction::InitiatingMessage), None);

        let counting = M2ap::dispatch_entry(procedure_code::MBMS_SERVICE_COUNTING).unwrap();
        assert!(counting.handlers.iter().all(Option::is_none));
        assert!(M2ap::dispatch_entry(13).is_none());
    }

    #[test]
    fn test_id_widths() {
        assert_eq!(M2ap::local_id_mask(), 0x00ff_ffff);
        assert_eq!(M2ap::profile().remote_id_mask, 0xffff);
    }
}
