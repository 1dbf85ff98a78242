//! MxAP Common Types
//!
//! Identifiers and parameter blocks shared by the M2AP and M3AP
//! personalities (TS 36.443 / TS 36.444).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// SCTP association identifier
pub type AssocId = u32;
/// SCTP stream identifier
pub type StreamId = u16;
/// MBMS Service Area Identity
pub type ServiceAreaId = u16;

// ============================================================================
// PLMN / TMGI
// ============================================================================

/// PLMN identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlmnId {
    pub mcc: u16,
    pub mnc: u16,
    /// Number of MNC digits (2 or 3)
    pub mnc_len: u8,
}

impl PlmnId {
    pub fn new(mcc: u16, mnc: u16, mnc_len: u8) -> Self {
        Self { mcc, mnc, mnc_len }
    }

    /// Encode as the 3-octet TBCD PLMN identity (TS 24.008 10.5.1.3)
    pub fn to_bytes(&self) -> [u8; 3] {
        let mcc1 = ((self.mcc / 100) % 10) as u8;
        let mcc2 = ((self.mcc / 10) % 10) as u8;
        let mcc3 = (self.mcc % 10) as u8;
        let (mnc1, mnc2, mnc3) = if self.mnc_len == 3 {
            (
                ((self.mnc / 100) % 10) as u8,
                ((self.mnc / 10) % 10) as u8,
                (self.mnc % 10) as u8,
            )
        } else {
            (((self.mnc / 10) % 10) as u8, (self.mnc % 10) as u8, 0x0f)
        };
        [(mcc2 << 4) | mcc1, (mnc3 << 4) | mcc3, (mnc2 << 4) | mnc1]
    }

    /// Decode a 3-octet TBCD PLMN identity
    pub fn from_bytes(b: &[u8; 3]) -> Self {
        let mcc1 = (b[0] & 0x0f) as u16;
        let mcc2 = (b[0] >> 4) as u16;
        let mcc3 = (b[1] & 0x0f) as u16;
        let mnc3 = (b[1] >> 4) as u16;
        let mnc1 = (b[2] & 0x0f) as u16;
        let mnc2 = (b[2] >> 4) as u16;
        let mcc = mcc1 * 100 + mcc2 * 10 + mcc3;
        if mnc3 == 0x0f {
            Self { mcc, mnc: mnc1 * 10 + mnc2, mnc_len: 2 }
        } else {
            Self { mcc, mnc: mnc1 * 100 + mnc2 * 10 + mnc3, mnc_len: 3 }
        }
    }
}

impl fmt::Display for PlmnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mnc_len == 3 {
            write!(f, "{:03}-{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}-{:02}", self.mcc, self.mnc)
        }
    }
}

/// Temporary Mobile Group Identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tmgi {
    pub plmn_id: PlmnId,
    /// MBMS Service ID (24 bits)
    pub service_id: u32,
}

impl Tmgi {
    pub fn new(plmn_id: PlmnId, service_id: u32) -> Self {
        Self { plmn_id, service_id: service_id & 0x00ff_ffff }
    }
}

impl fmt::Display for Tmgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:06x}", self.plmn_id, self.service_id)
    }
}

// ============================================================================
// MBMS bearer parameters
// ============================================================================

/// Allocation and Retention Priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Arp {
    pub priority_level: u8,
    pub pre_emption_capability: bool,
    pub pre_emption_vulnerability: bool,
}

/// MBMS E-RAB QoS parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BearerQos {
    pub qci: u8,
    pub mbr_ul: u64,
    pub mbr_dl: u64,
    pub gbr_ul: u64,
    pub gbr_dl: u64,
    pub arp: Arp,
}

/// IP multicast distribution parameters of an MBMS bearer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpMcDistribution {
    /// Common tunnel endpoint identifier (downlink)
    pub cteid: u32,
    pub distribution_address: IpAddr,
    pub source_address: IpAddr,
}

impl Default for IpMcDistribution {
    fn default() -> Self {
        Self {
            cteid: 0,
            distribution_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            source_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

/// Absolute start/update time of an MBMS data transfer (UNIX epoch)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsoluteTime {
    pub sec: u64,
    pub usec: u32,
}

impl AbsoluteTime {
    pub fn new(sec: u64, usec: u32) -> Self {
        Self { sec, usec }
    }

    pub fn is_set(&self) -> bool {
        self.sec != 0
    }

    /// Delay from `now` until this time, zero if already passed.
    /// Returns `None` when no time is set.
    pub fn delay_from(&self, now: SystemTime) -> Option<Duration> {
        if !self.is_set() {
            return None;
        }
        let at = UNIX_EPOCH + Duration::new(self.sec, self.usec.min(999_999) * 1000);
        Some(at.duration_since(now).unwrap_or(Duration::ZERO))
    }
}

// ============================================================================
// Cause / TimeToWait
// ============================================================================

/// Cause IE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(u8),
    Transport(u8),
    Nas(u8),
    Protocol(u8),
    Misc(u8),
}

/// CauseProtocol values
pub mod cause_protocol {
    pub const TRANSFER_SYNTAX_ERROR: u8 = 0;
    pub const ABSTRACT_SYNTAX_ERROR_REJECT: u8 = 1;
    pub const MESSAGE_NOT_COMPATIBLE_WITH_RECEIVER_STATE: u8 = 3;
    pub const SEMANTIC_ERROR: u8 = 4;
    pub const UNSPECIFIED: u8 = 6;
}

/// CauseMisc values
pub mod cause_misc {
    pub const CONTROL_PROCESSING_OVERLOAD: u8 = 0;
    pub const HARDWARE_FAILURE: u8 = 1;
    pub const OM_INTERVENTION: u8 = 2;
    pub const UNSPECIFIED: u8 = 3;
}

impl Cause {
    pub fn group(&self) -> u8 {
        match self {
            Cause::RadioNetwork(_) => 0,
            Cause::Transport(_) => 1,
            Cause::Nas(_) => 2,
            Cause::Protocol(_) => 3,
            Cause::Misc(_) => 4,
        }
    }

    pub fn value(&self) -> u8 {
        match *self {
            Cause::RadioNetwork(v)
            | Cause::Transport(v)
            | Cause::Nas(v)
            | Cause::Protocol(v)
            | Cause::Misc(v) => v,
        }
    }

    pub fn from_parts(group: u8, value: u8) -> Option<Self> {
        match group {
            0 => Some(Cause::RadioNetwork(value)),
            1 => Some(Cause::Transport(value)),
            2 => Some(Cause::Nas(value)),
            3 => Some(Cause::Protocol(value)),
            4 => Some(Cause::Misc(value)),
            _ => None,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork(v) => write!(f, "radioNetwork/{v}"),
            Cause::Transport(v) => write!(f, "transport/{v}"),
            Cause::Nas(v) => write!(f, "nas/{v}"),
            Cause::Protocol(v) => write!(f, "protocol/{v}"),
            Cause::Misc(v) => write!(f, "misc/{v}"),
        }
    }
}

/// Time to Wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimeToWait {
    V1s = 0,
    V2s = 1,
    V5s = 2,
    V10s = 3,
    V20s = 4,
    V60s = 5,
}

impl TryFrom<u8> for TimeToWait {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(TimeToWait::V1s),
            1 => Ok(TimeToWait::V2s),
            2 => Ok(TimeToWait::V5s),
            3 => Ok(TimeToWait::V10s),
            4 => Ok(TimeToWait::V20s),
            5 => Ok(TimeToWait::V60s),
            other => Err(other),
        }
    }
}

// ============================================================================
// Setup / Reset parameters
// ============================================================================

/// MBSFN area assigned to a peer by the upstream MCE_APP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MbsfnArea {
    pub mbsfn_area_id: u8,
    pub service_area_id: ServiceAreaId,
}

/// One MBMS-service-associated logical connection in a partial reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetItem {
    /// Our session id
    pub local_id: Option<u32>,
    /// The peer's session id
    pub remote_id: Option<u32>,
}

/// Reset type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetType {
    /// Whole M2/M3 interface
    Interface,
    /// Listed MBMS-service-associated connections only
    PartOfInterface(Vec<ResetItem>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plmn_id_tbcd() {
        let plmn = PlmnId::new(208, 1, 2);
        let bytes = plmn.to_bytes();
        assert_eq!(bytes, [0x02, 0xf8, 0x10]);
        assert_eq!(PlmnId::from_bytes(&bytes), plmn);

        let plmn3 = PlmnId::new(310, 410, 3);
        assert_eq!(PlmnId::from_bytes(&plmn3.to_bytes()), plmn3);
    }

    #[test]
    fn test_tmgi_display() {
        let tmgi = Tmgi::new(PlmnId::new(208, 1, 2), 5);
        assert_eq!(tmgi.to_string(), "208-01/000005");
    }

    #[test]
    fn test_tmgi_service_id_masked() {
        let tmgi = Tmgi::new(PlmnId::default(), 0x1234_5678);
        assert_eq!(tmgi.service_id, 0x34_5678);
    }

    #[test]
    fn test_absolute_time_delay() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(AbsoluteTime::default().delay_from(now), None);
        assert_eq!(
            AbsoluteTime::new(1_010, 0).delay_from(now),
            Some(Duration::from_secs(10))
        );
        assert_eq!(AbsoluteTime::new(900, 0).delay_from(now), Some(Duration::ZERO));
    }

    #[test]
    fn test_cause_parts() {
        let cause = Cause::Misc(cause_misc::CONTROL_PROCESSING_OVERLOAD);
        assert_eq!(Cause::from_parts(cause.group(), cause.value()), Some(cause));
        assert_eq!(Cause::from_parts(9, 0), None);
        assert_eq!(TimeToWait::try_from(4), Ok(TimeToWait::V20s));
        assert_eq!(TimeToWait::try_from(6), Err(6));
    }
}
