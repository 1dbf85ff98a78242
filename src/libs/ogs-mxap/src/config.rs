//! MCE Configuration
//!
//! The `mce:` section of the daemon's YAML file. Every key is optional.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{MxapError, MxapResult};
use crate::types::{PlmnId, ServiceAreaId};

/// Upper bound of service areas kept per peer
pub const MAX_MBMS_SA: usize = 8;

/// Per-personality protocol settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProtocolConfig {
    pub port: u16,
    /// Outcome drop timer (seconds)
    pub outcome_timer: u64,
}

impl ProtocolConfig {
    fn with_port(port: u16) -> Self {
        Self { port, outcome_timer: 5 }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::with_port(crate::M2AP_SCTP_PORT)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SctpConfig {
    pub in_streams: u16,
    pub out_streams: u16,
}

impl Default for SctpConfig {
    fn default() -> Self {
        Self { in_streams: 32, out_streams: 32 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlmnConfig {
    pub mcc: u16,
    pub mnc: u16,
}

impl Default for PlmnConfig {
    fn default() -> Self {
        Self { mcc: 208, mnc: 34 }
    }
}

impl PlmnConfig {
    pub fn plmn_id(&self) -> PlmnId {
        PlmnId::new(self.mcc, self.mnc, if self.mnc > 99 { 3 } else { 2 })
    }
}

/// MBMS service-area admission policy.
///
/// Service areas `1..=global_service_area_types` are global. Above that,
/// each local area spans `local_service_area_types` ids and only the first
/// `local_service_areas` local areas are served.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceAreaPolicy {
    pub global_service_area_types: u16,
    pub local_service_area_types: u16,
    pub local_service_areas: u16,
    pub short_idle_session_duration_in_sec: u8,
}

impl Default for ServiceAreaPolicy {
    fn default() -> Self {
        Self {
            global_service_area_types: 1,
            local_service_area_types: 1,
            local_service_areas: 1,
            short_idle_session_duration_in_sec: 5,
        }
    }
}

impl ServiceAreaPolicy {
    pub fn is_global(&self, sai: ServiceAreaId) -> bool {
        sai <= self.global_service_area_types
    }

    pub fn admits(&self, sai: ServiceAreaId) -> bool {
        if self.is_global(sai) {
            return true;
        }
        if self.local_service_area_types == 0 {
            return false;
        }
        let val = (sai - self.global_service_area_types + 1) as u32;
        val / (self.local_service_area_types as u32) < self.local_service_areas as u32
    }

    /// Admitted subset of an advertised list, order kept, at most
    /// `MAX_MBMS_SA` entries, no duplicates.
    pub fn filter(&self, advertised: &[ServiceAreaId]) -> Vec<ServiceAreaId> {
        let mut admitted = Vec::with_capacity(MAX_MBMS_SA);
        for &sai in advertised {
            if admitted.len() == MAX_MBMS_SA {
                break;
            }
            if self.admits(sai) && !admitted.contains(&sai) {
                admitted.push(sai);
            }
        }
        admitted
    }
}

/// MCE configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MxapConfig {
    /// Session registry capacity
    pub max_mbms_services: usize,
    pub max_m2_enbs: usize,
    pub max_m3_mces: usize,
    pub m2ap: ProtocolConfig,
    pub m3ap: ProtocolConfig,
    pub sctp: SctpConfig,
    /// Inbox capacity of each personality task
    pub event_queue_size: usize,
    pub global_mce_id: u32,
    pub mce_name: Option<String>,
    pub plmn: PlmnConfig,
    pub relative_capacity: u8,
    pub mbms: ServiceAreaPolicy,
}

impl Default for MxapConfig {
    fn default() -> Self {
        Self {
            max_mbms_services: 16,
            max_m2_enbs: 8,
            max_m3_mces: 8,
            m2ap: ProtocolConfig::with_port(crate::M2AP_SCTP_PORT),
            m3ap: ProtocolConfig::with_port(crate::M3AP_SCTP_PORT),
            sctp: SctpConfig::default(),
            event_queue_size: 4096,
            global_mce_id: 1,
            mce_name: None,
            plmn: PlmnConfig::default(),
            relative_capacity: 15,
            mbms: ServiceAreaPolicy::default(),
        }
    }
}

impl MxapConfig {
    /// Parse a YAML document; the `mce` section is used when present,
    /// otherwise the document itself.
    pub fn from_yaml_str(content: &str) -> MxapResult<Self> {
        let yaml: Value = serde_yaml::from_str(content)?;
        let section = match yaml.get("mce") {
            Some(section) => section.clone(),
            None if yaml.is_null() => return Ok(Self::default()),
            None => yaml,
        };
        let config: Self = serde_yaml::from_value(section)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> MxapResult<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(MxapError::Config(format!("{}: {e}", path.display()))),
        }
    }

    pub fn validate(&self) -> MxapResult<()> {
        if self.max_mbms_services == 0 {
            return Err(MxapError::Config("max_mbms_services must be non-zero".into()));
        }
        if self.max_m2_enbs == 0 || self.max_m3_mces == 0 {
            return Err(MxapError::Config("peer limits must be non-zero".into()));
        }
        if self.sctp.in_streams == 0 || self.sctp.out_streams == 0 {
            return Err(MxapError::Config("SCTP stream counts must be non-zero".into()));
        }
        if self.event_queue_size == 0 {
            return Err(MxapError::Config("event_queue_size must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MxapConfig::default();
        assert_eq!(config.max_mbms_services, 16);
        assert_eq!(config.m2ap.port, 36443);
        assert_eq!(config.m3ap.port, 36444);
        assert_eq!(config.m3ap.outcome_timer, 5);
        assert_eq!(config.plmn.plmn_id().to_string(), "208-34");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_mce_section() {
        let yaml = r#"
logger:
  level: info
mce:
  max_mbms_services: 4
  max_m2_enbs: 2
  m3ap:
    outcome_timer: 3
  mce_name: mce-1
  mbms:
    global_service_area_types: 2
"#;
        let config = MxapConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_mbms_services, 4);
        assert_eq!(config.max_m2_enbs, 2);
        assert_eq!(config.max_m3_mces, 8);
        assert_eq!(config.m3ap.outcome_timer, 3);
        assert_eq!(config.m3ap.port, 36444);
        assert_eq!(config.mce_name.as_deref(), Some("mce-1"));
        assert_eq!(config.mbms.global_service_area_types, 2);
        assert_eq!(config.mbms.local_service_areas, 1);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(MxapConfig::from_yaml_str("").unwrap(), MxapConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let err = MxapConfig::from_yaml_str("mce:\n  max_m3_mces: 0\n").unwrap_err();
        assert!(matches!(err, MxapError::Config(_)));
        assert!(MxapConfig::from_yaml_str("mce: [1, 2").is_err());
    }

    #[test]
    fn test_service_area_policy() {
        let policy = ServiceAreaPolicy {
            global_service_area_types: 2,
            local_service_area_types: 3,
            local_service_areas: 2,
            short_idle_session_duration_in_sec: 5,
        };
        assert!(policy.admits(1));
        assert!(policy.admits(2));
        // (sai - 2 + 1) / 3 < 2  <=>  sai <= 6
        assert!(policy.admits(6));
        assert!(!policy.admits(7));
        assert_eq!(policy.filter(&[7, 1, 3, 1, 100]), vec![1, 3]);
    }

    #[test]
    fn test_service_area_filter_caps_list() {
        let policy = ServiceAreaPolicy {
            global_service_area_types: 100,
            ..Default::default()
        };
        let advertised: Vec<u16> = (1..=20).collect();
        assert_eq!(policy.filter(&advertised).len(), MAX_MBMS_SA);
    }
}
