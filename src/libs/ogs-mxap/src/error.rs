//! MxAP Error Types

use thiserror::Error;

use crate::types::AssocId;

/// MxAP Result type
pub type MxapResult<T> = Result<T, MxapError>;

/// Errors raised by the MBMS directory, the procedure engine and the codec
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MxapError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Missing mandatory IE: {0}")]
    MissingMandatoryIe(&'static str),

    #[error("Invalid IE value for {ie_name}: {reason}")]
    InvalidIeValue { ie_name: &'static str, reason: String },

    #[error("Unknown procedure code {0}")]
    UnknownProcedure(u8),

    #[error("Unknown direction {0}")]
    UnknownDirection(u8),

    #[error("No handler for procedure code {code} in {direction}")]
    NoHandler { code: u8, direction: &'static str },

    #[error("Unexpected message for procedure code {0}")]
    UnexpectedMessage(u8),

    #[error("MBMS session {0:#x} not found")]
    SessionNotFound(u32),

    #[error("Peer with association {0} not found")]
    PeerNotFound(AssocId),

    #[error("MBMS session id {0:#x} already in use")]
    DuplicateSession(u32),

    #[error("MBMS session capacity {0} reached")]
    SessionLimit(usize),

    #[error("Association {assoc_id} already present in peer-map of session {local_id:#x}")]
    PeerMapConflict { local_id: u32, assoc_id: AssocId },

    #[error("No remote MBMS id for association {assoc_id} in session {local_id:#x}")]
    MissingRemoteId { local_id: u32, assoc_id: AssocId },

    #[error("Peer limit {0} reached")]
    PeerLimit(usize),

    #[error("Peer with association {0} is being torn down")]
    PeerBusy(AssocId),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Event queue of {0} full")]
    QueueFull(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_yaml::Error> for MxapError {
    fn from(e: serde_yaml::Error) -> Self {
        MxapError::Config(e.to_string())
    }
}
