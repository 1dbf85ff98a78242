//! NextGCore M2AP/M3AP MBMS Library
//!
//! MBMS session directory and procedure engine of the MCE, written once
//! and instantiated for both protocol dialects:
//!
//! - **M2AP** (3GPP TS 36.443) toward eNodeBs
//! - **M3AP** (3GPP TS 36.444) toward MCEs / the MME
//!
//! # Architecture
//!
//! - **Peer Registry** (`peer`): connected peers by SCTP association, their
//!   service areas and session counts
//! - **Session Registry** (`session`): MBMS sessions by local id, each with
//!   a peer-map of remote ids and at most one action timer
//! - **Procedure Engine** (`procedures`, `handlers`): session start, update
//!   and stop fan-out and reconciliation of peer answers
//! - **Dispatch** (`dispatch`, `task`): per-personality event loop, decode
//!   and handler table
//!
//! The ASN.1 codec is external; `codec` serialises typed messages into a
//! protocol-IE container with the real procedure codes and IE ids.
//!
//! # Example
//!
//! ```no_run
//! use ogs_mxap::{M2ap, MxapConfig, MxapEvent, MxapTask};
//! use tokio::sync::mpsc;
//!
//! # async fn run() {
//! let (sctp_tx, _sctp_rx) = mpsc::unbounded_channel();
//! let (upstream_tx, _upstream_rx) = mpsc::unbounded_channel();
//! let (task, handle) = MxapTask::<M2ap>::new(MxapConfig::default(), sctp_tx, upstream_tx);
//! tokio::spawn(task.run());
//! handle
//!     .send(MxapEvent::NewAssociation { assoc_id: 1, in_streams: 2, out_streams: 2 })
//!     .unwrap();
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handlers;
pub mod m2ap;
pub mod m3ap;
pub mod pdu;
pub mod peer;
pub mod personality;
pub mod procedures;
pub mod session;
pub mod task;
pub mod timer;
pub mod types;

#[cfg(test)]
mod property_tests;

pub use config::MxapConfig;
pub use context::MxapContext;
pub use error::{MxapError, MxapResult};
pub use event::*;
pub use m2ap::M2ap;
pub use m3ap::M3ap;
pub use pdu::{MxapMessage, MxapPdu};
pub use peer::{MxapPeer, PeerRegistry, PeerState};
pub use personality::Personality;
pub use session::{MbmsSession, SessionRegistry};
pub use task::{MxapTask, MxapTaskHandle};
pub use types::*;

// ============================================================================
// Constants
// ============================================================================

/// M2AP SCTP port
pub const M2AP_SCTP_PORT: u16 = 36443;
/// M2AP SCTP payload protocol identifier
pub const M2AP_SCTP_PPID: u32 = 43;
/// M3AP SCTP port
pub const M3AP_SCTP_PORT: u16 = 36444;
/// M3AP SCTP payload protocol identifier
pub const M3AP_SCTP_PPID: u32 = 44;

/// Stream of non MBMS-service-associated signalling
pub const NON_MBMS_STREAM: types::StreamId = 0;
/// Stream of MBMS-service-associated signalling
pub const MBMS_SERVICE_STREAM: types::StreamId = 1;
