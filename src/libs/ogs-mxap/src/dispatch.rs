//! MxAP Event Dispatch
//!
//! Entry point of a personality task: routes every `MxapEvent` to its
//! handler and inbound PDUs through the personality's dispatch table.

use std::time::Instant;

use crate::context::MxapContext;
use crate::error::{MxapError, MxapResult};
use crate::event::MxapEvent;
use crate::pdu::MxapMessage;
use crate::personality::{HandlerKind, Personality};
use crate::types::{AssocId, StreamId};

impl<P: Personality> MxapContext<P> {
    /// Process one event. Returns false once the task must stop.
    pub fn handle_event(&self, event: MxapEvent) -> bool {
        log::debug!("[{}] Received {}", P::NAME, event.name());

        let result = match event {
            MxapEvent::MbmsSessionStartReq(req) => self.handle_session_start_request(&req),
            MxapEvent::MbmsSessionUpdateReq(req) => self.handle_session_update_request(&req),
            MxapEvent::MbmsSessionStopReq(req) => self.handle_session_stop_request(&req),
            MxapEvent::PeerSetupResponse(resp) => self.handle_peer_setup_response(&resp),
            MxapEvent::NewAssociation { assoc_id, in_streams, out_streams } => {
                self.handle_new_association(assoc_id, in_streams, out_streams)
            }
            MxapEvent::AssociationReset { assoc_id } => self.handle_association_reset(assoc_id),
            MxapEvent::AssociationClosed { assoc_id } => self.handle_association_closed(assoc_id),
            MxapEvent::InboundData { assoc_id, stream, payload } => {
                self.handle_inbound_data(assoc_id, stream, &payload)
            }
            MxapEvent::TimerExpired(expiry) => self.handle_timer_expired(&expiry),
            MxapEvent::Terminate => {
                log::info!(
                    "[{}] terminating with {} peers and {} sessions",
                    P::NAME,
                    self.peer_count(),
                    self.session_count()
                );
                self.clear();
                return false;
            }
        };

        match result {
            Ok(()) => {}
            Err(e @ (MxapError::UnknownProcedure(_) | MxapError::NoHandler { .. })) => {
                log::debug!("[{}] {e}, message dropped", P::NAME)
            }
            Err(e) => log::error!("[{}] {e}", P::NAME),
        }
        true
    }

    /// Decode a PDU from a peer and run the handler its procedure code and
    /// direction select.
    pub fn handle_inbound_data(
        &self,
        assoc_id: AssocId,
        stream: StreamId,
        payload: &[u8],
    ) -> MxapResult<()> {
        let pdu = P::decode_pdu(payload)?;
        let code = pdu.procedure_code;
        let entry = P::dispatch_entry(code).ok_or(MxapError::UnknownProcedure(code))?;
        let kind = entry.handler(pdu.direction).ok_or(MxapError::NoHandler {
            code,
            direction: pdu.direction.name(),
        })?;
        log::debug!(
            "[{}] {} ({}) from association {assoc_id} stream {stream}",
            P::NAME,
            entry.procedure,
            pdu.direction
        );

        let message = pdu.message.ok_or(MxapError::UnexpectedMessage(code))?;
        match (kind, message) {
            (HandlerKind::SessionStartResponse, MxapMessage::SessionStartResponse(ids)) => {
                self.handle_session_start_response(assoc_id, ids)
            }
            (HandlerKind::SessionStartFailure, MxapMessage::SessionStartFailure(failure)) => {
                self.handle_session_start_failure(assoc_id, failure)
            }
            (HandlerKind::SessionStopResponse, MxapMessage::SessionStopResponse(ids)) => {
                self.handle_session_stop_response(assoc_id, ids)
            }
            (HandlerKind::SessionUpdateResponse, MxapMessage::SessionUpdateResponse(ids)) => {
                self.handle_session_update_response(assoc_id, ids)
            }
            (HandlerKind::SessionUpdateFailure, MxapMessage::SessionUpdateFailure(failure)) => {
                self.handle_session_update_failure(assoc_id, failure)
            }
            (HandlerKind::ErrorIndication, MxapMessage::ErrorIndication(ind)) => {
                self.handle_error_indication(assoc_id, stream, ind)
            }
            (HandlerKind::Reset, MxapMessage::Reset(reset)) => self.handle_reset(assoc_id, &reset),
            (HandlerKind::SetupRequest, MxapMessage::SetupRequest(req)) => {
                self.handle_setup_request(assoc_id, stream, &req)
            }
            _ => Err(MxapError::UnexpectedMessage(code)),
        }
    }

    /// Fire every action timer due at `now`. Returns how many fired.
    pub fn process_timers(&self, now: Instant) -> usize {
        let expired = self.sessions().timers().process_expired(now);
        let fired = expired.len();
        for expiry in expired {
            self.handle_event(MxapEvent::TimerExpired(expiry));
        }
        fired
    }
}
