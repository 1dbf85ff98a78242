//! MCE_APP Stub
//!
//! Answers the personalities' setup indications. Every admitted service
//! area becomes one MBSFN area; radio scheduling is not modelled.

use ogs_mxap::{
    MbsfnArea, MxapEvent, MxapTaskHandle, PeerSetupResponse, Personality, UpstreamIndication, M2ap,
    M3ap,
};
use tokio::sync::mpsc;

/// Build the setup answer for one peer
pub fn setup_response(indication: &UpstreamIndication) -> PeerSetupResponse {
    match indication {
        UpstreamIndication::SetupRequest { assoc_id, peer_id, service_areas, .. } => {
            PeerSetupResponse {
                assoc_id: *assoc_id,
                peer_id: *peer_id,
                service_areas: service_areas.clone(),
                mbsfn_areas: service_areas
                    .iter()
                    .enumerate()
                    .map(|(i, &sai)| MbsfnArea { mbsfn_area_id: i as u8 + 1, service_area_id: sai })
                    .collect(),
                local_mbms_area: 0,
            }
        }
    }
}

/// Consume upstream indications until every personality is gone
pub async fn run(
    mut upstream_rx: mpsc::UnboundedReceiver<UpstreamIndication>,
    m2ap: MxapTaskHandle,
    m3ap: MxapTaskHandle,
) {
    while let Some(indication) = upstream_rx.recv().await {
        let UpstreamIndication::SetupRequest { personality, assoc_id, .. } = &indication;
        let handle = if *personality == M2ap::NAME {
            &m2ap
        } else if *personality == M3ap::NAME {
            &m3ap
        } else {
            log::error!("Setup indication from unknown personality {personality}");
            continue;
        };
        let response = setup_response(&indication);
        log::info!(
            "[MCE_APP] {personality} peer on association {assoc_id}: {} MBSFN areas",
            response.mbsfn_areas.len()
        );
        if let Err(e) = handle.send(MxapEvent::PeerSetupResponse(response)) {
            log::error!("[MCE_APP] {e}");
        }
    }
    log::info!("[MCE_APP] upstream channel closed");
}
