//! MxAP Personality Task
//!
//! One tokio task per personality. It owns the `MxapContext` and consumes
//! a bounded event inbox; action timers are polled in the same loop so
//! expiries never run concurrently with message handling.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::MxapConfig;
use crate::context::MxapContext;
use crate::error::{MxapError, MxapResult};
use crate::event::{MxapEvent, SctpRequest, UpstreamIndication};
use crate::personality::Personality;

/// Sender side of a personality task's inbox
#[derive(Debug, Clone)]
pub struct MxapTaskHandle {
    name: &'static str,
    tx: mpsc::Sender<MxapEvent>,
}

impl MxapTaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Non-blocking enqueue
    pub fn send(&self, event: MxapEvent) -> MxapResult<()> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => {
                log::error!("[{}] inbox full, {} dropped", self.name, event.name());
                MxapError::QueueFull(self.name)
            }
            TrySendError::Closed(_) => MxapError::ChannelClosed(self.name),
        })
    }
}

/// Personality task
pub struct MxapTask<P: Personality> {
    ctx: MxapContext<P>,
    events: mpsc::Receiver<MxapEvent>,
}

impl<P: Personality> MxapTask<P> {
    pub fn new(
        config: MxapConfig,
        sctp_tx: mpsc::UnboundedSender<SctpRequest>,
        upstream_tx: mpsc::UnboundedSender<UpstreamIndication>,
    ) -> (Self, MxapTaskHandle) {
        let (tx, events) = mpsc::channel(config.event_queue_size);
        let task = Self {
            ctx: MxapContext::new(config, sctp_tx, upstream_tx),
            events,
        };
        (task, MxapTaskHandle { name: P::NAME, tx })
    }

    pub fn context(&self) -> &MxapContext<P> {
        &self.ctx
    }

    /// Run until `Terminate` or until every handle is dropped
    pub async fn run(mut self) {
        log::info!("[{}] task started (SCTP port {})", P::NAME, P::SCTP_PORT);
        loop {
            let deadline = self.ctx.sessions().timers().next_deadline();
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        log::info!("[{}] inbox closed", P::NAME);
                        self.ctx.clear();
                        break;
                    };
                    if !self.ctx.handle_event(event) {
                        break;
                    }
                }
                _ = wait_until(deadline) => {
                    let fired = self.ctx.process_timers(Instant::now());
                    log::debug!("[{}] {fired} action timers fired", P::NAME);
                }
            }
        }
        log::info!("[{}] task stopped", P::NAME);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
