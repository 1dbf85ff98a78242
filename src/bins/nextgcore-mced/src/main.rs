//! NextGCore MCE (Multi-cell/multicast Coordination Entity)
//!
//! Control plane of the LTE MBMS coordination node:
//! - M2AP toward eNodeBs (TS 36.443)
//! - M3AP toward MCEs / the MME (TS 36.444)
//! - MBMS session directory shared by both through MCE_APP

use anyhow::{Context, Result};
use clap::Parser;
use ogs_mxap::{
    M2ap, M3ap, MxapConfig, MxapEvent, MxapTask, MxapTaskHandle, Personality, SctpRequest,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod mce_app;

/// NextGCore MCE - Multi-cell/multicast Coordination Entity
#[derive(Parser, Debug)]
#[command(name = "nextgcore-mced")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LTE MBMS Multi-cell/multicast Coordination Entity", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/nextgcore/mce.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

/// MCE application state
pub struct MceApp {
    /// Running flag
    running: Arc<AtomicBool>,
    config: MxapConfig,
    m2ap: Option<MxapTaskHandle>,
    m3ap: Option<MxapTaskHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl MceApp {
    /// Create a new MCE application
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            config: MxapConfig::default(),
            m2ap: None,
            m3ap: None,
            tasks: Vec::new(),
        }
    }

    /// Load configuration and spawn the personality tasks
    pub fn init(&mut self, config_path: &str) -> Result<()> {
        log::info!("Initializing MCE...");
        log::info!("Loading configuration from: {config_path}");

        self.config = MxapConfig::load(config_path)
            .with_context(|| format!("Failed to load configuration '{config_path}'"))?;
        log::info!(
            "MCE id {:#x} ({}), PLMN {}, {} MBMS services max",
            self.config.global_mce_id,
            self.config.mce_name.as_deref().unwrap_or("unnamed"),
            self.config.plmn.plmn_id(),
            self.config.max_mbms_services
        );

        let (sctp_tx, sctp_rx) = mpsc::unbounded_channel();
        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel();

        let (m2ap_task, m2ap) =
            MxapTask::<M2ap>::new(self.config.clone(), sctp_tx.clone(), upstream_tx.clone());
        let (m3ap_task, m3ap) = MxapTask::<M3ap>::new(self.config.clone(), sctp_tx, upstream_tx);

        self.tasks.push(tokio::spawn(m2ap_task.run()));
        self.tasks.push(tokio::spawn(m3ap_task.run()));
        self.tasks.push(tokio::spawn(mce_app::run(upstream_rx, m2ap.clone(), m3ap.clone())));
        self.tasks.push(tokio::spawn(transport_sink(sctp_rx)));

        log::info!(
            "M2AP on SCTP port {} (PPID {}), M3AP on SCTP port {} (PPID {})",
            self.config.m2ap.port,
            M2ap::SCTP_PPID,
            self.config.m3ap.port,
            M3ap::SCTP_PPID
        );

        self.m2ap = Some(m2ap);
        self.m3ap = Some(m3ap);
        log::info!("MCE initialized successfully");
        Ok(())
    }

    /// Run until the running flag drops
    pub async fn run(&self) -> Result<()> {
        log::info!("MCE running...");
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        log::info!("MCE main loop exited");
        Ok(())
    }

    /// Terminate both personalities and wait for every task
    pub async fn shutdown(&mut self) {
        log::info!("Shutting down MCE...");

        for handle in [self.m2ap.take(), self.m3ap.take()].into_iter().flatten() {
            if let Err(e) = handle.send(MxapEvent::Terminate) {
                log::warn!("[{}] {e}", handle.name());
            }
        }
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                log::error!("Task failed: {e}");
            }
        }

        log::info!("MCE shutdown complete");
    }

    /// Handle of a personality task, once initialized
    pub fn handle(&self, personality: &str) -> Option<&MxapTaskHandle> {
        match personality {
            n if n == M2ap::NAME => self.m2ap.as_ref(),
            n if n == M3ap::NAME => self.m3ap.as_ref(),
            _ => None,
        }
    }

    /// Signal the application to stop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the running flag for signal handlers
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

impl Default for MceApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in for the SCTP transport task: outbound PDUs are logged
async fn transport_sink(mut sctp_rx: mpsc::UnboundedReceiver<SctpRequest>) {
    while let Some(req) = sctp_rx.recv().await {
        log::debug!(
            "SCTP send: association {} stream {} PPID {} ({} octets)",
            req.assoc_id,
            req.stream,
            req.ppid,
            req.payload.len()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    log::info!("NextGCore MCE v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration: {}", args.config);

    let mut app = MceApp::new();

    let running = app.running_flag();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    app.init(&args.config)?;
    app.run().await?;
    app.shutdown().await;

    log::info!("NextGCore MCE terminated");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
