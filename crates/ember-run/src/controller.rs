//! Run lifecycle orchestration.
//!
//! [`RunController`] drives one Firestorm run end to end on a background
//! thread: generator invocation, manifest load, topology build, then event
//! log tailing. Progress flows back to the caller as [`RunNotice`]s on a
//! channel, and an atomic guard rejects a second run while one is active.
//!
//! Notice ordering is fixed: `Started` first, `Output` lines while the
//! generator runs, then exactly one terminal notice. `Succeeded` is sent
//! only after the topology is built and the tailer is already watching, so
//! an adopter never races the first event batch. On any failure the tailer
//! is never started.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use ember_core::config::{AppConfig, MAX_AGENT_COUNT, MIN_AGENT_COUNT};
use ember_core::error::{EmberError, Result};
use ember_core::manifest::load_manifest;
use ember_core::tail::{LogTailer, TailBatch};
use ember_core::topology::Topology;
use ember_core::types::AgentDescriptor;

use crate::generator::{OutputLine, run_generator};

/// Channel capacity for run notices.
const NOTICE_CHANNEL_BUFFER: usize = 64;

/// Everything a successful run hands over to the dashboard.
pub struct RunAssets {
    /// Agents from the freshly written manifest, in manifest order
    pub agents: Vec<AgentDescriptor>,

    /// Ring layout built from those agents
    pub topology: Topology,

    /// Tailer already watching the event log
    pub tailer: LogTailer,

    /// Receiver for the tailer's decoded batches
    pub events: mpsc::Receiver<TailBatch>,
}

/// Progress notices emitted during a run.
pub enum RunNotice {
    /// The run began; the generator is being launched
    Started { agent_count: u32 },

    /// A line of live generator output
    Output(OutputLine),

    /// The run completed; topology and tailing are ready to adopt
    Succeeded(Box<RunAssets>),

    /// The run failed; nothing is being tailed
    Failed { message: String },
}

/// Orchestrates Firestorm runs, one at a time.
///
/// The controller itself stays on the caller's thread; each accepted run
/// executes on its own worker thread with a dedicated single-threaded tokio
/// runtime, so the dashboard's render loop never blocks on process or file
/// I/O.
pub struct RunController {
    config: AppConfig,
    in_progress: Arc<AtomicBool>,
}

impl RunController {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a run is currently executing.
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Kick off a run with the given agent count.
    ///
    /// Returns the notice receiver immediately; the run executes in the
    /// background. Rejects with [`EmberError::RunInProgress`] while another
    /// run is active. Counts outside the valid range are clamped.
    pub fn start_run(&self, agent_count: u32) -> Result<mpsc::Receiver<RunNotice>> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("rejecting start: a run is already in progress");
            return Err(EmberError::RunInProgress);
        }

        let agent_count = agent_count.clamp(MIN_AGENT_COUNT, MAX_AGENT_COUNT);
        let (tx, rx) = mpsc::channel(NOTICE_CHANNEL_BUFFER);
        let config = self.config.clone();
        let flag = Arc::clone(&self.in_progress);

        let spawned = std::thread::Builder::new()
            .name("ember-run".to_string())
            .spawn(move || {
                run_to_completion(config, agent_count, tx);
                // Cleared only after the terminal notice went out, so two
                // runs can never interleave their notices
                flag.store(false, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            self.in_progress.store(false, Ordering::SeqCst);
            return Err(EmberError::internal(format!(
                "Failed to spawn run thread: {}",
                e
            )));
        }

        Ok(rx)
    }
}

/// Thread body: build a runtime, execute the run, emit the terminal notice.
fn run_to_completion(config: AppConfig, agent_count: u32, tx: mpsc::Sender<RunNotice>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to build run runtime: {}", e);
            let _ = tx.blocking_send(RunNotice::Failed {
                message: format!("Failed to start run: {}", e),
            });
            return;
        }
    };

    runtime.block_on(async move {
        let _ = tx.send(RunNotice::Started { agent_count }).await;

        match execute(&config, agent_count, &tx).await {
            Ok(assets) => {
                let _ = tx.send(RunNotice::Succeeded(Box::new(assets))).await;
            }
            Err(e) => {
                info!("run failed: {}", e);
                let message = match e.guidance() {
                    Some(hint) => format!("{} ({})", e, hint),
                    None => e.to_string(),
                };
                let _ = tx.send(RunNotice::Failed { message }).await;
            }
        }
    });
}

/// The run pipeline: generator, manifest, topology, tailer, in that order.
async fn execute(
    config: &AppConfig,
    agent_count: u32,
    tx: &mpsc::Sender<RunNotice>,
) -> Result<RunAssets> {
    let (out_tx, mut out_rx) = mpsc::channel::<OutputLine>(NOTICE_CHANNEL_BUFFER);
    let forwarder = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(line) = out_rx.recv().await {
                if tx.send(RunNotice::Output(line)).await.is_err() {
                    break;
                }
            }
        })
    };

    let generated = run_generator(&config.generator, agent_count, out_tx).await;
    let _ = forwarder.await;
    generated?;

    let manifest = load_manifest(&config.manifest_path)?;
    let topology = Topology::build(&manifest.agents, config.topology.radius);

    let (mut tailer, events) = LogTailer::new(&config.event_log_path);
    tailer.start()?;

    info!(
        agents = manifest.agents.len(),
        log = %config.event_log_path.display(),
        "run ready, tailing event log"
    );

    Ok(RunAssets {
        agents: manifest.agents,
        topology,
        tailer,
        events,
    })
}
