//! Session state for the dashboard.
//!
//! [`Session`] is the data layer between the run machinery and the widgets.
//! It owns the [`RunController`], adopts the tailer a successful run hands
//! over, drains notices and event batches on every poll, feeds decoded
//! records to the [`Scene`], and keeps the bounded feeds the panels render.
//!
//! Polling is non-blocking throughout; the render loop calls
//! [`Session::poll_updates`] at its data interval and checks the dirty flag
//! to decide whether a redraw is owed.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{info, warn};

use ember_core::config::AppConfig;
use ember_core::error::Result;
use ember_core::tail::{LogTailer, TailBatch};
use ember_core::types::{AgentDescriptor, EventKind, LogRecord};
use ember_run::{OutputLine, RunController, RunNotice};

use crate::scene::Scene;

/// Maximum entries kept per feed; older entries fall off the front.
pub const FEED_CAPACITY: usize = 500;

/// Where the session currently is in the run lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// No run yet, or the dashboard just started
    Idle,
    /// A run is executing in the background
    Running { agent_count: u32 },
    /// The last run completed and its event log is being tailed
    Succeeded,
    /// The last run failed
    Failed { message: String },
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }
}

/// Counters over everything ingested this session.
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStats {
    /// Tail batches drained from the watcher
    pub batches: u64,
    /// Every decoded record seen
    pub records: u64,
    /// Records animated as node to hub queries
    pub queries: u64,
    /// Records animated as hub to node responses
    pub responses: u64,
    /// Lines that failed structured decoding
    pub raw: u64,
    /// Structured records the stage had no use for
    pub discarded: u64,
}

/// Live sent/received counters for one agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgentTraffic {
    /// Queries this agent sent to the hub
    pub sent: u64,
    /// Responses the hub sent back to this agent
    pub received: u64,
}

/// The dashboard's mutable state, polled by the render loop.
pub struct Session {
    config: AppConfig,
    controller: RunController,
    notices: Option<mpsc::Receiver<RunNotice>>,
    batches: Option<mpsc::Receiver<TailBatch>>,
    tailer: Option<LogTailer>,
    agents: Vec<AgentDescriptor>,
    traffic: HashMap<String, AgentTraffic>,
    run_state: RunState,
    run_started_at: Option<Instant>,
    pub scene: Scene,
    event_feed: VecDeque<String>,
    output_feed: VecDeque<OutputLine>,
    stats: DispatchStats,
    dirty: bool,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        let controller = RunController::new(config.clone());
        let scene = Scene::new(config.topology.emit_overlap);

        Self {
            config,
            controller,
            notices: None,
            batches: None,
            tailer: None,
            agents: Vec::new(),
            traffic: HashMap::new(),
            run_state: RunState::Idle,
            run_started_at: None,
            scene,
            event_feed: VecDeque::new(),
            output_feed: VecDeque::new(),
            stats: DispatchStats::default(),
            dirty: false,
        }
    }

    /// Kick off a run. Rejected while one is already executing.
    pub fn start_run(&mut self, agent_count: u32) -> Result<()> {
        let rx = self.controller.start_run(agent_count)?;
        self.notices = Some(rx);
        self.dirty = true;
        Ok(())
    }

    /// Start or stop tailing the configured event log outside a run.
    ///
    /// Returns whether the log is being watched afterwards. Toggling off
    /// also releases a tailer adopted from a finished run.
    pub fn toggle_watch(&mut self) -> Result<bool> {
        if self.tailer.is_some() {
            self.retire_tailer();
            info!("event log watch stopped");
            self.dirty = true;
            return Ok(false);
        }

        let (mut tailer, batches) = LogTailer::new(&self.config.event_log_path);
        tailer.start()?;
        info!(log = %self.config.event_log_path.display(), "watching event log");
        self.tailer = Some(tailer);
        self.batches = Some(batches);
        self.dirty = true;
        Ok(true)
    }

    /// Fire a demonstration pulse from a random node.
    pub fn demo_pulse(&mut self, now: Instant) -> Option<String> {
        let pulsed = self.scene.demo_pulse(now);
        if pulsed.is_some() {
            self.dirty = true;
        }
        pulsed
    }

    /// Empty both feeds. Counters and the stage are untouched.
    pub fn clear_feeds(&mut self) {
        self.event_feed.clear();
        self.output_feed.clear();
        self.dirty = true;
    }

    /// Drain run notices and event batches.
    ///
    /// Returns whether anything changed since the dirty flag was last taken.
    pub fn poll_updates(&mut self, now: Instant) -> bool {
        let mut pending = Vec::new();
        let mut notices_closed = false;
        if let Some(rx) = self.notices.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(notice) => pending.push(notice),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        notices_closed = true;
                        break;
                    }
                }
            }
        }
        if notices_closed {
            self.notices = None;
        }
        for notice in pending {
            self.apply_notice(notice);
        }

        let mut records = Vec::new();
        let mut drained = 0u64;
        let mut batches_closed = false;
        if let Some(rx) = self.batches.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(batch) => {
                        drained += 1;
                        records.extend(batch.records);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        batches_closed = true;
                        break;
                    }
                }
            }
        }
        if batches_closed {
            self.batches = None;
        }
        self.stats.batches += drained;
        for record in records {
            self.ingest_record(record, now);
        }

        self.dirty
    }

    /// Advance stage animations. Returns whether anything is still moving.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.scene.tick(now)
    }

    /// Take and clear the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        if self.dirty {
            self.dirty = false;
            true
        } else {
            false
        }
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    /// Time since the current run began, while one is executing.
    pub fn run_elapsed(&self, now: Instant) -> Option<Duration> {
        if !self.run_state.is_running() {
            return None;
        }
        self.run_started_at
            .and_then(|started| now.checked_duration_since(started))
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    /// Per-agent sent/received counters for the current run.
    pub fn traffic(&self) -> &HashMap<String, AgentTraffic> {
        &self.traffic
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Byte offset the tailer has consumed, while monitoring is active.
    pub fn tail_offset(&self) -> Option<u64> {
        self.tailer
            .as_ref()
            .filter(|tailer| tailer.is_running())
            .map(LogTailer::offset)
    }

    pub fn event_feed(&self) -> &VecDeque<String> {
        &self.event_feed
    }

    pub fn output_feed(&self) -> &VecDeque<OutputLine> {
        &self.output_feed
    }

    pub fn is_watching(&self) -> bool {
        self.tailer.as_ref().is_some_and(LogTailer::is_running)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn apply_notice(&mut self, notice: RunNotice) {
        match notice {
            RunNotice::Started { agent_count } => {
                info!(agent_count, "run started, resetting the stage");
                // The old run's tailer and stage go away before any line of
                // the new run's output arrives
                self.retire_tailer();
                self.scene.teardown();
                self.agents.clear();
                self.traffic.clear();
                self.event_feed.clear();
                self.output_feed.clear();
                self.stats = DispatchStats::default();
                self.run_started_at = Some(Instant::now());
                self.run_state = RunState::Running { agent_count };
            }
            RunNotice::Output(line) => {
                push_bounded(&mut self.output_feed, line);
            }
            RunNotice::Succeeded(assets) => {
                let assets = *assets;
                info!(agents = assets.agents.len(), "run succeeded, adopting tailer");
                self.scene.install(assets.topology);
                self.agents = assets.agents;
                self.tailer = Some(assets.tailer);
                self.batches = Some(assets.events);
                self.run_state = RunState::Succeeded;
            }
            RunNotice::Failed { message } => {
                warn!(%message, "run failed");
                self.run_state = RunState::Failed { message };
            }
        }
        self.dirty = true;
    }

    pub(crate) fn ingest_record(&mut self, record: LogRecord, now: Instant) {
        self.stats.records += 1;

        let outcome = self.scene.dispatch(&record, now);
        if outcome.is_dispatched() {
            match record.kind() {
                Some(EventKind::QuerySent) => {
                    self.stats.queries += 1;
                    if let Some(id) = record.agent_id() {
                        self.traffic.entry(id.to_string()).or_default().sent += 1;
                    }
                }
                Some(EventKind::ResponseReceived) => {
                    self.stats.responses += 1;
                    if let Some(id) = record.agent_id() {
                        self.traffic.entry(id.to_string()).or_default().received += 1;
                    }
                }
                None => {}
            }
        } else if record.is_raw() {
            self.stats.raw += 1;
        } else {
            self.stats.discarded += 1;
        }

        let time = chrono::Local::now().format("%H:%M:%S");
        let line = match &record {
            LogRecord::Event(event) => {
                let mark = if outcome.is_dispatched() { "" } else { " (ignored)" };
                format!(
                    "{} {:<12} {}{}",
                    time,
                    event.agent_id.as_deref().unwrap_or("-"),
                    event.event_type.as_deref().unwrap_or("-"),
                    mark,
                )
            }
            LogRecord::Raw(raw) => format!("{} {:<12} {}", time, "raw", raw),
        };
        push_bounded(&mut self.event_feed, line);

        self.dirty = true;
    }

    fn retire_tailer(&mut self) {
        if let Some(mut tailer) = self.tailer.take() {
            tailer.stop();
        }
        self.batches = None;
    }
}

fn push_bounded<T>(feed: &mut VecDeque<T>, item: T) {
    if feed.len() == FEED_CAPACITY {
        feed.pop_front();
    }
    feed.push_back(item);
}
