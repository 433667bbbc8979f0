//! Incremental tailing of the Firestorm event log.
//!
//! The generator appends newline-delimited JSON to a single log file while a
//! run executes. This module reads only the newly appended byte range on each
//! file-change notification and turns it into ordered batches of decoded
//! records.
//!
//! ## Architecture
//!
//! - [`TailCursor`] is the pure read step: it owns the byte offset and reads
//!   exactly `[offset, current_size)`, delivering complete lines in file
//!   order. A malformed or partial line never stalls the offset.
//! - [`LogTailer`] owns the watcher lifecycle: a debounced `notify` watcher
//!   on the log file's parent directory drives the cursor from its callback
//!   thread and ships [`TailBatch`]es over a tokio channel. `start` and
//!   `stop` are both idempotent, and restarting re-baselines the offset to
//!   the current file size so pre-existing content is never replayed.
//!
//! Shrunken or rotated files are deliberately not resynchronized: a read
//! where `current_size <= offset` delivers nothing and leaves the offset
//! unchanged until monitoring is restarted.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{EmberError, Result};
use crate::types::LogRecord;

/// Default debounce duration in milliseconds.
pub const DEFAULT_TAIL_DEBOUNCE_MS: u64 = 50;

/// Default channel buffer size for batches.
pub const DEFAULT_TAIL_CHANNEL_BUFFER: usize = 256;

/// An ordered batch of records decoded from newly appended log lines.
///
/// Records appear in file order; one batch per change notification. A batch
/// is fully delivered before the next one is read.
#[derive(Debug, Clone)]
pub struct TailBatch {
    /// Decoded records, one per non-empty complete line
    pub records: Vec<LogRecord>,
}

/// Byte-offset cursor over an append-only log file.
///
/// The cursor is the single writer of its offset. [`TailCursor::poll`] reads
/// the half-open range `[offset, current_size)` and then advances the offset
/// to `current_size` unconditionally, so a line that fails to decode (or a
/// trailing fragment from a mid-line write) is consumed without being
/// redelivered later.
#[derive(Debug)]
pub struct TailCursor {
    path: PathBuf,
    offset: u64,
}

impl TailCursor {
    /// Create a cursor positioned at the file's current end.
    ///
    /// A missing file baselines to offset 0, so content written after the
    /// file appears is delivered from its first byte.
    pub fn at_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self { path, offset }
    }

    /// Path of the file being tailed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last byte position consumed.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read newly appended complete lines.
    ///
    /// Returns the non-empty lines contained in `[offset, current_size)` in
    /// file order. A missing file and an unchanged (or shrunken) file both
    /// deliver nothing; only the shrunken case leaves the offset stale, and
    /// recovery from that is restarting monitoring.
    pub fn poll(&mut self) -> Result<Vec<String>> {
        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EmberError::io("reading log metadata", &self.path, e)),
        };

        if size <= self.offset {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)
            .map_err(|e| EmberError::io("opening event log", &self.path, e))?;
        file.seek(SeekFrom::Start(self.offset))
            .map_err(|e| EmberError::io("seeking event log", &self.path, e))?;

        let mut buf = Vec::with_capacity((size - self.offset) as usize);
        file.take(size - self.offset)
            .read_to_end(&mut buf)
            .map_err(|e| EmberError::io("reading event log", &self.path, e))?;

        let text = String::from_utf8_lossy(&buf);
        let lines = complete_lines(&text);

        self.offset = size;

        Ok(lines)
    }
}

/// Split the newly read range into complete lines.
///
/// Anything after the final newline is a partial fragment and is not
/// delivered. Blank lines are dropped; a trailing `\r` is stripped.
fn complete_lines(text: &str) -> Vec<String> {
    let terminated = match text.rfind('\n') {
        Some(idx) => &text[..=idx],
        None => return Vec::new(),
    };

    terminated
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration for the log tailer.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// The event log file to tail
    pub path: PathBuf,

    /// Debounce duration for coalescing rapid appends
    pub debounce_duration: Duration,

    /// Channel buffer size for batches
    pub channel_buffer: usize,
}

impl TailerConfig {
    /// Create a new config for the given log file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            debounce_duration: Duration::from_millis(DEFAULT_TAIL_DEBOUNCE_MS),
            channel_buffer: DEFAULT_TAIL_CHANNEL_BUFFER,
        }
    }

    /// Set the debounce duration.
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.debounce_duration = duration;
        self
    }

    /// Set the channel buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer = size;
        self
    }
}

/// Watcher state held only while monitoring is active.
struct ActiveTail {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

/// Owned tail of the Firestorm event log.
///
/// One tailer instance monitors one file. [`LogTailer::start`] baselines the
/// offset to the current file size and begins watching; [`LogTailer::stop`]
/// tears the watcher down. Both are no-ops when already in the requested
/// state. Each run gets a fresh instance.
pub struct LogTailer {
    config: TailerConfig,
    batch_tx: mpsc::Sender<TailBatch>,
    offset: Arc<AtomicU64>,
    state: Option<ActiveTail>,
}

impl LogTailer {
    /// Create a tailer for the given log file with default configuration.
    ///
    /// Returns the tailer and the receiver batches are delivered on. The
    /// tailer is created stopped; call [`LogTailer::start`] to begin.
    pub fn new(path: impl Into<PathBuf>) -> (Self, mpsc::Receiver<TailBatch>) {
        Self::with_config(TailerConfig::new(path))
    }

    /// Create a tailer with custom configuration.
    pub fn with_config(config: TailerConfig) -> (Self, mpsc::Receiver<TailBatch>) {
        let (batch_tx, batch_rx) = mpsc::channel(config.channel_buffer);

        (
            Self {
                config,
                batch_tx,
                offset: Arc::new(AtomicU64::new(0)),
                state: None,
            },
            batch_rx,
        )
    }

    /// Path of the file being tailed.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Whether monitoring is currently active.
    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    /// Last byte position consumed, as observed from outside the watcher.
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Start monitoring. A no-op if already running.
    ///
    /// The offset is baselined to the file's current size, so only content
    /// appended after this call is delivered.
    pub fn start(&mut self) -> Result<()> {
        if self.state.is_some() {
            debug!(path = %self.config.path.display(), "tail already active");
            return Ok(());
        }

        let watch_dir = watch_dir_for(&self.config.path);
        if !watch_dir.exists() {
            std::fs::create_dir_all(&watch_dir).map_err(|e| EmberError::DirectoryCreation {
                path: watch_dir.clone(),
                source: e,
            })?;
        }

        let mut cursor = TailCursor::at_end(&self.config.path);
        self.offset.store(cursor.offset(), Ordering::SeqCst);

        let file_name = self.config.path.file_name().map(|n| n.to_os_string());
        let shared_offset = Arc::clone(&self.offset);
        let tx = self.batch_tx.clone();

        let mut debouncer = new_debouncer(
            self.config.debounce_duration,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let relevant = events.iter().any(|event| {
                        if matches!(event.event.kind, EventKind::Access(_)) {
                            return false;
                        }
                        event
                            .event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name)
                    });
                    if !relevant {
                        return;
                    }

                    match cursor.poll() {
                        Ok(lines) => {
                            shared_offset.store(cursor.offset(), Ordering::SeqCst);
                            if lines.is_empty() {
                                return;
                            }
                            let records =
                                lines.iter().map(|line| LogRecord::decode(line)).collect();
                            // Fails only when the receiver is gone (shutdown)
                            if tx.blocking_send(TailBatch { records }).is_err() {
                                debug!("batch receiver dropped, discarding tail batch");
                            }
                        }
                        Err(e) => warn!("error reading event log: {}", e),
                    }
                }
                Err(errors) => {
                    for error in errors {
                        error!("file watcher error: {:?}", error);
                    }
                }
            },
        )
        .map_err(|e| EmberError::watcher_init(format!("Failed to create debouncer: {}", e)))?;

        debouncer
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                EmberError::watcher_init(format!(
                    "Failed to watch directory {:?}: {}",
                    watch_dir, e
                ))
            })?;

        self.state = Some(ActiveTail {
            _debouncer: debouncer,
        });

        info!(path = %self.config.path.display(), offset = self.offset(), "started watching event log");

        Ok(())
    }

    /// Stop monitoring. A no-op if not running.
    pub fn stop(&mut self) {
        if self.state.take().is_some() {
            info!(path = %self.config.path.display(), "stopped watching event log");
        } else {
            debug!(path = %self.config.path.display(), "tail already stopped");
        }
    }
}

/// Directory whose change notifications cover the log file.
///
/// Watching the parent instead of the file itself keeps the watch valid when
/// the file does not exist yet.
fn watch_dir_for(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        write!(file, "{}", content).unwrap();
        file.sync_all().unwrap();
    }

    /// Collect records from the channel until `want` arrived or time ran out.
    async fn collect_records(
        rx: &mut mpsc::Receiver<TailBatch>,
        want: usize,
    ) -> Vec<LogRecord> {
        let mut records = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while records.len() < want {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(batch)) => records.extend(batch.records),
                _ => break,
            }
        }
        records
    }

    #[test]
    fn test_tailer_config_custom() {
        let config = TailerConfig::new("/tmp/events.log")
            .with_debounce(Duration::from_millis(10))
            .with_buffer_size(512);

        assert_eq!(config.path, PathBuf::from("/tmp/events.log"));
        assert_eq!(config.debounce_duration, Duration::from_millis(10));
        assert_eq!(config.channel_buffer, 512);
    }

    #[test]
    fn test_cursor_missing_file_is_no_data() {
        let tmp = TempDir::new().unwrap();
        let mut cursor = TailCursor::at_end(tmp.path().join("missing.log"));

        assert_eq!(cursor.offset(), 0);
        assert!(cursor.poll().unwrap().is_empty());
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn test_cursor_starts_at_current_end() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");
        append(&path, "old line\n");

        let mut cursor = TailCursor::at_end(&path);
        assert_eq!(cursor.offset(), 9);

        // Pre-existing content is never replayed
        assert!(cursor.poll().unwrap().is_empty());

        append(&path, "new line\n");
        assert_eq!(cursor.poll().unwrap(), vec!["new line".to_string()]);
    }

    #[test]
    fn test_cursor_delivers_lines_in_file_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");
        let mut cursor = TailCursor::at_end(&path);

        append(&path, "one\ntwo\nthree\n");

        let lines = cursor.poll().unwrap();
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(cursor.offset(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_cursor_drops_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");
        let mut cursor = TailCursor::at_end(&path);

        append(&path, "first\n\n   \nsecond\n");

        assert_eq!(cursor.poll().unwrap(), vec!["first", "second"]);
        assert_eq!(cursor.offset(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_cursor_ignores_trailing_fragment_but_advances() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");
        let mut cursor = TailCursor::at_end(&path);

        append(&path, "complete\npart");

        // Only the terminated line is delivered; the offset still covers
        // the fragment, which is consumed without delivery.
        assert_eq!(cursor.poll().unwrap(), vec!["complete"]);
        assert_eq!(cursor.offset(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_cursor_no_redelivery_across_polls() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");
        let mut cursor = TailCursor::at_end(&path);

        append(&path, "a\nb\n");
        assert_eq!(cursor.poll().unwrap().len(), 2);

        // Nothing new: nothing delivered, offset untouched
        let offset = cursor.offset();
        assert!(cursor.poll().unwrap().is_empty());
        assert_eq!(cursor.offset(), offset);

        append(&path, "c\n");
        assert_eq!(cursor.poll().unwrap(), vec!["c"]);
    }

    #[test]
    fn test_cursor_offset_is_monotonic_and_bounded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");
        let mut cursor = TailCursor::at_end(&path);

        let mut previous = cursor.offset();
        for chunk in ["alpha\n", "beta\ngamma\n", "", "delta\n"] {
            append(&path, chunk);
            cursor.poll().unwrap();

            let size = fs::metadata(&path).unwrap().len();
            assert!(cursor.offset() >= previous);
            assert!(cursor.offset() <= size);
            previous = cursor.offset();
        }
    }

    #[test]
    fn test_cursor_shrunken_file_delivers_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");
        append(&path, "a long line that will disappear\n");

        let mut cursor = TailCursor::at_end(&path);
        let baseline = cursor.offset();
        assert!(baseline > 0);

        // Truncate below the cursor offset
        fs::write(&path, "tiny\n").unwrap();

        assert!(cursor.poll().unwrap().is_empty());
        assert_eq!(cursor.offset(), baseline);
    }

    #[test]
    fn test_complete_lines_strips_carriage_returns() {
        assert_eq!(complete_lines("a\r\nb\r\n"), vec!["a", "b"]);
        assert_eq!(complete_lines("no newline"), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_tailer_delivers_decoded_batches() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");
        append(&path, "{\"agent_id\":\"stale\",\"event_type\":\"query_sent\"}\n");

        let config = TailerConfig::new(&path).with_debounce(Duration::from_millis(10));
        let (mut tailer, mut rx) = LogTailer::with_config(config);
        tailer.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        append(
            &path,
            "{\"agent_id\":\"agent_1\",\"event_type\":\"query_sent\"}\nnot json\n",
        );

        let records = collect_records(&mut rx, 2).await;
        assert_eq!(records.len(), 2, "got: {:?}", records);
        assert_eq!(records[0].agent_id(), Some("agent_1"));
        assert!(records[1].is_raw());
        assert_eq!(tailer.offset(), fs::metadata(&path).unwrap().len());
    }

    #[tokio::test]
    async fn test_tailer_start_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");

        let config = TailerConfig::new(&path).with_debounce(Duration::from_millis(10));
        let (mut tailer, mut rx) = LogTailer::with_config(config);

        tailer.start().unwrap();
        tailer.start().unwrap();
        assert!(tailer.is_running());
        tokio::time::sleep(Duration::from_millis(50)).await;

        append(&path, "{\"agent_id\":\"agent_1\",\"event_type\":\"query_sent\"}\n");

        // One watcher, one delivery: exactly one record arrives
        let records = collect_records(&mut rx, 1).await;
        assert_eq!(records.len(), 1);

        let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err(), "duplicate watcher delivered a second batch");
    }

    #[tokio::test]
    async fn test_tailer_stop_is_idempotent_and_silences_delivery() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");

        let config = TailerConfig::new(&path).with_debounce(Duration::from_millis(10));
        let (mut tailer, mut rx) = LogTailer::with_config(config);

        tailer.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        tailer.stop();
        tailer.stop();
        assert!(!tailer.is_running());

        append(&path, "{\"agent_id\":\"agent_1\",\"event_type\":\"query_sent\"}\n");

        let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(result.is_err(), "stopped tailer still delivered a batch");
    }

    #[tokio::test]
    async fn test_tailer_restart_rebaselines_offset() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");

        let config = TailerConfig::new(&path).with_debounce(Duration::from_millis(10));
        let (mut tailer, mut rx) = LogTailer::with_config(config);

        tailer.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        tailer.stop();

        // Written while stopped: skipped by the restart baseline
        append(&path, "{\"agent_id\":\"missed\",\"event_type\":\"query_sent\"}\n");

        tailer.start().unwrap();
        assert_eq!(tailer.offset(), fs::metadata(&path).unwrap().len());
        tokio::time::sleep(Duration::from_millis(50)).await;

        append(&path, "{\"agent_id\":\"agent_2\",\"event_type\":\"query_sent\"}\n");

        let records = collect_records(&mut rx, 1).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].agent_id(), Some("agent_2"));
    }

    #[tokio::test]
    async fn test_tailer_picks_up_file_created_after_start() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.log");

        let config = TailerConfig::new(&path).with_debounce(Duration::from_millis(10));
        let (mut tailer, mut rx) = LogTailer::with_config(config);

        tailer.start().unwrap();
        assert_eq!(tailer.offset(), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;

        append(&path, "{\"agent_id\":\"agent_1\",\"event_type\":\"response_received\"}\n");

        let records = collect_records(&mut rx, 1).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].agent_id(), Some("agent_1"));
    }
}
