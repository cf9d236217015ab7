//! Log ingestion engine: turns a directory of rotating dated log files into
//! one ordered notification stream.
//!
//! # Phases
//!
//! 1. **Replay** (inside [`LogIngestor::initialize`]): historical files are
//!    read start to end and classified before `initialize` returns.
//! 2. **Live tail** (background task): the newest file is followed by byte
//!    offset. A `notify` watch on the directory wakes the task when something
//!    is written; a short fallback tick covers platforms where events are
//!    missed.
//! 3. **Rotation poll** (same task): every `rotation_poll` the directory is
//!    listed again. When a file dated after the current one shows up, the old
//!    tail is drained a final time and dropped, and the new file is read from
//!    its first byte by the tail that then stays attached to it.
//!
//! Because every phase reads through the same [`FileTail`] and emits from the
//! same task, events from one file are in file order and no line is emitted
//! twice or skipped across a rotation.
//!
//! # Failures
//!
//! Read and listing failures are emitted as [`Notification::Error`] and the
//! engine carries on. A tail whose read failed is parked with its offset
//! intact; the next rotation poll retries it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rptwatch_core::config::LogsSettings;
use rptwatch_core::{Classifier, EventSink, IngestFlags, MonitorError, Notification};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::files::{list_log_files, LogFile};
use crate::tail::FileTail;

const DEFAULT_ROTATION_POLL: Duration = Duration::from_secs(60);
const DEFAULT_TAIL_POLL: Duration = Duration::from_secs(1);

/// Where to find the log files and how often to look.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub dir: PathBuf,
    pub prefix: String,
    pub rotation_poll: Duration,
    pub tail_poll: Duration,
}

impl IngestOptions {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            rotation_poll: DEFAULT_ROTATION_POLL,
            tail_poll: DEFAULT_TAIL_POLL,
        }
    }

    pub fn rotation_poll(mut self, every: Duration) -> Self {
        self.rotation_poll = every;
        self
    }

    pub fn tail_poll(mut self, every: Duration) -> Self {
        self.tail_poll = every;
        self
    }
}

impl From<&LogsSettings> for IngestOptions {
    fn from(logs: &LogsSettings) -> Self {
        IngestOptions::new(&logs.dir, &logs.prefix)
            .rotation_poll(logs.rotation_poll())
            .tail_poll(logs.tail_poll())
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Classifies lines and forwards them, unless the engine has been stopped.
#[derive(Clone)]
struct Emitter {
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl Emitter {
    fn line(&self, line: &str) {
        if self.cancel.is_cancelled() {
            return;
        }
        match self.classifier.classify(line) {
            Some(event) => {
                trace!(kind = %event.kind, "classified line");
                self.sink.emit(Notification::Line(event));
            }
            None => self.sink.emit(Notification::Unclassified(line.to_string())),
        }
    }

    fn lines(&self, lines: &[String]) {
        for line in lines {
            self.line(line);
        }
    }

    fn error(&self, err: MonitorError) {
        if self.cancel.is_cancelled() {
            return;
        }
        warn!(error = %err, "ingestion error");
        self.sink.emit(Notification::error(err));
    }

    /// Read what `tail` has not yet returned and emit it. Returns false (after
    /// emitting the error) if the read failed.
    async fn pump(&self, tail: &mut FileTail) -> bool {
        match tail.read_appended().await {
            Ok(lines) => {
                self.lines(&lines);
                true
            }
            Err(source) => {
                self.error(MonitorError::Read {
                    path: tail.path().to_path_buf(),
                    source,
                });
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LogIngestor
// ---------------------------------------------------------------------------

/// Owns replay, the live tail task and the rotation poll for one directory.
pub struct LogIngestor {
    options: IngestOptions,
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for LogIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogIngestor")
            .field("options", &self.options)
            .field("running", &self.is_running())
            .finish()
    }
}

impl LogIngestor {
    pub fn new(
        options: IngestOptions,
        classifier: Arc<dyn Classifier>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            options,
            classifier,
            sink,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Replay history as `flags` ask, then start the live task if any tail
    /// flag is set. Calling it again stops the previous run first.
    ///
    /// Returns an error for conflicting flags or an unreadable directory.
    /// Failures reading individual files are emitted, not returned.
    pub async fn initialize(&mut self, flags: IngestFlags) -> Result<(), MonitorError> {
        flags.validate()?;
        self.stop();
        self.cancel = CancellationToken::new();

        let emitter = Emitter {
            classifier: Arc::clone(&self.classifier),
            sink: Arc::clone(&self.sink),
            cancel: self.cancel.clone(),
        };
        let dir = self.options.dir.clone();
        let files = list_log_files(&dir, &self.options.prefix).await?;
        let newest = files.last().cloned();

        let replay: &[LogFile] = if flags.replay_all {
            &files
        } else if flags.replay_current {
            &files[files.len().saturating_sub(1)..]
        } else {
            &[]
        };

        let mut live = None;
        for file in replay {
            debug!(file = %file.name, "replaying log file");
            let mut tail = FileTail::from_start(dir.join(&file.name));
            let ok = emitter.pump(&mut tail).await;
            if flags.tail_current && Some(file) == newest.as_ref() {
                live = Some(Live { tail, broken: !ok });
            } else if let Some(rest) = tail.finish() {
                emitter.line(&rest);
            }
        }

        if flags.tail_current && live.is_none() {
            if let Some(file) = &newest {
                let path = dir.join(&file.name);
                match FileTail::at_end(&path).await {
                    Ok(tail) => live = Some(Live { tail, broken: false }),
                    Err(source) => {
                        emitter.error(MonitorError::Read { path: path.clone(), source });
                        live = Some(Live {
                            tail: FileTail::from_start(path),
                            broken: true,
                        });
                    }
                }
            }
        }

        if !flags.is_live() {
            return Ok(());
        }

        let tail_loop = TailLoop {
            emitter,
            dir,
            prefix: self.options.prefix.clone(),
            current: newest,
            live,
            follow_rotation: flags.tail_future,
        };
        if let Some(live) = &tail_loop.live {
            info!(path = %live.tail.path().display(), "tailing log file");
        }
        let (rotation_poll, tail_poll) = (self.options.rotation_poll, self.options.tail_poll);
        self.task = Some(tokio::spawn(tail_loop.run(rotation_poll, tail_poll)));
        Ok(())
    }

    /// Cancel the rotation poll and release the tail. Safe to call any number
    /// of times, including while a poll or read is in flight.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("log ingestor stopped");
        }
    }

    /// True while the live task exists and has not finished.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for LogIngestor {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tail task
// ---------------------------------------------------------------------------

struct Live {
    tail: FileTail,
    /// Last read failed; retried on the next rotation poll.
    broken: bool,
}

struct TailLoop {
    emitter: Emitter,
    dir: PathBuf,
    prefix: String,
    current: Option<LogFile>,
    live: Option<Live>,
    follow_rotation: bool,
}

impl TailLoop {
    async fn run(mut self, rotation_poll: Duration, tail_poll: Duration) {
        let cancel = self.emitter.cancel.clone();
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(16);
        let _watcher = match watch_dir(&self.dir, wake_tx.clone()) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                self.emitter.error(MonitorError::Tail {
                    path: self.dir.clone(),
                    reason: err.to_string(),
                });
                None
            }
        };

        let mut tail_tick = tokio::time::interval(tail_poll);
        tail_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut rotation_tick = tokio::time::interval(rotation_poll);
        rotation_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(()) = wake_rx.recv() => {
                    while wake_rx.try_recv().is_ok() {}
                    self.drain().await;
                }
                _ = tail_tick.tick() => self.drain().await,
                _ = rotation_tick.tick(), if self.follow_rotation => self.poll_rotation().await,
            }
        }
        drop(wake_tx);
        debug!(dir = %self.dir.display(), "tail loop exited");
    }

    async fn drain(&mut self) {
        let Some(live) = self.live.as_mut() else { return };
        if live.broken {
            return;
        }
        if !self.emitter.pump(&mut live.tail).await {
            live.broken = true;
        }
    }

    async fn poll_rotation(&mut self) {
        let files = match list_log_files(&self.dir, &self.prefix).await {
            Ok(files) => files,
            Err(err) => {
                self.emitter.error(err);
                return;
            }
        };
        let Some(newest) = files.into_iter().last() else { return };

        let is_newer = self.current.as_ref().map_or(true, |current| newest > *current);
        if is_newer {
            self.rotate(newest).await;
        } else if let Some(live) = self.live.as_mut().filter(|live| live.broken) {
            debug!(path = %live.tail.path().display(), "retrying broken tail");
            live.broken = !self.emitter.pump(&mut live.tail).await;
        }
    }

    async fn rotate(&mut self, next: LogFile) {
        if let Some(mut old) = self.live.take() {
            if !old.broken {
                self.emitter.pump(&mut old.tail).await;
            }
            if let Some(rest) = old.tail.finish() {
                self.emitter.line(&rest);
            }
        }
        if self.emitter.cancel.is_cancelled() {
            return;
        }

        info!(
            from = self.current.as_ref().map(|f| f.name.as_str()).unwrap_or("-"),
            to = %next.name,
            "log rotated, replaying new file"
        );
        let mut tail = FileTail::from_start(self.dir.join(&next.name));
        let ok = self.emitter.pump(&mut tail).await;
        self.current = Some(next);
        self.live = Some(Live { tail, broken: !ok });
    }
}

fn watch_dir(dir: &Path, wake: mpsc::Sender<()>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            if matches!(
                event.kind,
                notify::EventKind::Modify(_) | notify::EventKind::Create(_)
            ) {
                // Full channel means a wake-up is already pending.
                let _ = wake.try_send(());
            }
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rptwatch_core::{EventKind, MemorySink, PatternClassifier};

    fn ingestor(dir: &Path, sink: &MemorySink) -> LogIngestor {
        LogIngestor::new(
            IngestOptions::new(dir, "MMDVM")
                .rotation_poll(Duration::from_millis(50))
                .tail_poll(Duration::from_millis(20)),
            Arc::new(PatternClassifier::new()),
            Arc::new(sink.clone()),
        )
    }

    fn line(message: &str) -> String {
        format!("M: 2024-01-01 00:00:00.000 {message}\n")
    }

    #[tokio::test]
    async fn replay_current_reads_only_newest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MMDVM-2024-01-01.log"), line("Opening the MMDVM")).unwrap();
        std::fs::write(dir.path().join("MMDVM-2024-01-02.log"), line("Closing the MMDVM")).unwrap();

        let sink = MemorySink::new();
        let mut ingestor = ingestor(dir.path(), &sink);
        ingestor
            .initialize(IngestFlags { replay_current: true, ..IngestFlags::default() })
            .await
            .unwrap();

        let kinds: Vec<_> = sink.lines().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [EventKind::DeviceClosing]);
        assert!(!ingestor.is_running());
    }

    #[tokio::test]
    async fn unclassified_lines_are_reported_raw() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MMDVM-2024-01-01.log"), "garbage line\n").unwrap();

        let sink = MemorySink::new();
        let mut ingestor = ingestor(dir.path(), &sink);
        ingestor
            .initialize(IngestFlags { replay_all: true, ..IngestFlags::default() })
            .await
            .unwrap();

        let notes = sink.take();
        assert_eq!(notes.len(), 1);
        assert!(matches!(&notes[0], Notification::Unclassified(raw) if raw == "garbage line"));
    }

    #[tokio::test]
    async fn conflicting_flags_are_rejected_before_reading() {
        let sink = MemorySink::new();
        let mut ingestor = ingestor(Path::new("/nonexistent"), &sink);
        let err = ingestor
            .initialize(IngestFlags {
                replay_all: true,
                replay_current: true,
                ..IngestFlags::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[tokio::test]
    async fn missing_directory_fails_initialize() {
        let sink = MemorySink::new();
        let mut ingestor = ingestor(Path::new("/nonexistent/rptwatch"), &sink);
        let err = ingestor.initialize(IngestFlags::follow_all()).await.unwrap_err();
        assert!(matches!(err, MonitorError::Listing { .. }));
    }

    #[tokio::test]
    async fn stop_twice_leaves_nothing_running() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MMDVM-2024-01-01.log"), "").unwrap();

        let sink = MemorySink::new();
        let mut ingestor = ingestor(dir.path(), &sink);
        ingestor.initialize(IngestFlags::follow_all()).await.unwrap();
        assert!(ingestor.is_running());

        ingestor.stop();
        ingestor.stop();
        assert!(!ingestor.is_running());
    }
}
