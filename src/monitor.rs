//! The running monitor: wires the ingestor and the config watch into one
//! reducer task and publishes the results.
//!
//! Construction and initialization are separate so that subscribers can
//! attach before anything is read:
//!
//! ```no_run
//! # async fn run() -> Result<(), rptwatch_core::MonitorError> {
//! let settings = rptwatch::Settings::defaults();
//! let mut monitor = rptwatch::Monitor::new(&settings)?;
//! let mut updates = monitor.subscribe();
//! monitor.init().await?;
//! // `updates` holds every replayed line and the initial config load.
//! # Ok(())
//! # }
//! ```
//!
//! [`Monitor::init`] returns only after the historical replay has been
//! folded into the status tree, so the first [`Monitor::status`] call after
//! it already reflects everything in the log directory.

use std::sync::Arc;

use rptwatch_core::config::Settings;
use rptwatch_core::{
    Classifier, EventKind, EventSink, LogEvent, MonitorError, Notification, PatternClassifier,
    StatusReducer, StatusTree,
};
use rptwatch_feeds::{ConfigWatch, IngestOptions, LogIngestor};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What travels down the funnel to the reducer task.
enum Inbound {
    Notify(Notification),
    /// Answered once everything sent before it has been applied.
    Barrier(oneshot::Sender<()>),
}

/// The producers' view of the funnel.
#[derive(Clone)]
struct Funnel(mpsc::UnboundedSender<Inbound>);

impl EventSink for Funnel {
    fn emit(&self, notification: Notification) {
        if self.0.send(Inbound::Notify(notification)).is_err() {
            tracing::trace!("notification dropped: reducer stopped");
        }
    }
}

impl Funnel {
    /// Wait until the reducer has applied everything emitted so far.
    async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.0.send(Inbound::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// One broadcast item: a notification and the tree right after it was
/// applied. Only `Line` notifications change the tree.
#[derive(Debug, Clone)]
pub struct Update {
    pub notification: Notification,
    pub status: Arc<StatusTree>,
}

pub struct Monitor {
    settings: Settings,
    ingestor: LogIngestor,
    config: Option<ConfigWatch>,
    status: watch::Receiver<Arc<StatusTree>>,
    events: broadcast::Sender<Update>,
    funnel: Funnel,
    cancel: CancellationToken,
    reducer: Option<JoinHandle<()>>,
    initialized: bool,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("ingestor", &self.ingestor)
            .field("config", &self.config)
            .field("initialized", &self.initialized)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Monitor {
    /// Build a monitor with the built-in MMDVMHost patterns. Nothing is read
    /// until [`init`](Self::init).
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; the reducer task is
    /// spawned here.
    pub fn new(settings: &Settings) -> Result<Self, MonitorError> {
        Self::with_classifier(settings, Arc::new(PatternClassifier::new()))
    }

    pub fn with_classifier(
        settings: &Settings,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, MonitorError> {
        settings.validate()?;

        let (funnel_tx, funnel_rx) = mpsc::unbounded_channel();
        let funnel = Funnel(funnel_tx);
        let (status_tx, status_rx) = watch::channel(Arc::new(StatusTree::default()));
        let (events, _) = broadcast::channel(settings.monitor.channel_capacity.max(1));
        let cancel = CancellationToken::new();

        let reducer = tokio::spawn(reduce(
            funnel_rx,
            status_tx,
            events.clone(),
            cancel.clone(),
        ));

        let sink: Arc<dyn EventSink> = Arc::new(funnel.clone());
        let ingestor = LogIngestor::new(IngestOptions::from(&settings.logs), classifier, sink);

        Ok(Self {
            settings: settings.clone(),
            ingestor,
            config: None,
            status: status_rx,
            events,
            funnel,
            cancel,
            reducer: Some(reducer),
            initialized: false,
        })
    }

    /// Load the host INI, replay the history and start following the logs.
    /// Returns once the replay has been applied. A second call is a no-op.
    pub async fn init(&mut self) -> Result<(), MonitorError> {
        if self.initialized {
            return Ok(());
        }
        let settings = &self.settings;

        if let Some(path) = &settings.host.ini_path {
            let sink: Arc<dyn EventSink> = Arc::new(self.funnel.clone());
            let mut ini = ConfigWatch::open(path, sink).await?;
            if settings.host.watch_ini {
                ini.watch()?;
            }
            self.config = Some(ini);
        }

        self.ingestor.initialize(settings.ingest).await?;
        self.funnel.flush().await;
        self.initialized = true;

        info!(
            dir = %settings.logs.dir.display(),
            prefix = %settings.logs.prefix,
            live = settings.ingest.is_live(),
            "monitor started"
        );
        Ok(())
    }

    /// [`new`](Self::new) followed by [`init`](Self::init). Subscribers
    /// attached afterwards only see what happens from now on.
    pub async fn start(settings: &Settings) -> Result<Self, MonitorError> {
        let mut monitor = Self::new(settings)?;
        monitor.init().await?;
        Ok(monitor)
    }

    pub async fn start_with(
        settings: &Settings,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, MonitorError> {
        let mut monitor = Self::with_classifier(settings, classifier)?;
        monitor.init().await?;
        Ok(monitor)
    }

/// An immutable copy of the current status tree.
    pub fn status(&self) -> StatusTree {
        StatusTree::clone(&self.status.borrow())
    }

    /// A receiver that is marked changed after every applied event.
    pub fn watch_status(&self) -> watch::Receiver<Arc<StatusTree>> {
        self.status.clone()
    }

    /// Every notification, in the order the reducer saw it. A `Line` is
    /// broadcast after it has been applied to the tree.
    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.events.subscribe()
    }

    /// Only classified events of `kind`.
    pub fn subscribe_kind(&self, kind: EventKind) -> KindSubscription {
        KindSubscription {
            kind,
            rx: self.events.subscribe(),
        }
    }

    /// The host INI watch, when one was configured.
    pub fn config(&self) -> Option<&ConfigWatch> {
        self.config.as_ref()
    }

    /// Wait until everything emitted so far has been applied.
    pub async fn settle(&self) {
        self.funnel.flush().await;
    }

    pub fn is_running(&self) -> bool {
        self.reducer.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the ingestor, the config watch and the reducer. Idempotent. The
    /// last snapshot stays readable.
    pub fn stop(&mut self) {
        self.ingestor.stop();
        if let Some(config) = self.config.as_mut() {
            config.stop();
        }
        self.cancel.cancel();
        if self.reducer.take().is_some() {
            debug!("monitor stopped");
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the reducer task: the only place the tree is mutated.
async fn reduce(
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    status: watch::Sender<Arc<StatusTree>>,
    events: broadcast::Sender<Update>,
    cancel: CancellationToken,
) {
    let mut reducer = StatusReducer::new();
    let mut current = Arc::new(StatusTree::default());
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = inbound.recv() => next,
        };
        match next {
            None => break,
            Some(Inbound::Barrier(done)) => {
                let _ = done.send(());
            }
            Some(Inbound::Notify(notification)) => {
                if let Notification::Line(event) = &notification {
                    reducer.apply(event);
                    current = Arc::new(reducer.snapshot().clone());
                    status.send_replace(Arc::clone(&current));
                }
                // No subscribers is not an error.
                let _ = events.send(Update {
                    notification,
                    status: Arc::clone(&current),
                });
            }
        }
    }
    debug!("reducer task exited");
}

// ---------------------------------------------------------------------------
// KindSubscription
// ---------------------------------------------------------------------------

/// A filtered view of the broadcast stream.
#[derive(Debug)]
pub struct KindSubscription {
    kind: EventKind,
    rx: broadcast::Receiver<Update>,
}

impl KindSubscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The next event of this kind, or `None` once the monitor is gone.
    /// Events lost to lag are skipped with a warning.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        loop {
            match self.rx.recv().await {
                Ok(Update {
                    notification: Notification::Line(event),
                    ..
                }) if event.kind == self.kind => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(kind = %self.kind, missed, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
