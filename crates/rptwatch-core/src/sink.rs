//! The typed notification stream that connects producers to the reducer.
//!
//! Replay, the live tail, the rotation poll and the config watch all write
//! into an [`EventSink`]. In the running monitor that sink is one unbounded
//! channel with exactly one reader, which is what serialises every source onto
//! the single reducer path.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::MonitorError;
use crate::types::LogEvent;

/// A key added or changed in the host's INI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigChange {
    pub section: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum Notification {
    /// A classified log line.
    Line(LogEvent),
    /// A non-blank line that matched no pattern. Diagnostic only.
    Unclassified(String),
    /// An I/O, listing or config failure. The emitter keeps running.
    Error(Arc<MonitorError>),
    ConfigUpdate(ConfigChange),
}

impl Notification {
    pub fn error(err: impl Into<MonitorError>) -> Self {
        Notification::Error(Arc::new(err.into()))
    }

    pub fn as_line(&self) -> Option<&LogEvent> {
        match self {
            Notification::Line(event) => Some(event),
            _ => None,
        }
    }
}

/// Anything that accepts notifications. Emitting never blocks and never fails
/// from the producer's point of view; a sink whose reader is gone drops
/// silently.
pub trait EventSink: Send + Sync {
    fn emit(&self, notification: Notification);
}

impl EventSink for mpsc::UnboundedSender<Notification> {
    fn emit(&self, notification: Notification) {
        if self.send(notification).is_err() {
            tracing::trace!("notification dropped: receiver closed");
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, notification: Notification) {
        (**self).emit(notification)
    }
}

/// Collects notifications in memory. Used by tests and benches that drive the
/// pipeline without a channel reader.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    inner: Arc<std::sync::Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Vec<Notification> {
        match self.inner.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Classified events collected so far, without draining.
    pub fn lines(&self) -> Vec<LogEvent> {
        match self.inner.lock() {
            Ok(guard) => guard.iter().filter_map(|n| n.as_line().cloned()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, notification: Notification) {
        match self.inner.lock() {
            Ok(mut guard) => guard.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}
