//! Core types for rptwatch-core.
//!
//! This module defines the fundamental data structures shared across all
//! layers: the classified [`LogEvent`], its [`EventKind`] and typed
//! [`FieldValue`]s, and the [`IngestFlags`] that select how a log directory
//! is consumed.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// DMR time slots the host reports on. Slot numbers outside this range are
/// never classified.
pub const DMR_SLOTS: RangeInclusive<i64> = 1..=2;

/// The fixed vocabulary of log line kinds the classifier recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HostStarting,
    HostRunning,
    HostExited,
    DeviceOpening,
    DeviceClosing,
    DeviceProtocol,
    DmrNetOpening,
    DmrNetClosing,
    DmrNetSendingAuthorization,
    DmrNetSendingConfiguration,
    DmrNetLoggedIn,
    DmrIdThreadStarted,
    DmrIdThreadStopped,
    DmrRfRxVoiceHeader,
    DmrRfRxVoiceFrame,
    DmrRfRxVoiceEnd,
}

impl EventKind {
    /// Every kind, in classifier registration order.
    pub const ALL: [EventKind; 16] = [
        EventKind::HostStarting,
        EventKind::HostRunning,
        EventKind::HostExited,
        EventKind::DeviceOpening,
        EventKind::DeviceClosing,
        EventKind::DeviceProtocol,
        EventKind::DmrNetOpening,
        EventKind::DmrNetClosing,
        EventKind::DmrNetSendingAuthorization,
        EventKind::DmrNetSendingConfiguration,
        EventKind::DmrNetLoggedIn,
        EventKind::DmrIdThreadStarted,
        EventKind::DmrIdThreadStopped,
        EventKind::DmrRfRxVoiceHeader,
        EventKind::DmrRfRxVoiceFrame,
        EventKind::DmrRfRxVoiceEnd,
    ];

    /// The snake_case name used in notifications and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::HostStarting => "host_starting",
            EventKind::HostRunning => "host_running",
            EventKind::HostExited => "host_exited",
            EventKind::DeviceOpening => "device_opening",
            EventKind::DeviceClosing => "device_closing",
            EventKind::DeviceProtocol => "device_protocol",
            EventKind::DmrNetOpening => "dmr_net_opening",
            EventKind::DmrNetClosing => "dmr_net_closing",
            EventKind::DmrNetSendingAuthorization => "dmr_net_sending_authorization",
            EventKind::DmrNetSendingConfiguration => "dmr_net_sending_configuration",
            EventKind::DmrNetLoggedIn => "dmr_net_logged_in",
            EventKind::DmrIdThreadStarted => "dmr_id_thread_started",
            EventKind::DmrIdThreadStopped => "dmr_id_thread_stopped",
            EventKind::DmrRfRxVoiceHeader => "dmr_rf_rx_voice_header",
            EventKind::DmrRfRxVoiceFrame => "dmr_rf_rx_voice_frame",
            EventKind::DmrRfRxVoiceEnd => "dmr_rf_rx_voice_end",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// A captured field after its transform has been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// One classified log line. Never mutated after classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub kind: EventKind,
    /// Severity column of the line (`M`, `I`, `W`, `E`, ...). `None` when the
    /// column is empty.
    pub level: Option<char>,
    /// Time embedded in the line. The host writes local wall-clock time with
    /// no zone, so it is kept naive.
    pub timestamp: NaiveDateTime,
    pub fields: BTreeMap<String, FieldValue>,
}

impl LogEvent {
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.fields.get(name) {
            Some(FieldValue::Float(v)) => Some(*v),
            Some(FieldValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Selects which parts of a log directory the ingestion engine consumes.
///
/// The flags are independent except that `replay_all` and `replay_current`
/// may not both be set; see [`IngestFlags::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct IngestFlags {
    /// Read every dated file, oldest first, before going live.
    #[serde(default)]
    pub replay_all: bool,
    /// Read only the newest file before going live.
    #[serde(default)]
    pub replay_current: bool,
    /// Follow lines appended to the newest file.
    #[serde(default)]
    pub tail_current: bool,
    /// Poll the directory for newer files and switch to them.
    #[serde(default)]
    pub tail_future: bool,
}

impl IngestFlags {
    /// Full history, then follow the current file and every file after it.
    pub fn follow_all() -> Self {
        Self {
            replay_all: true,
            replay_current: false,
            tail_current: true,
            tail_future: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replay_all && self.replay_current {
            return Err(ConfigError::ConflictingReplay);
        }
        Ok(())
    }

    /// Whether a background tail task is needed at all.
    pub fn is_live(&self) -> bool {
        self.tail_current || self.tail_future
    }
}
