//! Test builders: ergonomic constructors for `LogEvent`s and log lines.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rptwatch_core::{EventKind, FieldValue, LogEvent};

/// Midnight on 2024-01-01 plus `secs` seconds.
pub fn at(secs: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(i64::from(secs))
}

// ---------------------------------------------------------------------------
// LogEventBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`LogEvent`] fixtures.
///
/// # Example
///
/// ```rust
/// let event = LogEventBuilder::new(EventKind::DmrRfRxVoiceHeader)
///     .at(12)
///     .field("slot", 2i64)
///     .field("source", "N0CALL")
///     .build();
/// ```
pub struct LogEventBuilder {
    kind: EventKind,
    level: Option<char>,
    timestamp: NaiveDateTime,
    fields: BTreeMap<String, FieldValue>,
}

impl LogEventBuilder {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            level: Some('M'),
            timestamp: at(0),
            fields: BTreeMap::new(),
        }
    }

    pub fn level(mut self, level: Option<char>) -> Self {
        self.level = level;
        self
    }

    pub fn at(mut self, secs: u32) -> Self {
        self.timestamp = at(secs);
        self
    }

    pub fn field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn build(self) -> LogEvent {
        LogEvent {
            kind: self.kind,
            level: self.level,
            timestamp: self.timestamp,
            fields: self.fields,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

pub fn voice_header(slot: i64, secs: u32, source: &str, destination: &str) -> LogEvent {
    LogEventBuilder::new(EventKind::DmrRfRxVoiceHeader)
        .at(secs)
        .field("slot", slot)
        .field("source", source)
        .field("destination", destination)
        .build()
}

pub fn voice_frame(slot: i64, secs: u32, ber: f64) -> LogEvent {
    LogEventBuilder::new(EventKind::DmrRfRxVoiceFrame)
        .at(secs)
        .field("slot", slot)
        .field("sequence", 1i64)
        .field("errs", 0i64)
        .field("ber", ber)
        .build()
}

pub fn voice_end(slot: i64, secs: u32, seconds: f64, ber: f64) -> LogEvent {
    LogEventBuilder::new(EventKind::DmrRfRxVoiceEnd)
        .at(secs)
        .field("slot", slot)
        .field("seconds", seconds)
        .field("ber", ber)
        .build()
}

/// A raw host log line: `M: 2024-01-01 00:00:SS.000 <message>`.
pub fn log_line(secs: u32, message: &str) -> String {
    format!("M: {} {message}", at(secs).format("%Y-%m-%d %H:%M:%S%.3f"))
}
