//! Line classifier: turns one raw host log line into a typed [`LogEvent`].
//!
//! Every line the host writes starts with the same prefix,
//!
//! ```text
//! M: 2024-01-15 10:00:00.123 <message>
//! ```
//!
//! followed by free text. The message is matched against a fixed table of
//! patterns, one per [`EventKind`], tried in registration order. The first
//! pattern whose regex matches decides the outcome: its capture groups are
//! run through their [`Transform`]s and, if every field converts, the line
//! becomes a [`LogEvent`]. Anything else is unclassified (`None`), which is a
//! diagnostic for the caller and never an error.
//!
//! Matching is case-insensitive. Patterns without a trailing `$` only need to
//! match a prefix of the message.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::types::{EventKind, FieldValue, LogEvent, DMR_SLOTS};

/// Shared line prefix: level column, then a millisecond timestamp.
pub const LINE_PREFIX: &str = r"^(\w?): (\d{4}-\d\d-\d\d \d\d:\d\d:\d\d\.\d{3})\s+";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Capture groups taken by [`LINE_PREFIX`] before the pattern's own fields.
const PREFIX_GROUPS: usize = 2;

/// Capability the ingestion engine classifies lines with.
pub trait Classifier: Send + Sync {
    /// Classify one line with its trailing newline already removed.
    fn classify(&self, line: &str) -> Option<LogEvent>;
}

// ---------------------------------------------------------------------------
// Pattern table
// ---------------------------------------------------------------------------

/// Conversion applied to a captured substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Text,
    Int,
    Float,
}

/// Name and conversion for one capture group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub transform: Transform,
    /// Accepted range for `Int` fields. Out-of-range values reject the line.
    pub bounds: Option<RangeInclusive<i64>>,
}

impl FieldSpec {
    const fn text(name: &'static str) -> Self {
        Self { name, transform: Transform::Text, bounds: None }
    }

    const fn int(name: &'static str) -> Self {
        Self { name, transform: Transform::Int, bounds: None }
    }

    const fn float(name: &'static str) -> Self {
        Self { name, transform: Transform::Float, bounds: None }
    }

    const fn slot() -> Self {
        Self { name: "slot", transform: Transform::Int, bounds: Some(DMR_SLOTS) }
    }

    fn convert(&self, raw: &str) -> Option<FieldValue> {
        match self.transform {
            Transform::Text => Some(FieldValue::Text(raw.to_string())),
            Transform::Int => {
                let value = raw.parse::<i64>().ok()?;
                match &self.bounds {
                    Some(bounds) if !bounds.contains(&value) => None,
                    _ => Some(FieldValue::Int(value)),
                }
            }
            Transform::Float => raw.parse::<f64>().ok().map(FieldValue::Float),
        }
    }
}

/// One row of the pattern table: the message regex (without the shared
/// prefix) and the fields its capture groups fill, in group order.
#[derive(Debug)]
pub struct PatternDef {
    pub kind: EventKind,
    pub message: &'static str,
    pub fields: &'static [FieldSpec],
}

/// The full pattern table in registration order.
pub static PATTERNS: &[PatternDef] = &[
    PatternDef {
        kind: EventKind::HostStarting,
        message: r"MMDVMHost-(\w*?) is starting",
        fields: &[FieldSpec::text("version")],
    },
    PatternDef {
        kind: EventKind::HostRunning,
        message: r"MMDVMHost-(\w*?) is running",
        fields: &[FieldSpec::text("version")],
    },
    PatternDef {
        kind: EventKind::HostExited,
        message: r"MMDVMHost-(\w*?) exited on receipt of (\w+?)$",
        fields: &[FieldSpec::text("version"), FieldSpec::text("signal")],
    },
    PatternDef {
        kind: EventKind::DeviceOpening,
        message: r"Opening the MMDVM",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DeviceClosing,
        message: r"Closing the MMDVM",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DeviceProtocol,
        message: r"MMDVM protocol version: (\w+?), description: (.*?) GitID #(\w+?)$",
        fields: &[
            FieldSpec::text("version"),
            FieldSpec::text("description"),
            FieldSpec::text("git_id"),
        ],
    },
    PatternDef {
        kind: EventKind::DmrNetOpening,
        message: r"DMR, Opening DMR Network",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DmrNetClosing,
        message: r"DMR, Closing DMR Network",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DmrNetSendingAuthorization,
        message: r"DMR, Sending authorisation",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DmrNetSendingConfiguration,
        message: r"DMR, Sending configuration",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DmrNetLoggedIn,
        message: r"DMR, Logged into the master successfully",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DmrIdThreadStarted,
        message: r"Started the DMR Id lookup reload thread",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DmrIdThreadStopped,
        message: r"Stopped the DMR Id lookup reload thread",
        fields: &[],
    },
    PatternDef {
        kind: EventKind::DmrRfRxVoiceHeader,
        message: r"DMR Slot (\d?), received RF voice header from (\w+?) to (.*?)$",
        fields: &[
            FieldSpec::slot(),
            FieldSpec::text("source"),
            FieldSpec::text("destination"),
        ],
    },
    PatternDef {
        kind: EventKind::DmrRfRxVoiceFrame,
        message: r"DMR Slot (\d?), audio sequence no\. (\d+?), errs: (\d+?)/\d+ \((\d+\.\d+?)%\)",
        fields: &[
            FieldSpec::slot(),
            FieldSpec::int("sequence"),
            FieldSpec::int("errs"),
            FieldSpec::float("ber"),
        ],
    },
    PatternDef {
        kind: EventKind::DmrRfRxVoiceEnd,
        message: r"DMR Slot (\d?), received RF end of voice transmission, (\d+\.\d+?) seconds, BER: (\d+\.\d+?)%",
        fields: &[
            FieldSpec::slot(),
            FieldSpec::float("seconds"),
            FieldSpec::float("ber"),
        ],
    },
];

// ---------------------------------------------------------------------------
// PatternClassifier
// ---------------------------------------------------------------------------

struct CompiledPattern {
    kind: EventKind,
    regex: Regex,
    fields: &'static [FieldSpec],
}

/// [`Classifier`] backed by the static [`PATTERNS`] table, compiled once.
pub struct PatternClassifier {
    prefix: Regex,
    patterns: Vec<CompiledPattern>,
}

impl std::fmt::Debug for PatternClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternClassifier")
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternClassifier {
    pub fn new() -> Self {
        let prefix = Regex::new(&format!("(?i){LINE_PREFIX}"))
            .expect("built-in line prefix must compile");
        let patterns = PATTERNS
            .iter()
            .map(|def| CompiledPattern {
                kind: def.kind,
                regex: Regex::new(&format!("(?i){LINE_PREFIX}{}", def.message))
                    .expect("built-in log line pattern must compile"),
                fields: def.fields,
            })
            .collect();
        Self { prefix, patterns }
    }

    fn build(pattern: &CompiledPattern, caps: &regex::Captures<'_>) -> Option<LogEvent> {
        let level = caps.get(1).and_then(|m| m.as_str().chars().next());
        let timestamp =
            NaiveDateTime::parse_from_str(caps.get(2)?.as_str(), TIMESTAMP_FORMAT).ok()?;

        let mut fields = BTreeMap::new();
        for (i, spec) in pattern.fields.iter().enumerate() {
            let raw = caps.get(PREFIX_GROUPS + 1 + i).map_or("", |m| m.as_str());
            let value = spec.convert(raw)?;
            fields.insert(spec.name.to_string(), value);
        }

        Some(LogEvent {
            kind: pattern.kind,
            level,
            timestamp,
            fields,
        })
    }
}

impl Classifier for PatternClassifier {
    fn classify(&self, line: &str) -> Option<LogEvent> {
        if !self.prefix.is_match(line) {
            return None;
        }
        let (pattern, caps) = self
            .patterns
            .iter()
            .find_map(|p| p.regex.captures(line).map(|caps| (p, caps)))?;
        let event = Self::build(pattern, &caps);
        if event.is_none() {
            tracing::trace!(kind = %pattern.kind, line, "pattern matched but a field did not convert");
        }
        event
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PREFIX: &str = "E: 2024-01-01 00:00:00.000 ";

    fn classify(message: &str) -> Option<LogEvent> {
        PatternClassifier::new().classify(&format!("{PREFIX}{message}"))
    }

    #[test]
    fn every_kind_has_exactly_one_pattern() {
        let mut kinds: Vec<_> = PATTERNS.iter().map(|p| p.kind).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), EventKind::ALL.len());
        assert_eq!(PATTERNS.len(), EventKind::ALL.len());
    }

    #[test]
    fn voice_header_fields() {
        let event = classify("DMR Slot 1, received RF voice header from ABC to XYZ").unwrap();
        assert_eq!(event.kind, EventKind::DmrRfRxVoiceHeader);
        assert_eq!(event.level, Some('E'));
        assert_eq!(event.int("slot"), Some(1));
        assert_eq!(event.text("source"), Some("ABC"));
        assert_eq!(event.text("destination"), Some("XYZ"));
        assert_eq!(event.fields.len(), 3);
    }

    #[test]
    fn timestamp_keeps_milliseconds() {
        let event = PatternClassifier::new()
            .classify("M: 2024-03-09 18:22:41.357 Opening the MMDVM")
            .unwrap();
        assert_eq!(
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            "2024-03-09 18:22:41.357"
        );
    }

    #[test]
    fn matching_ignores_case() {
        let event = classify("dmr, logged into the MASTER successfully").unwrap();
        assert_eq!(event.kind, EventKind::DmrNetLoggedIn);
    }

    #[test]
    fn empty_level_column_is_none() {
        let event = PatternClassifier::new()
            .classify(": 2024-01-01 00:00:00.000 Closing the MMDVM")
            .unwrap();
        assert_eq!(event.level, None);
    }

    #[test]
    fn out_of_range_slot_is_unclassified() {
        assert!(classify("DMR Slot 3, received RF voice header from ABC to XYZ").is_none());
        assert!(classify("DMR Slot , received RF voice header from ABC to XYZ").is_none());
    }

    #[test]
    fn impossible_timestamp_is_unclassified() {
        let line = "M: 2024-13-01 00:00:00.000 Opening the MMDVM";
        assert!(PatternClassifier::new().classify(line).is_none());
    }

    #[test]
    fn unknown_message_is_unclassified() {
        assert!(classify("YSF, Opening YSF network").is_none());
        assert!(PatternClassifier::new().classify("").is_none());
        assert!(PatternClassifier::new().classify("Opening the MMDVM").is_none());
    }
}
