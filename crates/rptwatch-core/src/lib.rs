//! rptwatch-core: types and pure logic for monitoring an MMDVM host.
//!
//! # Pipeline
//!
//! ```text
//! log line ──► Classifier ──► LogEvent ──► StatusReducer ──► StatusTree
//!                  │                              │
//!                  └──► Notification::Unclassified └──► subscribers
//! ```
//!
//! Nothing in this crate touches the filesystem except [`config::Settings::load`].
//! File discovery, tailing and the INI watch live in `rptwatch-feeds`.

pub mod classifier;
pub mod config;
pub mod error;
pub mod reducer;
pub mod sink;
pub mod status;
pub mod types;

pub use classifier::{Classifier, PatternClassifier};
pub use error::{ConfigError, MonitorError};
pub use reducer::StatusReducer;
pub use sink::{ConfigChange, EventSink, MemorySink, Notification};
pub use status::{SlotState, StatusTree};
pub use types::{EventKind, FieldValue, IngestFlags, LogEvent};
