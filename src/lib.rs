//! rptwatch: status monitor for MMDVM repeater hosts.
//!
//! Follows the host's dated log files, classifies each line into a typed
//! event, and keeps a live status tree of the host process, the modem, the
//! DMR network link and the DMR RF receive slots.
//!
//! # Architecture
//!
//! ```text
//! LogIngestor ──┐
//!               ├──► funnel (mpsc) ──► reducer task ──► watch<StatusTree>
//! ConfigWatch ──┘                           │
//!                                           └──► broadcast<Notification>
//! ```
//!
//! Every producer writes into the same funnel and one task owns the
//! [`StatusReducer`](rptwatch_core::StatusReducer), so events are applied in
//! exactly the order they were emitted. Readers only ever see cloned
//! snapshots, and each broadcast [`Update`] carries the snapshot taken right
//! after its notification was applied.

pub mod monitor;

pub use monitor::{KindSubscription, Monitor, Update};
pub use rptwatch_core::config::Settings;
pub use rptwatch_core::{EventKind, LogEvent, Notification, StatusTree};
