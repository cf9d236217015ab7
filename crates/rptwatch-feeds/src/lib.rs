//! rptwatch-feeds: the filesystem-facing side of rptwatch.
//!
//! - [`files`] lists and orders the host's dated log files.
//! - [`tail`] follows one file by byte offset.
//! - [`ingest`] combines both into the replay / tail / rotation engine.
//! - [`confwatch`] keeps a hot-reloaded copy of the host's INI file.
//!
//! Everything here writes into an [`rptwatch_core::EventSink`]; nothing here
//! touches the status tree.

pub mod confwatch;
pub mod files;
pub mod ingest;
pub mod tail;

pub use confwatch::{ConfigWatch, IniDocument};
pub use files::{list_log_files, select_log_files, LogFile};
pub use ingest::{IngestOptions, LogIngestor};
pub use tail::FileTail;
