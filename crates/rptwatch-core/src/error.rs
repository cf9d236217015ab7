//! Error taxonomy shared by every rptwatch layer.
//!
//! None of these are fatal to the pipeline. Ingestion and config watch
//! failures travel as [`Notification::Error`](crate::sink::Notification::Error)
//! and the host application decides what to do with them. Lines that match
//! no pattern are not errors at all; they surface as
//! [`Notification::Unclassified`](crate::sink::Notification::Unclassified).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The log directory could not be listed.
    #[error("cannot list log directory {}: {source}", dir.display())]
    Listing {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A log file could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The change-watch mechanism behind the live tail failed.
    #[error("tail of {} failed: {reason}", path.display())]
    Tail { path: PathBuf, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// `replay_all` and `replay_current` were both requested.
    #[error("replay_all and replay_current are mutually exclusive")]
    ConflictingReplay,

    #[error("invalid settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("cannot parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot watch {}: {reason}", path.display())]
    Watch { path: PathBuf, reason: String },

    /// A section or key name that cannot be written back to an INI file.
    #[error("invalid config name {0:?}")]
    InvalidName(String),
}
