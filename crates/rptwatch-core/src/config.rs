//! Settings for rptwatch.
//!
//! [`Settings::load`] layers, in order: the embedded defaults, an optional
//! TOML file, and `RPTWATCH__SECTION__KEY` environment variables.
//! [`Settings::defaults`] returns the embedded defaults without touching the
//! filesystem or the environment (useful in tests).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::IngestFlags;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_SETTINGS: &str = r#"
[logs]
dir                = "/var/log"
prefix             = "MMDVM"
rotation_poll_secs = 60
tail_poll_millis   = 1000

[ingest]
replay_all     = true
replay_current = false
tail_current   = true
tail_future    = true

[host]
# ini_path  = "/opt/MMDVMHost/MMDVM.ini"
watch_ini = true

[monitor]
channel_capacity = 1024
"#;

const ENV_PREFIX: &str = "RPTWATCH";

// ---------------------------------------------------------------------------
// Public settings types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logs: LogsSettings,
    #[serde(default = "default_ingest")]
    pub ingest: IngestFlags,
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
}

/// `[logs]`: where the host writes its dated log files.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsSettings {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_rotation_poll_secs")]
    pub rotation_poll_secs: u64,
    #[serde(default = "default_tail_poll_millis")]
    pub tail_poll_millis: u64,
}

fn default_dir() -> PathBuf { PathBuf::from("/var/log") }
fn default_prefix() -> String { "MMDVM".to_string() }
fn default_rotation_poll_secs() -> u64 { 60 }
fn default_tail_poll_millis() -> u64 { 1000 }
fn default_ingest() -> IngestFlags { IngestFlags::follow_all() }

impl Default for LogsSettings {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            prefix: default_prefix(),
            rotation_poll_secs: default_rotation_poll_secs(),
            tail_poll_millis: default_tail_poll_millis(),
        }
    }
}

impl LogsSettings {
    pub fn rotation_poll(&self) -> Duration {
        Duration::from_secs(self.rotation_poll_secs.max(1))
    }

    pub fn tail_poll(&self) -> Duration {
        Duration::from_millis(self.tail_poll_millis.max(10))
    }
}

/// `[host]`: the host's own INI configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct HostSettings {
    /// Not watched at all when unset.
    #[serde(default)]
    pub ini_path: Option<PathBuf>,
    #[serde(default = "default_watch_ini")]
    pub watch_ini: bool,
}

fn default_watch_ini() -> bool { true }

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            ini_path: None,
            watch_ini: default_watch_ini(),
        }
    }
}

/// `[monitor]`: fan-out to subscribers.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    /// Broadcast buffer per subscriber before it starts lagging.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize { 1024 }

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}

/// The layers a user controls: an optional file, then the environment.
fn user_sources(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    path: Option<&Path>,
) -> config::ConfigBuilder<config::builder::DefaultState> {
    let builder = match path {
        Some(path) => builder.add_source(config::File::from(path).required(true)),
        None => builder,
    };
    builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    )
}

impl Settings {
    /// Load the embedded defaults, then `path` if given, then the environment.
    ///
    /// `replay_all` is on by default. Setting `replay_current` without also
    /// setting `replay_all` turns the default off; setting both is rejected.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit_replay_all = user_sources(config::Config::builder(), path)
            .build()?
            .get_bool("ingest.replay_all")
            .ok();

        let defaults = config::Config::builder().add_source(config::File::from_str(
            DEFAULT_SETTINGS,
            config::FileFormat::Toml,
        ));
        let mut settings: Settings = user_sources(defaults, path).build()?.try_deserialize()?;
        if settings.ingest.replay_current && explicit_replay_all.is_none() {
            settings.ingest.replay_all = false;
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_SETTINGS, config::FileFormat::Toml))
            .build()
            .expect("built-in default settings must be valid TOML")
            .try_deserialize()
            .expect("built-in default settings must deserialize correctly")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ingest.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
