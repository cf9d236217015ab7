//! Hot-reloaded view of the host's INI configuration file.
//!
//! The file is parsed through the `config` crate's INI format into a plain
//! `section -> key -> value` map; every value is a string. On open, and on
//! each change the `notify` watcher reports, the file is re-read and diffed
//! against what is already known. Added or changed keys go out as
//! [`Notification::ConfigUpdate`]. Keys that disappear from the file are kept.
//!
//! Keys outside any section live under the empty section name `""`.
//! Sections and keys keep the order they have in the file, so a committed
//! [`ConfigWatch::set`] rewrites the file in its original layout.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use config::Source;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rptwatch_core::{ConfigChange, ConfigError, EventSink, Notification};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Editors write in bursts; wait this long after the first event.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Insertion-ordered with the `config` crate's `preserve_order` feature.
pub type IniSection = config::Map<String, String>;
pub type IniDocument = config::Map<String, IniSection>;

// ---------------------------------------------------------------------------
// Parse / render
// ---------------------------------------------------------------------------

pub fn parse_ini(text: &str, path: &Path) -> Result<IniDocument, ConfigError> {
    let parse_error = |err: config::ConfigError| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    let root = config::Config::builder()
        .add_source(config::File::from_str(text, config::FileFormat::Ini))
        .build()
        .and_then(|cfg| cfg.collect())
        .map_err(parse_error)?;

    let mut doc = IniDocument::new();
    for (name, value) in root {
        match value.clone().into_table() {
            Ok(table) => {
                let section = doc.entry(name).or_default();
                for (key, value) in table {
                    section.insert(key, value_string(value));
                }
            }
            Err(_) => {
                doc.entry(String::new())
                    .or_default()
                    .insert(name, value_string(value));
            }
        }
    }
    Ok(doc)
}

fn value_string(value: config::Value) -> String {
    let display = value.to_string();
    value.into_string().unwrap_or(display)
}

pub fn render_ini(doc: &IniDocument) -> String {
    let mut out = String::new();
    if let Some(globals) = doc.get("") {
        for (key, value) in globals {
            out.push_str(&format!("{key}={value}\n"));
        }
        out.push('\n');
    }
    for (section, entries) in doc.iter().filter(|(name, _)| !name.is_empty()) {
        out.push_str(&format!("[{section}]\n"));
        for (key, value) in entries {
            out.push_str(&format!("{key}={value}\n"));
        }
        out.push('\n');
    }
    out
}

/// Fold `fresh` into `known`, returning one change per added or altered key.
pub fn merge(known: &mut IniDocument, fresh: IniDocument) -> Vec<ConfigChange> {
    let mut changes = Vec::new();
    for (section, entries) in fresh {
        let target = known.entry(section.clone()).or_default();
        for (key, value) in entries {
            if target.get(&key) == Some(&value) {
                continue;
            }
            target.insert(key.clone(), value.clone());
            changes.push(ConfigChange {
                section: section.clone(),
                key,
                value,
            });
        }
    }
    changes
}

fn check_names(section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
    let line_break = |s: &str| s.contains(['\n', '\r']);
    if line_break(section) || section.contains(['[', ']']) {
        return Err(ConfigError::InvalidName(section.to_string()));
    }
    if key.trim().is_empty()
        || line_break(key)
        || key.contains(['=', '['])
        || key.starts_with([';', '#'])
    {
        return Err(ConfigError::InvalidName(key.to_string()));
    }
    if line_break(value) {
        return Err(ConfigError::InvalidName(value.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ConfigWatch
// ---------------------------------------------------------------------------

/// Shared state between the handle and the watch task.
struct Shared {
    path: PathBuf,
    doc: RwLock<IniDocument>,
    sink: Arc<dyn EventSink>,
}

impl Shared {
    /// Re-read the file and notify every changed key. Returns how many changed.
    async fn reload(&self) -> Result<usize, ConfigError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;
        let fresh = parse_ini(&text, &self.path)?;
        let changes = {
            let mut doc = self.doc.write().unwrap_or_else(PoisonError::into_inner);
            merge(&mut doc, fresh)
        };
        let count = changes.len();
        for change in changes {
            self.sink.emit(Notification::ConfigUpdate(change));
        }
        Ok(count)
    }
}

pub struct ConfigWatch {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ConfigWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatch")
            .field("path", &self.shared.path)
            .field("watching", &self.is_watching())
            .finish()
    }
}

impl ConfigWatch {
    /// Load `path`, emitting a [`Notification::ConfigUpdate`] for every key.
    pub async fn open(
        path: impl Into<PathBuf>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        let shared = Arc::new(Shared {
            path: path.into(),
            doc: RwLock::new(IniDocument::new()),
            sink,
        });
        let count = shared.reload().await?;
        info!(path = %shared.path.display(), keys = count, "host config loaded");
        Ok(Self {
            shared,
            cancel: CancellationToken::new(),
            task: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Start reloading on file changes. A second call is a no-op.
    pub fn watch(&mut self) -> Result<(), ConfigError> {
        if self.is_watching() {
            return Ok(());
        }
        let watch_error = |err: notify::Error| ConfigError::Watch {
            path: self.shared.path.clone(),
            reason: err.to_string(),
        };

        let (tx, mut rx) = mpsc::channel::<()>(16);
        let file_name = self.shared.path.file_name().map(|n| n.to_os_string());
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let Ok(event) = res else { return };
                let relevant = matches!(
                    event.kind,
                    notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                ) && event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if relevant {
                    let _ = tx.try_send(());
                }
            })
            .map_err(watch_error)?;
        let dir = match self.shared.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        let shared = Arc::clone(&self.shared);
        self.task = Some(tokio::spawn(async move {
            let _watcher = watcher;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    Some(()) = rx.recv() => {
                        tokio::time::sleep(DEBOUNCE).await;
                        while rx.try_recv().is_ok() {}
                        if cancel.is_cancelled() {
                            break;
                        }
                        match shared.reload().await {
                            Ok(count) => debug!(changed = count, "host config reloaded"),
                            Err(err) => {
                                warn!(error = %err, "host config reload failed");
                                shared.sink.emit(Notification::error(err));
                            }
                        }
                    }
                }
            }
            debug!(path = %shared.path.display(), "config watch exited");
        }));
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        let doc = self.shared.doc.read().unwrap_or_else(PoisonError::into_inner);
        doc.get(section).and_then(|s| s.get(key)).cloned()
    }

    /// A copy of everything currently known.
    pub fn document(&self) -> IniDocument {
        self.shared
            .doc
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Set one value in memory, and write the whole file back if `commit`.
    pub async fn set(
        &self,
        section: &str,
        key: &str,
        value: &str,
        commit: bool,
    ) -> Result<(), ConfigError> {
        check_names(section, key, value)?;
        {
            let mut doc = self.shared.doc.write().unwrap_or_else(PoisonError::into_inner);
            doc.entry(section.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }
        if commit {
            self.save().await?;
        }
        Ok(())
    }

    /// Write the in-memory document back to the file.
    pub async fn save(&self) -> Result<(), ConfigError> {
        let text = render_ini(&self.document());
        tokio::fs::write(&self.shared.path, text)
            .await
            .map_err(|source| ConfigError::Write {
                path: self.shared.path.clone(),
                source,
            })
    }

    /// Stop watching. Idempotent; the loaded document stays readable.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ConfigWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
