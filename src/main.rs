use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rptwatch::{EventKind, LogEvent, Monitor, Notification, Settings, StatusTree, Update};
use rptwatch_core::reducer::{strategy, Subtree};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

#[derive(Parser)]
#[command(name = "rptwatch", about = "Status monitor for MMDVM repeater hosts")]
struct Cli {
    /// TOML settings file. Built-in defaults and RPTWATCH__* variables apply either way.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory holding the host's dated log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log file name prefix, e.g. MMDVM or DMRGateway.
    #[arg(long)]
    prefix: Option<String>,

    /// The host's INI file, loaded and watched for changes.
    #[arg(long)]
    ini: Option<PathBuf>,

    /// Only print these event kinds (repeatable), e.g. dmr_rf_rx_voice_end.
    #[arg(long = "kind")]
    kinds: Vec<EventKind>,

    /// Replay the log directory, print the status tree and exit.
    #[arg(long)]
    once: bool,

    /// Also print lines no pattern recognised.
    #[arg(long)]
    unclassified: bool,

    /// Write debug logs to /tmp/rptwatch-debug.log (tail -f to inspect).
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())
            .context("failed to load settings")?;
        if let Some(dir) = &self.log_dir {
            settings.logs.dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            settings.logs.prefix = prefix.clone();
        }
        if let Some(ini) = &self.ini {
            settings.host.ini_path = Some(ini.clone());
        }
        if self.once {
            settings.ingest.tail_current = false;
            settings.ingest.tail_future = false;
            settings.host.watch_ini = false;
        }
        Ok(settings)
    }

    fn wants(&self, kind: EventKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Print one update. The subtree shown is the one at emit time.
    fn print(&self, update: &Update) -> anyhow::Result<()> {
        match &update.notification {
            Notification::Line(event) if self.wants(event.kind) => {
                print_event(event, &update.status)?;
            }
            Notification::Unclassified(raw) if self.unclassified => {
                println!("{}", serde_json::json!({ "unclassified": raw }));
            }
            Notification::ConfigUpdate(change) => {
                println!("{}", serde_json::json!({ "config": change }));
            }
            Notification::Error(err) => eprintln!("rptwatch: {err}"),
            _ => {}
        }
        Ok(())
    }
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    if debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/rptwatch-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("rptwatch debug log started, tail -f /tmp/rptwatch-debug.log");
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
    Ok(())
}

/// The part of the tree `kind` touches, as JSON.
fn subtree(tree: &StatusTree, kind: EventKind) -> serde_json::Result<serde_json::Value> {
    match strategy(kind).subtree() {
        Subtree::Host => serde_json::to_value(&tree.host),
        Subtree::Device => serde_json::to_value(&tree.device),
        Subtree::DmrId => serde_json::to_value(&tree.dmr_id),
        Subtree::DmrNet => serde_json::to_value(&tree.dmr_net),
        Subtree::DmrRfRx => serde_json::to_value(&tree.dmr_rf.rx),
    }
}

fn print_event(event: &LogEvent, tree: &StatusTree) -> anyhow::Result<()> {
    let line = serde_json::json!({
        "event": event,
        "status": subtree(tree, event.kind)?,
    });
    println!("{line}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let settings = cli.settings()?;
    let mut monitor = Monitor::new(&settings)?;
    let mut updates = monitor.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Print the replay while it runs so the broadcast buffer does not overflow.
    {
        let init = monitor.init();
        tokio::pin!(init);
        loop {
            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                started = &mut init => {
                    started.with_context(|| {
                        format!("failed to start on {}", settings.logs.dir.display())
                    })?;
                    break;
                }
                next = updates.recv() => match next {
                    Ok(update) => cli.print(&update)?,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "output fell behind, events skipped");
                    }
                    Err(RecvError::Closed) => return Ok(()),
                },
            }
        }
    }

    if cli.once {
        loop {
            match updates.try_recv() {
                Ok(update) => cli.print(&update)?,
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "output fell behind, events skipped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        println!("{}", serde_json::to_string_pretty(&monitor.status())?);
        monitor.stop();
        return Ok(());
    }

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            next = updates.recv() => match next {
                Ok(update) => cli.print(&update)?,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "output fell behind, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    monitor.stop();
    Ok(())
}
