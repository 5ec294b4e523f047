//! autolockd - session daemon that locks the screen.
//!
//! Locks on idle, sleep and lid close, and exposes a control interface on the
//! session bus.

use autolockd::config::Config;
use autolockd::control;
use autolockd::coordinator::{CoordinatorHandle, EVENT_QUEUE_DEPTH, LockCoordinator};
use autolockd::idle::{IdleMonitor, X11IdleSource};
use autolockd::locker::BlockingLocker;
use autolockd::power;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Screen lock daemon.
///
/// Locks the screen on idle, sleep and lid close.
#[derive(Parser, Debug)]
#[command(name = "autolockd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file [default: ~/.config/autolockd/config.toml].
    #[arg(short = 'f', long)]
    config_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("autolockd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(args.config_file.as_deref())
        .context("Failed to load configuration")?;

    info!(
        "Configuration loaded (cmd={:?}, onidle={}, onsleep={}, onlidclose={}, idle threshold {:?})",
        config.lock.cmd,
        config.lock.onidle,
        config.lock.onsleep,
        config.lock.onlidclose,
        config.idle_threshold()
    );

    run_daemon(config).await
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("autolockd={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Wire up the trigger sources and run the coordinator until a shutdown signal.
async fn run_daemon(config: Config) -> Result<()> {
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

    let locker = BlockingLocker::new(config.lock.cmd.clone(), config.unlock_timeout());
    let coordinator = LockCoordinator::new(locker, config.policy());

    // Keeps the bus name for as long as it is alive
    let _control = control::serve(CoordinatorHandle::new(events_tx.clone())).await?;

    let _system_bus = if config.lock.onsleep || config.lock.onlidclose {
        let system = zbus::Connection::system()
            .await
            .context("Failed to connect to system DBus")?;
        if let Err(e) = power::start(&system, events_tx.clone()).await {
            warn!("Power-management triggers unavailable: {:#}", e);
        }
        Some(system)
    } else {
        debug!("Sleep and lid triggers disabled");
        None
    };

    if config.lock.onidle {
        let source = X11IdleSource::connect(None)
            .context("Idle locking is enabled but idle time cannot be read")?;
        IdleMonitor::new(source, config.idle_threshold()).start_polling(events_tx.clone());
    } else {
        debug!("Idle trigger disabled");
    }

    // From here on only the trigger sources and the control surface hold senders
    drop(events_tx);

    info!("Daemon started");

    tokio::select! {
        () = coordinator.run(events_rx) => {
            warn!("All event sources closed");
        }
        res = shutdown_signal() => {
            res?;
            // A running locker is left alone; killing it would unlock the screen.
            info!("Shutting down");
        }
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for SIGINT")?,
        _ = terminate.recv() => {}
    }

    Ok(())
}
