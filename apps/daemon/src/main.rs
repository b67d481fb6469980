//! Sonority Daemon - headless control point.
//!
//! Discovers speakers, keeps the coordinator polling the selected group and
//! logs every topology, transport and notice event until shut down.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sonority_core::{bootstrap_services_with_catalog, CatalogBridge, ControlState};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::StreamExt;

use crate::config::DaemonConfig;

/// Sonority Daemon - headless UPnP control point for networked speakers.
#[derive(Parser, Debug)]
#[command(name = "sonority-daemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "SONORITY_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Discovery window in seconds (overrides config file).
    #[arg(short = 'w', long)]
    discovery_window: Option<u64>,

    /// Seconds between discovery rounds, 0 for once (overrides config file).
    #[arg(short = 'r', long)]
    rediscover_interval: Option<u64>,

    /// GENA callback URL (overrides config file).
    #[arg(long)]
    event_callback_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Sonority Daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        DaemonConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(secs) = args.discovery_window {
        config.discovery_window_secs = secs;
    }
    if let Some(secs) = args.rediscover_interval {
        config.rediscover_interval_secs = secs;
    }
    if let Some(url) = args.event_callback_url {
        config.event_callback_url = Some(url);
    }

    log::info!(
        "Configuration: discovery_window={}s, rediscover_interval={}s, eventing={}",
        config.discovery_window_secs,
        config.rediscover_interval_secs,
        config.event_callback_url.is_some()
    );

    if let Some(url) = &config.event_callback_url {
        log::info!(
            "GENA subscriptions will target {}; NOTIFY requests must be handled by an external receiver",
            url
        );
    }

    let catalog = config
        .catalog_bridge()
        .map(|bridge| Arc::new(bridge) as Arc<dyn CatalogBridge>);
    let services = bootstrap_services_with_catalog(&config.to_core_config(), catalog)
        .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    // Log every outbound event
    let mut events = services.subscribe_events();
    let event_logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log::info!("[Event] {:?}", event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("[Event] Logger lagged, skipped {} event(s)", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Log a one-line summary whenever the snapshot changes shape
    let mut snapshots = services.coordinator.state_stream();
    let snapshot_logger = tokio::spawn(async move {
        let mut last = String::new();
        while let Some(state) = snapshots.next().await {
            let line = summarize(&state);
            if line != last {
                log::info!("[State] {}", line);
                last = line;
            }
        }
    });

    services.coordinator.start_discovery();

    let rediscovery = (config.rediscover_interval_secs > 0).then(|| {
        let coordinator = Arc::clone(&services.coordinator);
        let period = Duration::from_secs(config.rediscover_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; discovery already started.
            interval.tick().await;
            loop {
                interval.tick().await;
                coordinator.start_discovery();
            }
        })
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    if let Some(handle) = rediscovery {
        handle.abort();
    }
    services.shutdown().await;
    event_logger.abort();
    snapshot_logger.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// One-line description of a snapshot.
fn summarize(state: &ControlState) -> String {
    let selected = state
        .selected_group()
        .map(|g| format!("{} ({:?}, vol {})", g.name, state.transport.state, g.volume))
        .unwrap_or_else(|| "none".to_string());
    format!(
        "phase={:?} devices={} groups={} selected={} queue={}",
        state.phase,
        state.devices.len(),
        state.groups.len(),
        selected,
        state.queue.len()
    )
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
