//! Command-line live map client for spawnwatch.
//!
//! Polls the map server for sightings, territories, and scan coverage,
//! reconciles them into a live map, and logs every change together with
//! arrival alerts for the species the user asked to be notified about.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `spawnwatch-config.yaml` (or `SPAWNWATCH_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load label templates and user preferences
//! 4. Build the HTTP snapshot source and the reconciliation engine
//! 5. Start the preferences watcher and the Ctrl-C handler
//! 6. Run the poll scheduler until shutdown

mod error;
mod fetch;
mod surface;
mod watch;

use std::path::{Path, PathBuf};
use std::time::Duration;

use spawnwatch_core::config::ClientConfig;
use spawnwatch_core::label::LabelRenderer;
use spawnwatch_core::preferences::Preferences;
use spawnwatch_core::reconcile::ReconciliationEngine;
use spawnwatch_core::scheduler::{PollScheduler, SchedulerHandle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ClientError;
use crate::fetch::HttpSnapshotSource;
use crate::surface::LogSurface;
use crate::watch::watch_preferences;

/// Default configuration file name, looked up in the working directory.
const DEFAULT_CONFIG_PATH: &str = "spawnwatch-config.yaml";

/// Environment variable naming an alternative configuration file.
const CONFIG_PATH_VAR: &str = "SPAWNWATCH_CONFIG";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, templates, or the HTTP client cannot
/// be set up. Server outages after startup are not errors.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var(CONFIG_PATH_VAR)
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("spawnwatch starting");
    if from_file {
        info!(path = %config_path.display(), "configuration loaded");
    } else {
        info!(path = %config_path.display(), "config file not found, using defaults");
    }

    let labels = match &config.display.templates_dir {
        Some(dir) => LabelRenderer::from_dir(dir)?,
        None => LabelRenderer::new()?,
    };

    let preferences = Preferences::load_lossy(&config.preferences.path);
    info!(
        path = %config.preferences.path.display(),
        excluded = preferences.filters.excluded.len(),
        notify = preferences.filters.notify.len(),
        notify_rarity = ?preferences.notify_rarity,
        show_coverage = preferences.show_coverage,
        "preferences loaded"
    );

    let source = HttpSnapshotSource::new(&config.server)?;
    info!(
        url = source.url(),
        feed_interval_ms = config.polling.feed_interval_ms,
        fetch_timeout_ms = config.server.fetch_timeout_ms,
        "map server configured"
    );

    let engine = ReconciliationEngine::new(LogSurface::new(labels), preferences);
    let (scheduler, handle) = PollScheduler::new(source, engine, config.scheduler_config());

    tokio::spawn(watch_preferences(
        config.preferences.path.clone(),
        Duration::from_millis(config.preferences.reload_interval_ms),
        handle.clone(),
    ));
    tokio::spawn(shutdown_on_ctrl_c(handle));

    let engine = scheduler.run().await;
    info!(
        sightings = engine.sightings().len(),
        territories = engine.territories().len(),
        coverage = engine.coverage().len(),
        "clearing map"
    );
    let surface = engine.into_surface();
    info!(markers = surface.marker_count(), "spawnwatch stopped");

    Ok(())
}

/// Load configuration from `path`. A missing file yields defaults with
/// environment overrides applied.
///
/// Returns the configuration and whether it came from the file.
fn load_config(path: &Path) -> Result<(ClientConfig, bool), ClientError> {
    if path.exists() {
        Ok((ClientConfig::from_file(path)?, true))
    } else {
        let mut config = ClientConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok((config, false))
    }
}

/// Stop the scheduler on Ctrl-C.
async fn shutdown_on_ctrl_c(handle: SchedulerHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, shutdown only on process exit");
        return;
    }
    info!("Ctrl-C received, shutting down");
    if let Err(e) = handle.shutdown() {
        warn!(error = %e, "scheduler already stopped");
    }
}
