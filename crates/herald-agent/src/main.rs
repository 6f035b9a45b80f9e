//! Herald agent binary.
//!
//! Loads configuration, initialises structured logging, and syncs every
//! projection from the configured discovery service. With
//! `sync.interval_seconds > 0` it repeats until SIGTERM/SIGINT.

use std::time::Duration;

use herald_agent::{load_config, load_following, AgentConfig, AgentError, SyncDriver};
use herald_discovery::{load_signing_key, DiscoveryClient, Identity};
use herald_store::Store;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("HERALD_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("herald.toml"));

    // Load configuration
    let config = load_config(selected_config_path)
        .expect("failed to load configuration; the agent cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    match run(config).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            tracing::error!(error = %e, "herald agent failed to start");
            std::process::exit(1);
        }
    }
}

/// Runs sync cycles. Returns whether the last cycle synced anything.
async fn run(config: AgentConfig) -> Result<bool, AgentError> {
    config.validate()?;

    let identity = match config.identity.signing_key_path.as_deref() {
        Some(path) => {
            let identity = Identity::new(&config.identity.domain, load_signing_key(path)?);
            tracing::info!(
                domain = identity.domain(),
                public_key = %identity.public_key_openssh(),
                "signing queries"
            );
            Some(identity)
        }
        None => {
            tracing::warn!("no signing key configured, queries are unsigned");
            None
        }
    };

    let client = DiscoveryClient::new(
        &config.discovery.url,
        Duration::from_secs(config.discovery.timeout_seconds),
        identity,
    )?;
    let store = Store::open(&config.storage.data_dir, client.service_domain());
    tracing::info!(
        url = %client.events_url(),
        tenant = store.tenant(),
        root = %store.root().display(),
        "starting herald agent"
    );

    let following_path = config.sync.following_path.clone();
    let mut driver = SyncDriver::new(client, store, &config.identity.domain)
        .with_page_limit(config.discovery.page_limit);

    if config.sync.interval_seconds == 0 {
        let followed = following_path
            .as_deref()
            .map(|path| load_following(path))
            .transpose()?;
        driver.set_followed(followed);
        let report = driver.sync_all().await;
        log_report(&report);
        return Ok(!report.is_total_failure());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.sync.interval_seconds));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut synced = true;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                // The following list is edited externally; pick up changes each cycle.
                match following_path.as_deref().map(|path| load_following(path)).transpose() {
                    Ok(followed) => driver.set_followed(followed),
                    Err(e) => tracing::warn!(error = %e, "keeping previous following list"),
                }
                let report = driver.sync_all().await;
                log_report(&report);
                synced = !report.is_total_failure();
            }
            () = &mut shutdown => break,
        }
    }

    tracing::info!("herald agent shut down");
    Ok(synced)
}

fn log_report(report: &herald_agent::SyncReport) {
    if report.is_total_failure() {
        tracing::warn!("sync cycle finished: {report}");
    } else if report.failed().is_empty() {
        tracing::info!(events = report.total_events(), "sync cycle finished: {report}");
    } else {
        let failed: Vec<String> = report.failed().iter().map(ToString::to_string).collect();
        tracing::warn!(failed = ?failed, "sync cycle partially failed: {report}");
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
