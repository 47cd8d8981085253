mod api;
mod codec;
mod config;
mod db;
mod diff;
mod error;
mod notify;
mod scheduler;
mod source;
mod state;
mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::codec::{CapabilityGate, Cipher};
use crate::config::{Config, HTTP_TIMEOUT_SECS, SWEEP_INTERVAL_SECS};
use crate::db::SqliteStore;
use crate::error::Result;
use crate::notify::{Dispatcher, LogDispatcher, WebhookDispatcher};
use crate::scheduler::{HunterScheduler, SchedulerDeps};
use crate::source::http::HttpSource;
use crate::source::SourceRegistry;
use crate::types::MarketplaceKind;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let store = Arc::new(SqliteStore::open(&cfg.db_path).await?);
    info!("Database ready at {}", cfg.db_path);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;

    // --- Capability tokens ---
    let cipher = Arc::new(Cipher::new(&cfg.cipher_key)?);
    let gate = Arc::new(CapabilityGate::new(cipher, store.clone(), store.clone()));

    // --- Sources ---
    let sources = build_sources(&cfg, &http)?;

    // --- Notifications ---
    let dispatcher: Arc<dyn Dispatcher> = match &cfg.notify_webhook_url {
        Some(url) => {
            info!("Notifications relayed to {url}");
            Arc::new(WebhookDispatcher::new(url.clone(), http.clone()))
        }
        None => {
            warn!("NOTIFY_WEBHOOK_URL not set, notifications will only be logged.");
            Arc::new(LogDispatcher)
        }
    };

    // --- Scheduler ---
    let scheduler = HunterScheduler::new(SchedulerDeps {
        store: store.clone(),
        ignore: store.clone(),
        sources,
        gate: gate.clone(),
        dispatcher,
        server_host: cfg.server_host.clone(),
    })?;

    let replayed = scheduler.replay().await?;
    info!("Replayed {replayed} hunters from storage");

    let _sweeper = scheduler.spawn_sweeper(Duration::from_secs(SWEEP_INTERVAL_SECS));

    // --- HTTP API server ---
    let api_state = ApiState {
        scheduler: Arc::clone(&scheduler),
        gate,
        http,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    info!("Shut down cleanly");
    Ok(())
}

fn build_sources(cfg: &Config, http: &reqwest::Client) -> Result<SourceRegistry> {
    let mut sources = SourceRegistry::new();
    let configured = [
        (MarketplaceKind::Mercari, &cfg.mercari_source_url, "MERCARI_SOURCE_URL"),
        (MarketplaceKind::Yahoo, &cfg.yahoo_source_url, "YAHOO_SOURCE_URL"),
        (MarketplaceKind::Surugaya, &cfg.surugaya_source_url, "SURUGAYA_SOURCE_URL"),
    ];
    for (kind, url, var) in configured {
        match url {
            Some(url) => {
                info!(kind = %kind, "Source adapter at {url}");
                sources.register(kind, Arc::new(HttpSource::new(kind, url, http.clone())?));
            }
            None => warn!("{var} not set, {kind} hunters will fail to fetch."),
        }
    }
    Ok(sources)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
