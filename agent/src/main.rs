//! SiteSync Agent binary.
//!
//! Wires the queue store to SQLite, the synchronizer to the REST backend,
//! starts periodic auto-sync and serves the loopback control API.

use std::sync::Arc;
use std::time::Duration;

use sitesync_agent::clock::SystemClock;
use sitesync_agent::config::Config;
use sitesync_agent::connectivity::HttpProbe;
use sitesync_agent::db::SqliteStore;
use sitesync_agent::queue_store::QueueStore;
use sitesync_agent::remote::ServiceRegistry;
use sitesync_agent::sync::{spawn_auto_sync, Synchronizer};
use sitesync_agent::{create_app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Timeout for one reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitesync_agent=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting SiteSync Agent on {}:{}", config.host, config.port);

    tracing::info!("Opening local store at {}", config.database_url);
    let kv = SqliteStore::connect(&config.database_url).await?;

    let probe = HttpProbe::new(&config.probe_url, PROBE_TIMEOUT)?;

    let client = reqwest::Client::builder()
        .timeout(config.operation_timeout)
        .build()?;
    let services = ServiceRegistry::rest(
        client,
        &config.remote_base_url,
        config.remote_api_token.clone(),
    );
    tracing::info!(?services, base_url = %config.remote_base_url, "Remote services ready");

    let store = Arc::new(QueueStore::new(
        Arc::new(kv),
        Arc::new(probe),
        Arc::new(SystemClock),
        config.retry_policy,
    ));
    let sync = Arc::new(
        Synchronizer::new(store, services).with_operation_timeout(config.operation_timeout),
    );

    let auto_sync = config
        .sync_interval
        .map(|period| spawn_auto_sync(Arc::clone(&sync), period));
    if auto_sync.is_none() {
        tracing::info!("Auto sync disabled");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let app = create_app(AppState::new(sync, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Control API listening on {}", addr);

    axum::serve(listener, app).await?;

    if let Some(handle) = auto_sync {
        handle.abort();
    }

    Ok(())
}
