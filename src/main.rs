//! sailgate entry point: three HTTP listeners over one shared state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sailgate::cache::{CacheRepository, MemoryCache, RedisCache};
use sailgate::config::{ConfigStore, RELOAD_PERIOD};
use sailgate::env::EnvManager;
use sailgate::fetch::{Fetcher, FetcherConfig};
use sailgate::voyage::SqliteVoyageStore;
use sailgate::{carriers, AppState};

const CONFIG_PORT: u16 = 8004;
const P2P_PORT: u16 = 8002;
const VOYAGE_PORT: u16 = 8001;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting sailgate schedule gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let env = EnvManager::load(".env").context("loading environment")?;

    let cache: Arc<dyn CacheRepository> = match &env.redis_url {
        Some(url) => Arc::new(
            RedisCache::connect(url)
                .await
                .context("connecting to cache backend")?,
        ),
        None => {
            warn!("REDIS_URL not set, using the in-process cache");
            Arc::new(MemoryCache::new())
        }
    };

    let fetcher = Fetcher::new(
        Arc::clone(&cache),
        FetcherConfig::default()
            .with_max_idle_conns_per_host(200)
            .with_idle_conn_timeout(std::time::Duration::from_secs(90)),
    );

    let db = SqlitePoolOptions::new()
        .max_connections(20)
        .connect(&env.database_url)
        .await
        .context("connecting to the voyage history store")?;

    let config = ConfigStore::start(PathBuf::from("config.yaml"), RELOAD_PERIOD)
        .await
        .context("loading config.yaml")?;

    let state = Arc::new(AppState {
        p2p_registry: carriers::p2p::registry(&env),
        vessel_registry: carriers::vessel::registry(&env),
        voyages: Arc::new(SqliteVoyageStore::new(db)),
        env,
        config,
        fetcher,
    });

    let config_listener = tokio::net::TcpListener::bind(("0.0.0.0", CONFIG_PORT)).await?;
    let p2p_listener = tokio::net::TcpListener::bind(("0.0.0.0", P2P_PORT)).await?;
    let voyage_listener = tokio::net::TcpListener::bind(("0.0.0.0", VOYAGE_PORT)).await?;
    info!("Listening on {CONFIG_PORT} (config), {P2P_PORT} (p2p), {VOYAGE_PORT} (voyage)");

    let serve = |listener, router| async {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    tokio::try_join!(
        serve(config_listener, sailgate::config_router(Arc::clone(&state))),
        serve(p2p_listener, sailgate::p2p_router(Arc::clone(&state))),
        serve(voyage_listener, sailgate::voyage_router(Arc::clone(&state))),
    )?;

    info!("Server gracefully stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutting down server...");
}
