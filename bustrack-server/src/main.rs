use std::sync::Arc;

use bustrack_server::auth::{PasswordHasher, TokenService};
use bustrack_server::cache::CacheConfig;
use bustrack_server::config::{Config, StoreConfig};
use bustrack_server::store::{InMemoryStore, PgStore, Store};
use bustrack_server::web::{AppState, create_router};
use mockable::{Clock, DefaultClock};
use tracing::{error, info, warn};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

/// Open the configured store.
async fn open_store(
    config: &StoreConfig,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match config {
        StoreConfig::Postgres {
            url,
            max_connections,
        } => {
            let store = PgStore::connect(url, *max_connections).await?;
            store.migrate().await?;
            info!("using PostgreSQL store");
            Ok(Arc::new(store))
        }
        StoreConfig::Memory {
            seed_file: Some(path),
        } => {
            let store = InMemoryStore::from_seed_file(path, clock)?;
            info!(
                seed_file = %path.display(),
                stops = store.stop_count().await,
                "using in-memory store"
            );
            Ok(Arc::new(store))
        }
        StoreConfig::Memory { seed_file: None } => {
            warn!("no DATABASE_URL or SEED_FILE set; using an empty in-memory store");
            Ok(Arc::new(InMemoryStore::new(clock)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "invalid configuration");
        e
    })?;
    if config.uses_development_secret() {
        warn!("JWT_SECRET not set; signing tokens with the development secret");
    }

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);
    let store = open_store(&config.store, clock.clone()).await.map_err(|e| {
        error!(error = %e, "failed to open store");
        e
    })?;

    let state = AppState::new(
        store,
        TokenService::new(&config.secret, clock.clone()),
        PasswordHasher::new(config.bcrypt_cost, config.hash_concurrency),
        &CacheConfig {
            ttl: config.stop_cache_ttl,
        },
        clock,
    );
    let app = create_router(state);

    info!(addr = %config.bind_addr, env = ?config.env, "BusTrack API listening");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
