//! Mflix Server
//!
//! Record-management HTTP service over the person and movie collections.
//!
//! Uses SQLite (embedded) for storage; persons can alternatively be kept in
//! a lock-guarded in-memory list selected at startup.

mod error;
mod extractors;
mod handlers;
mod services;
mod storage;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use storage::{Database, MemoryStore, PersonStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub persons: Arc<dyn PersonStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() {
    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Mflix Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    info!("Loading configuration...");
    let config = load_config().await.context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, db={}, backend={:?}",
        config.bind_address, config.database_path, config.storage_backend
    );

    info!("Initializing SQLite database...");
    let db = Arc::new(
        Database::new(&config.database_path)
            .await
            .context("Failed to initialize database")?,
    );

    let persons: Arc<dyn PersonStore> = match config.storage_backend {
        StorageBackend::Sqlite => db.clone(),
        StorageBackend::Memory => {
            info!("Using in-memory person store");
            Arc::new(MemoryStore::new())
        }
    };

    let config = Arc::new(config);
    let state = AppState {
        db: db.clone(),
        persons: persons.clone(),
        config: config.clone(),
    };

    // Periodic collection counts
    services::spawn_count_timer(persons, db, config.count_interval);

    info!("Building HTTP router...");
    let app = build_router(state);

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server ready to accept connections");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check stays outside the access-key guard
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            api_routes().layer(middleware::from_fn_with_state(
                state.clone(),
                extractors::access_key::require_access_key,
            )),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/persons",
            post(handlers::persons::insert)
                .get(handlers::persons::list)
                .patch(handlers::persons::merge)
                .delete(handlers::persons::clear),
        )
        .route("/persons/batch", post(handlers::persons::batch_insert))
        .route("/persons/search", get(handlers::persons::search))
        .route("/persons/export/csv", get(handlers::export::persons_csv))
        .route("/persons/export/json", get(handlers::export::persons_json))
        .route(
            "/persons/by-email/:email",
            delete(handlers::persons::delete_by_email),
        )
        .route(
            "/persons/:id",
            get(handlers::persons::get_one)
                .put(handlers::persons::update)
                .delete(handlers::persons::delete_one),
        )
        .route(
            "/movies",
            post(handlers::movies::insert).get(handlers::movies::list),
        )
        .route("/movies/search", get(handlers::movies::search))
        .route("/movies/genres", get(handlers::movies::genres))
        .route("/movies/export/json", get(handlers::export::movies_json))
        .route(
            "/movies/:id",
            get(handlers::movies::get_one)
                .put(handlers::movies::update)
                .delete(handlers::movies::delete_one),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub database_path: String,
    pub access_key: Option<String>,
    pub storage_backend: StorageBackend,
    pub count_interval: Duration,
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            database_path: String::new(),
            access_key: None,
            storage_backend: StorageBackend::Memory,
            count_interval: Duration::from_secs(300),
        }
    }
}

async fn load_config() -> Result<Config> {
    info!("Loading configuration from environment...");

    let data_dir = std::env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let database_path = std::env::var("DATABASE_PATH")
        .unwrap_or_else(|_| data_dir.join("mflix.db").to_string_lossy().to_string());

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let access_key = std::env::var("ACCESS_KEY").ok().filter(|k| !k.is_empty());
    if access_key.is_none() {
        warn!("ACCESS_KEY not set, API is open (fine for local development)");
    }

    let storage_backend = match std::env::var("STORAGE_BACKEND").as_deref() {
        Ok("memory") => StorageBackend::Memory,
        Ok("sqlite") | Err(_) => StorageBackend::Sqlite,
        Ok(other) => {
            warn!("Unknown STORAGE_BACKEND '{}', falling back to sqlite", other);
            StorageBackend::Sqlite
        }
    };

    let count_interval = std::env::var("COUNT_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(300));

    Ok(Config {
        bind_address,
        database_path,
        access_key,
        storage_backend,
        count_interval,
    })
}
