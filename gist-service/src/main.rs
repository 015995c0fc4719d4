use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod auth;
mod config;
mod db;
mod error;
mod extraction;
mod i18n;
mod ollama;
mod pdf_export;
mod service;
mod speech;
mod storage;
mod summarizer;

use crate::config::{RuntimeConfig, load_static_config};
use crate::db::Database;
use crate::service::GistService;
use crate::storage::LocalStorage;

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("Starting gist service v{}", env!("CARGO_PKG_VERSION"));

    // Static configuration says where the database lives
    let static_config = load_static_config()?;
    info!(
        host = %static_config.server.host,
        port = static_config.server.port,
        "Static configuration loaded"
    );

    std::fs::create_dir_all(&static_config.storage.data_dir)?;

    let db_path = static_config.storage.database_path();
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let objects_dir = static_config.storage.objects_dir();
    let storage = Arc::new(LocalStorage::new(objects_dir.clone()).await?);
    info!(path = %objects_dir.display(), "Object storage initialized");

    // Runtime config (static + dynamic with DB overrides)
    let runtime_config = Arc::new(RuntimeConfig::load(static_config, &db)?);
    info!("Runtime configuration loaded with DB settings");

    let metrics = PrometheusBuilder::new().install_recorder()?;

    let service = Arc::new(GistService::new(db, runtime_config.clone(), storage).await);

    // Uploads left mid-processing by a previous run
    let report = service.recover_interrupted_uploads()?;
    if report.completed > 0 || report.failed > 0 {
        info!(
            completed = report.completed,
            failed = report.failed,
            "Recovered interrupted uploads"
        );
    }

    // Start expired session cleanup background task
    let cleanup_service = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match cleanup_service.cleanup_expired_sessions() {
                Ok(count) if count > 0 => info!(removed = count, "Cleaned up expired sessions"),
                Err(e) => warn!(error = %e, "Session cleanup failed"),
                _ => {}
            }
        }
    });

    let app = api::router(service, Some(metrics));

    let addr = format!(
        "{}:{}",
        runtime_config.static_config.server.host, runtime_config.static_config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gist_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
