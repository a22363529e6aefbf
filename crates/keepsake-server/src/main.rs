mod config;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use keepsake_api::AppStateInner;
use keepsake_store::SharedBackend;
use keepsake_store::hosted::HostedBackend;
use keepsake_store::local::LocalBackend;

use crate::config::{BackendKind, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keepsake=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // One backend for the whole process
    let (backend, blob_dir) = match &config.backend {
        BackendKind::Local { db_path, storage_dir } => {
            info!("Using local backend: db {}", db_path.display());
            let local = LocalBackend::open(db_path, storage_dir.clone(), &config.public_url).await?;
            let root = local.storage_root().to_path_buf();
            let backend: SharedBackend = Arc::new(local);
            (backend, Some(root))
        }
        BackendKind::Hosted { url, api_key } => {
            info!("Using hosted backend at {}", url);
            let backend: SharedBackend = Arc::new(HostedBackend::new(url.as_str(), api_key.as_str()));
            (backend, None)
        }
    };

    let mut app = Router::new()
        .merge(keepsake_api::router(AppStateInner::new(backend.clone())))
        .merge(keepsake_gateway::routes(backend));

    if let Some(dir) = blob_dir {
        app = app.nest_service("/storage", ServeDir::new(dir));
    }

    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Keepsake server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
