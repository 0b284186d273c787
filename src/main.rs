use anyhow::Result;
use clap::Parser;
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[cfg(test)]
mod tests;

use services::{AppState, submission_store::SubmissionStore, upload_service::UploadService};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::parse();

    tracing::info!("Starting form-intake with config: {:?}", cfg);

    // --- Ensure uploads directory exists ---
    let uploads = UploadService::new(cfg.upload_dir.clone());
    if !cfg.upload_dir.exists() {
        uploads.ensure_dir().await?;
        tracing::info!("Created uploads directory at {}", cfg.upload_dir.display());
    }

    // --- Load or create the database image ---
    let store = SubmissionStore::open(cfg.database_path.clone()).await?;

    if cfg.migrate {
        tracing::info!(
            "Database image initialized at {}",
            cfg.database_path.display()
        );
        return Ok(());
    }

    if !cfg.public_dir.exists() {
        tracing::warn!(
            "Public directory {} does not exist; static requests will 404",
            cfg.public_dir.display()
        );
    }

    let state = AppState { store, uploads };
    let app = routes::routes::app(state, &cfg.public_dir);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
