//! Defines the HTTP surface of the form intake service.
//!
//! - `POST /api/submit` — multipart contact form with an optional `attachment`
//! - `GET  /healthz`    — liveness
//! - `GET  /readyz`     — readiness
//!
//! Every other path is served from the public directory.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        submit_handlers::submit_form,
    },
    services::{AppState, upload_service::MAX_UPLOAD_BYTES},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Request bodies above this are cut off by the framework.
///
/// Leaves room for the text fields and multipart framing so an oversize
/// attachment is normally caught by the upload service's own counter.
pub const SUBMIT_BODY_LIMIT: usize = 2 * MAX_UPLOAD_BYTES as usize;

pub fn routes(public_dir: &Path) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/api/submit",
            post(submit_form).layer(DefaultBodyLimit::max(SUBMIT_BODY_LIMIT)),
        )
        .fallback_service(ServeDir::new(public_dir))
}

/// Build the complete application with state and request tracing attached.
pub fn app(state: AppState, public_dir: &Path) -> Router {
    routes(public_dir)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
