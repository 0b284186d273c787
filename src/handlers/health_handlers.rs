//! Liveness and readiness probes.

use crate::services::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    Json(ReadyResponse {
        ready: true,
        submissions: None,
        problems: Vec::new(),
    })
}

/// `GET /readyz`
///
/// Ready when the store answers and a file can be created in the uploads
/// directory; 503 with the reasons otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut problems = Vec::new();

    let submissions = match state.store.count().await {
        Ok(count) => Some(count),
        Err(err) => {
            problems.push(format!("submission store: {}", err));
            None
        }
    };

    let marker = state
        .uploads
        .upload_dir
        .join(format!(".readyz-{}", Uuid::new_v4()));
    match fs::write(&marker, b"").await {
        Ok(_) => {
            let _ = fs::remove_file(&marker).await;
        }
        Err(err) => problems.push(format!("uploads directory: {}", err)),
    }

    let ready = problems.is_empty();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready,
            submissions,
            problems,
        }),
    )
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    submissions: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    problems: Vec<String>,
}
