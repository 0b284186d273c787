//! HTTP handler for the contact form.
//!
//! Upload, validation and persistence are delegated to the services; this
//! module only sequences them and turns the outcome into JSON.

use crate::{
    errors::SubmitError,
    models::submission::NewSubmission,
    services::{AppState, upload_service::ReceivedForm, validation::validate},
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use serde::Serialize;
use tracing::{debug, error, info};

pub const SUCCESS_MESSAGE: &str = "Form submitted successfully!";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub submission_id: i64,
}

/// `POST /api/submit`
///
/// Any attachment written while reading the body is removed again on every
/// path that does not end in a stored submission.
pub async fn submit_form(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SubmitResponse>, SubmitError> {
    let result = process(&state, multipart).await;
    match &result {
        Ok(Json(resp)) => info!("stored submission {}", resp.submission_id),
        Err(SubmitError::Validation(errors)) => {
            debug!("rejected submission: {}", errors.join("; "))
        }
        Err(err) => error!("submission failed: {}", err),
    }
    result
}

async fn process(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SubmitResponse>, SubmitError> {
    let multipart = multipart.map_err(|rejection| SubmitError::Malformed(rejection.body_text()))?;
    let ReceivedForm { fields, attachment } = state.uploads.receive(multipart).await?;

    let errors = validate(&fields);
    if !errors.is_empty() {
        return Err(SubmitError::Validation(errors));
    }

    let new = NewSubmission {
        name: trimmed(fields.name),
        email: trimmed(fields.email),
        message: trimmed(fields.message),
        attachment: attachment.as_ref().map(|upload| upload.attachment_ref()),
    };
    let submission = state.store.insert(new).await?;

    if let Some(upload) = attachment {
        upload.keep();
    }

    Ok(Json(SubmitResponse {
        success: true,
        message: SUCCESS_MESSAGE.to_string(),
        submission_id: submission.id,
    }))
}

fn trimmed(value: Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}
