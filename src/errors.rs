use crate::services::{submission_store::StoreError, upload_service::UploadError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_FAILURE_MESSAGE: &str = "An error occurred while processing your submission";

/// Every way a form post can fail.
///
/// Each variant maps to exactly one response shape, so the handler never has
/// to inspect error text to pick a status.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("File size must not exceed 5MB")]
    FileTooLarge,
    #[error("Only one attachment may be submitted")]
    ExtraAttachment,
    #[error("Invalid file type. Only PDF, JPG, and PNG files are allowed.")]
    InvalidFileType,
    #[error("{0}")]
    Malformed(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SubmitError {
    pub fn status(&self) -> StatusCode {
        match self {
            SubmitError::Validation(_) | SubmitError::FileTooLarge | SubmitError::ExtraAttachment => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `errors` array sent to the client.
    pub fn messages(&self) -> Vec<String> {
        match self {
            SubmitError::Validation(errors) => errors.clone(),
            other => {
                let message = other.to_string();
                if message.trim().is_empty() {
                    vec![DEFAULT_FAILURE_MESSAGE.to_string()]
                } else {
                    vec![message]
                }
            }
        }
    }
}

impl From<UploadError> for SubmitError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::FileTooLarge => SubmitError::FileTooLarge,
            UploadError::ExtraAttachment => SubmitError::ExtraAttachment,
            UploadError::InvalidFileType(content_type) => {
                debug!("rejected attachment with content type {:?}", content_type);
                SubmitError::InvalidFileType
            }
            UploadError::Multipart(err) => SubmitError::Malformed(err.body_text()),
            UploadError::Io(err) => SubmitError::Io(err),
        }
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "errors": self.messages(),
        }));

        (self.status(), body).into_response()
    }
}
