//! Services behind the HTTP handlers.

pub mod submission_store;
pub mod upload_service;
pub mod validation;

use submission_store::SubmissionStore;
use upload_service::UploadService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: SubmissionStore,
    pub uploads: UploadService,
}
