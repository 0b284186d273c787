//! src/services/upload_service.rs
//!
//! Reads the multipart form, streaming the single `attachment` file to the
//! uploads directory and collecting the text fields. The stored file is owned
//! by a [`StoredUpload`] guard that deletes it again unless the submission is
//! committed.

use crate::{models::submission::AttachmentRef, services::validation::SubmissionFields};
use axum::{
    extract::multipart::{Field, Multipart, MultipartError},
    http::StatusCode,
};
use chrono::Utc;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};

/// Largest accepted attachment, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Multipart field carrying the file.
pub const ATTACHMENT_FIELD: &str = "attachment";

pub const ALLOWED_CONTENT_TYPES: [&str; 4] =
    ["application/pdf", "image/jpeg", "image/jpg", "image/png"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid file type. Only PDF, JPG, and PNG files are allowed.")]
    InvalidFileType(Option<String>),
    #[error("File size must not exceed 5MB")]
    FileTooLarge,
    #[error("Only one attachment may be submitted")]
    ExtraAttachment,
    #[error("{0}")]
    Multipart(MultipartError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        // The framework body limit trips before our own counter on huge bodies.
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::FileTooLarge
        } else {
            UploadError::Multipart(err)
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Everything read from one form post.
#[derive(Debug, Default)]
pub struct ReceivedForm {
    pub fields: SubmissionFields,
    pub attachment: Option<StoredUpload>,
}

/// An attachment written to the uploads directory.
///
/// Dropping it removes the file unless [`StoredUpload::keep`] was called.
#[derive(Debug)]
pub struct StoredUpload {
    pub original_filename: String,
    pub content_type: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    armed: bool,
}

impl StoredUpload {
    pub fn attachment_ref(&self) -> AttachmentRef {
        AttachmentRef {
            original_filename: self.original_filename.clone(),
            stored_path: self.path.display().to_string(),
        }
    }

    /// Keep the file on disk; the submission referencing it is durable.
    pub fn keep(mut self) {
        self.armed = false;
    }

    fn remove(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        match std::fs::remove_file(&self.path) {
            Ok(_) => debug!("removed orphaned upload {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove orphaned upload {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

impl Drop for StoredUpload {
    fn drop(&mut self) {
        self.remove();
    }
}

#[derive(Clone, Debug)]
pub struct UploadService {
    /// Directory where accepted attachments are written.
    pub upload_dir: PathBuf,

    pub max_bytes: u64,
}

impl UploadService {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Read the whole multipart body.
    ///
    /// Text fields `name`, `email` and `message` are collected (last value
    /// wins), other text fields are ignored. On any error a file that was
    /// already written is removed before returning.
    pub async fn receive(&self, mut multipart: Multipart) -> UploadResult<ReceivedForm> {
        let mut form = ReceivedForm::default();

        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or("").to_string();
            match field_name.as_str() {
                ATTACHMENT_FIELD => {
                    let Some(upload) = self.store_field(field).await? else {
                        continue;
                    };
                    if form.attachment.is_some() {
                        // `upload` and the earlier file are both dropped here.
                        return Err(UploadError::ExtraAttachment);
                    }
                    form.attachment = Some(upload);
                }
                "name" => form.fields.name = Some(field.text().await?),
                "email" => form.fields.email = Some(field.text().await?),
                "message" => form.fields.message = Some(field.text().await?),
                other => debug!("ignoring unknown multipart field: {}", other),
            }
        }

        Ok(form)
    }

    /// Stream one file part to disk.
    ///
    /// Returns `None` for a part without a filename, which is what browsers
    /// send for an empty file input.
    async fn store_field(&self, mut field: Field<'_>) -> UploadResult<Option<StoredUpload>> {
        let original_filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                debug!("skipping attachment part without a filename");
                return Ok(None);
            }
        };

        let content_type = field.content_type().map(str::to_string);
        match content_type.as_deref() {
            Some(ct) if ALLOWED_CONTENT_TYPES.contains(&ct) => {}
            _ => return Err(UploadError::InvalidFileType(content_type)),
        }

        let path = self.upload_dir.join(stored_name(&original_filename));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        // From here on the guard owns the file.
        let mut upload = StoredUpload {
            original_filename,
            content_type: content_type.unwrap_or_default(),
            path,
            size_bytes: 0,
            armed: true,
        };

        while let Some(chunk) = field.chunk().await? {
            upload.size_bytes += chunk.len() as u64;
            if upload.size_bytes > self.max_bytes {
                debug!(
                    "attachment {} exceeded {} bytes",
                    upload.original_filename, self.max_bytes
                );
                return Err(UploadError::FileTooLarge);
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        debug!(
            "stored attachment {} ({} bytes, {}) at {}",
            upload.original_filename,
            upload.size_bytes,
            upload.content_type,
            upload.path.display()
        );
        Ok(Some(upload))
    }

    /// Create the uploads directory if it is missing.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.upload_dir).await
    }
}

/// Build the on-disk name `<unix-millis>-<random>-<original>`.
pub fn stored_name(original: &str) -> String {
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        rand::random_range(0..1_000_000_000u32),
        safe_file_name(original)
    )
}

/// Reduce a client filename to a single harmless path component.
fn safe_file_name(original: &str) -> String {
    let last = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    match cleaned.as_str() {
        "" | "." | ".." => "attachment".to_string(),
        _ => cleaned,
    }
}
