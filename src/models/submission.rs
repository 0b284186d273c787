//! Represents a stored contact form entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single row of the `submissions` table.
///
/// Rows are only ever inserted. The two attachment columns are either both
/// set or both null.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Submission {
    /// Storage-assigned identifier, increasing and never reused.
    pub id: i64,

    /// Sender name, trimmed.
    pub name: String,

    /// Sender email, trimmed.
    pub email: String,

    /// Message body, trimmed.
    pub message: String,

    /// Filename exactly as supplied by the client.
    pub attachment_filename: Option<String>,

    /// Server-local path of the stored attachment.
    pub attachment_path: Option<String>,

    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new row.
#[derive(Clone, Debug, Default)]
pub struct NewSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
    pub attachment: Option<AttachmentRef>,
}

/// The attachment columns, kept together so one cannot be set without the other.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentRef {
    pub original_filename: String,
    pub stored_path: String,
}
