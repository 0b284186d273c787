//! Data models for the form intake service.
//!
//! Rows map to the `submissions` table via `sqlx::FromRow` and serialize
//! as JSON via `serde`.

pub mod submission;
