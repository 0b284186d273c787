//! src/services/submission_store.rs
//!
//! SubmissionStore keeps the `submissions` table in an in-memory SQLite
//! database and writes the whole database image to a single file after every
//! insert. An identifier is only handed back once the image containing its
//! row is on disk.

use crate::models::submission::{NewSubmission, Submission};
use chrono::Utc;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, warn};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const COLUMNS: &str =
    "id, name, email, message, attachment_filename, attachment_path, created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone)]
pub struct SubmissionStore {
    /// Single-connection pool over the in-memory database.
    pub db: Arc<SqlitePool>,

    /// File holding the serialized database image.
    pub image_path: PathBuf,

    /// Serializes insert + flush.
    write_lock: Arc<Mutex<()>>,
}

impl SubmissionStore {
    /// Open the store backed by `image_path`.
    ///
    /// Loads the existing image if there is one, ensures the schema exists and
    /// writes the image back out, so a fresh install leaves a valid file with
    /// an empty table behind.
    pub async fn open(image_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let image_path = image_path.into();

        // A private in-memory database that lives as long as its one
        // connection does. A shared-cache URI would redirect VACUUM INTO.
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        let store = Self {
            db: Arc::new(pool),
            image_path,
            write_lock: Arc::new(Mutex::new(())),
        };

        store.apply_schema("main").await?;
        if fs::try_exists(&store.image_path).await? {
            store.load_image().await?;
        } else {
            debug!("no database image at {}", store.image_path.display());
        }
        store.flush().await?;

        info!(
            "opened submission store at {} ({} rows)",
            store.image_path.display(),
            store.count().await?
        );
        Ok(store)
    }

    /// Run the embedded schema statements against the given schema name.
    async fn apply_schema(&self, schema: &str) -> StoreResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty());

        for stmt in statements {
            let stmt = stmt.replacen(
                "IF NOT EXISTS submissions",
                &format!("IF NOT EXISTS {schema}.submissions"),
                1,
            );
            debug!("executing schema SQL: {}", stmt);
            sqlx::query(&stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Copy every row of the on-disk image into the in-memory table.
    async fn load_image(&self) -> StoreResult<()> {
        let path = path_str(&self.image_path)?;
        sqlx::query("ATTACH DATABASE ? AS image")
            .bind(path)
            .execute(&*self.db)
            .await?;

        let copied = self.copy_from_image().await;

        sqlx::query("DETACH DATABASE image")
            .execute(&*self.db)
            .await?;

        let rows = copied?;
        debug!("loaded {} rows from {}", rows, self.image_path.display());
        Ok(())
    }

    async fn copy_from_image(&self) -> StoreResult<u64> {
        // An empty image file attaches as an empty database.
        self.apply_schema("image").await?;
        let result = sqlx::query(&format!(
            "INSERT INTO main.submissions ({COLUMNS}) SELECT {COLUMNS} FROM image.submissions ORDER BY id"
        ))
        .execute(&*self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Insert one row and flush the image before returning it.
    ///
    /// No validation happens here; the caller guarantees the fields are
    /// already trimmed and valid.
    pub async fn insert(&self, new: NewSubmission) -> StoreResult<Submission> {
        let _guard = self.write_lock.lock().await;

        let (attachment_filename, attachment_path) = match new.attachment {
            Some(a) => (Some(a.original_filename), Some(a.stored_path)),
            None => (None, None),
        };

        let submission = sqlx::query_as::<_, Submission>(&format!(
            "INSERT INTO submissions (name, email, message, attachment_filename, attachment_path, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.message)
        .bind(attachment_filename)
        .bind(attachment_path)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        if let Err(err) = self.flush().await {
            // The row was never durable; drop it so a later flush cannot
            // persist an identifier the client never received.
            if let Err(undo) = sqlx::query("DELETE FROM submissions WHERE id = ?")
                .bind(submission.id)
                .execute(&*self.db)
                .await
            {
                warn!("failed to discard unflushed submission {}: {}", submission.id, undo);
            }
            return Err(err);
        }
        Ok(submission)
    }

    /// Serialize the whole in-memory database over the image file.
    ///
    /// Writes to a sibling temp file first and renames it into place, so a
    /// crash mid-write leaves the previous image intact.
    pub async fn flush(&self) -> StoreResult<()> {
        if let Some(parent) = self.image_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.tmp_path();
        // VACUUM INTO refuses to overwrite a non-empty file.
        match fs::remove_file(&tmp_path).await {
            Ok(_) => debug!("removed stale image {}", tmp_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::Io(err)),
        }

        sqlx::query("VACUUM INTO ?")
            .bind(path_str(&tmp_path)?)
            .execute(&*self.db)
            .await?;

        if let Err(err) = fs::rename(&tmp_path, &self.image_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        debug!("flushed database image to {}", self.image_path.display());
        Ok(())
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions")
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }

    #[cfg(test)]
    pub async fn get(&self, id: i64) -> StoreResult<Option<Submission>> {
        let row = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {COLUMNS} FROM submissions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    /// Every row, oldest first.
    #[cfg(test)]
    pub async fn all(&self) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {COLUMNS} FROM submissions ORDER BY id ASC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .image_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "database.db".into());
        name.push(".tmp");
        self.image_path.with_file_name(name)
    }
}

fn path_str(path: &Path) -> StoreResult<&str> {
    path.to_str().ok_or_else(|| {
        StoreError::Io(io::Error::new(
            ErrorKind::InvalidInput,
            format!("path {} is not valid UTF-8", path.display()),
        ))
    })
}
