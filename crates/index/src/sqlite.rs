//! SQLite backend: summaries survive restarts, so a refresh only
//! re-summarizes files whose content hash changed since the last run.
//!
//! One table, `files`, keyed by the workspace-relative path.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tiller_core::error::IndexError;
use tiller_core::index::{FileIndex, IndexedFile};
use tracing::{debug, info};

/// A file index stored in a SQLite database.
pub struct SqliteFileIndex {
    pool: SqlitePool,
}

impl SqliteFileIndex {
    /// Open (or create) the database file at `path`, creating parent
    /// directories as needed.
    pub async fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                IndexError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let index = Self::connect(options).await?;
        info!(path = %path.display(), "SQLite file index opened");
        Ok(index)
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, IndexError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| IndexError::Storage(format!("Failed to open SQLite: {e}")))?;

        let index = Self { pool };
        index.run_migrations().await?;
        Ok(index)
    }

    async fn run_migrations(&self) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                path     TEXT PRIMARY KEY,
                hash     TEXT NOT NULL,
                updated  TEXT NOT NULL,
                summary  TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(format!("files table: {e}")))?;

        debug!("SQLite index migrations complete");
        Ok(())
    }

    fn row_to_file(row: &SqliteRow) -> Result<IndexedFile, IndexError> {
        let column = |name: &str, e: sqlx::Error| IndexError::Storage(format!("{name} column: {e}"));

        let path: String = row.try_get("path").map_err(|e| column("path", e))?;
        let hash: String = row.try_get("hash").map_err(|e| column("hash", e))?;
        let summary: String = row.try_get("summary").map_err(|e| column("summary", e))?;
        let updated: String = row.try_get("updated").map_err(|e| column("updated", e))?;

        // An unreadable timestamp only affects display; the hash decides freshness.
        let updated = DateTime::parse_from_rfc3339(&updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(IndexedFile {
            path,
            hash,
            updated,
            summary,
        })
    }
}

#[async_trait]
impl FileIndex for SqliteFileIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<IndexedFile>, IndexError> {
        let row = sqlx::query("SELECT path, hash, updated, summary FROM files WHERE path = ?1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(format!("SELECT failed: {e}")))?;

        row.as_ref().map(Self::row_to_file).transpose()
    }

    async fn find_all(&self) -> Result<HashMap<String, IndexedFile>, IndexError> {
        let rows = sqlx::query("SELECT path, hash, updated, summary FROM files")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(format!("SELECT failed: {e}")))?;

        rows.iter()
            .map(|row| Self::row_to_file(row).map(|f| (f.path.clone(), f)))
            .collect()
    }

    async fn store(&self, file: IndexedFile) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            INSERT INTO files (path, hash, updated, summary)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(path) DO UPDATE SET
                hash = excluded.hash,
                updated = excluded.updated,
                summary = excluded.summary
            "#,
        )
        .bind(&file.path)
        .bind(&file.hash)
        .bind(file.updated.to_rfc3339())
        .bind(&file.summary)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::Storage(format!("INSERT failed: {e}")))?;

        debug!(path = %file.path, "Stored index entry");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool, IndexError> {
        let result = sqlx::query("DELETE FROM files WHERE path = ?1")
            .bind(path)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(format!("DELETE failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(format!("COUNT failed: {e}")))?;
        Ok(count as usize)
    }
}
