//! SQLite-backed persistent store for background entries

use crate::error::{CacheError, Result};
use crate::types::{CacheEntry, ImageBlob, Source};
use futures::future::{BoxFuture, FutureExt, Shared};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type InitFuture = Shared<BoxFuture<'static, std::result::Result<SqlitePool, String>>>;

enum InitState {
    Uninitialized,
    Initializing(InitFuture),
    Ready(SqlitePool),
}

#[derive(sqlx::FromRow)]
struct BackgroundRow {
    source: String,
    metadata: Json<serde_json::Value>,
    mime_type: String,
    image: Vec<u8>,
    timestamp: i64,
}

impl TryFrom<BackgroundRow> for CacheEntry {
    type Error = CacheError;

    fn try_from(row: BackgroundRow) -> Result<Self> {
        Ok(CacheEntry {
            source: row.source.parse()?,
            metadata: row.metadata.0,
            image: ImageBlob::new(row.image, row.mime_type),
            timestamp: row.timestamp,
        })
    }
}

/// Persistent store, opened lazily and at most once
pub struct BackgroundStore {
    path: PathBuf,
    state: Mutex<InitState>,
}

impl BackgroundStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the store, creating it on first use.
    ///
    /// Concurrent callers share a single open attempt and observe the same
    /// outcome. A failed attempt is forgotten so the next call retries.
    pub async fn init(&self) -> Result<SqlitePool> {
        let attempt = {
            let mut state = self.state.lock().await;
            match &*state {
                InitState::Ready(pool) => return Ok(pool.clone()),
                InitState::Initializing(attempt) => attempt.clone(),
                InitState::Uninitialized => {
                    let attempt = open(self.path.clone()).boxed().shared();
                    *state = InitState::Initializing(attempt.clone());
                    attempt
                }
            }
        };

        let outcome = attempt.clone().await;

        let mut state = self.state.lock().await;
        let current = matches!(&*state, InitState::Initializing(a) if a.ptr_eq(&attempt));
        match outcome {
            Ok(pool) => {
                if current {
                    *state = InitState::Ready(pool.clone());
                }
                Ok(pool)
            }
            Err(msg) => {
                if current {
                    *state = InitState::Uninitialized;
                }
                Err(CacheError::Init(msg))
            }
        }
    }

    /// Insert or replace the entry for `entry.source`
    pub async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        let pool = self.init().await?;
        sqlx::query(
            r#"
            INSERT INTO backgrounds (source, metadata, mime_type, image, timestamp)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (source) DO UPDATE SET
                metadata = excluded.metadata,
                mime_type = excluded.mime_type,
                image = excluded.image,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(entry.source.as_str())
        .bind(Json(&entry.metadata))
        .bind(&entry.image.mime_type)
        .bind(&entry.image.bytes)
        .bind(entry.timestamp)
        .execute(&pool)
        .await?;
        debug!(source = %entry.source, size = entry.image.len(), "Stored background");
        Ok(())
    }

    pub async fn get(&self, source: Source) -> Result<Option<CacheEntry>> {
        let pool = self.init().await?;
        let row = sqlx::query_as::<_, BackgroundRow>(
            "SELECT source, metadata, mime_type, image, timestamp FROM backgrounds WHERE source = ?",
        )
        .bind(source.as_str())
        .fetch_optional(&pool)
        .await?;

        row.map(CacheEntry::try_from).transpose()
    }

    /// Write time of the entry for `source`, without loading the blob
    pub async fn timestamp(&self, source: Source) -> Result<Option<i64>> {
        let pool = self.init().await?;
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT timestamp FROM backgrounds WHERE source = ?")
                .bind(source.as_str())
                .fetch_optional(&pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Sources ordered from the oldest write to the newest
    pub async fn sources_by_age(&self) -> Result<Vec<(Source, i64)>> {
        let pool = self.init().await?;
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT source, timestamp FROM backgrounds ORDER BY timestamp ASC")
                .fetch_all(&pool)
                .await?;

        let mut sources = Vec::with_capacity(rows.len());
        for (source, timestamp) in rows {
            match source.parse::<Source>() {
                Ok(source) => sources.push((source, timestamp)),
                Err(e) => warn!(error = %e, "Skipping unrecognized row"),
            }
        }
        Ok(sources)
    }

    /// Delete every entry in one transaction, returning how many were removed
    pub async fn clear(&self) -> Result<u64> {
        let pool = self.init().await?;
        let mut tx = pool.begin().await?;
        let removed = sqlx::query("DELETE FROM backgrounds")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed)
    }

    /// Entry count and total blob size in bytes
    pub async fn totals(&self) -> Result<(usize, u64)> {
        let pool = self.init().await?;
        let (count, bytes): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(LENGTH(image)), 0) FROM backgrounds")
                .fetch_one(&pool)
                .await?;
        Ok((count.max(0) as usize, bytes.max(0) as u64))
    }
}

async fn open(path: PathBuf) -> std::result::Result<SqlitePool, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("creating {}: {}", parent.display(), e))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|e| e.to_string())?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| e.to_string())?;

    info!(path = ?path, "Background store initialized");
    Ok(pool)
}
