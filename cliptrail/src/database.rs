//! SQLite storage for clipboard history
//!
//! One `entries` table holds the history in display order (`position` 0 is the
//! most recent). Uses r2d2 connection pooling so loads can run while a save is
//! in progress.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use thiserror::Error;
use tracing::warn;

use crate::history::Snapshot;
use crate::models::{ClipEntry, ClipOrigin, EntryId, Provenance};
use crate::persistence::{HistoryRepository, RepositoryError};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

impl From<DatabaseError> for RepositoryError {
    fn from(e: DatabaseError) -> Self {
        RepositoryError::Database(e.to_string())
    }
}

/// Parse a stored timestamp. Older rows used the naive `%Y-%m-%d %H:%M:%S` form.
fn parse_db_timestamp(timestamp_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f")
                .map(|dt| Utc.from_utc_datetime(&dt))
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Thread-safe database handle; clones share the pool
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA cache_size=-8000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(4).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY NOT NULL,
                position INTEGER NOT NULL,
                content TEXT NOT NULL,
                createdAt TEXT NOT NULL,
                isPinned INTEGER NOT NULL DEFAULT 0,
                origin TEXT NOT NULL DEFAULT 'external_app',
                sourceApp TEXT,
                windowTitle TEXT,
                processId INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_entries_position ON entries(position);
            CREATE INDEX IF NOT EXISTS idx_entries_pinned ON entries(isPinned);
        "#,
        )?;

        // Older files carry an unused NOT NULL `contentHash` column
        let has_content_hash = conn
            .prepare("SELECT contentHash FROM entries LIMIT 0")
            .is_ok();
        if has_content_hash {
            conn.execute_batch("ALTER TABLE entries DROP COLUMN contentHash")?;
        }
        Ok(())
    }

    pub fn count_entries(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Replace the stored history with `entries`, preserving their order
    pub fn replace_entries(&self, entries: &[ClipEntry]) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM entries", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO entries (id, position, content, createdAt, isPinned, origin, sourceApp, windowTitle, processId)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            )?;
            for (position, entry) in entries.iter().enumerate() {
                let provenance = entry.provenance();
                stmt.execute(params![
                    entry.id().to_string(),
                    position as i64,
                    entry.content(),
                    entry.created_at().to_rfc3339(),
                    entry.is_pinned(),
                    entry.origin().to_database_str(),
                    provenance.source_app,
                    provenance.window_title,
                    provenance.process_id,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Up to `limit` entries in history order. Rows that fail to decode are skipped.
    pub fn fetch_entries(&self, limit: usize) -> DatabaseResult<Vec<ClipEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, createdAt, isPinned, origin, sourceApp, windowTitle, processId
             FROM entries ORDER BY position ASC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], |row| Self::row_to_entry(row))?;

        let mut entries = Vec::new();
        for row in rows {
            match row? {
                Some(entry) => entries.push(entry),
                None => warn!("skipping undecodable history row"),
            }
        }
        Ok(entries)
    }

    /// Every pinned entry plus the first `max_unpinned` unpinned ones, in history order
    pub fn fetch_history(&self, max_unpinned: usize) -> DatabaseResult<Vec<ClipEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, createdAt, isPinned, origin, sourceApp, windowTitle, processId
             FROM entries
             WHERE isPinned = 1
                OR id IN (SELECT id FROM entries WHERE isPinned = 0 ORDER BY position ASC LIMIT ?1)
             ORDER BY position ASC",
        )?;
        let limit = i64::try_from(max_unpinned).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], |row| Self::row_to_entry(row))?;

        let mut entries = Vec::new();
        for row in rows {
            match row? {
                Some(entry) => entries.push(entry),
                None => warn!("skipping undecodable history row"),
            }
        }
        Ok(entries)
    }

    pub fn delete_entry(&self, id: EntryId) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM entries WHERE id = ?1", [id.to_string()])?;
        Ok(())
    }

    pub fn clear_entries(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM entries", [])?;
        Ok(())
    }

    pub fn clear_unpinned_entries(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM entries WHERE isPinned = 0", [])?;
        Ok(())
    }

    /// `None` when the id or origin column holds an unknown value
    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<Option<ClipEntry>> {
        let id: String = row.get(0)?;
        let content: String = row.get(1)?;
        let created_at: String = row.get(2)?;
        let is_pinned: bool = row.get(3)?;
        let origin: String = row.get(4)?;
        let provenance = Provenance {
            source_app: row.get(5)?,
            window_title: row.get(6)?,
            process_id: row.get(7)?,
        };

        let (Ok(id), Some(origin)) = (EntryId::parse(&id), ClipOrigin::from_database(&origin)) else {
            return Ok(None);
        };

        Ok(Some(ClipEntry::restore(
            id,
            content,
            parse_db_timestamp(&created_at),
            is_pinned,
            origin,
            provenance,
        )))
    }

    async fn run_blocking<T, F>(&self, work: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(Database) -> DatabaseResult<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || work(db))
            .await
            .map_err(|e| RepositoryError::Unavailable(format!("storage task failed: {}", e)))?
            .map_err(RepositoryError::from)
    }
}

#[async_trait]
impl HistoryRepository for Database {
    async fn save(&self, snapshot: Snapshot) -> Result<(), RepositoryError> {
        self.run_blocking(move |db| db.replace_entries(&snapshot)).await
    }

    async fn load(&self, max_unpinned: usize) -> Result<Vec<ClipEntry>, RepositoryError> {
        self.run_blocking(move |db| db.fetch_history(max_unpinned)).await
    }

    async fn delete(&self, id: EntryId) -> Result<(), RepositoryError> {
        self.run_blocking(move |db| db.delete_entry(id)).await
    }

    async fn clear_all(&self) -> Result<(), RepositoryError> {
        self.run_blocking(|db| db.clear_entries()).await
    }

    async fn clear_unpinned(&self) -> Result<(), RepositoryError> {
        self.run_blocking(|db| db.clear_unpinned_entries()).await
    }
}
