//! SQLite-backed mailbox store
//!
//! A single append-only `mails` table acts as a soft-delete log: consuming a
//! record sets `consumed = 1` instead of deleting the row. Only rows with
//! `consumed = 0` are visible through the [`MailStore`] contract.
//!
//! `received_at` is stored as integer microseconds since the epoch so that
//! `ORDER BY received_at` is exact; `id` breaks ties between equal timestamps.

use crate::error::{MailError, Result};
use crate::storage::{MailStore, MessageRecord, StorageMode};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqlStore {
    db: SqlitePool,
}

impl SqlStore {
    /// Open (or create) the database and bootstrap the schema
    ///
    /// In-memory URLs are pinned to one pooled connection, because every
    /// SQLite connection to `:memory:` would otherwise see its own database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        if !database_url.starts_with("sqlite:") {
            return Err(MailError::Unconfigured(format!(
                "Unsupported database URL '{}', expected sqlite:...",
                database_url
            )));
        }
        let in_memory = database_url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| MailError::Unconfigured(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let max_connections = if in_memory { 1 } else { max_connections.max(1) };
        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self::new(db);
        store.init_db().await?;

        info!("SQL mailbox store ready ({} connections)", max_connections);
        Ok(store)
    }

    /// Wrap an existing pool; call [`SqlStore::init_db`] before use
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create the table and its indexes if they do not exist
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                to_email TEXT NOT NULL,
                from_email TEXT NOT NULL,
                title TEXT NOT NULL,
                text_content TEXT NOT NULL DEFAULT '',
                html_content TEXT NOT NULL DEFAULT '',
                received_at INTEGER NOT NULL,
                consumed INTEGER NOT NULL DEFAULT 0,
                consumed_at TEXT
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_mails_to_email ON mails(to_email)",
            "CREATE INDEX IF NOT EXISTS idx_mails_received_at ON mails(received_at)",
            "CREATE INDEX IF NOT EXISTS idx_mails_consumed ON mails(consumed)",
        ] {
            sqlx::query(statement).execute(&self.db).await?;
        }

        Ok(())
    }

    /// Rows ever written, consumed or not
    pub async fn total_rows(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mails")
            .fetch_one(&self.db)
            .await?;
        Ok(total)
    }

    fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<MessageRecord> {
        let micros: i64 = row.try_get("received_at")?;
        let received_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
            MailError::Malformed(format!("received_at out of range: {}", micros))
        })?;

        Ok(MessageRecord {
            from: row.try_get("from_email")?,
            to: row.try_get("to_email")?,
            subject: row.try_get("title")?,
            text_body: row.try_get("text_content")?,
            html_body: row.try_get("html_content")?,
            received_at,
        })
    }
}

#[async_trait::async_trait]
impl MailStore for SqlStore {
    async fn store(&self, to: &str, record: MessageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO mails (
                to_email, from_email, title, text_content, html_content,
                received_at, consumed
            ) VALUES (?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(to)
        .bind(&record.from)
        .bind(&record.subject)
        .bind(&record.text_body)
        .bind(&record.html_body)
        .bind(record.received_at.timestamp_micros())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn consume_latest(&self, to: &str) -> Result<Option<MessageRecord>> {
        let mut tx = self.db.begin().await?;

        // Selecting and marking in one statement takes the write lock up front,
        // so a concurrent consumer cannot pick the same row.
        let row = sqlx::query(
            r#"
            UPDATE mails
            SET consumed = 1, consumed_at = ?
            WHERE id = (
                SELECT id FROM mails
                WHERE to_email = ? AND consumed = 0
                ORDER BY received_at DESC, id DESC
                LIMIT 1
            )
            RETURNING to_email, from_email, title, text_content, html_content, received_at
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let record = Self::row_to_record(row)?;
        tx.commit().await?;
        Ok(Some(record))
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mails WHERE consumed = 0")
            .fetch_one(&self.db)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn evict_oldest(&self, _limit: usize) -> Result<usize> {
        // Consumed rows are already invisible; pruning them is left to operators
        Ok(0)
    }

    async fn clear_all(&self) -> Result<()> {
        let result = sqlx::query(
            "UPDATE mails SET consumed = 1, consumed_at = ? WHERE consumed = 0",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        info!("Marked {} pending mails as consumed", result.rows_affected());
        Ok(())
    }

    async fn has_mail(&self, to: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mails WHERE to_email = ? AND consumed = 0",
        )
        .bind(to)
        .fetch_one(&self.db)
        .await?;
        Ok(count > 0)
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Sql
    }
}
