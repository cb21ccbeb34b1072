use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    format_timestamp, parse_timestamp, BranchMemoryRecord, ConversationDocument,
    ConversationStore, MessageEntry, UpsertOutcome, FOLLOWUP_PENDING,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed conversation store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file and run migrations
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(config.connect_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// In-memory database, used by tests
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_messages(&self, collection: &str, phone: &str) -> StorageResult<Vec<MessageEntry>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT phone, text, time
            FROM conversation_messages
            WHERE collection = ? AND phone = ?
            ORDER BY id ASC
            "#,
        )
        .bind(collection)
        .bind(phone)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageEntry::from).collect())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn record_branch(
        &self,
        phone: &str,
        branch: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO branch_memory (phone, branch, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(phone) DO UPDATE SET
                branch = excluded.branch,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(phone)
        .bind(branch)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_branch_memory(&self, phone: &str) -> StorageResult<Option<BranchMemoryRecord>> {
        let row: Option<BranchMemoryRow> = sqlx::query_as(
            r#"
            SELECT phone, branch, updated_at
            FROM branch_memory
            WHERE phone = ?
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn append_message(
        &self,
        collection: &str,
        phone: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<UpsertOutcome> {
        let stamp = format_timestamp(now);
        let mut tx = self.pool.begin().await?;

        // A count of 1 after the upsert means the insert path ran
        let message_count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO conversations (collection, phone, followup_status, message_count, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(collection, phone) DO UPDATE SET
                followup_status = excluded.followup_status,
                message_count = conversations.message_count + 1,
                updated_at = excluded.updated_at
            RETURNING message_count
            "#,
        )
        .bind(collection)
        .bind(phone)
        .bind(FOLLOWUP_PENDING)
        .bind(&stamp)
        .bind(&stamp)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_messages (collection, phone, text, time)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(phone)
        .bind(text)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let outcome = if message_count == 1 {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        };
        debug!(collection, phone, ?outcome, "Conversation upserted");
        Ok(outcome)
    }

    async fn get_conversation(
        &self,
        collection: &str,
        phone: &str,
    ) -> StorageResult<Option<ConversationDocument>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT phone, followup_status, created_at, updated_at
            FROM conversations
            WHERE collection = ? AND phone = ?
            "#,
        )
        .bind(collection)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let messages = self.load_messages(collection, phone).await?;
        Ok(Some(row.into_document(messages)))
    }

    async fn list_conversations(
        &self,
        collection: &str,
    ) -> StorageResult<Vec<ConversationDocument>> {
        // One read transaction so both queries see the same snapshot
        let mut tx = self.pool.begin().await?;

        let rows: Vec<ConversationRow> = sqlx::query_as(
            r#"
            SELECT phone, followup_status, created_at, updated_at
            FROM conversations
            WHERE collection = ?
            ORDER BY phone ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&mut *tx)
        .await?;

        let message_rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT phone, text, time
            FROM conversation_messages
            WHERE collection = ?
            ORDER BY id ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut by_phone: HashMap<String, Vec<MessageEntry>> = HashMap::new();
        for row in message_rows {
            by_phone
                .entry(row.phone.clone())
                .or_default()
                .push(MessageEntry::from(row));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let messages = by_phone.remove(&row.phone).unwrap_or_default();
                row.into_document(messages)
            })
            .collect())
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct ConversationRow {
    phone: String,
    followup_status: String,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn into_document(self, messages: Vec<MessageEntry>) -> ConversationDocument {
        ConversationDocument {
            phone: self.phone,
            messages,
            followup_status: self.followup_status,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    phone: String,
    text: String,
    time: Option<String>,
}

impl From<MessageRow> for MessageEntry {
    fn from(row: MessageRow) -> Self {
        Self {
            text: row.text,
            time: row.time.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(sqlx::FromRow)]
struct BranchMemoryRow {
    phone: String,
    branch: String,
    updated_at: String,
}

impl From<BranchMemoryRow> for BranchMemoryRecord {
    fn from(row: BranchMemoryRow) -> Self {
        Self {
            phone: row.phone,
            branch: row.branch,
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}
