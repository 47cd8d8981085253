pub mod hunters;
pub mod ignore;
pub mod models;

use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;
use crate::types::{Cursor, Hunter, HunterUpdate};

/// Durable hunter definitions plus their mutable cursor.
#[async_trait]
pub trait HunterRecordStore: Send + Sync {
    async fn create(&self, hunter: &Hunter) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Hunter>>;
    async fn find_all_by_owner(&self, owner: &str) -> Result<Vec<Hunter>>;
    async fn find_all(&self) -> Result<Vec<Hunter>>;
    /// Write the cursor only if the stored search condition is still `read_condition`.
    /// Returns `false` when the row is gone or its condition has changed since.
    async fn update_cursor(&self, id: &str, cursor: &Cursor, read_condition: &str)
        -> Result<bool>;
    /// Definition and (optionally) cursor reset are written in one transaction.
    async fn update_definition(&self, id: &str, update: &HunterUpdate, reset_cursor: bool)
        -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Per-owner set of item ids the owner never wants to hear about again.
#[async_trait]
pub trait IgnoreStore: Send + Sync {
    async fn add(&self, owner: &str, item_id: &str) -> Result<()>;
    async fn remove(&self, owner: &str, item_id: &str) -> Result<()>;
    async fn members(&self, owner: &str) -> Result<HashSet<String>>;
}

/// Replay ledger for capability messages.
#[async_trait]
pub trait ConsumedLedger: Send + Sync {
    /// Returns `true` when the message was not recorded before.
    async fn mark_consumed(&self, message: &str) -> Result<bool>;
    async fn is_consumed(&self, message: &str) -> Result<bool>;
}

/// SQLite backing for all three stores.
#[derive(Clone)]
pub struct SqliteStore {
    pool: sqlx::SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Open (creating if missing) the database file and apply migrations.
    pub async fn open(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Single-connection in-memory database; the connection must never be recycled
    /// or the schema disappears with it.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
