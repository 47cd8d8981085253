use std::collections::HashSet;

use async_trait::async_trait;

use crate::db::{now_secs, ConsumedLedger, IgnoreStore, SqliteStore};
use crate::error::Result;

#[async_trait]
impl IgnoreStore for SqliteStore {
    async fn add(&self, owner: &str, item_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO ignored_items (owner, item_id, created_at) VALUES (?, ?, ?)")
            .bind(owner)
            .bind(item_id)
            .bind(now_secs())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove(&self, owner: &str, item_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM ignored_items WHERE owner = ? AND item_id = ?")
            .bind(owner)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn members(&self, owner: &str) -> Result<HashSet<String>> {
        let ids: Vec<(String,)> = sqlx::query_as("SELECT item_id FROM ignored_items WHERE owner = ?")
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl ConsumedLedger for SqliteStore {
    async fn mark_consumed(&self, message: &str) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO consumed_messages (message, consumed_at) VALUES (?, ?)")
                .bind(message)
                .bind(now_secs())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_consumed(&self, message: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT message FROM consumed_messages WHERE message = ?")
                .bind(message)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}
