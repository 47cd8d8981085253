use async_trait::async_trait;

use crate::db::models::{hunters_from_rows, HunterRow};
use crate::db::{now_secs, HunterRecordStore, SqliteStore};
use crate::error::{AppError, Result};
use crate::types::{Cursor, Hunter, HunterUpdate};

const SELECT_HUNTER: &str = r#"
    SELECT instance_id, owner, kind, schedule, search_condition, cursor,
           freezing_start, freezing_end, created_at, updated_at
    FROM hunters
"#;

fn encode_cursor(cursor: Option<&Cursor>) -> Result<Option<String>> {
    cursor.map(serde_json::to_string).transpose().map_err(AppError::from)
}

#[async_trait]
impl HunterRecordStore for SqliteStore {
    async fn create(&self, hunter: &Hunter) -> Result<()> {
        let cursor = encode_cursor(hunter.cursor.as_ref())?;
        let (freezing_start, freezing_end) = match &hunter.freezing {
            Some(w) => (Some(w.start.as_str()), Some(w.end.as_str())),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO hunters (
                instance_id, owner, kind, schedule, search_condition, cursor,
                freezing_start, freezing_end, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&hunter.id)
        .bind(&hunter.owner)
        .bind(hunter.kind.as_str())
        .bind(&hunter.schedule)
        .bind(&hunter.search_condition)
        .bind(cursor)
        .bind(freezing_start)
        .bind(freezing_end)
        .bind(hunter.created_at)
        .bind(hunter.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Hunter>> {
        let row = sqlx::query_as::<_, HunterRow>(&format!("{SELECT_HUNTER} WHERE instance_id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Hunter::try_from).transpose()
    }

    async fn find_all_by_owner(&self, owner: &str) -> Result<Vec<Hunter>> {
        let rows = sqlx::query_as::<_, HunterRow>(&format!(
            "{SELECT_HUNTER} WHERE owner = ? ORDER BY created_at, instance_id"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(hunters_from_rows(rows))
    }

    async fn find_all(&self) -> Result<Vec<Hunter>> {
        let rows = sqlx::query_as::<_, HunterRow>(&format!(
            "{SELECT_HUNTER} ORDER BY created_at, instance_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(hunters_from_rows(rows))
    }

    async fn update_cursor(&self, id: &str, cursor: &Cursor, read_condition: &str) -> Result<bool> {
        let raw = serde_json::to_string(cursor)?;
        let result = sqlx::query(
            "UPDATE hunters SET cursor = ?, updated_at = ? WHERE instance_id = ? AND search_condition = ?",
        )
        .bind(raw)
        .bind(now_secs())
        .bind(id)
        .bind(read_condition)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_definition(
        &self,
        id: &str,
        update: &HunterUpdate,
        reset_cursor: bool,
    ) -> Result<()> {
        let search_condition = serde_json::to_string(&update.search_condition)?;
        let (freezing_start, freezing_end) = match &update.freezing {
            Some(w) => (Some(w.start.as_str()), Some(w.end.as_str())),
            None => (None, None),
        };

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE hunters
            SET schedule = ?, search_condition = ?, freezing_start = ?, freezing_end = ?,
                updated_at = ?
            WHERE instance_id = ?
            "#,
        )
        .bind(&update.schedule)
        .bind(search_condition)
        .bind(freezing_start)
        .bind(freezing_end)
        .bind(now_secs())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(AppError::HunterNotFound(id.to_string()));
        }

        if reset_cursor {
            sqlx::query("UPDATE hunters SET cursor = NULL WHERE instance_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM hunters WHERE instance_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
