//! Database row types matching `migrations/0001_hunters.sql`.
use tracing::warn;

use crate::error::{AppError, Result};
use crate::types::{Cursor, FreezingWindow, Hunter, MarketplaceKind};

#[derive(Debug, sqlx::FromRow)]
pub struct HunterRow {
    pub instance_id: String,
    pub owner: String,
    pub kind: String,
    pub schedule: String,
    pub search_condition: String,
    pub cursor: Option<String>,
    pub freezing_start: Option<String>,
    pub freezing_end: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<HunterRow> for Hunter {
    type Error = AppError;

    fn try_from(row: HunterRow) -> Result<Self> {
        let kind = MarketplaceKind::parse(&row.kind).ok_or_else(|| {
            AppError::SearchConditionMalformed(format!(
                "hunter {} has unknown kind '{}'",
                row.instance_id, row.kind
            ))
        })?;

        // An unreadable cursor is the same as no cursor: the next tick bootstraps.
        let cursor = row.cursor.as_deref().and_then(|raw| {
            match serde_json::from_str::<Cursor>(raw) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!(hunter_id = %row.instance_id, "Discarding unreadable cursor: {e}");
                    None
                }
            }
        });

        let freezing = match (row.freezing_start, row.freezing_end) {
            (Some(start), Some(end)) => Some(FreezingWindow { start, end }),
            _ => None,
        };

        Ok(Hunter {
            id: row.instance_id,
            owner: row.owner,
            kind,
            schedule: row.schedule,
            search_condition: row.search_condition,
            freezing,
            cursor,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Convert rows, skipping (and logging) any that cannot be understood.
pub fn hunters_from_rows(rows: Vec<HunterRow>) -> Vec<Hunter> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.instance_id.clone();
            match Hunter::try_from(row) {
                Ok(h) => Some(h),
                Err(e) => {
                    warn!(hunter_id = %id, "Skipping unreadable hunter row: {e}");
                    None
                }
            }
        })
        .collect()
}
