use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::scheduler::timer::{parse_schedule, same_schedule};
use crate::scheduler::HunterScheduler;
use crate::state::LiveEntry;
use crate::types::{Hunter, HunterDefinition, HunterUpdate, SearchCondition};

impl HunterScheduler {
    /// Validate, persist, then schedule. Nothing is scheduled if the insert fails.
    pub async fn hire(self: &Arc<Self>, owner: &str, definition: HunterDefinition) -> Result<Hunter> {
        let schedule = parse_schedule(&definition.schedule)?;
        SearchCondition::from_value(definition.kind, &definition.search_condition)?;
        if let Some(window) = &definition.freezing {
            window.validate()?;
        }

        let now = chrono::Utc::now().timestamp();
        let hunter = Hunter {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            kind: definition.kind,
            schedule: definition.schedule.trim().to_string(),
            search_condition: serde_json::to_string(&definition.search_condition)?,
            freezing: definition.freezing,
            cursor: None,
            created_at: now,
            updated_at: now,
        };

        let mut live = self.live.lock().await;
        self.store.create(&hunter).await?;
        let timer = self.spawn_timer(&hunter.id, schedule);
        live.insert(hunter.id.clone(), LiveEntry::new(hunter.schedule.clone(), timer));

        info!(
            hunter_id = %hunter.id,
            owner = %hunter.owner,
            kind = %hunter.kind,
            schedule = %hunter.schedule,
            "Hunter hired"
        );
        Ok(hunter)
    }

    /// Stop the timer, then delete the record. Returns `false` when the hunter
    /// was not scheduled. A failed delete leaves the hunter stopped but persisted.
    pub async fn dismiss(&self, id: &str) -> Result<bool> {
        let mut live = self.live.lock().await;
        let Some(entry) = live.remove(id) else {
            debug!(hunter_id = %id, "Dismiss of unscheduled hunter ignored");
            return Ok(false);
        };
        entry.stop();

        if let Err(e) = self.store.delete(id).await {
            error!(hunter_id = %id, "Timer stopped but record delete failed, hunter orphaned: {e}");
            return Err(e);
        }

        info!(hunter_id = %id, "Hunter dismissed");
        Ok(true)
    }

    /// Update schedule / condition / freezing window.
    ///
    /// A change to what is being watched resets the cursor in the same write.
    /// The timer is only rebuilt when the schedule changed, and only after the
    /// write succeeded.
    pub async fn transfer(self: &Arc<Self>, id: &str, update: HunterUpdate) -> Result<Hunter> {
        let schedule = parse_schedule(&update.schedule)?;
        if let Some(window) = &update.freezing {
            window.validate()?;
        }

        let mut live = self.live.lock().await;
        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::HunterNotFound(id.to_string()))?;

        let condition = SearchCondition::from_value(current.kind, &update.search_condition)?;
        let reset_cursor = match SearchCondition::parse(current.kind, &current.search_condition) {
            Ok(previous) => previous.identity() != condition.identity(),
            Err(_) => true,
        };

        let update = HunterUpdate {
            schedule: update.schedule.trim().to_string(),
            ..update
        };
        self.store.update_definition(id, &update, reset_cursor).await?;

        match live.get_mut(id) {
            Some(entry) if same_schedule(&entry.schedule, &update.schedule) => {}
            Some(entry) => {
                let timer = self.spawn_timer(id, schedule);
                entry.replace_timer(update.schedule.clone(), timer);
            }
            None => {
                warn!(hunter_id = %id, "Transferred hunter was not scheduled, scheduling now");
                let timer = self.spawn_timer(id, schedule);
                live.insert(id.to_string(), LiveEntry::new(update.schedule.clone(), timer));
            }
        }
        drop(live);

        info!(
            hunter_id = %id,
            schedule = %update.schedule,
            cursor_reset = reset_cursor,
            "Hunter transferred"
        );

        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::HunterNotFound(id.to_string()))
    }

    /// Hunters owned by `owner` that are currently scheduled.
    pub async fn list(&self, owner: &str) -> Result<Vec<Hunter>> {
        let hunters = self.store.find_all_by_owner(owner).await?;
        let live = self.live.lock().await;
        Ok(hunters.into_iter().filter(|h| live.contains_key(&h.id)).collect())
    }

    /// Load a hunter and check it belongs to `owner`.
    pub async fn authorize(&self, owner: &str, id: &str) -> Result<Hunter> {
        let hunter = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::HunterNotFound(id.to_string()))?;
        if hunter.owner != owner {
            return Err(AppError::PermissionDenied(id.to_string()));
        }
        Ok(hunter)
    }

    /// Rebuild the live table from storage. Failing to read the set is fatal;
    /// a single unschedulable hunter is only logged.
    pub async fn replay(self: &Arc<Self>) -> Result<usize> {
        let hunters = self.store.find_all().await?;
        let total = hunters.len();

        let mut live = self.live.lock().await;
        let mut scheduled = 0usize;
        for hunter in hunters {
            if live.contains_key(&hunter.id) {
                continue;
            }
            match parse_schedule(&hunter.schedule) {
                Ok(schedule) => {
                    let timer = self.spawn_timer(&hunter.id, schedule);
                    live.insert(hunter.id.clone(), LiveEntry::new(hunter.schedule.clone(), timer));
                    scheduled += 1;
                }
                Err(e) => error!(hunter_id = %hunter.id, "Could not replay hunter: {e}"),
            }
        }

        info!(scheduled, total, "Startup replay complete");
        Ok(scheduled)
    }
}
