use std::time::Instant;

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::diff::DiffStrategy;
use crate::error::{AppError, Result};
use crate::notify::{enrich, render};
use crate::scheduler::HunterScheduler;
use crate::types::SearchCondition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The record is gone (dismissed between fire and read).
    Missing,
    /// Inside the freezing window.
    Frozen,
    /// A previous tick of the same hunter is still running.
    Busy,
    /// The source returned nothing; cursor untouched.
    Empty,
    /// Nothing reportable.
    Quiet,
    Reported(usize),
    /// The watched item is gone; the hunter dismissed itself after reporting.
    Retired(usize),
    /// Logged and abandoned; the cursor was not advanced.
    Failed,
}

impl HunterScheduler {
    /// Timer entry point. Never fails: every error is logged and the tick abandoned.
    pub async fn run_tick(&self, id: &str) -> TickOutcome {
        let Some(_slot) = self.live.try_begin_tick(id) else {
            warn!(hunter_id = %id, "Previous tick still running, skipping");
            return TickOutcome::Busy;
        };

        let started = Instant::now();
        let outcome = match self.tick(id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.health.inc_ticks_failed();
                match &e {
                    AppError::SearchConditionMalformed(_) | AppError::Fetch(_) => {
                        warn!(hunter_id = %id, "Tick abandoned: {e}")
                    }
                    _ => error!(hunter_id = %id, "Tick failed: {e}"),
                }
                TickOutcome::Failed
            }
        };

        self.health.inc_ticks_run();
        self.tick_stats.record(started.elapsed());
        debug!(hunter_id = %id, ?outcome, elapsed_ms = started.elapsed().as_millis() as u64, "Tick done");
        outcome
    }

    /// Poll, diff, notify, then advance the cursor. The record is re-read on
    /// every fire so a transfer takes effect on the next tick.
    async fn tick(&self, id: &str) -> Result<TickOutcome> {
        let Some(hunter) = self.store.find_by_id(id).await? else {
            return Ok(TickOutcome::Missing);
        };

        if let Some(window) = &hunter.freezing {
            if window.contains(Local::now().time()) {
                debug!(hunter_id = %id, start = %window.start, end = %window.end, "Frozen, skipping");
                return Ok(TickOutcome::Frozen);
            }
        }

        let condition = SearchCondition::parse(hunter.kind, &hunter.search_condition)?;
        let snapshot = self.sources.fetch(hunter.kind, &condition).await?;
        if snapshot.is_empty() {
            debug!(hunter_id = %id, kind = %hunter.kind, "Empty snapshot, nothing to do");
            return Ok(TickOutcome::Empty);
        }

        let ignored = self.ignore.members(&hunter.owner).await?;
        let outcome = DiffStrategy::for_kind(hunter.kind).compute_filtered(
            hunter.cursor.as_ref(),
            &snapshot,
            &ignored,
        );

        let reported = outcome.changes.len();
        if reported > 0 {
            let items = enrich(&self.gate, &hunter.owner, outcome.changes)?;
            let notification = render(&self.server_host, hunter.kind, &condition, &items)?;
            self.dispatcher.send(&hunter.owner, &notification).await?;
            self.health.inc_notifications_sent();
            info!(
                hunter_id = %id,
                owner = %hunter.owner,
                kind = %hunter.kind,
                items = reported,
                "Notification sent"
            );
        }

        // Reached only when there was nothing to send or the send succeeded.
        // The write is keyed on the condition read above so a transfer that
        // landed mid-tick keeps its reset cursor.
        if let Some(next) = &outcome.next_cursor {
            if hunter.cursor.as_ref() != Some(next)
                && !self.store.update_cursor(id, next, &hunter.search_condition).await?
            {
                debug!(hunter_id = %id, "Hunter dismissed or transferred mid-tick, cursor dropped");
            }
        }

        if outcome.retire {
            info!(hunter_id = %id, "Watched item removed, retiring hunter");
            self.dismiss(id).await?;
            return Ok(TickOutcome::Retired(reported));
        }

        Ok(if reported > 0 {
            TickOutcome::Reported(reported)
        } else {
            TickOutcome::Quiet
        })
    }
}
