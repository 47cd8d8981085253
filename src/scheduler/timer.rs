use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::scheduler::HunterScheduler;

/// Collapse whitespace and prefix a seconds field onto 5-field expressions.
pub fn normalize_schedule(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    Schedule::from_str(&normalize_schedule(expr)).map_err(|e| AppError::ScheduleSyntax {
        schedule: expr.to_string(),
        message: e.to_string(),
    })
}

/// Same fire times, modulo whitespace and the implicit seconds field.
pub fn same_schedule(a: &str, b: &str) -> bool {
    normalize_schedule(a) == normalize_schedule(b)
}

impl HunterScheduler {
    /// One task per hunter: sleep until the next local-time fire, then hand the
    /// tick to its own task so a slow tick never delays the timer.
    ///
    /// The timer only holds a weak reference; it exits once the scheduler is gone.
    pub(crate) fn spawn_timer(self: &Arc<Self>, id: &str, schedule: Schedule) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let id = id.to_string();

        tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Local).next() else {
                    warn!(hunter_id = %id, "Schedule has no upcoming fire time, timer exiting");
                    return;
                };
                let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                let Some(scheduler) = weak.upgrade() else {
                    return;
                };
                debug!(hunter_id = %id, fire_at = %next, "Timer fired");
                let tick_id = id.clone();
                tokio::spawn(async move {
                    scheduler.run_tick(&tick_id).await;
                });
            }
        })
    }
}
