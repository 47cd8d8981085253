use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::scheduler::timer::parse_schedule;
use crate::scheduler::HunterScheduler;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub respawned: usize,
    /// Live entries whose record no longer exists.
    pub evicted: usize,
}

impl HunterScheduler {
    /// Walk the live table and restart any timer that died without a dismiss.
    /// The replacement is built from the persisted schedule.
    pub async fn sweep(self: &Arc<Self>) -> Result<SweepReport> {
        let mut live = self.live.lock().await;
        let mut report = SweepReport {
            checked: live.len(),
            ..Default::default()
        };

        let dead: Vec<String> = live
            .iter()
            .filter(|(_, entry)| !entry.is_running())
            .map(|(id, _)| id.clone())
            .collect();

        for id in dead {
            let hunter = match self.store.find_by_id(&id).await {
                Ok(Some(h)) => h,
                Ok(None) => {
                    warn!(hunter_id = %id, "Live entry without a record, evicting");
                    live.remove(&id);
                    report.evicted += 1;
                    continue;
                }
                Err(e) => {
                    warn!(hunter_id = %id, "Sweep could not read hunter, retrying next pass: {e}");
                    continue;
                }
            };

            let schedule = match parse_schedule(&hunter.schedule) {
                Ok(s) => s,
                Err(e) => {
                    error!(hunter_id = %id, "Persisted schedule is invalid, cannot respawn: {e}");
                    continue;
                }
            };
            if schedule.upcoming(Local).next().is_none() {
                debug!(hunter_id = %id, "Schedule exhausted, not respawning");
                continue;
            }

            warn!(hunter_id = %id, schedule = %hunter.schedule, "Timer stopped unexpectedly, respawning");
            let timer = self.spawn_timer(&id, schedule);
            if let Some(entry) = live.get_mut(&id) {
                entry.replace_timer(hunter.schedule.clone(), timer);
            }
            report.respawned += 1;
        }
        drop(live);

        self.health.add_timers_respawned(report.respawned as u64);
        self.health
            .set_last_sweep_at(chrono::Utc::now().timestamp().max(0) as u64);
        if report.respawned > 0 || report.evicted > 0 {
            info!(
                checked = report.checked,
                respawned = report.respawned,
                evicted = report.evicted,
                "Sweep repaired live table"
            );
        }
        Ok(report)
    }

    /// Background sweeper. Holds a weak reference and stops with the scheduler.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.tick().await; // first tick fires immediately; replay just ran

            loop {
                ticker.tick().await;
                let Some(scheduler) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = scheduler.sweep().await {
                    error!("Sweep failed: {e}");
                }
            }
        })
    }
}
