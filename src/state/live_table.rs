use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// LiveEntry
// ---------------------------------------------------------------------------

/// A scheduled hunter: the schedule its timer was built from plus the timer task.
#[derive(Debug)]
pub struct LiveEntry {
    pub schedule: String,
    timer: JoinHandle<()>,
}

impl LiveEntry {
    pub fn new(schedule: impl Into<String>, timer: JoinHandle<()>) -> Self {
        Self {
            schedule: schedule.into(),
            timer,
        }
    }

    /// False once the timer task has ended for any reason (aborted, panicked,
    /// schedule exhausted).
    pub fn is_running(&self) -> bool {
        !self.timer.is_finished()
    }

    pub fn stop(&self) {
        self.timer.abort();
    }

    /// Swap in a new timer, stopping the old one.
    pub fn replace_timer(&mut self, schedule: impl Into<String>, timer: JoinHandle<()>) {
        self.timer.abort();
        self.schedule = schedule.into();
        self.timer = timer;
    }
}

// ---------------------------------------------------------------------------
// LiveTable
// ---------------------------------------------------------------------------

/// hunter id → live timer.
///
/// Every mutation goes through `lock()`, so hire/dismiss/transfer/sweep are
/// serialized against each other. Ticks only take the lock briefly (or not at
/// all) and track overlap through `in_flight` instead.
pub struct LiveTable {
    entries: Mutex<HashMap<String, LiveEntry>>,
    /// Hunters with a tick currently executing.
    in_flight: DashSet<String>,
}

impl LiveTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            in_flight: DashSet::new(),
        })
    }

    pub async fn lock(&self) -> MutexGuard<'_, HashMap<String, LiveEntry>> {
        self.entries.lock().await
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Stop and drop every timer. Used on shutdown.
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        for entry in entries.values() {
            entry.stop();
        }
        entries.clear();
    }

    /// Claim the tick slot for `id`. `None` when a tick for this hunter is
    /// still running.
    pub fn try_begin_tick(&self, id: &str) -> Option<TickGuard<'_>> {
        if self.in_flight.insert(id.to_string()) {
            Some(TickGuard {
                table: self,
                id: id.to_string(),
            })
        } else {
            None
        }
    }

    pub fn ticks_in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// Releases the tick slot on drop, including on early return and panic unwind.
pub struct TickGuard<'a> {
    table: &'a LiveTable,
    id: String,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.table.in_flight.remove(&self.id);
    }
}
