//! Shared health state for the /health endpoint.
//! Updated by the scheduler's ticks and sweeper.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Scheduler counters. Written by ticks and the sweeper, read by the API.
#[derive(Default)]
pub struct SchedulerHealth {
    pub ticks_run: AtomicU64,
    pub ticks_failed: AtomicU64,
    pub notifications_sent: AtomicU64,
    /// Timers found dead and restarted by the sweeper.
    pub timers_respawned: AtomicU64,
    /// Unix seconds of the last completed sweep (0 = none yet).
    pub last_sweep_at: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub live_hunters: usize,
    pub ticks_in_flight: usize,
    pub ticks_run: u64,
    pub ticks_failed: u64,
    pub notifications_sent: u64,
    pub timers_respawned: u64,
    pub last_sweep_at: u64,
}

impl SchedulerHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_ticks_run(&self) {
        self.ticks_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ticks_failed(&self) {
        self.ticks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_timers_respawned(&self, n: u64) {
        self.timers_respawned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_last_sweep_at(&self, secs: u64) {
        self.last_sweep_at.store(secs, Ordering::Relaxed);
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks_run.load(Ordering::Relaxed)
    }

    pub fn ticks_failed(&self) -> u64 {
        self.ticks_failed.load(Ordering::Relaxed)
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, live_hunters: usize, ticks_in_flight: usize) -> HealthSnapshot {
        HealthSnapshot {
            live_hunters,
            ticks_in_flight,
            ticks_run: self.ticks_run(),
            ticks_failed: self.ticks_failed(),
            notifications_sent: self.notifications_sent(),
            timers_respawned: self.timers_respawned.load(Ordering::Relaxed),
            last_sweep_at: self.last_sweep_at.load(Ordering::Relaxed),
        }
    }
}
