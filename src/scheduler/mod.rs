//! Hunter lifecycle: hire / dismiss / transfer, per-hunter cron timers, the
//! poll-diff-notify tick, startup replay and the self-healing sweep.

pub mod lifecycle;
pub mod sweep;
pub mod tick;
pub mod timer;

use std::sync::Arc;

use crate::api::health::{HealthSnapshot, SchedulerHealth};
use crate::api::latency::TickStats;
use crate::codec::CapabilityGate;
use crate::db::{HunterRecordStore, IgnoreStore};
use crate::error::Result;
use crate::notify::Dispatcher;
use crate::source::SourceRegistry;
use crate::state::LiveTable;

/// Everything the scheduler talks to.
pub struct SchedulerDeps {
    pub store: Arc<dyn HunterRecordStore>,
    pub ignore: Arc<dyn IgnoreStore>,
    pub sources: SourceRegistry,
    pub gate: Arc<CapabilityGate>,
    pub dispatcher: Arc<dyn Dispatcher>,
    /// Public base URL for links in notifications.
    pub server_host: String,
}

pub struct HunterScheduler {
    store: Arc<dyn HunterRecordStore>,
    ignore: Arc<dyn IgnoreStore>,
    sources: SourceRegistry,
    gate: Arc<CapabilityGate>,
    dispatcher: Arc<dyn Dispatcher>,
    server_host: String,
    live: Arc<LiveTable>,
    health: SchedulerHealth,
    tick_stats: TickStats,
}

impl HunterScheduler {
    pub fn new(deps: SchedulerDeps) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            store: deps.store,
            ignore: deps.ignore,
            sources: deps.sources,
            gate: deps.gate,
            dispatcher: deps.dispatcher,
            server_host: deps.server_host.trim_end_matches('/').to_string(),
            live: LiveTable::new(),
            health: SchedulerHealth::new(),
            tick_stats: TickStats::new()?,
        }))
    }

    pub fn tick_stats(&self) -> &TickStats {
        &self.tick_stats
    }

    pub async fn health(&self) -> HealthSnapshot {
        self.health
            .snapshot(self.live.len().await, self.live.ticks_in_flight())
    }

    #[cfg(test)]
    pub async fn is_live(&self, id: &str) -> bool {
        self.live.lock().await.contains_key(id)
    }

    /// Stop every timer. In-flight ticks are left to finish.
    pub async fn shutdown(&self) {
        self.live.clear().await;
    }
}
