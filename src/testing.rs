//! In-process doubles shared by the test modules.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use crate::codec::{CapabilityGate, Cipher};
use crate::db::{HunterRecordStore, SqliteStore};
use crate::error::{AppError, Result};
use crate::notify::{Dispatcher, Notification};
use crate::scheduler::{HunterScheduler, SchedulerDeps};
use crate::source::{SourceAdapter, SourceRegistry};
use crate::types::{
    Cursor, Hunter, HunterDefinition, HunterUpdate, Listing, ListingQuery, MarketplaceKind,
};

/// Serves whatever was last pushed.
#[derive(Default)]
pub struct StaticSource {
    listings: Mutex<Vec<Listing>>,
    item: Mutex<Option<Listing>>,
    fail_next: AtomicBool,
}

impl StaticSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_listings(&self, listings: Vec<Listing>) {
        *self.listings.lock().unwrap() = listings;
    }

    pub fn set_item(&self, item: Listing) {
        *self.item.lock().unwrap() = Some(item);
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::Fetch("source unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    async fn fetch_listings(&self, _query: &ListingQuery) -> Result<Vec<Listing>> {
        self.check_failure()?;
        Ok(self.listings.lock().unwrap().clone())
    }

    async fn fetch_item(&self, item_id: &str) -> Result<Listing> {
        self.check_failure()?;
        self.item
            .lock()
            .unwrap()
            .clone()
            .filter(|item| item.id == item_id)
            .ok_or_else(|| AppError::Fetch(format!("no item {item_id}")))
    }
}

/// Keeps every sent notification; can be switched to fail or held mid-send.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(String, Notification)>>,
    failing: AtomicBool,
    hold: Mutex<Option<SendHold>>,
}

/// `entered` fires once the held send has started; the send returns after `release`.
#[derive(Clone)]
pub struct SendHold {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl RecordingDispatcher {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Park the next `send` until the returned hold is released.
    pub fn hold_next_send(&self) -> SendHold {
        let hold = SendHold {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        *self.hold.lock().unwrap() = Some(hold.clone());
        hold
    }

    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(&self, to: &str, notification: &Notification) -> Result<()> {
        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Dispatch("relay down".to_string()));
        }
        self.sent.lock().unwrap().push((to.to_string(), notification.clone()));
        Ok(())
    }
}

/// Record store that can be told to fail individual operations.
pub struct FlakyStore {
    inner: Arc<SqliteStore>,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_find_all: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_create: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_find_all: AtomicBool::new(false),
        })
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other(format!("{op} failed"))));
        }
        Ok(())
    }
}

#[async_trait]
impl HunterRecordStore for FlakyStore {
    async fn create(&self, hunter: &Hunter) -> Result<()> {
        Self::check(&self.fail_create, "create")?;
        self.inner.create(hunter).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Hunter>> {
        self.inner.find_by_id(id).await
    }

    async fn find_all_by_owner(&self, owner: &str) -> Result<Vec<Hunter>> {
        self.inner.find_all_by_owner(owner).await
    }

    async fn find_all(&self) -> Result<Vec<Hunter>> {
        Self::check(&self.fail_find_all, "find_all")?;
        self.inner.find_all().await
    }

    async fn update_cursor(&self, id: &str, cursor: &Cursor, read_condition: &str) -> Result<bool> {
        self.inner.update_cursor(id, cursor, read_condition).await
    }

    async fn update_definition(
        &self,
        id: &str,
        update: &HunterUpdate,
        reset_cursor: bool,
    ) -> Result<()> {
        Self::check(&self.fail_update, "update_definition")?;
        self.inner.update_definition(id, update, reset_cursor).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(id).await
    }
}

pub async fn test_gate() -> (CapabilityGate, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let cipher = Arc::new(Cipher::new(&[5u8; 32]).unwrap());
    (CapabilityGate::new(cipher, store.clone(), store.clone()), store)
}

/// Fires on Jan 1st only, so timers never tick on their own during a test.
pub fn mercari_definition(keyword: &str) -> HunterDefinition {
    serde_json::from_value(json!({
        "type": "mercari",
        "schedule": "0 0 0 1 1 *",
        "searchCondition": {"keyword": keyword},
    }))
    .unwrap()
}

pub struct Harness {
    pub scheduler: Arc<HunterScheduler>,
    pub store: Arc<SqliteStore>,
    /// The record store the scheduler sees; wraps `store`.
    pub records: Arc<FlakyStore>,
    pub gate: Arc<CapabilityGate>,
    pub mercari: Arc<StaticSource>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl Harness {
    fn build(
        store: Arc<SqliteStore>,
        records: Arc<FlakyStore>,
        gate: Arc<CapabilityGate>,
        mercari: Arc<StaticSource>,
        dispatcher: Arc<RecordingDispatcher>,
    ) -> Arc<HunterScheduler> {
        let mut sources = SourceRegistry::new();
        sources.register(MarketplaceKind::Mercari, mercari);
        HunterScheduler::new(SchedulerDeps {
            store: records,
            ignore: store,
            sources,
            gate,
            dispatcher,
            server_host: "http://hunter.test".to_string(),
        })
        .unwrap()
    }

    /// A second scheduler over the same storage, as after a process restart.
    pub fn restart(&self) -> Arc<HunterScheduler> {
        Self::build(
            self.store.clone(),
            self.records.clone(),
            self.gate.clone(),
            self.mercari.clone(),
            self.dispatcher.clone(),
        )
    }
}

pub async fn harness() -> Harness {
    let (gate, store) = test_gate().await;
    let gate = Arc::new(gate);
    let mercari = StaticSource::new();
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let records = FlakyStore::new(store.clone());
    let scheduler = Harness::build(
        store.clone(),
        records.clone(),
        gate.clone(),
        mercari.clone(),
        dispatcher.clone(),
    );
    Harness {
        scheduler,
        store,
        records,
        gate,
        mercari,
        dispatcher,
    }
}
