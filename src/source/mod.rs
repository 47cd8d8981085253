pub mod http;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::types::{Listing, ListingQuery, MarketplaceKind, SearchCondition, Snapshot};

/// One marketplace's search and item-detail endpoints.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>>;
    async fn fetch_item(&self, item_id: &str) -> Result<Listing>;
}

#[derive(Default, Clone)]
pub struct SourceRegistry {
    adapters: HashMap<MarketplaceKind, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: MarketplaceKind, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(kind, adapter);
    }

    pub fn get(&self, kind: MarketplaceKind) -> Result<&Arc<dyn SourceAdapter>> {
        self.adapters
            .get(&kind)
            .ok_or_else(|| AppError::Fetch(format!("no source adapter configured for {kind}")))
    }

    /// Listing hunters poll their own marketplace; surveillance hunters poll the
    /// marketplace named in their condition.
    pub async fn fetch(&self, kind: MarketplaceKind, condition: &SearchCondition) -> Result<Snapshot> {
        match condition {
            SearchCondition::Listing(query) => {
                let items = self.get(kind)?.fetch_listings(query).await?;
                Ok(Snapshot::Listings(items))
            }
            SearchCondition::Item(watch) => {
                let item = self.get(watch.marketplace)?.fetch_item(&watch.item_id).await?;
                Ok(Snapshot::Item(item))
            }
        }
    }
}
