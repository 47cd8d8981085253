//! Change detection between the persisted cursor and a fresh snapshot.
//!
//! Every strategy is a pure function of `(previous cursor, snapshot)`; the tick
//! owns all I/O around it.

pub mod keyed;
pub mod single_item;
pub mod timestamp;

use std::collections::HashSet;

use crate::types::{Cursor, Listing, MarketplaceKind, Snapshot};

/// One item worth telling the owner about.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub listing: Listing,
    /// Price recorded in the cursor before this change, when the strategy tracks it.
    pub previous_price: Option<i64>,
}

impl Change {
    pub fn new(listing: Listing) -> Self {
        Self { listing, previous_price: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutcome {
    pub changes: Vec<Change>,
    /// Baseline for the next tick. `None` only when there was nothing to learn from.
    pub next_cursor: Option<Cursor>,
    /// The watched item is gone for good; the hunter should dismiss itself.
    pub retire: bool,
}

impl DiffOutcome {
    /// Drop ignored items from the report. The cursor is left alone so ignored
    /// items still count as seen.
    pub fn without_ignored(mut self, ignored: &HashSet<String>) -> Self {
        if !ignored.is_empty() {
            self.changes.retain(|c| !ignored.contains(&c.listing.id));
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStrategy {
    /// Update-time ordered listings (Mercari).
    UpdatedAt,
    /// Listings keyed by id with watched price fields (Yahoo, Surugaya).
    KeyedFields,
    /// One watched item (Surveillance).
    SingleItem,
}

impl DiffStrategy {
    pub fn for_kind(kind: MarketplaceKind) -> Self {
        match kind {
            MarketplaceKind::Mercari => DiffStrategy::UpdatedAt,
            MarketplaceKind::Yahoo | MarketplaceKind::Surugaya => DiffStrategy::KeyedFields,
            MarketplaceKind::Surveillance => DiffStrategy::SingleItem,
        }
    }

    pub fn compute(&self, previous: Option<&Cursor>, snapshot: &Snapshot) -> DiffOutcome {
        match self {
            DiffStrategy::UpdatedAt => timestamp::compute(previous, snapshot.items()),
            DiffStrategy::KeyedFields => keyed::compute(previous, snapshot.items()),
            DiffStrategy::SingleItem => match snapshot {
                Snapshot::Item(item) => single_item::compute(previous, item),
                Snapshot::Listings(items) => match items.first() {
                    Some(item) => single_item::compute(previous, item),
                    None => DiffOutcome {
                        changes: Vec::new(),
                        next_cursor: previous.cloned(),
                        retire: false,
                    },
                },
            },
        }
    }

    /// Compute, then apply the owner's ignore set.
    pub fn compute_filtered(
        &self,
        previous: Option<&Cursor>,
        snapshot: &Snapshot,
        ignored: &HashSet<String>,
    ) -> DiffOutcome {
        self.compute(previous, snapshot).without_ignored(ignored)
    }
}

#[cfg(test)]
pub(crate) fn listing(id: &str, price: Option<i64>, updated_at: Option<i64>) -> Listing {
    Listing {
        id: id.to_string(),
        name: format!("item {id}"),
        thumbnail_url: Some(format!("https://img.example/{id}.jpg")),
        price,
        secondary_price: None,
        updated_at,
        status: None,
    }
}
