use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Marketplace kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketplaceKind {
    Mercari,
    Yahoo,
    Surugaya,
    /// Watches one item on one of the listing marketplaces.
    Surveillance,
}

impl MarketplaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketplaceKind::Mercari => "mercari",
            MarketplaceKind::Yahoo => "yahoo",
            MarketplaceKind::Surugaya => "surugaya",
            MarketplaceKind::Surveillance => "surveillance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mercari" => Some(MarketplaceKind::Mercari),
            "yahoo" => Some(MarketplaceKind::Yahoo),
            "surugaya" => Some(MarketplaceKind::Surugaya),
            "surveillance" => Some(MarketplaceKind::Surveillance),
            _ => None,
        }
    }

    /// Public page for an item on this marketplace.
    pub fn item_url(&self, item_id: &str) -> Option<String> {
        match self {
            MarketplaceKind::Mercari => Some(format!("https://jp.mercari.com/item/{item_id}")),
            MarketplaceKind::Yahoo => {
                Some(format!("https://page.auctions.yahoo.co.jp/jp/auction/{item_id}"))
            }
            MarketplaceKind::Surugaya => {
                Some(format!("https://www.suruga-ya.jp/product/detail/{item_id}"))
            }
            MarketplaceKind::Surveillance => None,
        }
    }
}

impl std::fmt::Display for MarketplaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Listings: normalized source output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    OnSale,
    Trading,
    SoldOut,
    /// Permanently gone from the marketplace. Nothing left to watch.
    Removed,
}

impl ItemStatus {
    pub fn from_source(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "on_sale" | "onsale" | "open" | "active" => Some(ItemStatus::OnSale),
            "trading" => Some(ItemStatus::Trading),
            "sold_out" | "soldout" | "sold" | "closed" => Some(ItemStatus::SoldOut),
            "removed" | "deleted" | "cancel" | "cancelled" | "stop" => Some(ItemStatus::Removed),
            _ => None,
        }
    }

    /// Terminal for reporting purposes: the item can no longer be bought.
    pub fn is_ended(&self) -> bool {
        matches!(self, ItemStatus::SoldOut | ItemStatus::Removed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemStatus::OnSale => "on sale",
            ItemStatus::Trading => "trading",
            ItemStatus::SoldOut => "sold out",
            ItemStatus::Removed => "removed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Main watched price (Mercari price, Yahoo current bid, Surugaya price).
    #[serde(default)]
    pub price: Option<i64>,
    /// Second watched price (Yahoo buy-now, Surugaya marketplace price).
    #[serde(default)]
    pub secondary_price: Option<i64>,
    /// Unix seconds of the last update on the marketplace side.
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
}

/// What a source adapter hands back for one poll.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Listings(Vec<Listing>),
    Item(Listing),
}

impl Snapshot {
    pub fn items(&self) -> &[Listing] {
        match self {
            Snapshot::Listings(items) => items,
            Snapshot::Item(item) => std::slice::from_ref(item),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Cursor: per-hunter diff baseline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenItem {
    pub id: String,
    pub price: Option<i64>,
    pub secondary_price: Option<i64>,
}

impl From<&Listing> for SeenItem {
    fn from(l: &Listing) -> Self {
        Self {
            id: l.id.clone(),
            price: l.price,
            secondary_price: l.secondary_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cursor {
    /// Highest `updated_at` already reported.
    UpdatedAt(i64),
    /// Full last-seen listing with watched fields.
    SeenItems(Vec<SeenItem>),
    /// Last full snapshot of a single watched item.
    Snapshot(Listing),
}

// ---------------------------------------------------------------------------
// Search conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingQuery {
    pub keyword: String,
    /// Marketplace-specific filters, forwarded verbatim to the source.
    #[serde(flatten)]
    pub filters: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemWatch {
    pub marketplace: MarketplaceKind,
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchCondition {
    Listing(ListingQuery),
    Item(ItemWatch),
}

impl SearchCondition {
    pub fn parse(kind: MarketplaceKind, raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AppError::SearchConditionMalformed(e.to_string()))?;
        Self::from_value(kind, &value)
    }

    pub fn from_value(kind: MarketplaceKind, value: &Value) -> Result<Self> {
        match kind {
            MarketplaceKind::Surveillance => {
                let watch: ItemWatch = serde_json::from_value(value.clone())
                    .map_err(|e| AppError::SearchConditionMalformed(e.to_string()))?;
                if watch.item_id.trim().is_empty() {
                    return Err(AppError::SearchConditionMalformed("no itemId found".to_string()));
                }
                if watch.marketplace == MarketplaceKind::Surveillance {
                    return Err(AppError::SearchConditionMalformed(
                        "surveillance must target a listing marketplace".to_string(),
                    ));
                }
                Ok(SearchCondition::Item(watch))
            }
            _ => {
                let query: ListingQuery = serde_json::from_value(value.clone())
                    .map_err(|e| AppError::SearchConditionMalformed(e.to_string()))?;
                if query.keyword.trim().is_empty() {
                    return Err(AppError::SearchConditionMalformed("no keyword found".to_string()));
                }
                Ok(SearchCondition::Listing(query))
            }
        }
    }

    /// The part of the condition that decides *what* is being watched. A change here
    /// invalidates the diff baseline.
    pub fn identity(&self) -> String {
        match self {
            SearchCondition::Listing(q) => q.keyword.trim().to_string(),
            SearchCondition::Item(w) => format!("{}:{}", w.marketplace, w.item_id.trim()),
        }
    }
}

// ---------------------------------------------------------------------------
// Freezing window
// ---------------------------------------------------------------------------

/// Daily wall-clock interval during which ticks are suppressed. `HH:MM` bounds,
/// exclusive on both ends; wraps past midnight when `end < start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezingWindow {
    pub start: String,
    pub end: String,
}

impl FreezingWindow {
    fn parse_time(s: &str) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|e| AppError::InvalidFreezingWindow(format!("'{s}': {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        Self::parse_time(&self.start)?;
        Self::parse_time(&self.end)?;
        Ok(())
    }

    pub fn contains(&self, now: NaiveTime) -> bool {
        let (Ok(start), Ok(end)) = (Self::parse_time(&self.start), Self::parse_time(&self.end))
        else {
            return false;
        };
        if start <= end {
            now > start && now < end
        } else {
            now > start || now < end
        }
    }
}

// ---------------------------------------------------------------------------
// Hunter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hunter {
    pub id: String,
    pub owner: String,
    pub kind: MarketplaceKind,
    pub schedule: String,
    /// Raw JSON as persisted; re-parsed on every tick.
    pub search_condition: String,
    pub freezing: Option<FreezingWindow>,
    #[serde(skip)]
    pub cursor: Option<Cursor>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input to `hire`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HunterDefinition {
    #[serde(rename = "type")]
    pub kind: MarketplaceKind,
    pub schedule: String,
    pub search_condition: Value,
    #[serde(default, rename = "freezingRange")]
    pub freezing: Option<FreezingWindow>,
}

/// Input to `transfer`. The marketplace kind of a hunter never changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HunterUpdate {
    pub schedule: String,
    pub search_condition: Value,
    #[serde(default, rename = "freezingRange")]
    pub freezing: Option<FreezingWindow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn freezing_window_same_day() {
        let w = FreezingWindow { start: "01:00".into(), end: "07:30".into() };
        assert!(w.contains(t(3, 0)));
        assert!(!w.contains(t(0, 30)));
        assert!(!w.contains(t(8, 0)));
        assert!(!w.contains(t(1, 0)), "bounds are exclusive");
    }

    #[test]
    fn freezing_window_wraps_midnight() {
        let w = FreezingWindow { start: "23:00".into(), end: "06:00".into() };
        assert!(w.contains(t(23, 30)));
        assert!(w.contains(t(2, 0)));
        assert!(!w.contains(t(12, 0)));
    }

    #[test]
    fn freezing_window_rejects_bad_times() {
        let w = FreezingWindow { start: "25:00".into(), end: "06:00".into() };
        assert!(matches!(w.validate(), Err(AppError::InvalidFreezingWindow(_))));
        assert!(!w.contains(t(2, 0)));
    }

    #[test]
    fn listing_condition_requires_keyword() {
        let ok = SearchCondition::from_value(
            MarketplaceKind::Mercari,
            &json!({"keyword": "switch", "price_max": 20000}),
        )
        .unwrap();
        assert_eq!(ok.identity(), "switch");
        if let SearchCondition::Listing(q) = ok {
            assert_eq!(q.filters.get("price_max"), Some(&json!(20000)));
        } else {
            panic!("expected listing condition");
        }

        let err = SearchCondition::from_value(MarketplaceKind::Yahoo, &json!({"keyword": " "}));
        assert!(matches!(err, Err(AppError::SearchConditionMalformed(_))));
        let err = SearchCondition::parse(MarketplaceKind::Yahoo, "{not json");
        assert!(matches!(err, Err(AppError::SearchConditionMalformed(_))));
    }

    #[test]
    fn surveillance_condition_names_marketplace_and_item() {
        let c = SearchCondition::from_value(
            MarketplaceKind::Surveillance,
            &json!({"marketplace": "mercari", "itemId": "m123"}),
        )
        .unwrap();
        assert_eq!(c.identity(), "mercari:m123");

        let err = SearchCondition::from_value(
            MarketplaceKind::Surveillance,
            &json!({"marketplace": "surveillance", "itemId": "m123"}),
        );
        assert!(matches!(err, Err(AppError::SearchConditionMalformed(_))));
    }

    #[test]
    fn cursor_json_is_tagged() {
        let raw = serde_json::to_string(&Cursor::UpdatedAt(42)).unwrap();
        assert_eq!(raw, r#"{"type":"updated_at","value":42}"#);
        let back: Cursor = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, Cursor::UpdatedAt(42));
    }
}
