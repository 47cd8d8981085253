use std::collections::HashMap;

use crate::diff::{Change, DiffOutcome};
use crate::types::{Cursor, Listing, SeenItem};

/// A watched field differs when the fresh value is present and not equal to the stored one.
fn field_changed(fresh: Option<i64>, seen: Option<i64>) -> bool {
    fresh.is_some() && fresh != seen
}

/// Report unseen items and items whose watched prices moved. The next cursor is
/// the current snapshot in full, not a merge with the previous one; only a
/// watched value the fresh item lacks is carried over from the last sighting.
pub fn compute(previous: Option<&Cursor>, items: &[Listing]) -> DiffOutcome {
    let seen: HashMap<&str, &SeenItem> = match previous {
        Some(Cursor::SeenItems(list)) => list.iter().map(|s| (s.id.as_str(), s)).collect(),
        _ => HashMap::new(),
    };

    let changes = items
        .iter()
        .filter_map(|item| match seen.get(item.id.as_str()) {
            None => Some(Change::new(item.clone())),
            Some(prev) => {
                let moved = field_changed(item.price, prev.price)
                    || field_changed(item.secondary_price, prev.secondary_price);
                moved.then(|| Change {
                    listing: item.clone(),
                    previous_price: prev.price,
                })
            }
        })
        .collect();

    let next: Vec<SeenItem> = items
        .iter()
        .map(|item| {
            let mut entry = SeenItem::from(item);
            if let Some(prev) = seen.get(item.id.as_str()) {
                entry.price = entry.price.or(prev.price);
                entry.secondary_price = entry.secondary_price.or(prev.secondary_price);
            }
            entry
        })
        .collect();

    DiffOutcome {
        changes,
        next_cursor: Some(Cursor::SeenItems(next)),
        retire: false,
    }
}
