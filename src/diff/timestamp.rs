use crate::diff::{Change, DiffOutcome};
use crate::types::{Cursor, Listing};

/// Report everything updated after the cursor; the cursor becomes the newest
/// `updated_at` seen. A missing or foreign cursor reports the whole snapshot.
pub fn compute(previous: Option<&Cursor>, items: &[Listing]) -> DiffOutcome {
    let since = match previous {
        Some(Cursor::UpdatedAt(ts)) => Some(*ts),
        _ => None,
    };

    let newest = items.iter().filter_map(|i| i.updated_at).max();
    let next = match (since, newest) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    let changes = match since {
        None => items.iter().cloned().map(Change::new).collect(),
        Some(since) => items
            .iter()
            .filter(|i| i.updated_at.is_some_and(|u| u > since))
            .cloned()
            .map(Change::new)
            .collect(),
    };

    DiffOutcome {
        changes,
        next_cursor: next.map(Cursor::UpdatedAt),
        retire: false,
    }
}
