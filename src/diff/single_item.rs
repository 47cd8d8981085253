use crate::diff::{Change, DiffOutcome};
use crate::types::{Cursor, ItemStatus, Listing};

/// Report the watched item when it is seen for the first time, when its price
/// moves, or when it enters an ended state (sold out / removed) from a live one.
/// A removed item always retires the hunter, reported or not. A price the
/// fresh snapshot lacks is kept from the previous one.
pub fn compute(previous: Option<&Cursor>, item: &Listing) -> DiffOutcome {
    let prev = match previous {
        Some(Cursor::Snapshot(prev)) => Some(prev),
        _ => None,
    };

    let report = match prev {
        None => true,
        Some(prev) => {
            let price_moved = item.price.is_some() && item.price != prev.price;
            let was_ended = prev.status.is_some_and(|s| s.is_ended());
            let now_ended = item.status.is_some_and(|s| s.is_ended());
            price_moved || (now_ended && !was_ended)
        }
    };

    let changes = if report {
        vec![Change {
            listing: item.clone(),
            previous_price: prev.and_then(|p| p.price),
        }]
    } else {
        Vec::new()
    };

    let mut next = item.clone();
    if let Some(prev) = prev {
        next.price = next.price.or(prev.price);
        next.secondary_price = next.secondary_price.or(prev.secondary_price);
    }

    DiffOutcome {
        changes,
        next_cursor: Some(Cursor::Snapshot(next)),
        retire: item.status == Some(ItemStatus::Removed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::listing;

    fn with_status(price: i64, status: ItemStatus) -> Listing {
        let mut l = listing("m1", Some(price), None);
        l.status = Some(status);
        l
    }

    #[test]
    fn first_check_reports() {
        let out = compute(None, &with_status(1000, ItemStatus::OnSale));
        assert_eq!(out.changes.len(), 1);
        assert_eq!(out.changes[0].previous_price, None);
        assert!(!out.retire);
    }

    #[test]
    fn unchanged_item_is_quiet() {
        let item = with_status(1000, ItemStatus::OnSale);
        let out = compute(Some(&Cursor::Snapshot(item.clone())), &item);
        assert!(out.changes.is_empty());
        assert_eq!(out.next_cursor, Some(Cursor::Snapshot(item)));
    }

    #[test]
    fn price_drop_reports_old_price() {
        let prev = Cursor::Snapshot(with_status(1000, ItemStatus::OnSale));
        let out = compute(Some(&prev), &with_status(800, ItemStatus::OnSale));
        assert_eq!(out.changes.len(), 1);
        assert_eq!(out.changes[0].previous_price, Some(1000));
    }

    #[test]
    fn missing_price_keeps_last_known_price() {
        let first = compute(None, &with_status(1000, ItemStatus::OnSale));
        let mut blank = with_status(1000, ItemStatus::OnSale);
        blank.price = None;

        let gap = compute(first.next_cursor.as_ref(), &blank);
        assert!(gap.changes.is_empty());
        assert!(matches!(&gap.next_cursor, Some(Cursor::Snapshot(l)) if l.price == Some(1000)));

        let back = compute(gap.next_cursor.as_ref(), &with_status(1000, ItemStatus::OnSale));
        assert!(back.changes.is_empty());
    }

    #[test]
    fn sold_out_reports_once_and_keeps_watching() {
        let prev = Cursor::Snapshot(with_status(1000, ItemStatus::Trading));
        let out = compute(Some(&prev), &with_status(1000, ItemStatus::SoldOut));
        assert_eq!(out.changes.len(), 1);
        assert!(!out.retire);

        let again = compute(out.next_cursor.as_ref(), &with_status(1000, ItemStatus::SoldOut));
        assert!(again.changes.is_empty());
    }

    #[test]
    fn removed_item_retires_the_hunter() {
        let prev = Cursor::Snapshot(with_status(1000, ItemStatus::OnSale));
        let out = compute(Some(&prev), &with_status(1000, ItemStatus::Removed));
        assert_eq!(out.changes.len(), 1);
        assert!(out.retire);

        let prev = Cursor::Snapshot(with_status(1000, ItemStatus::SoldOut));
        let out = compute(Some(&prev), &with_status(1000, ItemStatus::Removed));
        assert!(out.changes.is_empty(), "already ended, nothing new to say");
        assert!(out.retire);
    }
}
