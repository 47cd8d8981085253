use std::fmt::Write as _;

use serde::Serialize;

use crate::codec::{CapabilityGate, CipherPayload};
use crate::diff::Change;
use crate::error::Result;
use crate::types::{MarketplaceKind, SearchCondition};

/// A change plus the capability tokens its links carry.
#[derive(Debug, Clone)]
pub struct ReportableItem {
    pub change: Change,
    pub thumbnail: Option<CipherPayload>,
    pub ignore: CipherPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub html: String,
}

/// Attach thumbnail and ignore tokens to every change. The first codec error
/// aborts the whole batch.
pub fn enrich(gate: &CapabilityGate, owner: &str, changes: Vec<Change>) -> Result<Vec<ReportableItem>> {
    changes
        .into_iter()
        .map(|change| {
            let thumbnail = change
                .listing
                .thumbnail_url
                .as_deref()
                .map(|url| gate.issue_thumbnail(url))
                .transpose()?;
            let ignore = gate.issue_ignore(owner, &change.listing.id)?;
            Ok(ReportableItem { change, thumbnail, ignore })
        })
        .collect()
}

pub fn subject(kind: MarketplaceKind, condition: &SearchCondition, items: &[ReportableItem]) -> String {
    match (kind, condition) {
        (MarketplaceKind::Mercari, SearchCondition::Listing(q)) => {
            format!("New update on mercari goods of your interest, keyword:{}", q.keyword)
        }
        (_, SearchCondition::Listing(q)) => {
            format!("New update on {kind} auctions of your interest, keyword:{}", q.keyword)
        }
        (_, SearchCondition::Item(watch)) => {
            let name = items.first().map(|i| i.change.listing.name.as_str()).unwrap_or(&watch.item_id);
            format!("{} item: {name}", capitalize(watch.marketplace.as_str()))
        }
    }
}

pub fn render(
    server_host: &str,
    kind: MarketplaceKind,
    condition: &SearchCondition,
    items: &[ReportableItem],
) -> Result<Notification> {
    let item_site = match condition {
        SearchCondition::Item(watch) => watch.marketplace,
        SearchCondition::Listing(_) => kind,
    };

    let mut html = String::from("<div>");
    for item in items {
        let listing = &item.change.listing;
        html.push_str("<div style=\"margin-bottom:16px\">");

        if let Some(thumb) = &item.thumbnail {
            let _ = write!(
                html,
                "<img src=\"{server_host}/thumbnail?token={}\" width=\"120\" alt=\"\"/>",
                thumb.to_token()?
            );
        }

        match item_site.item_url(&listing.id) {
            Some(url) => {
                let _ = write!(html, "<p><a href=\"{}\">{}</a></p>", escape(&url), escape(&listing.name));
            }
            None => {
                let _ = write!(html, "<p>{}</p>", escape(&listing.name));
            }
        }

        let _ = write!(html, "<p>{}</p>", price_line(kind, &item.change));
        if let Some(status) = listing.status {
            let _ = write!(html, "<p>Status: {status}</p>");
        }

        let _ = write!(
            html,
            "<p><a href=\"{server_host}/ignore?token={}\">Don't show this item again</a></p>",
            item.ignore.to_token()?
        );
        html.push_str("</div>");
    }
    html.push_str("</div>");

    Ok(Notification {
        subject: subject(kind, condition, items),
        html,
    })
}

fn price_line(kind: MarketplaceKind, change: &Change) -> String {
    let price = fmt_yen(change.listing.price);
    let mut line = match change.previous_price {
        Some(old) if Some(old) != change.listing.price => {
            format!("Price: {} → {price}", fmt_yen(Some(old)))
        }
        _ => format!("Price: {price}"),
    };
    if let Some(secondary) = change.listing.secondary_price {
        let label = match kind {
            MarketplaceKind::Yahoo => "Buy now",
            _ => "Marketplace",
        };
        let _ = write!(line, " / {label}: {}", fmt_yen(Some(secondary)));
    }
    line
}

fn fmt_yen(v: Option<i64>) -> String {
    match v {
        Some(p) => format!("¥{p}"),
        None => "-".to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
