use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SOURCE_RETRY_BACKOFF_MS;
use crate::error::{AppError, Result};
use crate::source::SourceAdapter;
use crate::types::{ItemStatus, Listing, ListingQuery, MarketplaceKind};

/// JSON scraping sidecar for one marketplace.
///
/// `GET {base}/search?keyword=..` returns a list of raw items (bare array, or
/// wrapped in `items` / `data`); `GET {base}/items/{id}` returns one raw item.
pub struct HttpSource {
    kind: MarketplaceKind,
    base_url: Url,
    client: reqwest::Client,
    backoff_ms: Vec<u64>,
}

impl HttpSource {
    pub fn new(kind: MarketplaceKind, base_url: &str, client: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("{kind} source URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!("{kind} source URL '{base_url}' cannot be a base")));
        }
        Ok(Self {
            kind,
            base_url,
            client,
            backoff_ms: SOURCE_RETRY_BACKOFF_MS.to_vec(),
        })
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff_ms: &[u64]) -> Self {
        self.backoff_ms = backoff_ms.to_vec();
        self
    }

    /// `{base}/<segments..>`, each segment percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Fetch(format!("{} source URL cannot be a base", self.kind)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET with the backoff table. `Ok(None)` on 404. Only transport errors,
    /// 5xx and 429 are retried; any other status fails at once.
    async fn get_json(&self, url: Url, query: &[(String, String)]) -> Result<Option<Value>> {
        let mut last_err = String::new();

        for attempt in 0..=self.backoff_ms.len() {
            if attempt > 0 {
                let backoff = self.backoff_ms[attempt - 1];
                debug!(kind = %self.kind, attempt, backoff_ms = backoff, "Retrying source request");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match self.client.get(url.clone()).query(query).send().await {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => return Ok(None),
                Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                    Ok(v) => return Ok(Some(v)),
                    Err(e) => last_err = format!("invalid JSON: {e}"),
                },
                Ok(resp)
                    if resp.status().is_server_error()
                        || resp.status() == StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_err = format!("HTTP {}", resp.status())
                }
                Ok(resp) => {
                    return Err(AppError::Fetch(format!(
                        "{} {url}: rejected with HTTP {}",
                        self.kind,
                        resp.status()
                    )));
                }
                Err(e) => last_err = e.to_string(),
            }
            warn!(kind = %self.kind, url = %url, attempt, "Source request failed: {last_err}");
        }

        Err(AppError::Fetch(format!("{} {url}: {last_err}", self.kind)))
    }
}

#[async_trait]
impl SourceAdapter for HttpSource {
    async fn fetch_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>> {
        let url = self.endpoint(&["search"])?;
        let params = query_params(query);

        let body = self
            .get_json(url, &params)
            .await?
            .ok_or_else(|| AppError::Fetch(format!("{} search endpoint not found", self.kind)))?;

        let raw = raw_items(&body)
            .ok_or_else(|| AppError::Fetch(format!("{} search response was not a list", self.kind)))?;

        let listings: Vec<Listing> = raw.iter().filter_map(|v| parse_listing(self.kind, v)).collect();
        if listings.len() < raw.len() {
            debug!(
                kind = %self.kind,
                dropped = raw.len() - listings.len(),
                "Dropped unusable raw items"
            );
        }
        Ok(listings)
    }

    async fn fetch_item(&self, item_id: &str) -> Result<Listing> {
        let url = self.endpoint(&["items", item_id])?;
        match self.get_json(url, &[]).await? {
            Some(body) => {
                let raw = body.get("data").unwrap_or(&body);
                parse_listing(self.kind, raw).ok_or_else(|| {
                    AppError::Fetch(format!("{} item {item_id} response was unusable", self.kind))
                })
            }
            // The marketplace no longer knows the item.
            None => Ok(Listing {
                id: item_id.to_string(),
                name: item_id.to_string(),
                thumbnail_url: None,
                price: None,
                secondary_price: None,
                updated_at: None,
                status: Some(ItemStatus::Removed),
            }),
        }
    }
}

fn query_params(query: &ListingQuery) -> Vec<(String, String)> {
    let mut params = vec![("keyword".to_string(), query.keyword.clone())];
    for (k, v) in &query.filters {
        let value = match v {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        params.push((k.clone(), value));
    }
    params
}

fn raw_items(body: &Value) -> Option<&Vec<Value>> {
    body.as_array()
        .or_else(|| body.get("items").and_then(|v| v.as_array()))
        .or_else(|| body.get("data").and_then(|v| v.as_array()))
}

/// Normalize one raw marketplace item. Returns None when it has no usable id.
pub fn parse_listing(kind: MarketplaceKind, v: &Value) -> Option<Listing> {
    let id = match v.get("id")? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let name = ["name", "title"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|n| n.as_str()))
        .unwrap_or("")
        .to_string();

    let thumbnail_url = v
        .get("thumbnails")
        .and_then(|t| t.as_array())
        .and_then(|a| a.first())
        .and_then(|t| t.as_str())
        .or_else(|| {
            ["thumbImgUrl", "thumbnailUrl", "thumbnail"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|t| t.as_str()))
        })
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let (price_key, secondary_key) = match kind {
        MarketplaceKind::Yahoo => ("currentPrice", Some("buyNowPrice")),
        MarketplaceKind::Surugaya => ("price", Some("marketPlacePrice")),
        MarketplaceKind::Mercari | MarketplaceKind::Surveillance => ("price", None),
    };
    let price = v.get(price_key).and_then(parse_price);
    let secondary_price = secondary_key.and_then(|k| v.get(k)).and_then(parse_price);

    let updated_at = ["updated", "updatedAt"]
        .iter()
        .find_map(|k| v.get(*k).and_then(parse_price));

    let status = v.get("status").and_then(|s| s.as_str()).and_then(ItemStatus::from_source);

    Some(Listing {
        id,
        name,
        thumbnail_url,
        price,
        secondary_price,
        updated_at,
        status,
    })
}

/// Integer from a JSON number or from a display string such as `"1,280円"`.
pub fn parse_price(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sidecar(server: &MockServer, kind: MarketplaceKind) -> HttpSource {
        HttpSource::new(kind, &server.uri(), reqwest::Client::new())
            .unwrap()
            .with_backoff(&[1, 1, 1])
    }

    fn keyword(k: &str) -> ListingQuery {
        serde_json::from_value(json!({"keyword": k, "price_max": 20000})).unwrap()
    }

    #[tokio::test]
    async fn search_forwards_filters_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("keyword", "switch"))
            .and(query_param("price_max", "20000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "m1", "name": "Switch", "price": 100, "updated": 5}, {"name": "no id"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let listings = sidecar(&server, MarketplaceKind::Mercari)
            .fetch_listings(&keyword("switch"))
            .await
            .unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!((listings[0].price, listings[0].updated_at), (Some(100), Some(5)));
    }

    #[tokio::test]
    async fn server_errors_retry_through_the_table_then_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let err = sidecar(&server, MarketplaceKind::Yahoo).fetch_listings(&keyword("psp")).await;
        assert!(matches!(err, Err(AppError::Fetch(_))));
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(422))
            .expect(1)
            .mount(&server)
            .await;

        let err = sidecar(&server, MarketplaceKind::Yahoo).fetch_listings(&keyword("psp")).await;
        assert!(matches!(err, Err(AppError::Fetch(_))));
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "y1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let listings = sidecar(&server, MarketplaceKind::Yahoo)
            .fetch_listings(&keyword("psp"))
            .await
            .unwrap();
        assert_eq!(listings[0].id, "y1");
    }

    #[tokio::test]
    async fn missing_item_reads_as_removed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/m9"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let item = sidecar(&server, MarketplaceKind::Mercari).fetch_item("m9").await.unwrap();
        assert_eq!(item.id, "m9");
        assert_eq!(item.status, Some(ItemStatus::Removed));
    }

    #[tokio::test]
    async fn item_id_stays_inside_its_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/a%2Fb"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "a/b", "price": 5}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let item = sidecar(&server, MarketplaceKind::Mercari).fetch_item("a/b").await.unwrap();
        assert_eq!(item.price, Some(5));

        let url = sidecar(&server, MarketplaceKind::Mercari).endpoint(&["items", "../search"]).unwrap();
        assert!(url.path().ends_with("/items/..%2Fsearch"), "{url}");
    }

    #[test]
    fn base_url_must_parse() {
        let err = HttpSource::new(MarketplaceKind::Mercari, "not a url", reqwest::Client::new());
        assert!(matches!(err, Err(AppError::Config(_))));
    }

    #[test]
    fn parses_mercari_item() {
        let v = json!({
            "id": "m123",
            "name": "Switch",
            "price": 19800,
            "status": "on_sale",
            "thumbnails": ["https://static.example/m123.jpg"],
            "updated": "1700000000"
        });
        let l = parse_listing(MarketplaceKind::Mercari, &v).unwrap();
        assert_eq!(l.price, Some(19800));
        assert_eq!(l.updated_at, Some(1_700_000_000));
        assert_eq!(l.status, Some(ItemStatus::OnSale));
        assert_eq!(l.thumbnail_url.as_deref(), Some("https://static.example/m123.jpg"));
    }

    #[test]
    fn parses_yahoo_and_surugaya_prices() {
        let y = json!({"id": "y1", "name": "a", "currentPrice": 500, "buyNowPrice": 1200,
                       "thumbImgUrl": "https://img.example/y1.jpg"});
        let l = parse_listing(MarketplaceKind::Yahoo, &y).unwrap();
        assert_eq!((l.price, l.secondary_price), (Some(500), Some(1200)));

        let s = json!({"id": "s1", "name": "b", "price": "1,280円", "marketPlacePrice": ""});
        let l = parse_listing(MarketplaceKind::Surugaya, &s).unwrap();
        assert_eq!((l.price, l.secondary_price), (Some(1280), None));
        assert!(l.thumbnail_url.is_none());
    }

    #[test]
    fn rejects_items_without_id() {
        assert!(parse_listing(MarketplaceKind::Mercari, &json!({"name": "x"})).is_none());
        assert!(parse_listing(MarketplaceKind::Mercari, &json!({"id": " "})).is_none());
        assert_eq!(
            parse_listing(MarketplaceKind::Yahoo, &json!({"id": 42})).unwrap().id,
            "42"
        );
    }

    #[test]
    fn list_envelopes() {
        assert_eq!(raw_items(&json!([1, 2])).unwrap().len(), 2);
        assert_eq!(raw_items(&json!({"data": [1]})).unwrap().len(), 1);
        assert_eq!(raw_items(&json!({"items": []})).unwrap().len(), 0);
        assert!(raw_items(&json!({"result": "ok"})).is_none());
    }

    #[test]
    fn filters_become_query_params() {
        let q: ListingQuery =
            serde_json::from_value(json!({"keyword": "switch", "price_max": 20000, "nested": {}}))
                .unwrap();
        let params = query_params(&q);
        assert!(params.contains(&("keyword".to_string(), "switch".to_string())));
        assert!(params.contains(&("price_max".to_string(), "20000".to_string())));
        assert_eq!(params.len(), 2);
    }
}
