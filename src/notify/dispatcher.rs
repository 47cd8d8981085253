use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::error::{AppError, Result};
use crate::notify::Notification;

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, to: &str, notification: &Notification) -> Result<()>;
}

/// Posts `{to, subject, html}` to a mail relay.
pub struct WebhookDispatcher {
    url: String,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self { url: url.into(), client }
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn send(&self, to: &str, notification: &Notification) -> Result<()> {
        let body = json!({
            "to": to,
            "subject": notification.subject,
            "html": notification.html,
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Dispatch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::Dispatch(format!("mail relay returned {}", resp.status())));
        }
        Ok(())
    }
}

/// Used when no relay is configured: the message only goes to the log.
pub struct LogDispatcher;

#[async_trait]
impl Dispatcher for LogDispatcher {
    async fn send(&self, to: &str, notification: &Notification) -> Result<()> {
        info!(
            to = %to,
            subject = %notification.subject,
            html_len = notification.html.len(),
            "Notification (no relay configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> Notification {
        Notification {
            subject: "New update".to_string(),
            html: "<p>hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn webhook_posts_recipient_subject_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_json(json!({
                "to": "a@example.com",
                "subject": "New update",
                "html": "<p>hi</p>",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let relay = WebhookDispatcher::new(format!("{}/send", server.uri()), reqwest::Client::new());
        relay.send("a@example.com", &notification()).await.unwrap();
    }

    #[tokio::test]
    async fn relay_failure_is_a_dispatch_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let relay = WebhookDispatcher::new(format!("{}/send", server.uri()), reqwest::Client::new());
        let err = relay.send("a@example.com", &notification()).await;
        assert!(matches!(err, Err(AppError::Dispatch(_))));
    }
}
