//! Best-effort ntfy notifications.
//!
//! A notification never fails the run: every problem is logged and reported
//! as `false`.

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use crate::api::ApiError;

#[derive(Clone)]
pub struct Notifier {
    client: Client,
    base_url: String,
    topic: String,
}

impl Notifier {
    pub fn new(base_url: &str, topic: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Post `message` as plain text to the configured topic.
    pub async fn send(&self, message: &str) -> bool {
        let url = format!("{}/{}", self.base_url, self.topic);
        let result = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(message.to_string())
            .send()
            .await;

        match result {
            Ok(response) if matches!(response.status(), StatusCode::OK | StatusCode::CREATED) => {
                info!(topic = %self.topic, "Notification sent");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(
                    topic = %self.topic,
                    status = %status,
                    body = %ApiError::truncate_body(&body),
                    "Failed to send notification"
                );
                false
            }
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Error sending notification");
                false
            }
        }
    }
}
