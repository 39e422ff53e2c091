//! WebhookChannel - HTTP POST で通知を中継する
//!
//! 本文は `{"destination": …, "message": …}` の JSON。
//! 2xx 以外は Rejected、接続やタイムアウトの失敗は Transport。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::domain::{NotifyError, Sent};
use crate::ports::NotificationChannel;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    destination: &'a str,
    message: &'a str,
}

pub struct WebhookChannel {
    client: Client,
    endpoint: Url,
}

impl WebhookChannel {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, destination: &str, message: &str) -> Result<Sent, NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&WebhookPayload {
                destination,
                message,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{status}: {body}")));
        }
        debug!(%destination, %status, "webhook accepted message");
        Ok(Sent)
    }
}
