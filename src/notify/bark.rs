//! Bark push channel (https://bark.day.app).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{Channel, NotificationPayload};

pub const DEFAULT_SERVER_URL: &str = "https://api.day.app";

#[derive(Deserialize)]
struct BarkResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

pub struct BarkChannel {
    client: Client,
    api_url: String,
}

impl BarkChannel {
    pub fn new(device_key: &str, server_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            api_url: format!("{}/{}", server_url.trim_end_matches('/'), device_key),
        }
    }
}

#[async_trait::async_trait]
impl Channel for BarkChannel {
    fn name(&self) -> &str {
        "bark"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        let resp = self
            .client
            .post(&self.api_url)
            .json(&serde_json::json!({
                "title": payload.title,
                "body": payload.body,
                "group": "visawatch",
            }))
            .send()
            .await
            .context("Bark push request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            bail!("Bark server returned {status}: {detail}");
        }

        // Bark reports application-level failures in the JSON body.
        let body: BarkResponse = resp.json().await.context("Bark response not JSON")?;
        if body.code != 200 {
            bail!(
                "Bark rejected the push: {}",
                body.message.unwrap_or_else(|| format!("code {}", body.code))
            );
        }
        Ok(())
    }
}
