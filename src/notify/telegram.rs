//! Telegram bot-API channel.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;

use super::{Channel, NotificationPayload};

pub struct TelegramChannel {
    client: Client,
    api_url: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            api_url: format!("https://api.telegram.org/bot{bot_token}/sendMessage"),
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        let text = format!("{}\n\n{}", payload.title, payload.body);
        let resp = self
            .client
            .post(&self.api_url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .send()
            .await
            .context("Telegram sendMessage request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            bail!("Telegram API returned {status}: {detail}");
        }
        Ok(())
    }
}
