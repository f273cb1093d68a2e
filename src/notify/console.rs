//! Console fallback channel -- used when no real channel is configured.

use anyhow::Result;

use super::{Channel, NotificationPayload};

pub struct ConsoleChannel;

#[async_trait::async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        println!("{}", payload.title);
        println!("{}", payload.body);
        Ok(())
    }
}
