//! SMTP email channel.

use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Channel, NotificationPayload};

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    pub fn new(from: &str, to: &str, password: &str, smtp_host: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .with_context(|| format!("invalid SMTP relay '{smtp_host}'"))?
            .credentials(Credentials::new(from.to_string(), password.to_string()))
            .build();
        Ok(Self {
            transport,
            from: from.parse().with_context(|| format!("invalid FROM address '{from}'"))?,
            to: to.parse().with_context(|| format!("invalid TO address '{to}'"))?,
        })
    }
}

#[async_trait::async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(payload.title.clone())
            .body(payload.body.clone())
            .context("building email message")?;

        self.transport
            .send(message)
            .await
            .context("SMTP send failed")?;
        Ok(())
    }
}
