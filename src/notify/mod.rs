//! Notification channels and fan-out dispatch.

pub mod bark;
pub mod console;
pub mod email;
pub mod telegram;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::source::QueryResult;

/// What every channel receives: a presentation title, a human-readable body,
/// and the full query result for channels that want to format their own view.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub result: QueryResult,
}

impl NotificationPayload {
    /// Build the payload once, for all channels.
    pub fn from_result(result: QueryResult) -> Self {
        let status = result.status.as_deref().unwrap_or("Unknown");
        let title = format!("[visawatch] {}: {}", result.application_number, status);
        let body = serde_json::to_string_pretty(&result)
            .unwrap_or_else(|_| format!("{}: {}", result.application_number, status));
        Self { title, body, result }
    }
}

/// One notification delivery mechanism with its own transport and failure
/// mode. Implementations must not panic on transport errors.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, payload: &NotificationPayload) -> Result<()>;
}

/// Per-channel delivery outcome, surfaced for logging only.
#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel: String,
    pub result: Result<(), String>,
}

impl ChannelOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fans one payload out to every registered channel. Channels are invoked in
/// registration order; a failing channel never prevents the rest from being
/// invoked, and dispatch itself never errors.
#[derive(Default)]
pub struct Dispatcher {
    channels: Vec<Box<dyn Channel>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: Box<dyn Channel>) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub async fn dispatch(&self, payload: &NotificationPayload) -> Vec<ChannelOutcome> {
        let mut outcomes = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let name = channel.name().to_string();
            match channel.send(payload).await {
                Ok(()) => {
                    info!(channel = %name, "Notification sent");
                    outcomes.push(ChannelOutcome {
                        channel: name,
                        result: Ok(()),
                    });
                }
                Err(e) => {
                    warn!(channel = %name, error = %e, "Notification failed");
                    outcomes.push(ChannelOutcome {
                        channel: name,
                        result: Err(e.to_string()),
                    });
                }
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingChannel {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, _payload: &NotificationPayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("simulated transport failure")
            }
            Ok(())
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload::from_result(QueryResult {
            success: true,
            status: Some("Issued".to_string()),
            last_updated: Some("2024-01-01".to_string()),
            case_created: None,
            visa_type: Some("NIV".to_string()),
            description: None,
            application_number: "AA0020AKAX".to_string(),
            error: None,
        })
    }

    #[tokio::test]
    async fn failing_channel_does_not_stop_siblings() {
        let calls: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Box::new(RecordingChannel {
            name: "first",
            calls: calls[0].clone(),
            fail: false,
        }));
        dispatcher.register(Box::new(RecordingChannel {
            name: "second",
            calls: calls[1].clone(),
            fail: true,
        }));
        dispatcher.register(Box::new(RecordingChannel {
            name: "third",
            calls: calls[2].clone(),
            fail: false,
        }));

        let outcomes = dispatcher.dispatch(&payload()).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(!outcomes[1].is_ok());
        assert!(outcomes[2].is_ok());
        for c in &calls {
            assert_eq!(c.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn dispatch_order_matches_registration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        for name in ["email", "telegram", "bark"] {
            dispatcher.register(Box::new(RecordingChannel {
                name,
                calls: calls.clone(),
                fail: false,
            }));
        }
        let outcomes = dispatcher.dispatch(&payload()).await;
        let order: Vec<&str> = outcomes.iter().map(|o| o.channel.as_str()).collect();
        assert_eq!(order, vec!["email", "telegram", "bark"]);
    }

    #[test]
    fn payload_title_carries_case_and_status() {
        let p = payload();
        assert_eq!(p.title, "[visawatch] AA0020AKAX: Issued");
        assert!(p.body.contains("Issued"));
    }
}
