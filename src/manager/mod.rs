//! The check-cycle orchestrator.
//!
//! One run is one pass: query the source, compare against history, persist on
//! change, gate the sensitive status behind the active-hours window, dispatch.
//! Every failure past configuration is absorbed here and reported through
//! [`CheckOutcome`]; the run itself never aborts.

use chrono::Utc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::detect;
use crate::gate;
use crate::notify::{ChannelOutcome, Dispatcher, NotificationPayload};
use crate::source::{CaptchaSolver, QueryResult, StatusSource};
use crate::store::StatusStore;

/// Terminal state of one check cycle.
#[derive(Debug)]
pub enum CheckOutcome {
    /// The source reported failure; nothing was persisted or dispatched.
    QueryFailed { error: String },
    /// Observation matches the last record; no side effects.
    Unchanged { status: String },
    /// Change persisted, but the sensitive-status gate denied notification.
    Suppressed { status: String },
    /// Change persisted and fanned out to every channel.
    Notified {
        status: String,
        outcomes: Vec<ChannelOutcome>,
    },
}

pub struct NotificationManager {
    config: AppConfig,
    store: StatusStore,
    source: Box<dyn StatusSource>,
    solver: Box<dyn CaptchaSolver>,
    dispatcher: Dispatcher,
}

impl NotificationManager {
    pub fn new(
        config: AppConfig,
        store: StatusStore,
        source: Box<dyn StatusSource>,
        solver: Box<dyn CaptchaSolver>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            store,
            source,
            solver,
            dispatcher,
        }
    }

    /// Run one check cycle.
    pub async fn run_check(&self) -> CheckOutcome {
        let observed = self
            .source
            .query(&self.config.identity, self.solver.as_ref())
            .await;

        if !observed.success {
            let error = observed
                .error
                .unwrap_or_else(|| "unknown error".to_string());
            warn!(error = %error, "Status query failed");
            return CheckOutcome::QueryFailed { error };
        }

        let status = observed.status.clone().unwrap_or_default();
        let last_updated = observed.last_updated.clone().unwrap_or_default();
        info!(status = %status, last_updated = %last_updated, "Current status");

        let history = self.store.load();
        if !detect::is_changed(&history, &observed) {
            info!("Status unchanged, no notification sent");
            return CheckOutcome::Unchanged { status };
        }

        // History records every observed change, even when notification is
        // suppressed below.
        if let Err(e) = self.store.append(&status, &last_updated) {
            warn!(error = %e, path = %self.store.path().display(), "Failed to persist status record");
        }

        if status == self.config.sensitive_status && !self.gate_allows() {
            info!(
                status = %status,
                window = %self.config.active_window,
                "Outside active hours, notification suppressed"
            );
            return CheckOutcome::Suppressed { status };
        }

        let payload = NotificationPayload::from_result(observed);
        let outcomes = self.dispatcher.dispatch(&payload).await;
        CheckOutcome::Notified { status, outcomes }
    }

    /// Send a synthetic payload straight to the channels, bypassing the
    /// source, the store, and the gate. Verifies channel wiring only.
    pub async fn test_dispatch(&self) -> Vec<ChannelOutcome> {
        let result = QueryResult {
            success: true,
            status: Some("Test Notification".to_string()),
            last_updated: Some("N/A".to_string()),
            case_created: Some("N/A".to_string()),
            visa_type: Some("TEST".to_string()),
            description: Some(
                "This is a test notification to verify your notification channels are working correctly."
                    .to_string(),
            ),
            application_number: self.config.identity.number.clone(),
            error: None,
        };
        let mut payload = NotificationPayload::from_result(result);
        payload.body = format!(
            "{}\nSent at {}",
            payload.body,
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        self.dispatcher.dispatch(&payload).await
    }

    fn gate_allows(&self) -> bool {
        let now = gate::local_now(self.config.timezone);
        self.config.active_window.contains(now.time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ChannelSettings};
    use crate::gate::ActiveWindow;
    use crate::notify::Channel;
    use crate::source::CaseIdentity;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FixedSource {
        result: QueryResult,
    }

    #[async_trait::async_trait]
    impl StatusSource for FixedSource {
        async fn query(&self, _identity: &CaseIdentity, _solver: &dyn CaptchaSolver) -> QueryResult {
            self.result.clone()
        }
    }

    struct NoopSolver;

    #[async_trait::async_trait]
    impl CaptchaSolver for NoopSolver {
        async fn solve(&self, _image: &[u8]) -> Result<String> {
            Ok("unused".to_string())
        }
    }

    struct CountingChannel {
        calls: Arc<AtomicUsize>,
        last_payload: Arc<Mutex<Option<NotificationPayload>>>,
    }

    #[async_trait::async_trait]
    impl Channel for CountingChannel {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send(&self, payload: &NotificationPayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_payload.lock().unwrap() = Some(payload.clone());
            Ok(())
        }
    }

    fn observation(status: &str, last_updated: &str) -> QueryResult {
        QueryResult {
            success: true,
            status: Some(status.to_string()),
            last_updated: Some(last_updated.to_string()),
            case_created: Some("2024-01-01".to_string()),
            visa_type: Some("NIV".to_string()),
            description: None,
            application_number: "AA0020AKAX".to_string(),
            error: None,
        }
    }

    fn config(window: &str, sensitive: &str) -> AppConfig {
        AppConfig {
            identity: CaseIdentity {
                location: "SHG".to_string(),
                number: "AA0020AKAX".to_string(),
                passport_number: "E12345678".to_string(),
                surname: "DOE".to_string(),
            },
            active_window: ActiveWindow::parse(window).unwrap(),
            timezone: None,
            sensitive_status: sensitive.to_string(),
            channels: ChannelSettings::default(),
            captcha_solver_url: None,
        }
    }

    struct Harness {
        manager: NotificationManager,
        calls: Arc<AtomicUsize>,
        last_payload: Arc<Mutex<Option<NotificationPayload>>>,
        _dir: tempfile::TempDir,
        store_path: std::path::PathBuf,
    }

    fn harness(cfg: AppConfig, result: QueryResult) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("status_record.json");
        let calls = Arc::new(AtomicUsize::new(0));
        let last_payload = Arc::new(Mutex::new(None));

        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Box::new(CountingChannel {
            calls: calls.clone(),
            last_payload: last_payload.clone(),
        }));

        let manager = NotificationManager::new(
            cfg,
            StatusStore::new(&store_path),
            Box::new(FixedSource { result }),
            Box::new(NoopSolver),
            dispatcher,
        );
        Harness {
            manager,
            calls,
            last_payload,
            _dir: dir,
            store_path,
        }
    }

    #[tokio::test]
    async fn first_observation_appends_and_notifies() {
        let h = harness(config("00:00-23:59", "Refused"), observation("Issued", "2024-01-01"));

        let outcome = h.manager.run_check().await;

        assert!(matches!(outcome, CheckOutcome::Notified { ref status, .. } if status == "Issued"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        let history = StatusStore::new(&h.store_path).load();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "Issued");
        assert_eq!(history[0].last_updated, "2024-01-01");

        let payload = h.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(payload.result.status.as_deref(), Some("Issued"));
    }

    #[tokio::test]
    async fn second_identical_run_is_a_no_op() {
        let h = harness(config("00:00-23:59", "Refused"), observation("Issued", "2024-01-01"));

        h.manager.run_check().await;
        let outcome = h.manager.run_check().await;

        assert!(matches!(outcome, CheckOutcome::Unchanged { .. }));
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert_eq!(StatusStore::new(&h.store_path).load().len(), 1);
    }

    #[tokio::test]
    async fn second_run_without_last_updated_stamp_is_a_no_op() {
        let mut result = observation("Issued", "unused");
        result.last_updated = None;
        let h = harness(config("00:00-23:59", "Refused"), result);

        h.manager.run_check().await;
        let outcome = h.manager.run_check().await;

        assert!(matches!(outcome, CheckOutcome::Unchanged { .. }));
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert_eq!(StatusStore::new(&h.store_path).load().len(), 1);
    }

    #[tokio::test]
    async fn query_failure_touches_nothing() {
        let h = harness(
            config("00:00-23:59", "Refused"),
            QueryResult::failure("AA0020AKAX", "captcha rejected"),
        );

        let outcome = h.manager.run_check().await;

        assert!(matches!(outcome, CheckOutcome::QueryFailed { ref error } if error == "captcha rejected"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert!(StatusStore::new(&h.store_path).load().is_empty());
    }

    #[tokio::test]
    async fn sensitive_change_outside_window_is_persisted_but_suppressed() {
        // A window that can never contain "now".
        let h = harness(config("00:00-00:00", "Refused"), observation("Refused", "2024-01-02"));
        StatusStore::new(&h.store_path)
            .append("Issued", "2024-01-01")
            .unwrap();

        let outcome = h.manager.run_check().await;

        assert!(matches!(outcome, CheckOutcome::Suppressed { ref status } if status == "Refused"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);

        let history = StatusStore::new(&h.store_path).load();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, "Refused");
    }

    #[tokio::test]
    async fn unchanged_sensitive_status_never_reaches_the_gate() {
        let h = harness(config("00:00-00:00", "Refused"), observation("Refused", "2024-01-01"));
        StatusStore::new(&h.store_path)
            .append("Refused", "2024-01-01")
            .unwrap();

        let outcome = h.manager.run_check().await;

        assert!(matches!(outcome, CheckOutcome::Unchanged { .. }));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert_eq!(StatusStore::new(&h.store_path).load().len(), 1);
    }

    #[tokio::test]
    async fn non_sensitive_change_bypasses_the_gate() {
        let h = harness(config("00:00-00:00", "Refused"), observation("Issued", "2024-01-02"));
        StatusStore::new(&h.store_path)
            .append("Administrative Processing", "2024-01-01")
            .unwrap();

        let outcome = h.manager.run_check().await;

        assert!(matches!(outcome, CheckOutcome::Notified { .. }));
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timestamp_only_advance_notifies() {
        let h = harness(config("00:00-23:59", "Refused"), observation("Issued", "2024-01-02"));
        StatusStore::new(&h.store_path)
            .append("Issued", "2024-01-01")
            .unwrap();

        let outcome = h.manager.run_check().await;

        assert!(matches!(outcome, CheckOutcome::Notified { .. }));
        assert_eq!(StatusStore::new(&h.store_path).load().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_skips_store_and_gate() {
        let h = harness(config("00:00-00:00", "Refused"), observation("Issued", "2024-01-01"));

        let outcomes = h.manager.test_dispatch().await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_ok());
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert!(StatusStore::new(&h.store_path).load().is_empty());

        let payload = h.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(payload.result.status.as_deref(), Some("Test Notification"));
    }
}
