//! Change detection -- pure comparison of an observation against history.

use crate::source::QueryResult;
use crate::store::StatusRecord;

/// True iff the observation differs from the last recorded status. An empty
/// history always counts as changed; either the status string or the remote
/// last-updated stamp differing is sufficient (the tracker sometimes
/// re-affirms a status by advancing only the date). Exact string comparison,
/// no normalization.
///
/// An absent field compares as the empty string, matching what the store
/// persists for it, so an observation the tracker never stamps stays
/// unchanged run over run.
pub fn is_changed(history: &[StatusRecord], observed: &QueryResult) -> bool {
    let Some(last) = history.last() else {
        return true;
    };
    observed.status.as_deref().unwrap_or_default() != last.status
        || observed.last_updated.as_deref().unwrap_or_default() != last.last_updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(status: &str, last_updated: &str) -> StatusRecord {
        StatusRecord {
            status: status.to_string(),
            last_updated: last_updated.to_string(),
            recorded_at: Utc::now(),
        }
    }

    fn observation(status: &str, last_updated: &str) -> QueryResult {
        QueryResult {
            success: true,
            status: Some(status.to_string()),
            last_updated: Some(last_updated.to_string()),
            case_created: None,
            visa_type: None,
            description: None,
            application_number: "AA0020AKAX".to_string(),
            error: None,
        }
    }

    #[test]
    fn empty_history_is_changed() {
        assert!(is_changed(&[], &observation("Issued", "2024-01-01")));
    }

    #[test]
    fn same_status_and_date_is_unchanged() {
        let history = vec![record("Refused", "2024-01-01")];
        assert!(!is_changed(&history, &observation("Refused", "2024-01-01")));
    }

    #[test]
    fn different_status_is_changed() {
        let history = vec![record("Administrative Processing", "2024-01-01")];
        assert!(is_changed(&history, &observation("Issued", "2024-01-01")));
    }

    #[test]
    fn same_status_with_newer_date_is_changed() {
        let history = vec![record("Refused", "2024-01-01")];
        assert!(is_changed(&history, &observation("Refused", "2024-01-02")));
    }

    #[test]
    fn absent_last_updated_matches_the_empty_recorded_stamp() {
        // The store records an absent stamp as "", so a tracker that never
        // dates the status must not read as a fresh change every run.
        let history = vec![record("Issued", "")];
        let mut observed = observation("Issued", "unused");
        observed.last_updated = None;
        assert!(!is_changed(&history, &observed));

        observed.status = None;
        assert!(is_changed(&history, &observed));
    }

    #[test]
    fn only_last_record_matters() {
        let history = vec![
            record("Issued", "2024-01-01"),
            record("Refused", "2024-01-02"),
        ];
        assert!(!is_changed(&history, &observation("Refused", "2024-01-02")));
        assert!(is_changed(&history, &observation("Issued", "2024-01-01")));
    }
}
