use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::ApiError;
use crate::calendar::{CalendarView, FetchOutcome};
use crate::models::{CalendarEvent, Municipality};

/// Where the poller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Fetching,
    Published,
    Failed,
}

/// The failure of the most recent cycle, kept in a cloneable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleError {
    /// Stable key, the same one setup uses
    pub kind: String,
    pub message: String,
    /// True when the failure needs the user to act on the account
    pub auth: bool,
    pub at: DateTime<Utc>,
}

impl CycleError {
    pub fn from_api(error: &ApiError, at: DateTime<Utc>) -> Self {
        Self {
            kind: error.setup_error_key().to_string(),
            message: error.to_string(),
            auth: error.is_auth_error(),
            at,
        }
    }
}

/// What the host reads: the current events, or the last-known-good events
/// plus the error that stopped the latest refresh.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarSnapshot {
    pub municipality: Municipality,
    pub state: PollState,
    pub events: Vec<CalendarEvent>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<CycleError>,
    /// Records dropped by the latest successful fetch
    pub skipped: usize,
}

impl CalendarSnapshot {
    pub fn new(municipality: Municipality) -> Self {
        Self {
            municipality,
            state: PollState::Idle,
            events: Vec::new(),
            last_success: None,
            last_error: None,
            skipped: 0,
        }
    }

    /// Seed a snapshot with events restored from a cache.
    pub fn restored(municipality: Municipality, events: Vec<CalendarEvent>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            events,
            last_success: Some(fetched_at),
            ..Self::new(municipality)
        }
    }

    pub fn has_data(&self) -> bool {
        self.last_success.is_some()
    }

    /// True when the events shown are older than the latest attempt.
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn view(&self) -> CalendarView<'_> {
        CalendarView::new(self)
    }

    pub(crate) fn publish(&mut self, outcome: FetchOutcome, at: DateTime<Utc>) {
        self.state = PollState::Published;
        self.events = outcome.events;
        self.skipped = outcome.skipped.len();
        self.last_success = Some(at);
        self.last_error = None;
    }

    /// Record a failed cycle. Events stay as they were.
    pub(crate) fn fail(&mut self, error: &ApiError, at: DateTime<Utc>) {
        self.state = PollState::Failed;
        self.last_error = Some(CycleError::from_api(error, at));
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::calendar::EventWindow;
    use crate::models::EventTime;

    fn event(id: &str) -> CalendarEvent {
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        CalendarEvent {
            id: id.to_string(),
            title: id.to_string(),
            time: EventTime::AllDay {
                start: day,
                end: day.succ_opt().unwrap(),
            },
            description: None,
            location: None,
        }
    }

    fn outcome(ids: &[&str]) -> FetchOutcome {
        FetchOutcome {
            window: EventWindow::rolling(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
            events: ids.iter().map(|id| event(id)).collect(),
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_failure_keeps_last_known_good() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();

        let mut snapshot = CalendarSnapshot::new(Municipality::Espoo);
        snapshot.publish(outcome(&["a", "b"]), t0);
        assert!(!snapshot.is_stale());

        snapshot.fail(&ApiError::ServerError("down".into()), t1);
        assert_eq!(snapshot.state, PollState::Failed);
        assert_eq!(snapshot.events.len(), 2);
        assert_eq!(snapshot.last_success, Some(t0));
        assert!(snapshot.is_stale());

        let error = snapshot.last_error.as_ref().unwrap();
        assert_eq!(error.kind, "cannot_connect");
        assert!(!error.auth);
    }

    #[test]
    fn test_publish_replaces_and_clears_error() {
        let at = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
        let mut snapshot = CalendarSnapshot::restored(Municipality::Oulu, vec![event("old")], at);
        assert!(snapshot.has_data());

        snapshot.fail(&ApiError::InvalidCredentials, at);
        assert!(snapshot.last_error.as_ref().unwrap().auth);

        snapshot.publish(outcome(&["new"]), at);
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.events[0].id, "new");
        assert!(snapshot.last_error.is_none());
    }
}
