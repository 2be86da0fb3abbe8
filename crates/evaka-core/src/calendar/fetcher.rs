use chrono::{Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Europe::Helsinki;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ApiPath, Transport};
use crate::auth::SessionGuard;
use crate::models::{parse_events, CalendarEvent, Municipality, SkippedRecord};

/// Number of days after today to fetch.
/// Four weeks covers the daycare's published planning horizon.
const EVENT_LOOKAHEAD_DAYS: i64 = 28;

/// A fetch uses its session at most this many times: the first attempt and
/// one retry after re-login.
const MAX_AUTH_ATTEMPTS: u32 = 2;

/// Today's date in Helsinki, where every supported portal is.
pub fn local_today() -> NaiveDate {
    Utc::now().with_timezone(&Helsinki).date_naive()
}

/// Date range sent to the calendar-events endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl EventWindow {
    /// Monday of the current week through four weeks from today.
    pub fn rolling(today: NaiveDate) -> Self {
        let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        Self {
            start: monday,
            end: today + Duration::days(EVENT_LOOKAHEAD_DAYS),
        }
    }

    /// Rolling window for today in local time
    pub fn current() -> Self {
        Self::rolling(local_today())
    }

    fn query(&self) -> [(&'static str, String); 2] {
        [
            ("start", self.start.format("%Y-%m-%d").to_string()),
            ("end", self.end.format("%Y-%m-%d").to_string()),
        ]
    }
}

/// Result of one successful fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub window: EventWindow,
    pub events: Vec<CalendarEvent>,
    pub skipped: Vec<SkippedRecord>,
}

/// Fetches and normalizes calendar events through the account's session.
pub struct CalendarFetcher {
    transport: Transport,
    guard: SessionGuard,
}

impl CalendarFetcher {
    pub fn new(transport: Transport, guard: SessionGuard) -> Self {
        Self { transport, guard }
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub fn municipality(&self) -> Municipality {
        self.transport.endpoint().municipality
    }

    /// Fetch the current rolling window.
    pub async fn fetch_events(&mut self) -> Result<FetchOutcome, ApiError> {
        self.fetch_window(EventWindow::current()).await
    }

    /// Fetch one window. An authorization failure invalidates the session and
    /// the whole sequence is retried once with a fresh login; a second
    /// failure is `PersistentAuthFailure`.
    pub async fn fetch_window(&mut self, window: EventWindow) -> Result<FetchOutcome, ApiError> {
        let query = window.query();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let session = match self.guard.ensure_session().await {
                Ok(session) => session,
                Err(ApiError::InvalidCredentials) if attempt > 1 => {
                    return Err(ApiError::PersistentAuthFailure(
                        "re-login after session expiry was rejected".to_string(),
                    ));
                }
                Err(e) => return Err(e),
            };

            let response = self
                .transport
                .request(ApiPath::CalendarEvents, &query, None, Some(session))
                .await?;

            if response.is_auth_failure() {
                self.guard.invalidate();
                if attempt >= MAX_AUTH_ATTEMPTS {
                    return Err(ApiError::PersistentAuthFailure(format!(
                        "calendar request returned {} with a fresh session",
                        response.status
                    )));
                }
                warn!(status = %response.status, "Calendar request rejected, logging in again");
                continue;
            }

            if !response.status.is_success() {
                let body = match &response.body {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                return Err(ApiError::from_status(response.status, &body));
            }

            self.guard.absorb_cookies(response.cookies);

            let parsed = parse_events(&response.body)?;
            if parsed.skipped.is_empty() {
                debug!(events = parsed.events.len(), "Calendar events parsed");
            } else {
                warn!(
                    events = parsed.events.len(),
                    skipped = parsed.skipped.len(),
                    "Some calendar records were skipped"
                );
            }
            info!(
                municipality = %self.municipality(),
                start = %window.start,
                end = %window.end,
                events = parsed.events.len(),
                "Fetched calendar events"
            );

            return Ok(FetchOutcome {
                window,
                events: parsed.events,
                skipped: parsed.skipped,
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
