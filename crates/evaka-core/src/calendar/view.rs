//! Read-only queries over a published snapshot, shaped for the host's
//! calendar entity and schedule displays.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::Serialize;

use crate::models::{CalendarEvent, Municipality};
use crate::poller::CalendarSnapshot;
use crate::utils::{format_date_fi, truncate_chars, weekday_fi_short};

/// Events listed in a day summary
const SUMMARY_MAX_EVENTS: usize = 5;
const TIMED_TITLE_CHARS: usize = 25;
const ALL_DAY_TITLE_CHARS: usize = 30;
const WEEK_LINE_TITLE_CHARS: usize = 15;

pub const NO_EVENTS_FI: &str = "Ei tapahtumia";

/// Entity attributes exposed next to the calendar state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarAttributes {
    pub authenticated: bool,
    pub municipality: Municipality,
    pub event_count: usize,
}

/// Events starting on one day.
#[derive(Debug, Clone)]
pub struct DaySchedule<'a> {
    pub date: NaiveDate,
    pub events: Vec<&'a CalendarEvent>,
}

impl DaySchedule<'_> {
    /// `Maanantai, 02.06.2025`
    pub fn display_date(&self) -> String {
        format_date_fi(self.date)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Date heading followed by at most five event lines.
    pub fn summary(&self) -> String {
        let mut lines = vec![self.display_date()];
        if self.events.is_empty() {
            lines.push(NO_EVENTS_FI.to_string());
        }
        for event in self.events.iter().take(SUMMARY_MAX_EVENTS) {
            lines.push(match event.time_range_label() {
                Some((start, end)) => {
                    format!("{start}-{end}: {}", truncate_chars(&event.title, TIMED_TITLE_CHARS))
                }
                None => format!("• {}", truncate_chars(&event.title, ALL_DAY_TITLE_CHARS)),
            });
        }
        lines.join("\n")
    }

    /// One line for week listings: `Ma 02.06: Retki, Kevätjuhla`
    pub fn short_line(&self) -> String {
        let titles = if self.events.is_empty() {
            "-".to_string()
        } else {
            self.events
                .iter()
                .take(2)
                .map(|e| truncate_chars(&e.title, WEEK_LINE_TITLE_CHARS))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "{} {}: {}",
            weekday_fi_short(self.date.weekday()),
            self.date.format("%d.%m"),
            titles
        )
    }
}

/// The next day the child is expected at daycare.
#[derive(Debug, Clone)]
pub struct NextDaycareDay<'a> {
    /// `Huomenna` or `Maanantai`
    pub label: &'static str,
    pub schedule: DaySchedule<'a>,
}

impl NextDaycareDay<'_> {
    pub fn is_next_week(&self) -> bool {
        self.label == "Maanantai"
    }
}

pub struct CalendarView<'a> {
    snapshot: &'a CalendarSnapshot,
}

impl<'a> CalendarView<'a> {
    pub fn new(snapshot: &'a CalendarSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn events(&self) -> &'a [CalendarEvent] {
        &self.snapshot.events
    }

    /// First event by start time that has not yet ended.
    pub fn upcoming_event(&self, now: DateTime<Utc>) -> Option<&'a CalendarEvent> {
        self.events()
            .iter()
            .filter(|e| !e.has_ended(now))
            .min_by_key(|e| e.starts_at())
    }

    /// Events overlapping `[start, end)`, in start order.
    pub fn events_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&'a CalendarEvent> {
        let mut events: Vec<_> = self.events().iter().filter(|e| e.overlaps(start, end)).collect();
        events.sort_by_key(|e| e.starts_at());
        events
    }

    pub fn attributes(&self) -> CalendarAttributes {
        CalendarAttributes {
            authenticated: !self.snapshot.last_error.as_ref().is_some_and(|e| e.auth),
            municipality: self.snapshot.municipality,
            event_count: self.snapshot.events.len(),
        }
    }

    pub fn daily_schedule(&self, date: NaiveDate) -> DaySchedule<'a> {
        let mut events: Vec<_> = self.events().iter().filter(|e| e.start_date() == date).collect();
        events.sort_by_key(|e| e.starts_at());
        DaySchedule { date, events }
    }

    /// Tomorrow, or the coming Monday once the week's last daycare day has
    /// started.
    pub fn next_daycare_day(&self, today: NaiveDate) -> NextDaycareDay<'a> {
        let (days, label) = match today.weekday() {
            Weekday::Fri => (3, "Maanantai"),
            Weekday::Sat => (2, "Maanantai"),
            Weekday::Sun => (1, "Maanantai"),
            _ => (1, "Huomenna"),
        };
        NextDaycareDay {
            label,
            schedule: self.daily_schedule(today + Duration::days(days)),
        }
    }

    /// Fourteen days from Monday of the current week, empty days included.
    pub fn two_week_schedule(&self, today: NaiveDate) -> Vec<DaySchedule<'a>> {
        let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        (0..14)
            .map(|offset| self.daily_schedule(monday + Duration::days(offset)))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
