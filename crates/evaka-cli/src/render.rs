//! Plain-text rendering of snapshots for the terminal.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use evaka_core::calendar::view::NO_EVENTS_FI;
use evaka_core::utils::truncate_string;
use evaka_core::{CalendarEvent, CalendarSnapshot, EventTime};

use crate::cache::age_display;

const DESCRIPTION_WIDTH: usize = 72;

/// One status line: freshness, or why the last refresh failed.
pub fn status_line(snapshot: &CalendarSnapshot, now: DateTime<Utc>) -> String {
    let name = snapshot.municipality.display_name();
    let age = snapshot
        .last_success
        .map(|at| age_display((now - at).num_minutes()));

    match (&snapshot.last_error, age) {
        (None, None) => format!("{name}: waiting for first refresh"),
        (None, Some(age)) => {
            let mut line = format!("{name}: {} events, updated {age}", snapshot.events.len());
            if snapshot.skipped > 0 {
                line.push_str(&format!(" ({} unreadable records skipped)", snapshot.skipped));
            }
            line
        }
        (Some(error), None) => format!("{name}: refresh failed [{}]: {}", error.kind, error.message),
        (Some(error), Some(age)) => format!(
            "{name}: refresh failed [{}]: {}; showing {} events from {age}",
            error.kind,
            error.message,
            snapshot.events.len()
        ),
    }
}

/// `02.06.2025 09:00-09:15  Title`, or a date range for all-day events
pub fn event_line(event: &CalendarEvent) -> String {
    let when = match &event.time {
        EventTime::AllDay { start, end } => {
            let last_day = *end - Duration::days(1);
            if last_day > *start {
                format!("{}-{}", start.format("%d.%m."), last_day.format("%d.%m.%Y"))
            } else {
                start.format("%d.%m.%Y").to_string()
            }
        }
        EventTime::Timed { .. } => {
            let (start, end) = event.time_range_label().unwrap_or_default();
            format!("{} {start}-{end}", event.start_date().format("%d.%m.%Y"))
        }
    };
    format!("{when:<22}{}", event.title)
}

pub fn events_listing(snapshot: &CalendarSnapshot) -> String {
    if snapshot.events.is_empty() {
        return NO_EVENTS_FI.to_string();
    }
    let mut lines = Vec::new();
    for event in &snapshot.events {
        lines.push(event_line(event));
        if let Some(location) = &event.location {
            lines.push(format!("    @ {location}"));
        }
        if let Some(description) = &event.description {
            lines.push(format!("    {}", truncate_string(description, DESCRIPTION_WIDTH)));
        }
    }
    lines.join("\n")
}

pub fn today_text(snapshot: &CalendarSnapshot, today: NaiveDate) -> String {
    snapshot.view().daily_schedule(today).summary()
}

/// Next daycare day in full, then two weeks one line per day.
pub fn week_text(snapshot: &CalendarSnapshot, today: NaiveDate) -> String {
    let view = snapshot.view();
    let next = view.next_daycare_day(today);

    let mut out = format!("{}:\n{}\n", next.label, next.schedule.summary());
    for week in view.two_week_schedule(today).chunks(7) {
        if let Some(first) = week.first() {
            out.push_str(&format!("\nViikko {}\n", first.date.iso_week().week()));
        }
        for day in week {
            out.push_str(&day.short_line());
            out.push('\n');
        }
    }
    out
}
