use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::Helsinki;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::api::ApiError;

/// When an event happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTime {
    /// Whole days; `end` is exclusive.
    AllDay { start: NaiveDate, end: NaiveDate },
    Timed {
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub time: EventTime,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl CalendarEvent {
    pub fn is_all_day(&self) -> bool {
        matches!(self.time, EventTime::AllDay { .. })
    }

    /// Day the event starts on, in local (Helsinki) time
    pub fn start_date(&self) -> NaiveDate {
        match &self.time {
            EventTime::AllDay { start, .. } => *start,
            EventTime::Timed { start, .. } => start.with_timezone(&Helsinki).date_naive(),
        }
    }

    /// Start instant; all-day events start at local midnight.
    pub fn starts_at(&self) -> DateTime<Utc> {
        match &self.time {
            EventTime::AllDay { start, .. } => local_midnight(*start),
            EventTime::Timed { start, .. } => start.with_timezone(&Utc),
        }
    }

    /// End instant; all-day events end at local midnight after the last day.
    pub fn ends_at(&self) -> DateTime<Utc> {
        match &self.time {
            EventTime::AllDay { end, .. } => local_midnight(*end),
            EventTime::Timed { end, .. } => end.with_timezone(&Utc),
        }
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at() <= now
    }

    /// True if any part of the event falls inside `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let (event_start, event_end) = (self.starts_at(), self.ends_at());
        if event_start == event_end {
            return event_start >= start && event_start < end;
        }
        event_start < end && event_end > start
    }

    /// Local `HH:MM` start and end, `None` for all-day events
    pub fn time_range_label(&self) -> Option<(String, String)> {
        match &self.time {
            EventTime::AllDay { .. } => None,
            EventTime::Timed { start, end } => Some((
                start.with_timezone(&Helsinki).format("%H:%M").to_string(),
                end.with_timezone(&Helsinki).format("%H:%M").to_string(),
            )),
        }
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    Helsinki
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

// ============================================================================
// Parsing
// ============================================================================

/// A calendar record as the citizen API returns it. Everything is optional
/// here so that one bad record cannot fail the whole response.
#[derive(Debug, Deserialize)]
struct RawEvent {
    id: Option<Value>,
    title: Option<String>,
    description: Option<String>,
    location: Option<String>,
    period: Option<RawPeriod>,
    start: Option<String>,
    end: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPeriod {
    start: Option<String>,
    end: Option<String>,
}

/// A record that could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedEvents {
    pub events: Vec<CalendarEvent>,
    pub skipped: Vec<SkippedRecord>,
}

/// Parse a calendar-events response body.
///
/// The body must be a JSON array. Records missing a title or start, or with
/// times that do not parse, are skipped and reported rather than failing the
/// whole response.
pub fn parse_events(body: &Value) -> Result<ParsedEvents, ApiError> {
    let records = body.as_array().ok_or_else(|| {
        ApiError::MalformedResponse(format!(
            "expected an array of calendar events, got {}",
            json_kind(body)
        ))
    })?;

    let mut parsed = ParsedEvents::default();
    for (index, record) in records.iter().enumerate() {
        match parse_record(record) {
            Ok(event) => parsed.events.push(event),
            Err(reason) => {
                let id = record.get("id").and_then(id_string);
                warn!(index, id = ?id, reason = %reason, "Skipping calendar record");
                parsed.skipped.push(SkippedRecord { index, id, reason });
            }
        }
    }

    parsed.events.sort_by_key(|e| e.starts_at());
    Ok(parsed)
}

fn parse_record(record: &Value) -> Result<CalendarEvent, String> {
    let raw: RawEvent =
        serde_json::from_value(record.clone()).map_err(|e| format!("invalid record: {e}"))?;

    let title = non_empty(raw.title).ok_or("missing title")?;

    let (period_start, period_end) = match raw.period {
        Some(p) => (p.start, p.end),
        None => (None, None),
    };
    let start = non_empty(period_start.or(raw.start).or_else(|| raw.date.clone()))
        .ok_or("missing start")?;
    let end = non_empty(period_end.or(raw.end).or(raw.date)).unwrap_or_else(|| start.clone());

    let time = parse_time(&start, &end)?;

    let id = raw
        .id
        .as_ref()
        .and_then(id_string)
        .unwrap_or_else(|| format!("{start}:{title}"));

    Ok(CalendarEvent {
        id,
        title,
        time,
        description: non_empty(raw.description),
        location: non_empty(raw.location),
    })
}

fn parse_time(start: &str, end: &str) -> Result<EventTime, String> {
    if start.contains('T') {
        let start_dt = parse_instant(start)?;
        let end_dt = if end.contains('T') {
            parse_instant(end)?
        } else {
            return Err(format!("timed start {start} with date-only end {end}"));
        };
        if end_dt < start_dt {
            return Err(format!("end {end} before start {start}"));
        }
        Ok(EventTime::Timed {
            start: start_dt,
            end: end_dt,
        })
    } else {
        let start_date = parse_date(start)?;
        let last_day = parse_date(end)?;
        if last_day < start_date {
            return Err(format!("end {end} before start {start}"));
        }
        // The API's end date is inclusive
        Ok(EventTime::AllDay {
            start: start_date,
            end: last_day + Duration::days(1),
        })
    }
}

/// RFC 3339, or a local timestamp without offset (taken as Helsinki time).
fn parse_instant(s: &str) -> Result<DateTime<FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|e| format!("invalid timestamp {s}: {e}"))?;
    Helsinki
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| format!("nonexistent local time {s}"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // Tolerate a timestamp where a date was expected
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| format!("invalid date {s}: {e}"))
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================
