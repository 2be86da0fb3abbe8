use chrono::{Datelike, NaiveDate, Weekday};

/// Finnish day names, Monday first
pub const WEEKDAYS_FI: [&str; 7] = [
    "Maanantai",
    "Tiistai",
    "Keskiviikko",
    "Torstai",
    "Perjantai",
    "Lauantai",
    "Sunnuntai",
];

/// Two-letter Finnish day abbreviations, Monday first
pub const WEEKDAYS_FI_SHORT: [&str; 7] = ["Ma", "Ti", "Ke", "To", "Pe", "La", "Su"];

pub fn weekday_fi(day: Weekday) -> &'static str {
    WEEKDAYS_FI[day.num_days_from_monday() as usize]
}

pub fn weekday_fi_short(day: Weekday) -> &'static str {
    WEEKDAYS_FI_SHORT[day.num_days_from_monday() as usize]
}

/// Format a date as `Maanantai, 02.06.2025`
pub fn format_date_fi(date: NaiveDate) -> String {
    format!("{}, {}", weekday_fi(date.weekday()), date.format("%d.%m.%Y"))
}

/// Keep at most `max_chars` characters. Small displays cut titles short
/// without an ellipsis.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
