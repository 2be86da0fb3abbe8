//! Utility functions for Finnish date labels and string shortening.

pub mod format;

pub use format::{format_date_fi, truncate_chars, truncate_string, weekday_fi, weekday_fi_short};
