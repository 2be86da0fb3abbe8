//! Calendar retrieval and the host-facing views over fetched events.

pub mod fetcher;
pub mod view;

pub use fetcher::{local_today, CalendarFetcher, EventWindow, FetchOutcome};
pub use view::{CalendarAttributes, CalendarView, DaySchedule, NextDaycareDay};
