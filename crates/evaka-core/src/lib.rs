//! evaka-core - calendar client for the eVaka daycare portal.
//!
//! Logs in with username and password ("weak login"), keeps the resulting
//! session cookie alive across requests, re-authenticates exactly once when
//! the server rejects the session, and polls the citizen calendar-events
//! endpoint on an hourly cadence.
//!
//! The host talks to [`setup::connect`] once and then to a
//! [`poller::PollerHandle`] for snapshots.

pub mod api;
pub mod auth;
pub mod calendar;
pub mod models;
pub mod poller;
pub mod setup;
pub mod utils;

pub use api::ApiError;
pub use calendar::{CalendarFetcher, CalendarView, EventWindow};
pub use models::{CalendarEvent, EventTime, Municipality};
pub use poller::{CalendarSnapshot, PollState, PollerHandle, PollingScheduler};
pub use setup::{connect, from_stored, SetupError};
