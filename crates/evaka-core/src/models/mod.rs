//! Data models for eVaka entities.
//!
//! - `CalendarEvent`, `EventTime`: normalized daycare calendar events
//! - `Municipality`, `MunicipalityEndpoint`: supported portals and their URLs

pub mod event;
pub mod municipality;

pub use event::{parse_events, CalendarEvent, EventTime, ParsedEvents, SkippedRecord};
pub use municipality::{Municipality, MunicipalityEndpoint};
