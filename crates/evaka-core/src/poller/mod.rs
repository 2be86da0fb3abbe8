//! Periodic refresh of one account's calendar and the snapshot the host reads.

pub mod scheduler;
pub mod snapshot;

pub use scheduler::{EventSource, PollerHandle, PollingScheduler, POLL_INTERVAL};
pub use snapshot::{CalendarSnapshot, CycleError, PollState};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollerError {
    #[error("Calendar poller is not running")]
    Stopped,

    #[error("Calendar poller task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
