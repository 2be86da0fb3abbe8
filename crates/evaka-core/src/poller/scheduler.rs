use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::calendar::{CalendarFetcher, FetchOutcome};

use super::snapshot::{CalendarSnapshot, PollState};
use super::PollerError;

/// Fixed refresh cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Something that can produce one fetch cycle's worth of events.
#[async_trait]
pub trait EventSource: Send {
    async fn fetch(&mut self) -> Result<FetchOutcome, ApiError>;
}

#[async_trait]
impl EventSource for CalendarFetcher {
    async fn fetch(&mut self) -> Result<FetchOutcome, ApiError> {
        self.fetch_events().await
    }
}

/// Commands the handle can send to the running poller
enum PollerCommand {
    RefreshNow(oneshot::Sender<CalendarSnapshot>),
}

/// Runs fetch cycles for one account on a single task.
///
/// The first cycle starts immediately, then one per interval. A cycle always
/// runs to completion (or cancellation) before a command or the next tick is
/// looked at, so cycles never overlap.
pub struct PollingScheduler<S> {
    source: S,
    interval: Duration,
    snapshot_tx: watch::Sender<CalendarSnapshot>,
    command_rx: mpsc::Receiver<PollerCommand>,
    cancel: CancellationToken,
}

impl<S: EventSource + 'static> PollingScheduler<S> {
    /// Spawn the poller and return the handle the host keeps.
    pub fn spawn(source: S, initial: CalendarSnapshot) -> PollerHandle {
        Self::spawn_with_interval(source, initial, POLL_INTERVAL)
    }

    pub fn spawn_with_interval(source: S, initial: CalendarSnapshot, interval: Duration) -> PollerHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let scheduler = Self {
            source,
            interval,
            snapshot_tx,
            command_rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(scheduler.run());

        PollerHandle {
            snapshot_rx,
            command_tx,
            cancel,
            task,
        }
    }

    async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Calendar poller started");
        let mut next_tick = Instant::now();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep_until(next_tick) => {
                    if !self.run_cycle().await {
                        break;
                    }
                    next_tick = Instant::now() + self.interval;
                }
                command = self.command_rx.recv() => match command {
                    Some(PollerCommand::RefreshNow(reply)) => {
                        debug!("Manual refresh requested");
                        if !self.run_cycle().await {
                            break;
                        }
                        next_tick = Instant::now() + self.interval;
                        let _ = reply.send(self.snapshot_tx.borrow().clone());
                    }
                    // Every handle is gone
                    None => break,
                },
            }
        }

        info!("Calendar poller stopped");
    }

    /// Run one cycle. Returns false if shutdown interrupted it.
    async fn run_cycle(&mut self) -> bool {
        self.snapshot_tx.send_modify(|s| s.state = PollState::Fetching);

        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("In-flight fetch cancelled");
                return false;
            }
            result = self.source.fetch() => result,
        };

        let now = Utc::now();
        match result {
            Ok(outcome) => {
                info!(
                    events = outcome.events.len(),
                    skipped = outcome.skipped.len(),
                    "Published calendar events"
                );
                self.snapshot_tx.send_modify(|s| s.publish(outcome, now));
            }
            Err(e) => {
                warn!(error = %e, kind = e.setup_error_key(), "Calendar refresh failed, keeping previous events");
                self.snapshot_tx.send_modify(|s| s.fail(&e, now));
            }
        }
        true
    }
}

/// The host's side of a running poller.
pub struct PollerHandle {
    snapshot_rx: watch::Receiver<CalendarSnapshot>,
    command_tx: mpsc::Sender<PollerCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Current events, or the last-known-good events plus the latest error
    pub fn snapshot(&self) -> CalendarSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<CalendarSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Run a cycle now and return the resulting snapshot. Waits for a cycle
    /// already in progress; the next scheduled tick moves to one interval
    /// after this refresh.
    pub async fn refresh_now(&self) -> Result<CalendarSnapshot, PollerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(PollerCommand::RefreshNow(reply_tx))
            .await
            .map_err(|_| PollerError::Stopped)?;
        reply_rx.await.map_err(|_| PollerError::Stopped)
    }

    /// Cancel any in-flight fetch and wait for the poller task to finish.
    pub async fn shutdown(self) -> Result<(), PollerError> {
        self.cancel.cancel();
        self.task.await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
