//! Reconciliation engine
//!
//! This module owns the per-message state machine that turns racing
//! completion sources into exactly one notification per milestone:
//! - the authoritative callback, driven by the radio transport
//! - the aggressive timer, armed at registration, forcing "sent"
//! - the delivery timer, armed once "sent" succeeds, forcing "delivered"
//! - the sweep loop, a periodic safety net and staleness backstop
//!
//! Concurrency and usage notes:
//! - Every source funnels into [`Tracker::attempt_resolve`]. The check of the
//!   notified flag, the write of the outcome and the call to the notifier all
//!   happen under the record's own mutex, so two sources can never both emit.
//! - Timers hold only a `Weak` reference to the tracker. Dropping the tracker
//!   or calling [`Tracker::shutdown`] guarantees no event fires afterwards.
//! - Timer tasks are aborted once their milestone resolves; a timer that
//!   fires anyway finds the milestone notified and does nothing.
//! - Timers and the sweep resolve the record they were handed, never a
//!   lookup by id. Removal marks the record detached under its lock, so a
//!   source that was already waiting on that lock is refused.
//! - All methods that arm timers must run inside a Tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TrackerSettings;
use crate::notifier::{Notifier, StatusEvent};
use crate::tracker::record::{MessageRecord, Milestone, Outcome, RecordSnapshot};
use crate::tracker::table::{RecordHandle, TrackerTable, lock_record};
use crate::utils::error::TrackerError;

/// Which completion source produced a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Authoritative,
    AggressiveTimer,
    DeliveryTimer,
    Sweep,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Authoritative => "authoritative",
            Source::AggressiveTimer => "aggressive-timer",
            Source::DeliveryTimer => "delivery-timer",
            Source::Sweep => "sweep",
        }
    }
}

/// Counts from one pass of the sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub forced_sent: usize,
    pub evicted: usize,
}

pub struct Tracker {
    table: TrackerTable,
    notifier: Arc<dyn Notifier>,
    settings: TrackerSettings,
    closed: AtomicBool,
}

impl Tracker {
    pub fn new(settings: TrackerSettings, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Arc::new(Self {
            table: TrackerTable::new(),
            notifier,
            settings,
            closed: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.table.contains(id)
    }

    pub fn snapshot(&self, id: &str) -> Option<RecordSnapshot> {
        let handle = self.table.lookup(id)?;
        let record = lock_record(&handle);
        Some(record.snapshot(Instant::now()))
    }

    /// Starts tracking `id` and arms its aggressive timer.
    pub fn register(self: &Arc<Self>, id: &str) -> Result<(), TrackerError> {
        if self.is_closed() {
            return Err(TrackerError::ShutDown);
        }

        let handle = self.table.insert(MessageRecord::new(id, Instant::now()))?;
        let mut record = lock_record(&handle);
        // another source may have resolved or removed it before we got the lock
        if !record.is_removed() && !record.sent_notified {
            let timer = self.arm_timer(
                &handle,
                Milestone::Sent,
                self.settings.aggressive_sent_timeout(),
                Source::AggressiveTimer,
            );
            record.set_timer(Milestone::Sent, timer);
        }
        debug!("Tracking message {id}");
        Ok(())
    }

    /// Stops tracking `id` without emitting anything. Used when transmission
    /// is refused right after registration.
    pub fn withdraw(&self, id: &str) -> bool {
        let Some(handle) = self.table.lookup(id) else {
            return false;
        };
        let mut record = lock_record(&handle);
        self.table.evict(&mut record, &handle)
    }

    /// The single admission gate for every completion source. Returns whether
    /// this call's outcome was the one accepted.
    pub fn attempt_resolve(
        self: &Arc<Self>,
        id: &str,
        milestone: Milestone,
        outcome: Outcome,
        source: Source,
    ) -> bool {
        let Some(handle) = self.table.lookup(id) else {
            debug!(
                "{} resolution of {milestone} for {id} ignored: not tracked",
                source.as_str()
            );
            return false;
        };
        self.resolve(&handle, milestone, outcome, source)
    }

    fn resolve(
        self: &Arc<Self>,
        handle: &RecordHandle,
        milestone: Milestone,
        outcome: Outcome,
        source: Source,
    ) -> bool {
        let mut record = lock_record(handle);
        // checked under the record lock so shutdown cannot interleave
        if self.is_closed() {
            return false;
        }
        let id = record.id.clone();
        if !record.admit(milestone, outcome) {
            debug!(
                "{} resolution of {milestone} for {id} ignored: already resolved or removed",
                source.as_str()
            );
            return false;
        }
        record.cancel_timer(milestone);

        if outcome.is_forced() {
            warn!(
                "{} timeout for message {id} - assuming {milestone}",
                source.as_str()
            );
        } else {
            info!("Message {id} {milestone}: {outcome:?}");
        }
        self.notifier
            .notify(&StatusEvent::from_outcome(milestone, &id, outcome));

        match (milestone, outcome.is_success()) {
            (Milestone::Sent, true) => {
                let timer = self.arm_timer(
                    handle,
                    Milestone::Delivered,
                    self.settings.delivery_timeout(),
                    Source::DeliveryTimer,
                );
                record.set_timer(Milestone::Delivered, timer);
            }
            (Milestone::Sent, false) | (Milestone::Delivered, _) => {
                self.table.evict(&mut record, handle);
            }
        }
        true
    }

    /// Entry point for genuine confirmations from the transport.
    ///
    /// A confirmation without an id, or for an id that is no longer tracked,
    /// is logged and dropped. A delivery report that overtakes its own send
    /// report confirms "sent" first, since delivery implies the carrier took it.
    pub fn on_authoritative_result(
        self: &Arc<Self>,
        id: Option<&str>,
        milestone: Milestone,
        outcome: Outcome,
    ) -> bool {
        let id = match id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => {
                warn!("Dropping {milestone} confirmation without a message id");
                return false;
            }
        };
        let Some(handle) = self.table.lookup(id) else {
            warn!("Dropping {milestone} confirmation for unknown message {id}");
            return false;
        };

        if milestone == Milestone::Delivered {
            let sent_open = !lock_record(&handle).sent_notified;
            if sent_open {
                self.resolve(&handle, Milestone::Sent, Outcome::Confirmed, Source::Authoritative);
            }
        }
        self.resolve(&handle, milestone, outcome, Source::Authoritative)
    }

    /// One pass over the table: forces overdue "sent" milestones and evicts
    /// records past the stale threshold, notified or not.
    pub fn sweep(self: &Arc<Self>, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let forced_after = self.settings.sweep_forced_sent_threshold();
        let stale_after = self.settings.stale_record_threshold();

        for (id, handle) in self.table.entries() {
            if self.is_closed() {
                break;
            }
            let (age, sent_open) = {
                let record = lock_record(&handle);
                (record.age(now), !record.sent_notified)
            };

            if sent_open
                && age > forced_after
                && self.resolve(&handle, Milestone::Sent, Outcome::Forced, Source::Sweep)
            {
                report.forced_sent += 1;
            }

            if age > stale_after {
                let mut record = lock_record(&handle);
                if self.table.evict(&mut record, &handle) {
                    warn!("Removing stale tracker: {id}");
                    report.evicted += 1;
                }
            }
        }
        report
    }

    /// Runs the sweep on `sweep_period` until the tracker is shut down or
    /// dropped.
    pub async fn start_sweep_loop(tracker: Arc<Tracker>) {
        let period = tracker.settings.sweep_period();
        let tracker = Arc::downgrade(&tracker);
        loop {
            tokio::time::sleep(period).await;

            let Some(tracker) = tracker.upgrade() else {
                break;
            };
            if tracker.is_closed() {
                break;
            }
            let report = tracker.sweep(Instant::now());
            if report != SweepReport::default() {
                debug!(
                    "Sweep forced {} sent, evicted {} stale",
                    report.forced_sent, report.evicted
                );
            }
        }
        debug!("Sweep loop stopped");
    }

    pub fn spawn_sweep_loop(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Self::start_sweep_loop(Arc::clone(self)))
    }

    /// Closes the engine: later resolutions are no-ops, timers are aborted
    /// and every record is dropped without notification.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for (_, handle) in self.table.entries() {
            lock_record(&handle).detach();
        }
        self.table.clear();
        info!("Tracker shut down");
    }

    /// Spawns a one-shot timer bound to this exact record. Once the record
    /// is dropped from the table the timer has nothing left to resolve, even
    /// if a newer record reuses the id.
    fn arm_timer(
        self: &Arc<Self>,
        handle: &RecordHandle,
        milestone: Milestone,
        delay: Duration,
        source: Source,
    ) -> AbortHandle {
        let tracker: Weak<Tracker> = Arc::downgrade(self);
        let record = Arc::downgrade(handle);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let (Some(tracker), Some(record)) = (tracker.upgrade(), record.upgrade()) {
                tracker.resolve(&record, milestone, Outcome::Forced, source);
            }
        })
        .abort_handle()
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &TrackerTable {
        &self.table
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("records", &self.table.len())
            .field("settings", &self.settings)
            .field("closed", &self.is_closed())
            .finish()
    }
}
