use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tokio::time::Instant;

pub type MessageId = String;

/// One of the two lifecycle checkpoints tracked per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Sent,
    Delivered,
}

impl Milestone {
    pub fn as_str(self) -> &'static str {
        match self {
            Milestone::Sent => "sent",
            Milestone::Delivered => "delivered",
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a confirmed outcome was a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    GenericFailure,
    NoService,
    NullPdu,
    RadioOff,
    Unknown,
    NotDelivered,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::GenericFailure => "generic failure",
            FailureReason::NoService => "no service",
            FailureReason::NullPdu => "null pdu",
            FailureReason::RadioOff => "radio off",
            FailureReason::Unknown => "unknown error",
            FailureReason::NotDelivered => "not delivered",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolution for a single milestone.
///
/// `Forced` stands in for an authoritative answer that never came and is
/// always optimistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Confirmed,
    Failed(FailureReason),
    Forced,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }

    pub fn is_forced(self) -> bool {
        matches!(self, Outcome::Forced)
    }

    pub fn reason(self) -> Option<FailureReason> {
        match self {
            Outcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Per-message state container owned by the tracker table.
///
/// Each milestone is resolved at most once: `admit` is the only way to set
/// an outcome and it refuses once the milestone has been notified or the
/// record has left the table.
#[derive(Debug)]
pub struct MessageRecord {
    pub id: MessageId,
    pub created_at: Instant,
    pub sent: Option<Outcome>,
    pub delivered: Option<Outcome>,
    pub sent_notified: bool,
    pub delivered_notified: bool,
    removed: bool,
    sent_timer: Option<AbortHandle>,
    delivery_timer: Option<AbortHandle>,
}

impl MessageRecord {
    pub fn new(id: impl Into<MessageId>, created_at: Instant) -> Self {
        Self {
            id: id.into(),
            created_at,
            sent: None,
            delivered: None,
            sent_notified: false,
            delivered_notified: false,
            removed: false,
            sent_timer: None,
            delivery_timer: None,
        }
    }

    pub fn outcome(&self, milestone: Milestone) -> Option<Outcome> {
        match milestone {
            Milestone::Sent => self.sent,
            Milestone::Delivered => self.delivered,
        }
    }

    pub fn is_notified(&self, milestone: Milestone) -> bool {
        match milestone {
            Milestone::Sent => self.sent_notified,
            Milestone::Delivered => self.delivered_notified,
        }
    }

    /// True once "sent" resolved to a confirmed or forced success.
    pub fn sent_succeeded(&self) -> bool {
        self.sent_notified && self.sent.is_some_and(Outcome::is_success)
    }

    /// Records `outcome` if the milestone is still open. Returns whether it was
    /// accepted; a refused call leaves the record untouched.
    pub fn admit(&mut self, milestone: Milestone, outcome: Outcome) -> bool {
        if self.removed || self.is_notified(milestone) {
            return false;
        }
        if milestone == Milestone::Delivered && !self.sent_succeeded() {
            return false;
        }
        match milestone {
            Milestone::Sent => {
                self.sent = Some(outcome);
                self.sent_notified = true;
            }
            Milestone::Delivered => {
                self.delivered = Some(outcome);
                self.delivered_notified = true;
            }
        }
        true
    }

    /// True once the record has been taken out of the table. A detached
    /// record never admits another outcome.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Aborts both timers and marks the record detached.
    pub(crate) fn detach(&mut self) {
        self.cancel_timers();
        self.removed = true;
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn is_terminal(&self) -> bool {
        match self.sent {
            Some(Outcome::Failed(_)) => self.sent_notified,
            _ => self.sent_notified && self.delivered_notified,
        }
    }

    /// Attaches the pending timer for `milestone`, aborting any previous one.
    pub(crate) fn set_timer(&mut self, milestone: Milestone, handle: AbortHandle) {
        let slot = match milestone {
            Milestone::Sent => &mut self.sent_timer,
            Milestone::Delivered => &mut self.delivery_timer,
        };
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    pub(crate) fn cancel_timer(&mut self, milestone: Milestone) {
        let slot = match milestone {
            Milestone::Sent => &mut self.sent_timer,
            Milestone::Delivered => &mut self.delivery_timer,
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    pub(crate) fn cancel_timers(&mut self) {
        self.cancel_timer(Milestone::Sent);
        self.cancel_timer(Milestone::Delivered);
    }

    pub fn snapshot(&self, now: Instant) -> RecordSnapshot {
        RecordSnapshot {
            id: self.id.clone(),
            sent: self.sent,
            delivered: self.delivered,
            age: self.age(now),
        }
    }
}

/// Point-in-time copy of a live record, detached from its lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSnapshot {
    pub id: MessageId,
    pub sent: Option<Outcome>,
    pub delivered: Option<Outcome>,
    pub age: Duration,
}
