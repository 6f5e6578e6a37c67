use serde::{Deserialize, Serialize};

use crate::tracker::record::{Milestone, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Succeeded,
    Failed,
}

/// One accepted resolution, as seen by the external consumer.
///
/// # Fields
///
/// - `milestone` - Which checkpoint resolved.
/// - `message_id` - The caller-supplied message identifier.
/// - `status` - `succeeded` or `failed`.
/// - `reason` - Human-readable failure reason, only set on failure.
/// - `forced` - Whether a timer or the sweep supplied the outcome.
/// - `timestamp` - Unix time in milliseconds when the resolution was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub milestone: Milestone,
    pub message_id: String,
    pub status: EventStatus,
    pub reason: Option<String>,
    pub forced: bool,
    pub timestamp: i64,
}

impl StatusEvent {
    pub fn from_outcome(milestone: Milestone, message_id: &str, outcome: Outcome) -> Self {
        let status = if outcome.is_success() {
            EventStatus::Succeeded
        } else {
            EventStatus::Failed
        };
        Self {
            milestone,
            message_id: message_id.to_string(),
            status,
            reason: outcome.reason().map(|r| r.as_str().to_string()),
            forced: outcome.is_forced(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
