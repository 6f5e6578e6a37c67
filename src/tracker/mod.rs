//! The `tracker` module is the status-reconciliation core.
//!
//! - `record`: the per-message state container and outcome types.
//! - `table`: the concurrent id → record map.
//! - `engine`: the arbitration logic, timers and sweep loop.

pub mod engine;
pub mod record;
pub mod table;

pub use engine::{Source, SweepReport, Tracker};
pub use record::{FailureReason, MessageId, MessageRecord, Milestone, Outcome, RecordSnapshot};
pub use table::TrackerTable;
