//! # smstrack
//!
//! `smstrack` tracks outbound short messages from submission through two
//! milestones, "sent" (handed to the carrier) and "delivered" (received by
//! the recipient), and guarantees the caller one terminal answer per
//! milestone even when the radio never confirms.
//!
//! ## Core Modules
//!
//! - `tracker`: the record table and the reconciliation engine that
//!   arbitrates between the authoritative callback, fallback timers and the
//!   periodic sweep.
//! - `notifier`: status events and the sinks that receive them.
//! - `submission`: message validation, the transmitter seam and radio result codes.
//! - `persistence`: a sled-backed history of emitted statuses.
//! - `transport`: the WebSocket server connecting devices and consumers.
//! - `client`: a connected WebSocket client.
//! - `config`: loading and validating settings.
//! - `utils`: error types and logging.

pub mod client;
pub mod config;
pub mod notifier;
pub mod persistence;
pub mod submission;
pub mod tracker;
pub mod transport;
pub mod utils;
