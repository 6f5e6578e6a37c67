//! The `submission` module is the inbound boundary with the radio transport.
//!
//! It validates outbound messages, registers them with the tracker, asks a
//! [`Transmitter`] to send them, and turns raw radio result codes into
//! outcomes for the reconciliation engine.

pub mod gateway;
pub mod message;
pub mod result_code;

pub use gateway::{Gateway, SubmitAck, Transmitter};
pub use message::{OutboundMessage, segment_count};
