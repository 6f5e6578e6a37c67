//! The `client` module defines a connection to the status service.
//!
//! A connection is either the device that owns the radio (it receives
//! `transmit` requests and reports results) or a consumer that wants status
//! events. Every connection starts as a consumer.

pub mod connection;
pub use connection::{Client, ClientRole};
