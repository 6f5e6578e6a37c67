//! The `transport` module handles network communication with devices and
//! consumers over WebSockets.
//!
//! It defines the JSON protocol, the `Hub` of live connections (which doubles
//! as the consumer notifier and the device relay) and the server itself.

pub mod hub;
pub mod message;
pub mod websocket;

pub use hub::{DeviceRelay, Hub};

#[cfg(test)]
mod tests;

#[cfg(test)]
mod websocket_tests;
