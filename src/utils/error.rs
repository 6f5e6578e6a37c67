//! The `error` module defines the error types used within `smstrack`.
//!
//! Only the synchronous boundaries surface errors: submission, configuration
//! loading and the status store. Failures inside a completion source are
//! logged where they happen and never reach these types.

use thiserror::Error;

/// Faults raised by the tracker table itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("message id '{0}' is already being tracked")]
    DuplicateMessageId(String),
    #[error("tracker has been shut down")]
    ShutDown,
}

/// Faults the radio side reports when asked to transmit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransmitError {
    #[error("no device is connected to transmit messages")]
    NoDevice,
    #[error("device channel closed")]
    ChannelClosed,
}

/// Reasons a submission is refused. No record survives any of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("message id cannot be empty")]
    InvalidMessageId,
    #[error("phone number cannot be empty")]
    InvalidNumber,
    #[error("message cannot be empty")]
    InvalidMessage,
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Transmit(#[from] TransmitError),
}

impl SubmitError {
    /// Stable code reported to clients over the wire.
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::InvalidMessageId => "INVALID_MESSAGE_ID",
            SubmitError::InvalidNumber => "INVALID_NUMBER",
            SubmitError::InvalidMessage => "INVALID_MESSAGE",
            SubmitError::Tracker(TrackerError::DuplicateMessageId(_)) => "DUPLICATE_MESSAGE_ID",
            SubmitError::Tracker(TrackerError::ShutDown) => "SHUTTING_DOWN",
            SubmitError::Transmit(_) => "SEND_FAILED",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("status store: {0}")]
    Sled(#[from] sled::Error),
    #[error("status store codec: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("tracker timeouts must satisfy {0}")]
    TimeoutOrdering(&'static str),
}
