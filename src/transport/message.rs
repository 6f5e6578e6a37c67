use serde::{Deserialize, Serialize};

use crate::client::ClientRole;
use crate::notifier::StatusEvent;
use crate::persistence::StoredStatus;
use crate::tracker::Outcome;

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        role: ClientRole,
    },
    Submit {
        message_id: Option<String>,
        phone_number: String,
        body: String,
        subscription_id: Option<i32>,
    },
    SentResult {
        message_id: Option<String>,
        result_code: i32,
    },
    DeliveredResult {
        message_id: Option<String>,
        result_code: i32,
    },
    Status {
        message_id: String,
    },
}

/// Where a status report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Live,
    History,
    Unknown,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        client_id: String,
        role: ClientRole,
    },
    Ack {
        message_id: String,
        segments: usize,
    },
    Error {
        code: String,
        message: String,
    },
    Transmit {
        message_id: String,
        phone_number: String,
        body: String,
        subscription_id: Option<i32>,
    },
    StatusEvent(StatusEvent),
    StatusReport {
        message_id: String,
        source: StatusSource,
        sent: Option<Outcome>,
        delivered: Option<Outcome>,
        history: Option<StoredStatus>,
    },
}
