use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::submission::message::OutboundMessage;
use crate::submission::result_code;
use crate::tracker::{Milestone, Tracker};
use crate::utils::error::{SubmitError, TransmitError};

/// The radio side: actually hands a message to the carrier.
///
/// Confirmations come back later through [`Gateway::report_sent`] and
/// [`Gateway::report_delivered`], or never.
pub trait Transmitter: Send + Sync {
    fn transmit(&self, message: &OutboundMessage) -> Result<(), TransmitError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub message_id: String,
    pub segments: usize,
}

/// Inbound boundary between the transport and the tracker.
pub struct Gateway {
    tracker: Arc<Tracker>,
    transmitter: Arc<dyn Transmitter>,
}

impl Gateway {
    pub fn new(tracker: Arc<Tracker>, transmitter: Arc<dyn Transmitter>) -> Self {
        Self {
            tracker,
            transmitter,
        }
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    /// Validates, starts tracking and transmits. Any error leaves no record
    /// behind and nothing is retried.
    pub fn submit(&self, message: &OutboundMessage) -> Result<SubmitAck, SubmitError> {
        message.validate()?;
        self.tracker.register(&message.message_id)?;

        if let Err(err) = self.transmitter.transmit(message) {
            self.tracker.withdraw(&message.message_id);
            warn!("Failed to send message {}: {err}", message.message_id);
            return Err(err.into());
        }

        let segments = message.segments();
        debug!(
            "Submitted message {} ({segments} part(s))",
            message.message_id
        );
        Ok(SubmitAck {
            message_id: message.message_id.clone(),
            segments,
        })
    }

    /// Send callback from the radio; one arrives per part of a multipart
    /// message, all under the same id.
    pub fn report_sent(&self, message_id: Option<&str>, result_code: i32) -> bool {
        debug!("Sent report for {message_id:?}, resultCode: {result_code}");
        self.tracker.on_authoritative_result(
            message_id,
            Milestone::Sent,
            result_code::sent_outcome(result_code),
        )
    }

    pub fn report_delivered(&self, message_id: Option<&str>, result_code: i32) -> bool {
        debug!("Delivered report for {message_id:?}, resultCode: {result_code}");
        self.tracker.on_authoritative_result(
            message_id,
            Milestone::Delivered,
            result_code::delivered_outcome(result_code),
        )
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("tracker", &self.tracker)
            .finish()
    }
}
