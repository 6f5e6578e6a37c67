use serde::{Deserialize, Serialize};

use crate::utils::error::SubmitError;

/// An outbound short message as handed to the radio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub message_id: String,
    pub phone_number: String,
    pub body: String,
    /// SIM subscription to send from; `None` uses the default SIM.
    pub subscription_id: Option<i32>,
}

impl OutboundMessage {
    pub fn new(
        message_id: impl Into<String>,
        phone_number: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            phone_number: phone_number.into(),
            body: body.into(),
            subscription_id: None,
        }
    }

    pub fn with_subscription(mut self, subscription_id: i32) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.message_id.trim().is_empty() {
            return Err(SubmitError::InvalidMessageId);
        }
        if self.phone_number.trim().is_empty() {
            return Err(SubmitError::InvalidNumber);
        }
        if self.body.trim().is_empty() {
            return Err(SubmitError::InvalidMessage);
        }
        Ok(())
    }

    pub fn segments(&self) -> usize {
        segment_count(&self.body)
    }
}

const GSM7_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";
const GSM7_EXTENSION: &str = "\u{c}^{}\\[~]|€";

/// Character encoding the carrier will pick for a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gsm7,
    Ucs2,
}

/// Encoding and size in encoding units (septets or UTF-16 code units).
pub fn measure(body: &str) -> (Encoding, usize) {
    let mut septets = 0;
    for c in body.chars() {
        if GSM7_BASIC.contains(c) {
            septets += 1;
        } else if GSM7_EXTENSION.contains(c) {
            septets += 2;
        } else {
            return (Encoding::Ucs2, body.encode_utf16().count());
        }
    }
    (Encoding::Gsm7, septets)
}

/// Number of PDUs the body is split into. Concatenated parts lose room to
/// the user data header: 160/153 septets for GSM-7, 70/67 units for UCS-2.
pub fn segment_count(body: &str) -> usize {
    let (encoding, units) = measure(body);
    let (single, multi) = match encoding {
        Encoding::Gsm7 => (160, 153),
        Encoding::Ucs2 => (70, 67),
    };
    if units <= single {
        1
    } else {
        units.div_ceil(multi)
    }
}
