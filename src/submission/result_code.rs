//! Radio result codes as reported on the send and delivery callbacks.

use crate::tracker::record::{FailureReason, Outcome};

pub const RESULT_OK: i32 = -1;
pub const RESULT_ERROR_GENERIC_FAILURE: i32 = 1;
pub const RESULT_ERROR_RADIO_OFF: i32 = 2;
pub const RESULT_ERROR_NULL_PDU: i32 = 3;
pub const RESULT_ERROR_NO_SERVICE: i32 = 4;

pub fn sent_outcome(result_code: i32) -> Outcome {
    match result_code {
        RESULT_OK => Outcome::Confirmed,
        RESULT_ERROR_GENERIC_FAILURE => Outcome::Failed(FailureReason::GenericFailure),
        RESULT_ERROR_RADIO_OFF => Outcome::Failed(FailureReason::RadioOff),
        RESULT_ERROR_NULL_PDU => Outcome::Failed(FailureReason::NullPdu),
        RESULT_ERROR_NO_SERVICE => Outcome::Failed(FailureReason::NoService),
        _ => Outcome::Failed(FailureReason::Unknown),
    }
}

pub fn delivered_outcome(result_code: i32) -> Outcome {
    match result_code {
        RESULT_OK => Outcome::Confirmed,
        _ => Outcome::Failed(FailureReason::NotDelivered),
    }
}
