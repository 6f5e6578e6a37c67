//! The `persistence` module keeps a short history of emitted status events.
//!
//! Records leave the tracker table as soon as they are final, so the last
//! known status of a message is kept here for lookups after the fact. It is
//! a status ledger with a TTL, not a queue: nothing is ever replayed.
//!
//! It uses `sled` as an embedded key-value store.

pub mod status_store;

pub use status_store::{StatusStore, StoredStatus};
