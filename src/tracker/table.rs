use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::tracker::record::{MessageId, MessageRecord};
use crate::utils::error::TrackerError;

pub type RecordHandle = Arc<Mutex<MessageRecord>>;

/// Locks a record, recovering the guard if a previous holder panicked.
///
/// Every field group on a record is only ever written under this lock, so a
/// poisoned guard still holds a consistent record.
pub fn lock_record(handle: &RecordHandle) -> MutexGuard<'_, MessageRecord> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Concurrent map from message id to its record.
///
/// The map itself is sharded; callers take a record's own mutex for any
/// read-modify-write. Lock order is always record first, then map shard, and
/// no shard guard is held while a record is locked by this type.
#[derive(Debug, Default)]
pub struct TrackerTable {
    records: DashMap<MessageId, RecordHandle>,
}

impl TrackerTable {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Inserts a fresh record. Fails if the id is already live.
    pub fn insert(&self, record: MessageRecord) -> Result<RecordHandle, TrackerError> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(entry) => Err(TrackerError::DuplicateMessageId(entry.key().clone())),
            Entry::Vacant(entry) => {
                let handle = Arc::new(Mutex::new(record));
                entry.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    /// Returns the live record for `id`. `None` is the normal outcome for a
    /// record that was already finalized.
    pub fn lookup(&self, id: &str) -> Option<RecordHandle> {
        self.records.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes `id` only if it still maps to `handle`, so a late remover can
    /// never evict a newer record registered under the same id.
    pub fn remove(&self, id: &str, handle: &RecordHandle) -> bool {
        self.records
            .remove_if(id, |_, current| Arc::ptr_eq(current, handle))
            .is_some()
    }

    /// Detaches the locked `record` and removes it from the table if `handle`
    /// is still its live entry. Every removal path goes through here so that
    /// a source waiting on the record lock sees the removal once it gets in.
    pub fn evict(&self, record: &mut MessageRecord, handle: &RecordHandle) -> bool {
        record.detach();
        self.remove(&record.id, handle)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Copies out every live entry so callers can walk the table without
    /// holding any shard lock.
    pub fn entries(&self) -> Vec<(MessageId, RecordHandle)> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}
