use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use tracing::{debug, warn};

use crate::notifier::{Notifier, StatusEvent};
use crate::tracker::Milestone;
use crate::utils::error::StoreError;

const STATUS_TREE: &str = "statuses";

/// Last event seen for each milestone of one message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredStatus {
    pub message_id: String,
    pub sent: Option<StatusEvent>,
    pub delivered: Option<StatusEvent>,
    /// Unix seconds of the last write.
    pub updated_at: i64,
}

#[derive(Clone)]
pub struct StatusStore {
    db: Db,
    statuses: Tree,
    ttl_seconds: Option<i64>,
}

impl StatusStore {
    pub fn open(path: &str, ttl_seconds: Option<i64>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let statuses = db.open_tree(STATUS_TREE)?;
        Ok(Self {
            db,
            statuses,
            ttl_seconds,
        })
    }

    pub fn record(&self, event: &StatusEvent) -> Result<(), StoreError> {
        let key = event.message_id.as_bytes();
        let mut status = match self.statuses.get(key)? {
            Some(raw) => serde_json::from_slice::<StoredStatus>(&raw)?,
            None => StoredStatus {
                message_id: event.message_id.clone(),
                sent: None,
                delivered: None,
                updated_at: 0,
            },
        };
        match event.milestone {
            Milestone::Sent => status.sent = Some(event.clone()),
            Milestone::Delivered => status.delivered = Some(event.clone()),
        }
        status.updated_at = Utc::now().timestamp();

        self.statuses.insert(key, serde_json::to_vec(&status)?)?;
        Ok(())
    }

    /// Returns the stored status unless it has outlived the TTL, in which
    /// case it is removed.
    pub fn load(&self, message_id: &str) -> Result<Option<StoredStatus>, StoreError> {
        self.load_at(message_id, Utc::now().timestamp())
    }

    /// [`load`](Self::load) with the TTL judged against `now` (Unix seconds).
    pub fn load_at(&self, message_id: &str, now: i64) -> Result<Option<StoredStatus>, StoreError> {
        let Some(raw) = self.statuses.get(message_id.as_bytes())? else {
            return Ok(None);
        };
        let status: StoredStatus = serde_json::from_slice(&raw)?;
        if self.is_expired(&status, now) {
            self.statuses.remove(message_id.as_bytes())?;
            return Ok(None);
        }
        Ok(Some(status))
    }

    /// Drops every expired entry and returns how many went.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        self.purge_expired_at(Utc::now().timestamp())
    }

    pub fn purge_expired_at(&self, now: i64) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in self.statuses.iter() {
            let (key, raw) = entry?;
            let expired = match serde_json::from_slice::<StoredStatus>(&raw) {
                Ok(status) => self.is_expired(&status, now),
                // unreadable entries are treated as garbage
                Err(_) => true,
            };
            if expired {
                self.statuses.remove(key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Purged {removed} expired status entries");
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn is_expired(&self, status: &StoredStatus, now: i64) -> bool {
        match self.ttl_seconds {
            Some(ttl) => status.updated_at < now - ttl,
            None => false,
        }
    }
}

impl Notifier for StatusStore {
    fn notify(&self, event: &StatusEvent) {
        if let Err(e) = self.record(event) {
            warn!(
                "Failed to record {} status for {}: {e}",
                event.milestone, event.message_id
            );
        }
    }
}

impl std::fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusStore")
            .field("db", &"sled::Db")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}
