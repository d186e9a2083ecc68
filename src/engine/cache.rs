//! engine::cache
//!
//! Records which objects have already been applied to which refs.
//!
//! After a batch succeeds, the orchestrator stores one key per applied
//! object id and ref. Upstream replication uses the recorded timestamp to
//! skip events it has already delivered.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{ObjectId, RefName, RepositoryId};

/// Identity of one applied object on one ref.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub object_id: ObjectId,
    pub ref_name: RefName,
    pub repository: RepositoryId,
}

impl IdempotencyKey {
    pub fn new(object_id: ObjectId, ref_name: RefName, repository: RepositoryId) -> Self {
        Self {
            object_id,
            ref_name,
            repository,
        }
    }
}

/// Store of applied keys and the event timestamp they were applied for.
pub trait IdempotencyCache: Send + Sync {
    /// Record `key`, replacing any earlier timestamp.
    fn put(&self, key: IdempotencyKey, applied_at: DateTime<Utc>);

    fn get(&self, key: &IdempotencyKey) -> Option<DateTime<Utc>>;

    fn contains(&self, key: &IdempotencyKey) -> bool {
        self.get(key).is_some()
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<IdempotencyKey, DateTime<Utc>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every recorded key.
    pub fn keys(&self) -> Vec<IdempotencyKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

impl IdempotencyCache for MemoryCache {
    fn put(&self, key: IdempotencyKey, applied_at: DateTime<Utc>) {
        self.entries.insert(key, applied_at);
    }

    fn get(&self, key: &IdempotencyKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|e| *e.value())
    }
}
