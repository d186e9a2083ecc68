//! engine::insert
//!
//! Object insertion: writes a bundle's objects into a repository and
//! computes the ref target they realize.
//!
//! Objects are written blobs first, then the tree, then the commit, so a
//! stored commit never refers to content that is not yet stored. Writes are
//! content-addressed and not rolled back: objects stay in the store even if
//! the batch they belong to is later rejected. Re-inserting them on retry
//! yields the same ids.

use tracing::debug;

use super::ApplyError;
use crate::core::revision::{CommitObject, ObjectKind, RevisionBundle};
use crate::core::types::ObjectId;
use crate::git::ObjectStore;

/// Result of inserting one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedRevision {
    /// Object the ref should point at.
    pub target: ObjectId,
    /// Parsed commit header, for commit-bearing bundles.
    pub commit: Option<CommitObject>,
    /// Number of objects written.
    pub objects: usize,
}

impl InsertedRevision {
    pub fn is_commit(&self) -> bool {
        self.commit.is_some()
    }
}

/// Writes revision bundles into an object store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectInsertionEngine;

impl ObjectInsertionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Insert every object of `bundle` and flush the store.
    ///
    /// The target is the commit id for commit-bearing bundles, otherwise the
    /// last blob.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::InvalidRequest`] if the store computes a different id
    ///   than the one the object was received under
    /// - [`ApplyError::Storage`] if a write fails
    pub fn insert(
        &self,
        store: &dyn ObjectStore,
        bundle: RevisionBundle,
    ) -> Result<InsertedRevision, ApplyError> {
        let (objects, commit) = bundle.into_objects();
        let count = objects.len();
        let mut last_blob = None;
        let mut commit_id = None;

        for object in &objects {
            let stored = store.insert(object)?;
            if stored != object.id {
                return Err(ApplyError::InvalidRequest(format!(
                    "{} {} hashes to {}",
                    object.kind, object.id, stored
                )));
            }
            match object.kind {
                ObjectKind::Blob => last_blob = Some(stored),
                ObjectKind::Commit => commit_id = Some(stored),
                ObjectKind::Tree => {}
            }
        }

        store.flush()?;

        let target = commit_id.or(last_blob).ok_or_else(|| {
            ApplyError::InvalidRequest("revision bundle carries no target object".to_string())
        })?;
        debug!(target = %target, objects = count, "inserted revision");

        Ok(InsertedRevision {
            target,
            commit,
            objects: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::revision::RawObject;
    use crate::git::MemoryStore;

    fn commit_bundle(blob: &[u8]) -> (RevisionBundle, ObjectId) {
        let blob = RawObject::hashed(ObjectKind::Blob, blob.to_vec());
        let tree = RawObject::hashed(ObjectKind::Tree, Vec::new());
        let body = format!(
            "tree {}\nauthor A <a@example.com> 0 +0000\ncommitter A <a@example.com> 0 +0000\n\nm\n",
            tree.id
        );
        let commit = RawObject::hashed(ObjectKind::Commit, body.into_bytes());
        let id = commit.id.clone();
        (RevisionBundle::commit(commit, tree, vec![blob]).unwrap(), id)
    }

    #[test]
    fn commit_target() {
        let store = MemoryStore::new();
        let (bundle, commit_id) = commit_bundle(b"data");

        let inserted = ObjectInsertionEngine::new().insert(&store, bundle).unwrap();

        assert_eq!(inserted.target, commit_id);
        assert!(inserted.is_commit());
        assert_eq!(inserted.objects, 3);
        assert_eq!(store.object_count().unwrap(), 3);
    }

    #[test]
    fn content_target_is_last_blob() {
        let store = MemoryStore::new();
        let first = RawObject::hashed(ObjectKind::Blob, b"first".to_vec());
        let last = RawObject::hashed(ObjectKind::Blob, b"last".to_vec());
        let bundle = RevisionBundle::content(vec![first, last.clone()]).unwrap();

        let inserted = ObjectInsertionEngine::new().insert(&store, bundle).unwrap();

        assert_eq!(inserted.target, last.id);
        assert!(!inserted.is_commit());
    }

    #[test]
    fn reinsertion_yields_same_target() {
        let store = MemoryStore::new();
        let engine = ObjectInsertionEngine::new();

        let (bundle, _) = commit_bundle(b"data");
        let first = engine.insert(&store, bundle.clone()).unwrap();
        let second = engine.insert(&store, bundle).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.object_count().unwrap(), 3);
    }

    #[test]
    fn mislabeled_object_rejected() {
        let store = MemoryStore::new();
        let wrong_id = ObjectId::new("1234567890123456789012345678901234567890").unwrap();
        let blob = RawObject::new(wrong_id, ObjectKind::Blob, b"data".to_vec());
        let bundle = RevisionBundle::content(vec![blob]).unwrap();

        let err = ObjectInsertionEngine::new()
            .insert(&store, bundle)
            .unwrap_err();
        assert!(matches!(err, ApplyError::InvalidRequest(_)));
    }
}
