//! git::memory
//!
//! In-memory object store.
//!
//! [`MemoryStore`] keeps objects and refs in process memory and follows the
//! same result contract as the git2 store. It hashes objects itself, so ids
//! are real git ids and bundles built for one store work on the other.
//!
//! A `MemoryStore` is a cheap handle: clones share the same repository.
//! [`MemoryRepositories`] hands out such handles by repository name.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;

use super::store::{ObjectStore, RefCommand, RepositoryProvider, StoreResult, UpdateKind};
use super::GitError;
use crate::core::revision::{CommitObject, HashKind, ObjectKind, RawObject};
use crate::core::types::{ObjectId, RefName, RepositoryId};

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<ObjectId, (ObjectKind, Vec<u8>)>,
    refs: HashMap<RefName, ObjectId>,
}

/// Shared in-memory repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    hash: HashKind,
    atomic: bool,
}

impl MemoryStore {
    /// Empty SHA-1 repository that supports atomic batches.
    pub fn new() -> Self {
        Self {
            atomic: true,
            ..Self::default()
        }
    }

    /// Empty repository using `hash` for object ids.
    pub fn with_hash(hash: HashKind) -> Self {
        Self {
            hash,
            ..Self::new()
        }
    }

    /// Turn off atomic batch support; batches then report per-ref results.
    pub fn without_atomic(mut self) -> Self {
        self.atomic = false;
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, GitError> {
        self.inner.read().map_err(|_| GitError::Internal {
            message: "memory store lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, GitError> {
        self.inner.write().map_err(|_| GitError::Internal {
            message: "memory store lock poisoned".to_string(),
        })
    }

    /// Point `name` at `id` unconditionally.
    pub fn set_ref(&self, name: &RefName, id: &ObjectId) -> Result<(), GitError> {
        self.write()?.refs.insert(name.clone(), id.clone());
        Ok(())
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> Result<usize, GitError> {
        Ok(self.read()?.objects.len())
    }

    fn precheck(inner: &Inner, command: &RefCommand) -> Option<StoreResult> {
        let live = inner.refs.get(&command.ref_name);
        let expected = (!command.old_id.is_zero()).then_some(&command.old_id);
        if live != expected {
            return Some(StoreResult::RejectedNonFastForward);
        }
        if command.is_noop() {
            return None;
        }
        if !inner.objects.contains_key(&command.new_id) {
            return Some(StoreResult::RejectedMissingObject);
        }
        if command.kind == UpdateKind::NonFastForward && !command.force {
            return Some(StoreResult::RejectedNonFastForward);
        }
        None
    }

    fn success(command: &RefCommand) -> StoreResult {
        if command.is_noop() {
            return StoreResult::OkNoChange;
        }
        match command.kind {
            UpdateKind::Create => StoreResult::OkCreated,
            UpdateKind::FastForward => StoreResult::OkFastForward,
            UpdateKind::NonFastForward => StoreResult::OkForced,
        }
    }

    fn parents_of(inner: &Inner, id: &ObjectId) -> Vec<ObjectId> {
        match inner.objects.get(id) {
            Some((ObjectKind::Commit, body)) => CommitObject::parse(id.clone(), body)
                .map(|c| c.parents)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn insert(&self, object: &RawObject) -> Result<ObjectId, GitError> {
        let id = self.hash.object_id(object.kind, &object.content);
        self.write()?
            .objects
            .entry(id.clone())
            .or_insert_with(|| (object.kind, object.content.clone()));
        Ok(id)
    }

    fn flush(&self) -> Result<(), GitError> {
        Ok(())
    }

    fn contains(&self, id: &ObjectId) -> Result<bool, GitError> {
        Ok(self.read()?.objects.contains_key(id))
    }

    fn read_ref(&self, name: &RefName) -> Result<Option<ObjectId>, GitError> {
        Ok(self.read()?.refs.get(name).cloned())
    }

    fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool, GitError> {
        let inner = self.read()?;
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([descendant.clone()]);

        while let Some(id) = queue.pop_front() {
            if &id == ancestor {
                return Ok(true);
            }
            if seen.insert(id.clone()) {
                queue.extend(Self::parents_of(&inner, &id));
            }
        }
        Ok(false)
    }

    fn supports_atomic(&self) -> bool {
        self.atomic
    }

    fn batch_update(
        &self,
        commands: &[RefCommand],
        atomic: bool,
    ) -> Result<Vec<StoreResult>, GitError> {
        let mut inner = self.write()?;

        if atomic && self.atomic {
            let verdicts: Vec<Option<StoreResult>> = commands
                .iter()
                .map(|c| Self::precheck(&inner, c))
                .collect();
            if verdicts.iter().any(Option::is_some) {
                return Ok(verdicts
                    .into_iter()
                    .map(|v| v.unwrap_or(StoreResult::OtherFailure))
                    .collect());
            }
            for command in commands {
                inner
                    .refs
                    .insert(command.ref_name.clone(), command.new_id.clone());
            }
            return Ok(commands.iter().map(Self::success).collect());
        }

        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            match Self::precheck(&inner, command) {
                Some(rejected) => results.push(rejected),
                None => {
                    inner
                        .refs
                        .insert(command.ref_name.clone(), command.new_id.clone());
                    results.push(Self::success(command));
                }
            }
        }
        Ok(results)
    }
}

/// Named in-memory repositories.
#[derive(Debug, Default)]
pub struct MemoryRepositories {
    stores: DashMap<RepositoryId, MemoryStore>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` as `repository`, returning a handle to it.
    pub fn insert(&self, repository: RepositoryId, store: MemoryStore) -> MemoryStore {
        self.stores.insert(repository, store.clone());
        store
    }

    /// Create an empty repository, returning a handle to it.
    pub fn create(&self, repository: RepositoryId) -> MemoryStore {
        self.insert(repository, MemoryStore::new())
    }

    /// Handle to an existing repository.
    pub fn get(&self, repository: &RepositoryId) -> Option<MemoryStore> {
        self.stores.get(repository).map(|s| s.value().clone())
    }
}

impl RepositoryProvider for MemoryRepositories {
    fn open(&self, repository: &RepositoryId) -> Result<Box<dyn ObjectStore>, GitError> {
        let store = self.get(repository).ok_or_else(|| GitError::NotARepo {
            path: repository.as_str().into(),
        })?;
        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> RefName {
        RefName::new(s).unwrap()
    }

    fn commit(tree: &ObjectId, parents: &[&ObjectId]) -> RawObject {
        let mut body = format!("tree {tree}\n");
        for parent in parents {
            body.push_str(&format!("parent {parent}\n"));
        }
        body.push_str("author A <a@example.com> 0 +0000\ncommitter A <a@example.com> 0 +0000\n\nm\n");
        RawObject::hashed(ObjectKind::Commit, body.into_bytes())
    }

    fn command(r: &str, old: &ObjectId, new: &ObjectId, kind: UpdateKind) -> RefCommand {
        RefCommand {
            ref_name: name(r),
            old_id: old.clone(),
            new_id: new.clone(),
            kind,
            force: kind != UpdateKind::FastForward,
        }
    }

    mod objects {
        use super::*;

        #[test]
        fn insert_is_idempotent() {
            let store = MemoryStore::new();
            let blob = RawObject::hashed(ObjectKind::Blob, b"x".to_vec());

            let first = store.insert(&blob).unwrap();
            let second = store.insert(&blob).unwrap();

            assert_eq!(first, second);
            assert_eq!(first, blob.id);
            assert_eq!(store.object_count().unwrap(), 1);
        }

        #[test]
        fn sha256_ids() {
            let store = MemoryStore::with_hash(HashKind::Sha256);
            let blob = RawObject::hashed(ObjectKind::Blob, Vec::new());
            let id = store.insert(&blob).unwrap();
            assert_eq!(id.as_str().len(), 64);
            assert_ne!(id, blob.id);
        }

        #[test]
        fn clones_share_state() {
            let store = MemoryStore::new();
            let handle = store.clone();
            let blob = RawObject::hashed(ObjectKind::Blob, b"x".to_vec());
            store.insert(&blob).unwrap();
            assert!(handle.contains(&blob.id).unwrap());
        }
    }

    mod ancestry {
        use super::*;

        #[test]
        fn walks_parents() {
            let store = MemoryStore::new();
            let tree = store
                .insert(&RawObject::hashed(ObjectKind::Tree, Vec::new()))
                .unwrap();
            let c1 = commit(&tree, &[]);
            let c2 = commit(&tree, &[&c1.id]);
            let c3 = commit(&tree, &[&c2.id]);
            for c in [&c1, &c2, &c3] {
                store.insert(c).unwrap();
            }

            assert!(store.is_ancestor(&c1.id, &c3.id).unwrap());
            assert!(store.is_ancestor(&c3.id, &c3.id).unwrap());
            assert!(!store.is_ancestor(&c3.id, &c1.id).unwrap());
        }
    }

    mod batches {
        use super::*;

        fn blobs(store: &MemoryStore) -> (ObjectId, ObjectId) {
            let a = store
                .insert(&RawObject::hashed(ObjectKind::Blob, b"a".to_vec()))
                .unwrap();
            let b = store
                .insert(&RawObject::hashed(ObjectKind::Blob, b"b".to_vec()))
                .unwrap();
            (a, b)
        }

        #[test]
        fn stale_old_value_rejected() {
            let store = MemoryStore::new();
            let (a, b) = blobs(&store);
            store.set_ref(&name("refs/x"), &a).unwrap();

            let results = store
                .batch_update(
                    &[command("refs/x", &ObjectId::zero(), &b, UpdateKind::Create)],
                    false,
                )
                .unwrap();
            assert_eq!(results, vec![StoreResult::RejectedNonFastForward]);
            assert_eq!(store.read_ref(&name("refs/x")).unwrap(), Some(a));
        }

        #[test]
        fn missing_object_rejected() {
            let store = MemoryStore::new();
            let ghost = ObjectId::new("1234567890123456789012345678901234567890").unwrap();
            let results = store
                .batch_update(
                    &[command("refs/x", &ObjectId::zero(), &ghost, UpdateKind::Create)],
                    false,
                )
                .unwrap();
            assert_eq!(results, vec![StoreResult::RejectedMissingObject]);
        }

        #[test]
        fn unforced_non_fast_forward_rejected() {
            let store = MemoryStore::new();
            let (a, b) = blobs(&store);
            store.set_ref(&name("refs/x"), &a).unwrap();

            let mut cmd = command("refs/x", &a, &b, UpdateKind::NonFastForward);
            cmd.force = false;
            let results = store.batch_update(&[cmd], false).unwrap();
            assert_eq!(results, vec![StoreResult::RejectedNonFastForward]);
        }

        #[test]
        fn atomic_abort_moves_nothing() {
            let store = MemoryStore::new();
            let (a, b) = blobs(&store);
            store.set_ref(&name("refs/y"), &a).unwrap();

            let results = store
                .batch_update(
                    &[
                        command("refs/x", &ObjectId::zero(), &a, UpdateKind::Create),
                        command("refs/y", &b, &a, UpdateKind::NonFastForward),
                    ],
                    true,
                )
                .unwrap();

            assert_eq!(
                results,
                vec![StoreResult::OtherFailure, StoreResult::RejectedNonFastForward]
            );
            assert_eq!(store.read_ref(&name("refs/x")).unwrap(), None);
        }

        #[test]
        fn non_atomic_applies_independently() {
            let store = MemoryStore::new().without_atomic();
            let (a, b) = blobs(&store);
            store.set_ref(&name("refs/y"), &a).unwrap();

            // atomic requested but unsupported: per-ref results
            let results = store
                .batch_update(
                    &[
                        command("refs/x", &ObjectId::zero(), &a, UpdateKind::Create),
                        command("refs/y", &b, &a, UpdateKind::NonFastForward),
                    ],
                    true,
                )
                .unwrap();

            assert_eq!(
                results,
                vec![StoreResult::OkCreated, StoreResult::RejectedNonFastForward]
            );
            assert_eq!(store.read_ref(&name("refs/x")).unwrap(), Some(a));
        }

        #[test]
        fn noop_reported() {
            let store = MemoryStore::new();
            let (a, _) = blobs(&store);
            store.set_ref(&name("refs/x"), &a).unwrap();

            let results = store
                .batch_update(
                    &[command("refs/x", &a, &a, UpdateKind::NonFastForward)],
                    true,
                )
                .unwrap();
            assert_eq!(results, vec![StoreResult::OkNoChange]);
        }
    }

    mod provider {
        use super::*;

        #[test]
        fn open_unknown_repository_fails() {
            let repos = MemoryRepositories::new();
            let repo = RepositoryId::new("missing").unwrap();
            assert!(matches!(
                repos.open(&repo),
                Err(GitError::NotARepo { .. })
            ));
        }

        #[test]
        fn open_shares_state() {
            let repos = MemoryRepositories::new();
            let repo = RepositoryId::new("a").unwrap();
            let handle = repos.create(repo.clone());

            let blob = RawObject::hashed(ObjectKind::Blob, b"x".to_vec());
            repos.open(&repo).unwrap().insert(&blob).unwrap();
            assert!(handle.contains(&blob.id).unwrap());
        }
    }
}
