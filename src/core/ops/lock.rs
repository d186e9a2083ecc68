//! core::ops::lock
//!
//! Per-repository write lock for apply operations.
//!
//! # Architecture
//!
//! The [`ProjectLockRegistry`] ensures only one apply operation can mutate a
//! repository at a time. It maps each repository to its current owner (or
//! no owner when unlocked). Acquisition is a compare-and-set on that slot:
//! it succeeds only when the slot is empty, and release succeeds only when
//! performed by the owner that acquired it.
//!
//! The registry is an ordinary value. Construct one and share it (by
//! reference or `Arc`) with every orchestrator that writes the same
//! repositories; isolated registries never contend with each other.
//!
//! # Invariants
//!
//! - Acquisition is non-blocking (fails fast with the conflicting owner)
//! - A [`LockToken`] releases its lock exactly once, on drop at the latest
//! - Unlocking with a stale or foreign owner id never releases the lock
//! - A token only releases the acquisition that issued it, even when its
//!   owner has since locked the repository again
//! - Slots are created lazily and never removed
//!
//! # Example
//!
//! ```
//! use revsync::core::ops::lock::ProjectLockRegistry;
//! use revsync::core::types::{OwnerId, RepositoryId};
//!
//! let registry = ProjectLockRegistry::new();
//! let repo = RepositoryId::new("platform/api").unwrap();
//! let worker = OwnerId::new("worker-1").unwrap();
//!
//! {
//!     let token = registry.try_lock(&repo, &worker).unwrap();
//!     assert!(token.is_held());
//!     assert_eq!(registry.holder(&repo), Some(worker.clone()));
//! }
//!
//! // Lock released when the token went out of scope
//! assert!(registry.holder(&repo).is_none());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use thiserror::Error;

use crate::core::types::{OwnerId, RepositoryId};

/// Errors from locking operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Another owner already holds the lock.
    #[error("repository {repository} is locked by {owner}")]
    AlreadyLocked {
        /// Repository that was requested
        repository: RepositoryId,
        /// Owner currently holding the lock
        owner: OwnerId,
    },
}

impl LockError {
    /// The owner holding the lock that caused the failure.
    pub fn conflicting_owner(&self) -> &OwnerId {
        match self {
            LockError::AlreadyLocked { owner, .. } => owner,
        }
    }
}

/// One acquisition of a repository lock.
#[derive(Debug, Clone)]
struct Hold {
    owner: OwnerId,
    generation: u64,
}

/// Registry of per-repository write locks.
#[derive(Debug, Default)]
pub struct ProjectLockRegistry {
    /// Current hold per repository; `None` when unlocked.
    slots: DashMap<RepositoryId, Option<Hold>>,
    /// Source of acquisition generations.
    generations: AtomicU64,
}

impl ProjectLockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to lock `repository` on behalf of `owner`.
    ///
    /// The lock is not reentrant: an owner that already holds the lock gets
    /// `AlreadyLocked` naming itself.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if any owner holds the lock
    pub fn try_lock(
        &self,
        repository: &RepositoryId,
        owner: &OwnerId,
    ) -> Result<LockToken<'_>, LockError> {
        // The entry guard holds the shard write lock, making check-and-set atomic.
        let mut slot = self.slots.entry(repository.clone()).or_insert(None);
        if let Some(current) = slot.value() {
            return Err(LockError::AlreadyLocked {
                repository: repository.clone(),
                owner: current.owner.clone(),
            });
        }
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        *slot.value_mut() = Some(Hold {
            owner: owner.clone(),
            generation,
        });
        drop(slot);

        tracing::debug!(
            repository = %repository,
            owner = %owner,
            generation,
            "repository locked"
        );
        Ok(LockToken {
            registry: self,
            repository: repository.clone(),
            owner: owner.clone(),
            generation,
            held: true,
        })
    }

    /// Release `repository` if, and only if, `owner` holds it.
    ///
    /// Returns `true` when the lock was released. Calling this twice, or with
    /// an owner that does not hold the lock, returns `false` and changes
    /// nothing.
    pub fn unlock(&self, repository: &RepositoryId, owner: &OwnerId) -> bool {
        self.release_where(repository, |hold| &hold.owner == owner)
    }

    /// Release the acquisition identified by `generation`.
    fn release_generation(&self, repository: &RepositoryId, generation: u64) -> bool {
        self.release_where(repository, |hold| hold.generation == generation)
    }

    fn release_where(&self, repository: &RepositoryId, matches: impl Fn(&Hold) -> bool) -> bool {
        let Some(mut slot) = self.slots.get_mut(repository) else {
            return false;
        };
        let Some(hold) = slot.value().as_ref().filter(|&hold| matches(hold)).cloned() else {
            return false;
        };
        *slot.value_mut() = None;
        drop(slot);

        tracing::debug!(
            repository = %repository,
            owner = %hold.owner,
            generation = hold.generation,
            "repository unlocked"
        );
        true
    }

    /// The owner currently holding `repository`, if any.
    pub fn holder(&self, repository: &RepositoryId) -> Option<OwnerId> {
        self.slots
            .get(repository)
            .and_then(|slot| slot.value().as_ref().map(|hold| hold.owner.clone()))
    }

    /// Whether `repository` is currently locked.
    pub fn is_locked(&self, repository: &RepositoryId) -> bool {
        self.holder(repository).is_some()
    }

    /// Number of repositories that have ever been locked through this registry.
    pub fn known_repositories(&self) -> usize {
        self.slots.len()
    }
}

/// Proof of exclusive write access to one repository.
///
/// The lock is released when this guard is dropped (RAII pattern), so it is
/// released on every exit path, including unwinding.
///
/// # Example
///
/// ```
/// use revsync::core::ops::lock::ProjectLockRegistry;
/// use revsync::core::types::{OwnerId, RepositoryId};
///
/// let registry = ProjectLockRegistry::new();
/// let repo = RepositoryId::new("infra").unwrap();
///
/// let mut token = registry.try_lock(&repo, &OwnerId::generate()).unwrap();
/// assert!(token.release());
/// assert!(!token.release()); // already released
/// ```
#[derive(Debug)]
#[must_use = "the lock is released as soon as the token is dropped"]
pub struct LockToken<'a> {
    registry: &'a ProjectLockRegistry,
    repository: RepositoryId,
    owner: OwnerId,
    generation: u64,
    held: bool,
}

impl LockToken<'_> {
    /// Check if the lock is still held by this token.
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Repository this token locks.
    pub fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    /// Owner this token was issued to.
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Release the lock explicitly.
    ///
    /// Returns `true` when this call freed the lock. Later calls, and calls
    /// after the lock was already released through the registry, return
    /// `false`.
    pub fn release(&mut self) -> bool {
        if !self.held {
            return false;
        }
        self.held = false;
        self.registry.release_generation(&self.repository, self.generation)
    }
}

impl Drop for LockToken<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
