//! git::store
//!
//! Storage backend contract shared by the git2 and in-memory stores.
//!
//! # Vocabulary
//!
//! - [`RefCommand`] - one staged `(name, old, new)` transition
//! - [`UpdateKind`] - how the transition relates to the old value
//! - [`StoreResult`] - the per-command result code a batch update reports
//!
//! # Result contract
//!
//! [`ObjectStore::batch_update`] returns exactly one result per command, in
//! command order. Each command is compared against the live ref at commit
//! time: a ref that no longer holds `old_id` is rejected as a non-fast-forward.
//! In atomic mode a single failing command aborts the whole batch and every
//! other command reports [`StoreResult::OtherFailure`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::GitError;
use crate::core::revision::RawObject;
use crate::core::types::{ObjectId, RefName, RepositoryId};

/// How a staged transition relates to the ref's old value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// The ref does not exist yet.
    Create,
    /// The new object descends from the old one.
    FastForward,
    /// No ancestry relationship (or not a commit).
    NonFastForward,
}

/// One staged ref transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefCommand {
    pub ref_name: RefName,
    /// Expected live value; zero when the ref must not exist.
    pub old_id: ObjectId,
    pub new_id: ObjectId,
    pub kind: UpdateKind,
    /// Allow a non-fast-forward transition.
    pub force: bool,
}

impl RefCommand {
    /// Whether the command leaves the ref where it is.
    pub fn is_noop(&self) -> bool {
        self.old_id == self.new_id
    }
}

/// Per-command result code reported by a batch update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreResult {
    /// Applied; the store does not say how.
    Ok,
    OkCreated,
    OkFastForward,
    OkForced,
    OkNoChange,
    RejectedNonFastForward,
    RejectedNoCreate,
    RejectedNoDelete,
    RejectedCurrentBranch,
    RejectedMissingObject,
    OtherFailure,
}

impl StoreResult {
    /// Whether the ref holds the command's new value afterwards.
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            StoreResult::Ok
                | StoreResult::OkCreated
                | StoreResult::OkFastForward
                | StoreResult::OkForced
                | StoreResult::OkNoChange
        )
    }
}

impl fmt::Display for StoreResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreResult::Ok => "ok",
            StoreResult::OkCreated => "ok-created",
            StoreResult::OkFastForward => "ok-fast-forward",
            StoreResult::OkForced => "ok-forced",
            StoreResult::OkNoChange => "ok-no-change",
            StoreResult::RejectedNonFastForward => "rejected-non-fast-forward",
            StoreResult::RejectedNoCreate => "rejected-no-create",
            StoreResult::RejectedNoDelete => "rejected-no-delete",
            StoreResult::RejectedCurrentBranch => "rejected-current-branch",
            StoreResult::RejectedMissingObject => "rejected-missing-object",
            StoreResult::OtherFailure => "other-failure",
        };
        write!(f, "{}", s)
    }
}

/// Object store and ref database of one repository.
pub trait ObjectStore {
    /// Insert an object and return the id the store computed for it.
    ///
    /// Inserting an object that is already present is a no-op returning the
    /// same id.
    fn insert(&self, object: &RawObject) -> Result<ObjectId, GitError>;

    /// Make every inserted object visible to subsequent reads.
    fn flush(&self) -> Result<(), GitError>;

    /// Whether an object is present.
    fn contains(&self, id: &ObjectId) -> Result<bool, GitError>;

    /// Current target of a ref, or `None` if the ref does not exist.
    fn read_ref(&self, name: &RefName) -> Result<Option<ObjectId>, GitError>;

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own
    /// ancestor).
    ///
    /// Distinct ids where either names an object that is not a commit yield
    /// `false`. A missing object or an unreadable store is an error.
    fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool, GitError>;

    /// Whether this store can commit a multi-ref batch all-or-nothing.
    fn supports_atomic(&self) -> bool;

    /// Execute a batch of ref commands once.
    ///
    /// Returns one result per command, in order. `atomic` is honored only
    /// when [`ObjectStore::supports_atomic`] is true.
    fn batch_update(
        &self,
        commands: &[RefCommand],
        atomic: bool,
    ) -> Result<Vec<StoreResult>, GitError>;
}

/// Opens the object store of a named repository.
pub trait RepositoryProvider: Send + Sync {
    /// Open `repository`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no such repository exists
    fn open(&self, repository: &RepositoryId) -> Result<Box<dyn ObjectStore>, GitError>;
}
