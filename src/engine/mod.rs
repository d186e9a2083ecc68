//! engine
//!
//! Applies replicated revisions to local repositories.
//!
//! # Architecture
//!
//! The engine turns received ref update requests into ref transitions:
//!
//! 1. **Lock**: take the repository's replication lock ([`crate::core::ops::lock`])
//! 2. **Validate**: check parents and successor rules ([`validate`])
//! 3. **Insert**: write the objects into the store ([`insert`])
//! 4. **Commit**: move every ref in one batch ([`batch`])
//! 5. **Report**: record idempotency keys and publish events ([`orchestrator`])
//!
//! ```text
//! Lock -> Validate -> Insert -> Commit -> Report -> Unlock
//! ```
//!
//! # Invariants
//!
//! - At most one apply runs per repository at a time
//! - A batch never moves a ref when any of its requests fails validation
//! - Refs move only by compare-and-swap against the value read at staging
//! - The lock is released on every exit path, panics included
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use revsync::core::config::Config;
//! use revsync::core::revision::RefUpdateRequest;
//! use revsync::core::types::{OwnerId, RepositoryId};
//! use revsync::engine::ApplyOrchestrator;
//! use revsync::git::GitRepositories;
//!
//! let config = Config::load(None).unwrap();
//! let repos = Arc::new(GitRepositories::new(config.base_path()));
//! let orchestrator = ApplyOrchestrator::from_config(&config, repos);
//!
//! let requests: Vec<RefUpdateRequest> = Vec::new();
//! let repository = RepositoryId::new("platform/api").unwrap();
//! orchestrator.apply_batch(&repository, &OwnerId::generate(), requests).unwrap();
//! ```

pub mod batch;
pub mod cache;
pub mod events;
pub mod insert;
pub mod orchestrator;
pub mod outcome;
pub mod validate;

pub use batch::{AtomicBatchApplier, BatchOptions};
pub use cache::{IdempotencyCache, IdempotencyKey, MemoryCache};
pub use events::{ChannelSink, EventError, EventSink, LogSink, RefReplicatedEvent, ReplicationStatus};
pub use insert::{InsertedRevision, ObjectInsertionEngine};
pub use orchestrator::ApplyOrchestrator;
pub use outcome::{classify, BatchOutcome, FailureClass, RefOutcome, RefTransition, RefUpdateResult};
pub use validate::{AcceptAll, RevisionGraphValidator, SuccessorCheck, Verdict};

use thiserror::Error;

use crate::core::ops::LockError;
use crate::core::types::{ObjectId, OwnerId, RefName, RepositoryId};
use crate::git::GitError;

/// Errors from applying replicated revisions.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Another replication task holds the repository.
    #[error("repository {repository} is locked by {owner}")]
    RepositoryLocked {
        repository: RepositoryId,
        owner: OwnerId,
    },

    /// A commit names a parent that is not in the store.
    #[error("missing parent object {parent_id} for {ref_name}")]
    MissingParentObject {
        ref_name: RefName,
        parent_id: ObjectId,
    },

    /// The successor check declined a commit.
    #[error("{ref_name}: {reason}")]
    RejectedSuccessor { ref_name: RefName, reason: String },

    /// At least one ref in the batch did not reach its requested value.
    #[error("batch update failed ({class}): {outcome}")]
    BatchUpdateFailed {
        outcome: BatchOutcome,
        class: FailureClass,
    },

    /// No repository with that name exists.
    #[error("repository not found: {0}")]
    RepositoryNotFound(RepositoryId),

    /// The request cannot be applied as given.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The object store failed.
    #[error("storage error: {0}")]
    Storage(#[from] GitError),
}

impl From<LockError> for ApplyError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::AlreadyLocked { repository, owner } => {
                ApplyError::RepositoryLocked { repository, owner }
            }
        }
    }
}

impl ApplyError {
    /// Per-ref outcome, when the batch got as far as committing.
    pub fn outcome(&self) -> Option<&BatchOutcome> {
        match self {
            ApplyError::BatchUpdateFailed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    /// Whether retrying later could succeed without changing the request.
    pub fn is_transient(&self) -> bool {
        match self {
            ApplyError::RepositoryLocked { .. } | ApplyError::MissingParentObject { .. } => true,
            ApplyError::BatchUpdateFailed { class, .. } => *class == FailureClass::Failed,
            ApplyError::Storage(_) => true,
            ApplyError::RejectedSuccessor { .. }
            | ApplyError::RepositoryNotFound(_)
            | ApplyError::InvalidRequest(_) => false,
        }
    }
}
