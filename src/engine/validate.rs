//! engine::validate
//!
//! Revision graph validation for commit-bearing bundles.
//!
//! A commit is applicable when every parent it declares is already in the
//! object store and the injected [`SuccessorCheck`] accepts it as a
//! successor of the ref's current state. Content-only bundles are not
//! validated.

use std::sync::Arc;

use super::ApplyError;
use crate::core::revision::CommitObject;
use crate::core::types::{RefName, RepositoryId};
use crate::git::ObjectStore;

/// Answer of a successor check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Declined, with an explanation.
    Rejected(String),
}

/// Decides whether a commit may supersede a ref's current state.
///
/// Closures with the same signature implement this trait:
///
/// ```
/// use revsync::engine::validate::{SuccessorCheck, Verdict};
/// use revsync::core::revision::CommitObject;
/// use revsync::core::types::{RefName, RepositoryId};
/// use revsync::git::ObjectStore;
///
/// fn no_meta(_: &RepositoryId, _: &dyn ObjectStore, name: &RefName, _: &CommitObject) -> Verdict {
///     if name.is_under("refs/meta/") {
///         Verdict::Rejected("meta refs are managed locally".into())
///     } else {
///         Verdict::Accepted
///     }
/// }
///
/// fn takes_check(_: impl SuccessorCheck) {}
/// takes_check(no_meta);
/// ```
pub trait SuccessorCheck: Send + Sync {
    fn check(
        &self,
        repository: &RepositoryId,
        store: &dyn ObjectStore,
        ref_name: &RefName,
        commit: &CommitObject,
    ) -> Verdict;
}

impl<F> SuccessorCheck for F
where
    F: Fn(&RepositoryId, &dyn ObjectStore, &RefName, &CommitObject) -> Verdict + Send + Sync,
{
    fn check(
        &self,
        repository: &RepositoryId,
        store: &dyn ObjectStore,
        ref_name: &RefName,
        commit: &CommitObject,
    ) -> Verdict {
        self(repository, store, ref_name, commit)
    }
}

/// Accepts every commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SuccessorCheck for AcceptAll {
    fn check(
        &self,
        _: &RepositoryId,
        _: &dyn ObjectStore,
        _: &RefName,
        _: &CommitObject,
    ) -> Verdict {
        Verdict::Accepted
    }
}

/// Validates commits before they are inserted.
#[derive(Clone)]
pub struct RevisionGraphValidator {
    successor: Arc<dyn SuccessorCheck>,
}

impl std::fmt::Debug for RevisionGraphValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionGraphValidator").finish_non_exhaustive()
    }
}

impl Default for RevisionGraphValidator {
    fn default() -> Self {
        Self::new(AcceptAll)
    }
}

impl RevisionGraphValidator {
    pub fn new(successor: impl SuccessorCheck + 'static) -> Self {
        Self {
            successor: Arc::new(successor),
        }
    }

    /// Check that `commit` can be applied to `ref_name`.
    ///
    /// Parents are checked in declaration order and the first missing one is
    /// reported. The successor check runs only when every parent is present.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::MissingParentObject`] for the first absent parent
    /// - [`ApplyError::RejectedSuccessor`] if the successor check declines
    /// - [`ApplyError::Storage`] if a presence lookup fails
    pub fn validate(
        &self,
        repository: &RepositoryId,
        store: &dyn ObjectStore,
        ref_name: &RefName,
        commit: &CommitObject,
    ) -> Result<(), ApplyError> {
        for parent in &commit.parents {
            if !store.contains(parent)? {
                return Err(ApplyError::MissingParentObject {
                    ref_name: ref_name.clone(),
                    parent_id: parent.clone(),
                });
            }
        }

        match self.successor.check(repository, store, ref_name, commit) {
            Verdict::Accepted => Ok(()),
            Verdict::Rejected(reason) => Err(ApplyError::RejectedSuccessor {
                ref_name: ref_name.clone(),
                reason,
            }),
        }
    }
}
