//! git::interface
//!
//! Object store implementation using git2.
//!
//! This module provides the **single doorway** to on-disk repositories.
//! No other module should import `git2` directly. This ensures:
//!
//! - Consistent error handling across all storage operations
//! - Strong type guarantees at the boundary
//! - CAS (compare-and-swap) semantics for all ref mutations
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: No repository at the requested path
//! - [`GitError::ObjectNotFound`]: Requested object does not exist
//! - [`GitError::InvalidOid`]: An id the backend cannot represent
//!
//! Per-ref failures during a batch update are not errors; they are reported
//! as [`StoreResult`] codes.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::store::{ObjectStore, RefCommand, RepositoryProvider, StoreResult, UpdateKind};
use crate::core::revision::{ObjectKind, RawObject};
use crate::core::types::{ObjectId, RefName, RepositoryId, TypeError};

/// Reflog message for every ref moved by the apply engine.
const REFLOG_MESSAGE: &str = "revsync: apply replicated revision";

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository at the given location.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal backend error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                oid: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("{} is locked: {}", context, err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
            other => GitError::Internal {
                message: other.to_string(),
            },
        }
    }
}

fn object_type(kind: ObjectKind) -> git2::ObjectType {
    match kind {
        ObjectKind::Commit => git2::ObjectType::Commit,
        ObjectKind::Tree => git2::ObjectType::Tree,
        ObjectKind::Blob => git2::ObjectType::Blob,
    }
}

fn git_oid(oid: &ObjectId) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

fn object_id(oid: git2::Oid) -> Result<ObjectId, GitError> {
    Ok(ObjectId::from_bytes(oid.as_bytes())?)
}

/// A repository on disk, opened through git2.
///
/// Bare and non-bare repositories are both supported. In a non-bare
/// repository the checked-out branch is never moved.
pub struct GitStore {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl GitStore {
    /// Open the repository at exactly `path` (no discovery upwards).
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Ok(Self { repo })
    }

    /// The branch HEAD points at in a non-bare repository.
    fn checked_out_branch(&self) -> Option<String> {
        if self.repo.is_bare() {
            return None;
        }
        let head = self.repo.find_reference("HEAD").ok()?;
        head.symbolic_target().map(str::to_string)
    }

    /// Whether `oid` names a commit. Reads the object header only.
    fn is_commit(&self, oid: git2::Oid, id: &ObjectId) -> Result<bool, GitError> {
        let odb = self
            .repo
            .odb()
            .map_err(|e| GitError::from_git2(e, "odb"))?;
        let (_, kind) = odb
            .read_header(oid)
            .map_err(|e| GitError::from_git2(e, id.as_str()))?;
        Ok(kind == git2::ObjectType::Commit)
    }

    /// Check a command against the live repository without writing.
    ///
    /// Returns `None` when the command may proceed.
    fn precheck(
        &self,
        command: &RefCommand,
        head_branch: Option<&str>,
    ) -> Result<Option<StoreResult>, GitError> {
        let live = self.read_ref(&command.ref_name)?;
        let expected = (!command.old_id.is_zero()).then_some(&command.old_id);
        if live.as_ref() != expected {
            return Ok(Some(StoreResult::RejectedNonFastForward));
        }
        if command.is_noop() {
            return Ok(None);
        }
        if !self.contains(&command.new_id)? {
            return Ok(Some(StoreResult::RejectedMissingObject));
        }
        if command.kind == UpdateKind::NonFastForward && !command.force {
            return Ok(Some(StoreResult::RejectedNonFastForward));
        }
        if head_branch == Some(command.ref_name.as_str()) {
            return Ok(Some(StoreResult::RejectedCurrentBranch));
        }
        Ok(None)
    }

    /// Apply commands one by one with per-ref CAS.
    fn update_each(&self, commands: &[RefCommand]) -> Result<Vec<StoreResult>, GitError> {
        let head_branch = self.checked_out_branch();
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            if let Some(rejected) = self.precheck(command, head_branch.as_deref())? {
                results.push(rejected);
                continue;
            }
            if command.is_noop() {
                results.push(StoreResult::OkNoChange);
                continue;
            }

            let name = command.ref_name.as_str();
            let new = git_oid(&command.new_id)?;
            let written = if command.old_id.is_zero() {
                self.repo.reference(name, new, false, REFLOG_MESSAGE)
            } else {
                let old = git_oid(&command.old_id)?;
                self.repo
                    .reference_matching(name, new, true, old, REFLOG_MESSAGE)
            };

            let result = match written {
                Ok(_) => StoreResult::Ok,
                // Lost a race with another writer between check and write
                Err(e)
                    if matches!(
                        e.code(),
                        git2::ErrorCode::Exists | git2::ErrorCode::Modified
                    ) =>
                {
                    StoreResult::RejectedNonFastForward
                }
                Err(e) => {
                    tracing::warn!(ref_name = %name, error = %e.message(), "ref update failed");
                    StoreResult::OtherFailure
                }
            };
            results.push(result);
        }

        Ok(results)
    }

    /// Apply commands in one git2 transaction: every ref is locked first and
    /// nothing is written unless every command passes.
    fn update_atomic(&self, commands: &[RefCommand]) -> Result<Vec<StoreResult>, GitError> {
        let head_branch = self.checked_out_branch();
        let mut tx = self
            .repo
            .transaction()
            .map_err(|e| GitError::from_git2(e, "transaction"))?;

        for command in commands {
            if let Err(e) = tx.lock_ref(command.ref_name.as_str()) {
                tracing::warn!(
                    ref_name = %command.ref_name,
                    error = %e.message(),
                    "failed to lock ref"
                );
                return Ok(vec![StoreResult::OtherFailure; commands.len()]);
            }
        }

        let mut verdicts = Vec::with_capacity(commands.len());
        for command in commands {
            verdicts.push(self.precheck(command, head_branch.as_deref())?);
        }

        if verdicts.iter().any(Option::is_some) {
            // Abort: dropping the transaction releases every lock
            return Ok(verdicts
                .into_iter()
                .map(|v| v.unwrap_or(StoreResult::OtherFailure))
                .collect());
        }

        for command in commands.iter().filter(|c| !c.is_noop()) {
            let new = git_oid(&command.new_id)?;
            tx.set_target(command.ref_name.as_str(), new, None, REFLOG_MESSAGE)
                .map_err(|e| GitError::from_git2(e, command.ref_name.as_str()))?;
        }

        if let Err(e) = tx.commit() {
            tracing::error!(error = %e.message(), "ref transaction commit failed");
            return Ok(vec![StoreResult::OtherFailure; commands.len()]);
        }

        Ok(commands
            .iter()
            .map(|c| {
                if c.is_noop() {
                    StoreResult::OkNoChange
                } else {
                    StoreResult::Ok
                }
            })
            .collect())
    }
}

impl ObjectStore for GitStore {
    fn insert(&self, object: &RawObject) -> Result<ObjectId, GitError> {
        let odb = self
            .repo
            .odb()
            .map_err(|e| GitError::from_git2(e, "odb"))?;
        let oid = odb
            .write(object_type(object.kind), &object.content)
            .map_err(|e| GitError::from_git2(e, object.id.as_str()))?;
        object_id(oid)
    }

    fn flush(&self) -> Result<(), GitError> {
        // Loose objects are durable once `write` returns
        Ok(())
    }

    fn contains(&self, id: &ObjectId) -> Result<bool, GitError> {
        let odb = self
            .repo
            .odb()
            .map_err(|e| GitError::from_git2(e, "odb"))?;
        Ok(odb.exists(git_oid(id)?))
    }

    fn read_ref(&self, name: &RefName) -> Result<Option<ObjectId>, GitError> {
        match self.repo.find_reference(name.as_str()) {
            Ok(reference) => {
                // Resolve symbolic refs to final target
                let resolved = reference.resolve().unwrap_or(reference);
                let oid = resolved.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {} has no target", name),
                })?;
                Ok(Some(object_id(oid)?))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, name.as_str())),
        }
    }

    fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool, GitError> {
        // A commit is its own ancestor
        if ancestor == descendant {
            return Ok(true);
        }

        let ancestor_oid = git_oid(ancestor)?;
        let descendant_oid = git_oid(descendant)?;
        if !self.is_commit(ancestor_oid, ancestor)?
            || !self.is_commit(descendant_oid, descendant)?
        {
            return Ok(false);
        }

        self.repo
            .graph_descendant_of(descendant_oid, ancestor_oid)
            .map_err(|e| GitError::from_git2(e, descendant.as_str()))
    }

    fn supports_atomic(&self) -> bool {
        true
    }

    fn batch_update(
        &self,
        commands: &[RefCommand],
        atomic: bool,
    ) -> Result<Vec<StoreResult>, GitError> {
        if atomic {
            self.update_atomic(commands)
        } else {
            self.update_each(commands)
        }
    }
}

/// Repositories under one base directory.
///
/// `<name>` resolves to `<base>/<name>.git`, falling back to `<base>/<name>`.
#[derive(Debug, Clone)]
pub struct GitRepositories {
    base: PathBuf,
}

impl GitRepositories {
    /// Serve repositories under `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Locate the directory of `repository`, if it exists.
    pub fn locate(&self, repository: &RepositoryId) -> Option<PathBuf> {
        let bare = self.base.join(format!("{}.git", repository.as_str()));
        if bare.is_dir() {
            return Some(bare);
        }
        let plain = self.base.join(repository.as_str());
        plain.is_dir().then_some(plain)
    }
}

impl RepositoryProvider for GitRepositories {
    fn open(&self, repository: &RepositoryId) -> Result<Box<dyn ObjectStore>, GitError> {
        let path = self.locate(repository).ok_or_else(|| GitError::NotARepo {
            path: self.base.join(repository.as_str()),
        })?;
        Ok(Box::new(GitStore::open(&path)?))
    }
}
