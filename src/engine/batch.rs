//! engine::batch
//!
//! Atomic batch application of ref update requests.
//!
//! # Stages
//!
//! 1. **Validate and insert**, request by request in the order supplied.
//!    Any validation failure abandons the batch before a single ref moves.
//!    Objects inserted for earlier requests stay in the store.
//! 2. **Stage**: read each ref's live value and build one [`RefCommand`] per
//!    request.
//! 3. **Commit** the commands in one store batch and classify each per-ref
//!    result.
//!
//! # Update kinds
//!
//! | live value | bundle | kind | forced |
//! |---|---|---|---|
//! | absent | any | Create | - |
//! | ancestor of new | commit | FastForward | no |
//! | otherwise | commit | NonFastForward | if `allow_non_fast_forward` |
//! | present | content-only | NonFastForward | always |

use std::collections::HashSet;

use tracing::debug;

use super::insert::{InsertedRevision, ObjectInsertionEngine};
use super::outcome::{classify, BatchOutcome, RefOutcome, RefTransition};
use super::validate::RevisionGraphValidator;
use super::ApplyError;
use crate::core::config::Config;
use crate::core::revision::RefUpdateRequest;
use crate::core::types::{ObjectId, RefName, RepositoryId};
use crate::git::{GitError, ObjectStore, RefCommand, UpdateKind};

/// How batches are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Request an all-or-nothing commit when the store supports one.
    pub atomic: bool,
    /// Force commit updates that are not fast-forwards.
    pub allow_non_fast_forward: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            atomic: true,
            allow_non_fast_forward: false,
        }
    }
}

impl From<&Config> for BatchOptions {
    fn from(config: &Config) -> Self {
        Self {
            atomic: config.atomic(),
            allow_non_fast_forward: config.allow_non_fast_forward(),
        }
    }
}

/// Applies a batch of ref update requests to one repository.
#[derive(Debug, Clone, Default)]
pub struct AtomicBatchApplier {
    insertion: ObjectInsertionEngine,
    validator: RevisionGraphValidator,
    options: BatchOptions,
}

impl AtomicBatchApplier {
    pub fn new(validator: RevisionGraphValidator, options: BatchOptions) -> Self {
        Self {
            insertion: ObjectInsertionEngine::new(),
            validator,
            options,
        }
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    /// Apply `requests` to `store`.
    ///
    /// Returns the per-ref outcome in request order. A returned outcome may
    /// contain failed refs; callers decide what that means.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::InvalidRequest`] for duplicate ref names or corrupt objects
    /// - [`ApplyError::MissingParentObject`] / [`ApplyError::RejectedSuccessor`]
    ///   from validation, before any ref is moved
    /// - [`ApplyError::Storage`] if the store fails outright
    pub fn apply(
        &self,
        repository: &RepositoryId,
        store: &dyn ObjectStore,
        requests: Vec<RefUpdateRequest>,
    ) -> Result<BatchOutcome, ApplyError> {
        reject_duplicates(&requests)?;

        let mut inserted: Vec<(RefName, InsertedRevision)> = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(commit) = request.bundle.commit_object() {
                self.validator
                    .validate(repository, store, &request.ref_name, commit)?;
            }
            let revision = self.insertion.insert(store, request.bundle)?;
            inserted.push((request.ref_name, revision));
        }

        let commands = inserted
            .iter()
            .map(|(name, revision)| self.stage(store, name, revision))
            .collect::<Result<Vec<_>, _>>()?;

        let atomic = self.options.atomic && store.supports_atomic();
        let results = store.batch_update(&commands, atomic)?;
        if results.len() != commands.len() {
            return Err(ApplyError::Storage(GitError::Internal {
                message: format!(
                    "batch update returned {} results for {} commands",
                    results.len(),
                    commands.len()
                ),
            }));
        }

        let refs = commands
            .into_iter()
            .zip(results)
            .map(|(command, store_result)| {
                let result = classify(store_result, command.kind, command.is_noop());
                debug!(
                    ref_name = %command.ref_name,
                    old = %command.old_id.short(8),
                    new = %command.new_id.short(8),
                    %store_result,
                    %result,
                    "ref transition"
                );
                RefOutcome {
                    transition: RefTransition {
                        ref_name: command.ref_name,
                        old_id: command.old_id,
                        new_id: command.new_id,
                    },
                    kind: command.kind,
                    store_result,
                    result,
                }
            })
            .collect();

        Ok(BatchOutcome::new(refs))
    }

    /// Build the command moving `name` to the inserted target.
    fn stage(
        &self,
        store: &dyn ObjectStore,
        name: &RefName,
        revision: &InsertedRevision,
    ) -> Result<RefCommand, ApplyError> {
        let old_id = store.read_ref(name)?.unwrap_or_else(ObjectId::zero);
        let new_id = revision.target.clone();

        let kind = if old_id.is_zero() {
            UpdateKind::Create
        } else if revision.is_commit() && store.is_ancestor(&old_id, &new_id)? {
            UpdateKind::FastForward
        } else {
            UpdateKind::NonFastForward
        };
        let force = !revision.is_commit() || self.options.allow_non_fast_forward;

        Ok(RefCommand {
            ref_name: name.clone(),
            old_id,
            new_id,
            kind,
            force,
        })
    }
}

fn reject_duplicates(requests: &[RefUpdateRequest]) -> Result<(), ApplyError> {
    let mut seen = HashSet::with_capacity(requests.len());
    for request in requests {
        if !seen.insert(&request.ref_name) {
            return Err(ApplyError::InvalidRequest(format!(
                "ref {} appears more than once in the batch",
                request.ref_name
            )));
        }
    }
    Ok(())
}
