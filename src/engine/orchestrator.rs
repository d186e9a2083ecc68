//! engine::orchestrator
//!
//! Public entry point for applying replicated revisions.
//!
//! # Lifecycle
//!
//! ```text
//! try_lock -> open store -> AtomicBatchApplier -> cache keys -> events -> unlock
//! ```
//!
//! The lock token is a scoped guard, so the repository is released on
//! every return path. Lock contention is reported before storage is
//! touched.
//!
//! Idempotency keys are written only when every ref in the batch reached
//! its requested value. Events are published once per ref that reached the
//! commit stage, success or not, and a sink failure never changes the
//! result of the apply.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::batch::{AtomicBatchApplier, BatchOptions};
use super::cache::{IdempotencyCache, IdempotencyKey, MemoryCache};
use super::events::{EventSink, LogSink, RefReplicatedEvent, UNKNOWN_SOURCE};
use super::outcome::{BatchOutcome, FailureClass};
use super::validate::RevisionGraphValidator;
use super::ApplyError;
use crate::core::config::{Config, DEFAULT_SOFT_NAMESPACE};
use crate::core::ops::ProjectLockRegistry;
use crate::core::revision::{RefUpdateRequest, RevisionBundle};
use crate::core::types::{ObjectId, OwnerId, RefName, RepositoryId};
use crate::git::{GitError, ObjectStore, RepositoryProvider};

/// What the orchestrator keeps of a request once its bundle is consumed.
#[derive(Debug, Clone)]
struct RequestMeta {
    ref_name: RefName,
    source: String,
    event_created_on: Option<DateTime<Utc>>,
    applied_ids: Vec<ObjectId>,
}

impl RequestMeta {
    fn of(request: &RefUpdateRequest) -> Self {
        Self {
            ref_name: request.ref_name.clone(),
            source: request
                .source
                .clone()
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            event_created_on: request.event_created_on,
            applied_ids: request.bundle.applied_ids(),
        }
    }
}

/// Applies batches of ref updates to named repositories.
pub struct ApplyOrchestrator {
    locks: Arc<ProjectLockRegistry>,
    repositories: Arc<dyn RepositoryProvider>,
    cache: Arc<dyn IdempotencyCache>,
    events: Arc<dyn EventSink>,
    applier: AtomicBatchApplier,
    soft_namespaces: Vec<String>,
}

impl std::fmt::Debug for ApplyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyOrchestrator")
            .field("applier", &self.applier)
            .field("soft_namespaces", &self.soft_namespaces)
            .finish_non_exhaustive()
    }
}

impl ApplyOrchestrator {
    /// Orchestrator with its own lock registry, an in-memory cache, and
    /// events written to the log.
    pub fn new(repositories: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            locks: Arc::new(ProjectLockRegistry::new()),
            repositories,
            cache: Arc::new(MemoryCache::new()),
            events: Arc::new(LogSink),
            applier: AtomicBatchApplier::default(),
            soft_namespaces: vec![DEFAULT_SOFT_NAMESPACE.to_string()],
        }
    }

    /// Orchestrator using the batch options and soft namespaces of `config`.
    pub fn from_config(config: &Config, repositories: Arc<dyn RepositoryProvider>) -> Self {
        Self::new(repositories)
            .with_applier(AtomicBatchApplier::new(
                RevisionGraphValidator::default(),
                BatchOptions::from(config),
            ))
            .with_soft_namespaces(config.soft_namespaces())
    }

    /// Share a lock registry with other orchestrators writing the same
    /// repositories.
    pub fn with_locks(mut self, locks: Arc<ProjectLockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn IdempotencyCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_applier(mut self, applier: AtomicBatchApplier) -> Self {
        self.applier = applier;
        self
    }

    /// Keep the validator and options, replacing only the successor check.
    pub fn with_validator(mut self, validator: RevisionGraphValidator) -> Self {
        self.applier = AtomicBatchApplier::new(validator, self.applier.options());
        self
    }

    pub fn with_soft_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.soft_namespaces = namespaces;
        self
    }

    pub fn locks(&self) -> &Arc<ProjectLockRegistry> {
        &self.locks
    }

    /// Apply a single ref update.
    pub fn apply(
        &self,
        repository: &RepositoryId,
        owner: &OwnerId,
        request: RefUpdateRequest,
    ) -> Result<BatchOutcome, ApplyError> {
        self.apply_batch(repository, owner, vec![request])
    }

    /// Apply parallel lists of refs and bundles, pairing them by position.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::InvalidRequest`] if the lists differ in length; the
    ///   repository is not locked in that case
    /// - everything [`ApplyOrchestrator::apply_batch`] returns
    pub fn apply_ref_bundles(
        &self,
        repository: &RepositoryId,
        owner: &OwnerId,
        refs: Vec<RefName>,
        bundles: Vec<RevisionBundle>,
    ) -> Result<BatchOutcome, ApplyError> {
        if refs.len() != bundles.len() {
            return Err(ApplyError::InvalidRequest(format!(
                "{} refs but {} revision bundles",
                refs.len(),
                bundles.len()
            )));
        }
        let requests = refs
            .into_iter()
            .zip(bundles)
            .map(|(ref_name, bundle)| RefUpdateRequest::new(ref_name, bundle))
            .collect();
        self.apply_batch(repository, owner, requests)
    }

    /// Apply `requests` to `repository` as one batch, holding the
    /// repository lock as `owner`.
    ///
    /// An empty batch succeeds without locking or opening the repository.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::RepositoryLocked`] if another owner holds the repository
    /// - [`ApplyError::RepositoryNotFound`] if the provider has no such repository
    /// - [`ApplyError::BatchUpdateFailed`] if any ref did not reach its value
    /// - validation and storage errors from [`AtomicBatchApplier::apply`]
    pub fn apply_batch(
        &self,
        repository: &RepositoryId,
        owner: &OwnerId,
        requests: Vec<RefUpdateRequest>,
    ) -> Result<BatchOutcome, ApplyError> {
        if requests.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let started = Instant::now();
        let metadata: Vec<RequestMeta> = requests.iter().map(RequestMeta::of).collect();
        let source = metadata
            .first()
            .map(|m| m.source.clone())
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

        let _token = self.locks.try_lock(repository, owner)?;
        info!(
            repository = %repository,
            source = %source,
            refs = metadata.len(),
            "applying replicated revisions"
        );

        let store = self.open(repository)?;
        let outcome = self
            .applier
            .apply(repository, store.as_ref(), requests)
            .map_err(|e| {
                warn!(repository = %repository, source = %source, error = %e, "apply aborted");
                e
            })?;

        if outcome.is_success() {
            self.record(repository, &metadata);
        }
        self.publish(repository, &metadata, &outcome);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome.failure_class(&self.soft_namespaces) {
            None => {
                info!(
                    repository = %repository,
                    source = %source,
                    elapsed_ms,
                    "apply completed"
                );
                Ok(outcome)
            }
            Some(class) => {
                match class {
                    FailureClass::Rejected => info!(
                        repository = %repository,
                        source = %source,
                        elapsed_ms,
                        outcome = %outcome,
                        "batch update rejected"
                    ),
                    FailureClass::Failed => error!(
                        repository = %repository,
                        source = %source,
                        elapsed_ms,
                        outcome = %outcome,
                        "batch update failed"
                    ),
                }
                Err(ApplyError::BatchUpdateFailed { outcome, class })
            }
        }
    }

    fn open(&self, repository: &RepositoryId) -> Result<Box<dyn ObjectStore>, ApplyError> {
        self.repositories.open(repository).map_err(|e| match e {
            GitError::NotARepo { .. } => ApplyError::RepositoryNotFound(repository.clone()),
            other => ApplyError::Storage(other),
        })
    }

    fn record(&self, repository: &RepositoryId, metadata: &[RequestMeta]) {
        let now = Utc::now();
        for meta in metadata {
            let applied_at = meta.event_created_on.unwrap_or(now);
            for id in &meta.applied_ids {
                self.cache.put(
                    IdempotencyKey::new(id.clone(), meta.ref_name.clone(), repository.clone()),
                    applied_at,
                );
            }
        }
        debug!(repository = %repository, refs = metadata.len(), "recorded applied objects");
    }

    fn publish(&self, repository: &RepositoryId, metadata: &[RequestMeta], outcome: &BatchOutcome) {
        for (meta, ref_outcome) in metadata.iter().zip(&outcome.refs) {
            let event = RefReplicatedEvent {
                repository: repository.clone(),
                ref_name: ref_outcome.ref_name().clone(),
                source: meta.source.clone(),
                status: ref_outcome.result.into(),
                result: ref_outcome.result,
                event_created_on: meta.event_created_on,
            };
            if let Err(e) = self.events.publish(&event) {
                warn!(
                    repository = %repository,
                    ref_name = %event.ref_name,
                    error = %e,
                    "cannot publish replication event"
                );
            }
        }
    }
}
