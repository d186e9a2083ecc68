//! engine::outcome
//!
//! Per-ref and per-batch results of an apply.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::{ObjectId, RefName};
use crate::git::{StoreResult, UpdateKind};

/// Domain result of one ref transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefUpdateResult {
    Created,
    FastForwarded,
    Forced,
    NoChange,
    Rejected,
    RejectedCurrentBranch,
    IoFailure,
    LockFailure,
}

impl RefUpdateResult {
    /// Every result variant, for exhaustive checks.
    pub const ALL: [RefUpdateResult; 8] = [
        RefUpdateResult::Created,
        RefUpdateResult::FastForwarded,
        RefUpdateResult::Forced,
        RefUpdateResult::NoChange,
        RefUpdateResult::Rejected,
        RefUpdateResult::RejectedCurrentBranch,
        RefUpdateResult::IoFailure,
        RefUpdateResult::LockFailure,
    ];

    /// Whether the ref ended at the requested value.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RefUpdateResult::Created
                | RefUpdateResult::FastForwarded
                | RefUpdateResult::Forced
                | RefUpdateResult::NoChange
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefUpdateResult::Created => "created",
            RefUpdateResult::FastForwarded => "fast-forwarded",
            RefUpdateResult::Forced => "forced",
            RefUpdateResult::NoChange => "no-change",
            RefUpdateResult::Rejected => "rejected",
            RefUpdateResult::RejectedCurrentBranch => "rejected-current-branch",
            RefUpdateResult::IoFailure => "io-failure",
            RefUpdateResult::LockFailure => "lock-failure",
        }
    }
}

impl fmt::Display for RefUpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a store result code to a domain result.
///
/// `unchanged` is true when the old and new ids are equal; any successful
/// code then becomes [`RefUpdateResult::NoChange`]. A generic
/// [`StoreResult::Ok`] is decoded through the update kind.
pub fn classify(store: StoreResult, kind: UpdateKind, unchanged: bool) -> RefUpdateResult {
    match store {
        s if s.is_ok() && unchanged => RefUpdateResult::NoChange,
        StoreResult::OkNoChange => RefUpdateResult::NoChange,
        StoreResult::OkCreated => RefUpdateResult::Created,
        StoreResult::OkFastForward => RefUpdateResult::FastForwarded,
        StoreResult::OkForced => RefUpdateResult::Forced,
        StoreResult::Ok => match kind {
            UpdateKind::Create => RefUpdateResult::Created,
            UpdateKind::FastForward => RefUpdateResult::FastForwarded,
            UpdateKind::NonFastForward => RefUpdateResult::Forced,
        },
        StoreResult::RejectedNonFastForward
        | StoreResult::RejectedNoCreate
        | StoreResult::RejectedNoDelete => RefUpdateResult::Rejected,
        StoreResult::RejectedCurrentBranch => RefUpdateResult::RejectedCurrentBranch,
        StoreResult::RejectedMissingObject => RefUpdateResult::IoFailure,
        StoreResult::OtherFailure => RefUpdateResult::LockFailure,
    }
}

/// A ref transition computed at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefTransition {
    pub ref_name: RefName,
    /// Live value when the batch was staged; zero if the ref did not exist.
    pub old_id: ObjectId,
    pub new_id: ObjectId,
}

/// Outcome of one ref in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefOutcome {
    #[serde(flatten)]
    pub transition: RefTransition,
    pub kind: UpdateKind,
    pub store_result: StoreResult,
    pub result: RefUpdateResult,
}

impl RefOutcome {
    pub fn ref_name(&self) -> &RefName {
        &self.transition.ref_name
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// Ordered per-ref outcomes of one batch, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub refs: Vec<RefOutcome>,
}

impl BatchOutcome {
    pub fn new(refs: Vec<RefOutcome>) -> Self {
        Self { refs }
    }

    /// True iff every ref succeeded.
    pub fn is_success(&self) -> bool {
        self.refs.iter().all(RefOutcome::is_success)
    }

    /// Refs that did not reach their requested value.
    pub fn failures(&self) -> impl Iterator<Item = &RefOutcome> {
        self.refs.iter().filter(|r| !r.is_success())
    }

    /// Results in request order.
    pub fn results(&self) -> Vec<RefUpdateResult> {
        self.refs.iter().map(|r| r.result).collect()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// How a failed batch should be reported.
    ///
    /// Returns `None` for a successful batch. A failure is
    /// [`FailureClass::Rejected`] when every failing ref lies under one of
    /// `soft_namespaces` and was plainly rejected; otherwise it is
    /// [`FailureClass::Failed`].
    pub fn failure_class(&self, soft_namespaces: &[String]) -> Option<FailureClass> {
        let mut failures = self.failures().peekable();
        failures.peek()?;

        let expected = failures.all(|r| {
            r.result == RefUpdateResult::Rejected
                && soft_namespaces.iter().any(|ns| r.ref_name().is_under(ns))
        });
        Some(if expected {
            FailureClass::Rejected
        } else {
            FailureClass::Failed
        })
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for r in &self.refs {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", r.ref_name(), r.result)?;
        }
        Ok(())
    }
}

/// Severity of a failed batch. Affects logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Expected rejection (info level).
    Rejected,
    /// Unexpected failure (error level).
    Failed,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Rejected => write!(f, "rejected"),
            FailureClass::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE_RESULTS: [StoreResult; 11] = [
        StoreResult::Ok,
        StoreResult::OkCreated,
        StoreResult::OkFastForward,
        StoreResult::OkForced,
        StoreResult::OkNoChange,
        StoreResult::RejectedNonFastForward,
        StoreResult::RejectedNoCreate,
        StoreResult::RejectedNoDelete,
        StoreResult::RejectedCurrentBranch,
        StoreResult::RejectedMissingObject,
        StoreResult::OtherFailure,
    ];

    const KINDS: [UpdateKind; 3] = [
        UpdateKind::Create,
        UpdateKind::FastForward,
        UpdateKind::NonFastForward,
    ];

    fn outcome(name: &str, result: RefUpdateResult) -> RefOutcome {
        RefOutcome {
            transition: RefTransition {
                ref_name: RefName::new(name).unwrap(),
                old_id: ObjectId::zero(),
                new_id: ObjectId::new("1111111111111111111111111111111111111111").unwrap(),
            },
            kind: UpdateKind::Create,
            store_result: StoreResult::Ok,
            result,
        }
    }

    fn soft() -> Vec<String> {
        vec!["refs/draft-comments/".to_string()]
    }

    mod classify_matrix {
        use super::*;

        #[test]
        fn unchanged_success_is_no_change() {
            for store in STORE_RESULTS.iter().filter(|s| s.is_ok()) {
                for kind in KINDS {
                    assert_eq!(
                        classify(*store, kind, true),
                        RefUpdateResult::NoChange,
                        "{store} / {kind:?}"
                    );
                }
            }
        }

        #[test]
        fn generic_ok_decoded_by_kind() {
            assert_eq!(
                classify(StoreResult::Ok, UpdateKind::Create, false),
                RefUpdateResult::Created
            );
            assert_eq!(
                classify(StoreResult::Ok, UpdateKind::FastForward, false),
                RefUpdateResult::FastForwarded
            );
            assert_eq!(
                classify(StoreResult::Ok, UpdateKind::NonFastForward, false),
                RefUpdateResult::Forced
            );
        }

        #[test]
        fn specific_ok_ignores_kind() {
            for kind in KINDS {
                assert_eq!(
                    classify(StoreResult::OkCreated, kind, false),
                    RefUpdateResult::Created
                );
                assert_eq!(
                    classify(StoreResult::OkFastForward, kind, false),
                    RefUpdateResult::FastForwarded
                );
                assert_eq!(
                    classify(StoreResult::OkForced, kind, false),
                    RefUpdateResult::Forced
                );
                assert_eq!(
                    classify(StoreResult::OkNoChange, kind, false),
                    RefUpdateResult::NoChange
                );
            }
        }

        #[test]
        fn failures_ignore_kind_and_equality() {
            let expected = [
                (StoreResult::RejectedNonFastForward, RefUpdateResult::Rejected),
                (StoreResult::RejectedNoCreate, RefUpdateResult::Rejected),
                (StoreResult::RejectedNoDelete, RefUpdateResult::Rejected),
                (
                    StoreResult::RejectedCurrentBranch,
                    RefUpdateResult::RejectedCurrentBranch,
                ),
                (StoreResult::RejectedMissingObject, RefUpdateResult::IoFailure),
                (StoreResult::OtherFailure, RefUpdateResult::LockFailure),
            ];
            for (store, result) in expected {
                for kind in KINDS {
                    for unchanged in [false, true] {
                        assert_eq!(classify(store, kind, unchanged), result);
                    }
                }
            }
        }

        #[test]
        fn success_iff_store_ok() {
            for store in STORE_RESULTS {
                for kind in KINDS {
                    for unchanged in [false, true] {
                        assert_eq!(
                            classify(store, kind, unchanged).is_success(),
                            store.is_ok()
                        );
                    }
                }
            }
        }
    }

    mod batch {
        use super::*;

        #[test]
        fn empty_batch_succeeds() {
            let batch = BatchOutcome::default();
            assert!(batch.is_success());
            assert!(batch.failure_class(&soft()).is_none());
        }

        #[test]
        fn success_set() {
            let ok: Vec<_> = RefUpdateResult::ALL
                .into_iter()
                .filter(RefUpdateResult::is_success)
                .collect();
            assert_eq!(
                ok,
                vec![
                    RefUpdateResult::Created,
                    RefUpdateResult::FastForwarded,
                    RefUpdateResult::Forced,
                    RefUpdateResult::NoChange,
                ]
            );
        }

        #[test]
        fn soft_namespace_rejection_is_expected() {
            let batch = BatchOutcome::new(vec![
                outcome("refs/heads/main", RefUpdateResult::FastForwarded),
                outcome("refs/draft-comments/01/1/1000", RefUpdateResult::Rejected),
            ]);
            assert!(!batch.is_success());
            assert_eq!(batch.failure_class(&soft()), Some(FailureClass::Rejected));
        }

        #[test]
        fn soft_namespace_io_failure_is_unexpected() {
            let batch = BatchOutcome::new(vec![outcome(
                "refs/draft-comments/01/1/1000",
                RefUpdateResult::IoFailure,
            )]);
            assert_eq!(batch.failure_class(&soft()), Some(FailureClass::Failed));
        }

        #[test]
        fn any_hard_namespace_failure_is_unexpected() {
            let batch = BatchOutcome::new(vec![
                outcome("refs/draft-comments/01/1/1000", RefUpdateResult::Rejected),
                outcome("refs/heads/main", RefUpdateResult::Rejected),
            ]);
            assert_eq!(batch.failure_class(&soft()), Some(FailureClass::Failed));
        }

        #[test]
        fn no_soft_namespaces_configured() {
            let batch = BatchOutcome::new(vec![outcome(
                "refs/draft-comments/01/1/1000",
                RefUpdateResult::Rejected,
            )]);
            assert_eq!(batch.failure_class(&[]), Some(FailureClass::Failed));
        }

        #[test]
        fn display_lists_every_ref() {
            let batch = BatchOutcome::new(vec![
                outcome("refs/heads/a", RefUpdateResult::FastForwarded),
                outcome("refs/heads/b", RefUpdateResult::Rejected),
            ]);
            assert_eq!(
                batch.to_string(),
                "refs/heads/a=fast-forwarded, refs/heads/b=rejected"
            );
            assert_eq!(
                batch.results(),
                vec![RefUpdateResult::FastForwarded, RefUpdateResult::Rejected]
            );
        }

        #[test]
        fn serializes_flat() {
            let json = serde_json::to_value(outcome("refs/heads/a", RefUpdateResult::Created))
                .unwrap();
            assert_eq!(json["ref_name"], "refs/heads/a");
            assert_eq!(json["result"], "created");
            assert_eq!(json["store_result"], "ok");
        }
    }
}
