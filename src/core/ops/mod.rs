//! core::ops
//!
//! Replication locking.
//!
//! # Architecture
//!
//! Every apply:
//! 1. Takes the repository's slot in the [`ProjectLockRegistry`]
//! 2. Holds the returned [`LockToken`] for the whole batch
//! 3. Releases it when the token drops, on success, error, or panic
//!
//! # Example
//!
//! ```
//! use revsync::core::ops::ProjectLockRegistry;
//! use revsync::core::types::{OwnerId, RepositoryId};
//!
//! let registry = ProjectLockRegistry::new();
//! let repo = RepositoryId::new("platform/api").unwrap();
//!
//! {
//!     let _token = registry.try_lock(&repo, &OwnerId::new("task-1").unwrap()).unwrap();
//!     assert!(registry.try_lock(&repo, &OwnerId::new("task-2").unwrap()).is_err());
//! }
//! assert!(!registry.is_locked(&repo));
//! ```

pub mod lock;

pub use lock::{LockError, LockToken, ProjectLockRegistry};
