//! git
//!
//! Storage backends for replicated repositories.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to repository storage. The engine
//! talks to the [`ObjectStore`] and [`RepositoryProvider`] traits; only
//! [`interface`] touches `git2`. No other module should import `git2`.
//!
//! # Backends
//!
//! - [`GitStore`] / [`GitRepositories`] - on-disk repositories through git2
//! - [`MemoryStore`] / [`MemoryRepositories`] - in-process repositories
//!
//! # Invariants
//!
//! - All ref updates use CAS (compare-and-swap) semantics against the live value
//! - Object insertion is content-addressed and idempotent
//! - A batch update reports exactly one result per command, in order
//!
//! # Example
//!
//! ```no_run
//! use revsync::core::types::RepositoryId;
//! use revsync::git::{GitRepositories, ObjectStore, RepositoryProvider};
//!
//! let repos = GitRepositories::new("/srv/git");
//! let store = repos.open(&RepositoryId::new("platform/api").unwrap()).unwrap();
//! assert!(store.supports_atomic());
//! ```

mod interface;
mod memory;
mod store;

pub use interface::{GitError, GitRepositories, GitStore};
pub use memory::{MemoryRepositories, MemoryStore};
pub use store::{ObjectStore, RefCommand, RepositoryProvider, StoreResult, UpdateKind};
