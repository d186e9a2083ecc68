//! core
//!
//! Core domain types, schemas, and operations for revsync.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ObjectId, RefName, RepositoryId, OwnerId
//! - [`revision`] - Raw objects, revision bundles, and ref update requests
//! - [`ops`] - Per-repository replication locking
//! - [`config`] - Configuration schema and loading
//! - [`payload`] - JSON form of replicated revisions
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here touches storage

pub mod config;
pub mod ops;
pub mod payload;
pub mod revision;
pub mod types;
