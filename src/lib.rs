//! revsync - Apply engine for pull-replicated git revisions
//!
//! revsync takes revision bundles (commit, tree, and blob objects received
//! out of band, plus the ref they belong on), writes them into a local
//! repository, checks they connect to what is already there, and moves
//! every ref of a batch in one compare-and-swap update.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Orchestrates Lock → Validate → Insert → Commit → Report
//! - [`core`] - Domain types, revisions, configuration, and locking
//! - [`git`] - Single interface for all repository storage
//!
//! # Correctness Invariants
//!
//! revsync maintains the following invariants:
//!
//! 1. At most one apply mutates a repository at a time
//! 2. A batch that fails validation moves no ref
//! 3. Refs move only from the value they were observed at
//! 4. Every ref in a batch gets its own reported outcome

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
