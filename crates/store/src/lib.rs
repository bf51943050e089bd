//! Storage for Engram: graph store backends and the entity repository.
//!
//! The [`engram_core::GraphStore`] trait is the seam to whatever graph
//! engine a deployment uses. Two reference backends live here — an
//! in-memory store for tests and ephemeral sessions, and a SQLite store
//! for durable single-node use. The [`Repository`] sits on top of either
//! and enforces the entity-level invariants: chunk-set atomicity,
//! chunk-zero canonicality, soft deletes, and append-only edit history.

pub mod in_memory;
pub mod repository;
pub mod versioning;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryGraph;
pub use repository::Repository;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteGraph;
