//! The adaptive context index builder.
//!
//! Takes search matches plus the recent window and produces one textual
//! index that never exceeds the configured token budget. The representation
//! adapts to the match count: verbatim content for small result sets,
//! snippet triples for medium ones, similarity clusters for large ones, and
//! temporal/topic roll-ups when matches number in the thousands.

pub mod builder;
pub mod cluster;

pub use builder::{BuiltIndex, IndexBuilder};
pub use cluster::{cluster_hits, Cluster};
