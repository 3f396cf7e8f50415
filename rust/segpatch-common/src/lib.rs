//! Core definitions (error type, result alias and verification macros), relied upon
//! by all segpatch-* crates.

pub mod error;
pub mod result;

pub use result::Result;

/// Partition-local document identifier.
pub type DocId = i32;

/// Sentinel for "no document" / exhausted iteration.
pub const INVALID_DOCID: DocId = -1;

/// Identifier of a segment within a partition.
pub type SegmentId = u32;
