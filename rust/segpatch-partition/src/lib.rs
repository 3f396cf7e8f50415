//! Read-only view of a partition: the committed version, per-segment metadata
//! and the patch files recorded against already-built segments.
//!
//! Segments are immutable once built. Updates to their attribute values are
//! written as patch files into the *newer* segment that observed the update,
//! one file per (attribute, destination segment) pair. This crate locates those
//! files and decodes them; replaying them is up to the attribute layer.

pub mod layout;
pub mod partition;
pub mod patch_file;
pub mod segment;
pub mod tests;
pub mod version;

pub use partition::{PartitionData, PartitionDataBuilder, SegmentPatches};
pub use patch_file::{
    PatchCompression, PatchFileInfo, PatchFileReader, PatchFileSummary, PatchFileWriter,
};
pub use segment::{DocScope, SegmentData, SegmentInfo};
pub use version::{Version, VersionDiff};
