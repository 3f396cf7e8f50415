//! Replay of attribute patches recorded against immutable segments.
//!
//! Every updatable attribute yields a [`SingleFieldPatchIterator`]; the sub
//! attributes of a pack attribute are merged by a [`PackFieldPatchIterator`]
//! into one encoded pack patch per document; and a [`MultiFieldPatchIterator`]
//! merges all of them into a single stream ordered by doc id. The same work can
//! be split into [`PatchWorkItem`]s, one per attribute or pack, which touch
//! disjoint columns and can be applied in parallel.

pub mod attr_field_value;
pub mod expand_estimator;
pub mod multi_field_patch_iterator;
pub mod pack_field_patch_iterator;
pub mod pack_formatter;
mod patch_heap;
pub mod replay;
pub mod single_field_patch_iterator;
pub mod updater;
pub mod work_item;

pub use attr_field_value::AttrFieldValue;
pub use expand_estimator::{PackExpandEstimator, SegmentDiffEstimator};
pub use multi_field_patch_iterator::{MultiFieldPatchIterator, PatchIterator};
pub use pack_field_patch_iterator::PackFieldPatchIterator;
pub use pack_formatter::{PackAttributeFormatter, PackPatchEncoder};
pub use replay::{PatchReplayOptions, PatchReplayer, ReplayStats};
pub use single_field_patch_iterator::{PatchScanOptions, SingleFieldPatchIterator};
pub use updater::{AttributeColumnStore, AttributeUpdater};
pub use work_item::{PatchWorkItem, run_work_items};
