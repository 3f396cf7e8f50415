//! Sort-and-truncate of posting lists.
//!
//! When a posting list is too long to keep, only the best documents by a sort
//! attribute survive. Documents are pre-assigned to coarse value buckets
//! ([`BucketMap`]), so truncation only has to fully sort the single bucket in
//! which the cutoff falls.

pub mod bucket_allocator;
pub mod bucket_map;
pub mod collector;
pub mod doc;
pub mod doc_comp;
pub mod posting;

pub use bucket_allocator::BucketVectorAllocator;
pub use bucket_map::BucketMap;
pub use collector::{SortTruncateCollector, TruncateParams};
pub use doc::{Doc, SortValue};
pub use doc_comp::{DocComp, DocCompKind};
pub use posting::{PostingIterator, SortValueReader, VecPostingIterator, VecSortValueReader};
