use log::info;

use segpatch_common::{DocId, INVALID_DOCID, Result};
use segpatch_config::AttributeSchema;
use segpatch_partition::{DocScope, PartitionData};

use crate::{
    AttrFieldValue, PackExpandEstimator, PackFieldPatchIterator, PatchScanOptions, PatchWorkItem,
    SegmentDiffEstimator, SingleFieldPatchIterator, patch_heap::PatchHeap,
};

/// A patch iterator over one plain attribute or one pack attribute.
pub enum PatchIterator {
    Field(SingleFieldPatchIterator),
    Pack(PackFieldPatchIterator),
}

impl PatchIterator {
    pub fn has_next(&self) -> bool {
        match self {
            PatchIterator::Field(iter) => iter.has_next(),
            PatchIterator::Pack(iter) => iter.has_next(),
        }
    }

    pub fn next(&mut self, value: &mut AttrFieldValue) -> Result<()> {
        match self {
            PatchIterator::Field(iter) => iter.next(value),
            PatchIterator::Pack(iter) => iter.next(value),
        }
    }

    pub fn reserve(&self, value: &mut AttrFieldValue) {
        match self {
            PatchIterator::Field(iter) => iter.reserve(value),
            PatchIterator::Pack(iter) => iter.reserve(value),
        }
    }

    pub fn current_doc_id(&self) -> DocId {
        match self {
            PatchIterator::Field(iter) => iter.current_doc_id(),
            PatchIterator::Pack(iter) => iter.current_doc_id(),
        }
    }

    pub fn patch_item_count(&self) -> u64 {
        match self {
            PatchIterator::Field(iter) => iter.patch_item_count(),
            PatchIterator::Pack(iter) => iter.patch_item_count(),
        }
    }

    pub fn patch_load_expand_size(&self) -> u64 {
        match self {
            PatchIterator::Field(iter) => iter.patch_load_expand_size(),
            PatchIterator::Pack(iter) => iter.patch_load_expand_size(),
        }
    }

    /// Name of the attribute or pack attribute.
    pub fn name(&self) -> &str {
        match self {
            PatchIterator::Field(iter) => iter.attr_config().name(),
            PatchIterator::Pack(iter) => iter.pack_config().name(),
        }
    }

    pub fn create_independent_patch_work_items(self, items: &mut Vec<PatchWorkItem>) {
        match self {
            PatchIterator::Field(iter) => iter.create_independent_patch_work_items(items),
            PatchIterator::Pack(iter) => iter.create_independent_patch_work_items(items),
        }
    }
}

/// Merges the patches of every updatable attribute and pack attribute of one
/// document scope into a single stream ordered by doc id.
///
/// Updates of different attributes to the same document are separate records.
/// Among them, plain attributes come first in declaration order, then packs in
/// declaration order.
pub struct MultiFieldPatchIterator {
    is_sub: bool,
    heap: PatchHeap<PatchIterator>,
    current_doc_id: DocId,
    patch_item_count: u64,
    patch_load_expand_size: u64,
}

impl MultiFieldPatchIterator {
    pub fn open(
        schema: &AttributeSchema,
        partition: &PartitionData,
        options: &PatchScanOptions,
        is_sub: bool,
    ) -> Result<MultiFieldPatchIterator> {
        Self::open_with_estimator(schema, partition, options, is_sub, &SegmentDiffEstimator)
    }

    pub fn open_with_estimator(
        schema: &AttributeSchema,
        partition: &PartitionData,
        options: &PatchScanOptions,
        is_sub: bool,
        estimator: &dyn PackExpandEstimator,
    ) -> Result<MultiFieldPatchIterator> {
        let mut iter = MultiFieldPatchIterator {
            is_sub,
            heap: PatchHeap::new(),
            current_doc_id: INVALID_DOCID,
            patch_item_count: 0,
            patch_load_expand_size: 0,
        };

        for attr in schema.updatable_attributes() {
            let field = SingleFieldPatchIterator::open(attr.clone(), partition, options, is_sub)?;
            iter.add(PatchIterator::Field(field));
        }
        for pack in schema.updatable_packs() {
            let pack =
                PackFieldPatchIterator::open(pack.clone(), partition, options, is_sub, estimator)?;
            iter.add(PatchIterator::Pack(pack));
        }
        iter.update_current_doc_id();

        info!(
            "multi field patch iterator for {} docs: {} iterators with patches, {} items, expand size {}",
            DocScope::from_is_sub(is_sub).label(),
            iter.heap.len(),
            iter.patch_item_count,
            iter.patch_load_expand_size
        );
        Ok(iter)
    }

    fn add(&mut self, iter: PatchIterator) {
        self.patch_item_count += iter.patch_item_count();
        self.patch_load_expand_size += iter.patch_load_expand_size();
        if iter.has_next() {
            let seq = self.heap.len();
            self.heap.push(seq, iter.current_doc_id(), iter);
        }
    }

    pub fn has_next(&self) -> bool {
        !self.heap.is_empty()
    }

    /// Emits the next record of the iterator with the lowest doc id.
    pub fn next(&mut self, value: &mut AttrFieldValue) -> Result<()> {
        let Some((seq, mut iter)) = self.heap.pop() else {
            value.set_invalid();
            return Ok(());
        };
        let result = iter.next(value);
        if iter.has_next() {
            self.heap.push(seq, iter.current_doc_id(), iter);
        }
        self.update_current_doc_id();
        result
    }

    /// Sizes `value` for the largest record of any attribute.
    pub fn reserve(&self, value: &mut AttrFieldValue) {
        for iter in self.heap.iter() {
            iter.reserve(value);
        }
    }

    pub fn current_doc_id(&self) -> DocId {
        self.current_doc_id
    }

    pub fn is_sub(&self) -> bool {
        self.is_sub
    }

    pub fn patch_item_count(&self) -> u64 {
        self.patch_item_count
    }

    pub fn patch_load_expand_size(&self) -> u64 {
        self.patch_load_expand_size
    }

    /// Splits the remaining work into one item per plain attribute and one per
    /// pack attribute. Attributes without patches produce no item.
    pub fn create_independent_patch_work_items(self) -> Vec<PatchWorkItem> {
        let mut items = Vec::with_capacity(self.heap.len());
        for iter in self.heap.into_sorted_cursors() {
            iter.create_independent_patch_work_items(&mut items);
        }
        info!(
            "created {} patch work items for {} docs",
            items.len(),
            DocScope::from_is_sub(self.is_sub).label()
        );
        items
    }

    fn update_current_doc_id(&mut self) {
        self.current_doc_id = self.heap.peek_doc_id().unwrap_or(INVALID_DOCID);
    }
}
