use std::sync::Arc;

use log::{error, info, warn};

use segpatch_common::{DocId, INVALID_DOCID, Result, error::Error};
use segpatch_config::{AttrId, PackAttributeConfig};
use segpatch_partition::{DocScope, PartitionData};

use crate::{
    AttrFieldValue, PackAttributeFormatter, PackExpandEstimator, PackPatchEncoder,
    PatchScanOptions, PatchWorkItem, SingleFieldPatchIterator,
    multi_field_patch_iterator::PatchIterator, patch_heap::PatchHeap,
};

/// Replays the patches of all sub attributes of one pack attribute.
///
/// Sub attribute patches for the same document are combined into a single
/// encoded pack patch, since they rewrite the same stored value. If a sub
/// attribute was patched more than once for a document, the last record wins.
pub struct PackFieldPatchIterator {
    pack_config: Arc<PackAttributeConfig>,
    is_sub: bool,
    encoder: Box<dyn PackPatchEncoder>,
    heap: PatchHeap<SingleFieldPatchIterator>,
    /// Scratch value per sub attribute, indexed by attribute id.
    patch_values: Vec<Option<AttrFieldValue>>,
    /// Sub attributes collected for the current document.
    updated: Vec<AttrId>,
    current_doc_id: DocId,
    patch_item_count: u64,
    patch_load_expand_size: u64,
    max_encode_len: usize,
}

impl PackFieldPatchIterator {
    pub fn open(
        pack_config: Arc<PackAttributeConfig>,
        partition: &PartitionData,
        options: &PatchScanOptions,
        is_sub: bool,
        estimator: &dyn PackExpandEstimator,
    ) -> Result<PackFieldPatchIterator> {
        let encoder = Box::new(PackAttributeFormatter::new(pack_config.clone()));
        Self::open_with_encoder(pack_config, partition, options, is_sub, estimator, encoder)
    }

    /// Like [`open`](Self::open), with a custom encoding of the merged patches.
    pub fn open_with_encoder(
        pack_config: Arc<PackAttributeConfig>,
        partition: &PartitionData,
        options: &PatchScanOptions,
        is_sub: bool,
        estimator: &dyn PackExpandEstimator,
        encoder: Box<dyn PackPatchEncoder>,
    ) -> Result<PackFieldPatchIterator> {
        let scope = DocScope::from_is_sub(is_sub);
        let id_bound = pack_config
            .sub_attributes()
            .iter()
            .map(|attr| attr.attr_id().as_usize() + 1)
            .max()
            .unwrap_or(0);

        let mut heap = PatchHeap::new();
        let mut patch_values: Vec<Option<AttrFieldValue>> = vec![None; id_bound];
        let mut patch_item_count = 0;
        let mut patch_load_expand_size = 0;
        let mut reserved = Vec::new();

        for (seq, attr) in pack_config.sub_attributes().iter().enumerate() {
            if !attr.is_updatable() {
                warn!(
                    "pack '{}': sub attribute '{}' is not updatable, skipping its patches",
                    pack_config.name(),
                    attr.name()
                );
                continue;
            }
            let iter = SingleFieldPatchIterator::open(attr.clone(), partition, options, is_sub)?;
            patch_item_count += iter.patch_item_count();
            patch_load_expand_size += iter.patch_load_expand_size();

            let mut value = AttrFieldValue::new();
            iter.reserve(&mut value);
            reserved.push((attr.attr_id(), iter.max_value_len()));
            patch_values[attr.attr_id().as_usize()] = Some(value);

            if iter.has_next() {
                heap.push(seq, iter.current_doc_id(), iter);
            }
        }

        let diff = partition.diff(&options.last_loaded_version);
        patch_load_expand_size += estimator.estimate(&pack_config, partition, &diff, scope);

        let max_encode_len = encoder.max_encode_patch_value_len(&reserved);

        let mut iter = PackFieldPatchIterator {
            pack_config,
            is_sub,
            encoder,
            heap,
            patch_values,
            updated: Vec::new(),
            current_doc_id: INVALID_DOCID,
            patch_item_count,
            patch_load_expand_size,
            max_encode_len,
        };
        iter.update_current_doc_id();
        info!(
            "patch iterator for {} pack '{}': {} items, expand size {}",
            scope.label(),
            iter.pack_config.name(),
            iter.patch_item_count,
            iter.patch_load_expand_size
        );
        Ok(iter)
    }

    pub fn has_next(&self) -> bool {
        !self.heap.is_empty()
    }

    /// Emits one encoded pack patch holding every sub attribute update of the
    /// next document.
    ///
    /// An encoding failure is logged, leaves the invalid sentinel in `value`
    /// and is returned as [`PackEncode`](segpatch_common::error::ErrorKind::PackEncode).
    pub fn next(&mut self, value: &mut AttrFieldValue) -> Result<()> {
        let Some(doc_id) = self.heap.peek_doc_id() else {
            value.set_invalid();
            return Ok(());
        };

        self.updated.clear();
        while self.heap.peek_doc_id() == Some(doc_id) {
            let Some((seq, mut iter)) = self.heap.pop() else {
                break;
            };
            let attr_id = iter.attr_id();
            let slot = self
                .patch_values
                .get_mut(attr_id.as_usize())
                .and_then(Option::as_mut)
                .ok_or_else(|| {
                    Error::invalid_operation(format!("no patch buffer for attribute {attr_id}"))
                })?;
            iter.next(slot)?;
            if !self.updated.contains(&attr_id) {
                self.updated.push(attr_id);
            }
            if iter.has_next() {
                self.heap.push(seq, iter.current_doc_id(), iter);
            }
        }
        self.update_current_doc_id();

        let fields = self
            .updated
            .iter()
            .filter_map(|&id| {
                self.patch_values[id.as_usize()]
                    .as_ref()
                    .map(|v| (id, v.data()))
            })
            .collect::<Vec<_>>();
        let len = self.encoder.encode_patch_value_len(&fields);
        let written = if len == 0 {
            0
        } else {
            self.encoder.encode_patch_value(&fields, value.writable(len))
        };
        if written == 0 || written != len {
            error!(
                "failed to encode patch of pack '{}' for doc {doc_id}",
                self.pack_config.name()
            );
            value.set_invalid();
            return Err(Error::pack_encode(self.pack_config.name(), doc_id));
        }

        value.set_doc_id(doc_id);
        value.set_pack_attr_id(self.pack_config.pack_id());
        value.set_is_sub_doc_id(self.is_sub);
        Ok(())
    }

    /// Sizes `value` for a patch that updates every sub attribute at once,
    /// each with its longest value.
    pub fn reserve(&self, value: &mut AttrFieldValue) {
        value.reserve(self.max_encode_len);
    }

    pub fn current_doc_id(&self) -> DocId {
        self.current_doc_id
    }

    pub fn pack_config(&self) -> &Arc<PackAttributeConfig> {
        &self.pack_config
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

    /// Packs are never split: the whole iterator becomes one work item.
    pub fn create_independent_patch_work_items(self, items: &mut Vec<PatchWorkItem>) {
        let id = format!(
            "{}_{}",
            self.pack_config.name(),
            DocScope::from_is_sub(self.is_sub).label()
        );
        let is_sub = self.is_sub;
        let patch_item_count = self.patch_item_count;
        items.push(PatchWorkItem::new(
            id,
            is_sub,
            patch_item_count,
            PatchIterator::Pack(self),
        ));
    }

    fn update_current_doc_id(&mut self) {
        self.current_doc_id = self.heap.peek_doc_id().unwrap_or(INVALID_DOCID);
    }
}
