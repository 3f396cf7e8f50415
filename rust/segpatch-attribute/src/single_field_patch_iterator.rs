use std::{collections::VecDeque, sync::Arc};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use segpatch_common::{DocId, INVALID_DOCID, Result, SegmentId};
use segpatch_config::{AttrId, AttributeConfig};
use segpatch_partition::{DocScope, PartitionData, PatchFileReader, Version};

use crate::{AttrFieldValue, PatchWorkItem, multi_field_patch_iterator::PatchIterator};

/// Selects which recorded patch files take part in a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchScanOptions {
    /// Skip patch files whose destination segment was part of
    /// `last_loaded_version`: those updates are already reflected in the
    /// loaded data.
    pub ignore_patch_to_old_inc_segment: bool,
    pub last_loaded_version: Version,
    /// Only patch files recorded by this segment or a newer one are replayed.
    pub start_load_segment: SegmentId,
}

/// Patch files of one destination segment, merged by local doc id.
struct SegmentCursor {
    dest_segment: SegmentId,
    base_doc_id: DocId,
    /// Ordered by source segment; ties on a doc id go to the older source.
    readers: Vec<PatchFileReader>,
}

impl SegmentCursor {
    fn next_reader(&self) -> Option<usize> {
        let mut best: Option<(usize, DocId)> = None;
        for (idx, reader) in self.readers.iter().enumerate() {
            if let Some(doc_id) = reader.peek_doc_id() {
                if best.is_none_or(|(_, best_doc)| doc_id < best_doc) {
                    best = Some((idx, doc_id));
                }
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn current_doc_id(&self) -> Option<DocId> {
        self.readers
            .iter()
            .filter_map(|r| r.peek_doc_id())
            .min()
            .map(|local| self.base_doc_id + local)
    }
}

/// Replays the patches of one plain attribute in ascending global doc id order.
///
/// Destination segments are visited in version order. Within a destination,
/// the patch files of all source segments are merged by doc id, the older
/// source first when both patched the same document. Every record is emitted,
/// so a document may come out more than once; the later record wins.
pub struct SingleFieldPatchIterator {
    attr_config: Arc<AttributeConfig>,
    is_sub: bool,
    segments: VecDeque<SegmentCursor>,
    current_doc_id: DocId,
    patch_item_count: u64,
    patch_load_expand_size: u64,
    max_value_len: usize,
}

impl SingleFieldPatchIterator {
    /// Opens every patch file of the attribute selected by `options`.
    ///
    /// Any file that is missing or fails validation fails the whole iterator.
    pub fn open(
        attr_config: Arc<AttributeConfig>,
        partition: &PartitionData,
        options: &PatchScanOptions,
        is_sub: bool,
    ) -> Result<SingleFieldPatchIterator> {
        let scope = DocScope::from_is_sub(is_sub);
        let fixed_value_len = attr_config.fixed_value_len();
        let mut iter = SingleFieldPatchIterator {
            attr_config,
            is_sub,
            segments: VecDeque::new(),
            current_doc_id: INVALID_DOCID,
            patch_item_count: 0,
            patch_load_expand_size: 0,
            max_value_len: 0,
        };

        for group in partition.find_patch_files(iter.attr_config.name(), scope) {
            let dest_segment = group.dest.segment_id();
            if options.ignore_patch_to_old_inc_segment
                && options.last_loaded_version.has_segment(dest_segment)
            {
                debug!(
                    "skipping {} patch files of '{}' to loaded segment {dest_segment}",
                    group.files.len(),
                    iter.attr_config.name()
                );
                continue;
            }

            let dest_doc_count = group.dest.doc_count(scope);
            let mut readers = Vec::with_capacity(group.files.len());
            for file in group
                .files
                .iter()
                .filter(|f| f.src_segment >= options.start_load_segment)
            {
                let reader = PatchFileReader::open(file, fixed_value_len, dest_doc_count)
                    .inspect_err(|e| {
                        error!("failed to open patch file {}: {e}", file.path);
                    })?;
                debug!(
                    "opened patch file {}: {} records",
                    reader.path(),
                    reader.record_count()
                );
                iter.patch_item_count += reader.record_count() as u64;
                iter.max_value_len = iter.max_value_len.max(reader.max_value_len());
                if fixed_value_len.is_none() {
                    iter.patch_load_expand_size += reader.value_bytes();
                }
                if reader.has_next() {
                    readers.push(reader);
                }
            }
            if !readers.is_empty() {
                iter.segments.push_back(SegmentCursor {
                    dest_segment,
                    base_doc_id: group.dest.base_doc_id(scope),
                    readers,
                });
            }
        }
        iter.update_current_doc_id();

        info!(
            "patch iterator for {} attribute '{}': {} items in {} segments, expand size {}",
            scope.label(),
            iter.attr_config.name(),
            iter.patch_item_count,
            iter.segments.len(),
            iter.patch_load_expand_size
        );
        Ok(iter)
    }

    pub fn has_next(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Moves the next patch record into `value`. Once exhausted, writes the
    /// invalid sentinel instead.
    pub fn next(&mut self, value: &mut AttrFieldValue) -> Result<()> {
        let Some(cursor) = self.segments.front_mut() else {
            value.set_invalid();
            return Ok(());
        };
        let base_doc_id = cursor.base_doc_id;
        let record = match cursor.next_reader() {
            Some(idx) => cursor.readers[idx].next_record(),
            None => None,
        };
        if let Some((local_doc_id, data)) = record {
            value.set_doc_id(base_doc_id + local_doc_id);
            value.set_field_id(self.attr_config.attr_id());
            value.set_is_sub_doc_id(self.is_sub);
            value.set_data(data);
        } else {
            value.set_invalid();
        }
        if cursor.readers.iter().all(|r| !r.has_next()) {
            debug!(
                "attribute '{}': finished patches to segment {}",
                self.attr_config.name(),
                cursor.dest_segment
            );
            self.segments.pop_front();
        }
        self.update_current_doc_id();
        Ok(())
    }

    /// Sizes `value` for the longest record this iterator can produce.
    pub fn reserve(&self, value: &mut AttrFieldValue) {
        value.reserve(self.max_value_len);
    }

    pub fn max_value_len(&self) -> usize {
        self.max_value_len
    }

    pub fn current_doc_id(&self) -> DocId {
        self.current_doc_id
    }

    pub fn attr_id(&self) -> AttrId {
        self.attr_config.attr_id()
    }

    pub fn attr_config(&self) -> &Arc<AttributeConfig> {
        &self.attr_config
    }

    pub fn is_sub(&self) -> bool {
        self.is_sub
    }

    pub fn patch_item_count(&self) -> u64 {
        self.patch_item_count
    }

    /// Bytes needed to hold the loaded patch values of a variable-length
    /// attribute; fixed-length values are written in place and need none.
    pub fn patch_load_expand_size(&self) -> u64 {
        self.patch_load_expand_size
    }

    /// Hands the whole iterator over as one work item.
    pub fn create_independent_patch_work_items(self, items: &mut Vec<PatchWorkItem>) {
        let id = format!(
            "{}_{}",
            self.attr_config.name(),
            DocScope::from_is_sub(self.is_sub).label()
        );
        let is_sub = self.is_sub;
        let patch_item_count = self.patch_item_count;
        items.push(PatchWorkItem::new(
            id,
            is_sub,
            patch_item_count,
            PatchIterator::Field(self),
        ));
    }

    fn update_current_doc_id(&mut self) {
        self.current_doc_id = self
            .segments
            .front()
            .and_then(|cursor| cursor.current_doc_id())
            .unwrap_or(INVALID_DOCID);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segpatch_config::{AttributeDef, AttributeSchema, FieldType, SchemaBuilder};
    use segpatch_partition::{PartitionDataBuilder, PatchCompression, PatchFileWriter};

    fn schema() -> AttributeSchema {
        SchemaBuilder::new(
            vec![
                AttributeDef::new("price", FieldType::Int32),
                AttributeDef::new("title", FieldType::String).updatable(true),
            ],
            vec![],
        )
        .finish()
        .unwrap()
    }

    fn patch(records: &[(DocId, Vec<u8>)]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut writer = PatchFileWriter::new(&mut buf, PatchCompression::None);
        for (doc_id, value) in records {
            writer.add(*doc_id, value).unwrap();
        }
        writer.finish().unwrap();
        buf
    }

    fn int(value: i32) -> Vec<u8> {
        value.to_le_bytes().to_vec()
    }

    fn drain(iter: &mut SingleFieldPatchIterator) -> Vec<(DocId, Vec<u8>)> {
        let mut value = AttrFieldValue::new();
        iter.reserve(&mut value);
        let mut out = Vec::new();
        while iter.has_next() {
            let expected = iter.current_doc_id();
            iter.next(&mut value).unwrap();
            assert_eq!(value.doc_id(), expected);
            out.push((value.doc_id(), value.data().to_vec()));
        }
        iter.next(&mut value).unwrap();
        assert_eq!(value.doc_id(), INVALID_DOCID);
        out
    }

    #[test]
    fn test_replays_every_record_in_segment_order() {
        let mut builder = PartitionDataBuilder::new(Version::new(1, vec![0, 1, 2]));
        builder
            .add_segment(0, 100, 0)
            .add_segment(1, 0, 0)
            .add_segment(2, 0, 0)
            .add_patch_data(1, DocScope::Main, "price", 0, patch(&[(10, int(42))]))
            .add_patch_data(
                2,
                DocScope::Main,
                "price",
                0,
                patch(&[(10, int(43)), (20, int(7))]),
            );
        let partition = builder.build().unwrap();
        let attr = schema().find_attribute("price").unwrap().clone();
        let mut iter =
            SingleFieldPatchIterator::open(attr, &partition, &Default::default(), false).unwrap();
        assert_eq!(iter.patch_item_count(), 3);
        assert_eq!(iter.patch_load_expand_size(), 0);
        assert_eq!(iter.current_doc_id(), 10);
        assert_eq!(
            drain(&mut iter),
            vec![(10, int(42)), (10, int(43)), (20, int(7))]
        );
    }

    #[test]
    fn test_global_doc_ids_across_destinations() {
        let mut builder = PartitionDataBuilder::new(Version::new(1, vec![0, 1, 2]));
        builder
            .add_segment(0, 10, 0)
            .add_segment(1, 10, 0)
            .add_segment(2, 10, 0)
            .add_patch_data(2, DocScope::Main, "price", 1, patch(&[(0, int(1))]))
            .add_patch_data(2, DocScope::Main, "price", 0, patch(&[(9, int(2))]))
            .add_patch_data(1, DocScope::Main, "price", 0, patch(&[(3, int(3))]));
        let partition = builder.build().unwrap();
        let attr = schema().find_attribute("price").unwrap().clone();
        let mut iter =
            SingleFieldPatchIterator::open(attr, &partition, &Default::default(), false).unwrap();
        let docs = drain(&mut iter)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect::<Vec<_>>();
        assert_eq!(docs, vec![3, 9, 10]);
    }

    #[test]
    fn test_scan_options_filter_files() {
        let mut builder = PartitionDataBuilder::new(Version::new(2, vec![0, 1, 2]));
        builder
            .add_segment(0, 10, 0)
            .add_segment(1, 10, 0)
            .add_segment(2, 10, 0)
            .add_patch_data(1, DocScope::Main, "price", 0, patch(&[(1, int(1))]))
            .add_patch_data(2, DocScope::Main, "price", 0, patch(&[(2, int(2))]))
            .add_patch_data(2, DocScope::Main, "price", 1, patch(&[(3, int(3))]));
        let partition = builder.build().unwrap();
        let attr = schema().find_attribute("price").unwrap().clone();

        let options = PatchScanOptions {
            start_load_segment: 2,
            ..Default::default()
        };
        let mut iter =
            SingleFieldPatchIterator::open(attr.clone(), &partition, &options, false).unwrap();
        assert_eq!(drain(&mut iter), vec![(2, int(2)), (13, int(3))]);

        let options = PatchScanOptions {
            ignore_patch_to_old_inc_segment: true,
            last_loaded_version: Version::new(1, vec![0]),
            start_load_segment: 0,
        };
        let mut iter = SingleFieldPatchIterator::open(attr, &partition, &options, false).unwrap();
        assert_eq!(drain(&mut iter), vec![(13, int(3))]);
    }

    #[test]
    fn test_var_len_reserve_and_expand_size() {
        let mut builder = PartitionDataBuilder::new(Version::new(1, vec![0, 1]));
        builder
            .add_segment(0, 0, 10)
            .add_segment(1, 0, 10)
            .add_patch_data(
                1,
                DocScope::Sub,
                "title",
                0,
                patch(&[(1, b"short".to_vec()), (2, b"much longer title".to_vec())]),
            );
        let partition = builder.build().unwrap();
        let attr = schema().find_attribute("title").unwrap().clone();

        let main =
            SingleFieldPatchIterator::open(attr.clone(), &partition, &Default::default(), false)
                .unwrap();
        assert!(!main.has_next());
        assert_eq!(main.current_doc_id(), INVALID_DOCID);

        let mut iter =
            SingleFieldPatchIterator::open(attr, &partition, &Default::default(), true).unwrap();
        assert_eq!(iter.patch_load_expand_size(), 22);
        let mut value = AttrFieldValue::new();
        iter.reserve(&mut value);
        let reserved = value.buffer_len();
        assert_eq!(reserved, 17);
        while iter.has_next() {
            iter.next(&mut value).unwrap();
            assert!(value.is_sub_doc_id());
            assert_eq!(value.buffer_len(), reserved);
        }
    }

    #[test]
    fn test_wrong_value_width_fails_open() {
        let mut builder = PartitionDataBuilder::new(Version::new(1, vec![0, 1]));
        builder
            .add_segment(0, 10, 0)
            .add_segment(1, 10, 0)
            .add_patch_data(1, DocScope::Main, "price", 0, patch(&[(1, b"xx".to_vec())]));
        let partition = builder.build().unwrap();
        let attr = schema().find_attribute("price").unwrap().clone();
        assert!(
            SingleFieldPatchIterator::open(attr, &partition, &Default::default(), false).is_err()
        );
    }

    #[test]
    fn test_doc_id_beyond_destination_fails_open() {
        let mut builder = PartitionDataBuilder::new(Version::new(1, vec![0, 1, 2]));
        builder
            .add_segment(0, 10, 0)
            .add_segment(1, 10, 0)
            .add_segment(2, 10, 0)
            .add_patch_data(2, DocScope::Main, "price", 0, patch(&[(15, int(1))]))
            .add_patch_data(2, DocScope::Main, "price", 1, patch(&[(0, int(2))]));
        let partition = builder.build().unwrap();
        let attr = schema().find_attribute("price").unwrap().clone();
        let err = SingleFieldPatchIterator::open(attr, &partition, &Default::default(), false)
            .err()
            .unwrap();
        assert!(matches!(
            err.kind(),
            segpatch_common::error::ErrorKind::CorruptPatchFile { .. }
        ));
    }

    #[test]
    fn test_last_doc_of_destination_is_accepted() {
        let mut builder = PartitionDataBuilder::new(Version::new(1, vec![0, 1]));
        builder
            .add_segment(0, 10, 4)
            .add_segment(1, 10, 4)
            .add_patch_data(1, DocScope::Main, "price", 0, patch(&[(9, int(1))]))
            .add_patch_data(1, DocScope::Sub, "price", 0, patch(&[(3, int(2))]));
        let partition = builder.build().unwrap();
        let attr = schema().find_attribute("price").unwrap().clone();
        let mut main =
            SingleFieldPatchIterator::open(attr.clone(), &partition, &Default::default(), false)
                .unwrap();
        assert_eq!(drain(&mut main), vec![(9, int(1))]);
        let mut sub =
            SingleFieldPatchIterator::open(attr, &partition, &Default::default(), true).unwrap();
        assert_eq!(drain(&mut sub), vec![(3, int(2))]);
    }
}
