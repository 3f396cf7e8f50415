use std::sync::Arc;

use ahash::AHashSet;
use log::debug;

use segpatch_common::DocId;

use crate::{
    BucketMap, BucketVectorAllocator, Doc, DocCompKind, PostingIterator, SortValueReader,
};

/// How many postings survive truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncateParams {
    pub min_doc_count_to_reserve: usize,
    pub max_doc_count_to_reserve: usize,
    /// Distinct sort values the kept postings must cover; 0 disables.
    pub distinct_count: usize,
}

impl TruncateParams {
    pub fn new(doc_count_to_reserve: usize) -> TruncateParams {
        TruncateParams {
            min_doc_count_to_reserve: doc_count_to_reserve,
            max_doc_count_to_reserve: doc_count_to_reserve,
            distinct_count: 0,
        }
    }

    pub fn with_distinct(mut self, distinct_count: usize, max_doc_count_to_reserve: usize) -> Self {
        self.distinct_count = distinct_count;
        self.max_doc_count_to_reserve = max_doc_count_to_reserve.max(self.min_doc_count_to_reserve);
        self
    }

    fn has_distinct(&self) -> bool {
        self.distinct_count > 0
    }
}

/// Collects a posting list into value buckets and keeps its best documents.
///
/// A collector is reused for one posting list after another: `re_init`,
/// `do_collect`, `truncate`, then read the result.
pub struct SortTruncateCollector {
    params: TruncateParams,
    comp: DocCompKind,
    bucket_map: Arc<BucketMap>,
    value_reader: Arc<dyn SortValueReader>,
    allocator: Arc<BucketVectorAllocator>,
    buckets: Vec<Vec<Doc>>,
    /// Sort values seen in the buckets before the cutoff bucket.
    /// Distinct non-null sort values seen so far; nulls never count.
    distinct_values: AHashSet<u64>,
    doc_infos: Vec<Doc>,
    key: u64,
    collected: usize,
}

impl SortTruncateCollector {
    pub fn new(
        params: TruncateParams,
        comp: DocCompKind,
        bucket_map: Arc<BucketMap>,
        value_reader: Arc<dyn SortValueReader>,
        allocator: Arc<BucketVectorAllocator>,
    ) -> SortTruncateCollector {
        SortTruncateCollector {
            params,
            comp,
            bucket_map,
            value_reader,
            allocator,
            buckets: Vec::new(),
            distinct_values: AHashSet::new(),
            doc_infos: Vec::new(),
            key: 0,
            collected: 0,
        }
    }

    /// Returns the current buckets to the pool and borrows empty ones.
    pub fn re_init(&mut self) {
        self.release_buckets();
        // One extra bucket for documents the bucket map does not know.
        self.buckets = self.allocator.allocate(self.bucket_map.bucket_count() + 1);
        self.distinct_values.clear();
        self.doc_infos.clear();
        self.collected = 0;
    }

    /// Reads the whole posting list of `key` into buckets and truncates the
    /// bucket in which the reserve quota ends.
    pub fn do_collect(&mut self, key: u64, posting: &mut dyn PostingIterator) {
        self.re_init();
        self.key = key;
        let unknown_bucket = self.buckets.len() - 1;
        while let Some((doc_id, payload)) = posting.next_doc() {
            let doc = match self.value_reader.read(doc_id) {
                Some(value) => Doc::new(doc_id, value, payload),
                None => Doc::null(doc_id, payload),
            };
            let bucket = self.bucket_map.bucket(doc_id).unwrap_or(unknown_bucket);
            self.buckets[bucket].push(doc);
            self.collected += 1;
        }

        if let Some((cutoff, reserve)) = self.acquire_doc_count_to_reserve_with_distinct() {
            self.sort_last_valid_bucket_and_truncate(cutoff, reserve);
        }
    }

    /// Finds the bucket in which truncation happens by walking whole buckets
    /// until the reserve quota (and the distinct value quota) is covered.
    ///
    /// Returns the cutoff bucket and the number of documents to keep, or `None`
    /// when the whole posting list fits.
    pub fn acquire_doc_count_to_reserve_with_distinct(&mut self) -> Option<(usize, usize)> {
        let params = self.params;
        let reserve = params
            .min_doc_count_to_reserve
            .min(params.max_doc_count_to_reserve);
        self.distinct_values.clear();
        if !params.has_distinct() && self.collected <= reserve {
            return None;
        }

        let mut total = 0;
        for (idx, bucket) in self.buckets.iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let bucket_total = total + bucket.len();
            let distinct_covered = !params.has_distinct() || {
                let mut values = self.distinct_values.clone();
                values.extend(bucket.iter().filter_map(distinct_key));
                values.len() >= params.distinct_count
            };
            if (bucket_total >= reserve && distinct_covered)
                || bucket_total >= params.max_doc_count_to_reserve
            {
                return Some((idx, reserve));
            }
            if params.has_distinct() {
                self.distinct_values.extend(bucket.iter().filter_map(distinct_key));
            }
            total = bucket_total;
        }
        None
    }

    /// Sorts the cutoff bucket, keeps the part of it that completes the reserve
    /// quota and drops every later bucket.
    pub fn sort_last_valid_bucket_and_truncate(&mut self, cutoff: usize, reserve: usize) {
        let params = self.params;
        let kept_before: usize = self.buckets[..cutoff].iter().map(Vec::len).sum();
        let comp = self.comp;
        let bucket = &mut self.buckets[cutoff];
        comp.sort(bucket);

        let max_keep = params.max_doc_count_to_reserve.saturating_sub(kept_before);
        let mut keep = reserve.saturating_sub(kept_before).min(bucket.len()).min(max_keep);
        if params.has_distinct() {
            let mut values = self.distinct_values.clone();
            values.extend(bucket[..keep].iter().filter_map(distinct_key));
            while keep < bucket.len().min(max_keep) && values.len() < params.distinct_count {
                values.extend(distinct_key(&bucket[keep]));
                keep += 1;
            }
            while keep > 0
                && keep < bucket.len().min(max_keep)
                && comp.equal(&bucket[keep - 1], &bucket[keep])
            {
                keep += 1;
            }
        }
        bucket.truncate(keep);
        for later in &mut self.buckets[cutoff + 1..] {
            later.clear();
        }
        debug!(
            "truncated posting list of key {}: kept {} of {} docs, cutoff bucket {cutoff}",
            self.key,
            kept_before + keep,
            self.collected
        );
    }

    /// Moves the kept documents out of the buckets into doc id order, and
    /// returns how many there are.
    pub fn truncate(&mut self) -> usize {
        self.doc_infos.clear();
        for bucket in &self.buckets {
            self.doc_infos.extend_from_slice(bucket);
        }
        self.doc_infos.sort_unstable_by_key(|doc| doc.doc_id);
        self.release_buckets();
        self.doc_infos.len()
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    /// Postings read by the last `do_collect`.
    pub fn collected_doc_count(&self) -> usize {
        self.collected
    }

    /// Kept documents after `truncate`, in doc id order.
    pub fn doc_infos(&self) -> &[Doc] {
        &self.doc_infos
    }

    pub fn truncated_doc_ids(&self) -> Vec<DocId> {
        self.doc_infos.iter().map(|doc| doc.doc_id).collect()
    }

    fn release_buckets(&mut self) {
        if !self.buckets.is_empty() {
            self.allocator.release(std::mem::take(&mut self.buckets));
        }
    }
}

impl Drop for SortTruncateCollector {
    fn drop(&mut self) {
        self.release_buckets();
    }
}

fn distinct_key(doc: &Doc) -> Option<u64> {
    (!doc.is_null()).then(|| {
        let value = doc.value;
        u64::from_le_bytes(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VecPostingIterator, VecSortValueReader};
    use segpatch_config::FieldType;

    fn collector(
        params: TruncateParams,
        values: &[(DocId, i32)],
        bucket_count: usize,
        desc: bool,
    ) -> SortTruncateCollector {
        let comp = DocCompKind::new(FieldType::Int32, desc, false).unwrap();
        let mut sorted = values.to_vec();
        sorted.sort_by_key(|&(doc, v)| if desc { (-(v as i64), doc) } else { (v as i64, doc) });
        let sorted_ids = sorted.iter().map(|&(doc, _)| doc).collect::<Vec<_>>();
        SortTruncateCollector::new(
            params,
            comp,
            Arc::new(BucketMap::from_sorted_docs(&sorted_ids, bucket_count)),
            Arc::new(values.iter().copied().collect::<VecSortValueReader>()),
            Arc::new(BucketVectorAllocator::new()),
        )
    }

    #[test]
    fn test_keeps_best_docs_in_doc_id_order() {
        let values = (0..20).map(|doc| (doc, (doc * 7) % 20)).collect::<Vec<_>>();
        let mut c = collector(TruncateParams::new(5), &values, 4, true);
        c.do_collect(1, &mut VecPostingIterator::from_doc_ids(0..20));
        assert_eq!(c.truncate(), 5);
        let mut kept_values = c
            .truncated_doc_ids()
            .iter()
            .map(|&doc| (doc * 7) % 20)
            .collect::<Vec<_>>();
        kept_values.sort();
        assert_eq!(kept_values, vec![15, 16, 17, 18, 19]);
        let ids = c.truncated_doc_ids();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(c.collected_doc_count(), 20);
    }

    #[test]
    fn test_short_posting_list_is_kept_whole() {
        let values = [(1, 5), (2, 6), (3, 7)];
        let mut c = collector(TruncateParams::new(10), &values, 2, false);
        c.do_collect(7, &mut VecPostingIterator::from_doc_ids([1, 2, 3]));
        assert_eq!(c.truncate(), 3);
        assert_eq!(c.key(), 7);
    }

    #[test]
    fn test_docs_without_value_are_dropped_first() {
        let values = [(0, 1), (1, 2), (2, 3)];
        let mut c = collector(TruncateParams::new(3), &values, 1, false);
        c.do_collect(1, &mut VecPostingIterator::from_doc_ids([0, 1, 2, 3, 4]));
        assert_eq!(c.truncate(), 3);
        assert_eq!(c.truncated_doc_ids(), vec![0, 1, 2]);
    }

    #[test]
    fn test_distinct_values_extend_the_quota() {
        // docs 0..6 share the best value
        let values = (0..10)
            .map(|doc| (doc, if doc < 6 { 100 } else { doc }))
            .collect::<Vec<_>>();
        let params = TruncateParams::new(3).with_distinct(2, 8);
        let mut c = collector(params, &values, 1, true);
        c.do_collect(1, &mut VecPostingIterator::from_doc_ids(0..10));
        let kept = c.truncate();
        // six ties of 100 plus the next best value (9) as the second distinct
        assert_eq!(kept, 7);
        assert!(c.truncated_doc_ids().contains(&9));

        let params = TruncateParams::new(3).with_distinct(2, 4);
        let mut c = collector(params, &values, 1, true);
        c.do_collect(1, &mut VecPostingIterator::from_doc_ids(0..10));
        assert_eq!(c.truncate(), 4);
    }

    #[test]
    fn test_nulls_do_not_count_as_distinct_value() {
        // docs 0..4 hold 50, docs 4..8 have no value
        let values = (0..4).map(|doc| (doc, 50)).collect::<Vec<_>>();
        let params = TruncateParams::new(2).with_distinct(2, 6);
        let mut c = collector(params, &values, 1, false);
        c.do_collect(1, &mut VecPostingIterator::from_doc_ids(0..8));
        // one distinct value only, so the quota runs up to the max
        assert_eq!(c.truncate(), 6);
        assert_eq!(c.truncated_doc_ids(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_reuse_returns_buckets_to_pool() {
        let values = (0..8).map(|doc| (doc, doc)).collect::<Vec<_>>();
        let allocator = Arc::new(BucketVectorAllocator::new());
        let comp = DocCompKind::new(FieldType::Int32, false, false).unwrap();
        let mut c = SortTruncateCollector::new(
            TruncateParams::new(2),
            comp,
            Arc::new(BucketMap::from_sorted_docs(&(0..8).collect::<Vec<_>>(), 4)),
            Arc::new(values.into_iter().collect::<VecSortValueReader>()),
            allocator.clone(),
        );
        for key in 0..3 {
            c.do_collect(key, &mut VecPostingIterator::from_doc_ids(0..8));
            assert_eq!(c.truncate(), 2);
            assert_eq!(c.truncated_doc_ids(), vec![0, 1]);
            assert_eq!(allocator.pooled(), 1);
        }
    }
}
