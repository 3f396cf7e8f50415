use segpatch_common::DocId;

const NO_BUCKET: u32 = u32::MAX;

/// Assignment of documents to sort value buckets.
///
/// Bucket 0 holds the best documents. The map is computed once per sort
/// attribute and shared by all truncations.
#[derive(Debug, Clone, Default)]
pub struct BucketMap {
    buckets: Vec<u32>,
    bucket_count: usize,
}

impl BucketMap {
    /// Splits `sorted_docs` (best first) into `bucket_count` buckets of equal
    /// size; the last bucket may be smaller.
    pub fn from_sorted_docs(sorted_docs: &[DocId], bucket_count: usize) -> BucketMap {
        let bucket_count = bucket_count.clamp(1, sorted_docs.len().max(1));
        let bucket_size = sorted_docs.len().div_ceil(bucket_count).max(1);
        let max_doc = sorted_docs.iter().copied().max().unwrap_or(-1);
        let mut buckets = vec![NO_BUCKET; (max_doc + 1).max(0) as usize];
        for (pos, &doc_id) in sorted_docs.iter().enumerate() {
            if doc_id >= 0 {
                buckets[doc_id as usize] = (pos / bucket_size) as u32;
            }
        }
        BucketMap {
            buckets,
            bucket_count,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Bucket of `doc_id`, `None` for documents the map does not know.
    pub fn bucket(&self, doc_id: DocId) -> Option<usize> {
        usize::try_from(doc_id)
            .ok()
            .and_then(|idx| self.buckets.get(idx))
            .filter(|&&bucket| bucket != NO_BUCKET)
            .map(|&bucket| bucket as usize)
    }
}
