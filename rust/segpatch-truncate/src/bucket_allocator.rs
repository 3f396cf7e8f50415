use std::sync::{Mutex, PoisonError};

use crate::Doc;

/// Pool of bucket vectors shared by collectors on different threads.
///
/// Collectors take their buckets from the pool on `re_init` and give them back
/// afterwards, so the per-bucket allocations survive across posting lists.
#[derive(Debug, Default)]
pub struct BucketVectorAllocator {
    pool: Mutex<Vec<Vec<Vec<Doc>>>>,
}

impl BucketVectorAllocator {
    pub fn new() -> BucketVectorAllocator {
        Self::default()
    }

    /// Returns `bucket_count` empty buckets.
    pub fn allocate(&self, bucket_count: usize) -> Vec<Vec<Doc>> {
        let mut buckets = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        buckets.resize_with(bucket_count, Vec::new);
        buckets
    }

    pub fn release(&self, mut buckets: Vec<Vec<Doc>>) {
        buckets.iter_mut().for_each(Vec::clear);
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(buckets);
    }

    /// Number of bucket vectors waiting in the pool.
    pub fn pooled(&self) -> usize {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse() {
        let allocator = BucketVectorAllocator::new();
        let mut buckets = allocator.allocate(3);
        assert_eq!(buckets.len(), 3);
        buckets[1].push(Doc::null(1, 1.0));
        let capacity = buckets[1].capacity();
        allocator.release(buckets);
        assert_eq!(allocator.pooled(), 1);

        let buckets = allocator.allocate(2);
        assert_eq!(allocator.pooled(), 0);
        assert_eq!(buckets.len(), 2);
        assert!(buckets.iter().all(Vec::is_empty));
        assert_eq!(buckets[1].capacity(), capacity);
    }
}
