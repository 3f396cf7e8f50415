use std::{cmp::Ordering, collections::BinaryHeap};

use segpatch_common::DocId;

/// Min-heap of patch cursors keyed by their current doc id.
///
/// Cursors with equal doc ids come out in registration order (`seq`), which
/// makes the merged output deterministic.
pub(crate) struct PatchHeap<T> {
    heap: BinaryHeap<HeapEntry<T>>,
}

struct HeapEntry<T> {
    doc_id: DocId,
    seq: usize,
    cursor: T,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &HeapEntry<T>) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> Ord for HeapEntry<T> {
    #[inline]
    fn cmp(&self, other: &HeapEntry<T>) -> Ordering {
        // `BinaryHeap` is a max-heap, the lowest doc id must be on top.
        (self.doc_id, self.seq)
            .cmp(&(other.doc_id, other.seq))
            .reverse()
    }
}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &HeapEntry<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PatchHeap<T> {
    pub fn new() -> PatchHeap<T> {
        PatchHeap {
            heap: BinaryHeap::new(),
        }
    }

    /// Inserts a cursor positioned at `doc_id`.
    pub fn push(&mut self, seq: usize, doc_id: DocId, cursor: T) {
        self.heap.push(HeapEntry {
            doc_id,
            seq,
            cursor,
        });
    }

    /// Removes the cursor with the lowest doc id.
    pub fn pop(&mut self) -> Option<(usize, T)> {
        self.heap.pop().map(|entry| (entry.seq, entry.cursor))
    }

    pub fn peek_doc_id(&self) -> Option<DocId> {
        self.heap.peek().map(|entry| entry.doc_id)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Cursors in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|entry| &entry.cursor)
    }

    /// Drains the heap in doc id order.
    pub fn into_sorted_cursors(self) -> Vec<T> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|entry| entry.cursor)
            .collect()
    }
}
