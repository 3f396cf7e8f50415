use ahash::AHashMap;

use segpatch_common::DocId;

/// A posting list being truncated: doc ids in ascending order, each with the
/// posting's payload weight.
pub trait PostingIterator {
    fn next_doc(&mut self) -> Option<(DocId, f32)>;
}

/// Reads the sort attribute value of a document, `None` when it has none.
pub trait SortValueReader: Send + Sync {
    fn read(&self, doc_id: DocId) -> Option<[u8; 8]>;
}

#[derive(Debug, Clone, Default)]
pub struct VecPostingIterator {
    postings: Vec<(DocId, f32)>,
    pos: usize,
}

impl VecPostingIterator {
    pub fn new(postings: Vec<(DocId, f32)>) -> VecPostingIterator {
        VecPostingIterator { postings, pos: 0 }
    }

    /// Postings with a payload of 1.
    pub fn from_doc_ids(doc_ids: impl IntoIterator<Item = DocId>) -> VecPostingIterator {
        Self::new(doc_ids.into_iter().map(|doc| (doc, 1.0)).collect())
    }
}

impl PostingIterator for VecPostingIterator {
    fn next_doc(&mut self) -> Option<(DocId, f32)> {
        let posting = self.postings.get(self.pos).copied()?;
        self.pos += 1;
        Some(posting)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VecSortValueReader {
    values: AHashMap<DocId, [u8; 8]>,
}

impl VecSortValueReader {
    pub fn new() -> VecSortValueReader {
        Self::default()
    }

    pub fn insert<T: crate::SortValue>(&mut self, doc_id: DocId, value: T) {
        let mut bytes = [0u8; 8];
        bytes[..size_of::<T>()].copy_from_slice(bytemuck::bytes_of(&value));
        self.values.insert(doc_id, bytes);
    }
}

impl<T: crate::SortValue> FromIterator<(DocId, T)> for VecSortValueReader {
    fn from_iter<I: IntoIterator<Item = (DocId, T)>>(iter: I) -> Self {
        let mut reader = VecSortValueReader::new();
        for (doc_id, value) in iter {
            reader.insert(doc_id, value);
        }
        reader
    }
}

impl SortValueReader for VecSortValueReader {
    fn read(&self, doc_id: DocId) -> Option<[u8; 8]> {
        self.values.get(&doc_id).copied()
    }
}
