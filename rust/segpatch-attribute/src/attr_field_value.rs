use segpatch_common::{DocId, INVALID_DOCID};
use segpatch_config::{AttrId, PackAttrId};

/// Staging buffer for one patch record.
///
/// A value is owned by whoever drives an iterator and is overwritten by every
/// `next()` call. The buffer only ever grows: [`reserve`](Self::reserve) sizes
/// it up front so that iteration does not reallocate.
#[derive(Debug, Clone)]
pub struct AttrFieldValue {
    doc_id: DocId,
    field_id: AttrId,
    pack_attr_id: PackAttrId,
    is_pack_attr: bool,
    is_sub_doc_id: bool,
    buffer: Vec<u8>,
    data_size: usize,
}

impl AttrFieldValue {
    pub fn new() -> AttrFieldValue {
        AttrFieldValue {
            doc_id: INVALID_DOCID,
            field_id: AttrId::invalid(),
            pack_attr_id: PackAttrId::invalid(),
            is_pack_attr: false,
            is_sub_doc_id: false,
            buffer: Vec::new(),
            data_size: 0,
        }
    }

    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    pub fn set_doc_id(&mut self, doc_id: DocId) {
        self.doc_id = doc_id;
    }

    /// False once the producing iterator is exhausted (or failed).
    pub fn is_valid(&self) -> bool {
        self.doc_id != INVALID_DOCID
    }

    pub fn field_id(&self) -> AttrId {
        self.field_id
    }

    /// Marks the value as a plain attribute patch.
    pub fn set_field_id(&mut self, field_id: AttrId) {
        self.field_id = field_id;
        self.pack_attr_id = PackAttrId::invalid();
        self.is_pack_attr = false;
    }

    pub fn pack_attr_id(&self) -> PackAttrId {
        self.pack_attr_id
    }

    /// Marks the value as an encoded pack attribute patch.
    pub fn set_pack_attr_id(&mut self, pack_attr_id: PackAttrId) {
        self.pack_attr_id = pack_attr_id;
        self.field_id = AttrId::invalid();
        self.is_pack_attr = true;
    }

    pub fn is_pack_attr(&self) -> bool {
        self.is_pack_attr
    }

    pub fn is_sub_doc_id(&self) -> bool {
        self.is_sub_doc_id
    }

    pub fn set_is_sub_doc_id(&mut self, is_sub_doc_id: bool) {
        self.is_sub_doc_id = is_sub_doc_id;
    }

    /// Grows the buffer to at least `len` bytes. Never shrinks it.
    pub fn reserve(&mut self, len: usize) {
        if self.buffer.len() < len {
            self.buffer.resize(len, 0);
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.data_size]
    }

    pub fn set_data(&mut self, data: &[u8]) {
        self.writable(data.len()).copy_from_slice(data);
    }

    /// Returns a `len`-byte window at the start of the buffer and makes it the
    /// value's data, growing the buffer if needed.
    pub fn writable(&mut self, len: usize) -> &mut [u8] {
        self.reserve(len);
        self.data_size = len;
        &mut self.buffer[..len]
    }

    /// Writes the exhaustion sentinel: invalid doc id, invalid ids, no data.
    pub fn set_invalid(&mut self) {
        self.doc_id = INVALID_DOCID;
        self.field_id = AttrId::invalid();
        self.pack_attr_id = PackAttrId::invalid();
        self.data_size = 0;
    }
}

impl Default for AttrFieldValue {
    fn default() -> Self {
        Self::new()
    }
}
