use std::sync::{Mutex, PoisonError};

use ahash::AHashMap;

use segpatch_common::{DocId, Result, error::Error};
use segpatch_config::{AttrId, AttributeSchema, PackAttrId};

use crate::{AttrFieldValue, PackAttributeFormatter};

/// Destination of replayed patches.
///
/// Called concurrently by work items; each item only touches its own column.
pub trait AttributeUpdater: Sync {
    fn update(&self, value: &AttrFieldValue) -> Result<()>;
}

type Column = Mutex<AHashMap<DocId, Vec<u8>>>;

/// In-memory attribute values of one document scope, one lock per column.
///
/// Pack patches are merged into the stored pack value.
pub struct AttributeColumnStore {
    is_sub: bool,
    columns: Vec<Column>,
    packs: Vec<(PackAttributeFormatter, Column)>,
}

impl AttributeColumnStore {
    pub fn new(schema: &AttributeSchema, is_sub: bool) -> AttributeColumnStore {
        AttributeColumnStore {
            is_sub,
            columns: (0..schema.attribute_id_bound())
                .map(|_| Mutex::default())
                .collect(),
            packs: schema
                .packs()
                .iter()
                .map(|pack| (PackAttributeFormatter::new(pack.clone()), Mutex::default()))
                .collect(),
        }
    }

    pub fn value(&self, attr_id: AttrId, doc_id: DocId) -> Option<Vec<u8>> {
        let column = self.columns.get(attr_id.as_usize())?;
        lock(column).get(&doc_id).cloned()
    }

    pub fn pack_value(&self, pack_id: PackAttrId, doc_id: DocId) -> Option<Vec<u8>> {
        let (_, column) = self.packs.get(pack_id.as_usize())?;
        lock(column).get(&doc_id).cloned()
    }

    /// Stores a full pack value, as if loaded from the segment.
    pub fn set_pack_value(&self, pack_id: PackAttrId, doc_id: DocId, packed: Vec<u8>) -> Result<()> {
        let (_, column) = self.pack(pack_id)?;
        lock(column).insert(doc_id, packed);
        Ok(())
    }

    pub fn pack_formatter(&self, pack_id: PackAttrId) -> Option<&PackAttributeFormatter> {
        self.packs.get(pack_id.as_usize()).map(|(f, _)| f)
    }

    /// Number of documents with a value in the column.
    pub fn doc_count(&self, attr_id: AttrId) -> usize {
        self.columns
            .get(attr_id.as_usize())
            .map_or(0, |column| lock(column).len())
    }

    fn pack(&self, pack_id: PackAttrId) -> Result<&(PackAttributeFormatter, Column)> {
        self.packs
            .get(pack_id.as_usize())
            .ok_or_else(|| Error::invalid_arg("pack_attr_id", format!("unknown pack {pack_id}")))
    }
}

impl AttributeUpdater for AttributeColumnStore {
    fn update(&self, value: &AttrFieldValue) -> Result<()> {
        segpatch_common::verify_arg!(value, value.is_valid());
        segpatch_common::verify_arg!(value, value.is_sub_doc_id() == self.is_sub);
        if value.is_pack_attr() {
            let (formatter, column) = self.pack(value.pack_attr_id())?;
            let mut column = lock(column);
            let merged =
                formatter.merge_patch(column.get(&value.doc_id()).map(Vec::as_slice), value.data())?;
            column.insert(value.doc_id(), merged);
        } else {
            let column = self.columns.get(value.field_id().as_usize()).ok_or_else(|| {
                Error::invalid_arg("field_id", format!("unknown attribute {}", value.field_id()))
            })?;
            lock(column).insert(value.doc_id(), value.data().to_vec());
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use segpatch_config::{AttributeDef, FieldType, PackDef, SchemaBuilder};

    #[test]
    fn test_plain_and_pack_updates() {
        let schema = SchemaBuilder::new(
            vec![
                AttributeDef::new("price", FieldType::Int32),
                AttributeDef::new("a", FieldType::Int8),
                AttributeDef::new("b", FieldType::String).updatable(true),
            ],
            vec![PackDef::new("pack", ["a", "b"])],
        )
        .finish()
        .unwrap();
        let store = AttributeColumnStore::new(&schema, false);
        let pack_id = PackAttrId::new(0);
        let formatter = store.pack_formatter(pack_id).unwrap().clone();
        store
            .set_pack_value(pack_id, 3, formatter.encode(&[&[1u8][..], &b"old"[..]]).unwrap())
            .unwrap();

        let mut value = AttrFieldValue::new();
        value.set_doc_id(3);
        value.set_field_id(AttrId::new(0));
        value.set_data(&42i32.to_le_bytes());
        store.update(&value).unwrap();
        assert_eq!(store.value(AttrId::new(0), 3).unwrap(), 42i32.to_le_bytes());

        let fields = [(AttrId::new(2), &b"new"[..])];
        let len = formatter.encode_patch_value_len(&fields);
        formatter.encode_patch_value(&fields, value.writable(len));
        value.set_pack_attr_id(pack_id);
        store.update(&value).unwrap();
        let packed = store.pack_value(pack_id, 3).unwrap();
        let decoded = formatter.decode(&packed).unwrap();
        assert_eq!(decoded, vec![&[1u8][..], &b"new"[..]]);

        value.set_is_sub_doc_id(true);
        assert!(store.update(&value).is_err());
        value.set_invalid();
        assert!(store.update(&value).is_err());
    }
}
