//! Byte layouts of pack attribute values.
//!
//! A stored pack value places the fixed-length sub attributes at fixed offsets,
//! in declaration order, followed by every variable-length sub attribute as
//! `len u32 | bytes`.
//!
//! A pack *patch* carries only the sub attributes that changed:
//!
//! ```text
//! count u32 | (attr_id u32 | len u32 | bytes)*
//! ```

use std::sync::Arc;

use ahash::AHashMap;

use segpatch_common::{Result, error::Error, verify_data};
use segpatch_config::{AttrId, PackAttributeConfig};

const COUNT_SIZE: usize = 4;
const FIELD_HEADER_SIZE: usize = 8;

/// Encodes the sub attribute updates of one document into a pack patch.
pub trait PackPatchEncoder: Send + Sync {
    /// Upper bound of the encoding length for values of the given maximum
    /// lengths. 0 when nothing can be encoded.
    fn max_encode_patch_value_len(&self, lens: &[(AttrId, usize)]) -> usize;

    /// Exact encoding length of `values`, 0 when they cannot be encoded.
    fn encode_patch_value_len(&self, values: &[(AttrId, &[u8])]) -> usize;

    /// Writes the encoding of `values` into `out`; returns the bytes written,
    /// 0 on failure.
    fn encode_patch_value(&self, values: &[(AttrId, &[u8])], out: &mut [u8]) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct SubField {
    /// Position in the pack's sub attribute list.
    index: usize,
    /// Offset in the fixed region, `None` for variable-length fields.
    fixed_offset: Option<usize>,
    fixed_len: Option<usize>,
}

/// Encodes and decodes the values and patches of one pack attribute.
#[derive(Debug, Clone)]
pub struct PackAttributeFormatter {
    pack: Arc<PackAttributeConfig>,
    fields: AHashMap<AttrId, SubField>,
    fixed_region_len: usize,
}

impl PackAttributeFormatter {
    pub fn new(pack: Arc<PackAttributeConfig>) -> PackAttributeFormatter {
        let mut fields = AHashMap::with_capacity(pack.sub_attributes().len());
        let mut offset = 0;
        for (index, attr) in pack.sub_attributes().iter().enumerate() {
            let fixed_len = attr.fixed_value_len();
            let fixed_offset = fixed_len.map(|len| {
                let start = offset;
                offset += len;
                start
            });
            fields.insert(
                attr.attr_id(),
                SubField {
                    index,
                    fixed_offset,
                    fixed_len,
                },
            );
        }
        PackAttributeFormatter {
            pack,
            fields,
            fixed_region_len: offset,
        }
    }

    pub fn pack_config(&self) -> &Arc<PackAttributeConfig> {
        &self.pack
    }

    /// Exact length of the patch encoding of `values`, or 0 when they cannot be
    /// encoded (no values, or an attribute that is not part of this pack).
    pub fn encode_patch_value_len(&self, values: &[(AttrId, &[u8])]) -> usize {
        self.max_encode_patch_value_len(values.iter().map(|(id, data)| (*id, data.len())))
    }

    /// Upper bound of the patch encoding length for sub attribute values of the
    /// given maximum lengths. 0 when the input is empty or foreign.
    pub fn max_encode_patch_value_len(
        &self,
        lens: impl IntoIterator<Item = (AttrId, usize)>,
    ) -> usize {
        let mut total = COUNT_SIZE;
        let mut count = 0;
        for (attr_id, len) in lens {
            if !self.fields.contains_key(&attr_id) {
                return 0;
            }
            total += FIELD_HEADER_SIZE + len;
            count += 1;
        }
        if count == 0 { 0 } else { total }
    }

    /// Writes the patch encoding of `values` into `out` and returns the number
    /// of bytes written; 0 on failure.
    pub fn encode_patch_value(&self, values: &[(AttrId, &[u8])], out: &mut [u8]) -> usize {
        let len = self.encode_patch_value_len(values);
        if len == 0 || out.len() < len {
            return 0;
        }
        out[..COUNT_SIZE].copy_from_slice(&(values.len() as u32).to_le_bytes());
        let mut pos = COUNT_SIZE;
        for (attr_id, data) in values {
            out[pos..pos + 4].copy_from_slice(&attr_id.as_u32().to_le_bytes());
            out[pos + 4..pos + 8].copy_from_slice(&(data.len() as u32).to_le_bytes());
            pos += FIELD_HEADER_SIZE;
            out[pos..pos + data.len()].copy_from_slice(data);
            pos += data.len();
        }
        pos
    }

    pub fn decode_patch_value<'a>(&self, patch: &'a [u8]) -> Result<Vec<(AttrId, &'a [u8])>> {
        verify_data!(patch, patch.len() >= COUNT_SIZE);
        let count = read_u32(patch, 0) as usize;
        let mut pos = COUNT_SIZE;
        let mut values = Vec::with_capacity(count.min(self.fields.len()));
        for _ in 0..count {
            verify_data!(patch, patch.len() - pos >= FIELD_HEADER_SIZE);
            let attr_id = AttrId::new(read_u32(patch, pos));
            let len = read_u32(patch, pos + 4) as usize;
            pos += FIELD_HEADER_SIZE;
            verify_data!(patch, patch.len() - pos >= len);
            let field = self.field(attr_id)?;
            if let Some(fixed_len) = field.fixed_len {
                verify_data!(patch, len == fixed_len);
            }
            values.push((attr_id, &patch[pos..pos + len]));
            pos += len;
        }
        verify_data!(patch, pos == patch.len());
        Ok(values)
    }

    /// Encodes a full pack value; `values` follows the sub attribute order.
    pub fn encode(&self, values: &[&[u8]]) -> Result<Vec<u8>> {
        let subs = self.pack.sub_attributes();
        if values.len() != subs.len() {
            return Err(Error::invalid_arg(
                "values",
                format!(
                    "pack '{}' has {} sub attributes, got {} values",
                    self.pack.name(),
                    subs.len(),
                    values.len()
                ),
            ));
        }
        let mut out = vec![0u8; self.fixed_region_len];
        for (attr, value) in subs.iter().zip(values) {
            let field = self.fields[&attr.attr_id()];
            match (field.fixed_offset, field.fixed_len) {
                (Some(offset), Some(len)) => {
                    if value.len() != len {
                        return Err(Error::invalid_arg(
                            attr.name(),
                            format!("expected {len} bytes, got {}", value.len()),
                        ));
                    }
                    out[offset..offset + len].copy_from_slice(value);
                }
                _ => {
                    let len = u32::try_from(value.len())
                        .map_err(|_| Error::invalid_arg(attr.name(), "value exceeds 4GiB"))?;
                    out.extend_from_slice(&len.to_le_bytes());
                    out.extend_from_slice(value);
                }
            }
        }
        Ok(out)
    }

    /// Splits a stored pack value into its sub attribute values.
    pub fn decode<'a>(&self, packed: &'a [u8]) -> Result<Vec<&'a [u8]>> {
        verify_data!(packed, packed.len() >= self.fixed_region_len);
        let mut pos = self.fixed_region_len;
        let mut values = Vec::with_capacity(self.pack.sub_attributes().len());
        for attr in self.pack.sub_attributes() {
            let field = self.fields[&attr.attr_id()];
            match (field.fixed_offset, field.fixed_len) {
                (Some(offset), Some(len)) => values.push(&packed[offset..offset + len]),
                _ => {
                    verify_data!(packed, packed.len() - pos >= 4);
                    let len = read_u32(packed, pos) as usize;
                    pos += 4;
                    verify_data!(packed, packed.len() - pos >= len);
                    values.push(&packed[pos..pos + len]);
                    pos += len;
                }
            }
        }
        verify_data!(packed, pos == packed.len());
        Ok(values)
    }

    /// Applies a pack patch to a stored value. A missing value starts out with
    /// zeroed fixed fields and empty variable-length fields.
    pub fn merge_patch(&self, old: Option<&[u8]>, patch: &[u8]) -> Result<Vec<u8>> {
        let mut values = match old {
            Some(old) => self.decode(old)?,
            None => self.default_values(),
        };
        for (attr_id, data) in self.decode_patch_value(patch)? {
            let field = self.field(attr_id)?;
            values[field.index] = data;
        }
        self.encode(&values)
    }

    fn default_values(&self) -> Vec<&[u8]> {
        const ZEROS: [u8; 8] = [0; 8];
        self.pack
            .sub_attributes()
            .iter()
            .map(|attr| match attr.fixed_value_len() {
                Some(len) => &ZEROS[..len],
                None => &[][..],
            })
            .collect()
    }

    fn field(&self, attr_id: AttrId) -> Result<SubField> {
        self.fields.get(&attr_id).copied().ok_or_else(|| {
            Error::invalid_arg(
                "attr_id",
                format!("attribute {attr_id} is not part of pack '{}'", self.pack.name()),
            )
        })
    }
}

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

impl PackPatchEncoder for PackAttributeFormatter {
    fn max_encode_patch_value_len(&self, lens: &[(AttrId, usize)]) -> usize {
        PackAttributeFormatter::max_encode_patch_value_len(self, lens.iter().copied())
    }

    fn encode_patch_value_len(&self, values: &[(AttrId, &[u8])]) -> usize {
        PackAttributeFormatter::encode_patch_value_len(self, values)
    }

    fn encode_patch_value(&self, values: &[(AttrId, &[u8])], out: &mut [u8]) -> usize {
        PackAttributeFormatter::encode_patch_value(self, values, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segpatch_config::{AttributeDef, FieldType, PackDef, SchemaBuilder};

    fn formatter() -> PackAttributeFormatter {
        let schema = SchemaBuilder::new(
            vec![
                AttributeDef::new("stock", FieldType::UInt16),
                AttributeDef::new("title", FieldType::String).updatable(true),
                AttributeDef::new("price", FieldType::Int32),
                AttributeDef::new("other", FieldType::Int32),
            ],
            vec![PackDef::new("pack", ["stock", "title", "price"])],
        )
        .finish()
        .unwrap();
        PackAttributeFormatter::new(schema.packs()[0].clone())
    }

    #[test]
    fn test_patch_encoding() {
        let f = formatter();
        let values = [(AttrId::new(2), &7i32.to_le_bytes()[..]), (AttrId::new(1), &b"hat"[..])];
        let len = f.encode_patch_value_len(&values);
        assert_eq!(len, 4 + 8 + 4 + 8 + 3);
        let mut out = vec![0u8; 64];
        assert_eq!(f.encode_patch_value(&values, &mut out), len);
        let decoded = f.decode_patch_value(&out[..len]).unwrap();
        assert_eq!(decoded, values.to_vec());

        let mut short = vec![0u8; len - 1];
        assert_eq!(f.encode_patch_value(&values, &mut short), 0);
    }

    #[test]
    fn test_encode_len_is_zero_for_bad_input() {
        let f = formatter();
        assert_eq!(f.encode_patch_value_len(&[]), 0);
        assert_eq!(f.encode_patch_value_len(&[(AttrId::new(3), &[0u8; 4][..])]), 0);
        assert_eq!(
            f.max_encode_patch_value_len([(AttrId::new(0), 2), (AttrId::new(1), 10)]),
            4 + 10 + 18
        );
    }

    #[test]
    fn test_full_value_layout() {
        let f = formatter();
        let packed = f
            .encode(&[&5u16.to_le_bytes()[..], &b"boots"[..], &9i32.to_le_bytes()[..]])
            .unwrap();
        // fixed region: stock (2) + price (4), then title
        assert_eq!(&packed[..2], &5u16.to_le_bytes());
        assert_eq!(&packed[2..6], &9i32.to_le_bytes());
        assert_eq!(&packed[6..10], &5u32.to_le_bytes());
        assert_eq!(&packed[10..], b"boots");
        let values = f.decode(&packed).unwrap();
        assert_eq!(values[1], b"boots");
        assert!(f.decode(&packed[..8]).is_err());
        assert!(f.encode(&[&b"x"[..], &b"y"[..], &b"z"[..]]).is_err());
    }

    #[test]
    fn test_merge_patch() {
        let f = formatter();
        let old = f
            .encode(&[&5u16.to_le_bytes()[..], &b"boots"[..], &9i32.to_le_bytes()[..]])
            .unwrap();
        let values = [(AttrId::new(1), &b"sandals"[..])];
        let mut patch = vec![0u8; f.encode_patch_value_len(&values)];
        f.encode_patch_value(&values, &mut patch);

        let merged = f.merge_patch(Some(old.as_slice()), &patch).unwrap();
        let decoded = f.decode(&merged).unwrap();
        assert_eq!(decoded[0], 5u16.to_le_bytes());
        assert_eq!(decoded[1], b"sandals");
        assert_eq!(decoded[2], 9i32.to_le_bytes());

        let fresh = f.merge_patch(None, &patch).unwrap();
        let decoded = f.decode(&fresh).unwrap();
        assert_eq!(decoded[0], [0, 0]);
        assert_eq!(decoded[2], [0, 0, 0, 0]);
    }
}
