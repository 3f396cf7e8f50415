use std::sync::Arc;

use crate::{AttrId, ConfigError, FieldType, PackAttrId};

/// Configuration of one attribute field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeConfig {
    attr_id: AttrId,
    name: String,
    field_type: FieldType,
    multi_value: bool,
    updatable: bool,
    pack_id: Option<PackAttrId>,
}

impl AttributeConfig {
    pub(crate) fn new(
        attr_id: AttrId,
        name: String,
        field_type: FieldType,
        multi_value: bool,
        updatable: Option<bool>,
    ) -> AttributeConfig {
        let fixed = !multi_value && field_type.is_numeric();
        AttributeConfig {
            attr_id,
            name,
            field_type,
            multi_value,
            // Single-value numerics are updated in place, so they are updatable
            // unless switched off; var-length values must opt in.
            updatable: updatable.unwrap_or(fixed),
            pack_id: None,
        }
    }

    pub fn attr_id(&self) -> AttrId {
        self.attr_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_multi_value(&self) -> bool {
        self.multi_value
    }

    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    /// Pack attribute this field is stored in, if any.
    pub fn pack_id(&self) -> Option<PackAttrId> {
        self.pack_id
    }

    pub fn is_pack_member(&self) -> bool {
        self.pack_id.is_some()
    }

    /// Encoded length of every value of this attribute, or `None` when values
    /// are variable-length (strings and multi-value fields).
    pub fn fixed_value_len(&self) -> Option<usize> {
        if self.multi_value {
            None
        } else {
            self.field_type.value_width()
        }
    }

    pub(crate) fn set_pack_id(&mut self, pack_id: PackAttrId) {
        self.pack_id = Some(pack_id);
    }
}

/// Value-level compression applied to a pack attribute's stored blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CompressType {
    pub uniq: bool,
    pub equal: bool,
}

impl CompressType {
    /// Parses a `|`-separated compress list (`"uniq"`, `"equal"`, `"uniq|equal"`).
    pub fn parse(pack: &str, compress: &str) -> Result<CompressType, ConfigError> {
        let mut result = CompressType::default();
        for item in compress.split('|').map(str::trim).filter(|s| !s.is_empty()) {
            match item {
                "uniq" if !result.uniq => result.uniq = true,
                "equal" if !result.equal => result.equal = true,
                _ => {
                    return Err(ConfigError::InvalidCompressType {
                        pack: pack.to_string(),
                        compress: compress.to_string(),
                    });
                }
            }
        }
        Ok(result)
    }
}

/// Configuration of a pack attribute: several attributes physically stored as
/// one concatenated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackAttributeConfig {
    pack_id: PackAttrId,
    name: String,
    sub_attributes: Vec<Arc<AttributeConfig>>,
    compress_type: CompressType,
}

impl PackAttributeConfig {
    pub(crate) fn new(
        pack_id: PackAttrId,
        name: String,
        sub_attributes: Vec<Arc<AttributeConfig>>,
        compress_type: CompressType,
    ) -> PackAttributeConfig {
        PackAttributeConfig {
            pack_id,
            name,
            sub_attributes,
            compress_type,
        }
    }

    pub fn pack_id(&self) -> PackAttrId {
        self.pack_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sub attributes in storage order.
    pub fn sub_attributes(&self) -> &[Arc<AttributeConfig>] {
        &self.sub_attributes
    }

    pub fn compress_type(&self) -> CompressType {
        self.compress_type
    }

    /// True when at least one sub attribute can receive patches.
    pub fn is_updatable(&self) -> bool {
        self.sub_attributes.iter().any(|attr| attr.is_updatable())
    }

    pub fn has_var_len_field(&self) -> bool {
        self.sub_attributes
            .iter()
            .any(|attr| attr.fixed_value_len().is_none())
    }

    /// Size of the fixed-offset region at the head of every packed value.
    pub fn fixed_region_len(&self) -> usize {
        self.sub_attributes
            .iter()
            .filter_map(|attr| attr.fixed_value_len())
            .sum()
    }
}
