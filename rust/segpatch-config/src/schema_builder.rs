use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    AttrId, AttributeConfig, AttributeSchema, CompressType, ConfigError, FieldType, PackAttrId,
    PackAttributeConfig,
};

/// Declaration of one attribute field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub multi_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updatable: Option<bool>,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> AttributeDef {
        AttributeDef {
            name: name.into(),
            field_type,
            multi_value: false,
            updatable: None,
        }
    }

    pub fn multi_value(mut self) -> AttributeDef {
        self.multi_value = true;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> AttributeDef {
        self.updatable = Some(updatable);
        self
    }
}

/// Declaration of a pack attribute; members refer to declared attributes by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackDef {
    pub name: String,
    pub sub_attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress_type: Option<String>,
}

impl PackDef {
    pub fn new<I, S>(name: impl Into<String>, sub_attributes: I) -> PackDef
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PackDef {
            name: name.into(),
            sub_attributes: sub_attributes.into_iter().map(Into::into).collect(),
            compress_type: None,
        }
    }

    pub fn with_compress_type(mut self, compress: impl Into<String>) -> PackDef {
        self.compress_type = Some(compress.into());
        self
    }
}

/// A builder for an [`AttributeSchema`].
///
/// Declarations are collected as-is; every consistency rule is checked in
/// [`SchemaBuilder::finish`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    attributes: Vec<AttributeDef>,
    packs: Vec<PackDef>,
}

impl SchemaBuilder {
    pub fn new(attributes: Vec<AttributeDef>, packs: Vec<PackDef>) -> SchemaBuilder {
        SchemaBuilder { attributes, packs }
    }

    pub fn add_attribute(&mut self, attribute: AttributeDef) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn add_pack(&mut self, pack: PackDef) -> &mut Self {
        self.packs.push(pack);
        self
    }

    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    pub fn packs(&self) -> &[PackDef] {
        &self.packs
    }

    /// Validates the declarations and assigns attribute and pack ids.
    pub fn finish(self) -> Result<AttributeSchema, ConfigError> {
        let mut name_to_id = AHashMap::with_capacity(self.attributes.len());
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for (i, def) in self.attributes.into_iter().enumerate() {
            if name_to_id.insert(def.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateAttributeName(def.name));
            }
            attributes.push(AttributeConfig::new(
                AttrId::from(i),
                def.name,
                def.field_type,
                def.multi_value,
                def.updatable,
            ));
        }

        let mut pack_names = AHashMap::with_capacity(self.packs.len());
        let mut compress_types = Vec::with_capacity(self.packs.len());
        let mut members = Vec::with_capacity(self.packs.len());
        for (i, pack) in self.packs.iter().enumerate() {
            let pack_id = PackAttrId::from(i);
            if name_to_id.contains_key(&pack.name)
                || pack_names.insert(pack.name.clone(), pack_id).is_some()
            {
                return Err(ConfigError::DuplicatePackName(pack.name.clone()));
            }
            if pack.sub_attributes.is_empty() {
                return Err(ConfigError::EmptyPackAttribute(pack.name.clone()));
            }
            compress_types.push(CompressType::parse(
                &pack.name,
                pack.compress_type.as_deref().unwrap_or_default(),
            )?);

            let mut ids = Vec::with_capacity(pack.sub_attributes.len());
            for member in &pack.sub_attributes {
                let &idx = name_to_id
                    .get(member)
                    .ok_or_else(|| ConfigError::UnknownPackMember {
                        pack: pack.name.clone(),
                        attribute: member.clone(),
                    })?;
                let attr: &mut AttributeConfig = &mut attributes[idx];
                if let Some(other) = attr.pack_id() {
                    return Err(ConfigError::AttributeInMultiplePacks {
                        attribute: member.clone(),
                        first: self.packs[other.as_usize()].name.clone(),
                        second: pack.name.clone(),
                    });
                }
                attr.set_pack_id(pack_id);
                ids.push(idx);
            }
            members.push(ids);
        }

        let attributes = attributes.into_iter().map(Arc::new).collect::<Vec<_>>();
        let packs = self
            .packs
            .into_iter()
            .zip(compress_types)
            .zip(members)
            .enumerate()
            .map(|(i, ((pack, compress), ids))| {
                let subs = ids.into_iter().map(|idx| attributes[idx].clone()).collect();
                Arc::new(PackAttributeConfig::new(
                    PackAttrId::from(i),
                    pack.name,
                    subs,
                    compress,
                ))
            })
            .collect();
        Ok(AttributeSchema::new(attributes, packs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SchemaBuilder {
        let mut builder = SchemaBuilder::default();
        builder
            .add_attribute(AttributeDef::new("a", FieldType::Int32))
            .add_attribute(AttributeDef::new("b", FieldType::String).updatable(true))
            .add_attribute(AttributeDef::new("c", FieldType::UInt8));
        builder
    }

    #[test]
    fn test_duplicate_attribute() {
        let mut b = builder();
        b.add_attribute(AttributeDef::new("a", FieldType::Int64));
        assert!(matches!(
            b.finish(),
            Err(ConfigError::DuplicateAttributeName(name)) if name == "a"
        ));
    }

    #[test]
    fn test_pack_errors() {
        let mut b = builder();
        b.add_pack(PackDef::new("p", ["a", "x"]));
        assert!(matches!(b.finish(), Err(ConfigError::UnknownPackMember { .. })));

        let mut b = builder();
        b.add_pack(PackDef::new("p", Vec::<String>::new()));
        assert!(matches!(b.finish(), Err(ConfigError::EmptyPackAttribute(_))));

        let mut b = builder();
        b.add_pack(PackDef::new("a", ["b"]));
        assert!(matches!(b.finish(), Err(ConfigError::DuplicatePackName(_))));

        let mut b = builder();
        b.add_pack(PackDef::new("p", ["a"]))
            .add_pack(PackDef::new("q", ["c", "a"]));
        assert!(matches!(
            b.finish(),
            Err(ConfigError::AttributeInMultiplePacks { attribute, first, second })
                if attribute == "a" && first == "p" && second == "q"
        ));

        let mut b = builder();
        b.add_pack(PackDef::new("p", ["a"]).with_compress_type("lz4"));
        assert!(matches!(b.finish(), Err(ConfigError::InvalidCompressType { .. })));
    }

    #[test]
    fn test_finish_assigns_ids() {
        let mut b = builder();
        b.add_pack(PackDef::new("p", ["c", "b"]));
        let schema = b.finish().unwrap();
        let pack = schema.pack(PackAttrId::new(0)).unwrap();
        assert_eq!(pack.sub_attributes()[0].attr_id(), AttrId::new(2));
        assert_eq!(pack.sub_attributes()[1].attr_id(), AttrId::new(1));
        assert_eq!(schema.updatable_attributes().count(), 1);
        assert_eq!(schema.updatable_packs().count(), 1);
        assert_eq!(schema.attribute_id_bound(), 3);
    }
}
