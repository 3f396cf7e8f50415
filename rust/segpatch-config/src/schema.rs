use std::sync::Arc;

use ahash::AHashMap;
use serde::Deserialize;

use crate::{
    AttrId, AttributeConfig, ConfigError, PackAttrId, PackAttributeConfig,
    schema_builder::{AttributeDef, PackDef, SchemaBuilder},
};

/// Attribute fields of one document scope (main or sub documents).
#[derive(Debug, Clone, Default)]
pub struct AttributeSchema {
    /// All attributes, indexed by `AttrId`. Pack members included.
    attributes: Vec<Arc<AttributeConfig>>,
    /// Pack attributes, indexed by `PackAttrId`.
    packs: Vec<Arc<PackAttributeConfig>>,
    attribute_map: AHashMap<String, AttrId>,
    pack_map: AHashMap<String, PackAttrId>,
}

impl AttributeSchema {
    pub(crate) fn new(
        attributes: Vec<Arc<AttributeConfig>>,
        packs: Vec<Arc<PackAttributeConfig>>,
    ) -> AttributeSchema {
        let attribute_map = attributes
            .iter()
            .map(|attr| (attr.name().to_string(), attr.attr_id()))
            .collect();
        let pack_map = packs
            .iter()
            .map(|pack| (pack.name().to_string(), pack.pack_id()))
            .collect();
        AttributeSchema {
            attributes,
            packs,
            attribute_map,
            pack_map,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// All attributes in declaration order, pack members included.
    pub fn attributes(&self) -> &[Arc<AttributeConfig>] {
        &self.attributes
    }

    pub fn attribute(&self, attr_id: AttrId) -> Option<&Arc<AttributeConfig>> {
        self.attributes.get(attr_id.as_usize())
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Arc<AttributeConfig>> {
        self.attribute_map
            .get(name)
            .map(|id| &self.attributes[id.as_usize()])
    }

    pub fn packs(&self) -> &[Arc<PackAttributeConfig>] {
        &self.packs
    }

    pub fn pack(&self, pack_id: PackAttrId) -> Option<&Arc<PackAttributeConfig>> {
        self.packs.get(pack_id.as_usize())
    }

    pub fn find_pack(&self, name: &str) -> Option<&Arc<PackAttributeConfig>> {
        self.pack_map.get(name).map(|id| &self.packs[id.as_usize()])
    }

    /// Updatable attributes that are stored on their own (not in a pack).
    pub fn updatable_attributes(&self) -> impl Iterator<Item = &Arc<AttributeConfig>> {
        self.attributes
            .iter()
            .filter(|attr| attr.is_updatable() && !attr.is_pack_member())
    }

    /// Pack attributes with at least one updatable sub attribute.
    pub fn updatable_packs(&self) -> impl Iterator<Item = &Arc<PackAttributeConfig>> {
        self.packs.iter().filter(|pack| pack.is_updatable())
    }

    /// Largest attribute id plus one.
    pub fn attribute_id_bound(&self) -> usize {
        self.attributes.len()
    }
}

/// Attribute schemas of a partition: the main document scope and, when the
/// index carries nested documents, the sub document scope.
#[derive(Debug, Clone, Default)]
pub struct PartitionSchema {
    main: AttributeSchema,
    sub: Option<AttributeSchema>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PartitionSchemaDef {
    #[serde(default)]
    attributes: Vec<AttributeDef>,
    #[serde(default)]
    pack_attributes: Vec<PackDef>,
    #[serde(default)]
    sub_attributes: Vec<AttributeDef>,
    #[serde(default)]
    sub_pack_attributes: Vec<PackDef>,
}

impl PartitionSchema {
    pub fn new(main: AttributeSchema, sub: Option<AttributeSchema>) -> PartitionSchema {
        PartitionSchema { main, sub }
    }

    /// Loads and validates a schema from its JSON form.
    pub fn from_json(json: &str) -> Result<PartitionSchema, ConfigError> {
        let def: PartitionSchemaDef = serde_json::from_str(json)?;
        let main = SchemaBuilder::new(def.attributes, def.pack_attributes).finish()?;
        let sub = if def.sub_attributes.is_empty() {
            None
        } else {
            Some(SchemaBuilder::new(def.sub_attributes, def.sub_pack_attributes).finish()?)
        };
        Ok(PartitionSchema { main, sub })
    }

    pub fn main(&self) -> &AttributeSchema {
        &self.main
    }

    pub fn sub(&self) -> Option<&AttributeSchema> {
        self.sub.as_ref()
    }

    pub fn attribute_schema(&self, is_sub: bool) -> Option<&AttributeSchema> {
        if is_sub { self.sub() } else { Some(&self.main) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;

    const SCHEMA: &str = r#"{
        "attributes": [
            {"name": "price", "type": "int32"},
            {"name": "title", "type": "string", "updatable": true},
            {"name": "tags", "type": "int64", "multi_value": true},
            {"name": "stock", "type": "uint16"},
            {"name": "score", "type": "double", "updatable": false}
        ],
        "pack_attributes": [
            {"name": "pack_a", "sub_attributes": ["stock", "title"], "compress_type": "uniq"}
        ],
        "sub_attributes": [
            {"name": "sku_price", "type": "float"}
        ]
    }"#;

    #[test]
    fn test_schema_from_json() {
        let schema = PartitionSchema::from_json(SCHEMA).unwrap();
        let main = schema.main();
        assert_eq!(main.attributes().len(), 5);
        assert_eq!(main.find_attribute("tags").unwrap().attr_id(), AttrId::new(2));
        assert_eq!(
            main.find_attribute("price").unwrap().field_type(),
            FieldType::Int32
        );

        let updatable = main
            .updatable_attributes()
            .map(|a| a.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(updatable, vec!["price"]);

        let pack = main.find_pack("pack_a").unwrap();
        assert_eq!(pack.pack_id(), PackAttrId::new(0));
        let members = pack
            .sub_attributes()
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>();
        assert_eq!(members, vec!["stock", "title"]);
        assert!(pack.has_var_len_field());
        assert_eq!(pack.fixed_region_len(), 2);
        assert!(pack.compress_type().uniq);
        assert_eq!(
            main.find_attribute("stock").unwrap().pack_id(),
            Some(PackAttrId::new(0))
        );

        let sub = schema.attribute_schema(true).unwrap();
        assert_eq!(sub.updatable_attributes().count(), 1);
    }

    #[test]
    fn test_schema_without_sub_scope() {
        let schema = PartitionSchema::from_json(r#"{"attributes": []}"#).unwrap();
        assert!(schema.main().is_empty());
        assert!(schema.attribute_schema(true).is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            PartitionSchema::from_json(r#"{"attributes": [{"name": "a"}]}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(PartitionSchema::from_json(r#"{"fields": []}"#).is_err());
    }
}
