//! Attribute schema definitions: plain attributes, pack attributes and the
//! validation rules that tie them together.
//!
//! A schema is either assembled through [`SchemaBuilder`] or loaded from its
//! JSON representation with [`PartitionSchema::from_json`].

pub mod attribute;
pub mod error;
pub mod field_type;
pub mod ids;
pub mod schema;
pub mod schema_builder;

pub use attribute::{AttributeConfig, CompressType, PackAttributeConfig};
pub use error::ConfigError;
pub use field_type::FieldType;
pub use ids::{AttrId, PackAttrId};
pub use schema::{AttributeSchema, PartitionSchema};
pub use schema_builder::{AttributeDef, PackDef, SchemaBuilder};
