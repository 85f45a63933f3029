//! Entity schemas: wire types, load-time normalization and the TTL cache

mod cache;
mod fallback;
mod normalize;
mod types;

pub use cache::SchemaCache;
pub use fallback::fallback_schema;
pub use normalize::normalize_schema;
pub use types::{
    ConditionalOn, DataType, EntityName, FieldDefinition, FieldKind, LeafField, ListValues,
    SchemaDescriptor, SchemaMatch, SchemaSet, value_text,
};
