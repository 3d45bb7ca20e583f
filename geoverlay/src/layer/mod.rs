//! The in-memory data model: field definitions, features, and feature
//! collections, plus the schema-level merge machinery used when tile
//! results fold back into one output.

mod collection;
mod feature;
mod field;
mod strategy;

pub use collection::{FeatureCollection, MergeError, MergeReport};
pub use feature::{Feature, Geometry};
pub use field::{FieldDefinition, FieldKind, FieldValue};
pub use strategy::{build_result_schema, FieldMergeStrategy, RIGHT_FIELD_PREFIX};
