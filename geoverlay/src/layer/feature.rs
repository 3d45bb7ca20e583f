//! Features: one geometry plus its attribute values.

use super::field::FieldValue;

/// Opaque geometry payload in the engine's wire form.
///
/// The core moves these bytes around and compares them for equality;
/// only the geometry engine interprets them.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry(pub Vec<u8>);

impl Geometry {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One record of a feature collection.
///
/// `values` is positional against the owning collection's schema: slot
/// `i` holds the value for field `i`, `None` meaning null/unset. The
/// identifier is assigned at materialization and is unrelated to any
/// source-format id.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: i64,
    pub geometry: Option<Geometry>,
    pub values: Vec<Option<FieldValue>>,
}

impl Feature {
    /// Creates a feature with every value slot unset.
    pub fn new(id: i64, field_count: usize) -> Self {
        Self {
            id,
            geometry: None,
            values: vec![None; field_count],
        }
    }

    /// Creates a feature carrying a geometry, values unset.
    pub fn with_geometry(id: i64, geometry: Geometry, field_count: usize) -> Self {
        Self {
            id,
            geometry: Some(geometry),
            values: vec![None; field_count],
        }
    }
}
