//! In-memory feature collections and schema-level operations.

use super::feature::Feature;
use super::field::{FieldDefinition, FieldKind, FieldValue};
use thiserror::Error;
use tracing::warn;

/// Schema mismatch while folding one collection into another.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A source field has no counterpart in the target schema and the
    /// caller asked for strict merging.
    #[error("field '{0}' not present in target schema")]
    UnknownField(String),

    /// Matching names but incompatible kinds.
    #[error("field '{name}' is {source_kind} in source but {target_kind} in target")]
    KindMismatch {
        name: String,
        source_kind: FieldKind,
        target_kind: FieldKind,
    },
}

/// Outcome of a lenient merge: which source fields were dropped.
#[derive(Debug, Default, Clone)]
pub struct MergeReport {
    pub merged_features: usize,
    pub dropped_fields: Vec<String>,
}

/// An ordered set of features sharing one schema.
///
/// Collections are exclusively owned by whichever pipeline stage holds
/// them; they move across stage boundaries, they are never shared for
/// concurrent mutation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    /// Engine-defined geometry type code (e.g. multi-polygon).
    pub geometry_type: u32,
    /// Spatial reference text, may be empty.
    pub spatial_ref: String,
    pub fields: Vec<FieldDefinition>,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates an empty collection with the given geometry type and
    /// spatial reference.
    pub fn new(geometry_type: u32, spatial_ref: impl Into<String>) -> Self {
        Self {
            geometry_type,
            spatial_ref: spatial_ref.into(),
            fields: Vec::new(),
            features: Vec::new(),
        }
    }

    /// Empty collection copying another collection's header and schema.
    pub fn empty_like(other: &FeatureCollection) -> Self {
        Self {
            geometry_type: other.geometry_type,
            spatial_ref: other.spatial_ref.clone(),
            fields: other.fields.clone(),
            features: Vec::new(),
        }
    }

    /// Empty collection with an explicit schema.
    pub fn with_schema(
        geometry_type: u32,
        spatial_ref: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Self {
        Self {
            geometry_type,
            spatial_ref: spatial_ref.into(),
            fields,
            features: Vec::new(),
        }
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Index of a field by exact name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Appends a field to the schema and a null slot to every existing
    /// feature. Duplicate names are rejected.
    pub fn add_field(&mut self, def: FieldDefinition) -> Result<usize, MergeError> {
        if self.field_index(&def.name).is_some() {
            return Err(MergeError::UnknownField(def.name));
        }
        self.fields.push(def);
        for feature in &mut self.features {
            feature.values.push(None);
        }
        Ok(self.fields.len() - 1)
    }

    /// Appends a feature. The value slot count must match the schema.
    pub fn push_feature(&mut self, feature: Feature) {
        debug_assert_eq!(feature.values.len(), self.fields.len());
        self.features.push(feature);
    }

    /// Folds `other` into this collection by field-name match.
    ///
    /// Values are routed through a source→target index map built once
    /// per call. A source field absent from this schema is dropped with
    /// a warning in lenient mode and is an error in strict mode; a
    /// same-named field with a different kind is always an error.
    pub fn merge_by_name(
        &mut self,
        other: FeatureCollection,
        strict: bool,
    ) -> Result<MergeReport, MergeError> {
        let mut mapping: Vec<Option<usize>> = Vec::with_capacity(other.fields.len());
        let mut report = MergeReport::default();

        for src in &other.fields {
            match self.field_index(&src.name) {
                Some(dst) => {
                    if self.fields[dst].kind != src.kind {
                        return Err(MergeError::KindMismatch {
                            name: src.name.clone(),
                            source_kind: src.kind,
                            target_kind: self.fields[dst].kind,
                        });
                    }
                    mapping.push(Some(dst));
                }
                None => {
                    if strict {
                        return Err(MergeError::UnknownField(src.name.clone()));
                    }
                    warn!(field = %src.name, "dropping field with no counterpart in output schema");
                    report.dropped_fields.push(src.name.clone());
                    mapping.push(None);
                }
            }
        }

        for feature in other.features {
            let mut out = Feature::new(feature.id, self.fields.len());
            out.geometry = feature.geometry;
            for (src_idx, value) in feature.values.into_iter().enumerate() {
                if let (Some(Some(dst_idx)), Some(v)) = (mapping.get(src_idx), value) {
                    out.values[*dst_idx] = Some(v);
                }
            }
            self.features.push(out);
            report.merged_features += 1;
        }

        Ok(report)
    }

    /// Copy of this collection with an injected int64 identifier field.
    ///
    /// Values are drawn from `next_id`, incremented per feature, so ids
    /// stay unique across every collection tagged within one job.
    pub fn with_identifier_field(&self, field_name: &str, next_id: &mut i64) -> FeatureCollection {
        let mut out = self.clone();
        out.fields
            .push(FieldDefinition::new(field_name, FieldKind::Int64));
        for feature in &mut out.features {
            feature.values.push(Some(FieldValue::Int64(*next_id)));
            *next_id += 1;
        }
        out
    }

    /// Removes every field whose name contains `needle` (case
    /// insensitive), together with the matching value slots. Returns
    /// the names removed.
    ///
    /// Used to strip synthetic group-id columns after reassembly,
    /// including prefixed copies contributed by the right-hand input.
    pub fn drop_fields_containing(&mut self, needle: &str) -> Vec<String> {
        let needle = needle.to_ascii_lowercase();
        let doomed: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name.to_ascii_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        // Remove back-to-front so earlier indices stay valid.
        for &idx in doomed.iter().rev() {
            removed.push(self.fields.remove(idx).name);
            for feature in &mut self.features {
                feature.values.remove(idx);
            }
        }
        removed.reverse();
        removed
    }
}
