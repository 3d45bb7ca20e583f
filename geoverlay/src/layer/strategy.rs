//! Field-merge strategies for overlay result schemas.
//!
//! These decide which attribute columns the output collection carries;
//! they are purely schema-level and independent of the geometric
//! operation.

use super::collection::FeatureCollection;
use super::field::FieldDefinition;
use std::fmt;

/// Prefix applied to right-hand fields under [`FieldMergeStrategy::PrefixRight`].
pub const RIGHT_FIELD_PREFIX: &str = "r2_";

/// How the two input schemas combine into the result schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldMergeStrategy {
    /// Only the left (input) collection's fields.
    #[default]
    LeftOnly,
    /// Only the right (method) collection's fields.
    RightOnly,
    /// Both; on a name clash the left field wins.
    PreferLeft,
    /// Both; on a name clash the right field wins.
    PreferRight,
    /// Left fields as-is, every right field prefixed with [`RIGHT_FIELD_PREFIX`].
    PrefixRight,
}

impl fmt::Display for FieldMergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldMergeStrategy::LeftOnly => "left-only",
            FieldMergeStrategy::RightOnly => "right-only",
            FieldMergeStrategy::PreferLeft => "prefer-left",
            FieldMergeStrategy::PreferRight => "prefer-right",
            FieldMergeStrategy::PrefixRight => "prefix-right",
        };
        write!(f, "{}", name)
    }
}

/// Builds the output schema for an overlay of `left` and `right`.
pub fn build_result_schema(
    left: &FeatureCollection,
    right: &FeatureCollection,
    strategy: FieldMergeStrategy,
) -> Vec<FieldDefinition> {
    match strategy {
        FieldMergeStrategy::LeftOnly => left.fields.clone(),
        FieldMergeStrategy::RightOnly => right.fields.clone(),
        FieldMergeStrategy::PreferLeft => {
            let mut out = left.fields.clone();
            append_non_conflicting(&mut out, &right.fields);
            out
        }
        FieldMergeStrategy::PreferRight => {
            let mut out = right.fields.clone();
            append_non_conflicting(&mut out, &left.fields);
            out
        }
        FieldMergeStrategy::PrefixRight => {
            let mut out = left.fields.clone();
            for def in &right.fields {
                let prefixed = def.renamed(format!("{}{}", RIGHT_FIELD_PREFIX, def.name));
                if !out.iter().any(|f| f.name == prefixed.name) {
                    out.push(prefixed);
                }
            }
            out
        }
    }
}

fn append_non_conflicting(out: &mut Vec<FieldDefinition>, extra: &[FieldDefinition]) {
    for def in extra {
        if !out.iter().any(|f| f.name == def.name) {
            out.push(def.clone());
        }
    }
}
