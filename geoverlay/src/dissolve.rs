//! Reassembly of tile-split features.
//!
//! Tiling duplicates any feature that straddles a tile boundary: each
//! tile's overlay emits its own fragment carrying the same synthetic
//! group id. This pass folds those fragments back into one feature per
//! group, unioning the fragment geometries through the engine and
//! taking the attributes from the first fragment seen.

use crate::engine::{EngineError, GeometryEngine};
use crate::layer::{Feature, FeatureCollection, FieldValue};
use std::collections::HashMap;
use tracing::debug;

/// Folds every run of features sharing a group-field tuple into one.
///
/// Group fields are all fields whose name contains `marker` (case
/// insensitive), which also catches prefixed copies contributed by the
/// right-hand input. Features land in first-seen order; fragments with
/// no geometry contribute attributes only. The group fields themselves
/// stay in the schema; the caller strips them once the result is final.
pub fn dissolve_by_marker(
    engine: &dyn GeometryEngine,
    collection: FeatureCollection,
    marker: &str,
) -> Result<FeatureCollection, EngineError> {
    let needle = marker.to_ascii_lowercase();
    let group_slots: Vec<usize> = collection
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.name.to_ascii_lowercase().contains(&needle))
        .map(|(i, _)| i)
        .collect();

    // Nothing to group by: every feature is its own group.
    if group_slots.is_empty() {
        return Ok(collection);
    }

    let mut order: Vec<Vec<Feature>> = Vec::new();
    let mut groups: HashMap<String, usize> = HashMap::new();

    for feature in collection.features {
        let key = group_key(&feature, &group_slots);
        let slot = *groups.entry(key).or_insert_with(|| {
            order.push(Vec::new());
            order.len() - 1
        });
        order[slot].push(feature);
    }

    let mut out = FeatureCollection::with_schema(
        collection.geometry_type,
        collection.spatial_ref,
        collection.fields,
    );

    let group_count = order.len();
    for (next_id, members) in order.into_iter().enumerate() {
        let geometries: Vec<&_> = members
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .collect();

        let geometry = match geometries.len() {
            0 => None,
            // A lone fragment passes through untouched.
            1 => Some(geometries[0].clone()),
            _ => Some(engine.union_geometries(&geometries)?),
        };

        let mut merged = members
            .into_iter()
            .next()
            .unwrap_or_else(|| Feature::new(0, out.fields.len()));
        merged.id = next_id as i64;
        merged.geometry = geometry;
        out.push_feature(merged);
    }

    debug!(groups = group_count, "dissolved tile fragments");
    Ok(out)
}

/// Deterministic map key over a feature's group-field values.
fn group_key(feature: &Feature, slots: &[usize]) -> String {
    let mut key = String::new();
    for &slot in slots {
        match feature.values.get(slot) {
            Some(Some(FieldValue::Int64(v))) => key.push_str(&v.to_string()),
            Some(Some(other)) => key.push_str(&format!("{:?}", other)),
            _ => key.push_str("<null>"),
        }
        key.push('\u{1f}');
    }
    key
}
