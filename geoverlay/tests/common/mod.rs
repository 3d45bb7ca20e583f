//! Shared test fixtures: an axis-aligned-rectangle geometry engine.
//!
//! Geometries are 32-byte payloads holding `min_x, min_y, max_x, max_y`
//! as little-endian f64s. Overlays are plain rectangle algebra, which
//! is enough to exercise the whole pipeline end to end without a real
//! geometry library.

use geoverlay::engine::{
    EngineError, GeometryEngine, OverlayOp, OverlayOptions, ProgressHandle,
};
use geoverlay::geom::Rect;
use geoverlay::layer::{
    Feature, FeatureCollection, FieldDefinition, FieldKind, FieldValue, Geometry,
};

pub fn rect_geometry(rect: Rect) -> Geometry {
    let mut bytes = Vec::with_capacity(32);
    for v in [rect.min_x, rect.min_y, rect.max_x, rect.max_y] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    Geometry::new(bytes)
}

pub fn geometry_rect(geometry: &Geometry) -> Result<Rect, EngineError> {
    let bytes = geometry.as_bytes();
    if bytes.len() != 32 {
        return Err(EngineError::InvalidGeometry(format!(
            "expected 32-byte rect payload, got {}",
            bytes.len()
        )));
    }
    let mut parts = [0f64; 4];
    for (i, part) in parts.iter_mut().enumerate() {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
        *part = f64::from_le_bytes(buf);
    }
    Ok(Rect::new(parts[0], parts[1], parts[2], parts[3]))
}

/// Collection with a single `name` string field and one rect feature
/// per entry.
pub fn named_rect_collection(entries: &[(&str, Rect)]) -> FeatureCollection {
    let mut c = FeatureCollection::with_schema(
        6,
        "EPSG:4326",
        vec![FieldDefinition::new("name", FieldKind::String)],
    );
    for (i, (name, rect)) in entries.iter().enumerate() {
        let mut f = Feature::with_geometry(i as i64, rect_geometry(*rect), 1);
        f.values[0] = Some(FieldValue::String(name.to_string()));
        c.push_feature(f);
    }
    c
}

/// `(name, rect)` pairs of a result collection, sorted for comparison
/// independent of merge order.
pub fn named_rects(collection: &FeatureCollection) -> Vec<(String, Rect)> {
    let name_slot = collection
        .field_index("name")
        .expect("result collection has a name field");
    let mut out: Vec<(String, Rect)> = collection
        .features
        .iter()
        .map(|f| {
            let name = match &f.values[name_slot] {
                Some(FieldValue::String(s)) => s.clone(),
                _ => String::new(),
            };
            let rect = geometry_rect(f.geometry.as_ref().expect("feature has geometry")).unwrap();
            (name, rect)
        })
        .collect();
    out.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.min_x.total_cmp(&b.1.min_x))
            .then(a.1.min_y.total_cmp(&b.1.min_y))
    });
    out
}

/// Rectangle-algebra engine for pipeline tests.
///
/// Result collections carry the input side's schema and values;
/// intersection pairs every input rect with every method rect, erase
/// keeps input rects that touch no method rect, union concatenates
/// both sides.
pub struct RectEngine;

impl RectEngine {
    fn feature_rects(collection: &FeatureCollection) -> Result<Vec<(usize, Rect)>, EngineError> {
        let mut out = Vec::new();
        for (i, feature) in collection.features.iter().enumerate() {
            if let Some(geometry) = &feature.geometry {
                out.push((i, geometry_rect(geometry)?));
            }
        }
        Ok(out)
    }
}

impl GeometryEngine for RectEngine {
    fn overlay(
        &self,
        op: OverlayOp,
        input: &FeatureCollection,
        method: &FeatureCollection,
        _options: &OverlayOptions,
        progress: Option<&ProgressHandle>,
    ) -> Result<FeatureCollection, EngineError> {
        if let Some(handle) = progress {
            if handle.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
        }

        let input_rects = Self::feature_rects(input)?;
        let method_rects = Self::feature_rects(method)?;
        let mut out = FeatureCollection::empty_like(input);

        match op {
            OverlayOp::Intersection => {
                for &(i, a) in &input_rects {
                    for &(_, b) in &method_rects {
                        if let Some(shared) = a.intersection(&b) {
                            let mut f = input.features[i].clone();
                            f.geometry = Some(rect_geometry(shared));
                            out.push_feature(f);
                        }
                    }
                }
            }
            OverlayOp::Erase => {
                for &(i, a) in &input_rects {
                    if method_rects.iter().all(|&(_, b)| !a.intersects(&b)) {
                        out.push_feature(input.features[i].clone());
                    }
                }
            }
            OverlayOp::Union => {
                for &(i, _) in &input_rects {
                    out.push_feature(input.features[i].clone());
                }
                for &(i, b) in &method_rects {
                    let mut f = Feature::new(method.features[i].id, out.fields.len());
                    f.geometry = Some(rect_geometry(b));
                    out.push_feature(f);
                }
            }
            other => {
                return Err(EngineError::OperationFailed {
                    op: other,
                    message: "not supported by the rectangle engine".to_string(),
                })
            }
        }

        Ok(out)
    }

    fn clip_to_rect(
        &self,
        input: &FeatureCollection,
        rect: Rect,
    ) -> Result<FeatureCollection, EngineError> {
        let mut out = FeatureCollection::empty_like(input);
        for (i, r) in Self::feature_rects(input)? {
            if let Some(clipped) = r.intersection(&rect) {
                let mut f = input.features[i].clone();
                f.geometry = Some(rect_geometry(clipped));
                out.push_feature(f);
            }
        }
        Ok(out)
    }

    fn union_geometries(&self, geometries: &[&Geometry]) -> Result<Geometry, EngineError> {
        let mut rects = geometries.iter().map(|g| geometry_rect(g));
        let first = rects
            .next()
            .ok_or_else(|| EngineError::InvalidGeometry("empty union input".to_string()))??;
        let mut bounds = first;
        for rect in rects {
            bounds = bounds.union(&rect?);
        }
        Ok(rect_geometry(bounds))
    }

    fn collection_extent(&self, collection: &FeatureCollection) -> Option<Rect> {
        let rects = Self::feature_rects(collection).ok()?;
        let mut iter = rects.into_iter().map(|(_, r)| r);
        let first = iter.next()?;
        Some(iter.fold(first, |acc, r| acc.union(&r)))
    }
}
