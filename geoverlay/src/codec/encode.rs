//! Layer blob encoder.

use super::error::EncodeError;
use super::{
    MAGIC, MAX_FEATURES, MAX_FIELDS, MAX_GEOMETRY_BYTES, MAX_NAME_BYTES, MAX_SPATIAL_REF_BYTES,
    VERSION,
};
use crate::layer::{Feature, FeatureCollection, FieldValue};
use bytes::BufMut;
use chrono::{Datelike, Timelike};

/// Serializes a collection to its self-describing wire form.
///
/// Any collection within the wire maxima encodes, an empty one
/// included. Oversized names, counts, or geometries are rejected up
/// front; a length field is never allowed to wrap silently.
pub fn encode(collection: &FeatureCollection) -> Result<Vec<u8>, EncodeError> {
    check_limits(collection)?;
    let mut buf = Vec::with_capacity(estimate_size(collection));

    buf.put_slice(MAGIC);
    buf.put_u32_le(VERSION);
    buf.put_u32_le(collection.geometry_type);

    let srs = collection.spatial_ref.as_bytes();
    buf.put_u32_le(srs.len() as u32);
    buf.put_slice(srs);

    buf.put_u32_le(collection.fields.len() as u32);
    for field in &collection.fields {
        buf.put_u8(field.kind.tag());
        let name = field.name.as_bytes();
        buf.put_u16_le(name.len() as u16);
        buf.put_slice(name);
        buf.put_i32_le(field.width);
        buf.put_i32_le(field.precision);
        buf.put_u8(field.nullable as u8);
    }

    buf.put_u32_le(collection.features.len() as u32);
    for feature in &collection.features {
        encode_feature(&mut buf, feature);
    }

    Ok(buf)
}

// Mirrors the caps `decode` enforces so round-tripping cannot fail
// halfway.
fn check_limits(collection: &FeatureCollection) -> Result<(), EncodeError> {
    let srs_len = collection.spatial_ref.len() as u64;
    if srs_len > MAX_SPATIAL_REF_BYTES as u64 {
        return Err(EncodeError::LimitExceeded {
            context: "spatial reference length",
            found: srs_len,
            max: MAX_SPATIAL_REF_BYTES as u64,
        });
    }

    if collection.fields.len() as u64 > MAX_FIELDS as u64 {
        return Err(EncodeError::LimitExceeded {
            context: "field count",
            found: collection.fields.len() as u64,
            max: MAX_FIELDS as u64,
        });
    }
    for field in &collection.fields {
        if field.name.len() as u64 > MAX_NAME_BYTES as u64 {
            return Err(EncodeError::LimitExceeded {
                context: "field name length",
                found: field.name.len() as u64,
                max: MAX_NAME_BYTES as u64,
            });
        }
    }

    if collection.features.len() as u64 > MAX_FEATURES as u64 {
        return Err(EncodeError::LimitExceeded {
            context: "feature count",
            found: collection.features.len() as u64,
            max: MAX_FEATURES as u64,
        });
    }
    for feature in &collection.features {
        if let Some(geom) = &feature.geometry {
            if geom.len() as u64 > MAX_GEOMETRY_BYTES as u64 {
                return Err(EncodeError::LimitExceeded {
                    context: "geometry length",
                    found: geom.len() as u64,
                    max: MAX_GEOMETRY_BYTES as u64,
                });
            }
        }
    }

    Ok(())
}

fn encode_feature(buf: &mut Vec<u8>, feature: &Feature) {
    buf.put_i64_le(feature.id);
    buf.put_u16_le(feature.values.len() as u16);

    for value in &feature.values {
        match value {
            None => buf.put_u8(0),
            Some(v) => {
                buf.put_u8(1);
                buf.put_u8(v.kind().tag());
                encode_value(buf, v);
            }
        }
    }

    match &feature.geometry {
        Some(geom) => {
            buf.put_u32_le(geom.len() as u32);
            buf.put_slice(geom.as_bytes());
        }
        None => buf.put_u32_le(0),
    }
}

fn encode_value(buf: &mut Vec<u8>, value: &FieldValue) {
    match value {
        FieldValue::Int32(v) => buf.put_i32_le(*v),
        FieldValue::Int64(v) => buf.put_i64_le(*v),
        FieldValue::Real(v) => buf.put_f64_le(*v),
        FieldValue::String(s) => {
            buf.put_u32_le(s.len() as u32);
            buf.put_slice(s.as_bytes());
        }
        FieldValue::Binary(b) => {
            buf.put_u32_le(b.len() as u32);
            buf.put_slice(b);
        }
        FieldValue::Date(d) => {
            put_calendar(buf, d.year(), d.month() as i32, d.day() as i32, 0, 0, 0)
        }
        FieldValue::Time(t) => put_calendar(
            buf,
            0,
            0,
            0,
            t.hour() as i32,
            t.minute() as i32,
            t.second() as i32,
        ),
        FieldValue::DateTime(dt) => put_calendar(
            buf,
            dt.year(),
            dt.month() as i32,
            dt.day() as i32,
            dt.hour() as i32,
            dt.minute() as i32,
            dt.second() as i32,
        ),
    }
}

// Calendar kinds share one six-integer wire tuple.
fn put_calendar(buf: &mut Vec<u8>, year: i32, month: i32, day: i32, hour: i32, min: i32, sec: i32) {
    buf.put_i32_le(year);
    buf.put_i32_le(month);
    buf.put_i32_le(day);
    buf.put_i32_le(hour);
    buf.put_i32_le(min);
    buf.put_i32_le(sec);
}

fn estimate_size(collection: &FeatureCollection) -> usize {
    // Header plus a rough 64 bytes per feature; resizing handles the rest.
    64 + collection.spatial_ref.len()
        + collection.fields.len() * 32
        + collection.features.len() * 64
}
