//! Layer blob decoder.
//!
//! The reader checks every length against the remaining input before
//! consuming it, so a truncated or corrupt blob always surfaces as a
//! [`DecodeError`] rather than a slice panic.

use super::error::DecodeError;
use super::{
    MAGIC, MAX_FEATURES, MAX_FIELDS, MAX_GEOMETRY_BYTES, MAX_NAME_BYTES, MAX_SPATIAL_REF_BYTES,
    VERSION,
};
use crate::layer::{
    Feature, FeatureCollection, FieldDefinition, FieldKind, FieldValue, Geometry,
};
use chrono::{NaiveDate, NaiveTime};

/// Header summary available without decoding features.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobMetadata {
    pub geometry_type: u32,
    pub spatial_ref: String,
    pub field_count: u32,
    pub feature_count: u32,
}

/// Deserializes a collection from its wire form.
pub fn decode(bytes: &[u8]) -> Result<FeatureCollection, DecodeError> {
    let mut r = Reader::new(bytes);
    let mut collection = decode_header(&mut r)?;

    let feature_count = r.u32("feature count")?;
    if feature_count > MAX_FEATURES {
        return Err(DecodeError::LimitExceeded {
            context: "feature count",
            found: feature_count as u64,
            max: MAX_FEATURES as u64,
        });
    }

    for _ in 0..feature_count {
        let feature = decode_feature(&mut r, &collection.fields)?;
        collection.features.push(feature);
    }

    Ok(collection)
}

/// Reads the header and field table only, skipping feature payloads.
pub fn peek_metadata(bytes: &[u8]) -> Result<BlobMetadata, DecodeError> {
    let mut r = Reader::new(bytes);
    let collection = decode_header(&mut r)?;
    let feature_count = r.u32("feature count")?;
    Ok(BlobMetadata {
        geometry_type: collection.geometry_type,
        spatial_ref: collection.spatial_ref,
        field_count: collection.fields.len() as u32,
        feature_count,
    })
}

fn decode_header(r: &mut Reader<'_>) -> Result<FeatureCollection, DecodeError> {
    let magic = r.bytes(MAGIC.len(), "magic token")?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic { expected: MAGIC });
    }

    let version = r.u32("version")?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: version,
            supported: VERSION,
        });
    }

    let geometry_type = r.u32("geometry type")?;

    let srs_len = r.u32("spatial-ref length")?;
    if srs_len > MAX_SPATIAL_REF_BYTES {
        return Err(DecodeError::LimitExceeded {
            context: "spatial-ref length",
            found: srs_len as u64,
            max: MAX_SPATIAL_REF_BYTES as u64,
        });
    }
    let spatial_ref = r.utf8(srs_len as usize, "spatial-ref text")?;

    let field_count = r.u32("field count")?;
    if field_count > MAX_FIELDS {
        return Err(DecodeError::LimitExceeded {
            context: "field count",
            found: field_count as u64,
            max: MAX_FIELDS as u64,
        });
    }

    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(decode_field_definition(r)?);
    }

    Ok(FeatureCollection::with_schema(
        geometry_type,
        spatial_ref,
        fields,
    ))
}

fn decode_field_definition(r: &mut Reader<'_>) -> Result<FieldDefinition, DecodeError> {
    let tag = r.u8("field kind")?;
    let kind = FieldKind::from_tag(tag).ok_or_else(|| DecodeError::InvalidValue {
        context: "field kind",
        detail: format!("unknown tag {}", tag),
    })?;

    let name_len = r.u16("field name length")?;
    if name_len > MAX_NAME_BYTES {
        return Err(DecodeError::LimitExceeded {
            context: "field name length",
            found: name_len as u64,
            max: MAX_NAME_BYTES as u64,
        });
    }
    let name = r.utf8(name_len as usize, "field name")?;
    let width = r.i32("field width")?;
    let precision = r.i32("field precision")?;
    let nullable = r.u8("field nullability")? != 0;

    Ok(FieldDefinition {
        name,
        kind,
        width,
        precision,
        nullable,
    })
}

fn decode_feature(
    r: &mut Reader<'_>,
    fields: &[FieldDefinition],
) -> Result<Feature, DecodeError> {
    let id = r.i64("feature id")?;
    let value_count = r.u16("value count")? as usize;
    if value_count != fields.len() {
        return Err(DecodeError::InvalidValue {
            context: "value count",
            detail: format!("feature has {} values, schema has {}", value_count, fields.len()),
        });
    }

    let mut feature = Feature::new(id, fields.len());
    for (slot, field) in fields.iter().enumerate() {
        let present = r.u8("value presence")?;
        if present == 0 {
            continue;
        }
        let tag = r.u8("value kind")?;
        if tag != field.kind.tag() {
            return Err(DecodeError::InvalidValue {
                context: "value kind",
                detail: format!(
                    "field '{}' declares {} but value carries tag {}",
                    field.name, field.kind, tag
                ),
            });
        }
        feature.values[slot] = Some(decode_value(r, field.kind)?);
    }

    let geom_len = r.u32("geometry length")?;
    if geom_len > MAX_GEOMETRY_BYTES {
        return Err(DecodeError::LimitExceeded {
            context: "geometry length",
            found: geom_len as u64,
            max: MAX_GEOMETRY_BYTES as u64,
        });
    }
    if geom_len > 0 {
        let bytes = r.bytes(geom_len as usize, "geometry payload")?;
        feature.geometry = Some(Geometry::new(bytes.to_vec()));
    }

    Ok(feature)
}

fn decode_value(r: &mut Reader<'_>, kind: FieldKind) -> Result<FieldValue, DecodeError> {
    match kind {
        FieldKind::Int32 => Ok(FieldValue::Int32(r.i32("int32 value")?)),
        FieldKind::Int64 => Ok(FieldValue::Int64(r.i64("int64 value")?)),
        FieldKind::Real => Ok(FieldValue::Real(r.f64("real value")?)),
        FieldKind::String => {
            let len = r.u32("string length")? as usize;
            Ok(FieldValue::String(r.utf8(len, "string value")?))
        }
        FieldKind::Binary => {
            let len = r.u32("binary length")? as usize;
            Ok(FieldValue::Binary(r.bytes(len, "binary value")?.to_vec()))
        }
        FieldKind::Date => {
            let [y, m, d, _, _, _] = r.calendar()?;
            let date = NaiveDate::from_ymd_opt(y, m as u32, d as u32).ok_or_else(|| {
                DecodeError::InvalidValue {
                    context: "date value",
                    detail: format!("{:04}-{:02}-{:02}", y, m, d),
                }
            })?;
            Ok(FieldValue::Date(date))
        }
        FieldKind::Time => {
            let [_, _, _, h, mi, s] = r.calendar()?;
            let time =
                NaiveTime::from_hms_opt(h as u32, mi as u32, s as u32).ok_or_else(|| {
                    DecodeError::InvalidValue {
                        context: "time value",
                        detail: format!("{:02}:{:02}:{:02}", h, mi, s),
                    }
                })?;
            Ok(FieldValue::Time(time))
        }
        FieldKind::DateTime => {
            let [y, m, d, h, mi, s] = r.calendar()?;
            let date = NaiveDate::from_ymd_opt(y, m as u32, d as u32).ok_or_else(|| {
                DecodeError::InvalidValue {
                    context: "datetime value",
                    detail: format!("{:04}-{:02}-{:02}", y, m, d),
                }
            })?;
            let dt = date
                .and_hms_opt(h as u32, mi as u32, s as u32)
                .ok_or_else(|| DecodeError::InvalidValue {
                    context: "datetime value",
                    detail: format!("{:02}:{:02}:{:02}", h, mi, s),
                })?;
            Ok(FieldValue::DateTime(dt))
        }
    }
}

/// Bounds-checked little-endian cursor over the input slice.
struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                context,
                needed: n,
                remaining: self.remaining(),
                offset: self.pos,
            });
        }
        let out = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn utf8(&mut self, n: usize, context: &'static str) -> Result<String, DecodeError> {
        let bytes = self.bytes(n, context)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| DecodeError::InvalidValue {
            context,
            detail: format!("not valid UTF-8: {}", e),
        })
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        Ok(self.bytes(1, context)?[0])
    }

    fn u16(&mut self, context: &'static str) -> Result<u16, DecodeError> {
        let b = self.bytes(2, context)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        let b = self.bytes(4, context)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        let b = self.bytes(4, context)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        let b = self.bytes(8, context)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        let b = self.bytes(8, context)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn calendar(&mut self) -> Result<[i32; 6], DecodeError> {
        let mut out = [0i32; 6];
        for slot in &mut out {
            *slot = self.i32("calendar tuple")?;
        }
        Ok(out)
    }
}
