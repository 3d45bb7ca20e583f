//! Self-describing binary serialization of feature collections.
//!
//! The codec exists so a collection can cross an execution boundary
//! (worker queue, tile blob file) as one owned byte buffer with no
//! shared state behind it. The layout is:
//!
//! ```text
//! magic "GEOVLYR1" | version u32
//! geometry type u32 | spatial-ref len u32 + utf8
//! field count u32 | per field: kind u8, name len u16 + utf8,
//!                   width i32, precision i32, nullable u8
//! feature count u32 | per feature:
//!     id i64, value count u16,
//!     per value: presence u8 [, kind u8 + payload],
//!     geometry len u32 + bytes (0 = none)
//! ```
//!
//! All integers little-endian. Decoding validates every length against
//! the remaining input and every count against the `MAX_*` maxima, so
//! corrupt input produces a [`DecodeError`], never undefined behavior.
//! Encoding enforces the same maxima up front ([`EncodeError`]), so
//! every blob it writes decodes, and `decode(encode(c))` reproduces
//! `c` exactly, including an empty collection (the required
//! representation for tiles with no intersecting features).

mod decode;
mod encode;
mod error;

pub use decode::{decode, peek_metadata, BlobMetadata};
pub use encode::encode;
pub use error::{DecodeError, EncodeError};

/// Leading token of every layer blob.
pub const MAGIC: &[u8; 8] = b"GEOVLYR1";

/// Current wire-format version.
pub const VERSION: u32 = 1;

/// Most fields a schema may carry.
pub const MAX_FIELDS: u32 = 1_000;

/// Most features a single blob may carry.
pub const MAX_FEATURES: u32 = 1_000_000;

/// Largest accepted geometry payload.
pub const MAX_GEOMETRY_BYTES: u32 = 100 * 1024 * 1024;

/// Longest accepted field name.
pub const MAX_NAME_BYTES: u16 = 1_000;

/// Longest accepted spatial-reference text.
pub const MAX_SPATIAL_REF_BYTES: u32 = 1 << 20;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{
        Feature, FeatureCollection, FieldDefinition, FieldKind, FieldValue, Geometry,
    };
    use chrono::{NaiveDate, NaiveTime};

    fn sample_collection() -> FeatureCollection {
        let mut c = FeatureCollection::new(6, "EPSG:3857");
        for def in [
            FieldDefinition::new("id32", FieldKind::Int32),
            FieldDefinition::new("id64", FieldKind::Int64),
            FieldDefinition::new("score", FieldKind::Real),
            FieldDefinition::new("label", FieldKind::String),
            FieldDefinition::new("seen", FieldKind::Date),
            FieldDefinition::new("at", FieldKind::Time),
            FieldDefinition::new("stamp", FieldKind::DateTime),
            FieldDefinition::new("payload", FieldKind::Binary),
        ] {
            c.add_field(def).unwrap();
        }

        let mut f = Feature::new(42, 8);
        f.values[0] = Some(FieldValue::Int32(-7));
        f.values[1] = Some(FieldValue::Int64(1 << 40));
        f.values[2] = Some(FieldValue::Real(2.5));
        f.values[3] = Some(FieldValue::String("边界 tile".to_string()));
        f.values[4] = Some(FieldValue::Date(
            NaiveDate::from_ymd_opt(2024, 11, 3).unwrap(),
        ));
        f.values[5] = Some(FieldValue::Time(
            NaiveTime::from_hms_opt(23, 59, 58).unwrap(),
        ));
        f.values[6] = Some(FieldValue::DateTime(
            NaiveDate::from_ymd_opt(1999, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
        ));
        f.values[7] = Some(FieldValue::Binary(vec![0, 255, 1, 254]));
        f.geometry = Some(Geometry::new(vec![9u8; 33]));
        c.push_feature(f);

        // Second feature: all nulls, no geometry.
        c.push_feature(Feature::new(43, 8));
        c
    }

    #[test]
    fn test_round_trip_full() {
        let original = sample_collection();
        let blob = encode(&original).unwrap();
        let decoded = decode(&blob).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_round_trip_empty_collection() {
        let original = FeatureCollection::new(0, "");
        let blob = encode(&original).unwrap();
        let decoded = decode(&blob).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.feature_count(), 0);
        assert!(decoded.fields.is_empty());
    }

    #[test]
    fn test_round_trip_schema_only() {
        let mut original = FeatureCollection::new(3, "EPSG:4326");
        original
            .add_field(FieldDefinition::new("only", FieldKind::String))
            .unwrap();
        let decoded = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_encode_rejects_oversized_field_name() {
        // A name longer than the u16 length field would wrap while the
        // bytes were all written, leaving an undecodable blob.
        let mut c = FeatureCollection::new(6, "EPSG:4326");
        c.add_field(FieldDefinition::new("n".repeat(70_000), FieldKind::String))
            .unwrap();
        assert!(matches!(
            encode(&c),
            Err(EncodeError::LimitExceeded { context, found: 70_000, .. })
                if context == "field name length"
        ));
    }

    #[test]
    fn test_encode_rejects_too_many_fields() {
        let mut c = FeatureCollection::new(6, "EPSG:4326");
        for i in 0..=MAX_FIELDS {
            c.add_field(FieldDefinition::new(format!("f{}", i), FieldKind::Int32))
                .unwrap();
        }
        assert!(matches!(
            encode(&c),
            Err(EncodeError::LimitExceeded { context, .. }) if context == "field count"
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_geometry() {
        let mut c = FeatureCollection::new(6, "");
        let mut f = Feature::new(1, 0);
        f.geometry = Some(Geometry::new(vec![0u8; MAX_GEOMETRY_BYTES as usize + 1]));
        c.push_feature(f);
        assert!(matches!(
            encode(&c),
            Err(EncodeError::LimitExceeded { context, .. }) if context == "geometry length"
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut blob = encode(&FeatureCollection::new(0, "")).unwrap();
        blob[0] ^= 0xFF;
        assert!(matches!(decode(&blob), Err(DecodeError::BadMagic { .. })));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut blob = encode(&FeatureCollection::new(0, "")).unwrap();
        blob[8] = 99;
        assert!(matches!(
            decode(&blob),
            Err(DecodeError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_truncation_rejected_at_every_length() {
        let blob = encode(&sample_collection()).unwrap();
        // Any proper prefix must fail with a DecodeError, never panic.
        for cut in 0..blob.len() {
            assert!(
                decode(&blob[..cut]).is_err(),
                "prefix of {} bytes decoded successfully",
                cut
            );
        }
    }

    #[test]
    fn test_field_count_cap() {
        let mut blob = encode(&FeatureCollection::new(0, "")).unwrap();
        // Field count lives right after magic+version+geomtype+srs len.
        let off = 8 + 4 + 4 + 4;
        blob[off..off + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode(&blob),
            Err(DecodeError::LimitExceeded { context, .. }) if context == "field count"
        ));
    }

    #[test]
    fn test_feature_count_cap() {
        let mut blob = encode(&FeatureCollection::new(0, "")).unwrap();
        let off = 8 + 4 + 4 + 4 + 4; // ... + field count
        blob[off..off + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode(&blob),
            Err(DecodeError::LimitExceeded { context, .. }) if context == "feature count"
        ));
    }

    #[test]
    fn test_oversized_geometry_length_rejected() {
        let mut c = FeatureCollection::new(6, "");
        let mut f = Feature::new(1, 0);
        f.geometry = Some(Geometry::new(vec![1, 2, 3]));
        c.push_feature(f);
        let mut blob = encode(&c).unwrap();
        // Geometry length is the last u32 before the 3 payload bytes.
        let len_off = blob.len() - 3 - 4;
        blob[len_off..len_off + 4].copy_from_slice(&(MAX_GEOMETRY_BYTES + 1).to_le_bytes());
        assert!(matches!(
            decode(&blob),
            Err(DecodeError::LimitExceeded { context, .. }) if context == "geometry length"
        ));
    }

    #[test]
    fn test_calendar_garbage_rejected() {
        let mut c = FeatureCollection::new(6, "");
        c.add_field(FieldDefinition::new("d", FieldKind::Date))
            .unwrap();
        let mut f = Feature::new(1, 1);
        f.values[0] = Some(FieldValue::Date(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        ));
        c.push_feature(f);
        let mut blob = encode(&c).unwrap();
        // Month lives 4 bytes into the six-i32 tuple; the tuple is the
        // last 24 bytes before the trailing geometry length (4 bytes).
        let month_off = blob.len() - 4 - 24 + 4;
        blob[month_off..month_off + 4].copy_from_slice(&13i32.to_le_bytes());
        assert!(matches!(
            decode(&blob),
            Err(DecodeError::InvalidValue { context, .. }) if context == "date value"
        ));
    }

    #[test]
    fn test_peek_metadata() {
        let c = sample_collection();
        let blob = encode(&c).unwrap();
        let meta = peek_metadata(&blob).unwrap();
        assert_eq!(meta.geometry_type, 6);
        assert_eq!(meta.spatial_ref, "EPSG:3857");
        assert_eq!(meta.field_count, 8);
        assert_eq!(meta.feature_count, 2);
    }
}
