//! Field definitions and attribute values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Attribute column type.
///
/// The discriminants double as the one-byte wire tags used by the
/// layer codec, so they must stay stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldKind {
    Int32 = 0,
    Int64 = 1,
    Real = 2,
    String = 3,
    Date = 4,
    Time = 5,
    DateTime = 6,
    Binary = 7,
}

impl FieldKind {
    /// Maps a wire tag back to a kind.
    pub fn from_tag(tag: u8) -> Option<FieldKind> {
        match tag {
            0 => Some(FieldKind::Int32),
            1 => Some(FieldKind::Int64),
            2 => Some(FieldKind::Real),
            3 => Some(FieldKind::String),
            4 => Some(FieldKind::Date),
            5 => Some(FieldKind::Time),
            6 => Some(FieldKind::DateTime),
            7 => Some(FieldKind::Binary),
            _ => None,
        }
    }

    /// The wire tag for this kind.
    pub fn tag(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Real => "real",
            FieldKind::String => "string",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::DateTime => "datetime",
            FieldKind::Binary => "binary",
        };
        write!(f, "{}", name)
    }
}

/// Schema entry for one attribute column.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Column name, unique within a collection.
    pub name: String,
    pub kind: FieldKind,
    /// Formatting width hint carried through from the source format.
    pub width: i32,
    /// Decimal precision hint for real columns.
    pub precision: i32,
    pub nullable: bool,
}

impl FieldDefinition {
    /// Creates a nullable definition with no width/precision hints.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            width: 0,
            precision: 0,
            nullable: true,
        }
    }

    /// Copy of this definition under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// One attribute value. Absent values are represented as `None` in the
/// feature's value slots, not as a variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int32(i32),
    Int64(i64),
    Real(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Binary(Vec<u8>),
}

impl FieldValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Int64(_) => FieldKind::Int64,
            FieldValue::Real(_) => FieldKind::Real,
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Time(_) => FieldKind::Time,
            FieldValue::DateTime(_) => FieldKind::DateTime,
            FieldValue::Binary(_) => FieldKind::Binary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for kind in [
            FieldKind::Int32,
            FieldKind::Int64,
            FieldKind::Real,
            FieldKind::String,
            FieldKind::Date,
            FieldKind::Time,
            FieldKind::DateTime,
            FieldKind::Binary,
        ] {
            assert_eq!(FieldKind::from_tag(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(FieldKind::from_tag(8), None);
        assert_eq!(FieldKind::from_tag(255), None);
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(FieldValue::Int64(7).kind(), FieldKind::Int64);
        assert_eq!(
            FieldValue::String("a".to_string()).kind(),
            FieldKind::String
        );
    }
}
