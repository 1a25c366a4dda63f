//! Typed cursor values.
//!
//! A [`CursorValue`] is the scalar that resumes a keyset read ("continue after
//! this value") and the operand of filter comparisons. The variant is the type
//! tag: it decides both how the value compares in the database and how it is
//! written into a page token.

use std::fmt;

use bson::oid::ObjectId;
use bson::Bson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type tag of a [`CursorValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorType {
    /// UTF-8 string.
    String,
    /// Integer or floating point number.
    Number,
    /// Instant in time.
    Date,
    /// Document identifier.
    Id,
    /// Absent or null value.
    Null,
}

impl fmt::Display for CursorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorType::String => write!(f, "string"),
            CursorType::Number => write!(f, "number"),
            CursorType::Date => write!(f, "date"),
            CursorType::Id => write!(f, "id"),
            CursorType::Null => write!(f, "null"),
        }
    }
}

/// A typed scalar used inside page tokens and as a comparison operand.
///
/// Integers and floats are kept apart so that an `i64` never travels through
/// an `f64` and loses precision; both report [`CursorType::Number`].
///
/// Equality treats two NaN floats as equal, matching how the database
/// groups NaN values when sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "lowercase")]
pub enum CursorValue {
    /// String value.
    String(String),
    /// Integer value.
    Int(i64),
    /// Floating point value, including infinities and NaN.
    Float(#[serde(with = "float_repr")] f64),
    /// Date value with full sub-second precision.
    Date(DateTime<Utc>),
    /// Identifier value.
    Id(#[serde(with = "object_id_hex")] ObjectId),
    /// The row has no value, or a null value, at the sort path.
    Null,
}

impl PartialEq for CursorValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CursorValue::String(a), CursorValue::String(b)) => a == b,
            (CursorValue::Int(a), CursorValue::Int(b)) => a == b,
            (CursorValue::Float(a), CursorValue::Float(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (CursorValue::Date(a), CursorValue::Date(b)) => a == b,
            (CursorValue::Id(a), CursorValue::Id(b)) => a == b,
            (CursorValue::Null, CursorValue::Null) => true,
            _ => false,
        }
    }
}

impl CursorValue {
    /// Returns the type tag for this value.
    pub fn type_tag(&self) -> CursorType {
        match self {
            CursorValue::String(_) => CursorType::String,
            CursorValue::Int(_) | CursorValue::Float(_) => CursorType::Number,
            CursorValue::Date(_) => CursorType::Date,
            CursorValue::Id(_) => CursorType::Id,
            CursorValue::Null => CursorType::Null,
        }
    }

    /// Returns true for the null position.
    pub fn is_null(&self) -> bool {
        matches!(self, CursorValue::Null)
    }

    /// Returns true for values that can be compared as a numeric range.
    pub fn is_numeric(&self) -> bool {
        self.type_tag() == CursorType::Number
    }

    /// Returns the value as a floating point number, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CursorValue::Int(n) => Some(*n as f64),
            CursorValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts the value into its BSON representation for query building.
    pub fn to_bson(&self) -> Bson {
        match self {
            CursorValue::String(s) => Bson::String(s.clone()),
            CursorValue::Int(n) => Bson::Int64(*n),
            CursorValue::Float(n) => Bson::Double(*n),
            CursorValue::Date(d) => Bson::DateTime(bson::DateTime::from_chrono(*d)),
            CursorValue::Id(id) => Bson::ObjectId(*id),
            CursorValue::Null => Bson::Null,
        }
    }

    /// Renders the value as a plain search term (used by query-string clauses).
    pub fn to_term(&self) -> String {
        match self {
            CursorValue::String(s) => s.clone(),
            CursorValue::Int(n) => n.to_string(),
            CursorValue::Float(n) => n.to_string(),
            CursorValue::Date(d) => d.to_rfc3339(),
            CursorValue::Id(id) => id.to_hex(),
            CursorValue::Null => "null".to_string(),
        }
    }
}

impl From<&str> for CursorValue {
    fn from(s: &str) -> Self {
        CursorValue::String(s.to_string())
    }
}

impl From<String> for CursorValue {
    fn from(s: String) -> Self {
        CursorValue::String(s)
    }
}

impl From<i32> for CursorValue {
    fn from(n: i32) -> Self {
        CursorValue::Int(i64::from(n))
    }
}

impl From<i64> for CursorValue {
    fn from(n: i64) -> Self {
        CursorValue::Int(n)
    }
}

impl From<f64> for CursorValue {
    fn from(n: f64) -> Self {
        CursorValue::Float(n)
    }
}

impl From<DateTime<Utc>> for CursorValue {
    fn from(d: DateTime<Utc>) -> Self {
        CursorValue::Date(d)
    }
}

impl From<bson::DateTime> for CursorValue {
    fn from(d: bson::DateTime) -> Self {
        CursorValue::Date(d.to_chrono())
    }
}

impl From<ObjectId> for CursorValue {
    fn from(id: ObjectId) -> Self {
        CursorValue::Id(id)
    }
}

/// Error returned when a stored value has no cursor representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedCursorValue {
    /// The BSON element type that could not be converted.
    pub element_type: String,
}

impl fmt::Display for UnsupportedCursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported cursor value type: {}", self.element_type)
    }
}

impl std::error::Error for UnsupportedCursorValue {}

impl TryFrom<&Bson> for CursorValue {
    type Error = UnsupportedCursorValue;

    fn try_from(value: &Bson) -> Result<Self, Self::Error> {
        match value {
            Bson::String(s) => Ok(CursorValue::String(s.clone())),
            Bson::Int32(n) => Ok(CursorValue::Int(i64::from(*n))),
            Bson::Int64(n) => Ok(CursorValue::Int(*n)),
            Bson::Double(n) => Ok(CursorValue::Float(*n)),
            Bson::DateTime(d) => Ok(CursorValue::Date(d.to_chrono())),
            Bson::ObjectId(id) => Ok(CursorValue::Id(*id)),
            Bson::Null | Bson::Undefined => Ok(CursorValue::Null),
            other => Err(UnsupportedCursorValue {
                element_type: format!("{:?}", other.element_type()),
            }),
        }
    }
}

impl fmt::Display for CursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_tag(), self.to_term())
    }
}

/// JSON has no infinities or NaN, so non-finite floats travel as strings.
mod float_repr {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    const INFINITY: &str = "inf";
    const NEG_INFINITY: &str = "-inf";
    const NAN: &str = "nan";

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if value.is_sign_positive() {
            serializer.serialize_str(INFINITY)
        } else {
            serializer.serialize_str(NEG_INFINITY)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl<'de> Visitor<'de> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, \"inf\", \"-inf\" or \"nan\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                NAN => Ok(f64::NAN),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

mod object_id_hex {
    use bson::oid::ObjectId;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ObjectId, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ObjectId::parse_str(&hex).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_type_tags() {
        assert_eq!(CursorValue::from("a").type_tag(), CursorType::String);
        assert_eq!(CursorValue::from(3i64).type_tag(), CursorType::Number);
        assert_eq!(CursorValue::from(3.5f64).type_tag(), CursorType::Number);
        assert_eq!(CursorValue::from(Utc::now()).type_tag(), CursorType::Date);
        assert_eq!(CursorValue::from(ObjectId::new()).type_tag(), CursorType::Id);
    }

    #[test]
    fn test_json_round_trip_preserves_type_and_precision() {
        let date = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let values = vec![
            CursorValue::from("hello"),
            CursorValue::from(i64::MAX),
            CursorValue::from(0.1f64 + 0.2f64),
            CursorValue::from(2.0f64),
            CursorValue::from(date),
            CursorValue::from(ObjectId::new()),
        ];

        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            let back: CursorValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value);
            assert_eq!(back.type_tag(), value.type_tag());
        }
    }

    #[test]
    fn test_float_two_does_not_become_int() {
        let json = serde_json::to_string(&CursorValue::Float(2.0)).unwrap();
        let back: CursorValue = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, CursorValue::Float(_)));
    }

    #[test]
    fn test_from_bson() {
        assert_eq!(
            CursorValue::try_from(&Bson::Int32(7)).unwrap(),
            CursorValue::Int(7)
        );
        assert_eq!(
            CursorValue::try_from(&Bson::String("x".into())).unwrap(),
            CursorValue::from("x")
        );
        assert!(CursorValue::try_from(&Bson::Boolean(true)).is_err());
        assert_eq!(
            CursorValue::try_from(&Bson::Null).unwrap(),
            CursorValue::Null
        );
    }

    #[test]
    fn test_non_finite_floats_round_trip() {
        for n in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let value = CursorValue::Float(n);
            let json = serde_json::to_string(&value).unwrap();
            let back: CursorValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value, "{}", json);
        }

        let json = serde_json::to_string(&CursorValue::Float(f64::NEG_INFINITY)).unwrap();
        assert_eq!(json, r#"{"t":"float","v":"-inf"}"#);
    }

    #[test]
    fn test_nan_equality_is_by_type() {
        assert_eq!(CursorValue::Float(f64::NAN), CursorValue::Float(f64::NAN));
        assert_ne!(CursorValue::Float(f64::NAN), CursorValue::Float(0.0));
        assert_ne!(CursorValue::Float(1.0), CursorValue::Int(1));
    }

    #[test]
    fn test_null_round_trip() {
        let json = serde_json::to_string(&CursorValue::Null).unwrap();
        assert_eq!(json, r#"{"t":"null"}"#);
        let back: CursorValue = serde_json::from_str(&json).unwrap();
        assert!(back.is_null());
        assert_eq!(back.to_bson(), Bson::Null);
    }

    #[test]
    fn test_to_bson_date_is_bson_datetime() {
        let date = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        match CursorValue::from(date).to_bson() {
            Bson::DateTime(d) => assert_eq!(d.timestamp_millis(), 1_700_000_000_000),
            other => panic!("expected date, got {:?}", other),
        }
    }
}
