// crates/steward-core/src/canon.rs
// ============================================================================
// Module: Canonical JSON Values
// Description: Closed value type and canonical byte rendering for hashing.
// Purpose: Guarantee byte-identical pre-images for every hash in Steward.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every hash in Steward is computed over canonical JSON bytes: key-sorted,
//! minimal-separator, UTF-8, with floating point rejected outright.
//! [`CanonValue`] is the closed sum type over the permitted shapes; anything
//! else is refused at the conversion boundary rather than silently encoded.
//! Invariants:
//! - Map keys sort by Unicode codepoint (the [`std::collections::BTreeMap`]
//!   string order).
//! - Floats, NaN, and Infinity are unrepresentable.
//! - Two structurally equal values always render to identical bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as DeError;
use serde::de::MapAccess;
use serde::de::SeqAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;
use serde::ser::SerializeSeq;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Canonical Value Type
// ============================================================================

/// Mapping with string keys in codepoint order.
pub type CanonMap = BTreeMap<String, CanonValue>;

/// Canonical JSON value.
///
/// # Invariants
/// - Integers are signed 64-bit; larger magnitudes are rejected at conversion.
/// - No float variant exists; non-finite numerics cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonValue {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list of canonical values.
    List(Vec<CanonValue>),
    /// Mapping with string keys.
    Map(CanonMap),
}

/// Errors produced while constructing or rendering canonical values.
///
/// # Invariants
/// - Display forms are stable error codes that appear in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonError {
    /// A float appeared where canonical input is required.
    #[error("secure_layer.hash.invalid float_forbidden")]
    FloatForbidden,
    /// An integer falls outside the signed 64-bit range.
    #[error("secure_layer.hash.invalid integer_range")]
    IntegerRange,
    /// A map key was not a string.
    #[error("secure_layer.hash.invalid key_type")]
    KeyType,
    /// A value outside the closed canonical set was supplied.
    #[error("secure_layer.hash.invalid value_type")]
    ValueType,
    /// A mapping was required at the top level.
    #[error("secure_layer.hash.invalid mapping_required")]
    MappingRequired,
    /// Canonical rendering failed.
    #[error("secure_layer.hash.invalid render {0}")]
    Render(String),
}

impl CanonValue {
    /// Converts an arbitrary JSON value into a canonical value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonError`] when the value contains floats or integers
    /// outside the signed 64-bit range.
    pub fn from_json(value: &Value) -> Result<Self, CanonError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(flag) => Ok(Self::Bool(*flag)),
            Value::Number(number) => number.as_i64().map_or_else(
                || {
                    if number.as_u64().is_some() {
                        Err(CanonError::IntegerRange)
                    } else {
                        Err(CanonError::FloatForbidden)
                    }
                },
                |int| Ok(Self::Int(int)),
            ),
            Value::String(text) => Ok(Self::Str(text.clone())),
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(Self::from_json(item)?);
                }
                Ok(Self::List(list))
            }
            Value::Object(entries) => {
                let mut map = CanonMap::new();
                for (key, item) in entries {
                    map.insert(key.clone(), Self::from_json(item)?);
                }
                Ok(Self::Map(map))
            }
        }
    }

    /// Converts a JSON object into a canonical map.
    ///
    /// # Errors
    ///
    /// Returns [`CanonError::MappingRequired`] when the value is not an
    /// object, or any conversion error from nested values.
    pub fn map_from_json(value: &Value) -> Result<CanonMap, CanonError> {
        match Self::from_json(value)? {
            Self::Map(map) => Ok(map),
            _ => Err(CanonError::MappingRequired),
        }
    }

    /// Renders the canonical value back into a plain JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Int(int) => Value::from(*int),
            Self::Str(text) => Value::String(text.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => {
                let mut entries = serde_json::Map::new();
                for (key, item) in map {
                    entries.insert(key.clone(), item.to_json());
                }
                Value::Object(entries)
            }
        }
    }

    /// Returns the contained string slice when the value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Returns the contained integer when the value is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(int) => Some(*int),
            _ => None,
        }
    }
}

impl From<&str> for CanonValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CanonValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for CanonValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for CanonValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<Self>> for CanonValue {
    fn from(value: Vec<Self>) -> Self {
        Self::List(value)
    }
}

impl From<CanonMap> for CanonValue {
    fn from(value: CanonMap) -> Self {
        Self::Map(value)
    }
}

// ============================================================================
// SECTION: Canonical Rendering
// ============================================================================

/// Renders a canonical value to minimal-separator key-sorted JSON bytes.
///
/// # Errors
///
/// Returns [`CanonError::Render`] when serialization fails.
pub fn canonical_bytes(value: &CanonValue) -> Result<Vec<u8>, CanonError> {
    serde_json::to_vec(value).map_err(|err| CanonError::Render(err.to_string()))
}

/// Renders a canonical map to minimal-separator key-sorted JSON bytes.
///
/// # Errors
///
/// Returns [`CanonError::Render`] when serialization fails.
pub fn canonical_map_bytes(map: &CanonMap) -> Result<Vec<u8>, CanonError> {
    canonical_bytes(&CanonValue::Map(map.clone()))
}

// ============================================================================
// SECTION: Serde Implementations
// ============================================================================

impl Serialize for CanonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(flag) => serializer.serialize_bool(*flag),
            Self::Int(int) => serializer.serialize_i64(*int),
            Self::Str(text) => serializer.serialize_str(text),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut entries = serializer.serialize_map(Some(map.len()))?;
                for (key, item) in map {
                    entries.serialize_entry(key, item)?;
                }
                entries.end()
            }
        }
    }
}

/// Visitor that refuses floats while deserializing canonical values.
struct CanonVisitor;

impl<'de> Visitor<'de> for CanonVisitor {
    type Value = CanonValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a canonical JSON value without floats")
    }

    fn visit_unit<E: DeError>(self) -> Result<Self::Value, E> {
        Ok(CanonValue::Null)
    }

    fn visit_none<E: DeError>(self) -> Result<Self::Value, E> {
        Ok(CanonValue::Null)
    }

    fn visit_bool<E: DeError>(self, value: bool) -> Result<Self::Value, E> {
        Ok(CanonValue::Bool(value))
    }

    fn visit_i64<E: DeError>(self, value: i64) -> Result<Self::Value, E> {
        Ok(CanonValue::Int(value))
    }

    fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
        i64::try_from(value)
            .map(CanonValue::Int)
            .map_err(|_| E::custom(CanonError::IntegerRange))
    }

    fn visit_f64<E: DeError>(self, _value: f64) -> Result<Self::Value, E> {
        Err(E::custom(CanonError::FloatForbidden))
    }

    fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
        Ok(CanonValue::Str(value.to_string()))
    }

    fn visit_string<E: DeError>(self, value: String) -> Result<Self::Value, E> {
        Ok(CanonValue::Str(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = access.next_element::<CanonValue>()? {
            items.push(item);
        }
        Ok(CanonValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = CanonMap::new();
        while let Some((key, item)) = access.next_entry::<String, CanonValue>()? {
            map.insert(key, item);
        }
        Ok(CanonValue::Map(map))
    }
}

impl<'de> Deserialize<'de> for CanonValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CanonVisitor)
    }
}
