//! Dynamic SQL values.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A dynamically-typed SQL value.
///
/// Every column accessor in a [`TableSchema`](crate::TableSchema) produces and
/// consumes values of this type, and executors bind and return them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Timestamp (microseconds since epoch, UTC)
    Timestamp(i64),

    /// JSON value
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Json(_) => "JSON",
        }
    }

    /// Whether this is the zero value of its type.
    ///
    /// Columns with a store-side default are only written explicitly when
    /// their value is non-zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null | Value::Json(serde_json::Value::Null) => true,
            Value::Bool(b) => !*b,
            Value::Int(v) => *v == 0,
            Value::BigInt(v) | Value::Timestamp(v) => *v == 0,
            Value::Double(v) => *v == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Json(_) => false,
        }
    }

    /// Try to interpret this value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to interpret this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) | Value::Timestamp(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Try to interpret this value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Borrow this value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow this value as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Hashable key used to match foreign keys against primary keys.
    pub fn key(&self) -> ValueKey {
        ValueKey::from(self)
    }
}

/// Normalized, hashable form of a [`Value`].
///
/// All integer widths and timestamps collapse to `Int`, so a key read back
/// from the store as `Int` matches a field bound as `BigInt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
    Json(String),
}

impl From<&Value> for ValueKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(v) => ValueKey::Int(i64::from(*v)),
            Value::BigInt(v) | Value::Timestamp(v) => ValueKey::Int(*v),
            Value::Double(v) => ValueKey::Float(v.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Bytes(b) => ValueKey::Bytes(b.clone()),
            Value::Json(j) => ValueKey::Json(j.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v.as_micros())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Zero-value test on a record field.
///
/// An `Option` is zero only when it is `None`: `Some(false)` or `Some(0)`
/// is an explicit value and gets written even when the column has a
/// store-side default.
pub trait Zero {
    fn is_zero(&self) -> bool;
}

impl Zero for Value {
    fn is_zero(&self) -> bool {
        Value::is_zero(self)
    }
}

impl Zero for bool {
    fn is_zero(&self) -> bool {
        !*self
    }
}

impl Zero for i32 {
    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl Zero for i64 {
    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl Zero for f64 {
    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Zero for String {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Zero for Vec<u8> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Zero for Timestamp {
    fn is_zero(&self) -> bool {
        Timestamp::is_zero(*self)
    }
}

impl Zero for serde_json::Value {
    fn is_zero(&self) -> bool {
        self.is_null()
    }
}

impl<T> Zero for Option<T> {
    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_options_are_never_zero() {
        assert!(Zero::is_zero(&None::<bool>));
        assert!(!Zero::is_zero(&Some(false)));
        assert!(!Zero::is_zero(&Some(0_i64)));
        assert!(!Zero::is_zero(&Some(String::new())));
        assert!(Zero::is_zero(&0_i64));
        assert!(Zero::is_zero(&Timestamp::default()));
    }

    #[test]
    fn zero_values_follow_type_defaults() {
        assert!(Value::Null.is_zero());
        assert!(Value::Text(String::new()).is_zero());
        assert!(Value::Timestamp(0).is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(!Value::Text("x".into()).is_zero());
        assert!(!Value::BigInt(-1).is_zero());
        assert!(!Value::Json(serde_json::json!({})).is_zero());
    }

    #[test]
    fn keys_collapse_integer_widths() {
        assert_eq!(Value::Int(7).key(), Value::BigInt(7).key());
        assert_eq!(Value::Timestamp(7).key(), Value::Int(7).key());
        assert_ne!(Value::Text("7".into()).key(), Value::Int(7).key());
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
        assert_eq!(
            Value::from(Some(Timestamp::from_micros(5))),
            Value::Timestamp(5)
        );
    }

    #[test]
    fn serde_roundtrip_keeps_variant() {
        let value = Value::Timestamp(1_700_000_000_000_000);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
