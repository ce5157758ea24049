//! Runtime values carried by predicates, cursors and rows.

use rkyv::{Archive, Deserialize, Serialize};
use serde::ser::{Serialize as SerdeSerialize, SerializeSeq, Serializer};

/// A runtime value compared against or read from a column.
///
/// Arrays are typed (e.g. `Int64Array`, `StringArray`) so the enum stays flat
/// for rkyv, which is what cursor tokens are encoded with.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// UUID as 16 bytes.
    Uuid([u8; 16]),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// Array of 64-bit integers.
    Int64Array(Vec<i64>),
    /// Array of 64-bit floats.
    Float64Array(Vec<f64>),
    /// Array of strings.
    StringArray(Vec<String>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is an array type.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::BoolArray(_)
                | Value::Int64Array(_)
                | Value::Float64Array(_)
                | Value::StringArray(_)
        )
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as UUID.
    pub fn as_uuid(&self) -> Option<&[u8; 16]> {
        match self {
            Value::Uuid(u) => Some(u),
            _ => None,
        }
    }

    /// Convert a JSON literal without any column type information.
    ///
    /// Integers become `Int64`, other numbers `Float64`, and homogeneous arrays
    /// of scalars become the matching typed array. Returns `None` for objects
    /// and mixed arrays.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int64(i)),
                None => n.as_f64().map(Value::Float64),
            },
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(items) => Self::array_from_json(items),
            serde_json::Value::Object(_) => None,
        }
    }

    fn array_from_json(items: &[serde_json::Value]) -> Option<Value> {
        match items.first() {
            None => Some(Value::StringArray(vec![])),
            Some(serde_json::Value::Bool(_)) => items
                .iter()
                .map(|v| v.as_bool())
                .collect::<Option<Vec<_>>>()
                .map(Value::BoolArray),
            Some(serde_json::Value::String(_)) => items
                .iter()
                .map(|v| v.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
                .map(Value::StringArray),
            Some(serde_json::Value::Number(_)) => {
                if items.iter().all(|v| v.is_i64()) {
                    items
                        .iter()
                        .map(|v| v.as_i64())
                        .collect::<Option<Vec<_>>>()
                        .map(Value::Int64Array)
                } else {
                    items
                        .iter()
                        .map(|v| v.as_f64())
                        .collect::<Option<Vec<_>>>()
                        .map(Value::Float64Array)
                }
            }
            Some(_) => None,
        }
    }

    /// Render this value as plain JSON, the shape handed to response shaping.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int32(i) => json!(i),
            Value::Int64(i) => json!(i),
            Value::Float64(f) => json!(f),
            Value::String(s) => json!(s),
            Value::Timestamp(t) => json!(t),
            Value::Uuid(u) => json!(format_uuid(u)),
            Value::BoolArray(v) => json!(v),
            Value::Int64Array(v) => json!(v),
            Value::Float64Array(v) => json!(v),
            Value::StringArray(v) => json!(v),
        }
    }
}

/// Format 16 UUID bytes in the canonical hyphenated form.
pub fn format_uuid(bytes: &[u8; 16]) -> String {
    let hex = hex::encode(bytes);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Parse a hyphenated or bare hex UUID string.
pub fn parse_uuid(s: &str) -> Option<[u8; 16]> {
    let compact: String = s.chars().filter(|c| *c != '-').collect();
    let bytes = hex::decode(compact).ok()?;
    bytes.try_into().ok()
}

impl SerdeSerialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int32(i) => serializer.serialize_i32(*i),
            Value::Int64(i) | Value::Timestamp(i) => serializer.serialize_i64(*i),
            Value::Float64(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Uuid(u) => serializer.serialize_str(&format_uuid(u)),
            Value::BoolArray(v) => serialize_seq(serializer, v),
            Value::Int64Array(v) => serialize_seq(serializer, v),
            Value::Float64Array(v) => serialize_seq(serializer, v),
            Value::StringArray(v) => serialize_seq(serializer, v),
        }
    }
}

fn serialize_seq<S: Serializer, T: SerdeSerialize>(
    serializer: S,
    items: &[T],
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(items.len()))?;
    for item in items {
        seq.serialize_element(item)?;
    }
    seq.end()
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Int64Array(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int64(100).as_i64(), Some(100));
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::Int32(2).as_f64(), Some(2.0));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from_json(&json!(null)), Some(Value::Null));
        assert_eq!(Value::from_json(&json!(7)), Some(Value::Int64(7)));
        assert_eq!(Value::from_json(&json!(1.5)), Some(Value::Float64(1.5)));
        assert_eq!(Value::from_json(&json!("a")), Some(Value::String("a".into())));
        assert_eq!(Value::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn test_from_json_arrays() {
        assert_eq!(
            Value::from_json(&json!([1, 2, 3])),
            Some(Value::Int64Array(vec![1, 2, 3]))
        );
        assert_eq!(
            Value::from_json(&json!([1, 2.5])),
            Some(Value::Float64Array(vec![1.0, 2.5]))
        );
        assert_eq!(Value::from_json(&json!([1, "x"])), None);
    }

    #[test]
    fn test_uuid_format_and_parse() {
        let bytes = [
            0x00, 0xc0, 0x15, 0xfa, 0x57, 0x1e, 0x40, 0x6b, 0x9d, 0x98, 0xaa, 0xc9, 0x27, 0x26,
            0x73, 0x06,
        ];
        let text = format_uuid(&bytes);
        assert_eq!(text, "00c015fa-571e-406b-9d98-aac927267306");
        assert_eq!(parse_uuid(&text), Some(bytes));
        assert_eq!(parse_uuid("not-a-uuid"), None);
    }

    #[test]
    fn test_serialize_as_plain_json() {
        let encoded = serde_json::to_value(Value::Int32(4)).unwrap();
        assert_eq!(encoded, json!(4));
        let encoded = serde_json::to_value(Value::StringArray(vec!["a".into()])).unwrap();
        assert_eq!(encoded, json!(["a"]));
        assert_eq!(Value::Uuid([0; 16]).to_json(), json!("00000000-0000-0000-0000-000000000000"));
    }
}
