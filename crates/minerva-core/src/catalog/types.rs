//! Column kinds and the operators and literals each kind accepts.

use minerva_proto::value::parse_uuid;
use minerva_proto::{CompareOp, Value};

/// Scalar data types a column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

/// Field types - flat representation without recursion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
    /// An array of scalar values.
    ArrayScalar(ScalarType),
    /// An enumeration type.
    Enum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
    /// A JSON document column.
    Json,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64
        )
    }

    /// Check if this type is ordered in time.
    pub fn is_temporal(&self) -> bool {
        matches!(self, ScalarType::Timestamp)
    }

    /// Check if this type is a string-like type.
    pub fn is_string_like(&self) -> bool {
        matches!(self, ScalarType::String)
    }

    /// Convert a JSON literal into a value of this type.
    pub fn literal(&self, json: &serde_json::Value) -> Option<Value> {
        if json.is_null() {
            return Some(Value::Null);
        }
        match self {
            ScalarType::Bool => json.as_bool().map(Value::Bool),
            ScalarType::Int32 => json
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Int32),
            ScalarType::Int64 => json.as_i64().map(Value::Int64),
            ScalarType::Float64 => json.as_f64().map(Value::Float64),
            ScalarType::String => json.as_str().map(Value::from),
            ScalarType::Timestamp => match json {
                serde_json::Value::Number(n) => n.as_i64().map(Value::Timestamp),
                serde_json::Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| Value::Timestamp(dt.timestamp_micros())),
                _ => None,
            },
            ScalarType::Uuid => json.as_str().and_then(parse_uuid).map(Value::Uuid),
        }
    }

    /// Parse a key value sent as text, such as a numeric ID in string form.
    pub fn parse(&self, text: &str) -> Option<Value> {
        match self {
            ScalarType::Int32 => text.parse().ok().map(Value::Int32),
            ScalarType::Int64 => text.parse().ok().map(Value::Int64),
            ScalarType::Float64 => text.parse().ok().map(Value::Float64),
            ScalarType::Timestamp => text.parse().ok().map(Value::Timestamp),
            ScalarType::Uuid => parse_uuid(text).map(Value::Uuid),
            ScalarType::String => Some(Value::from(text)),
            ScalarType::Bool => None,
        }
    }

    /// Convert a JSON array into the matching typed array value.
    fn array_literal(&self, json: &serde_json::Value) -> Option<Value> {
        let items = json.as_array()?;
        match self {
            ScalarType::Bool => items
                .iter()
                .map(|v| v.as_bool())
                .collect::<Option<Vec<_>>>()
                .map(Value::BoolArray),
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Timestamp => items
                .iter()
                .map(|v| v.as_i64())
                .collect::<Option<Vec<_>>>()
                .map(Value::Int64Array),
            ScalarType::Float64 => items
                .iter()
                .map(|v| v.as_f64())
                .collect::<Option<Vec<_>>>()
                .map(Value::Float64Array),
            ScalarType::String | ScalarType::Uuid => items
                .iter()
                .map(|v| v.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
                .map(Value::StringArray),
        }
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Create an array of scalars field type.
    pub fn array_scalar(scalar: ScalarType) -> Self {
        FieldType::ArrayScalar(scalar)
    }

    /// Create an enum field type.
    pub fn enum_type(name: impl Into<String>, variants: Vec<String>) -> Self {
        FieldType::Enum {
            name: name.into(),
            variants,
        }
    }

    /// Check if this type is nullable.
    pub fn is_nullable(&self) -> bool {
        matches!(self, FieldType::OptionalScalar(_) | FieldType::Json)
    }

    /// Check if this type is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::ArrayScalar(_))
    }

    /// Get the inner scalar type if this is a scalar-based type.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) | FieldType::ArrayScalar(s) => {
                Some(*s)
            }
            _ => None,
        }
    }

    /// Whether a filter operator applies to columns of this type.
    pub fn supports(&self, op: CompareOp) -> bool {
        match op {
            CompareOp::Eq | CompareOp::In => true,
            CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => match self {
                FieldType::Scalar(s) | FieldType::OptionalScalar(s) => {
                    s.is_numeric() || s.is_temporal()
                }
                _ => false,
            },
            CompareOp::Like | CompareOp::ILike => match self {
                FieldType::Scalar(s) | FieldType::OptionalScalar(s) => s.is_string_like(),
                _ => false,
            },
            CompareOp::Contains | CompareOp::Contained => {
                matches!(self, FieldType::ArrayScalar(_) | FieldType::Json)
            }
        }
    }

    /// Convert a single JSON literal for a comparison against this column.
    ///
    /// Array columns take array literals; every other kind takes a scalar.
    pub fn literal(&self, json: &serde_json::Value) -> Option<Value> {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => s.literal(json),
            FieldType::ArrayScalar(s) => {
                if json.is_null() {
                    Some(Value::Null)
                } else {
                    s.array_literal(json)
                }
            }
            FieldType::Enum { variants, .. } => match json {
                serde_json::Value::Null => Some(Value::Null),
                serde_json::Value::String(s) if variants.contains(s) => {
                    Some(Value::String(s.clone()))
                }
                _ => None,
            },
            FieldType::Json => Value::from_json(json),
        }
    }

    /// Parse a scalar value sent as text.
    pub fn parse_literal(&self, text: &str) -> Option<Value> {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => s.parse(text),
            _ => None,
        }
    }

    /// Convert a JSON array of literals for an `in` comparison.
    pub fn list_literal(&self, json: &serde_json::Value) -> Option<Vec<Value>> {
        json.as_array()?
            .iter()
            .map(|item| self.literal(item))
            .collect()
    }
}
