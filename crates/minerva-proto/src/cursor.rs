//! Opaque pagination cursors.
//!
//! A cursor always wraps the primary-key value of the row it points at, never
//! the value of the field being paginated by. Tokens are the rkyv encoding of
//! that value, hex encoded so they can travel as plain strings.

use crate::error::Error;
use crate::value::Value;
use rkyv::util::AlignedVec;

/// Primary-key value marking a pagination boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor(pub Value);

impl Cursor {
    /// Wrap a primary-key value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// The primary-key value behind this cursor.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Consume the cursor, returning its primary-key value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Encode the cursor as an opaque string token.
    pub fn to_token(&self) -> Result<String, Error> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&self.0)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(hex::encode(bytes.as_slice()))
    }

    /// Decode a token produced by [`Cursor::to_token`].
    pub fn from_token(token: &str) -> Result<Self, Error> {
        let raw = hex::decode(token).map_err(|e| Error::InvalidCursor(e.to_string()))?;
        let mut aligned = AlignedVec::<16>::with_capacity(raw.len());
        aligned.extend_from_slice(&raw);
        let value = rkyv::from_bytes::<Value, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::InvalidCursor(e.to_string()))?;
        Ok(Self(value))
    }
}

impl From<Value> for Cursor {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
