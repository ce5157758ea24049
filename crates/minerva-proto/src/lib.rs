//! Minerva protocol types.
//!
//! This crate defines the data exchanged between the query core and its
//! collaborators: the selection normalizer that feeds it and the executors and
//! response shapers that consume its output.
//!
//! # Modules
//!
//! - [`value`] - Runtime values compared in predicates and returned in rows
//! - [`cursor`] - Opaque primary-key cursors
//! - [`query`] - Predicate tree, order keys and pagination arguments
//! - [`selection`] - Normalized field-selection trees
//! - [`result`] - Rows and page results
//! - [`error`] - Protocol error types

pub mod cursor;
pub mod error;
pub mod query;
pub mod result;
pub mod selection;
pub mod value;

pub use cursor::Cursor;
pub use error::Error;

// Re-export commonly used types at crate root
pub use query::{
    CompareOp, CursorLookup, Operand, OrderDirection, OrderKey, PageArgs, Predicate, SortArg,
};
pub use result::{Page, PageInfo, Related, Row};
pub use selection::{Arguments, SelectionNode};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_roundtrip() {
        let value = Value::String("hello".into());
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&value).unwrap();
        let archived =
            rkyv::access::<value::ArchivedValue, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: Value =
            rkyv::deserialize::<Value, rkyv::rancor::Error>(archived).unwrap();
        assert_eq!(value, deserialized);
    }

    #[test]
    fn test_cursor_token_is_opaque_primary_key() {
        let token = Cursor::new(Value::Uuid([7; 16])).to_token().unwrap();
        let decoded = Cursor::from_token(&token).unwrap();
        assert_eq!(decoded.value().as_uuid(), Some(&[7; 16]));
    }
}
