//! Field definitions for entities.

use super::types::FieldType;
use convert_case::{Case, Casing};

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name as exposed to callers.
    pub name: String,
    /// Backing column name.
    pub column: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Computed field definition if this is a derived field.
    pub computed: Option<ComputedField>,
}

/// Computed field definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputedField {
    /// Materialized: computed and stored on write.
    Materialized {
        /// Expression to compute the value.
        expression: String,
    },
    /// Virtual: computed on read, not stored.
    Virtual {
        /// Expression to compute the value.
        expression: String,
    },
}

impl FieldDef {
    /// Create a field whose column is the snake_case form of its name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            column: name.to_case(Case::Snake),
            name,
            field_type,
            computed: None,
        }
    }

    /// Override the backing column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Set as a computed field.
    pub fn computed(mut self, computed: ComputedField) -> Self {
        self.computed = Some(computed);
        self
    }

    /// Mark as a virtual field computed on read.
    pub fn virtual_field(self, expression: impl Into<String>) -> Self {
        self.computed(ComputedField::Virtual {
            expression: expression.into(),
        })
    }

    /// Check if this is a computed field.
    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    /// Check if the field has a backing column that predicates can reference.
    pub fn is_persisted(&self) -> bool {
        !matches!(self.computed, Some(ComputedField::Virtual { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::ScalarType;

    #[test]
    fn test_column_defaults_to_snake_case() {
        let field = FieldDef::new("createdAt", FieldType::scalar(ScalarType::Timestamp));
        assert_eq!(field.column, "created_at");

        let field = FieldDef::new("id", FieldType::scalar(ScalarType::Int64));
        assert_eq!(field.column, "id");

        let field = FieldDef::new("authorId", FieldType::scalar(ScalarType::Int64))
            .with_column("author");
        assert_eq!(field.column, "author");
    }

    #[test]
    fn test_computed_fields() {
        let field = FieldDef::new("fullName", FieldType::scalar(ScalarType::String))
            .virtual_field("first_name || ' ' || last_name");
        assert!(field.is_computed());
        assert!(!field.is_persisted());

        let field = FieldDef::new("total", FieldType::scalar(ScalarType::Int64)).computed(
            ComputedField::Materialized {
                expression: "price * quantity".into(),
            },
        );
        assert!(field.is_computed());
        assert!(field.is_persisted());
    }
}
