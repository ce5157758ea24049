//! Entity definitions.

use super::field::FieldDef;
use convert_case::{Case, Casing};

/// An entity definition (table schema).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    /// Entity name (unique within the registry).
    pub name: String,
    /// Backing table name.
    pub table: String,
    /// Name of the primary-key field, if the entity has one.
    pub primary_key: Option<String>,
    /// Field definitions.
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Create a new entity definition keyed by `primary_key`.
    ///
    /// The table name defaults to the snake_case form of the entity name.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.to_case(Case::Snake),
            name,
            primary_key: Some(primary_key.into()),
            fields: Vec::new(),
        }
    }

    /// Create an entity without a primary key. Such entities can be queried and
    /// joined but not paginated.
    pub fn keyless(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.to_case(Case::Snake),
            name,
            primary_key: None,
            fields: Vec::new(),
        }
    }

    /// Override the backing table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get the primary-key field definition.
    pub fn primary_key_field(&self) -> Option<&FieldDef> {
        self.primary_key
            .as_deref()
            .and_then(|pk| self.get_field(pk))
    }

    /// Column backing a field, if the field exists.
    pub fn column(&self, field: &str) -> Option<&str> {
        self.get_field(field).map(|f| f.column.as_str())
    }

    /// Fields that can appear in predicates and sort keys.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_persisted())
    }
}
