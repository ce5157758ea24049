//! Entity catalog.
//!
//! Entities, their field-to-column mapping and the relationships between them.
//! Definitions are registered once into an [`EntityRegistry`] and never mutated
//! afterwards.

mod entity;
mod field;
mod registry;
mod relation;
mod types;

pub use entity::EntityDef;
pub use field::{ComputedField, FieldDef};
pub use registry::EntityRegistry;
pub use relation::{Cardinality, RelationDef, Through};
pub use types::{FieldType, ScalarType};
