//! Minerva Core - query-plan translation and cursor pagination.
//!
//! Translates a normalized field selection over an entity registry into one
//! relational find-plan (filters, order, eager joins) and executes cursor
//! pagination over it with correct has-more semantics.
//!
//! Storage is reached only through the [`Executor`] trait. [`MemoryExecutor`]
//! evaluates plans in memory and [`SqlRenderer`] renders them as SQL.

pub mod catalog;
pub mod config;
pub mod error;
pub mod query;

pub use catalog::{
    Cardinality, ComputedField, EntityDef, EntityRegistry, FieldDef, FieldType, RelationDef,
    ScalarType, Through,
};
pub use config::{OrderScoping, PlannerConfig};
pub use error::{Error, StorageError};
pub use query::{
    CursorPaginator, Dialect, Executor, FilterCompiler, FindPlan, JoinSpec, MemoryExecutor,
    OrderCompiler, PlanOptions, QueryPlanner, SqlQuery, SqlRenderer,
};

/// Re-export protocol types.
pub use minerva_proto as proto;
