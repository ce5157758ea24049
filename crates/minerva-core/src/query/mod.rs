//! Query-plan translation and cursor pagination.
//!
//! A normalized selection tree flows through the filter and order compilers
//! and the association walker into a [`FindPlan`]; paginated plans are then
//! bounded and executed by the [`CursorPaginator`] through an [`Executor`].

mod executor;
mod filter;
mod memory;
mod order;
mod pagination;
mod plan;
mod planner;
mod sql;
mod walker;

pub use executor::Executor;
pub use filter::FilterCompiler;
pub use memory::MemoryExecutor;
pub use order::OrderCompiler;
pub use pagination::{page_from_rows, CursorPaginator};
pub use plan::{dedup_joins, DeferredField, FindPlan, JoinSpec};
pub use planner::{PlanOptions, QueryPlanner};
pub use sql::{Dialect, SqlQuery, SqlRenderer};
pub use walker::{Association, AssociationWalker, DeferReason};
