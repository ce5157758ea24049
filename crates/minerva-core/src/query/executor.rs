//! Executor adapter.
//!
//! The core never talks to storage itself. Find-plans and counts are handed to
//! an [`Executor`], and whatever it returns, rows or errors, is passed back to
//! the caller unchanged. Executors must not retry failed calls on the core's
//! behalf.

use super::plan::FindPlan;
use crate::error::Error;
use async_trait::async_trait;
use minerva_proto::{Predicate, Row};
use std::sync::Arc;

/// Runs find-plans against a relational store.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a plan, returning root rows with joined rows attached, in plan
    /// order and truncated to the plan's limit.
    async fn execute(&self, plan: &FindPlan) -> Result<Vec<Row>, Error>;

    /// Count rows of `entity` matching `predicate`.
    async fn count(&self, entity: &str, predicate: &Predicate) -> Result<u64, Error>;
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for Arc<T> {
    async fn execute(&self, plan: &FindPlan) -> Result<Vec<Row>, Error> {
        (**self).execute(plan).await
    }

    async fn count(&self, entity: &str, predicate: &Predicate) -> Result<u64, Error> {
        (**self).count(entity, predicate).await
    }
}
