//! Cursor pagination engine.
//!
//! Turns a find-plan and page arguments into one bounded, ordered query. Rows
//! are ordered by `(paginate_by, primary key)` so that duplicate sort values
//! still give a strict total order, and cursors only ever carry the primary
//! key: the cursor row's sort value is read back with a correlated lookup.
//!
//! `last` pages are fetched from the tail in reversed physical order and
//! flipped back before returning. One extra row is requested to tell whether
//! more rows lie beyond the page.

use super::executor::Executor;
use super::plan::FindPlan;
use crate::catalog::{EntityDef, EntityRegistry};
use crate::config::PlannerConfig;
use crate::error::Error;
use minerva_proto::{
    CompareOp, CursorLookup, Operand, OrderDirection, OrderKey, Page, PageArgs, PageInfo,
    Predicate, Row, Value,
};
use tracing::{debug, instrument, warn};

/// Executes paginated find-plans through an [`Executor`].
///
/// Holds no state between calls; every page is a fresh evaluation, so one
/// paginator can serve concurrent requests.
pub struct CursorPaginator<'a, E: Executor + ?Sized> {
    registry: &'a EntityRegistry,
    executor: &'a E,
    config: PlannerConfig,
}

impl<'a, E: Executor + ?Sized> CursorPaginator<'a, E> {
    /// Create a paginator with default configuration.
    pub fn new(registry: &'a EntityRegistry, executor: &'a E) -> Self {
        Self::with_config(registry, executor, PlannerConfig::default())
    }

    /// Create a paginator with custom configuration.
    pub fn with_config(registry: &'a EntityRegistry, executor: &'a E, config: PlannerConfig) -> Self {
        Self {
            registry,
            executor,
            config,
        }
    }

    /// Fetch the page described by the plan's own page arguments.
    ///
    /// A plan without page arguments is paginated with the defaults: the
    /// whole window, ascending by primary key.
    #[instrument(skip(self, plan), fields(entity = %plan.entity))]
    pub async fn paginate(&self, plan: &FindPlan) -> Result<Page, Error> {
        let args = plan.paginate.clone().unwrap_or_default();
        self.paginate_with(plan, &args).await
    }

    /// Fetch a page of `plan` with explicit page arguments.
    ///
    /// Request errors are raised before any storage call. Storage errors are
    /// returned unchanged and never retried.
    pub async fn paginate_with(&self, plan: &FindPlan, args: &PageArgs) -> Result<Page, Error> {
        let bounded = self.bounded_plan(plan, args)?;

        let fetch = self.executor.execute(&bounded);
        let (rows, total) = if args.include_total {
            // The total ignores cursor bounds.
            let count = self.executor.count(&plan.entity, &plan.predicate);
            if self.config.concurrent_count {
                let (rows, total) = futures::try_join!(fetch, count)?;
                (rows, Some(total))
            } else {
                let rows = fetch.await?;
                (rows, Some(count.await?))
            }
        } else {
            (fetch.await?, None)
        };

        Ok(page_from_rows(rows, args, total))
    }

    /// Build the bounded query for a page without running it.
    pub fn bounded_plan(&self, plan: &FindPlan, args: &PageArgs) -> Result<FindPlan, Error> {
        if args.first_bound().is_some() && args.last_bound().is_some() {
            return Err(Error::ConflictingPageBounds);
        }
        let entity = self.registry.entity(&plan.entity)?;
        let pk = entity
            .primary_key
            .as_deref()
            .ok_or_else(|| Error::MissingPrimaryKey(entity.name.clone()))?;
        let paginate_by = resolve_paginate_by(entity, pk, args);

        let mut clauses = Vec::with_capacity(3);
        if let Some(before) = &args.before {
            let op = if args.desc { CompareOp::Gt } else { CompareOp::Lt };
            clauses.push(cursor_bound(entity, pk, paginate_by, op, before));
        }
        if let Some(after) = &args.after {
            let op = if args.desc { CompareOp::Lt } else { CompareOp::Gt };
            clauses.push(cursor_bound(entity, pk, paginate_by, op, after));
        }
        clauses.push(plan.predicate.clone());

        // `last` reads from the tail, so the physical order flips.
        let direction = OrderDirection::from_desc(args.desc != args.last_bound().is_some());
        let mut order = vec![OrderKey::new(paginate_by, direction)];
        if paginate_by != pk {
            order.push(OrderKey::new(pk, direction));
        }
        order.extend(plan.order.iter().cloned());

        Ok(FindPlan {
            entity: plan.entity.clone(),
            predicate: Predicate::And(clauses).simplify(),
            order,
            joins: plan.joins.clone(),
            limit: args.page_size().map(|n| n + 1).or(plan.limit),
            paginate: Some(args.clone()),
            deferred: plan.deferred.clone(),
        })
    }
}

/// Pick the pagination field, falling back to the primary key when the
/// requested field cannot be ordered by.
fn resolve_paginate_by<'e>(entity: &'e EntityDef, pk: &'e str, args: &'e PageArgs) -> &'e str {
    match args.paginate_by.as_deref() {
        None => pk,
        Some(field) => match entity.get_field(field) {
            Some(def) if def.is_persisted() => field,
            _ => {
                warn!(
                    entity = %entity.name,
                    field,
                    "cannot paginate by field, falling back to primary key"
                );
                pk
            }
        },
    }
}

/// The rows strictly beyond the cursor row in `(paginate_by, pk)` order.
fn cursor_bound(
    entity: &EntityDef,
    pk: &str,
    paginate_by: &str,
    op: CompareOp,
    cursor: &Value,
) -> Predicate {
    let beyond_key = Predicate::compare(pk, op, cursor.clone());
    if paginate_by == pk {
        return beyond_key;
    }

    let cursor_sort_value = || {
        Operand::Lookup(CursorLookup {
            entity: entity.name.clone(),
            field: paginate_by.to_string(),
            key_field: pk.to_string(),
            key: cursor.clone(),
        })
    };
    Predicate::Or(vec![
        Predicate::Compare {
            field: paginate_by.to_string(),
            op,
            operand: cursor_sort_value(),
        },
        Predicate::And(vec![
            Predicate::Compare {
                field: paginate_by.to_string(),
                op: CompareOp::Eq,
                operand: cursor_sort_value(),
            },
            beyond_key,
        ]),
    ])
}

/// Shape the rows of a bounded query into a page.
///
/// `rows` are in physical order and may hold the one extra look-ahead row;
/// `total` is the unbounded count when it was requested.
pub fn page_from_rows(mut rows: Vec<Row>, args: &PageArgs, total: Option<u64>) -> Page {
    let has_more = args
        .page_size()
        .is_some_and(|size| rows.len() > size);
    if has_more {
        rows.pop();
    }
    if args.last_bound().is_some() {
        rows.reverse();
    }

    // A bound on the far side implies rows beyond it without probing.
    let has_next_page = if args.before.is_some() {
        true
    } else if args.last_bound().is_some() {
        false
    } else {
        args.first_bound().is_some() && has_more
    };
    let has_previous_page = if args.after.is_some() {
        true
    } else if args.first_bound().is_some() {
        false
    } else {
        args.last_bound().is_some() && has_more
    };

    let total_count = total.unwrap_or(0);
    let per_page = args.page_size().map_or(total_count, |n| n as u64);
    let number_pages = if per_page == 0 {
        1
    } else {
        total_count.div_ceil(per_page).max(1)
    };

    debug!(rows = rows.len(), has_more, "page fetched");
    Page {
        page_info: PageInfo {
            has_next_page,
            has_previous_page,
            total_count,
            page_count: rows.len() as u64,
            number_pages,
        },
        results: rows,
    }
}
