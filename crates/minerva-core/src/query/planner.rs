//! Query plan assembly.
//!
//! The planner resolves a selection node against the entity registry and
//! produces a [`FindPlan`]: the node's filter as the where-predicate, sort keys
//! for the node and its joined descendants, and one [`JoinSpec`] per eagerly
//! joined relationship, each carrying its own nested plan.

use super::filter::FilterCompiler;
use super::order::OrderCompiler;
use super::plan::{dedup_joins, DeferredField, FindPlan, JoinSpec};
use super::walker::AssociationWalker;
use crate::catalog::{EntityDef, EntityRegistry};
use crate::config::{OrderScoping, PlannerConfig};
use crate::error::Error;
use minerva_proto::{
    Cursor, OrderDirection, OrderKey, PageArgs, Predicate, SelectionNode, Value,
};
use tracing::{debug, trace};

/// Caller-supplied options merged into an assembled plan.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Plan for the pagination engine: the node's own sort becomes the
    /// pagination order and its paging arguments are attached.
    pub paginate: bool,
    /// Dot path of response keys selecting the node to plan from. Falls back
    /// to the given node when the path does not resolve.
    pub path: Option<String>,
    /// Predicate AND-ed with the compiled filter.
    pub extra_where: Option<Predicate>,
    /// Joins placed ahead of the planned joins.
    pub extra_joins: Vec<JoinSpec>,
    /// Order keys placed ahead of the planned keys.
    pub extra_order: Vec<OrderKey>,
}

impl PlanOptions {
    /// Options for a paginated plan.
    pub fn paginated() -> Self {
        Self {
            paginate: true,
            ..Default::default()
        }
    }

    /// Plan from the node at a dot path.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// AND an extra predicate into the where-clause.
    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.extra_where = Some(match self.extra_where.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Add an extra join.
    pub fn include(mut self, join: JoinSpec) -> Self {
        self.extra_joins.push(join);
        self
    }

    /// Add an extra leading order key.
    pub fn order_first(mut self, key: OrderKey) -> Self {
        self.extra_order.push(key);
        self
    }
}

/// State handed down the join recursion.
#[derive(Clone)]
struct PlanContext<'a> {
    registry: &'a EntityRegistry,
    config: &'a PlannerConfig,
    /// Relationship aliases from the plan root.
    path: Vec<String>,
}

impl<'a> PlanContext<'a> {
    fn root(registry: &'a EntityRegistry, config: &'a PlannerConfig) -> Self {
        Self {
            registry,
            config,
            path: Vec::new(),
        }
    }

    /// Context for a join under `alias`.
    fn enter(&self, alias: &str) -> Result<Self, Error> {
        let depth = self.path.len() + 1;
        if depth > self.config.max_depth {
            return Err(Error::DepthExceeded {
                depth,
                max: self.config.max_depth,
            });
        }
        let mut path = self.path.clone();
        path.push(alias.to_string());
        Ok(Self {
            registry: self.registry,
            config: self.config,
            path,
        })
    }
}

/// Planner that turns selection nodes into find-plans.
pub struct QueryPlanner<'a> {
    registry: &'a EntityRegistry,
    config: PlannerConfig,
}

impl<'a> QueryPlanner<'a> {
    /// Create a planner with default configuration.
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self::with_config(registry, PlannerConfig::default())
    }

    /// Create a planner with custom configuration.
    pub fn with_config(registry: &'a EntityRegistry, config: PlannerConfig) -> Self {
        Self { registry, config }
    }

    /// The registry plans are resolved against.
    pub fn registry(&self) -> &'a EntityRegistry {
        self.registry
    }

    /// The planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan a find over `entity` for `node`.
    pub fn plan(&self, entity: &str, node: &SelectionNode) -> Result<FindPlan, Error> {
        self.plan_with(entity, node, PlanOptions::default())
    }

    /// Plan a paginated find over `entity` for `node`.
    pub fn plan_page(&self, entity: &str, node: &SelectionNode) -> Result<FindPlan, Error> {
        self.plan_with(entity, node, PlanOptions::paginated())
    }

    /// Plan with caller-supplied options.
    pub fn plan_with(
        &self,
        entity: &str,
        node: &SelectionNode,
        options: PlanOptions,
    ) -> Result<FindPlan, Error> {
        let entity_def = self.registry.entity(entity)?;
        let node = match options.path.as_deref() {
            Some(path) => node.descend(path).unwrap_or_else(|| {
                debug!(entity, path, "selection path not found, planning from root");
                node
            }),
            None => node,
        };

        let ctx = PlanContext::root(self.registry, &self.config);
        let orders = OrderCompiler::new(self.registry);

        let mut plan = FindPlan::new(&entity_def.name);
        plan.predicate =
            FilterCompiler::new(entity_def).compile(node.arguments.filter.as_ref())?;

        if let Some(content) = node.content() {
            plan.joins = self.plan_joins(&ctx, entity_def, content)?;
            plan.deferred = self.deferred(entity_def, content);
        }

        plan.order = match self.config.order_scoping {
            OrderScoping::Flattened => orders.compile(entity_def, node, options.paginate),
            OrderScoping::Nested if options.paginate => Vec::new(),
            OrderScoping::Nested => orders.local(entity_def, node).into_iter().collect(),
        };

        if options.paginate {
            plan.paginate = Some(page_args(entity_def, node)?);
        }

        if let Some(extra) = options.extra_where {
            plan.predicate = Predicate::And(vec![plan.predicate, extra]).simplify();
        }
        let mut joins = options.extra_joins;
        joins.append(&mut plan.joins);
        dedup_joins(&mut joins);
        plan.joins = joins;

        let mut order = options.extra_order;
        order.append(&mut plan.order);
        plan.order = order;

        trace!(entity, joins = plan.joins.len(), order = plan.order.len(), "assembled plan");
        Ok(plan)
    }

    fn plan_joins(
        &self,
        ctx: &PlanContext<'_>,
        entity: &EntityDef,
        content: &SelectionNode,
    ) -> Result<Vec<JoinSpec>, Error> {
        let walker = AssociationWalker::new(ctx.registry);
        let orders = OrderCompiler::new(ctx.registry);
        let mut joins = Vec::new();

        for (child, relation) in walker.joins(&entity.name, content) {
            let child_ctx = ctx.enter(&relation.name)?;
            let target = ctx.registry.entity(&relation.to_entity)?;

            let mut join = JoinSpec::from_relation(relation).with_predicate(
                FilterCompiler::new(target).compile(child.arguments.filter.as_ref())?,
            );
            if ctx.config.order_scoping == OrderScoping::Nested {
                join.order = orders.local(target, child).into_iter().collect();
            }
            if let Some(child_content) = child.content() {
                join.joins = self.plan_joins(&child_ctx, target, child_content)?;
                join.deferred = self.deferred(target, child_content);
            }

            trace!(path = ?child_ctx.path, target = %target.name, "planned join");
            joins.push(join);
        }

        dedup_joins(&mut joins);
        Ok(joins)
    }

    fn deferred(&self, entity: &EntityDef, content: &SelectionNode) -> Vec<DeferredField> {
        AssociationWalker::new(self.registry)
            .deferred(&entity.name, content)
            .into_iter()
            .map(|(child, relation, reason)| DeferredField {
                response_key: child.response_key().to_string(),
                relation: relation.name.clone(),
                target: relation.to_entity.clone(),
                reason,
            })
            .collect()
    }
}

/// Paging arguments of a paginated node.
///
/// The node's sort becomes `paginate_by`/`desc`, and the total is requested
/// when `pageInfo.totalCount` or `pageInfo.pageCount` is selected.
fn page_args(entity: &EntityDef, node: &SelectionNode) -> Result<PageArgs, Error> {
    let args = &node.arguments;
    let cursor = |raw: &Option<serde_json::Value>| match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(json) => cursor_value(entity, json).map(Some),
    };

    Ok(PageArgs {
        first: args.first,
        last: args.last,
        before: cursor(&args.before)?,
        after: cursor(&args.after)?,
        paginate_by: args.sort.as_ref().map(|s| s.field.clone()),
        desc: args
            .sort
            .as_ref()
            .is_some_and(|s| s.dir == OrderDirection::Desc),
        include_total: node.requests_total(),
    })
}

/// Interpret a raw cursor as a primary-key value.
///
/// The raw primary key is accepted as is, including a numeric or UUID key
/// sent as a string; any other string is decoded as an opaque cursor token.
fn cursor_value(entity: &EntityDef, json: &serde_json::Value) -> Result<Value, Error> {
    let pk = entity
        .primary_key_field()
        .ok_or_else(|| Error::MissingPrimaryKey(entity.name.clone()))?;

    if let Some(value) = pk.field_type.literal(json) {
        return Ok(value);
    }
    match json {
        serde_json::Value::String(raw) => match pk.field_type.parse_literal(raw) {
            Some(value) => Ok(value),
            None => Ok(Cursor::from_token(raw)?.into_value()),
        },
        other => Err(Error::InvalidArgument(format!(
            "cursor {} is not a {} primary key",
            other, entity.name
        ))),
    }
}
