//! Find-plans: the relational query assembled for one selection node.

use super::walker::DeferReason;
use crate::catalog::{RelationDef, Through};
use minerva_proto::{OrderKey, PageArgs, Predicate};
use serde::Serialize;

/// A relational query: where-predicate, order and joins over a root entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindPlan {
    /// Root entity name.
    pub entity: String,
    /// Where-predicate over the root entity's fields.
    pub predicate: Predicate,
    /// Order keys, path-qualified for joined fields.
    pub order: Vec<OrderKey>,
    /// Eager joins.
    pub joins: Vec<JoinSpec>,
    /// Maximum number of root rows.
    pub limit: Option<usize>,
    /// Pagination arguments when the plan is for a paginated collection.
    pub paginate: Option<PageArgs>,
    /// Selected relationships left to separate queries.
    pub deferred: Vec<DeferredField>,
}

/// An eagerly joined relationship, carrying its own nested plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    /// Relationship alias on the owning entity.
    pub alias: String,
    /// Target entity name.
    pub target: String,
    /// Owning entity field.
    pub from_field: String,
    /// Target entity field.
    pub to_field: String,
    /// Through-entity for many-to-many relationships.
    pub through: Option<Through>,
    /// Whether the relationship yields many rows.
    pub multi: bool,
    /// Inner join when true. Planned joins are always outer.
    pub required: bool,
    /// Where-predicate over the target's fields, applied in the join condition.
    pub predicate: Predicate,
    /// Order keys local to the target.
    pub order: Vec<OrderKey>,
    /// Joins nested under the target.
    pub joins: Vec<JoinSpec>,
    /// Relationships selected under the target that need separate queries.
    pub deferred: Vec<DeferredField>,
}

/// A selected relationship that the caller must fetch with its own query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredField {
    /// Key the field appears under in the response.
    pub response_key: String,
    /// Relationship alias.
    pub relation: String,
    /// Target entity name.
    pub target: String,
    /// Why it was not joined.
    pub reason: DeferReason,
}

impl FindPlan {
    /// Create an unfiltered, unordered plan for an entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: Predicate::always(),
            order: Vec::new(),
            joins: Vec::new(),
            limit: None,
            paginate: None,
            deferred: Vec::new(),
        }
    }

    /// Set the where-predicate.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Append an order key.
    pub fn with_order(mut self, key: OrderKey) -> Self {
        self.order.push(key);
        self
    }

    /// Append a join.
    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Attach pagination arguments.
    pub fn with_paginate(mut self, args: PageArgs) -> Self {
        self.paginate = Some(args);
        self
    }

    /// Find a join by alias path.
    pub fn join_at(&self, path: &[&str]) -> Option<&JoinSpec> {
        let (first, rest) = path.split_first()?;
        let mut join = self.joins.iter().find(|j| j.alias == *first)?;
        for alias in rest {
            join = join.joins.iter().find(|j| j.alias == *alias)?;
        }
        Some(join)
    }
}

impl JoinSpec {
    /// An outer join over a relationship with no predicate, order or nested
    /// joins.
    pub fn from_relation(relation: &RelationDef) -> Self {
        Self {
            alias: relation.name.clone(),
            target: relation.to_entity.clone(),
            from_field: relation.from_field.clone(),
            to_field: relation.to_field.clone(),
            through: relation.through.clone(),
            multi: relation.is_multi(),
            required: false,
            predicate: Predicate::always(),
            order: Vec::new(),
            joins: Vec::new(),
            deferred: Vec::new(),
        }
    }

    /// Set the join predicate.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Append a nested join.
    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }
}

/// Drop joins repeating an earlier `(target, alias)` pair, keeping the first.
pub fn dedup_joins(joins: &mut Vec<JoinSpec>) {
    let mut seen = std::collections::HashSet::new();
    joins.retain(|join| seen.insert((join.target.clone(), join.alias.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_joins_keeps_first() {
        let posts = RelationDef::multi("posts", "User", "id", "Post", "authorId");
        let mut joins = vec![
            JoinSpec::from_relation(&posts).with_predicate(Predicate::eq("id", 1i64)),
            JoinSpec::from_relation(&posts),
            JoinSpec::from_relation(&RelationDef::multi("drafts", "User", "id", "Post", "authorId")),
        ];
        dedup_joins(&mut joins);

        assert_eq!(joins.len(), 2);
        assert!(!joins[0].predicate.is_always());
        assert_eq!(joins[1].alias, "drafts");
    }

    #[test]
    fn test_join_at() {
        let posts = RelationDef::multi("posts", "User", "id", "Post", "authorId");
        let comments = RelationDef::multi("comments", "Post", "id", "Comment", "postId");
        let plan = FindPlan::new("User").with_join(
            JoinSpec::from_relation(&posts).with_join(JoinSpec::from_relation(&comments)),
        );

        assert_eq!(plan.join_at(&["posts", "comments"]).unwrap().target, "Comment");
        assert!(plan.join_at(&["comments"]).is_none());
        assert!(plan.join_at(&[]).is_none());
        assert!(!plan.joins[0].required);
    }
}
