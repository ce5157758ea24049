//! Association walking.
//!
//! Decides, for every child of a selection node, whether it is a plain field,
//! a relationship folded into the parent's query as a join, or a relationship
//! that has to be fetched by a separate query.

use crate::catalog::{EntityRegistry, RelationDef};
use minerva_proto::SelectionNode;
use serde::Serialize;
use tracing::debug;

/// Why a relationship is left out of the parent's joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeferReason {
    /// The child requests its own bounded page (`first`/`last`).
    Bounded,
    /// The child is an aliased selection of a to-many relationship, or an
    /// aliased to-one selection colliding with another selection of the same
    /// relationship.
    Aliased,
}

/// How one selected child is satisfied.
#[derive(Debug, Clone, Copy)]
pub enum Association<'a> {
    /// Not a relationship of the entity.
    Field,
    /// Eagerly joined into the parent's query.
    Join(&'a RelationDef),
    /// Fetched by a separate query.
    Deferred(&'a RelationDef, DeferReason),
}

/// Classifies selected children against an entity's relationships.
#[derive(Clone, Copy)]
pub struct AssociationWalker<'a> {
    registry: &'a EntityRegistry,
}

impl<'a> AssociationWalker<'a> {
    /// Create a walker over a registry.
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self { registry }
    }

    /// Classify one child of a node of `entity`.
    ///
    /// Relationships are matched by the child's field name. To-one
    /// relationships are always joined. To-many relationships are deferred
    /// when the child asks for its own page or is aliased.
    pub fn classify(&self, entity: &str, child: &SelectionNode) -> Association<'a> {
        let Some(relation) = self.registry.relation(entity, &child.field_name) else {
            return Association::Field;
        };

        if relation.is_multi() {
            if child.arguments.is_bounded() {
                debug!(entity, field = %child.field_name, "deferring bounded association");
                return Association::Deferred(relation, DeferReason::Bounded);
            }
            if child.is_aliased() {
                debug!(
                    entity,
                    field = %child.field_name,
                    alias = child.response_key(),
                    "deferring aliased association"
                );
                return Association::Deferred(relation, DeferReason::Aliased);
            }
        }

        Association::Join(relation)
    }

    /// Classify one child among its siblings in `node`.
    ///
    /// Joins are keyed by relationship, so an aliased to-one child that shares
    /// its relationship with another sibling cannot be joined without losing
    /// one of the two selections; it is deferred instead.
    pub fn classify_in(
        &self,
        entity: &str,
        node: &SelectionNode,
        child: &SelectionNode,
    ) -> Association<'a> {
        match self.classify(entity, child) {
            Association::Join(relation) if child.is_aliased() && collides(node, child) => {
                debug!(
                    entity,
                    field = %child.field_name,
                    alias = child.response_key(),
                    "deferring aliased duplicate association"
                );
                Association::Deferred(relation, DeferReason::Aliased)
            }
            other => other,
        }
    }

    /// Children of `node` that are eagerly joined, with their relationships,
    /// in selection order.
    pub fn joins<'n>(
        &self,
        entity: &str,
        node: &'n SelectionNode,
    ) -> Vec<(&'n SelectionNode, &'a RelationDef)> {
        node.child_fields
            .iter()
            .filter_map(|child| match self.classify_in(entity, node, child) {
                Association::Join(relation) => Some((child, relation)),
                _ => None,
            })
            .collect()
    }

    /// Children of `node` that need a separate query.
    pub fn deferred<'n>(
        &self,
        entity: &str,
        node: &'n SelectionNode,
    ) -> Vec<(&'n SelectionNode, &'a RelationDef, DeferReason)> {
        node.child_fields
            .iter()
            .filter_map(|child| match self.classify_in(entity, node, child) {
                Association::Deferred(relation, reason) => Some((child, relation, reason)),
                _ => None,
            })
            .collect()
    }
}

/// Whether another child of `node` selects the same field as `child`.
fn collides(node: &SelectionNode, child: &SelectionNode) -> bool {
    node.child_fields
        .iter()
        .any(|other| !std::ptr::eq(other, child) && other.field_name == child.field_name)
}
