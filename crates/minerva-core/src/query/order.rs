//! Order compilation.
//!
//! Sort arguments live on the node of the field they sort; the fields of a
//! paginated collection live under its `results` child. Keys of eagerly joined
//! relationships are qualified by the aliases leading to them.

use super::walker::AssociationWalker;
use crate::catalog::{EntityDef, EntityRegistry};
use minerva_proto::{OrderKey, SelectionNode};
use tracing::debug;

/// Compiles sort arguments into order keys.
#[derive(Clone, Copy)]
pub struct OrderCompiler<'a> {
    registry: &'a EntityRegistry,
    walker: AssociationWalker<'a>,
}

impl<'a> OrderCompiler<'a> {
    /// Create a compiler over a registry.
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self {
            registry,
            walker: AssociationWalker::new(registry),
        }
    }

    /// The node's own sort key, if its sort field is a persisted field.
    pub fn local(&self, entity: &EntityDef, node: &SelectionNode) -> Option<OrderKey> {
        let sort = node.arguments.sort.as_ref()?;
        match entity.get_field(&sort.field) {
            Some(field) if field.is_persisted() => Some(OrderKey::new(&sort.field, sort.dir)),
            _ => {
                debug!(entity = %entity.name, field = %sort.field, "skipping sort on unknown field");
                None
            }
        }
    }

    /// Every key for a node and its eagerly joined descendants, depth first in
    /// selection order.
    ///
    /// With `paginating`, the node's own sort is left out; the pagination
    /// engine orders by it together with the cursor bounds.
    pub fn compile(
        &self,
        entity: &EntityDef,
        node: &SelectionNode,
        paginating: bool,
    ) -> Vec<OrderKey> {
        let mut keys = Vec::new();
        if !paginating {
            keys.extend(self.local(entity, node));
        }
        self.collect_joined(entity, node, &[], &mut keys);
        keys
    }

    fn collect_joined(
        &self,
        entity: &EntityDef,
        node: &SelectionNode,
        path: &[String],
        keys: &mut Vec<OrderKey>,
    ) {
        let Some(content) = node.content() else {
            return;
        };

        for (child, relation) in self.walker.joins(&entity.name, content) {
            let Some(target) = self.registry.get_entity(&relation.to_entity) else {
                continue;
            };
            let mut child_path = path.to_vec();
            child_path.push(relation.name.clone());

            if let Some(key) = self.local(target, child) {
                keys.push(key.with_path(child_path.clone()));
            }
            self.collect_joined(target, child, &child_path, keys);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType, RelationDef, ScalarType};
    use minerva_proto::{Arguments, OrderDirection, SortArg};
    use pretty_assertions::assert_eq;

    fn registry() -> EntityRegistry {
        let id = || FieldDef::new("id", FieldType::scalar(ScalarType::Int64));
        let text = |name: &str| FieldDef::new(name, FieldType::scalar(ScalarType::String));
        EntityRegistry::new()
            .with_entity(EntityDef::new("User", "id").with_field(id()).with_field(text("name")))
            .with_entity(
                EntityDef::new("Post", "id")
                    .with_field(id())
                    .with_field(text("title"))
                    .with_field(FieldDef::new("authorId", FieldType::scalar(ScalarType::Int64))),
            )
            .with_entity(
                EntityDef::new("Comment", "id")
                    .with_field(id())
                    .with_field(text("body"))
                    .with_field(FieldDef::new("postId", FieldType::scalar(ScalarType::Int64))),
            )
            .with_relation(RelationDef::multi("posts", "User", "id", "Post", "authorId"))
            .with_relation(RelationDef::multi("comments", "Post", "id", "Comment", "postId"))
    }

    fn sorted(field: &str, dir: OrderDirection) -> Arguments {
        Arguments::default().sort(SortArg::new(field, dir))
    }

    #[test]
    fn test_nested_keys_are_path_qualified() {
        let registry = registry();
        let compiler = OrderCompiler::new(&registry);
        let user = registry.get_entity("User").unwrap();

        let node = SelectionNode::new("users")
            .with_args(sorted("name", OrderDirection::Asc))
            .with_child(
                SelectionNode::new("posts")
                    .with_args(sorted("title", OrderDirection::Desc))
                    .with_child(
                        SelectionNode::new("comments").with_args(sorted("body", OrderDirection::Asc)),
                    ),
            );

        assert_eq!(
            compiler.compile(user, &node, false),
            vec![
                OrderKey::asc("name"),
                OrderKey::desc("title").with_path(vec!["posts".into()]),
                OrderKey::asc("body").with_path(vec!["posts".into(), "comments".into()]),
            ]
        );
    }

    #[test]
    fn test_root_sort_left_out_when_paginating() {
        let registry = registry();
        let compiler = OrderCompiler::new(&registry);
        let user = registry.get_entity("User").unwrap();

        let node = SelectionNode::new("usersPage")
            .with_args(sorted("name", OrderDirection::Desc))
            .with_child(
                SelectionNode::new("results").with_child(
                    SelectionNode::new("posts").with_args(sorted("title", OrderDirection::Asc)),
                ),
            )
            .with_child(SelectionNode::new("pageInfo").with_fields(["hasNextPage"]));

        assert_eq!(
            compiler.compile(user, &node, true),
            vec![OrderKey::asc("title").with_path(vec!["posts".into()])]
        );
    }

    #[test]
    fn test_deferred_children_contribute_no_keys() {
        let registry = registry();
        let compiler = OrderCompiler::new(&registry);
        let user = registry.get_entity("User").unwrap();

        let node = SelectionNode::new("users")
            .with_child(
                SelectionNode::new("posts")
                    .with_args(sorted("title", OrderDirection::Asc).first(2)),
            )
            .with_child(
                SelectionNode::new("posts")
                    .aliased("latest")
                    .with_args(sorted("title", OrderDirection::Desc)),
            );

        assert!(compiler.compile(user, &node, false).is_empty());
    }

    #[test]
    fn test_unknown_sort_field_is_skipped() {
        let registry = registry();
        let compiler = OrderCompiler::new(&registry);
        let user = registry.get_entity("User").unwrap();
        let node = SelectionNode::new("users").with_args(sorted("age", OrderDirection::Asc));
        assert!(compiler.local(user, &node).is_none());
    }
}
