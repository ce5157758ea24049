//! Relationship definitions between entities.

use serde::Serialize;

/// Cardinality of a relationship, seen from its owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one related row.
    Single,
    /// Any number of related rows.
    Multi,
}

/// Intermediate entity of a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Through {
    /// Through-entity name.
    pub entity: String,
    /// Through field matching the owner's `from_field`.
    pub source_key: String,
    /// Through field matching the target's `to_field`.
    pub target_key: String,
}

/// A directed relationship from an owning entity to a target entity.
///
/// Without a through-entity, an owner row and a target row are related when
/// `owner.from_field = target.to_field`. With one, they are related when a
/// through row has `source_key = owner.from_field` and
/// `target_key = target.to_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Alias the relationship is exposed under on the owning entity.
    pub name: String,
    /// Owning entity name.
    pub from_entity: String,
    /// Target entity name.
    pub to_entity: String,
    /// Relationship cardinality.
    pub cardinality: Cardinality,
    /// Field on the owning entity.
    pub from_field: String,
    /// Field on the target entity.
    pub to_field: String,
    /// Through-entity for many-to-many relationships.
    pub through: Option<Through>,
}

impl RelationDef {
    /// Create a to-one relationship.
    pub fn single(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality: Cardinality::Single,
            from_field: from_field.into(),
            to_field: to_field.into(),
            through: None,
        }
    }

    /// Create a to-many relationship.
    pub fn multi(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            cardinality: Cardinality::Multi,
            ..Self::single(name, from_entity, from_field, to_entity, to_field)
        }
    }

    /// Route the relationship through an intermediate entity.
    pub fn through(
        mut self,
        entity: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        self.through = Some(Through {
            entity: entity.into(),
            source_key: source_key.into(),
            target_key: target_key.into(),
        });
        self
    }

    /// Check if this relationship yields many rows.
    pub fn is_multi(&self) -> bool {
        self.cardinality == Cardinality::Multi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_relation() {
        let rel = RelationDef::single("author", "Post", "authorId", "User", "id");
        assert_eq!(rel.cardinality, Cardinality::Single);
        assert!(!rel.is_multi());
        assert!(rel.through.is_none());
    }

    #[test]
    fn test_many_to_many_relation() {
        let rel = RelationDef::multi("tags", "Post", "id", "Tag", "id")
            .through("PostTag", "postId", "tagId");

        assert!(rel.is_multi());
        let through = rel.through.unwrap();
        assert_eq!(through.entity, "PostTag");
        assert_eq!(through.source_key, "postId");
        assert_eq!(through.target_key, "tagId");
    }
}
