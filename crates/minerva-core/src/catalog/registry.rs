//! Entity registry - the immutable set of entities and relationships a planner
//! resolves selections against.

use super::{EntityDef, RelationDef};
use crate::error::Error;
use std::collections::HashMap;

/// Entities and the relationships between them.
///
/// Built once at startup, then only read. Relationships are keyed by owning
/// entity and alias.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, EntityDef>,
    relations: HashMap<String, Vec<RelationDef>>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Add a relationship, replacing any with the same owner and alias.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        let owned = self.relations.entry(relation.from_entity.clone()).or_default();
        owned.retain(|r| r.name != relation.name);
        owned.push(relation);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get an entity by name, failing if it is not registered.
    pub fn entity(&self, name: &str) -> Result<&EntityDef, Error> {
        self.get_entity(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Get a relationship of `entity` by its alias.
    pub fn relation(&self, entity: &str, alias: &str) -> Option<&RelationDef> {
        self.relations
            .get(entity)
            .and_then(|owned| owned.iter().find(|r| r.name == alias))
    }

    /// Get all relationships owned by an entity.
    pub fn relations_from(&self, entity: &str) -> &[RelationDef] {
        self.relations
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    /// Check that every relationship and primary key refers to defined
    /// entities and fields, and that no alias shadows a field.
    pub fn validate(&self) -> Result<(), Error> {
        for entity in self.entities.values() {
            if let Some(pk) = &entity.primary_key {
                if entity.get_field(pk).is_none() {
                    return Err(Error::InvalidSchema(format!(
                        "primary key {}.{} is not a field",
                        entity.name, pk
                    )));
                }
            }
        }

        for relation in self.relations.values().flatten() {
            let owner = self.schema_entity(&relation.from_entity, &relation.name)?;
            let target = self.schema_entity(&relation.to_entity, &relation.name)?;

            if owner.get_field(&relation.name).is_some() {
                return Err(Error::InvalidSchema(format!(
                    "relationship {}.{} shadows a field",
                    owner.name, relation.name
                )));
            }
            require_field(owner, &relation.from_field, &relation.name)?;
            require_field(target, &relation.to_field, &relation.name)?;

            if let Some(through) = &relation.through {
                let link = self.schema_entity(&through.entity, &relation.name)?;
                require_field(link, &through.source_key, &relation.name)?;
                require_field(link, &through.target_key, &relation.name)?;
            }
        }

        Ok(())
    }

    fn schema_entity(&self, name: &str, relation: &str) -> Result<&EntityDef, Error> {
        self.get_entity(name).ok_or_else(|| {
            Error::InvalidSchema(format!(
                "relationship {} refers to unknown entity {}",
                relation, name
            ))
        })
    }
}

fn require_field(entity: &EntityDef, field: &str, relation: &str) -> Result<(), Error> {
    match entity.get_field(field) {
        Some(def) if def.is_persisted() => Ok(()),
        _ => Err(Error::InvalidSchema(format!(
            "relationship {} joins on {}.{}, which is not a persisted field",
            relation, entity.name, field
        ))),
    }
}
