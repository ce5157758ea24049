//! Filter compilation.
//!
//! A filter argument is a JSON object whose keys are `and`, `or`, or
//! `<field>_<op>` / `<field>_not_<op>`. [`FilterCompiler`] turns it into a
//! [`Predicate`] over the entity's field names, converting every literal to the
//! column's kind.
//!
//! Keys naming unknown or virtual fields, and operators that do not apply to
//! the field's kind, are skipped rather than rejected. A literal of the wrong
//! kind for its field is an error.

use crate::catalog::{EntityDef, FieldDef};
use crate::error::Error;
use minerva_proto::{CompareOp, Operand, Predicate};
use serde_json::{Map, Value as Json};
use tracing::debug;

const ALL_OPS: [CompareOp; 10] = [
    CompareOp::Eq,
    CompareOp::Gt,
    CompareOp::Gte,
    CompareOp::Lt,
    CompareOp::Lte,
    CompareOp::Like,
    CompareOp::ILike,
    CompareOp::Contains,
    CompareOp::Contained,
    CompareOp::In,
];

/// Compiles filter arguments for one entity.
pub struct FilterCompiler<'a> {
    entity: &'a EntityDef,
}

/// A filter key resolved against the entity.
struct FilterKey<'a> {
    field: &'a FieldDef,
    op: CompareOp,
    negated: bool,
}

impl<'a> FilterCompiler<'a> {
    /// Create a compiler for an entity.
    pub fn new(entity: &'a EntityDef) -> Self {
        Self { entity }
    }

    /// Compile a filter argument.
    ///
    /// An absent filter compiles to the always-true predicate.
    pub fn compile(&self, filter: Option<&Json>) -> Result<Predicate, Error> {
        let predicate = match filter {
            None | Some(Json::Null) => return Ok(Predicate::always()),
            Some(Json::Object(map)) => self.compile_object(map)?,
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "filter on {} must be an object, got {}",
                    self.entity.name, other
                )))
            }
        };
        Ok(predicate.simplify())
    }

    fn compile_object(&self, map: &Map<String, Json>) -> Result<Predicate, Error> {
        let mut clauses = Vec::with_capacity(map.len());

        for (key, value) in map {
            match key.as_str() {
                "and" => clauses.push(Predicate::And(self.compile_group(value)?)),
                "or" => clauses.push(Predicate::Or(self.compile_group(value)?)),
                _ => {
                    if let Some(leaf) = self.compile_leaf(key, value)? {
                        clauses.push(leaf);
                    }
                }
            }
        }

        Ok(Predicate::And(clauses))
    }

    /// Compile the members of an `and`/`or` group. A lone object is accepted
    /// as a one-member group.
    fn compile_group(&self, value: &Json) -> Result<Vec<Predicate>, Error> {
        match value {
            Json::Array(items) => items
                .iter()
                .map(|item| match item {
                    Json::Object(map) => self.compile_object(map),
                    other => Err(Error::InvalidArgument(format!(
                        "filter group member must be an object, got {}",
                        other
                    ))),
                })
                .collect(),
            Json::Object(map) => Ok(vec![self.compile_object(map)?]),
            Json::Null => Ok(Vec::new()),
            other => Err(Error::InvalidArgument(format!(
                "filter group must be a list, got {}",
                other
            ))),
        }
    }

    fn compile_leaf(&self, key: &str, value: &Json) -> Result<Option<Predicate>, Error> {
        let Some(FilterKey { field, op, negated }) = self.resolve_key(key) else {
            debug!(entity = %self.entity.name, key, "skipping filter on unknown field");
            return Ok(None);
        };

        if !field.is_persisted() {
            debug!(entity = %self.entity.name, key, "skipping filter on virtual field");
            return Ok(None);
        }
        if !field.field_type.supports(op) {
            debug!(entity = %self.entity.name, key, "skipping operator not applicable to field");
            return Ok(None);
        }

        let operand = if op == CompareOp::In {
            field
                .field_type
                .list_literal(value)
                .map(Operand::List)
        } else {
            field.field_type.literal(value).map(Operand::Value)
        };
        let operand = operand.ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{}.{}: literal {} does not match field type",
                self.entity.name, key, value
            ))
        })?;

        let leaf = Predicate::Compare {
            field: field.name.clone(),
            op,
            operand,
        };
        Ok(Some(if negated { Predicate::negate(leaf) } else { leaf }))
    }

    /// Split `<field>_<op>` or `<field>_not_<op>` into its parts.
    ///
    /// Field names may contain underscores, so a split is only accepted when
    /// the field part names a field of the entity. The negated reading wins
    /// when both readings name a field.
    fn resolve_key(&self, key: &str) -> Option<FilterKey<'a>> {
        let entity = self.entity;
        ALL_OPS.iter().find_map(|&op| {
            let base = key.strip_suffix(op.suffix())?.strip_suffix('_')?;
            if let Some(field) = base.strip_suffix("_not").and_then(|f| entity.get_field(f)) {
                return Some(FilterKey {
                    field,
                    op,
                    negated: true,
                });
            }
            entity.get_field(base).map(|field| FilterKey {
                field,
                op,
                negated: false,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldType, ScalarType};
    use minerva_proto::Value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn test_entity() -> EntityDef {
        EntityDef::new("Test", "id")
            .with_field(FieldDef::new("id", FieldType::scalar(ScalarType::Int32)))
            .with_field(FieldDef::new("counter", FieldType::scalar(ScalarType::Int32)))
            .with_field(FieldDef::new("flag", FieldType::scalar(ScalarType::Bool)))
            .with_field(FieldDef::new("title", FieldType::optional_scalar(ScalarType::String)))
            .with_field(FieldDef::new("is_not", FieldType::scalar(ScalarType::Bool)))
            .with_field(FieldDef::new("tags", FieldType::array_scalar(ScalarType::String)))
            .with_field(FieldDef::new("createdAt", FieldType::scalar(ScalarType::Timestamp)))
            .with_field(
                FieldDef::new("label", FieldType::scalar(ScalarType::String))
                    .virtual_field("upper(title)"),
            )
    }

    fn compile(filter: Json) -> Result<Predicate, Error> {
        let entity = test_entity();
        FilterCompiler::new(&entity).compile(Some(&filter))
    }

    #[test]
    fn test_absent_filter_is_always_true() {
        let entity = test_entity();
        let compiler = FilterCompiler::new(&entity);
        assert!(compiler.compile(None).unwrap().is_always());
        assert!(compiler.compile(Some(&Json::Null)).unwrap().is_always());
        assert!(compiler.compile(Some(&json!({}))).unwrap().is_always());
    }

    #[test]
    fn test_or_with_negation() {
        let predicate = compile(json!({ "or": [{ "id_eq": 11 }, { "id_not_eq": 13 }] })).unwrap();
        assert_eq!(
            predicate,
            Predicate::Or(vec![
                Predicate::eq("id", Value::Int32(11)),
                Predicate::negate(Predicate::eq("id", Value::Int32(13))),
            ])
        );
    }

    #[test]
    fn test_sibling_keys_are_conjoined() {
        let predicate = compile(json!({ "counter_gte": 2, "flag_eq": true })).unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::compare("counter", CompareOp::Gte, Value::Int32(2)),
                Predicate::eq("flag", true),
            ])
        );
    }

    #[test]
    fn test_nested_groups() {
        let predicate = compile(json!({
            "and": [
                { "flag_eq": true },
                { "or": [{ "counter_lt": 2 }, { "counter_gt": 3 }] }
            ]
        }))
        .unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::eq("flag", true),
                Predicate::Or(vec![
                    Predicate::compare("counter", CompareOp::Lt, Value::Int32(2)),
                    Predicate::compare("counter", CompareOp::Gt, Value::Int32(3)),
                ]),
            ])
        );
    }

    #[test]
    fn test_in_and_not_in() {
        let predicate = compile(json!({ "id_in": [1, 2], "counter_not_in": [4] })).unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::negate(Predicate::in_values("counter", vec![Value::Int32(4)])),
                Predicate::in_values("id", vec![Value::Int32(1), Value::Int32(2)]),
            ])
        );
    }

    #[test]
    fn test_like_operators() {
        let predicate = compile(json!({ "title_iLike": "%rust%", "title_not_like": "draft%" })).unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::compare("title", CompareOp::ILike, "%rust%"),
                Predicate::negate(Predicate::compare("title", CompareOp::Like, "draft%")),
            ])
        );
    }

    #[test]
    fn test_array_and_timestamp_literals() {
        let predicate = compile(json!({
            "tags_contains": ["a"],
            "createdAt_lt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::compare(
                    "createdAt",
                    CompareOp::Lt,
                    Value::Timestamp(1_704_067_200_000_000)
                ),
                Predicate::compare(
                    "tags",
                    CompareOp::Contains,
                    Value::StringArray(vec!["a".into()])
                ),
            ])
        );
    }

    #[test]
    fn test_underscored_field_names() {
        assert_eq!(
            compile(json!({ "is_not_eq": true })).unwrap(),
            Predicate::eq("is_not", true)
        );
    }

    #[test]
    fn test_unknown_and_virtual_fields_are_skipped() {
        let predicate = compile(json!({
            "missing_eq": 1,
            "label_eq": "X",
            "flag_eq": false,
            "bogus": 3
        }))
        .unwrap();
        assert_eq!(predicate, Predicate::eq("flag", false));
    }

    #[test]
    fn test_inapplicable_operators_are_skipped() {
        let predicate = compile(json!({ "flag_gt": true, "counter_like": "1%" })).unwrap();
        assert!(predicate.is_always());
    }

    #[test]
    fn test_wrong_literal_kind_is_rejected() {
        assert!(matches!(
            compile(json!({ "counter_eq": "four" })),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            compile(json!({ "id_in": 3 })),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            compile(json!({ "or": 3 })),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(compile(json!([1])), Err(Error::InvalidArgument(_))));
    }
}
