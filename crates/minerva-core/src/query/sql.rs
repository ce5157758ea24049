//! SQL rendering of find-plans.
//!
//! Root columns are aliased by field name and joined columns by their dotted
//! alias path (`posts.comments.body`), so a row reader can rebuild the nested
//! shape. Joins are outer joins with the join's own predicate in the ON
//! clause, which keeps owners that have no matching related rows.

use super::plan::{FindPlan, JoinSpec};
use crate::catalog::{EntityDef, EntityRegistry};
use crate::error::Error;
use minerva_proto::{CompareOp, Operand, OrderDirection, OrderKey, Predicate, Value};

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL: `$n` placeholders, `ILIKE`, array containment operators.
    Postgres,
    /// SQLite: `?` placeholders.
    Sqlite,
}

impl Dialect {
    fn operator(self, op: CompareOp) -> Result<&'static str, Error> {
        Ok(match op {
            CompareOp::Eq | CompareOp::In => "=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
            // SQLite's LIKE is already case-insensitive for ASCII.
            CompareOp::ILike => match self {
                Dialect::Postgres => "ILIKE",
                Dialect::Sqlite => "LIKE",
            },
            CompareOp::Contains | CompareOp::Contained => match (self, op) {
                (Dialect::Postgres, CompareOp::Contains) => "@>",
                (Dialect::Postgres, _) => "<@",
                (Dialect::Sqlite, _) => {
                    return Err(Error::Unsupported(format!(
                        "{:?} comparisons in SQLite",
                        op
                    )))
                }
            },
        })
    }
}

/// A rendered statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// Statement text.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

/// Renders find-plans and counts to parameterised SQL.
pub struct SqlRenderer<'a> {
    registry: &'a EntityRegistry,
    dialect: Dialect,
}

struct Writer {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl Writer {
    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn bind(&mut self, value: Value) {
        self.params.push(value);
        match self.dialect {
            Dialect::Postgres => {
                let placeholder = format!("${}", self.params.len());
                self.sql.push_str(&placeholder);
            }
            Dialect::Sqlite => self.sql.push('?'),
        }
    }

    fn finish(self) -> SqlQuery {
        SqlQuery {
            sql: self.sql,
            params: self.params,
        }
    }
}

impl<'a> SqlRenderer<'a> {
    /// Create a renderer for a dialect.
    pub fn new(registry: &'a EntityRegistry, dialect: Dialect) -> Self {
        Self { registry, dialect }
    }

    /// Render a find-plan as a SELECT.
    ///
    /// When the plan has a limit and a to-many join, the limit applies to root
    /// rows, so the root is filtered, ordered and limited in a derived table
    /// before joining.
    pub fn render_find(&self, plan: &FindPlan) -> Result<SqlQuery, Error> {
        let entity = self.registry.entity(&plan.entity)?;
        let root = entity.name.as_str();
        let mut out = self.writer();

        let mut columns = Vec::new();
        select_columns(&mut columns, entity, root, "");
        self.joined_columns(&mut columns, &plan.joins, "")?;
        out.push("SELECT ");
        out.push(&columns.join(", "));
        out.push(" FROM ");

        let derived = plan.limit.is_some() && fans_out(&plan.joins);
        if derived {
            out.push(&format!("(SELECT * FROM {} AS {}", quote(&entity.table), quote(root)));
            self.write_where(&mut out, &plan.predicate, entity, root)?;
            let local: Vec<OrderKey> = plan.order.iter().filter(|k| k.is_local()).cloned().collect();
            let terms = self.order_terms(plan, &local, &[])?;
            write_order(&mut out, &terms);
            write_limit(&mut out, plan.limit);
            out.push(&format!(") AS {}", quote(root)));
        } else {
            out.push(&format!("{} AS {}", quote(&entity.table), quote(root)));
        }

        self.write_joins(&mut out, &plan.joins, entity, root, &[])?;

        if !derived {
            self.write_where(&mut out, &plan.predicate, entity, root)?;
        }
        let mut terms = self.order_terms(plan, &plan.order, &[])?;
        self.nested_order_terms(plan, &plan.joins, &[], &mut terms)?;
        write_order(&mut out, &terms);
        if !derived {
            write_limit(&mut out, plan.limit);
        }

        Ok(out.finish())
    }

    /// Render a count of the rows matching a predicate.
    pub fn render_count(&self, entity: &str, predicate: &Predicate) -> Result<SqlQuery, Error> {
        let entity = self.registry.entity(entity)?;
        let mut out = self.writer();
        out.push(&format!(
            "SELECT count(*) AS \"count\" FROM {} AS {}",
            quote(&entity.table),
            quote(&entity.name)
        ));
        self.write_where(&mut out, predicate, entity, &entity.name)?;
        Ok(out.finish())
    }

    fn writer(&self) -> Writer {
        Writer {
            dialect: self.dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn joined_columns(
        &self,
        columns: &mut Vec<String>,
        joins: &[JoinSpec],
        prefix: &str,
    ) -> Result<(), Error> {
        for join in joins {
            let target = self.registry.entity(&join.target)?;
            let path = if prefix.is_empty() {
                join.alias.clone()
            } else {
                format!("{}.{}", prefix, join.alias)
            };
            select_columns(columns, target, &path.replace('.', "->"), &path);
            self.joined_columns(columns, &join.joins, &path)?;
        }
        Ok(())
    }

    fn write_joins(
        &self,
        out: &mut Writer,
        joins: &[JoinSpec],
        parent: &EntityDef,
        parent_alias: &str,
        path: &[&str],
    ) -> Result<(), Error> {
        for join in joins {
            let target = self.registry.entity(&join.target)?;
            let mut child_path = path.to_vec();
            child_path.push(&join.alias);
            let alias = child_path.join("->");

            let kind = if join.required {
                "INNER JOIN"
            } else {
                "LEFT OUTER JOIN"
            };
            let owner_column = qualified(parent_alias, column(parent, &join.from_field)?);
            let target_column = qualified(&alias, column(target, &join.to_field)?);

            match &join.through {
                None => out.push(&format!(
                    " {} {} AS {} ON {} = {}",
                    kind,
                    quote(&target.table),
                    quote(&alias),
                    target_column,
                    owner_column
                )),
                Some(through) => {
                    let link = self.registry.entity(&through.entity)?;
                    let link_alias = format!("{}->{}", alias, link.name);
                    out.push(&format!(
                        " {} ({} AS {} INNER JOIN {} AS {} ON {} = {}) ON {} = {}",
                        kind,
                        quote(&link.table),
                        quote(&link_alias),
                        quote(&target.table),
                        quote(&alias),
                        target_column,
                        qualified(&link_alias, column(link, &through.target_key)?),
                        qualified(&link_alias, column(link, &through.source_key)?),
                        owner_column
                    ));
                }
            }

            if !join.predicate.is_always() {
                out.push(" AND ");
                self.write_predicate(out, &join.predicate, target, &alias)?;
            }
            self.write_joins(out, &join.joins, target, &alias, &child_path)?;
        }
        Ok(())
    }

    fn write_where(
        &self,
        out: &mut Writer,
        predicate: &Predicate,
        entity: &EntityDef,
        alias: &str,
    ) -> Result<(), Error> {
        if predicate.is_always() {
            return Ok(());
        }
        out.push(" WHERE ");
        self.write_predicate(out, predicate, entity, alias)
    }

    fn write_predicate(
        &self,
        out: &mut Writer,
        predicate: &Predicate,
        entity: &EntityDef,
        alias: &str,
    ) -> Result<(), Error> {
        match predicate {
            Predicate::And(children) => self.write_group(out, children, " AND ", "1=1", entity, alias),
            Predicate::Or(children) => self.write_group(out, children, " OR ", "1=0", entity, alias),
            Predicate::Not(inner) => {
                out.push("NOT (");
                self.write_predicate(out, inner, entity, alias)?;
                out.push(")");
                Ok(())
            }
            Predicate::Compare { field, op, operand } => {
                let lhs = qualified(alias, column(entity, field)?);
                self.write_compare(out, &lhs, *op, operand)
            }
        }
    }

    fn write_group(
        &self,
        out: &mut Writer,
        children: &[Predicate],
        separator: &str,
        empty: &str,
        entity: &EntityDef,
        alias: &str,
    ) -> Result<(), Error> {
        match children {
            [] => out.push(empty),
            [only] => self.write_predicate(out, only, entity, alias)?,
            _ => {
                out.push("(");
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push(separator);
                    }
                    self.write_predicate(out, child, entity, alias)?;
                }
                out.push(")");
            }
        }
        Ok(())
    }

    fn write_compare(
        &self,
        out: &mut Writer,
        lhs: &str,
        op: CompareOp,
        operand: &Operand,
    ) -> Result<(), Error> {
        match operand {
            Operand::List(values) if values.is_empty() => out.push("1=0"),
            Operand::List(values) => {
                out.push(lhs);
                out.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(", ");
                    }
                    out.bind(value.clone());
                }
                out.push(")");
            }
            Operand::Value(Value::Null) if op == CompareOp::Eq => {
                out.push(lhs);
                out.push(" IS NULL");
            }
            Operand::Value(value) => {
                let operator = self.dialect.operator(op)?;
                out.push(&format!("{} {} ", lhs, operator));
                out.bind(value.clone());
                if self.dialect == Dialect::Sqlite && matches!(op, CompareOp::Like | CompareOp::ILike) {
                    out.push(" ESCAPE '\\'");
                }
            }
            Operand::Lookup(lookup) => {
                let operator = self.dialect.operator(op)?;
                let entity = self.registry.entity(&lookup.entity)?;
                out.push(&format!(
                    "{} {} (SELECT {} FROM {} WHERE {} = ",
                    lhs,
                    operator,
                    quote(column(entity, &lookup.field)?),
                    quote(&entity.table),
                    quote(column(entity, &lookup.key_field)?)
                ));
                out.bind(lookup.key.clone());
                out.push(" LIMIT 1)");
            }
        }
        Ok(())
    }

    /// Render order keys relative to the join at `base`.
    fn order_terms(
        &self,
        plan: &FindPlan,
        keys: &[OrderKey],
        base: &[&str],
    ) -> Result<Vec<String>, Error> {
        keys.iter()
            .map(|key| {
                let mut path: Vec<&str> = base.to_vec();
                path.extend(key.path.iter().map(String::as_str));

                let (entity, alias) = if path.is_empty() {
                    (self.registry.entity(&plan.entity)?, plan.entity.clone())
                } else {
                    let join = plan.join_at(&path).ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "order key {} refers to unjoined path {}",
                            key.field,
                            path.join(".")
                        ))
                    })?;
                    (self.registry.entity(&join.target)?, path.join("->"))
                };
                let term = qualified(&alias, column(entity, &key.field)?);
                Ok(self.order_term(term, key.direction))
            })
            .collect()
    }

    fn nested_order_terms(
        &self,
        plan: &FindPlan,
        joins: &[JoinSpec],
        path: &[&str],
        terms: &mut Vec<String>,
    ) -> Result<(), Error> {
        for join in joins {
            let mut child_path = path.to_vec();
            child_path.push(&join.alias);
            terms.extend(self.order_terms(plan, &join.order, &child_path)?);
            self.nested_order_terms(plan, &join.joins, &child_path, terms)?;
        }
        Ok(())
    }

    /// Nulls sort first in ascending order on every dialect.
    fn order_term(&self, term: String, direction: OrderDirection) -> String {
        match (self.dialect, direction) {
            (Dialect::Postgres, OrderDirection::Asc) => format!("{} ASC NULLS FIRST", term),
            (Dialect::Postgres, OrderDirection::Desc) => format!("{} DESC NULLS LAST", term),
            (Dialect::Sqlite, OrderDirection::Asc) => format!("{} ASC", term),
            (Dialect::Sqlite, OrderDirection::Desc) => format!("{} DESC", term),
        }
    }
}

fn select_columns(columns: &mut Vec<String>, entity: &EntityDef, alias: &str, path: &str) {
    for field in entity.persisted_fields() {
        let name = if path.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", path, field.name)
        };
        columns.push(format!("{} AS {}", qualified(alias, &field.column), quote(&name)));
    }
}

fn write_order(out: &mut Writer, terms: &[String]) {
    if !terms.is_empty() {
        out.push(" ORDER BY ");
        out.push(&terms.join(", "));
    }
}

fn write_limit(out: &mut Writer, limit: Option<usize>) {
    if let Some(limit) = limit {
        out.push(&format!(" LIMIT {}", limit));
    }
}

fn fans_out(joins: &[JoinSpec]) -> bool {
    joins.iter().any(|j| j.multi || fans_out(&j.joins))
}

fn column<'e>(entity: &'e EntityDef, field: &str) -> Result<&'e str, Error> {
    entity
        .get_field(field)
        .filter(|f| f.is_persisted())
        .map(|f| f.column.as_str())
        .ok_or_else(|| {
            Error::InvalidArgument(format!("{}.{} is not a column", entity.name, field))
        })
}

fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", quote(alias), quote(column))
}

/// Quote an identifier, doubling embedded quotes.
fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType, RelationDef, ScalarType};
    use minerva_proto::CursorLookup;
    use pretty_assertions::assert_eq;

    fn registry() -> EntityRegistry {
        let int = |name: &str| FieldDef::new(name, FieldType::scalar(ScalarType::Int64));
        let text = |name: &str| FieldDef::new(name, FieldType::scalar(ScalarType::String));
        EntityRegistry::new()
            .with_entity(
                EntityDef::new("User", "id")
                    .with_field(int("id"))
                    .with_field(text("name"))
                    .with_field(FieldDef::new(
                        "createdAt",
                        FieldType::scalar(ScalarType::Timestamp),
                    )),
            )
            .with_entity(
                EntityDef::new("Post", "id")
                    .with_field(int("id"))
                    .with_field(text("title"))
                    .with_field(int("authorId"))
                    .with_field(
                        FieldDef::new("tags", FieldType::array_scalar(ScalarType::String)),
                    ),
            )
            .with_entity(
                EntityDef::new("Label", "id")
                    .with_field(int("id"))
                    .with_field(text("name")),
            )
            .with_entity(
                EntityDef::keyless("PostLabel")
                    .with_field(int("postId"))
                    .with_field(int("labelId")),
            )
            .with_relation(RelationDef::multi("posts", "User", "id", "Post", "authorId"))
            .with_relation(RelationDef::single("author", "Post", "authorId", "User", "id"))
            .with_relation(
                RelationDef::multi("labels", "Post", "id", "Label", "id")
                    .through("PostLabel", "postId", "labelId"),
            )
    }

    const USER_COLUMNS: &str = r#""User"."id" AS "id", "User"."name" AS "name", "User"."created_at" AS "createdAt""#;

    #[test]
    fn test_render_filtered_root() {
        let registry = registry();
        let renderer = SqlRenderer::new(&registry, Dialect::Postgres);
        let plan = FindPlan::new("User")
            .with_predicate(Predicate::And(vec![
                Predicate::eq("name", "ada"),
                Predicate::compare("id", CompareOp::Gt, 3i64),
            ]))
            .with_order(OrderKey::desc("createdAt"))
            .with_limit(10);

        let query = renderer.render_find(&plan).unwrap();
        assert_eq!(
            query.sql,
            format!(
                r#"SELECT {} FROM "user" AS "User" WHERE ("User"."name" = $1 AND "User"."id" > $2) ORDER BY "User"."created_at" DESC NULLS LAST LIMIT 10"#,
                USER_COLUMNS
            )
        );
        assert_eq!(query.params, vec![Value::from("ada"), Value::Int64(3)]);
    }

    #[test]
    fn test_limited_to_many_join_uses_derived_root() {
        let registry = registry();
        let renderer = SqlRenderer::new(&registry, Dialect::Sqlite);
        let posts = registry.relation("User", "posts").unwrap();
        let plan = FindPlan::new("User")
            .with_predicate(Predicate::compare("name", CompareOp::Like, "a%"))
            .with_order(OrderKey::asc("id"))
            .with_order(OrderKey::asc("title").with_path(vec!["posts".into()]))
            .with_join(JoinSpec::from_relation(posts).with_predicate(Predicate::eq("title", "hi")))
            .with_limit(2);

        let query = renderer.render_find(&plan).unwrap();
        let expected = format!(
            concat!(
                r#"SELECT {}, "posts"."id" AS "posts.id", "posts"."title" AS "posts.title", "#,
                r#""posts"."author_id" AS "posts.authorId", "posts"."tags" AS "posts.tags" "#,
                r#"FROM (SELECT * FROM "user" AS "User" WHERE "User"."name" LIKE ? ESCAPE '\' "#,
                r#"ORDER BY "User"."id" ASC LIMIT 2) AS "User" "#,
                r#"LEFT OUTER JOIN "post" AS "posts" ON "posts"."author_id" = "User"."id" "#,
                r#"AND "posts"."title" = ? "#,
                r#"ORDER BY "User"."id" ASC, "posts"."title" ASC"#
            ),
            USER_COLUMNS
        );
        assert_eq!(query.sql, expected);
        assert_eq!(query.params, vec![Value::from("a%"), Value::from("hi")]);
    }

    #[test]
    fn test_through_and_nested_joins() {
        let registry = registry();
        let renderer = SqlRenderer::new(&registry, Dialect::Postgres);
        let labels = registry.relation("Post", "labels").unwrap();
        let author = registry.relation("Post", "author").unwrap();
        let posts = registry.relation("User", "posts").unwrap();
        let plan = FindPlan::new("Post")
            .with_join(JoinSpec::from_relation(labels))
            .with_join(JoinSpec::from_relation(author).with_join(JoinSpec::from_relation(posts)));

        let sql = renderer.render_find(&plan).unwrap().sql;
        assert!(sql.contains(concat!(
            r#" LEFT OUTER JOIN ("post_label" AS "labels->PostLabel" INNER JOIN "label" AS "labels" "#,
            r#"ON "labels"."id" = "labels->PostLabel"."label_id") "#,
            r#"ON "labels->PostLabel"."post_id" = "Post"."id""#
        )));
        assert!(sql.contains(
            r#" LEFT OUTER JOIN "post" AS "author->posts" ON "author->posts"."author_id" = "author"."id""#
        ));
        assert!(sql.contains(r#""author->posts"."title" AS "author.posts.title""#));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_cursor_lookup_parameters_follow_text_order() {
        let registry = registry();
        let renderer = SqlRenderer::new(&registry, Dialect::Postgres);
        let lookup = Operand::Lookup(CursorLookup {
            entity: "User".into(),
            field: "createdAt".into(),
            key_field: "id".into(),
            key: Value::Int64(7),
        });
        let predicate = Predicate::Or(vec![
            Predicate::Compare {
                field: "createdAt".into(),
                op: CompareOp::Gt,
                operand: lookup.clone(),
            },
            Predicate::And(vec![
                Predicate::Compare {
                    field: "createdAt".into(),
                    op: CompareOp::Eq,
                    operand: lookup,
                },
                Predicate::compare("id", CompareOp::Gt, 7i64),
            ]),
        ]);

        let query = renderer.render_count("User", &predicate).unwrap();
        assert_eq!(
            query.sql,
            concat!(
                r#"SELECT count(*) AS "count" FROM "user" AS "User" WHERE ("User"."created_at" > "#,
                r#"(SELECT "created_at" FROM "user" WHERE "id" = $1 LIMIT 1) OR ("User"."created_at" = "#,
                r#"(SELECT "created_at" FROM "user" WHERE "id" = $2 LIMIT 1) AND "User"."id" > $3))"#
            )
        );
        assert_eq!(query.params, vec![Value::Int64(7); 3]);
    }

    #[test]
    fn test_predicate_edge_cases() {
        let registry = registry();
        let renderer = SqlRenderer::new(&registry, Dialect::Postgres);

        let predicate = Predicate::And(vec![
            Predicate::in_values("id", vec![]),
            Predicate::eq("name", Value::Null),
            Predicate::negate(Predicate::Or(vec![])),
        ]);
        let query = renderer.render_count("User", &predicate).unwrap();
        assert!(query
            .sql
            .ends_with(r#"WHERE (1=0 AND "User"."name" IS NULL AND NOT (1=0))"#));
        assert!(query.params.is_empty());

        let query = renderer.render_count("User", &Predicate::always()).unwrap();
        assert_eq!(query.sql, r#"SELECT count(*) AS "count" FROM "user" AS "User""#);
    }

    #[test]
    fn test_render_errors() {
        let registry = registry();
        let contains = Predicate::compare(
            "tags",
            CompareOp::Contains,
            Value::StringArray(vec!["rust".into()]),
        );

        let pg = SqlRenderer::new(&registry, Dialect::Postgres);
        assert!(pg.render_count("Post", &contains).unwrap().sql.contains(r#""Post"."tags" @> $1"#));

        let sqlite = SqlRenderer::new(&registry, Dialect::Sqlite);
        assert!(matches!(
            sqlite.render_count("Post", &contains),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            pg.render_count("Post", &Predicate::eq("missing", 1i64)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            pg.render_find(&FindPlan::new("Nope")),
            Err(Error::UnknownEntity(_))
        ));
        assert!(matches!(
            pg.render_find(&FindPlan::new("Post").with_order(
                OrderKey::asc("name").with_path(vec!["author".into()])
            )),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_quote_doubles_embedded_quotes() {
        assert_eq!(quote(r#"we"ird"#), r#""we""ird""#);
    }
}
