//! Query IR shared between the plan assembler and executors.
//!
//! Predicates are a plain recursive tree. Leaves compare a named field of the
//! entity (or joined entity) under evaluation with an operand.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Comparison operators understood by executors.
///
/// Negated forms (`not_eq`, `not_like`, `not_in`, ...) are expressed by wrapping
/// a leaf in [`Predicate::Not`], so this catalog only holds positive operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareOp {
    /// Field equals operand.
    Eq,
    /// Field greater than operand.
    Gt,
    /// Field greater than or equal to operand.
    Gte,
    /// Field less than operand.
    Lt,
    /// Field less than or equal to operand.
    Lte,
    /// Field matches a LIKE pattern.
    Like,
    /// Field matches a LIKE pattern, ignoring case.
    #[serde(rename = "iLike")]
    ILike,
    /// Array field contains every element of the operand.
    Contains,
    /// Array field is contained in the operand.
    Contained,
    /// Field is one of the operand values.
    In,
}

impl CompareOp {
    /// Parse the operator suffix used in filter argument names.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let op = match suffix {
            "eq" => CompareOp::Eq,
            "gt" => CompareOp::Gt,
            "gte" => CompareOp::Gte,
            "lt" => CompareOp::Lt,
            "lte" => CompareOp::Lte,
            "like" => CompareOp::Like,
            "iLike" => CompareOp::ILike,
            "contains" => CompareOp::Contains,
            "contained" => CompareOp::Contained,
            "in" => CompareOp::In,
            _ => return None,
        };
        Some(op)
    }

    /// The operator suffix used in filter argument names.
    pub fn suffix(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::Like => "like",
            CompareOp::ILike => "iLike",
            CompareOp::Contains => "contains",
            CompareOp::Contained => "contained",
            CompareOp::In => "in",
        }
    }

    /// The operator with its operands swapped, for strict orderings.
    pub fn reversed(&self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
            other => *other,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operand {
    /// A literal value.
    Value(Value),
    /// A list of literal values (for `In`).
    List(Vec<Value>),
    /// A correlated single-row lookup, used for cursor bounds.
    Lookup(CursorLookup),
}

/// `(SELECT field FROM entity WHERE key_field = key LIMIT 1)`.
///
/// Resolves the sort value of the row a cursor points at, so clients only ever
/// hand over the primary key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorLookup {
    /// Entity holding the cursor row.
    pub entity: String,
    /// Field whose value is read.
    pub field: String,
    /// Primary-key field used to locate the row.
    pub key_field: String,
    /// Primary-key value from the cursor.
    pub key: Value,
}

/// Boolean predicate tree over named fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// All children must hold. An empty list is always true.
    And(Vec<Predicate>),
    /// At least one child must hold. An empty list is always false.
    Or(Vec<Predicate>),
    /// The child must not hold.
    Not(Box<Predicate>),
    /// Compare a field with an operand.
    Compare {
        field: String,
        op: CompareOp,
        operand: Operand,
    },
}

impl Predicate {
    /// The always-true predicate.
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    /// Compare a field with a literal.
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            operand: Operand::Value(value.into()),
        }
    }

    /// Field equals literal.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Field is one of the given literals.
    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op: CompareOp::In,
            operand: Operand::List(values),
        }
    }

    /// Negate a predicate.
    pub fn negate(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Check if this is the empty AND list.
    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::And(children) if children.is_empty())
    }

    /// Conjoin another predicate, flattening into an existing AND list.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut children) => {
                children.push(other);
                Predicate::And(children)
            }
            this => Predicate::And(vec![this, other]),
        }
    }

    /// Collapse single-child groups and drop always-true members of AND lists.
    ///
    /// The empty AND list is preserved so a simplified predicate is never absent.
    pub fn simplify(self) -> Self {
        match self {
            Predicate::And(children) => {
                let mut kept: Vec<Predicate> = children
                    .into_iter()
                    .map(Predicate::simplify)
                    .filter(|p| !p.is_always())
                    .collect();
                if kept.len() == 1 {
                    kept.remove(0)
                } else {
                    Predicate::And(kept)
                }
            }
            Predicate::Or(children) => {
                let mut kept: Vec<Predicate> =
                    children.into_iter().map(Predicate::simplify).collect();
                if kept.len() == 1 {
                    kept.remove(0)
                } else {
                    Predicate::Or(kept)
                }
            }
            Predicate::Not(inner) => Predicate::Not(Box::new(inner.simplify())),
            leaf => leaf,
        }
    }

    /// Visit every field name referenced by a comparison leaf.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            }
            Predicate::Not(inner) => inner.collect_fields(out),
            Predicate::Compare { field, .. } => out.push(field),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl OrderDirection {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            OrderDirection::Asc => OrderDirection::Desc,
            OrderDirection::Desc => OrderDirection::Asc,
        }
    }

    /// `Desc` when `desc` is true.
    pub fn from_desc(desc: bool) -> Self {
        if desc {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}

/// Sort argument of a selection node: `{ field, dir }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortArg {
    /// Field to sort by.
    pub field: String,
    /// Sort direction.
    #[serde(default)]
    pub dir: OrderDirection,
}

impl SortArg {
    /// Create a sort argument.
    pub fn new(field: impl Into<String>, dir: OrderDirection) -> Self {
        Self {
            field: field.into(),
            dir,
        }
    }
}

/// A sort key qualified by the join path needed to reach its field.
///
/// An empty path refers to the entity the plan is rooted at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderKey {
    /// Relationship aliases from the plan root to the entity holding `field`.
    pub path: Vec<String>,
    /// Field to order by.
    pub field: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderKey {
    /// Create a key on the root entity.
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            path: Vec::new(),
            field: field.into(),
            direction,
        }
    }

    /// Create an ascending key on the root entity.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, OrderDirection::Asc)
    }

    /// Create a descending key on the root entity.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, OrderDirection::Desc)
    }

    /// Set the join path.
    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = path;
        self
    }

    /// Check if the key applies to the root entity.
    pub fn is_local(&self) -> bool {
        self.path.is_empty()
    }

    /// Strip a leading alias, if the path starts with it.
    pub fn strip_prefix(&self, alias: &str) -> Option<OrderKey> {
        match self.path.split_first() {
            Some((head, rest)) if head == alias => Some(OrderKey {
                path: rest.to_vec(),
                field: self.field.clone(),
                direction: self.direction,
            }),
            _ => None,
        }
    }
}

/// Cursor pagination arguments attached to a paginated plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArgs {
    /// Page size counted from the start of the window.
    pub first: Option<usize>,
    /// Page size counted from the end of the window.
    pub last: Option<usize>,
    /// Primary key the window ends before.
    pub before: Option<Value>,
    /// Primary key the window starts after.
    pub after: Option<Value>,
    /// Field to order and paginate by. Defaults to the primary key.
    pub paginate_by: Option<String>,
    /// Reverse the logical order.
    pub desc: bool,
    /// Compute `totalCount` with a second, unbounded count.
    pub include_total: bool,
}

impl PageArgs {
    /// Arguments for the first `n` rows.
    pub fn first(n: usize) -> Self {
        Self {
            first: Some(n),
            ..Default::default()
        }
    }

    /// Arguments for the last `n` rows.
    pub fn last(n: usize) -> Self {
        Self {
            last: Some(n),
            ..Default::default()
        }
    }

    /// Start after the row with this primary key.
    pub fn after(mut self, cursor: impl Into<Value>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    /// End before the row with this primary key.
    pub fn before(mut self, cursor: impl Into<Value>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    /// Paginate by a field other than the primary key.
    pub fn paginate_by(mut self, field: impl Into<String>) -> Self {
        self.paginate_by = Some(field.into());
        self
    }

    /// Reverse the logical order.
    pub fn descending(mut self) -> Self {
        self.desc = true;
        self
    }

    /// Request `totalCount`.
    pub fn with_total(mut self) -> Self {
        self.include_total = true;
        self
    }

    /// `first`, unless absent or zero. A zero bound means no bound.
    pub fn first_bound(&self) -> Option<usize> {
        self.first.filter(|&n| n > 0)
    }

    /// `last`, unless absent or zero.
    pub fn last_bound(&self) -> Option<usize> {
        self.last.filter(|&n| n > 0)
    }

    /// The requested page size, if any.
    pub fn page_size(&self) -> Option<usize> {
        self.first_bound().or(self.last_bound())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operator_suffixes() {
        for op in [
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
        ] {
            assert_eq!(CompareOp::from_suffix(op.suffix()), Some(op));
        }
        assert_eq!(CompareOp::from_suffix("ilike"), None);
        assert_eq!(CompareOp::Gt.reversed(), CompareOp::Lt);
        assert_eq!(CompareOp::Eq.reversed(), CompareOp::Eq);
    }

    #[test]
    fn test_simplify_collapses_groups() {
        let predicate = Predicate::And(vec![Predicate::Or(vec![
            Predicate::And(vec![Predicate::eq("id", 11i64)]),
            Predicate::And(vec![Predicate::negate(Predicate::eq("id", 13i64))]),
        ])]);

        assert_eq!(
            predicate.simplify(),
            Predicate::Or(vec![
                Predicate::eq("id", 11i64),
                Predicate::negate(Predicate::eq("id", 13i64)),
            ])
        );
    }

    #[test]
    fn test_simplify_keeps_empty_and() {
        let predicate = Predicate::And(vec![Predicate::always(), Predicate::And(vec![])]);
        assert!(predicate.simplify().is_always());
    }

    #[test]
    fn test_and_flattens() {
        let predicate = Predicate::always()
            .and(Predicate::eq("a", 1i64))
            .and(Predicate::eq("b", 2i64));
        assert_eq!(predicate.fields(), vec!["a", "b"]);
    }

    #[test]
    fn test_order_key_strip_prefix() {
        let key = OrderKey::desc("title").with_path(vec!["posts".into(), "comments".into()]);
        let stripped = key.strip_prefix("posts").unwrap();
        assert_eq!(stripped.path, vec!["comments".to_string()]);
        assert!(key.strip_prefix("comments").is_none());
        assert!(!key.is_local());
    }

    #[test]
    fn test_sort_arg_from_json() {
        let sort: SortArg = serde_json::from_value(serde_json::json!({
            "field": "counter",
            "dir": "DESC"
        }))
        .unwrap();
        assert_eq!(sort, SortArg::new("counter", OrderDirection::Desc));

        let sort: SortArg = serde_json::from_value(serde_json::json!({"field": "id"})).unwrap();
        assert_eq!(sort.dir, OrderDirection::Asc);
    }
}
