//! In-memory executor.
//!
//! Evaluates find-plans over rows held in memory with the semantics a
//! relational engine gives them: three-valued predicate logic, outer joins
//! (optionally through a link entity), path-qualified ordering and correlated
//! cursor lookups. Nulls sort first in ascending order.

use super::executor::Executor;
use super::plan::{FindPlan, JoinSpec};
use crate::error::Error;
use async_trait::async_trait;
use minerva_proto::{
    CompareOp, CursorLookup, Operand, OrderDirection, OrderKey, Predicate, Related, Row, Value,
};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::trace;

type Tables = HashMap<String, Vec<Row>>;

/// Executor over in-memory tables keyed by entity name.
///
/// Rows hold values under field names.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    tables: RwLock<Tables>,
}

impl MemoryExecutor {
    /// Create an executor with no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row.
    pub fn insert(&self, entity: &str, row: Row) {
        self.tables
            .write()
            .entry(entity.to_string())
            .or_default()
            .push(row);
    }

    /// Insert rows.
    pub fn insert_many(&self, entity: &str, rows: impl IntoIterator<Item = Row>) {
        self.tables
            .write()
            .entry(entity.to_string())
            .or_default()
            .extend(rows);
    }

    /// Builder form of [`insert_many`](Self::insert_many).
    pub fn with_rows(self, entity: &str, rows: impl IntoIterator<Item = Row>) -> Self {
        self.insert_many(entity, rows);
        self
    }

    /// Number of rows stored for an entity.
    pub fn len(&self, entity: &str) -> usize {
        self.tables.read().get(entity).map_or(0, Vec::len)
    }

    /// Check if no rows are stored for an entity.
    pub fn is_empty(&self, entity: &str) -> bool {
        self.len(entity) == 0
    }

    /// Remove every row.
    pub fn clear(&self) {
        self.tables.write().clear();
    }

    /// Run a plan against a snapshot of the tables.
    pub fn execute_sync(&self, plan: &FindPlan) -> Vec<Row> {
        let tables = self.tables.read();
        let eval = Evaluator { tables: &tables };

        let mut rows: Vec<Row> = eval
            .table(&plan.entity)
            .iter()
            .filter(|row| eval.holds(&plan.predicate, row))
            .filter_map(|row| eval.attach_joins(row.clone(), &plan.joins, &plan.order))
            .collect();

        let local: Vec<&OrderKey> = plan.order.iter().filter(|k| k.is_local()).collect();
        sort_rows(&mut rows, &local);

        if let Some(limit) = plan.limit {
            rows.truncate(limit);
        }
        trace!(entity = %plan.entity, rows = rows.len(), "executed plan in memory");
        rows
    }

    /// Count rows of an entity matching a predicate.
    pub fn count_sync(&self, entity: &str, predicate: &Predicate) -> u64 {
        let tables = self.tables.read();
        let eval = Evaluator { tables: &tables };
        eval.table(entity)
            .iter()
            .filter(|row| eval.holds(predicate, row))
            .count() as u64
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn execute(&self, plan: &FindPlan) -> Result<Vec<Row>, Error> {
        Ok(self.execute_sync(plan))
    }

    async fn count(&self, entity: &str, predicate: &Predicate) -> Result<u64, Error> {
        Ok(self.count_sync(entity, predicate))
    }
}

struct Evaluator<'t> {
    tables: &'t Tables,
}

impl<'t> Evaluator<'t> {
    fn table(&self, entity: &str) -> &'t [Row] {
        self.tables.get(entity).map(Vec::as_slice).unwrap_or_default()
    }

    /// A row passes a where-clause only when the predicate is true, not
    /// unknown.
    fn holds(&self, predicate: &Predicate, row: &Row) -> bool {
        self.eval(predicate, row) == Some(true)
    }

    /// Three-valued evaluation; `None` is unknown.
    fn eval(&self, predicate: &Predicate, row: &Row) -> Option<bool> {
        match predicate {
            Predicate::And(children) => {
                let mut result = Some(true);
                for child in children {
                    match self.eval(child, row) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Predicate::Or(children) => {
                let mut result = Some(false);
                for child in children {
                    match self.eval(child, row) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Predicate::Not(inner) => self.eval(inner, row).map(|b| !b),
            Predicate::Compare { field, op, operand } => {
                let lhs = row.get(field).unwrap_or(&Value::Null);
                self.compare(lhs, *op, operand)
            }
        }
    }

    fn compare(&self, lhs: &Value, op: CompareOp, operand: &Operand) -> Option<bool> {
        let rhs = match operand {
            // `= NULL` in a filter means IS NULL.
            Operand::Value(Value::Null) if op == CompareOp::Eq => return Some(lhs.is_null()),
            Operand::Value(value) => value.clone(),
            Operand::List(values) => return in_list(lhs, values),
            Operand::Lookup(lookup) => self.lookup(lookup),
        };
        if lhs.is_null() || rhs.is_null() {
            return None;
        }

        match op {
            CompareOp::Eq | CompareOp::In => Some(values_equal(lhs, &rhs)),
            CompareOp::Gt => compare_values(lhs, &rhs).map(Ordering::is_gt),
            CompareOp::Gte => compare_values(lhs, &rhs).map(Ordering::is_ge),
            CompareOp::Lt => compare_values(lhs, &rhs).map(Ordering::is_lt),
            CompareOp::Lte => compare_values(lhs, &rhs).map(Ordering::is_le),
            CompareOp::Like => match (lhs, &rhs) {
                (Value::String(s), Value::String(p)) => Some(like_match(s, p)),
                _ => None,
            },
            CompareOp::ILike => match (lhs, &rhs) {
                (Value::String(s), Value::String(p)) => {
                    Some(like_match(&s.to_lowercase(), &p.to_lowercase()))
                }
                _ => None,
            },
            CompareOp::Contains => array_subset(&rhs, lhs),
            CompareOp::Contained => array_subset(lhs, &rhs),
        }
    }

    /// `(SELECT field FROM entity WHERE key_field = key LIMIT 1)`, or null when
    /// no row matches.
    fn lookup(&self, lookup: &CursorLookup) -> Value {
        self.table(&lookup.entity)
            .iter()
            .find(|row| {
                row.get(&lookup.key_field)
                    .is_some_and(|key| values_equal(key, &lookup.key))
            })
            .and_then(|row| row.get(&lookup.field))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Attach joined rows, ordering each joined collection by its own keys
    /// and by the parent's keys that lead into it.
    ///
    /// Returns `None` when a required join finds no related row.
    fn attach_joins(&self, mut row: Row, joins: &[JoinSpec], order: &[OrderKey]) -> Option<Row> {
        for join in joins {
            let inherited = order.iter().filter_map(|key| key.strip_prefix(&join.alias));
            let scoped: Vec<OrderKey> = join.order.iter().cloned().chain(inherited).collect();

            let mut related: Vec<Row> = self
                .related_rows(&row, join)
                .into_iter()
                .filter(|child| self.holds(&join.predicate, child))
                .filter_map(|child| self.attach_joins(child.clone(), &join.joins, &scoped))
                .collect();
            if join.required && related.is_empty() {
                return None;
            }

            let local: Vec<&OrderKey> = scoped.iter().filter(|k| k.is_local()).collect();
            sort_rows(&mut related, &local);

            let related = if join.multi {
                Related::Many(related)
            } else {
                Related::One(related.into_iter().next().map(Box::new))
            };
            row.related.push((join.alias.clone(), related));
        }
        Some(row)
    }

    fn related_rows(&self, parent: &Row, join: &JoinSpec) -> Vec<&'t Row> {
        let Some(owner_key) = parent.get(&join.from_field).filter(|v| !v.is_null()) else {
            return Vec::new();
        };
        let targets = self.table(&join.target);

        match &join.through {
            None => targets
                .iter()
                .filter(|t| t.get(&join.to_field).is_some_and(|v| values_equal(v, owner_key)))
                .collect(),
            Some(through) => {
                let linked: Vec<&Value> = self
                    .table(&through.entity)
                    .iter()
                    .filter(|link| {
                        link.get(&through.source_key)
                            .is_some_and(|v| values_equal(v, owner_key))
                    })
                    .filter_map(|link| link.get(&through.target_key))
                    .collect();
                targets
                    .iter()
                    .filter(|t| {
                        t.get(&join.to_field)
                            .is_some_and(|v| linked.iter().any(|l| values_equal(v, l)))
                    })
                    .collect()
            }
        }
    }
}

fn in_list(lhs: &Value, values: &[Value]) -> Option<bool> {
    if values.is_empty() {
        return Some(false);
    }
    if lhs.is_null() {
        return None;
    }
    if values.iter().any(|v| values_equal(lhs, v)) {
        Some(true)
    } else if values.iter().any(Value::is_null) {
        None
    } else {
        Some(false)
    }
}

/// Whether every element of `inner` is an element of `outer`.
fn array_subset(inner: &Value, outer: &Value) -> Option<bool> {
    match (inner, outer) {
        (Value::BoolArray(a), Value::BoolArray(b)) => Some(a.iter().all(|x| b.contains(x))),
        (Value::Int64Array(a), Value::Int64Array(b)) => Some(a.iter().all(|x| b.contains(x))),
        (Value::Float64Array(a), Value::Float64Array(b)) => Some(a.iter().all(|x| b.contains(x))),
        (Value::StringArray(a), Value::StringArray(b)) => Some(a.iter().all(|x| b.contains(x))),
        _ => None,
    }
}

fn sort_rows(rows: &mut [Row], order: &[&OrderKey]) {
    if order.is_empty() {
        return;
    }

    rows.sort_by(|a, b| {
        for key in order {
            let cmp = compare_for_sort(a.get(&key.field), b.get(&key.field));
            let cmp = match key.direction {
                OrderDirection::Asc => cmp,
                OrderDirection::Desc => cmp.reverse(),
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => compare_values(a, b).unwrap_or(Ordering::Equal),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            a.as_i64() == b.as_i64()
        }
        (Value::Float64(_), _) | (_, Value::Float64(_)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Order two non-null values of compatible kinds.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            Some(a.as_i64()?.cmp(&b.as_i64()?))
        }
        (Value::Float64(_), _) | (_, Value::Float64(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LikeToken {
    Any,
    One,
    Char(char),
}

/// Match a string against a SQL LIKE pattern.
///
/// `%` matches any run of characters, `_` exactly one, and a backslash makes
/// the next pattern character literal. Runs in `O(value * pattern)` by
/// resuming from the most recent `%` on a mismatch.
fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let mut tokens: Vec<LikeToken> = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '%' if tokens.last() == Some(&LikeToken::Any) => continue,
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            // A trailing backslash matches nothing.
            '\\' => match chars.next() {
                Some(escaped) => LikeToken::Char(escaped),
                None => return false,
            },
            other => LikeToken::Char(other),
        };
        tokens.push(token);
    }

    let (mut v, mut t) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;
    while v < value.len() {
        match tokens.get(t) {
            Some(LikeToken::Any) => {
                resume = Some((t + 1, v));
                t += 1;
            }
            Some(LikeToken::One) => {
                v += 1;
                t += 1;
            }
            Some(LikeToken::Char(c)) if *c == value[v] => {
                v += 1;
                t += 1;
            }
            _ => match resume {
                Some((after_any, start)) => {
                    t = after_any;
                    v = start + 1;
                    resume = Some((after_any, start + 1));
                }
                None => return false,
            },
        }
    }
    tokens[t..].iter().all(|token| *token == LikeToken::Any)
}
