//! Rows and page results handed back to response shaping.

use crate::value::Value;
use serde::Serialize;

/// A row of an entity, with any eagerly joined related rows attached.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Row {
    /// Field values keyed by field name (not column name).
    pub fields: Vec<(String, Value)>,
    /// Joined relations keyed by relationship alias.
    pub related: Vec<(String, Related)>,
}

/// Rows reached through one eagerly joined relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Related {
    /// To-one relationship; `None` when the outer join found nothing.
    One(Option<Box<Row>>),
    /// To-many relationship.
    Many(Vec<Row>),
}

impl Row {
    /// Create a row from field values.
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self {
            fields,
            related: Vec::new(),
        }
    }

    /// Build a row from `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Get a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v)
    }

    /// Get joined rows by relationship alias.
    pub fn related(&self, alias: &str) -> Option<&Related> {
        self.related
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, r)| r)
    }

    /// Attach joined rows.
    pub fn with_related(mut self, alias: impl Into<String>, related: Related) -> Self {
        self.related.push((alias.into(), related));
        self
    }
}

/// Page metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// More rows exist further along the logical order.
    pub has_next_page: bool,
    /// More rows exist earlier in the logical order.
    pub has_previous_page: bool,
    /// Rows matching the filter, ignoring bounds. Zero when not requested.
    pub total_count: u64,
    /// Rows in this page.
    pub page_count: u64,
    /// Pages of this size needed to cover `total_count`, at least one.
    pub number_pages: u64,
}

/// A bounded, ordered page of rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Rows in logical order.
    pub results: Vec<Row>,
    /// Page metadata.
    pub page_info: PageInfo,
}

impl Page {
    /// Wrap an eagerly joined collection as a page.
    ///
    /// Joined collections are unbounded, so nothing lies before or after them
    /// and the whole collection is one page.
    pub fn from_joined(results: Vec<Row>) -> Self {
        let total = results.len() as u64;
        Self {
            page_info: PageInfo {
                has_next_page: false,
                has_previous_page: false,
                total_count: total,
                page_count: total,
                number_pages: 1,
            },
            results,
        }
    }

    /// Primary-key values of the rows, in order.
    pub fn keys(&self, primary_key: &str) -> Vec<Value> {
        self.results
            .iter()
            .filter_map(|row| row.get(primary_key).cloned())
            .collect()
    }

    /// Number of rows in the page.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if the page has no rows.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_accessors() {
        let author = Row::from_pairs([("id", 7i64)]);
        let row = Row::from_pairs([("id", Value::Int64(1)), ("title", Value::from("hi"))])
            .with_related("author", Related::One(Some(Box::new(author))));

        assert_eq!(row.get("title"), Some(&Value::String("hi".into())));
        assert!(row.get("missing").is_none());
        assert!(matches!(row.related("author"), Some(Related::One(Some(_)))));
    }

    #[test]
    fn test_page_from_joined() {
        let page = Page::from_joined(vec![
            Row::from_pairs([("id", 1i64)]),
            Row::from_pairs([("id", 2i64)]),
        ]);
        assert_eq!(page.page_info.total_count, 2);
        assert_eq!(page.page_info.page_count, 2);
        assert_eq!(page.page_info.number_pages, 1);
        assert!(!page.page_info.has_next_page);
        assert_eq!(page.keys("id"), vec![Value::Int64(1), Value::Int64(2)]);
    }

    #[test]
    fn test_page_info_wire_names() {
        let encoded = serde_json::to_value(Page::default()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "results": [],
                "pageInfo": {
                    "hasNextPage": false,
                    "hasPreviousPage": false,
                    "totalCount": 0,
                    "pageCount": 0,
                    "numberPages": 0
                }
            })
        );
    }
}
