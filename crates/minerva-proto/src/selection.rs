//! Normalized field-selection trees.
//!
//! The transport layer (GraphQL resolve info, a JSON request, ...) is flattened
//! into [`SelectionNode`]s before it reaches the core. A node whose children
//! include `results`, `pageInfo` or `aggregate` is a paginated collection; the
//! entity's own fields then live under `results`.

use crate::error::Error;
use crate::query::SortArg;
use serde::{Deserialize, Serialize};

/// Child field holding the rows of a paginated collection.
pub const RESULTS_FIELD: &str = "results";
/// Child field holding page metadata of a paginated collection.
pub const PAGE_INFO_FIELD: &str = "pageInfo";
/// Child field holding aggregates of a paginated collection.
pub const AGGREGATE_FIELD: &str = "aggregate";

/// Arguments passed to a selected field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Arguments {
    /// Raw filter object (`{ and, or, <field>_<op> }`).
    pub filter: Option<serde_json::Value>,
    /// Sort argument.
    pub sort: Option<SortArg>,
    /// Page size from the start.
    pub first: Option<usize>,
    /// Page size from the end.
    pub last: Option<usize>,
    /// Raw primary-key cursor the page ends before.
    pub before: Option<serde_json::Value>,
    /// Raw primary-key cursor the page starts after.
    pub after: Option<serde_json::Value>,
}

impl Arguments {
    /// Parse arguments from a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(json).map_err(|e| Error::InvalidArgument(e.to_string()))
    }

    /// Set the filter object.
    pub fn filter(mut self, filter: serde_json::Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the sort argument.
    pub fn sort(mut self, sort: SortArg) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Request the first `n` rows.
    pub fn first(mut self, n: usize) -> Self {
        self.first = Some(n);
        self
    }

    /// Request the last `n` rows.
    pub fn last(mut self, n: usize) -> Self {
        self.last = Some(n);
        self
    }

    /// Start after a cursor.
    pub fn after(mut self, cursor: serde_json::Value) -> Self {
        self.after = Some(cursor);
        self
    }

    /// End before a cursor.
    pub fn before(mut self, cursor: serde_json::Value) -> Self {
        self.before = Some(cursor);
        self
    }

    /// Whether the field asks for a bounded page of its own.
    pub fn is_bounded(&self) -> bool {
        self.first.is_some() || self.last.is_some()
    }
}

/// One selected field with its arguments and selected children.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionNode {
    /// Schema field name.
    pub field_name: String,
    /// Response alias, if the field was aliased.
    #[serde(default)]
    pub alias: Option<String>,
    /// Field arguments.
    #[serde(default)]
    pub arguments: Arguments,
    /// Selected child fields, in request order.
    #[serde(default)]
    pub child_fields: Vec<SelectionNode>,
}

impl SelectionNode {
    /// Create a node for a field.
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            ..Default::default()
        }
    }

    /// Parse a node from JSON.
    pub fn from_json(json: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(json).map_err(|e| Error::InvalidArgument(e.to_string()))
    }

    /// Set the response alias.
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the arguments.
    pub fn with_args(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Add a selected child.
    pub fn with_child(mut self, child: SelectionNode) -> Self {
        self.child_fields.push(child);
        self
    }

    /// Add scalar children by name.
    pub fn with_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.child_fields
            .extend(names.into_iter().map(SelectionNode::new));
        self
    }

    /// The key this field appears under in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field_name)
    }

    /// Whether the field is selected under a name other than its own.
    pub fn is_aliased(&self) -> bool {
        matches!(&self.alias, Some(alias) if *alias != self.field_name)
    }

    /// Find a child by response key.
    pub fn child(&self, key: &str) -> Option<&SelectionNode> {
        self.child_fields.iter().find(|c| c.response_key() == key)
    }

    /// Follow a dot-separated path of response keys.
    pub fn descend(&self, path: &str) -> Option<&SelectionNode> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Whether this node is a paginated collection.
    pub fn is_page(&self) -> bool {
        self.child_fields.iter().any(|c| {
            matches!(
                c.field_name.as_str(),
                RESULTS_FIELD | PAGE_INFO_FIELD | AGGREGATE_FIELD
            )
        })
    }

    /// The node carrying the entity's own fields.
    ///
    /// For a page this is its `results` child; a page that selects no results
    /// has no content. Any other node is its own content.
    pub fn content(&self) -> Option<&SelectionNode> {
        if self.is_page() {
            self.child_fields
                .iter()
                .find(|c| c.field_name == RESULTS_FIELD)
        } else {
            Some(self)
        }
    }

    /// Whether `pageInfo.totalCount` or `pageInfo.pageCount` is selected.
    pub fn requests_total(&self) -> bool {
        self.child_fields
            .iter()
            .filter(|c| c.field_name == PAGE_INFO_FIELD)
            .flat_map(|info| info.child_fields.iter())
            .any(|c| c.field_name == "totalCount" || c.field_name == "pageCount")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::OrderDirection;
    use serde_json::json;

    fn page_node() -> SelectionNode {
        SelectionNode::new("testPage")
            .with_child(SelectionNode::new("results").with_fields(["id", "counter"]))
            .with_child(SelectionNode::new("pageInfo").with_fields(["hasNextPage", "totalCount"]))
    }

    #[test]
    fn test_page_detection() {
        let page = page_node();
        assert!(page.is_page());
        assert_eq!(page.content().unwrap().field_name, "results");
        assert!(page.requests_total());

        let plain = SelectionNode::new("test").with_fields(["id"]);
        assert!(!plain.is_page());
        assert_eq!(plain.content().unwrap().field_name, "test");
        assert!(!plain.requests_total());
    }

    #[test]
    fn test_page_without_results_has_no_content() {
        let page = SelectionNode::new("testPage")
            .with_child(SelectionNode::new("pageInfo").with_fields(["hasNextPage"]));
        assert!(page.is_page());
        assert!(page.content().is_none());
        assert!(!page.requests_total());
    }

    #[test]
    fn test_alias_and_lookup() {
        let node = SelectionNode::new("posts").aliased("recent");
        assert!(node.is_aliased());
        assert_eq!(node.response_key(), "recent");

        let same = SelectionNode::new("posts").aliased("posts");
        assert!(!same.is_aliased());

        let root = SelectionNode::new("user").with_child(node);
        assert!(root.child("recent").is_some());
        assert!(root.child("posts").is_none());
    }

    #[test]
    fn test_descend() {
        let root = page_node();
        assert_eq!(root.descend("results.counter").unwrap().field_name, "counter");
        assert!(root.descend("results.missing").is_none());
        assert_eq!(root.descend("").unwrap().field_name, "testPage");
    }

    #[test]
    fn test_from_json() {
        let node = SelectionNode::from_json(json!({
            "fieldName": "testPage",
            "arguments": {
                "first": 5,
                "after": 2,
                "sort": { "field": "counter", "dir": "DESC" },
                "filter": { "flag_eq": true }
            },
            "childFields": [
                { "fieldName": "results", "childFields": [{ "fieldName": "id" }] }
            ]
        }))
        .unwrap();

        assert_eq!(node.arguments.first, Some(5));
        assert_eq!(node.arguments.after, Some(json!(2)));
        assert_eq!(node.arguments.sort.as_ref().unwrap().dir, OrderDirection::Desc);
        assert!(node.arguments.is_bounded());
        assert!(node.is_page());
    }

    #[test]
    fn test_bad_arguments_rejected() {
        assert!(Arguments::from_json(json!({ "first": "ten" })).is_err());
    }
}
