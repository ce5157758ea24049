//! Planner configuration.

use serde::Deserialize;

/// Where sort keys of eagerly joined relationships are placed in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderScoping {
    /// Every key is path-qualified on the root plan; join specs carry none.
    /// For engines that cannot order inside a join.
    #[default]
    Flattened,
    /// Each join spec carries its own local keys.
    Nested,
}

/// Configuration for plan assembly and pagination.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Placement of joined sort keys.
    pub order_scoping: OrderScoping,
    /// Maximum join nesting depth.
    pub max_depth: usize,
    /// Run the total-count query concurrently with the page query.
    pub concurrent_count: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            order_scoping: OrderScoping::Flattened,
            max_depth: 5,
            concurrent_count: true,
        }
    }
}

impl PlannerConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the order scoping.
    pub fn order_scoping(mut self, scoping: OrderScoping) -> Self {
        self.order_scoping = scoping;
        self
    }

    /// Set the maximum join depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set whether the total count runs concurrently with the page query.
    pub fn concurrent_count(mut self, concurrent: bool) -> Self {
        self.concurrent_count = concurrent;
        self
    }
}
