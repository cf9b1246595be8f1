//! Prioritised rules mapping graph metrics to a layout name.

use std::{fmt, sync::Arc};

use super::metrics::GraphMetrics;

/// Predicate over [`GraphMetrics`]
pub type RulePredicate = Arc<dyn Fn(&GraphMetrics) -> bool + Send + Sync>;

/// One entry of the rule table.
#[derive(Clone)]
pub struct AdaptationRule {
    pub name: String,
    pub target: String,
    /// Lower values are tried first
    pub priority: i32,
    pub reason: String,
    predicate: RulePredicate,
}

impl AdaptationRule {
    pub fn new<F>(name: impl Into<String>, target: impl Into<String>, priority: i32, predicate: F) -> Self
    where
        F: Fn(&GraphMetrics) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            reason: name.clone(),
            name,
            target: target.into(),
            priority,
            predicate: Arc::new(predicate),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn matches(&self, metrics: &GraphMetrics) -> bool {
        (self.predicate)(metrics)
    }
}

impl fmt::Debug for AdaptationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptationRule")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Thresholds of the ladder used when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackThresholds {
    /// Below this node count: circular
    pub small_graph: usize,
    /// Above this hierarchy score: hierarchical
    pub hierarchy: f32,
    /// Above this density: force; otherwise grid
    pub density: f32,
}

impl Default for FallbackThresholds {
    fn default() -> Self {
        Self {
            small_graph: 10,
            hierarchy: 0.7,
            density: 0.3,
        }
    }
}

impl FallbackThresholds {
    fn select(&self, metrics: &GraphMetrics) -> (&'static str, &'static str) {
        if metrics.node_count < self.small_graph {
            ("circular", "fallback: small graph")
        } else if metrics.hierarchy_score > self.hierarchy {
            ("hierarchical", "fallback: tree-like")
        } else if metrics.density > self.density {
            ("force", "fallback: dense")
        } else {
            ("grid", "fallback: default")
        }
    }
}

/// Outcome of a rule-table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub target: String,
    /// Matching rule, `None` when the fallback ladder decided
    pub rule: Option<String>,
    pub reason: String,
}

/// Rules kept sorted by priority.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<AdaptationRule>,
    fallback: FallbackThresholds,
}

impl Default for RuleSet {
    fn default() -> Self {
        let mut rules = Self::empty();
        rules.add(
            AdaptationRule::new("small-graph", "circular", 10, |m| m.node_count < 10)
                .with_reason("few nodes read best on a ring"),
        );
        rules.add(
            AdaptationRule::new("tree-structure", "hierarchical", 20, |m| m.hierarchy_score > 0.7)
                .with_reason("graph is tree-like"),
        );
        rules.add(
            AdaptationRule::new("dense-network", "force", 30, |m| m.density > 0.3)
                .with_reason("dense graph needs force separation"),
        );
        rules.add(
            AdaptationRule::new("clustered", "spherical", 40, |m| m.clustering > 0.5)
                .with_reason("strong local clustering"),
        );
        rules.add(
            AdaptationRule::new("large-sparse", "grid", 50, |m| m.node_count > 200)
                .with_reason("large sparse graph"),
        );
        rules
    }
}

impl RuleSet {
    /// A table with no rules; every selection uses the fallback ladder
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            fallback: FallbackThresholds::default(),
        }
    }

    pub fn rules(&self) -> &[AdaptationRule] {
        &self.rules
    }

    pub fn fallback(&self) -> &FallbackThresholds {
        &self.fallback
    }

    pub fn set_fallback(&mut self, fallback: FallbackThresholds) {
        self.fallback = fallback;
    }

    /// Adds `rule`, replacing any rule of the same name, and re-sorts.
    ///
    /// Rules of equal priority keep their insertion order.
    pub fn add(&mut self, rule: AdaptationRule) {
        self.rules.retain(|existing| existing.name != rule.name);
        self.rules.push(rule);
        self.rules.sort_by_key(|rule| rule.priority);
    }

    /// Removes the rule called `name`; returns whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.name != name);
        self.rules.len() != before
    }

    /// First matching rule in priority order, else the fallback ladder
    pub fn select(&self, metrics: &GraphMetrics) -> Selection {
        match self.rules.iter().find(|rule| rule.matches(metrics)) {
            Some(rule) => Selection {
                target: rule.target.clone(),
                rule: Some(rule.name.clone()),
                reason: rule.reason.clone(),
            },
            None => {
                let (target, reason) = self.fallback.select(metrics);
                Selection {
                    target: target.to_string(),
                    rule: None,
                    reason: reason.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(node_count: usize, density: f32, hierarchy_score: f32, clustering: f32) -> GraphMetrics {
        GraphMetrics {
            node_count,
            density,
            hierarchy_score,
            clustering,
            ..GraphMetrics::default()
        }
    }

    #[test]
    fn test_default_rules_are_sorted() {
        let rules = RuleSet::default();
        let priorities: Vec<i32> = rules.rules().iter().map(|rule| rule.priority).collect();
        assert_eq!(priorities, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_lowest_priority_match_wins() {
        let rules = RuleSet::default();
        // Small and dense: small-graph has the lower priority.
        let selection = rules.select(&metrics(5, 0.9, 0.0, 0.0));
        assert_eq!(selection.target, "circular");
        assert_eq!(selection.rule.as_deref(), Some("small-graph"));
    }

    #[test]
    fn test_selection_is_pure() {
        let rules = RuleSet::default();
        let m = metrics(40, 0.1, 0.2, 0.6);
        assert_eq!(rules.select(&m), rules.select(&m));
        assert_eq!(rules.select(&m).target, "spherical");
    }

    #[test]
    fn test_fallback_ladder() {
        let rules = RuleSet::empty();
        assert_eq!(rules.select(&metrics(3, 0.0, 0.0, 0.0)).target, "circular");
        assert_eq!(rules.select(&metrics(30, 0.0, 0.9, 0.0)).target, "hierarchical");
        assert_eq!(rules.select(&metrics(30, 0.5, 0.1, 0.0)).target, "force");
        let selection = rules.select(&metrics(30, 0.1, 0.1, 0.0));
        assert_eq!(selection.target, "grid");
        assert!(selection.rule.is_none());
    }

    #[test]
    fn test_add_replaces_and_resorts() {
        let mut rules = RuleSet::default();
        rules.add(AdaptationRule::new("always-radial", "radial", 0, |_| true));
        assert_eq!(rules.rules()[0].name, "always-radial");
        assert_eq!(rules.select(&metrics(5, 0.0, 0.0, 0.0)).target, "radial");

        rules.add(AdaptationRule::new("always-radial", "radial", 99, |_| true));
        assert_eq!(rules.rules().last().unwrap().name, "always-radial");
        assert_eq!(rules.rules().len(), 6);

        assert!(rules.remove("always-radial"));
        assert!(!rules.remove("always-radial"));
    }
}
