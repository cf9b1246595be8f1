//! Configuration types for the Astrolabe layout engine.
//!
//! All types implement [`serde::Deserialize`] and fill missing fields with
//! their defaults, so a configuration file only names what it changes.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining every section.
//! - [`LayoutConfig`] - Default layout, transition timing and per-algorithm options.
//! - [`AdaptiveSection`] - Selection thresholds and timers of the adaptive layout.
//! - [`ManagerConfig`] - Mode inference and hybrid subsystems of the advanced manager.
//! - [`ConnectorConfig`] - Path routing settings.
//!
//! # Example
//!
//! ```
//! # use astrolabe::config::AppConfig;
//! let config: AppConfig = toml::from_str(
//!     r#"
//!     [layout]
//!     default = "hierarchical"
//!
//!     [layout.options.hierarchical]
//!     level_separation = 90
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.layout().default_layout(), "hierarchical");
//! ```

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    connector::ConnectorConfig,
    layout::{Easing, LayoutOptions},
};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Layout configuration section.
    #[serde(default)]
    layout: LayoutConfig,

    /// Adaptive layout section.
    #[serde(default)]
    adaptive: AdaptiveSection,

    /// Advanced manager section.
    #[serde(default)]
    manager: ManagerConfig,

    /// Connection routing section.
    #[serde(default)]
    connector: ConnectorConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    pub fn new(
        layout: LayoutConfig,
        adaptive: AdaptiveSection,
        manager: ManagerConfig,
        connector: ConnectorConfig,
    ) -> Self {
        Self {
            layout,
            adaptive,
            manager,
            connector,
        }
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the adaptive layout configuration.
    pub fn adaptive(&self) -> &AdaptiveSection {
        &self.adaptive
    }

    /// Returns the manager configuration.
    pub fn manager(&self) -> &ManagerConfig {
        &self.manager
    }

    /// Returns the connector configuration.
    pub fn connector(&self) -> &ConnectorConfig {
        &self.connector
    }
}

/// Layout selection and transition settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Layout applied when none is requested.
    default: String,

    /// Morph duration when switching layouts, in milliseconds.
    transition_ms: u64,

    /// Easing of the morph.
    easing: Easing,

    /// Per-algorithm default options, keyed by layout name.
    options: IndexMap<String, LayoutOptions>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default: "force".to_string(),
            transition_ms: 1000,
            easing: Easing::default(),
            options: IndexMap::new(),
        }
    }
}

impl LayoutConfig {
    /// Returns the name of the default layout.
    pub fn default_layout(&self) -> &str {
        &self.default
    }

    /// Returns the morph duration.
    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    /// Returns the morph easing.
    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Returns the option tables, keyed by layout name.
    pub fn options(&self) -> &IndexMap<String, LayoutOptions> {
        &self.options
    }
}

/// Settings of the adaptive layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdaptiveSection {
    morph_duration_ms: u64,
    easing: Easing,
    auto_adapt: bool,
    evaluation_interval_ms: u64,
    time_based: bool,
    cycle_interval_ms: u64,
    cycle_pattern: Vec<String>,
    small_graph_threshold: usize,
    hierarchy_threshold: f32,
    density_threshold: f32,
}

impl Default for AdaptiveSection {
    fn default() -> Self {
        Self {
            morph_duration_ms: 1000,
            easing: Easing::default(),
            auto_adapt: false,
            evaluation_interval_ms: 5000,
            time_based: false,
            cycle_interval_ms: 10000,
            cycle_pattern: ["force", "hierarchical", "circular", "grid"]
                .map(String::from)
                .to_vec(),
            small_graph_threshold: 10,
            hierarchy_threshold: 0.7,
            density_threshold: 0.3,
        }
    }
}

impl AdaptiveSection {
    /// Returns whether periodic re-evaluation is enabled.
    pub fn auto_adapt(&self) -> bool {
        self.auto_adapt
    }

    /// Returns whether the time-based cycle is enabled.
    pub fn time_based(&self) -> bool {
        self.time_based
    }

    /// Returns the section as adaptive layout options.
    pub fn to_options(&self) -> LayoutOptions {
        LayoutOptions::new()
            .with("morph_duration_ms", self.morph_duration_ms as f64)
            .with("easing", self.easing.name())
            .with("auto_adapt", self.auto_adapt)
            .with("evaluation_interval_ms", self.evaluation_interval_ms as f64)
            .with("time_based", self.time_based)
            .with("cycle_interval_ms", self.cycle_interval_ms as f64)
            .with("cycle_pattern", self.cycle_pattern.clone())
            .with("small_graph_threshold", self.small_graph_threshold as f64)
            .with("hierarchy_threshold", f64::from(self.hierarchy_threshold))
            .with("density_threshold", f64::from(self.density_threshold))
    }
}

/// Mode inference and hybrid subsystem settings of the advanced manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Infer the operating mode from the graph when none is requested.
    auto_mode: bool,

    /// Complexity score above which the adaptive mode is chosen.
    complexity_threshold: f32,

    /// Subsystems enabled in hybrid mode.
    hybrid: HybridFlags,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            auto_mode: true,
            complexity_threshold: 0.5,
            hybrid: HybridFlags::default(),
        }
    }
}

impl ManagerConfig {
    /// Creates a new [`ManagerConfig`].
    pub fn new(auto_mode: bool, complexity_threshold: f32, hybrid: HybridFlags) -> Self {
        Self {
            auto_mode,
            complexity_threshold,
            hybrid,
        }
    }

    /// Returns whether the mode is inferred automatically.
    pub fn auto_mode(&self) -> bool {
        self.auto_mode
    }

    /// Returns the adaptive-mode complexity threshold.
    pub fn complexity_threshold(&self) -> f32 {
        self.complexity_threshold
    }

    /// Returns the hybrid subsystem flags.
    pub fn hybrid(&self) -> HybridFlags {
        self.hybrid
    }
}

/// Which subsystems run in hybrid mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HybridFlags {
    pub adaptive: bool,
    pub nested: bool,
    pub constraint: bool,
}

impl Default for HybridFlags {
    fn default() -> Self {
        Self {
            adaptive: true,
            nested: true,
            constraint: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::OptionValue;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.layout().default_layout(), "force");
        assert_eq!(config.layout().transition(), Duration::from_millis(1000));
        assert!(config.manager().auto_mode());
        assert_eq!(config.manager().hybrid(), HybridFlags::default());
        assert_eq!(config.connector().bundling_threshold, 3);
    }

    #[test]
    fn test_partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [layout]
            transition_ms = 250
            easing = "linear"

            [layout.options.circular]
            radius = 80
            plane = "xz"

            [adaptive]
            auto_adapt = true
            cycle_pattern = ["grid", "radial"]

            [manager.hybrid]
            nested = false
            "#,
        )
        .unwrap();

        assert_eq!(config.layout().default_layout(), "force");
        assert_eq!(config.layout().easing(), Easing::Linear);
        let circular = &config.layout().options()["circular"];
        assert_eq!(circular.get_as::<f32>("radius"), Some(80.0));
        assert_eq!(circular.get_as::<String>("plane").as_deref(), Some("xz"));

        assert!(config.adaptive().auto_adapt());
        let options = config.adaptive().to_options();
        assert_eq!(
            options.get("cycle_pattern"),
            Some(&OptionValue::List(vec!["grid".to_string(), "radial".to_string()]))
        );
        assert!(!config.manager().hybrid().nested);
        assert!(config.manager().hybrid().constraint);
    }

    #[test]
    fn test_unknown_easing_is_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("[layout]\neasing = \"bouncy\"");
        assert!(result.is_err());
    }
}
