//! Flat, named layout options.
//!
//! Every algorithm keeps a typed config with defaults; a [`LayoutOptions`] map
//! is merged over it, and only the keys the algorithm knows are read. Unknown
//! keys are ignored and wrong-typed values are skipped with a `debug!` record.

use std::fmt;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use astrolabe_core::geometry::Vec3;

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Vector(Vec3),
    List(Vec<String>),
    Text(String),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Number(_) => "number",
            OptionValue::Vector(_) => "vector",
            OptionValue::List(_) => "list",
            OptionValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(value) => write!(f, "{value}"),
            OptionValue::Number(value) => write!(f, "{value}"),
            OptionValue::Vector(value) => write!(f, "[{}, {}, {}]", value.x(), value.y(), value.z()),
            OptionValue::List(values) => write!(f, "[{}]", values.join(", ")),
            OptionValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<Vec3> for OptionValue {
    fn from(value: Vec3) -> Self {
        OptionValue::Vector(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(values: Vec<String>) -> Self {
        OptionValue::List(values)
    }
}

/// Conversion from an [`OptionValue`] into a typed config field.
pub trait FromOption: Sized {
    /// Returns `None` when the value has the wrong type or range
    fn from_option(value: &OptionValue) -> Option<Self>;
}

impl FromOption for bool {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl FromOption for f32 {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Number(value) if value.is_finite() => Some(*value as f32),
            _ => None,
        }
    }
}

impl FromOption for usize {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Number(value) if value.is_finite() && *value >= 0.0 => {
                Some(value.round() as usize)
            }
            _ => None,
        }
    }
}

impl FromOption for u64 {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Number(value) if value.is_finite() && *value >= 0.0 => {
                Some(value.round() as u64)
            }
            _ => None,
        }
    }
}

impl FromOption for Vec3 {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Vector(value) => Some(*value),
            _ => None,
        }
    }
}

impl FromOption for String {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Text(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl FromOption for Vec<String> {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::List(values) => Some(values.clone()),
            _ => None,
        }
    }
}

/// Ordered map of option name to value.
///
/// # Examples
///
/// ```
/// use astrolabe::layout::LayoutOptions;
///
/// let options = LayoutOptions::new()
///     .with("radius", 250.0)
///     .with("plane", "xz");
///
/// assert_eq!(options.get_as::<f32>("radius"), Some(250.0));
/// assert_eq!(options.get_as::<String>("plane").as_deref(), Some("xz"));
/// assert_eq!(options.get_as::<f32>("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutOptions {
    values: IndexMap<String, OptionValue>,
}

impl LayoutOptions {
    /// Creates an empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces an option
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw value lookup
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// Typed lookup; wrong-typed values read as absent
    pub fn get_as<T: FromOption>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        let typed = T::from_option(value);
        if typed.is_none() {
            debug!(key, kind = value.kind(); "Ignoring option with unexpected type");
        }
        typed
    }

    /// Overwrites `target` when `key` is present and well typed
    pub fn load<T: FromOption>(&self, key: &str, target: &mut T) {
        if let Some(value) = self.get_as(key) {
            *target = value;
        }
    }

    /// Returns a copy of `self` with every entry of `overrides` applied on top
    pub fn merged(&self, overrides: &LayoutOptions) -> LayoutOptions {
        let mut merged = self.clone();
        for (key, value) in &overrides.values {
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Iterates options in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// True when no option is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_ignores_wrong_type() {
        let options = LayoutOptions::new().with("radius", "large");
        let mut radius = 200.0_f32;
        options.load("radius", &mut radius);
        assert_eq!(radius, 200.0);
    }

    #[test]
    fn test_load_unsigned_rejects_negative() {
        let options = LayoutOptions::new().with("columns", -3.0);
        assert_eq!(options.get_as::<usize>("columns"), None);
    }

    #[test]
    fn test_merged_prefers_overrides() {
        let base = LayoutOptions::new().with("radius", 100.0).with("clockwise", true);
        let merged = base.merged(&LayoutOptions::new().with("radius", 300.0));
        assert_eq!(merged.get_as::<f32>("radius"), Some(300.0));
        assert_eq!(merged.get_as::<bool>("clockwise"), Some(true));
    }

    #[test]
    fn test_deserialize_from_toml() {
        let options: LayoutOptions = toml::from_str(
            r#"
            radius = 120.5
            clockwise = true
            plane = "yz"
            center = [1.0, 2.0, 3.0]
            cycle_pattern = ["grid", "circular"]
            "#,
        )
        .unwrap();

        assert_eq!(options.get_as::<f32>("radius"), Some(120.5));
        assert_eq!(options.get_as::<bool>("clockwise"), Some(true));
        assert_eq!(options.get_as::<String>("plane").as_deref(), Some("yz"));
        assert_eq!(
            options.get_as::<Vec3>("center"),
            Some(Vec3::new(1.0, 2.0, 3.0))
        );
        assert_eq!(
            options.get_as::<Vec<String>>("cycle_pattern"),
            Some(vec!["grid".to_string(), "circular".to_string()])
        );
    }
}
