// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Layered Engine Configuration
//!
//! Configuration values can come from several places and are merged by priority.
//!
//! ## Configuration Sources (Priority: Low to High)
//!
//! 1. **RustDefault** - Built-in Rust defaults
//! 2. **ConfigFile** - A TOML configuration file
//! 3. **Override** - Values set programmatically by the caller (highest priority)
//!
//! Keys are dotted paths into [`EngineConfig`], e.g. `optimizer.changes_threshold`.
//!
//! ```rust,ignore
//! use tree_cep::core::config::*;
//!
//! let mut config = FlatConfig::from_toml_str(file_content, PropertySource::ConfigFile)?;
//! config.set("optimizer.kind", "invariants-aware", PropertySource::Override);
//!
//! let engine_config = EngineConfig::from_flat_config(&config)?;
//! ```

use super::EngineConfig;
use crate::core::error::{CepError, CepResult};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// Property source identifier with priority ordering
///
/// Higher priority sources override lower priority sources during configuration merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertySource {
    /// Rust code defaults (priority: 0)
    RustDefault,
    /// Configuration file (priority: 1)
    ConfigFile,
    /// Programmatic override (priority: 2)
    Override,
}

impl PropertySource {
    /// Get numeric priority for comparison (higher = more important)
    #[inline]
    pub const fn priority(&self) -> u8 {
        match self {
            PropertySource::RustDefault => 0,
            PropertySource::ConfigFile => 1,
            PropertySource::Override => 2,
        }
    }

    /// Get human-readable description of the source
    #[inline]
    pub const fn description(&self) -> &'static str {
        match self {
            PropertySource::RustDefault => "Rust default",
            PropertySource::ConfigFile => "configuration file",
            PropertySource::Override => "programmatic override",
        }
    }
}

/// Flat key-value configuration with source tracking
#[derive(Debug, Clone, Default)]
pub struct FlatConfig {
    properties: HashMap<String, String>,
    sources: HashMap<String, PropertySource>,
}

impl FlatConfig {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a TOML document into dotted keys, all tagged with `source`
    pub fn from_toml_str(content: &str, source: PropertySource) -> CepResult<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let mut config = Self::new();
        flatten_into(&mut config, "", &toml::Value::Table(table), source);
        Ok(config)
    }

    /// Set a property with source tracking and priority-based override
    ///
    /// A value from a lower priority source never replaces one from a higher priority
    /// source; a value from the same source replaces the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>, source: PropertySource) {
        let key = key.into();
        let value = value.into();

        if let Some(existing_source) = self.sources.get(&key) {
            if existing_source.priority() > source.priority() {
                return;
            }
        }

        self.properties.insert(key.clone(), value);
        self.sources.insert(key, source);
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&String> {
        self.properties.get(key)
    }

    /// Get a property value with its source
    #[inline]
    pub fn get_with_source(&self, key: &str) -> Option<(&String, PropertySource)> {
        self.properties
            .get(key)
            .and_then(|value| self.sources.get(key).map(|source| (value, *source)))
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.properties.keys()
    }

    #[inline]
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Merge another configuration into this one (respects priorities)
    pub fn merge(&mut self, other: &FlatConfig) {
        for (key, value) in &other.properties {
            if let Some(source) = other.sources.get(key) {
                self.set(key.clone(), value.clone(), *source);
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

fn flatten_into(config: &mut FlatConfig, prefix: &str, value: &toml::Value, source: PropertySource) {
    match value {
        toml::Value::Table(table) => {
            for (key, nested) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(config, &path, nested, source);
            }
        }
        toml::Value::String(s) => config.set(prefix, s.clone(), source),
        other => config.set(prefix, other.to_string(), source),
    }
}

fn parse_property<T>(key: &str, value: &str) -> CepResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse::<T>().map_err(|e| {
        CepError::configuration_with_key(format!("Invalid value '{}': {}", value, e), key)
    })
}

impl EngineConfig {
    /// Build a typed configuration from layered properties.
    ///
    /// Starts from the defaults; every key present in `flat_config` must name a known
    /// setting and carry a valid value.
    pub fn from_flat_config(flat_config: &FlatConfig) -> CepResult<Self> {
        let mut config = EngineConfig::default();
        let mut keys: Vec<&String> = flat_config.keys().collect();
        keys.sort();

        for key in keys {
            let Some((value, source)) = flat_config.get_with_source(key) else {
                continue;
            };
            log::trace!("config {} = {} ({})", key, value, source.description());
            let value = value.as_str();
            match key.as_str() {
                "evaluation_mechanism_type" => {
                    config.evaluation_mechanism_type = parse_property(key, value)?
                }
                "default_tree_plan_builder" => {
                    config.default_tree_plan_builder = parse_property(key, value)?
                }
                "default_cost_model" => config.default_cost_model = parse_property(key, value)?,
                "primary_selection_strategy" => {
                    config.primary_selection_strategy = parse_property(key, value)?
                }
                "secondary_selection_strategy" => {
                    config.secondary_selection_strategy = parse_property(key, value)?
                }
                "multi_pattern_approach" => {
                    config.multi_pattern_approach = parse_property(key, value)?
                }
                "parallel_execution_mode" => {
                    config.parallel_execution_mode = parse_property(key, value)?
                }
                "storage.sort_storage" => config.storage.sort_storage = parse_property(key, value)?,
                "storage.clean_up_interval" => {
                    config.storage.clean_up_interval = parse_property(key, value)?
                }
                "storage.prioritize_sorting_by_timestamp" => {
                    config.storage.prioritize_sorting_by_timestamp = parse_property(key, value)?
                }
                "iterative_improvement.kind" => {
                    config.iterative_improvement.kind = parse_property(key, value)?
                }
                "iterative_improvement.init" => {
                    config.iterative_improvement.init = parse_property(key, value)?
                }
                "iterative_improvement.max_steps" => {
                    config.iterative_improvement.max_steps = parse_property(key, value)?
                }
                "iterative_improvement.seed" => {
                    config.iterative_improvement.seed = Some(parse_property(key, value)?)
                }
                "optimizer.kind" => config.optimizer.kind = parse_property(key, value)?,
                "optimizer.tree_plan_builder" => {
                    config.optimizer.tree_plan_builder = parse_property(key, value)?
                }
                "optimizer.changes_threshold" => {
                    config.optimizer.changes_threshold = parse_property(key, value)?
                }
                "optimizer.statistics_update_interval" => {
                    config.optimizer.statistics_update_interval = parse_property(key, value)?
                }
                "optimizer.statistics_time_window_ms" => {
                    config.optimizer.statistics_time_window_ms = Some(parse_property(key, value)?)
                }
                _ => {
                    return Err(CepError::configuration_with_key(
                        format!("Unknown configuration key '{}'", key),
                        key.as_str(),
                    ))
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::optimizer::OptimizerType;
    use crate::core::plan::tree_plan_builder::TreePlanBuilderType;

    #[test]
    fn test_property_source_priority_ordering() {
        assert!(PropertySource::Override.priority() > PropertySource::ConfigFile.priority());
        assert!(PropertySource::ConfigFile.priority() > PropertySource::RustDefault.priority());
        assert_eq!(PropertySource::ConfigFile.description(), "configuration file");
    }

    #[test]
    fn test_flat_config_priority_override() {
        let mut config = FlatConfig::new();
        config.set("storage.clean_up_interval", "10", PropertySource::RustDefault);
        config.set("storage.clean_up_interval", "20", PropertySource::ConfigFile);
        assert_eq!(config.get("storage.clean_up_interval"), Some(&"20".to_string()));

        config.set("storage.clean_up_interval", "40", PropertySource::Override);
        config.set("storage.clean_up_interval", "5", PropertySource::ConfigFile);
        assert_eq!(
            config.get_with_source("storage.clean_up_interval"),
            Some((&"40".to_string(), PropertySource::Override))
        );
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_merge_respects_priorities() {
        let mut base = FlatConfig::new();
        base.set("optimizer.kind", "trivial", PropertySource::Override);
        let mut file = FlatConfig::new();
        file.set("optimizer.kind", "invariants-aware", PropertySource::ConfigFile);
        file.set("optimizer.changes_threshold", "0.1", PropertySource::ConfigFile);

        base.merge(&file);
        assert_eq!(base.get("optimizer.kind"), Some(&"trivial".to_string()));
        assert!(base.contains("optimizer.changes_threshold"));
    }

    #[test]
    fn test_toml_flattening_and_conversion() {
        let mut flat = FlatConfig::from_toml_str(
            r#"
            default_tree_plan_builder = "sort-by-frequency-left-deep-tree"

            [optimizer]
            kind = "statistics-changes-aware"
            statistics_update_interval = 25
            "#,
            PropertySource::ConfigFile,
        )
        .unwrap();
        assert_eq!(
            flat.get("optimizer.statistics_update_interval"),
            Some(&"25".to_string())
        );
        flat.set("optimizer.kind", "invariants-aware", PropertySource::Override);

        let config = EngineConfig::from_flat_config(&flat).unwrap();
        assert_eq!(
            config.default_tree_plan_builder,
            TreePlanBuilderType::SortByFrequencyLeftDeepTree
        );
        assert_eq!(config.optimizer.kind, OptimizerType::InvariantsAware);
        assert_eq!(config.optimizer.statistics_update_interval, 25);
    }

    #[test]
    fn test_unknown_key_and_bad_value() {
        let mut flat = FlatConfig::new();
        flat.set("optimizer.colour", "blue", PropertySource::Override);
        let error = EngineConfig::from_flat_config(&flat).unwrap_err();
        assert!(matches!(
            error,
            CepError::Configuration { config_key: Some(ref key), .. } if key == "optimizer.colour"
        ));

        let mut flat = FlatConfig::new();
        flat.set("storage.clean_up_interval", "often", PropertySource::Override);
        assert!(EngineConfig::from_flat_config(&flat).is_err());
    }
}
