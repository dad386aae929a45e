// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine Configuration
//!
//! Defaults for every knob the evaluation mechanism exposes, loadable from TOML or
//! YAML and overridable key by key through [`FlatConfig`].
//!
//! ```toml
//! default_tree_plan_builder = "trivial-left-deep-tree"
//! primary_selection_strategy = "match-any"
//!
//! [storage]
//! clean_up_interval = 10
//!
//! [optimizer]
//! kind = "statistics-changes-aware"
//! changes_threshold = 0.5
//! ```

pub mod flat_config;

pub use flat_config::{FlatConfig, PropertySource};

use crate::core::error::{CepError, CepResult};
use crate::core::optimizer::OptimizerType;
use crate::core::parallel::ParallelExecutionMode;
use crate::core::plan::cost_model::TreeCostModelType;
use crate::core::plan::iterative_improvement::{
    IterativeImprovementInitType, IterativeImprovementType,
};
use crate::core::plan::tree_plan_builder::TreePlanBuilderType;
use crate::core::tree::storage::TreeStorageParameters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Kind of evaluation mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMechanismType {
    #[default]
    TreeBased,
}

impl EvaluationMechanismType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EvaluationMechanismType::TreeBased => "tree-based",
        }
    }
}

impl FromStr for EvaluationMechanismType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tree-based" => Ok(EvaluationMechanismType::TreeBased),
            _ => Err(format!(
                "Invalid evaluation mechanism '{}'. Valid values: 'tree-based'",
                s
            )),
        }
    }
}

/// Event selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Every event may take part in any number of matches
    #[default]
    MatchAny,
    /// Each event takes part in at most one full match
    MatchSingle,
    /// Each event is used by the next match only; no branching
    MatchNext,
}

impl SelectionStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::MatchAny => "match-any",
            SelectionStrategy::MatchSingle => "match-single",
            SelectionStrategy::MatchNext => "match-next",
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "match-any" => Ok(SelectionStrategy::MatchAny),
            "match-single" => Ok(SelectionStrategy::MatchSingle),
            "match-next" => Ok(SelectionStrategy::MatchNext),
            _ => Err(format!(
                "Invalid selection strategy '{}'. Valid values: 'match-any', 'match-single', 'match-next'",
                s
            )),
        }
    }
}

/// How several patterns share evaluation structures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MultiPatternEvaluationApproach {
    #[default]
    TrivialSharingLeaves,
    TreeMerge,
}

impl MultiPatternEvaluationApproach {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MultiPatternEvaluationApproach::TrivialSharingLeaves => "trivial-sharing-leaves",
            MultiPatternEvaluationApproach::TreeMerge => "tree-merge",
        }
    }
}

impl FromStr for MultiPatternEvaluationApproach {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trivial-sharing-leaves" => Ok(MultiPatternEvaluationApproach::TrivialSharingLeaves),
            "tree-merge" => Ok(MultiPatternEvaluationApproach::TreeMerge),
            _ => Err(format!(
                "Invalid multi-pattern approach '{}'. Valid values: 'trivial-sharing-leaves', 'tree-merge'",
                s
            )),
        }
    }
}

/// Parameters of the local-search tree plan builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterativeImprovementConfig {
    pub kind: IterativeImprovementType,
    pub init: IterativeImprovementInitType,
    /// Upper bound on improvement steps
    pub max_steps: usize,
    /// Seed of the random initial order; drawn from entropy when absent
    pub seed: Option<u64>,
}

impl Default for IterativeImprovementConfig {
    fn default() -> Self {
        Self {
            kind: IterativeImprovementType::SwapBased,
            init: IterativeImprovementInitType::Random,
            max_steps: 64,
            seed: None,
        }
    }
}

/// Adaptive optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub kind: OptimizerType,
    /// Builder used once statistics are available
    pub tree_plan_builder: TreePlanBuilderType,
    /// Relative change `t` after which a statistic counts as changed
    pub changes_threshold: f64,
    /// Number of events between two optimizer decisions
    pub statistics_update_interval: usize,
    /// Time window of the arrival-rate statistic; the pattern window when absent
    pub statistics_time_window_ms: Option<i64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kind: OptimizerType::Trivial,
            tree_plan_builder: TreePlanBuilderType::GreedyLeftDeepTree,
            changes_threshold: 0.5,
            statistics_update_interval: 100,
            statistics_time_window_ms: None,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub evaluation_mechanism_type: EvaluationMechanismType,
    /// Builder used for the first plan when the pattern carries no statistics
    pub default_tree_plan_builder: TreePlanBuilderType,
    pub default_cost_model: TreeCostModelType,
    pub primary_selection_strategy: SelectionStrategy,
    pub secondary_selection_strategy: SelectionStrategy,
    pub multi_pattern_approach: MultiPatternEvaluationApproach,
    pub parallel_execution_mode: ParallelExecutionMode,
    pub storage: TreeStorageParameters,
    pub iterative_improvement: IterativeImprovementConfig,
    pub optimizer: OptimizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluation_mechanism_type: EvaluationMechanismType::default(),
            default_tree_plan_builder: TreePlanBuilderType::default(),
            default_cost_model: TreeCostModelType::default(),
            primary_selection_strategy: SelectionStrategy::MatchAny,
            secondary_selection_strategy: SelectionStrategy::MatchSingle,
            multi_pattern_approach: MultiPatternEvaluationApproach::default(),
            parallel_execution_mode: ParallelExecutionMode::default(),
            storage: TreeStorageParameters::default(),
            iterative_improvement: IterativeImprovementConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> CepResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document; missing keys keep their defaults
    pub fn from_yaml_str(content: &str) -> CepResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, picking the format from its extension
    pub fn load<P: AsRef<Path>>(path: P) -> CepResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        log::debug!("Loading engine configuration from {}", path.display());
        match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Err(CepError::configuration(format!(
                "Unsupported configuration file '{}': expected a .toml, .yaml or .yml extension",
                path.display()
            ))),
        }
    }

    /// Check value ranges the type system cannot express
    pub fn validate(&self) -> CepResult<()> {
        if self.storage.clean_up_interval == 0 {
            return Err(CepError::configuration_with_key(
                "clean_up_interval must be at least 1",
                "storage.clean_up_interval",
            ));
        }
        let threshold = self.optimizer.changes_threshold;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(CepError::configuration_with_key(
                format!(
                    "changes_threshold must be non-negative, got {}",
                    self.optimizer.changes_threshold
                ),
                "optimizer.changes_threshold",
            ));
        }
        if self.optimizer.statistics_update_interval == 0 {
            return Err(CepError::configuration_with_key(
                "statistics_update_interval must be at least 1",
                "optimizer.statistics_update_interval",
            ));
        }
        if let Some(window) = self.optimizer.statistics_time_window_ms {
            if window <= 0 {
                return Err(CepError::configuration_with_key(
                    format!("statistics_time_window_ms must be positive, got {}", window),
                    "optimizer.statistics_time_window_ms",
                ));
            }
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> CepResult<String> {
        toml::to_string(self).map_err(|e| CepError::configuration(e.to_string()))
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mechanism={}, default_builder={}, optimizer={}/{}, selection={}/{}",
            self.evaluation_mechanism_type.as_str(),
            self.default_tree_plan_builder.as_str(),
            self.optimizer.kind.as_str(),
            self.optimizer.tree_plan_builder.as_str(),
            self.primary_selection_strategy.as_str(),
            self.secondary_selection_strategy.as_str(),
        )
    }
}
