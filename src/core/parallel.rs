// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parallel execution modes.
//!
//! Only [`ParallelExecutionMode::Sequential`] has an implementation; the evaluation
//! mechanism rejects the others as configuration errors.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelExecutionMode {
    #[default]
    Sequential,
    DataParallelism,
    StructureParallelism,
    TaskParallelism,
    HybridParallelism,
}

impl ParallelExecutionMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ParallelExecutionMode::Sequential => "sequential",
            ParallelExecutionMode::DataParallelism => "data-parallelism",
            ParallelExecutionMode::StructureParallelism => "structure-parallelism",
            ParallelExecutionMode::TaskParallelism => "task-parallelism",
            ParallelExecutionMode::HybridParallelism => "hybrid-parallelism",
        }
    }

    #[inline]
    pub const fn is_supported(&self) -> bool {
        matches!(self, ParallelExecutionMode::Sequential)
    }
}

impl FromStr for ParallelExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(ParallelExecutionMode::Sequential),
            "data-parallelism" => Ok(ParallelExecutionMode::DataParallelism),
            "structure-parallelism" => Ok(ParallelExecutionMode::StructureParallelism),
            "task-parallelism" => Ok(ParallelExecutionMode::TaskParallelism),
            "hybrid-parallelism" => Ok(ParallelExecutionMode::HybridParallelism),
            _ => Err(format!(
                "Invalid parallel execution mode '{}'. Valid values: 'sequential', 'data-parallelism', \
                 'structure-parallelism', 'task-parallelism', 'hybrid-parallelism'",
                s
            )),
        }
    }
}
