// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree CEP Core Error Types
//!
//! Error handling for pattern construction, tree evaluation and plan optimization.
//! Rejected candidate matches are not errors: nodes simply produce nothing for them.

use thiserror::Error;

/// Result type for CEP operations
pub type CepResult<T> = Result<T, CepError>;

/// CEP error types
#[derive(Error, Debug)]
pub enum CepError {
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    #[error("Invalid pattern: {message}")]
    InvalidPattern { message: String },

    #[error("Structural invariant violated: {message}")]
    StructuralViolation { message: String },

    #[error("Missing statistics of kind '{kind}'")]
    MissingStatistics { kind: String },

    #[error("Incompatible statistics of kind '{kind}': {message}")]
    StatisticsMismatch { kind: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl CepError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: None,
        }
    }

    /// Create a configuration error with a specific key
    pub fn configuration_with_key(message: impl Into<String>, config_key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: Some(config_key.into()),
        }
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            message: message.into(),
        }
    }

    /// Create a structural violation error (malformed evaluation tree)
    pub fn structural(message: impl Into<String>) -> Self {
        Self::StructuralViolation {
            message: message.into(),
        }
    }

    /// Create a missing statistics error
    pub fn missing_statistics(kind: impl Into<String>) -> Self {
        Self::MissingStatistics { kind: kind.into() }
    }

    /// Create a statistics mismatch error
    pub fn statistics_mismatch(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StatisticsMismatch {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
