//! Error types for quality-model import, evaluation and calibration.
//!
//! Every failure is a [`ModelError`]. Variants carry the name of the node,
//! measure or strategy involved so a failed evaluation can always be traced
//! back to the exact place in the tree that produced it.
//!
//! Errors fall into four categories (see [`ErrorCategory`]):
//!
//! - **Configuration**: missing weights or thresholds, unknown strategies,
//!   duplicate names, threshold arity mismatches. Always fatal.
//! - **Numeric**: division by zero during normalisation, singular or
//!   inconsistent comparison matrices. Fatal for the one computation only.
//! - **External**: a tool adapter or benchmark project failed. Recovered
//!   locally by batch drivers.
//! - **Import**: malformed descriptions and dangling references. Fatal
//!   before any evaluation begins.
//!
//! # Example
//!
//! ```rust
//! use qualmodel::errors::{ErrorCategory, ModelError};
//!
//! let err = ModelError::MissingWeight {
//!     node: "Security".to_string(),
//!     child: "Injection".to_string(),
//! };
//! assert_eq!(err.category(), ErrorCategory::Configuration);
//! assert!(err.to_string().contains("Security"));
//! ```

pub mod collection;

use std::path::PathBuf;
use thiserror::Error;

pub use collection::{BatchResults, FailureStage, ProjectFailure};

/// Broad classification of a [`ModelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Numeric,
    External,
    Import,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Numeric => "numeric",
            Self::External => "external",
            Self::Import => "import",
        }
    }
}

/// Strategy family, used when reporting unknown identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyFamily {
    Evaluator,
    Normalizer,
    UtilityFunction,
}

impl std::fmt::Display for StrategyFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Evaluator => "evaluator",
            Self::Normalizer => "normalizer",
            Self::UtilityFunction => "utility function",
        };
        f.write_str(name)
    }
}

/// Main error type for qualmodel operations
#[derive(Debug, Error)]
pub enum ModelError {
    /// Two nodes in one model share a name
    #[error("Duplicate node name '{name}' in quality model")]
    DuplicateName { name: String },

    /// A node references a child that is not declared anywhere
    #[error("Node '{parent}' references undeclared child '{child}'")]
    DanglingReference { parent: String, child: String },

    /// Parent/child linkage breaks the layer or single-parent rules
    #[error("Invalid linkage at '{node}': {message}")]
    InvalidLinkage { node: String, message: String },

    /// Strategy identifier not present in the registry
    #[error("Unknown {family} '{id}' bound to node '{node}'")]
    UnknownStrategy {
        family: StrategyFamily,
        id: String,
        node: String,
    },

    /// A weight-consuming evaluator has no weight for a present child
    #[error("Node '{node}' has no weight for child '{child}'")]
    MissingWeight { node: String, child: String },

    /// A utility function needs thresholds but none were derived or assigned
    #[error("Measure '{node}' has no thresholds (utility function '{utility}')")]
    MissingThresholds { node: String, utility: String },

    /// Threshold array length does not match the bound utility function
    #[error(
        "Node '{node}' has {actual} thresholds but utility function '{utility}' expects {expected}"
    )]
    ThresholdArity {
        node: String,
        utility: String,
        expected: usize,
        actual: usize,
    },

    /// A child weight is negative or not a number
    #[error("Invalid weight {weight} for child '{child}' of '{node}': weights must be finite and non-negative")]
    InvalidWeight {
        node: String,
        child: String,
        weight: f64,
    },

    /// Child weights of a weighted-sum node do not add up to 1
    #[error("Weights of '{node}' sum to {sum}, expected 1")]
    WeightSum { node: String, sum: f64 },

    /// Thresholds are not finite or not in ascending order
    #[error("Invalid thresholds {thresholds:?} for '{node}': {message}")]
    InvalidThresholds {
        node: String,
        thresholds: Vec<f64>,
        message: String,
    },

    /// A normalizer references a baseline the project never produced
    #[error("Normalizer '{normalizer}' on '{node}' needs baseline '{baseline}', which is not available")]
    MissingBaseline {
        node: String,
        normalizer: String,
        baseline: String,
    },

    /// Normalisation baseline is zero
    #[error("Division by zero normalizing '{node}': baseline '{baseline}' is 0")]
    DivisionByZero { node: String, baseline: String },

    /// Node shape violates what its evaluator requires
    #[error("Invalid structure at '{node}' (evaluator '{evaluator}'): {message}")]
    InvalidStructure {
        node: String,
        evaluator: String,
        message: String,
    },

    /// Comparison matrix is not well formed
    #[error("Malformed comparison matrix for '{node}': {message}")]
    MalformedMatrix { node: String, message: String },

    /// Priority vector could not be derived from the matrix
    #[error("Singular comparison matrix for '{node}': {message}")]
    SingularMatrix { node: String, message: String },

    /// Consistency ratio above the accepted bound (strict mode only)
    #[error("Comparison matrix for '{node}' is inconsistent: CR {ratio:.3} exceeds {threshold:.3}")]
    InconsistentMatrix {
        node: String,
        ratio: f64,
        threshold: f64,
    },

    /// No benchmark project produced a value for a measure
    #[error("No benchmark data for measure '{measure}': {reason}")]
    NoBenchmarkData { measure: String, reason: String },

    /// A tool adapter failed to analyze or parse
    #[error("Tool '{tool}' failed: {message}")]
    ToolFailure { tool: String, message: String },

    /// A name lookup did not match any node
    #[error("Unknown node '{name}'")]
    UnknownNode { name: String },

    /// Malformed quality-model description or input file
    #[error("Import error in {}: {message}", display_path(.path))]
    Import {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// TOML errors
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl ModelError {
    /// Create an import error without a path
    pub fn import(message: impl Into<String>) -> Self {
        Self::Import {
            message: message.into(),
            path: None,
        }
    }

    /// Create an import error with path context
    pub fn import_with_path(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Import {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn malformed_matrix(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedMatrix {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateName { .. }
            | Self::UnknownStrategy { .. }
            | Self::MissingWeight { .. }
            | Self::MissingThresholds { .. }
            | Self::ThresholdArity { .. }
            | Self::InvalidWeight { .. }
            | Self::WeightSum { .. }
            | Self::InvalidThresholds { .. }
            | Self::MissingBaseline { .. }
            | Self::InvalidStructure { .. }
            | Self::NoBenchmarkData { .. }
            | Self::UnknownNode { .. }
            | Self::Configuration(_)
            | Self::Toml(_) => ErrorCategory::Configuration,
            Self::DivisionByZero { .. }
            | Self::MalformedMatrix { .. }
            | Self::SingularMatrix { .. }
            | Self::InconsistentMatrix { .. } => ErrorCategory::Numeric,
            Self::ToolFailure { .. } | Self::Io(_) => ErrorCategory::External,
            Self::DanglingReference { .. }
            | Self::InvalidLinkage { .. }
            | Self::Import { .. }
            | Self::Json(_)
            | Self::Yaml(_) => ErrorCategory::Import,
        }
    }

    /// Whether a batch driver may skip the failing item and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::External | ErrorCategory::Numeric
        )
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<inline>".to_string())
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = ModelError::DivisionByZero {
            node: "Complexity".into(),
            baseline: "loc".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Numeric);
        assert!(err.is_recoverable());

        let err = ModelError::DuplicateName { name: "x".into() };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!err.is_recoverable());

        let err = ModelError::tool("bandit", "exit status 2");
        assert_eq!(err.category(), ErrorCategory::External);
    }

    #[test]
    fn test_messages_name_the_node() {
        let err = ModelError::ThresholdArity {
            node: "Duplication".into(),
            utility: "three-zone".into(),
            expected: 3,
            actual: 2,
        };
        let message = err.to_string();
        assert!(message.contains("Duplication"));
        assert!(message.contains("three-zone"));
        assert!(message.contains("expects 3"));
    }

    #[test]
    fn test_import_message_with_and_without_path() {
        let err = ModelError::import("missing tqi");
        assert!(err.to_string().contains("<inline>"));

        let err = ModelError::import_with_path("missing tqi", "model.yaml");
        assert!(err.to_string().contains("model.yaml"));
    }
}
