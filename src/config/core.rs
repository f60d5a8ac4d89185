use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::parallel::ParallelConfig;
use crate::errors::{ModelError, Result};
use crate::tools::LOC_DIAGNOSTIC;

/// Root configuration structure for qualmodel
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QualmodelConfig {
    /// Threshold derivation settings
    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    /// Weight elicitation settings
    #[serde(default)]
    pub weighting: WeightingConfig,

    /// Parallelism for per-project benchmark work
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// Lines of code counting
    #[serde(default)]
    pub loc: LocConfig,

    /// Analysis tools whose diagnostics the model references
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

/// How benchmark values are reduced to thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkStrategy {
    /// [min, max] of the observed values, matching the default `linear` utility
    #[default]
    Naive,
    /// Three thresholds at configured percentiles, for `three-zone` measures
    Percentile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    #[serde(default)]
    pub strategy: BenchmarkStrategy,

    /// Percentiles for the statistical rule, ascending within [0, 100]
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,

    /// File-name suffix marking project roots inside a corpus
    #[serde(default)]
    pub project_marker: Option<String>,
}

fn default_percentiles() -> Vec<f64> {
    vec![25.0, 50.0, 75.0]
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            strategy: BenchmarkStrategy::default(),
            percentiles: default_percentiles(),
            project_marker: None,
        }
    }
}

/// Where child weights come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WeightingStrategy {
    /// Equal weights, 1/n per child
    #[default]
    Naive,
    /// Pairwise comparison matrices
    Ahp,
}

/// How priorities are extracted from a comparison matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityMethod {
    /// Principal right eigenvector (power iteration)
    #[default]
    Eigenvector,
    /// Normalized geometric mean of each row
    GeometricMean,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightingConfig {
    #[serde(default)]
    pub strategy: WeightingStrategy,

    #[serde(default)]
    pub method: PriorityMethod,

    /// Consistency ratio above which a matrix is flagged
    #[serde(default = "default_consistency_threshold")]
    pub consistency_threshold: f64,

    /// Reject matrices above the threshold instead of warning
    #[serde(default)]
    pub strict_consistency: bool,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_consistency_threshold() -> f64 {
    0.10
}

fn default_max_iterations() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-12
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            strategy: WeightingStrategy::default(),
            method: PriorityMethod::default(),
            consistency_threshold: default_consistency_threshold(),
            strict_consistency: false,
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Configuration for lines-of-code counting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocConfig {
    /// Include test files (default: false)
    #[serde(default)]
    pub include_tests: bool,

    /// Include generated files (default: false)
    #[serde(default)]
    pub include_generated: bool,

    /// Glob patterns, relative to the project root, to leave out
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// File extensions that count as source
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    [
        "py", "rs", "js", "jsx", "ts", "tsx", "java", "kt", "go", "c", "h", "cc", "cpp", "hpp",
        "cs", "rb", "php", "swift", "scala",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

impl Default for LocConfig {
    fn default() -> Self {
        Self {
            include_tests: false,
            include_generated: false,
            exclude_patterns: Vec::new(),
            extensions: default_extensions(),
        }
    }
}

/// One external analysis tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolConfig {
    /// Name diagnostics use in their `tool` field
    pub name: String,

    /// Program to run before reading the report; absent for precomputed reports
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments; `{project}`, `{output}` and `{tool}` are substituted
    #[serde(default)]
    pub args: Vec<String>,

    /// Report path template, relative to the project directory
    #[serde(default = "default_report")]
    pub report: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_report() -> String {
    ".qualmodel/{tool}.json".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

impl QualmodelConfig {
    /// Check value ranges and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        self.benchmark.validate()?;
        self.weighting.validate()?;

        if self.parallel.max_concurrency == Some(0) {
            return Err(invalid("parallel.max_concurrency must be at least 1"));
        }

        let mut names = BTreeSet::new();
        for tool in &self.tools {
            if tool.name.trim().is_empty() {
                return Err(invalid("tool name must not be empty"));
            }
            if tool.name == LOC_DIAGNOSTIC {
                return Err(invalid(format!(
                    "tool name '{LOC_DIAGNOSTIC}' is reserved for the built-in line counter"
                )));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(invalid(format!("tool '{}' is configured twice", tool.name)));
            }
            if tool.timeout_secs == 0 {
                return Err(invalid(format!(
                    "tool '{}' needs a positive timeout_secs",
                    tool.name
                )));
            }
        }
        Ok(())
    }

    pub fn tool(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

impl BenchmarkConfig {
    fn validate(&self) -> Result<()> {
        if self.percentiles.len() != 3 {
            return Err(invalid(format!(
                "benchmark.percentiles needs 3 values, got {}",
                self.percentiles.len()
            )));
        }
        if self
            .percentiles
            .iter()
            .any(|p| !p.is_finite() || !(0.0..=100.0).contains(p))
        {
            return Err(invalid("benchmark.percentiles must lie within [0, 100]"));
        }
        if self.percentiles.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(invalid("benchmark.percentiles must be ascending"));
        }
        if matches!(&self.project_marker, Some(marker) if marker.is_empty()) {
            return Err(invalid("benchmark.project_marker must not be empty"));
        }
        Ok(())
    }
}

impl WeightingConfig {
    fn validate(&self) -> Result<()> {
        if self.consistency_threshold.is_nan() || self.consistency_threshold <= 0.0 {
            return Err(invalid("weighting.consistency_threshold must be positive"));
        }
        if self.tolerance.is_nan() || self.tolerance <= 0.0 {
            return Err(invalid("weighting.tolerance must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("weighting.max_iterations must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ModelError {
    ModelError::Configuration(message.into())
}

/// Commented template written by `qualmodel init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# qualmodel configuration

[benchmark]
# naive: thresholds are [min, max] of the corpus values
# percentile: three thresholds at the percentiles below (three-zone measures)
strategy = "naive"
percentiles = [25.0, 50.0, 75.0]
# project_marker = "setup.py"

[weighting]
# naive: 1/n per child; ahp: pairwise comparison matrices
strategy = "naive"
method = "eigenvector"
consistency_threshold = 0.10
strict_consistency = false
max_iterations = 1000
tolerance = 1e-12

[parallel]
enabled = true
# max_concurrency = 4

[loc]
include_tests = false
include_generated = false
exclude_patterns = []

# [[tools]]
# name = "bandit"
# command = "python"
# args = ["scripts/bandit_report.py", "{project}", "{output}"]
# report = ".qualmodel/{tool}.json"
# timeout_secs = 600
"#;
