//! Result collection for batch operations.
//!
//! Benchmark projects are analysed independently. Instead of stopping at the
//! first broken project, every project is attempted and both successes and
//! failures are returned together.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Results from a batch of independent project operations.
#[derive(Debug, Clone)]
pub struct BatchResults<T> {
    pub successes: Vec<T>,
    pub failures: Vec<ProjectFailure>,
}

impl<T> BatchResults<T> {
    pub fn new(successes: Vec<T>, failures: Vec<ProjectFailure>) -> Self {
        Self {
            successes,
            failures,
        }
    }

    /// Split a list of per-item results into successes and failures.
    pub fn from_results(results: Vec<std::result::Result<T, ProjectFailure>>) -> Self {
        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(value) => successes.push(value),
                Err(failure) => failures.push(failure),
            }
        }
        Self::new(successes, failures)
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn total_count(&self) -> usize {
        self.success_count() + self.failure_count()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_count() == 0 {
            return 1.0;
        }
        self.success_count() as f64 / self.total_count() as f64
    }
}

/// A benchmark project that could not be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFailure {
    pub project: String,
    pub path: PathBuf,
    pub stage: FailureStage,
    pub error: String,
}

impl ProjectFailure {
    pub fn new(
        project: impl Into<String>,
        path: impl Into<PathBuf>,
        stage: FailureStage,
        error: &ModelError,
    ) -> Self {
        Self {
            project: project.into(),
            path: path.into(),
            stage,
            error: error.to_string(),
        }
    }
}

/// Where in the per-project pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStage {
    ToolRun,
    ResultParse,
    Evaluation,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolRun => "Tool run",
            Self::ResultParse => "Result parse",
            Self::Evaluation => "Evaluation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(name: &str) -> ProjectFailure {
        ProjectFailure::new(
            name,
            PathBuf::from(name),
            FailureStage::ToolRun,
            &ModelError::tool("lint", "crashed"),
        )
    }

    #[test]
    fn test_from_results_splits() {
        let results = BatchResults::from_results(vec![Ok(1), Err(failure("b")), Ok(3)]);
        assert_eq!(results.success_count(), 2);
        assert_eq!(results.failure_count(), 1);
        assert_eq!(results.total_count(), 3);
        assert!(!results.is_complete_success());
        assert_eq!(results.failures[0].project, "b");
        assert!(results.failures[0].error.contains("crashed"));
    }

    #[test]
    fn test_success_rate_empty_is_one() {
        let results: BatchResults<u8> = BatchResults::new(vec![], vec![]);
        assert_eq!(results.success_rate(), 1.0);
    }

    #[test]
    fn test_success_rate() {
        let results = BatchResults::new(vec![1, 2, 3], vec![failure("x")]);
        assert_eq!(results.success_rate(), 0.75);
    }
}
