//! Threshold derivation over a benchmark corpus.
//!
//! Every benchmark project gets its own copy of the model template, is run
//! through the configured tools, and contributes one normalized value per
//! measure. Each measure's column of values is then reduced to a threshold
//! array by a [`Benchmarker`].
//!
//! Failure handling:
//!
//! - a tool failure skips the whole project
//! - a numeric failure (e.g. zero lines of code) skips that measure for that
//!   project only
//! - a measure with no values left is fatal

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{BenchmarkConfig, BenchmarkStrategy, ParallelConfig};
use crate::errors::{BatchResults, FailureStage, ModelError, ProjectFailure, Result};
use crate::model::QualityModel;
use crate::observability::{self, Phase};
use crate::progress::ProgressSink;
use crate::project::Project;
use crate::tools::Tool;

const STAGE: &str = "Benchmark";

/// Reduces one measure's benchmark values to thresholds.
pub trait Benchmarker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of thresholds produced per measure.
    fn arity(&self) -> usize;

    /// `values` is non-empty and finite.
    fn thresholds(&self, measure: &str, values: &[f64]) -> Result<Vec<f64>>;
}

/// `[min, max]` of the observed values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveBenchmarker;

impl Benchmarker for NaiveBenchmarker {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn arity(&self) -> usize {
        2
    }

    fn thresholds(&self, measure: &str, values: &[f64]) -> Result<Vec<f64>> {
        let min = values.iter().copied().reduce(f64::min);
        let max = values.iter().copied().reduce(f64::max);
        match (min, max) {
            (Some(min), Some(max)) => Ok(vec![min, max]),
            _ => Err(no_data(measure, "no values to reduce")),
        }
    }
}

/// Thresholds at fixed percentiles, linearly interpolated between closest
/// ranks (the R-7 estimator used by most spreadsheet and numeric libraries).
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileBenchmarker {
    percentiles: Vec<f64>,
}

impl Default for PercentileBenchmarker {
    fn default() -> Self {
        Self::new(BenchmarkConfig::default().percentiles)
    }
}

impl PercentileBenchmarker {
    pub fn new(percentiles: Vec<f64>) -> Self {
        Self { percentiles }
    }

    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }
}

impl Benchmarker for PercentileBenchmarker {
    fn name(&self) -> &'static str {
        "percentile"
    }

    fn arity(&self) -> usize {
        self.percentiles.len()
    }

    fn thresholds(&self, measure: &str, values: &[f64]) -> Result<Vec<f64>> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        self.percentiles
            .iter()
            .map(|p| percentile(&sorted, *p).ok_or_else(|| no_data(measure, "no values to reduce")))
            .collect()
    }
}

/// R-7 percentile of an ascending slice, `None` when it is empty. `p` is in
/// [0, 100].
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = last as f64 * (p.clamp(0.0, 100.0) / 100.0);
    let lower = (rank.floor() as usize).min(last);
    let upper = (lower + 1).min(last);
    Some(sorted[lower] + (rank - lower as f64) * (sorted[upper] - sorted[lower]))
}

/// Benchmarker selected by configuration.
pub fn benchmarker_for(config: &BenchmarkConfig) -> Box<dyn Benchmarker> {
    match config.strategy {
        BenchmarkStrategy::Naive => Box::new(NaiveBenchmarker),
        BenchmarkStrategy::Percentile => {
            Box::new(PercentileBenchmarker::new(config.percentiles.clone()))
        }
    }
}

fn no_data(measure: &str, reason: impl Into<String>) -> ModelError {
    ModelError::NoBenchmarkData {
        measure: measure.to_string(),
        reason: reason.into(),
    }
}

/// Project roots inside a corpus, sorted by path.
///
/// Without a marker every immediate non-hidden sub-directory is a project.
/// With a marker, any directory below the root holding a file whose name
/// ends with the marker is a project, and nothing inside it is searched.
pub fn discover_projects(root: &Path, marker: Option<&str>) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(ModelError::Configuration(format!(
            "benchmark corpus {} is not a directory",
            root.display()
        )));
    }

    let mut projects = Vec::new();
    match marker {
        None => {
            for entry in std::fs::read_dir(root)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() && !is_hidden(&path) {
                    projects.push(path);
                }
            }
        }
        Some(marker) => {
            let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
            while let Some(entry) = walker.next() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::debug!("Skipping unreadable corpus entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_dir() || entry.depth() == 0 {
                    continue;
                }
                if is_hidden(entry.path()) {
                    walker.skip_current_dir();
                    continue;
                }
                if has_marker(entry.path(), marker) {
                    projects.push(entry.into_path());
                    walker.skip_current_dir();
                }
            }
        }
    }

    projects.sort();
    log::info!(
        "Discovered {} benchmark projects under {}",
        projects.len(),
        root.display()
    );
    Ok(projects)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn has_marker(dir: &Path, marker: &str) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries.flatten().any(|entry| {
                entry.path().is_file() && entry.file_name().to_string_lossy().ends_with(marker)
            })
        })
        .unwrap_or(false)
}

/// One benchmark project that produced data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkProject {
    pub name: String,
    pub path: PathBuf,
    pub lines_of_code: Option<f64>,
    /// Measure name → normalized value.
    pub values: BTreeMap<String, f64>,
    /// Measure name → why this project has no value for it.
    pub skipped_measures: BTreeMap<String, String>,
}

/// Result of threshold derivation.
#[derive(Debug, Clone)]
pub struct BenchmarkOutcome {
    pub thresholds: BTreeMap<String, Vec<f64>>,
    pub projects: BatchResults<BenchmarkProject>,
}

/// Check that every diagnostic's tool is among `tools`.
pub fn check_tool_coverage(template: &QualityModel, tools: &[Arc<dyn Tool>]) -> Result<()> {
    for diagnostic in template.diagnostics() {
        let Some(tool) = diagnostic.tool() else {
            continue;
        };
        if !tools.iter().any(|t| t.name() == tool) {
            return Err(ModelError::Configuration(format!(
                "diagnostic '{}' expects tool '{}', which is not configured",
                diagnostic.name(),
                tool
            )));
        }
    }
    Ok(())
}

/// Check that the benchmarker's output fits every measure's utility function.
pub fn check_threshold_arity(template: &QualityModel, benchmarker: &dyn Benchmarker) -> Result<()> {
    for measure in template.measures() {
        let utility = &measure.strategies().utility;
        if utility.arity() != benchmarker.arity() {
            return Err(ModelError::ThresholdArity {
                node: measure.name().to_string(),
                utility: utility.id().to_string(),
                expected: utility.arity(),
                actual: benchmarker.arity(),
            });
        }
    }
    Ok(())
}

/// Derive thresholds for every measure of `template` from `projects`.
pub fn derive_thresholds(
    template: &QualityModel,
    projects: &[PathBuf],
    tools: &[Arc<dyn Tool>],
    benchmarker: &dyn Benchmarker,
    parallel: &ParallelConfig,
    progress: &dyn ProgressSink,
) -> Result<BenchmarkOutcome> {
    check_tool_coverage(template, tools)?;
    check_threshold_arity(template, benchmarker)?;

    let total = projects.len();
    let done = AtomicUsize::new(0);
    progress.start_stage(STAGE);

    let analyze = |path: &PathBuf| {
        let result = analyze_project(template, path, tools);
        if let Err(failure) = &result {
            progress.warn(&format!(
                "skipping project '{}': {}",
                failure.project, failure.error
            ));
        }
        progress.report(STAGE, done.fetch_add(1, Ordering::Relaxed) + 1, total);
        result
    };

    let results: Vec<_> = if parallel.enabled && total > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallel.effective_concurrency())
            .build()
            .map_err(|e| ModelError::Configuration(format!("cannot start worker pool: {e}")))?;
        pool.install(|| projects.par_iter().map(analyze).collect())
    } else {
        projects.iter().map(analyze).collect()
    };
    progress.complete_stage(STAGE);

    let batch = BatchResults::from_results(results);
    log::info!(
        "Benchmark: {} of {} projects usable",
        batch.success_count(),
        batch.total_count()
    );

    let mut thresholds = BTreeMap::new();
    for measure in template.measures() {
        let name = measure.name();
        let values: Vec<f64> = batch
            .successes
            .iter()
            .filter_map(|project| project.values.get(name).copied())
            .collect();
        if values.is_empty() {
            return Err(no_data(
                name,
                format!(
                    "none of {} projects produced a value ({} skipped entirely)",
                    batch.total_count(),
                    batch.failure_count()
                ),
            ));
        }
        let derived = benchmarker.thresholds(name, &values)?;
        log::debug!("{}: {} values -> {:?}", name, values.len(), derived);
        thresholds.insert(name.to_string(), derived);
    }

    Ok(BenchmarkOutcome {
        thresholds,
        projects: batch,
    })
}

fn analyze_project(
    template: &QualityModel,
    path: &Path,
    tools: &[Arc<dyn Tool>],
) -> std::result::Result<BenchmarkProject, ProjectFailure> {
    let mut project = Project::from_path(path, template);
    let span = tracing::info_span!("benchmark_project", project = %project.name);
    let _guard = span.enter();
    let _phase = observability::set_phase(Phase::Benchmark);
    let _project = observability::set_current_project(path);

    let name = project.name.clone();
    let fail = |stage: FailureStage, e: ModelError| {
        log::warn!("Skipping benchmark project '{}': {}", name, e);
        ProjectFailure::new(&name, path, stage, &e)
    };

    let mut reports = BTreeMap::new();
    for tool in tools {
        let output = tool
            .analyze(path)
            .map_err(|e| fail(FailureStage::ToolRun, e))?;
        let parsed = tool
            .parse_result(&output)
            .map_err(|e| fail(FailureStage::ResultParse, e))?;
        reports.extend(parsed);
    }
    if let Err(e) = project.apply_reports(reports) {
        return Err(fail(FailureStage::Evaluation, e));
    }

    let mut values = BTreeMap::new();
    let mut skipped_measures = BTreeMap::new();
    for (measure, signal) in project.measure_signals() {
        match signal {
            Ok(value) if value.is_finite() => {
                values.insert(measure, value);
            }
            Ok(value) => {
                log::warn!("{}: measure '{}' is {}, skipped", project.name, measure, value);
                skipped_measures.insert(measure, format!("non-finite value {value}"));
            }
            Err(e) => {
                log::warn!("{}: measure '{}' skipped: {}", project.name, measure, e);
                skipped_measures.insert(measure, e.to_string());
            }
        }
    }

    log::info!(
        "Benchmarked '{}': {} measures, {} skipped",
        project.name,
        values.len(),
        skipped_measures.len()
    );
    Ok(BenchmarkProject {
        name: project.name,
        path: project.path,
        lines_of_code: project.lines_of_code,
        values,
        skipped_measures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Finding, ModelNode, NodeKind, Strategies, StrategyRegistry};
    use crate::progress::RecordingProgressSink;
    use crate::tools::{DiagnosticReport, ToolOutput};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_naive_min_max() {
        let thresholds = NaiveBenchmarker
            .thresholds("m", &[0.02, 0.05, 0.01])
            .unwrap();
        assert_eq!(thresholds, vec![0.01, 0.05]);
    }

    #[test]
    fn test_percentile_r7() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.0), Some(1.0));
        assert_eq!(percentile(&sorted, 100.0), Some(4.0));
        assert!((percentile(&sorted, 25.0).unwrap() - 1.75).abs() < 1e-12);
        assert!((percentile(&sorted, 50.0).unwrap() - 2.5).abs() < 1e-12);

        let thresholds = PercentileBenchmarker::default()
            .thresholds("m", &[5.0, 1.0, 3.0, 2.0, 4.0])
            .unwrap();
        assert_eq!(thresholds, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_percentile_single_value() {
        let thresholds = PercentileBenchmarker::default()
            .thresholds("m", &[0.3])
            .unwrap();
        assert_eq!(thresholds, vec![0.3, 0.3, 0.3]);
    }

    #[test]
    fn test_percentile_of_empty_column() {
        assert_eq!(percentile(&[], 50.0), None);
        let err = PercentileBenchmarker::default()
            .thresholds("Injection", &[])
            .unwrap_err();
        assert!(matches!(err, ModelError::NoBenchmarkData { ref measure, .. } if measure == "Injection"));
    }

    #[test]
    fn test_discover_immediate_subdirectories() {
        let dir = TempDir::new().unwrap();
        for name in ["b", "a", ".cache"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let projects = discover_projects(dir.path(), None).unwrap();
        assert_eq!(
            projects,
            vec![dir.path().join("a"), dir.path().join("b")]
        );
    }

    #[test]
    fn test_discover_with_marker_ignores_nested_roots() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("group/alpha/vendor/inner")).unwrap();
        fs::create_dir_all(root.join("beta")).unwrap();
        fs::create_dir_all(root.join("gamma")).unwrap();
        fs::write(root.join("group/alpha/setup.py"), "").unwrap();
        fs::write(root.join("group/alpha/vendor/inner/setup.py"), "").unwrap();
        fs::write(root.join("beta/my-setup.py"), "").unwrap();

        let projects = discover_projects(root, Some("setup.py")).unwrap();
        assert_eq!(projects, vec![root.join("beta"), root.join("group/alpha")]);
    }

    /// Reports findings and LOC from a fixed table keyed by project directory name.
    struct TableTool {
        rows: BTreeMap<String, (f64, usize)>,
    }

    impl Tool for TableTool {
        fn name(&self) -> &str {
            "table"
        }

        fn analyze(&self, project: &Path) -> Result<ToolOutput> {
            let key = project.file_name().unwrap().to_string_lossy().to_string();
            let (loc, findings) = self
                .rows
                .get(&key)
                .copied()
                .ok_or_else(|| ModelError::tool("table", format!("no row for {key}")))?;
            let mut report = DiagnosticReport::new("W1", "table");
            for i in 0..findings {
                report = report.with_finding(Finding::new("f.py", i + 1, 1, 1));
            }
            Ok(ToolOutput::Inline(vec![
                DiagnosticReport::new("loc", "table").with_finding(Finding::metric(project, loc)),
                report,
            ]))
        }

        fn parse_result(
            &self,
            output: &ToolOutput,
        ) -> Result<BTreeMap<String, DiagnosticReport>> {
            match output {
                ToolOutput::Inline(reports) => Ok(crate::tools::index_reports(reports.clone())),
                ToolOutput::Report(path) => Err(ModelError::tool("table", path.display().to_string())),
            }
        }
    }

    fn template() -> QualityModel {
        let measure = ModelNode::measure("Warnings", false)
            .with_child(ModelNode::diagnostic("W1", "table"))
            .unwrap();
        let factor = ModelNode::new("Pf", NodeKind::ProductFactor)
            .with_child(measure)
            .unwrap();
        let aspect = ModelNode::new("Qa", NodeKind::QualityAspect)
            .with_child(factor)
            .unwrap();
        let tqi = ModelNode::new("TQI", NodeKind::Tqi).with_child(aspect).unwrap();
        QualityModel::new("m", tqi).unwrap()
    }

    fn corpus(names: &[&str]) -> (TempDir, Vec<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let paths = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::create_dir(&path).unwrap();
                path
            })
            .collect();
        (dir, paths)
    }

    #[test]
    fn test_derive_skips_failing_project() {
        let (_dir, projects) = corpus(&["p1", "p2", "p3", "broken"]);
        let tool: Arc<dyn Tool> = Arc::new(TableTool {
            rows: [
                ("p1".to_string(), (100.0, 2)),
                ("p2".to_string(), (100.0, 5)),
                ("p3".to_string(), (100.0, 1)),
            ]
            .into_iter()
            .collect(),
        });
        let recorder = RecordingProgressSink::new();

        let outcome = derive_thresholds(
            &template(),
            &projects,
            &[tool],
            &NaiveBenchmarker,
            &ParallelConfig::default(),
            &recorder,
        )
        .unwrap();

        assert_eq!(outcome.thresholds["Warnings"], vec![0.01, 0.05]);
        assert_eq!(outcome.projects.success_count(), 3);
        assert_eq!(outcome.projects.failures[0].project, "broken");
        assert_eq!(recorder.warnings().len(), 1);
        assert_eq!(recorder.completed_stages(), vec![STAGE]);
    }

    #[test]
    fn test_zero_loc_skips_measure_for_that_project() {
        let (_dir, projects) = corpus(&["empty", "full"]);
        let tool: Arc<dyn Tool> = Arc::new(TableTool {
            rows: [
                ("empty".to_string(), (0.0, 0)),
                ("full".to_string(), (50.0, 1)),
            ]
            .into_iter()
            .collect(),
        });

        let outcome = derive_thresholds(
            &template(),
            &projects,
            &[tool],
            &NaiveBenchmarker,
            &ParallelConfig::sequential(),
            &RecordingProgressSink::new(),
        )
        .unwrap();

        assert_eq!(outcome.thresholds["Warnings"], vec![0.02, 0.02]);
        let empty = outcome
            .projects
            .successes
            .iter()
            .find(|p| p.name == "empty")
            .unwrap();
        assert!(empty.skipped_measures.contains_key("Warnings"));
    }

    #[test]
    fn test_no_usable_projects_is_fatal() {
        let (_dir, projects) = corpus(&["a"]);
        let tool: Arc<dyn Tool> = Arc::new(TableTool {
            rows: BTreeMap::new(),
        });
        let err = derive_thresholds(
            &template(),
            &projects,
            &[tool],
            &NaiveBenchmarker,
            &ParallelConfig::default(),
            &RecordingProgressSink::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::NoBenchmarkData { ref measure, .. } if measure == "Warnings"));
    }

    #[test]
    fn test_unconfigured_tool_is_fatal_before_running() {
        let recorder = RecordingProgressSink::new();
        let err = derive_thresholds(
            &template(),
            &[PathBuf::from("/nonexistent")],
            &[],
            &NaiveBenchmarker,
            &ParallelConfig::default(),
            &recorder,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_arity_mismatch_is_fatal() {
        let mut model = template();
        let mut strategies = Strategies::defaults_for(NodeKind::Measure);
        strategies.utility = StrategyRegistry::global()
            .utility("three-zone", "Warnings")
            .unwrap();
        model.find_mut("Warnings").unwrap().set_strategies(strategies);

        assert!(check_threshold_arity(&model, &NaiveBenchmarker).is_err());
        assert!(check_threshold_arity(&model, &PercentileBenchmarker::default()).is_ok());
    }
}
