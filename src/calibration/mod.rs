//! Model calibration: thresholds from a benchmark corpus, weights from
//! comparison matrices (or equal shares).
//!
//! - [`benchmark`]: per-measure threshold derivation
//! - [`ahp`]: comparison matrices and priority vectors
//! - [`weights`]: weight elicitation strategies

pub mod ahp;
pub mod benchmark;
pub mod weights;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use ahp::{AhpOptions, ComparisonMatrix, ComparisonSpec, Judgment, Priorities};
pub use benchmark::{
    benchmarker_for, derive_thresholds, discover_projects, BenchmarkOutcome, BenchmarkProject,
    Benchmarker, NaiveBenchmarker, PercentileBenchmarker,
};
pub use weights::{AhpWeighter, ConsistencyRecord, ElicitationReport, NaiveWeighter, Weighter};

use crate::config::ParallelConfig;
use crate::errors::{FailureStage, Result};
use crate::model::{NodeWeights, QualityModel};
use crate::progress::ProgressSink;
use crate::tools::Tool;

/// Everything `calibrate` needs besides the template.
pub struct CalibrationPlan<'a> {
    pub projects: &'a [PathBuf],
    pub tools: &'a [Arc<dyn Tool>],
    pub benchmarker: &'a dyn Benchmarker,
    pub weighter: &'a dyn Weighter,
    pub parallel: &'a ParallelConfig,
    pub progress: &'a dyn ProgressSink,
}

/// How one benchmark project was used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectOutcome {
    pub name: String,
    pub path: PathBuf,
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_of_code: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<FailureStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub skipped_measures: BTreeMap<String, String>,
}

/// What a calibration run did, for the user.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub benchmarker: String,
    pub weighter: String,
    pub projects: Vec<ProjectOutcome>,
    pub thresholds: BTreeMap<String, Vec<f64>>,
    pub weights: Vec<NodeWeights>,
    pub consistency: Vec<ConsistencyRecord>,
}

impl CalibrationReport {
    pub fn used_projects(&self) -> usize {
        self.projects.iter().filter(|p| p.used).count()
    }
}

/// A calibrated model plus the report of how it was calibrated.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub model: QualityModel,
    pub report: CalibrationReport,
}

/// Derive thresholds and weights for a copy of `template`.
///
/// The result satisfies [`QualityModel::validate_calibration`]; any
/// weight-elicitation failure is fatal after all nodes were attempted.
pub fn calibrate(template: &QualityModel, plan: &CalibrationPlan<'_>) -> Result<Calibration> {
    let mut model = template.instantiate();

    let outcome = derive_thresholds(
        template,
        plan.projects,
        plan.tools,
        plan.benchmarker,
        plan.parallel,
        plan.progress,
    )?;
    model.apply_thresholds(&outcome.thresholds)?;

    let elicitation = plan.weighter.elicit(&model);
    let consistency = elicitation.consistency.clone();
    for failure in &elicitation.failures {
        plan.progress
            .warn(&format!("no weights for '{}': {}", failure.node, failure.error));
    }
    let weights = elicitation.into_result()?;
    model.apply_weights(&weights)?;

    model.validate_calibration()?;
    log::info!(
        "Calibrated '{}' from {} projects",
        model.name,
        outcome.projects.success_count()
    );

    let report = CalibrationReport {
        model: model.name.clone(),
        generated_at: Utc::now(),
        benchmarker: plan.benchmarker.name().to_string(),
        weighter: plan.weighter.name().to_string(),
        projects: project_outcomes(&outcome),
        thresholds: outcome.thresholds,
        weights,
        consistency,
    };
    Ok(Calibration { model, report })
}

fn project_outcomes(outcome: &BenchmarkOutcome) -> Vec<ProjectOutcome> {
    let used = outcome.projects.successes.iter().map(|p| ProjectOutcome {
        name: p.name.clone(),
        path: p.path.clone(),
        used: true,
        lines_of_code: p.lines_of_code,
        failed_stage: None,
        reason: None,
        skipped_measures: p.skipped_measures.clone(),
    });
    let skipped = outcome.projects.failures.iter().map(|f| ProjectOutcome {
        name: f.project.clone(),
        path: f.path.clone(),
        used: false,
        lines_of_code: None,
        failed_stage: Some(f.stage),
        reason: Some(f.error.clone()),
        skipped_measures: BTreeMap::new(),
    });

    let mut outcomes: Vec<_> = used.chain(skipped).collect();
    outcomes.sort_by(|a, b| a.path.cmp(&b.path));
    outcomes
}
