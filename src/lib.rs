//! Hierarchical software quality models.
//!
//! A model is a tree: a total quality index (TQI) over quality aspects, over
//! product factors, over measures, over diagnostics holding tool findings.
//! Every node scores itself through pluggable strategies. Measures are
//! normalized by project size and mapped into [0, 1] with thresholds derived
//! from a benchmark corpus; aggregation weights come from pairwise
//! comparison matrices (AHP) or equal shares.

pub mod calibration;
pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod io;
pub mod model;
pub mod observability;
pub mod progress;
pub mod project;
pub mod tools;

// Re-export commonly used types
pub use crate::calibration::{
    calibrate, AhpWeighter, Benchmarker, Calibration, CalibrationPlan, CalibrationReport,
    NaiveBenchmarker, NaiveWeighter, PercentileBenchmarker, Weighter,
};
pub use crate::config::QualmodelConfig;
pub use crate::errors::{ErrorCategory, ModelError, Result};
pub use crate::io::output::{EvaluationResult, NodeResult, OutputFormat};
pub use crate::model::{
    load_model, EvalContext, Evaluator, Finding, ModelDescription, ModelNode, NodeKind,
    Normalizer, QualityModel, StrategyRegistry, UtilityFunction,
};
pub use crate::project::Project;
pub use crate::tools::{LocTool, ReportTool, Tool};
