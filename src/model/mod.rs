//! The quality-model evaluation tree.
//!
//! - [`node`]: the shared node record and its layers
//! - [`strategy`]: evaluators, normalizers and utility functions
//! - [`registry`]: identifier → strategy resolution used at import
//! - [`tree`]: the whole model, lookup, calibration application, evaluation
//! - [`description`]: import/export of model descriptions

pub mod description;
pub mod node;
pub mod registry;
pub mod strategy;
pub mod tree;

pub use description::{load_model, DescriptionFormat, ModelDescription, NodeDescription};
pub use node::{Finding, ModelNode, NodeDetail, NodeKind};
pub use registry::{StrategyOverrides, StrategyRegistry};
pub use strategy::{
    BaselineNormalizer, EvalContext, Evaluator, IdentityUtility, LinearUtility, Normalizer,
    Strategies, ThreeZoneUtility, UtilityFunction, LOC_BASELINE,
};
pub use tree::{NodeWeights, QualityModel};
