//! Strategy objects bound to model nodes.
//!
//! A node's value is `utility(normalize(evaluate(node)))`:
//!
//! - [`Evaluator`] aggregates the node's children (or, for findings, its own
//!   data) into a raw scalar.
//! - [`Normalizer`] divides that scalar by a project baseline such as
//!   lines of code.
//! - [`UtilityFunction`] maps the normalized value onto [0, 1] using
//!   calibration thresholds and the node's polarity.
//!
//! Strategies are stateless apart from their configuration and are shared
//! between cloned trees through `Arc`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::node::{ModelNode, NodeKind};
use crate::errors::{ModelError, Result};

/// Name of the lines-of-code baseline.
pub const LOC_BASELINE: &str = "loc";

/// Named baseline values available while evaluating one project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalContext {
    baselines: BTreeMap<String, f64>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set_baseline(name, value);
        self
    }

    pub fn set_baseline(&mut self, name: impl Into<String>, value: f64) {
        self.baselines.insert(name.into(), value);
    }

    pub fn baseline(&self, name: &str) -> Option<f64> {
        self.baselines.get(name).copied()
    }
}

/// Aggregates a node's state into a raw value.
pub trait Evaluator: Send + Sync {
    fn id(&self) -> &str;

    fn evaluate(&self, node: &ModelNode, ctx: &EvalContext) -> Result<f64>;

    /// Structural requirements checked once at import.
    fn validate(&self, _node: &ModelNode) -> Result<()> {
        Ok(())
    }

    fn uses_weights(&self) -> bool {
        false
    }
}

/// Divides a raw value by a project baseline.
pub trait Normalizer: Send + Sync {
    fn id(&self) -> &str;

    fn normalize(&self, node: &str, raw: f64, ctx: &EvalContext) -> Result<f64>;
}

/// Maps a normalized value into [0, 1].
pub trait UtilityFunction: Send + Sync {
    fn id(&self) -> &str;

    /// Number of thresholds this function reads.
    fn arity(&self) -> usize;

    /// `thresholds.len()` equals [`UtilityFunction::arity`]; callers check.
    fn utility(&self, value: f64, thresholds: &[f64], positive: bool) -> f64;
}

/// The three strategies bound to one node.
#[derive(Clone)]
pub struct Strategies {
    pub evaluator: Arc<dyn Evaluator>,
    pub normalizer: Arc<dyn Normalizer>,
    pub utility: Arc<dyn UtilityFunction>,
}

impl Strategies {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        normalizer: Arc<dyn Normalizer>,
        utility: Arc<dyn UtilityFunction>,
    ) -> Self {
        Self {
            evaluator,
            normalizer,
            utility,
        }
    }

    pub fn defaults_for(kind: NodeKind) -> Self {
        let evaluator: Arc<dyn Evaluator> = match kind {
            NodeKind::Finding => Arc::new(FindingEvaluator),
            NodeKind::Diagnostic => Arc::new(CountEvaluator),
            NodeKind::Measure => Arc::new(SumEvaluator),
            NodeKind::ProductFactor => Arc::new(SingleChildEvaluator),
            NodeKind::QualityAspect | NodeKind::Tqi => Arc::new(WeightedSumEvaluator),
        };
        let (normalizer, utility): (Arc<dyn Normalizer>, Arc<dyn UtilityFunction>) = match kind {
            NodeKind::Measure => (
                Arc::new(BaselineNormalizer::loc()),
                Arc::new(LinearUtility),
            ),
            _ => (Arc::new(NoNormalizer), Arc::new(IdentityUtility)),
        };
        Self::new(evaluator, normalizer, utility)
    }
}

impl fmt::Debug for Strategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategies")
            .field("evaluator", &self.evaluator.id())
            .field("normalizer", &self.normalizer.id())
            .field("utility", &self.utility.id())
            .finish()
    }
}

// ============================================================================
// Evaluators
// ============================================================================

/// Finding value: severity, or the raw metric for metric findings.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindingEvaluator;

impl Evaluator for FindingEvaluator {
    fn id(&self) -> &str {
        "finding"
    }

    fn evaluate(&self, node: &ModelNode, _ctx: &EvalContext) -> Result<f64> {
        node.finding_data()
            .map(|finding| finding.value())
            .ok_or_else(|| ModelError::InvalidStructure {
                node: node.name().to_string(),
                evaluator: self.id().to_string(),
                message: "node carries no finding data".to_string(),
            })
    }
}

/// Number of children. Default for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountEvaluator;

impl Evaluator for CountEvaluator {
    fn id(&self) -> &str {
        "count"
    }

    fn evaluate(&self, node: &ModelNode, _ctx: &EvalContext) -> Result<f64> {
        Ok(node.child_count() as f64)
    }
}

/// Sum of child values, used for severity-weighted diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeveritySumEvaluator;

impl Evaluator for SeveritySumEvaluator {
    fn id(&self) -> &str {
        "severity-sum"
    }

    fn evaluate(&self, node: &ModelNode, ctx: &EvalContext) -> Result<f64> {
        sum_children(node, ctx)
    }
}

/// Sum of child values. Default for measures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumEvaluator;

impl Evaluator for SumEvaluator {
    fn id(&self) -> &str {
        "sum"
    }

    fn evaluate(&self, node: &ModelNode, ctx: &EvalContext) -> Result<f64> {
        sum_children(node, ctx)
    }
}

fn sum_children(node: &ModelNode, ctx: &EvalContext) -> Result<f64> {
    node.children()
        .map(|child| child.value(ctx))
        .sum::<Result<f64>>()
}

/// Passes through the value of the only child. Default for product factors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleChildEvaluator;

impl Evaluator for SingleChildEvaluator {
    fn id(&self) -> &str {
        "single-child"
    }

    fn evaluate(&self, node: &ModelNode, ctx: &EvalContext) -> Result<f64> {
        self.validate(node)?;
        match node.children().next() {
            Some(child) => child.value(ctx),
            None => Ok(0.0),
        }
    }

    fn validate(&self, node: &ModelNode) -> Result<()> {
        if node.child_count() != 1 {
            return Err(ModelError::InvalidStructure {
                node: node.name().to_string(),
                evaluator: self.id().to_string(),
                message: format!("expected exactly one child, found {}", node.child_count()),
            });
        }
        Ok(())
    }
}

/// `Σ child.value × weights[child.name]`. Default for quality aspects and the
/// TQI. A present child without a weight is an error, never a silent zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSumEvaluator;

impl Evaluator for WeightedSumEvaluator {
    fn id(&self) -> &str {
        "weighted-sum"
    }

    fn evaluate(&self, node: &ModelNode, ctx: &EvalContext) -> Result<f64> {
        let mut total = 0.0;
        for child in node.children() {
            let weight =
                node.weights
                    .get(child.name())
                    .ok_or_else(|| ModelError::MissingWeight {
                        node: node.name().to_string(),
                        child: child.name().to_string(),
                    })?;
            total += child.value(ctx)? * weight;
        }
        Ok(total)
    }

    fn uses_weights(&self) -> bool {
        true
    }
}

/// Unweighted mean of child values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanEvaluator;

impl Evaluator for MeanEvaluator {
    fn id(&self) -> &str {
        "mean"
    }

    fn evaluate(&self, node: &ModelNode, ctx: &EvalContext) -> Result<f64> {
        self.validate(node)?;
        Ok(sum_children(node, ctx)? / node.child_count() as f64)
    }

    fn validate(&self, node: &ModelNode) -> Result<()> {
        if node.child_count() == 0 {
            return Err(ModelError::InvalidStructure {
                node: node.name().to_string(),
                evaluator: self.id().to_string(),
                message: "mean of zero children".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Normalizers
// ============================================================================

/// Identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNormalizer;

impl Normalizer for NoNormalizer {
    fn id(&self) -> &str {
        "none"
    }

    fn normalize(&self, _node: &str, raw: f64, _ctx: &EvalContext) -> Result<f64> {
        Ok(raw)
    }
}

/// `raw / (baseline / scale)`; a zero baseline is a reported error.
#[derive(Debug, Clone)]
pub struct BaselineNormalizer {
    id: &'static str,
    baseline: String,
    scale: f64,
}

impl BaselineNormalizer {
    pub fn new(id: &'static str, baseline: impl Into<String>, scale: f64) -> Self {
        Self {
            id,
            baseline: baseline.into(),
            scale,
        }
    }

    /// Findings per line of code.
    pub fn loc() -> Self {
        Self::new("loc", LOC_BASELINE, 1.0)
    }

    /// Findings per thousand lines of code.
    pub fn kloc() -> Self {
        Self::new("kloc", LOC_BASELINE, 1000.0)
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }
}

impl Normalizer for BaselineNormalizer {
    fn id(&self) -> &str {
        self.id
    }

    fn normalize(&self, node: &str, raw: f64, ctx: &EvalContext) -> Result<f64> {
        let baseline = ctx
            .baseline(&self.baseline)
            .ok_or_else(|| ModelError::MissingBaseline {
                node: node.to_string(),
                normalizer: self.id.to_string(),
                baseline: self.baseline.clone(),
            })?;
        let divisor = baseline / self.scale;
        if divisor == 0.0 || !divisor.is_finite() {
            return Err(ModelError::DivisionByZero {
                node: node.to_string(),
                baseline: self.baseline.clone(),
            });
        }
        Ok(raw / divisor)
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Returns the value unchanged; used by raw-count layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityUtility;

impl UtilityFunction for IdentityUtility {
    fn id(&self) -> &str {
        "identity"
    }

    fn arity(&self) -> usize {
        0
    }

    fn utility(&self, value: f64, _thresholds: &[f64], _positive: bool) -> f64 {
        value
    }
}

/// Linear interpolation between `[low, high]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearUtility;

impl UtilityFunction for LinearUtility {
    fn id(&self) -> &str {
        "linear"
    }

    fn arity(&self) -> usize {
        2
    }

    fn utility(&self, value: f64, thresholds: &[f64], positive: bool) -> f64 {
        let ascending = ramp(value, thresholds[0], thresholds[1]);
        orient(ascending, positive)
    }
}

/// Two linear zones: `[t0, t1]` covers [0, 0.5] and `[t1, t2]` covers
/// [0.5, 1]. Saturates outside `[t0, t2]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeZoneUtility;

impl UtilityFunction for ThreeZoneUtility {
    fn id(&self) -> &str {
        "three-zone"
    }

    fn arity(&self) -> usize {
        3
    }

    fn utility(&self, value: f64, thresholds: &[f64], positive: bool) -> f64 {
        let (low, mid, high) = (thresholds[0], thresholds[1], thresholds[2]);
        let ascending = if value <= low {
            0.0
        } else if value >= high {
            1.0
        } else if value <= mid {
            0.5 * ramp(value, low, mid)
        } else {
            0.5 + 0.5 * ramp(value, mid, high)
        };
        orient(ascending, positive)
    }
}

/// 0 at or below `low`, 1 at or above `high`, linear in between. A collapsed
/// interval is a step at `low`.
fn ramp(value: f64, low: f64, high: f64) -> f64 {
    if value <= low {
        0.0
    } else if value >= high {
        1.0
    } else {
        ((value - low) / (high - low)).clamp(0.0, 1.0)
    }
}

fn orient(ascending: f64, positive: bool) -> f64 {
    if positive {
        ascending
    } else {
        1.0 - ascending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::Finding;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_linear_utility_positive() {
        let u = LinearUtility;
        let t = [0.1, 0.3];
        assert_close(u.utility(0.0, &t, true), 0.0);
        assert_close(u.utility(0.1, &t, true), 0.0);
        assert_close(u.utility(0.2, &t, true), 0.5);
        assert_close(u.utility(0.3, &t, true), 1.0);
        assert_close(u.utility(5.0, &t, true), 1.0);
    }

    #[test]
    fn test_linear_utility_negative_mirrors() {
        let u = LinearUtility;
        let t = [0.1, 0.3];
        assert_close(u.utility(0.0, &t, false), 1.0);
        assert_close(u.utility(0.2, &t, false), 0.5);
        assert_close(u.utility(0.35, &t, false), 0.0);
    }

    #[test]
    fn test_linear_utility_collapsed_interval() {
        let u = LinearUtility;
        let t = [0.2, 0.2];
        assert_close(u.utility(0.1, &t, true), 0.0);
        assert_close(u.utility(0.3, &t, true), 1.0);
    }

    #[test]
    fn test_three_zone_utility_zones() {
        let u = ThreeZoneUtility;
        let t = [1.0, 2.0, 4.0];
        assert_close(u.utility(0.0, &t, true), 0.0);
        assert_close(u.utility(1.0, &t, true), 0.0);
        assert_close(u.utility(1.5, &t, true), 0.25);
        assert_close(u.utility(2.0, &t, true), 0.5);
        assert_close(u.utility(3.0, &t, true), 0.75);
        assert_close(u.utility(4.0, &t, true), 1.0);
        assert_close(u.utility(9.0, &t, true), 1.0);

        assert_close(u.utility(1.5, &t, false), 0.75);
        assert_close(u.utility(9.0, &t, false), 0.0);
    }

    #[test]
    fn test_baseline_normalizer_divides() {
        let ctx = EvalContext::new().with_baseline(LOC_BASELINE, 200.0);
        assert_close(BaselineNormalizer::loc().normalize("m", 4.0, &ctx).unwrap(), 0.02);
        assert_close(BaselineNormalizer::kloc().normalize("m", 4.0, &ctx).unwrap(), 20.0);
    }

    #[test]
    fn test_baseline_normalizer_zero_is_error() {
        let ctx = EvalContext::new().with_baseline(LOC_BASELINE, 0.0);
        let err = BaselineNormalizer::loc()
            .normalize("Complexity", 4.0, &ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::DivisionByZero { ref node, .. } if node == "Complexity"
        ));
    }

    #[test]
    fn test_baseline_normalizer_missing_baseline() {
        let err = BaselineNormalizer::loc()
            .normalize("Complexity", 4.0, &EvalContext::new())
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingBaseline { .. }));
    }

    #[test]
    fn test_weighted_sum_missing_weight_fails() {
        let mut tqi = ModelNode::new("TQI", NodeKind::Tqi);
        tqi.add_child(ModelNode::new("Security", NodeKind::QualityAspect))
            .unwrap();

        let err = tqi.value(&EvalContext::new()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::MissingWeight { ref node, ref child } if node == "TQI" && child == "Security"
        ));
    }

    #[test]
    fn test_single_child_rejects_two_measures() {
        let mut factor = ModelNode::new("Pf", NodeKind::ProductFactor);
        factor.add_child(ModelNode::measure("m1", false)).unwrap();
        factor.add_child(ModelNode::measure("m2", false)).unwrap();

        assert!(SingleChildEvaluator.validate(&factor).is_err());
    }

    #[test]
    fn test_severity_sum_evaluator() {
        let mut diag = ModelNode::diagnostic("W0612", "pylint");
        diag.replace_children(vec![
            ModelNode::finding("a", Finding::new("x.py", 1, 1, 3)),
            ModelNode::finding("b", Finding::new("x.py", 9, 1, 4)),
        ])
        .unwrap();

        let value = SeveritySumEvaluator.evaluate(&diag, &EvalContext::new()).unwrap();
        assert_close(value, 7.0);
    }

    #[test]
    fn test_mean_evaluator_requires_children() {
        let aspect = ModelNode::new("Security", NodeKind::QualityAspect);
        assert!(MeanEvaluator.validate(&aspect).is_err());
    }
}
