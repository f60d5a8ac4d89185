//! Quality-model nodes.
//!
//! Every layer of the tree (Tqi down to Finding) shares one record type,
//! [`ModelNode`]. The layer is a [`NodeKind`] tag; data only some layers carry
//! lives in [`NodeDetail`]. Behaviour is delegated to the three strategy
//! objects bound in [`Strategies`], so two nodes of the same kind can score
//! differently without any subclassing.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::strategy::{EvalContext, Strategies};
use crate::errors::{ModelError, Result};

/// Allowed deviation of a complete weight set from 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Layer of a node in the quality model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Tqi,
    QualityAspect,
    ProductFactor,
    Measure,
    Diagnostic,
    Finding,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Tqi,
        NodeKind::QualityAspect,
        NodeKind::ProductFactor,
        NodeKind::Measure,
        NodeKind::Diagnostic,
        NodeKind::Finding,
    ];

    /// The only kind a node of this kind may own as children.
    pub fn child_kind(&self) -> Option<NodeKind> {
        match self {
            Self::Tqi => Some(Self::QualityAspect),
            Self::QualityAspect => Some(Self::ProductFactor),
            Self::ProductFactor => Some(Self::Measure),
            Self::Measure => Some(Self::Diagnostic),
            Self::Diagnostic => Some(Self::Finding),
            Self::Finding => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.child_kind().is_none()
    }

    /// Whether node values at this layer are utility-transformed into [0, 1].
    pub fn is_normalized_layer(&self) -> bool {
        matches!(
            self,
            Self::Tqi | Self::QualityAspect | Self::ProductFactor | Self::Measure
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tqi => "tqi",
            Self::QualityAspect => "quality-aspect",
            Self::ProductFactor => "product-factor",
            Self::Measure => "measure",
            Self::Diagnostic => "diagnostic",
            Self::Finding => "finding",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete occurrence reported by an analysis tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub file: PathBuf,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
    #[serde(default = "default_severity")]
    pub severity: i64,
    /// Raw measured quantity for metric-style findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,
}

fn default_severity() -> i64 {
    1
}

impl Finding {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize, severity: i64) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            severity,
            metric: None,
        }
    }

    pub fn metric(file: impl Into<PathBuf>, value: f64) -> Self {
        Self {
            file: file.into(),
            line: 0,
            column: 0,
            severity: default_severity(),
            metric: Some(value),
        }
    }

    /// Severity, or the measured quantity for metric findings.
    pub fn value(&self) -> f64 {
        self.metric.unwrap_or(self.severity as f64)
    }
}

/// Variant-specific data.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeDetail {
    Plain,
    Finding(Finding),
    Diagnostic { tool: String },
    Measure { positive: bool },
}

/// A node of the quality-model tree.
///
/// Children are owned exclusively and keyed by name. `weights` are keyed by
/// child name and only consulted by weight-consuming evaluators.
#[derive(Debug, Clone)]
pub struct ModelNode {
    name: String,
    kind: NodeKind,
    pub description: String,
    children: BTreeMap<String, ModelNode>,
    pub weights: BTreeMap<String, f64>,
    pub thresholds: Option<Vec<f64>>,
    detail: NodeDetail,
    strategies: Strategies,
}

impl ModelNode {
    /// Create a node bound to the default strategies of its kind.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let detail = match kind {
            NodeKind::Measure => NodeDetail::Measure { positive: false },
            NodeKind::Diagnostic => NodeDetail::Diagnostic {
                tool: String::new(),
            },
            _ => NodeDetail::Plain,
        };
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            children: BTreeMap::new(),
            weights: BTreeMap::new(),
            thresholds: None,
            detail,
            strategies: Strategies::defaults_for(kind),
        }
    }

    pub fn diagnostic(name: impl Into<String>, tool: impl Into<String>) -> Self {
        let mut node = Self::new(name, NodeKind::Diagnostic);
        node.detail = NodeDetail::Diagnostic { tool: tool.into() };
        node
    }

    pub fn measure(name: impl Into<String>, positive: bool) -> Self {
        let mut node = Self::new(name, NodeKind::Measure);
        node.detail = NodeDetail::Measure { positive };
        node
    }

    pub fn finding(name: impl Into<String>, finding: Finding) -> Self {
        let mut node = Self::new(name, NodeKind::Finding);
        node.detail = NodeDetail::Finding(finding);
        node
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_strategies(mut self, strategies: Strategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_weight(mut self, child: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(child.into(), weight);
        self
    }

    /// Builder form of [`ModelNode::add_child`].
    pub fn with_child(mut self, child: ModelNode) -> Result<Self> {
        self.add_child(child)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn detail(&self) -> &NodeDetail {
        &self.detail
    }

    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    pub fn set_strategies(&mut self, strategies: Strategies) {
        self.strategies = strategies;
    }

    /// Higher normalized value means better quality. Always true outside
    /// the Measure layer.
    pub fn is_positive(&self) -> bool {
        match self.detail {
            NodeDetail::Measure { positive } => positive,
            _ => true,
        }
    }

    pub fn tool(&self) -> Option<&str> {
        match &self.detail {
            NodeDetail::Diagnostic { tool } => Some(tool),
            _ => None,
        }
    }

    pub fn finding_data(&self) -> Option<&Finding> {
        match &self.detail {
            NodeDetail::Finding(finding) => Some(finding),
            _ => None,
        }
    }

    pub fn children(&self) -> impl Iterator<Item = &ModelNode> {
        self.children.values()
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut ModelNode> {
        self.children.values_mut()
    }

    pub fn child(&self, name: &str) -> Option<&ModelNode> {
        self.children.get(name)
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Attach a child, enforcing the layer order and sibling name uniqueness.
    pub fn add_child(&mut self, child: ModelNode) -> Result<()> {
        if self.kind.child_kind() != Some(child.kind) {
            return Err(ModelError::InvalidLinkage {
                node: self.name.clone(),
                message: format!(
                    "a {} cannot own {} '{}'",
                    self.kind, child.kind, child.name
                ),
            });
        }
        if self.children.contains_key(&child.name) {
            return Err(ModelError::DuplicateName { name: child.name });
        }
        self.children.insert(child.name.clone(), child);
        Ok(())
    }

    /// Drop all children and attach `children` instead.
    pub fn replace_children(&mut self, children: Vec<ModelNode>) -> Result<()> {
        self.children.clear();
        for child in children {
            self.add_child(child)?;
        }
        Ok(())
    }

    /// Raw aggregate passed through the bound normalizer, before the
    /// utility function is applied.
    pub fn normalized_value(&self, ctx: &EvalContext) -> Result<f64> {
        let raw = self.strategies.evaluator.evaluate(self, ctx)?;
        self.strategies.normalizer.normalize(&self.name, raw, ctx)
    }

    /// Current value of this node, recomputed from its children on every call.
    pub fn value(&self, ctx: &EvalContext) -> Result<f64> {
        let normalized = self.normalized_value(ctx)?;
        self.apply_utility(normalized)
    }

    /// Apply the bound utility function after checking threshold arity.
    pub fn apply_utility(&self, normalized: f64) -> Result<f64> {
        let utility = &self.strategies.utility;
        let expected = utility.arity();
        if expected == 0 {
            return Ok(utility.utility(normalized, &[], self.is_positive()));
        }
        let thresholds = self
            .thresholds
            .as_deref()
            .ok_or_else(|| ModelError::MissingThresholds {
                node: self.name.clone(),
                utility: utility.id().to_string(),
            })?;
        self.check_thresholds(thresholds)?;
        Ok(utility.utility(normalized, thresholds, self.is_positive()))
    }

    /// Thresholds must match the utility's arity, be finite and ascend.
    /// Anything else turns the utility ramp into a step.
    pub(crate) fn check_thresholds(&self, thresholds: &[f64]) -> Result<()> {
        self.check_threshold_arity(thresholds.len())?;
        let invalid = |message: &str| ModelError::InvalidThresholds {
            node: self.name.clone(),
            thresholds: thresholds.to_vec(),
            message: message.to_string(),
        };
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(invalid("thresholds must be finite"));
        }
        if thresholds.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(invalid("thresholds must be in ascending order"));
        }
        Ok(())
    }

    /// Weights must name existing children and be finite and non-negative.
    /// For a weight-consuming node a complete set sums to 1, a partial one
    /// never exceeds it.
    pub(crate) fn check_weights(&self, weights: &BTreeMap<String, f64>) -> Result<()> {
        for (child, &weight) in weights {
            if self.child(child).is_none() {
                return Err(ModelError::InvalidLinkage {
                    node: self.name.clone(),
                    message: format!("weight given for '{child}', which is not a child"),
                });
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(ModelError::InvalidWeight {
                    node: self.name.clone(),
                    child: child.clone(),
                    weight,
                });
            }
        }
        if !self.uses_weights() || weights.is_empty() {
            return Ok(());
        }
        let sum: f64 = weights.values().sum();
        let complete = self.child_names().all(|child| weights.contains_key(child));
        if (complete && (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE)
            || sum > 1.0 + WEIGHT_SUM_TOLERANCE
        {
            return Err(ModelError::WeightSum {
                node: self.name.clone(),
                sum,
            });
        }
        Ok(())
    }

    pub(crate) fn check_threshold_arity(&self, actual: usize) -> Result<()> {
        let utility = &self.strategies.utility;
        if utility.arity() != actual {
            return Err(ModelError::ThresholdArity {
                node: self.name.clone(),
                utility: utility.id().to_string(),
                expected: utility.arity(),
                actual,
            });
        }
        Ok(())
    }

    /// Whether the bound evaluator reads `weights`.
    pub fn uses_weights(&self) -> bool {
        self.strategies.evaluator.uses_weights()
    }

    /// Whether the bound utility function reads `thresholds`.
    pub fn uses_thresholds(&self) -> bool {
        self.strategies.utility.arity() > 0
    }

    /// Pre-order traversal of this node and all its descendants.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ModelNode)) {
        f(self);
        for child in self.children.values() {
            child.visit(f);
        }
    }

    pub fn find(&self, name: &str) -> Option<&ModelNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.values().find_map(|child| child.find(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut ModelNode> {
        if self.name == name {
            return Some(self);
        }
        self.children
            .values_mut()
            .find_map(|child| child.find_mut(name))
    }
}
