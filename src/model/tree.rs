//! The quality model: a named tree rooted at the TQI node.

use std::collections::{BTreeMap, BTreeSet};

use super::node::{ModelNode, NodeKind};
use super::strategy::EvalContext;
use crate::errors::{ModelError, Result};

/// A complete quality model.
///
/// Built once from a description and cloned per project; `Clone` is a deep
/// structural copy (children, weights and thresholds are owned), so a
/// project's tree never shares mutable state with the template.
#[derive(Debug, Clone)]
pub struct QualityModel {
    pub name: String,
    pub description: String,
    root: ModelNode,
}

/// Child weights elicited for one node.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeWeights {
    pub node: String,
    pub weights: BTreeMap<String, f64>,
}

impl QualityModel {
    /// Wrap a root node, checking that it is a TQI with globally unique names.
    pub fn new(name: impl Into<String>, root: ModelNode) -> Result<Self> {
        if root.kind() != NodeKind::Tqi {
            return Err(ModelError::InvalidLinkage {
                node: root.name().to_string(),
                message: format!("model root must be a tqi, found {}", root.kind()),
            });
        }
        let model = Self {
            name: name.into(),
            description: String::new(),
            root,
        };
        model.check_unique_names()?;
        Ok(model)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn root(&self) -> &ModelNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ModelNode {
        &mut self.root
    }

    /// An independent copy for one project.
    pub fn instantiate(&self) -> Self {
        self.clone()
    }

    fn check_unique_names(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        let mut duplicate = None;
        self.root.visit(&mut |node| {
            if !seen.insert(node.name()) && duplicate.is_none() {
                duplicate = Some(node.name().to_string());
            }
        });
        match duplicate {
            Some(name) => Err(ModelError::DuplicateName { name }),
            None => Ok(()),
        }
    }

    pub fn find(&self, name: &str) -> Option<&ModelNode> {
        self.root.find(name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut ModelNode> {
        self.root.find_mut(name)
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut ModelNode> {
        self.root
            .find_mut(name)
            .ok_or_else(|| ModelError::UnknownNode {
                name: name.to_string(),
            })
    }

    /// All nodes of one layer, in tree order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&ModelNode> {
        let mut nodes = Vec::new();
        self.root.visit(&mut |node| {
            if node.kind() == kind {
                nodes.push(node);
            }
        });
        nodes
    }

    pub fn quality_aspects(&self) -> Vec<&ModelNode> {
        self.nodes_of_kind(NodeKind::QualityAspect)
    }

    pub fn product_factors(&self) -> Vec<&ModelNode> {
        self.nodes_of_kind(NodeKind::ProductFactor)
    }

    pub fn measures(&self) -> Vec<&ModelNode> {
        self.nodes_of_kind(NodeKind::Measure)
    }

    pub fn diagnostics(&self) -> Vec<&ModelNode> {
        self.nodes_of_kind(NodeKind::Diagnostic)
    }

    /// Names of every tool some diagnostic expects results from.
    pub fn tool_names(&self) -> BTreeSet<String> {
        self.diagnostics()
            .into_iter()
            .filter_map(|node| node.tool())
            .filter(|tool| !tool.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Replace a diagnostic's findings. Returns `false` if the model has no
    /// diagnostic by that name.
    pub fn attach_findings(&mut self, diagnostic: &str, findings: Vec<ModelNode>) -> Result<bool> {
        match self.root.find_mut(diagnostic) {
            Some(node) if node.kind() == NodeKind::Diagnostic => {
                node.replace_children(findings)?;
                Ok(true)
            }
            Some(node) => Err(ModelError::InvalidLinkage {
                node: node.name().to_string(),
                message: "findings can only be attached to diagnostics".to_string(),
            }),
            None => Ok(false),
        }
    }

    /// Assign thresholds to measures by name. Arity is checked against each
    /// measure's utility function.
    pub fn apply_thresholds(&mut self, thresholds: &BTreeMap<String, Vec<f64>>) -> Result<()> {
        for (name, values) in thresholds {
            let node = self.require_mut(name)?;
            node.check_thresholds(values)?;
            node.thresholds = Some(values.clone());
        }
        Ok(())
    }

    /// Assign elicited child weights. Every weighted child must exist and
    /// the weights must be valid for that node.
    pub fn apply_weights(&mut self, weights: &[NodeWeights]) -> Result<()> {
        for entry in weights {
            let node = self.require_mut(&entry.node)?;
            node.check_weights(&entry.weights)?;
            node.weights = entry.weights.clone();
        }
        Ok(())
    }

    /// Check structural requirements of every bound evaluator.
    pub fn validate_structure(&self) -> Result<()> {
        let mut first_error = None;
        self.root.visit(&mut |node| {
            if first_error.is_none() {
                if let Err(err) = node.strategies().evaluator.validate(node) {
                    first_error = Some(err);
                }
            }
        });
        first_error.map_or(Ok(()), Err)
    }

    /// Check that the model is ready for evaluation: every node whose utility
    /// function reads thresholds has them with the right arity, and every
    /// weight-consuming node has a weight for each child.
    pub fn validate_calibration(&self) -> Result<()> {
        let mut first_error = None;
        self.root.visit(&mut |node| {
            if first_error.is_some() {
                return;
            }
            if let Err(err) = check_calibrated(node) {
                first_error = Some(err);
            }
        });
        first_error.map_or(Ok(()), Err)
    }

    /// Value of the TQI.
    pub fn evaluate(&self, ctx: &EvalContext) -> Result<f64> {
        self.root.value(ctx)
    }

    /// Normalized (pre-utility) value of every measure. Each entry fails or
    /// succeeds independently.
    pub fn measure_signals(&self, ctx: &EvalContext) -> BTreeMap<String, Result<f64>> {
        self.measures()
            .into_iter()
            .map(|measure| (measure.name().to_string(), measure.normalized_value(ctx)))
            .collect()
    }
}

fn check_calibrated(node: &ModelNode) -> Result<()> {
    if node.uses_thresholds() {
        match &node.thresholds {
            Some(values) => node.check_thresholds(values)?,
            None => {
                return Err(ModelError::MissingThresholds {
                    node: node.name().to_string(),
                    utility: node.strategies().utility.id().to_string(),
                })
            }
        }
    }
    if node.uses_weights() {
        if let Some(child) = node
            .child_names()
            .find(|child| !node.weights.contains_key(*child))
        {
            return Err(ModelError::MissingWeight {
                node: node.name().to_string(),
                child: child.to_string(),
            });
        }
    }
    node.check_weights(&node.weights)
}
