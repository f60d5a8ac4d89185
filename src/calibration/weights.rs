//! Weight elicitation for weight-consuming nodes.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::ahp::{priorities, AhpOptions, ComparisonMatrix, ComparisonSpec, Priorities};
use crate::config::WeightingConfig;
use crate::errors::{ModelError, Result};
use crate::model::{ModelNode, NodeWeights, QualityModel};

/// Produces child weights for every node whose evaluator reads them.
pub trait Weighter {
    fn name(&self) -> &'static str;

    fn elicit(&self, model: &QualityModel) -> ElicitationReport;
}

/// Consistency of one elicited matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyRecord {
    pub node: String,
    pub lambda_max: f64,
    pub consistency_index: f64,
    pub consistency_ratio: f64,
    pub acceptable: bool,
}

/// A node whose weights could not be elicited.
#[derive(Debug)]
pub struct WeightFailure {
    pub node: String,
    pub error: ModelError,
}

/// Outcome of elicitation. Failures are per node; other nodes still get
/// their weights.
#[derive(Debug, Default)]
pub struct ElicitationReport {
    pub weights: Vec<NodeWeights>,
    pub consistency: Vec<ConsistencyRecord>,
    pub failures: Vec<WeightFailure>,
}

impl ElicitationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fail with the first recorded failure, if any.
    pub fn into_result(mut self) -> Result<Vec<NodeWeights>> {
        if self.failures.is_empty() {
            Ok(self.weights)
        } else {
            Err(self.failures.remove(0).error)
        }
    }

    fn fail(&mut self, node: &str, error: ModelError) {
        log::warn!("Weight elicitation failed for '{}': {}", node, error);
        self.failures.push(WeightFailure {
            node: node.to_string(),
            error,
        });
    }
}

fn weighted_nodes(model: &QualityModel) -> Vec<&ModelNode> {
    let mut nodes = Vec::new();
    model.root().visit(&mut |node| {
        if node.uses_weights() && node.child_count() > 0 {
            nodes.push(node);
        }
    });
    nodes
}

/// Equal weights: 1/n for each of a node's n children.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveWeighter;

impl Weighter for NaiveWeighter {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn elicit(&self, model: &QualityModel) -> ElicitationReport {
        let weights = weighted_nodes(model)
            .into_iter()
            .map(|node| {
                let share = 1.0 / node.child_count() as f64;
                NodeWeights {
                    node: node.name().to_string(),
                    weights: node
                        .child_names()
                        .map(|child| (child.to_string(), share))
                        .collect(),
                }
            })
            .collect();

        ElicitationReport {
            weights,
            ..Default::default()
        }
    }
}

/// Weights from pairwise comparison matrices.
#[derive(Debug, Clone)]
pub struct AhpWeighter {
    comparisons: BTreeMap<String, ComparisonSpec>,
    options: AhpOptions,
    consistency_threshold: f64,
    strict: bool,
}

impl AhpWeighter {
    pub fn new(comparisons: Vec<ComparisonSpec>, config: &WeightingConfig) -> Self {
        Self {
            comparisons: comparisons
                .into_iter()
                .map(|spec| (spec.node.clone(), spec))
                .collect(),
            options: AhpOptions::from(config),
            consistency_threshold: config.consistency_threshold,
            strict: config.strict_consistency,
        }
    }

    fn elicit_node(&self, node: &ModelNode) -> Result<Option<Priorities>> {
        let Some(spec) = self.comparisons.get(node.name()) else {
            if node.child_count() == 1 {
                return Ok(None);
            }
            return Err(ModelError::malformed_matrix(
                node.name(),
                format!("no comparison matrix for {} children", node.child_count()),
            ));
        };

        let children: BTreeSet<&str> = node.child_names().collect();
        let items: BTreeSet<&str> = spec.items.iter().map(String::as_str).collect();
        if children != items {
            let missing: Vec<_> = children.difference(&items).copied().collect();
            let extra: Vec<_> = items.difference(&children).copied().collect();
            return Err(ModelError::malformed_matrix(
                node.name(),
                format!("items do not match children (missing {missing:?}, unknown {extra:?})"),
            ));
        }

        let matrix = ComparisonMatrix::from_spec(spec)?;
        let result = priorities(&matrix, &self.options)?;
        if !result.is_consistent(self.consistency_threshold) {
            if self.strict {
                return Err(ModelError::InconsistentMatrix {
                    node: node.name().to_string(),
                    ratio: result.consistency_ratio,
                    threshold: self.consistency_threshold,
                });
            }
            log::warn!(
                "'{}': consistency ratio {:.3} exceeds {:.2}",
                node.name(),
                result.consistency_ratio,
                self.consistency_threshold
            );
        }
        Ok(Some(result))
    }
}

impl Weighter for AhpWeighter {
    fn name(&self) -> &'static str {
        "ahp"
    }

    fn elicit(&self, model: &QualityModel) -> ElicitationReport {
        let mut report = ElicitationReport::default();
        let nodes = weighted_nodes(model);

        let known: BTreeSet<&str> = nodes.iter().map(|node| node.name()).collect();
        for name in self.comparisons.keys() {
            if !known.contains(name.as_str()) {
                report.fail(
                    name,
                    ModelError::UnknownNode {
                        name: name.to_string(),
                    },
                );
            }
        }

        for node in nodes {
            match self.elicit_node(node) {
                Ok(Some(result)) => {
                    report.consistency.push(ConsistencyRecord {
                        node: result.node.clone(),
                        lambda_max: result.lambda_max,
                        consistency_index: result.consistency_index,
                        consistency_ratio: result.consistency_ratio,
                        acceptable: result.is_consistent(self.consistency_threshold),
                    });
                    report.weights.push(NodeWeights {
                        node: result.node,
                        weights: result.weights,
                    });
                }
                Ok(None) => report.weights.push(NodeWeights {
                    node: node.name().to_string(),
                    weights: node
                        .child_names()
                        .map(|child| (child.to_string(), 1.0))
                        .collect(),
                }),
                Err(error) => report.fail(node.name(), error),
            }
        }
        report
    }
}
