//! Quality-model descriptions.
//!
//! A description lists the nodes of each layer and links parents to children
//! by name:
//!
//! ```yaml
//! name: Python security
//! tqi:
//!   name: TQI
//!   children: [Security]
//!   weights: { Security: 1.0 }
//! quality_aspects:
//!   - name: Security
//!     children: [Injection]
//! product_factors:
//!   - name: Injection
//!     children: [Injection Findings]
//! measures:
//!   - name: Injection Findings
//!     positive: false
//!     utility_function: three-zone
//!     children: [B608]
//! diagnostics:
//!   - name: B608
//!     tool: bandit
//! ```
//!
//! Import rejects duplicate names (across all layers), dangling references,
//! children in the wrong layer, nodes with two parents, nodes unreachable
//! from the TQI and unknown strategy identifiers, before anything is
//! evaluated. A calibrated model is written back in the same format.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::node::{ModelNode, NodeDetail, NodeKind};
use super::registry::{StrategyOverrides, StrategyRegistry};
use super::strategy::Strategies;
use super::tree::QualityModel;
use crate::errors::{ModelError, Result};

/// Serialized form of a quality model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub tqi: NodeDescription,
    #[serde(default)]
    pub quality_aspects: Vec<NodeDescription>,
    #[serde(default)]
    pub product_factors: Vec<NodeDescription>,
    #[serde(default)]
    pub measures: Vec<NodeDescription>,
    #[serde(default)]
    pub diagnostics: Vec<NodeDescription>,
}

/// One node entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utility_function: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Vec<f64>>,
    /// Measures only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive: Option<bool>,
    /// Diagnostics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl NodeDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn overrides(&self) -> StrategyOverrides<'_> {
        StrategyOverrides {
            evaluator: self.evaluator.as_deref(),
            normalizer: self.normalizer.as_deref(),
            utility: self.utility_function.as_deref(),
        }
    }
}

/// Serialization format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionFormat {
    Json,
    Yaml,
}

impl DescriptionFormat {
    /// JSON for `.json`, YAML otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl ModelDescription {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| ModelError::import(e.to_string()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| ModelError::import(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ModelError::import_with_path(e.to_string(), path))?;
        let parsed = match DescriptionFormat::from_path(path) {
            DescriptionFormat::Json => serde_json::from_str(&contents).map_err(|e| e.to_string()),
            DescriptionFormat::Yaml => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ModelError::import_with_path(message, path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match DescriptionFormat::from_path(path) {
            DescriptionFormat::Json => serde_json::to_string_pretty(self)?,
            DescriptionFormat::Yaml => serde_yaml::to_string(self)?,
        };
        fs::write(path, contents)?;
        log::debug!("Wrote quality model '{}' to {}", self.name, path.display());
        Ok(())
    }

    fn entries(&self) -> impl Iterator<Item = (NodeKind, &NodeDescription)> {
        std::iter::once((NodeKind::Tqi, &self.tqi))
            .chain(self.quality_aspects.iter().map(|n| (NodeKind::QualityAspect, n)))
            .chain(self.product_factors.iter().map(|n| (NodeKind::ProductFactor, n)))
            .chain(self.measures.iter().map(|n| (NodeKind::Measure, n)))
            .chain(self.diagnostics.iter().map(|n| (NodeKind::Diagnostic, n)))
    }

    /// Build the model with the built-in strategy registry.
    pub fn build(&self) -> Result<QualityModel> {
        self.build_with(StrategyRegistry::global())
    }

    pub fn build_with(&self, registry: &StrategyRegistry) -> Result<QualityModel> {
        let index = self.index()?;
        check_linkage(&index)?;

        let root = build_node(&self.tqi.name, &index, registry)?;
        let model = QualityModel::new(self.name.clone(), root)?
            .with_description(self.description.clone());
        model.validate_structure()?;
        log::debug!(
            "Imported quality model '{}' ({} measures, {} diagnostics)",
            model.name,
            model.measures().len(),
            model.diagnostics().len()
        );
        Ok(model)
    }

    fn index(&self) -> Result<HashMap<&str, (NodeKind, &NodeDescription)>> {
        let mut index = HashMap::new();
        for (kind, entry) in self.entries() {
            if entry.name.trim().is_empty() {
                return Err(ModelError::import(format!("a {kind} has an empty name")));
            }
            if index.insert(entry.name.as_str(), (kind, entry)).is_some() {
                return Err(ModelError::DuplicateName {
                    name: entry.name.clone(),
                });
            }
            check_variant_fields(kind, entry)?;
        }
        Ok(index)
    }

    /// Describe an existing model, including any calibrated weights and
    /// thresholds. Findings are not part of a description.
    pub fn from_model(model: &QualityModel) -> Self {
        let mut description = Self {
            name: model.name.clone(),
            description: model.description.clone(),
            tqi: describe_node(model.root()),
            quality_aspects: Vec::new(),
            product_factors: Vec::new(),
            measures: Vec::new(),
            diagnostics: Vec::new(),
        };
        model.root().visit(&mut |node| {
            let layer = match node.kind() {
                NodeKind::QualityAspect => &mut description.quality_aspects,
                NodeKind::ProductFactor => &mut description.product_factors,
                NodeKind::Measure => &mut description.measures,
                NodeKind::Diagnostic => &mut description.diagnostics,
                NodeKind::Tqi | NodeKind::Finding => return,
            };
            layer.push(describe_node(node));
        });
        description
    }
}

/// Read and import a description file.
pub fn load_model(path: &Path) -> Result<QualityModel> {
    ModelDescription::load(path)?.build().map_err(|err| match err {
        ModelError::Import { message, path: None } => {
            ModelError::import_with_path(message, path)
        }
        other => other,
    })
}

fn check_variant_fields(kind: NodeKind, entry: &NodeDescription) -> Result<()> {
    if entry.positive.is_some() && kind != NodeKind::Measure {
        return Err(ModelError::import(format!(
            "'positive' is only valid on measures (found on {kind} '{}')",
            entry.name
        )));
    }
    match (kind, &entry.tool) {
        (NodeKind::Diagnostic, Some(tool)) if !tool.trim().is_empty() => Ok(()),
        (NodeKind::Diagnostic, _) => Err(ModelError::import(format!(
            "diagnostic '{}' does not name a tool",
            entry.name
        ))),
        (_, Some(_)) => Err(ModelError::import(format!(
            "'tool' is only valid on diagnostics (found on {kind} '{}')",
            entry.name
        ))),
        (_, None) => Ok(()),
    }
}

fn check_linkage(index: &HashMap<&str, (NodeKind, &NodeDescription)>) -> Result<()> {
    let mut parents: HashMap<&str, &str> = HashMap::new();

    for (parent_kind, parent) in index.values() {
        for child in &parent.children {
            let (child_kind, _) =
                index
                    .get(child.as_str())
                    .ok_or_else(|| ModelError::DanglingReference {
                        parent: parent.name.clone(),
                        child: child.clone(),
                    })?;
            if parent_kind.child_kind() != Some(*child_kind) {
                return Err(ModelError::InvalidLinkage {
                    node: parent.name.clone(),
                    message: format!("a {parent_kind} cannot own {child_kind} '{child}'"),
                });
            }
            if let Some(previous) = parents.insert(child.as_str(), parent.name.as_str()) {
                return Err(ModelError::InvalidLinkage {
                    node: child.clone(),
                    message: format!("claimed by both '{previous}' and '{}'", parent.name),
                });
            }
        }
    }

    let mut orphans: Vec<&str> = index
        .iter()
        .filter(|(name, (kind, _))| *kind != NodeKind::Tqi && !parents.contains_key(*name))
        .map(|(name, _)| *name)
        .collect();
    orphans.sort_unstable();
    match orphans.first() {
        Some(orphan) => Err(ModelError::InvalidLinkage {
            node: orphan.to_string(),
            message: "not reachable from the tqi".to_string(),
        }),
        None => Ok(()),
    }
}

fn build_node(
    name: &str,
    index: &HashMap<&str, (NodeKind, &NodeDescription)>,
    registry: &StrategyRegistry,
) -> Result<ModelNode> {
    let (kind, entry) = index.get(name).ok_or_else(|| ModelError::UnknownNode {
        name: name.to_string(),
    })?;

    let mut node = match kind {
        NodeKind::Measure => ModelNode::measure(name, entry.positive.unwrap_or(false)),
        NodeKind::Diagnostic => ModelNode::diagnostic(name, entry.tool.clone().unwrap_or_default()),
        _ => ModelNode::new(name, *kind),
    }
    .with_description(entry.description.clone());

    node.set_strategies(registry.resolve(name, *kind, &entry.overrides())?);

    for child in &entry.children {
        node.add_child(build_node(child, index, registry)?)?;
    }

    node.check_weights(&entry.weights)?;
    node.weights = entry.weights.clone();

    if let Some(thresholds) = &entry.thresholds {
        node.check_thresholds(thresholds)?;
        node.thresholds = Some(thresholds.clone());
    }

    Ok(node)
}

fn describe_node(node: &ModelNode) -> NodeDescription {
    let defaults = Strategies::defaults_for(node.kind());
    let strategies = node.strategies();
    let non_default = |id: &str, default: &str| (id != default).then(|| id.to_string());

    let (positive, tool) = match node.detail() {
        NodeDetail::Measure { positive } => (Some(*positive), None),
        NodeDetail::Diagnostic { tool } => (None, Some(tool.clone())),
        _ => (None, None),
    };

    NodeDescription {
        name: node.name().to_string(),
        description: node.description.clone(),
        children: if node.kind() == NodeKind::Diagnostic {
            Vec::new()
        } else {
            node.child_names().map(str::to_string).collect()
        },
        evaluator: non_default(strategies.evaluator.id(), defaults.evaluator.id()),
        normalizer: non_default(strategies.normalizer.id(), defaults.normalizer.id()),
        utility_function: non_default(strategies.utility.id(), defaults.utility.id()),
        weights: node.weights.clone(),
        thresholds: node.thresholds.clone(),
        positive,
        tool,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"
name: sample
tqi:
  name: TQI
  children: [Security, Maintainability]
  weights: { Security: 0.8, Maintainability: 0.2 }
quality_aspects:
  - name: Security
    children: [Injection]
    weights: { Injection: 1.0 }
  - name: Maintainability
    children: [Dead Code]
    weights: { Dead Code: 1.0 }
product_factors:
  - name: Injection
    children: [Injection Rate]
  - name: Dead Code
    children: [Dead Code Rate]
measures:
  - name: Injection Rate
    positive: false
    thresholds: [0.0, 0.02]
    children: [B608]
  - name: Dead Code Rate
    positive: false
    utility_function: three-zone
    thresholds: [0.0, 0.01, 0.05]
    children: [W0612, W0611]
diagnostics:
  - name: B608
    tool: bandit
  - name: W0612
    tool: pylint
    evaluator: severity-sum
  - name: W0611
    tool: pylint
"#;

    #[test]
    fn test_build_sample() {
        let model = ModelDescription::from_yaml(MODEL).unwrap().build().unwrap();

        assert_eq!(model.quality_aspects().len(), 2);
        assert_eq!(model.measures().len(), 2);
        assert_eq!(model.diagnostics().len(), 3);

        let measure = model.find("Dead Code Rate").unwrap();
        assert_eq!(measure.strategies().utility.id(), "three-zone");
        assert!(!measure.is_positive());
        assert_eq!(
            model.find("W0612").unwrap().strategies().evaluator.id(),
            "severity-sum"
        );
        model.validate_calibration().unwrap();
    }

    #[test]
    fn test_round_trip_through_from_model() {
        let description = ModelDescription::from_yaml(MODEL).unwrap();
        let model = description.build().unwrap();
        let exported = ModelDescription::from_model(&model);

        let rebuilt = exported.build().unwrap();
        assert_eq!(
            ModelDescription::from_model(&rebuilt),
            exported,
            "export must be stable"
        );
        let evaluator_of = |name: &str| {
            exported
                .diagnostics
                .iter()
                .find(|d| d.name == name)
                .and_then(|d| d.evaluator.clone())
        };
        assert_eq!(evaluator_of("W0611"), None);
        assert_eq!(evaluator_of("W0612"), Some("severity-sum".to_string()));
        assert_eq!(
            exported
                .measures
                .iter()
                .find(|m| m.name == "Dead Code Rate")
                .and_then(|m| m.utility_function.clone()),
            Some("three-zone".to_string())
        );
    }

    #[test]
    fn test_dangling_reference() {
        let yaml = MODEL.replace("children: [B608]", "children: [B999]");
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::DanglingReference { ref child, .. } if child == "B999"));
    }

    #[test]
    fn test_unknown_strategy() {
        let yaml = MODEL.replace("evaluator: severity-sum", "evaluator: magic");
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::UnknownStrategy { ref id, .. } if id == "magic"));
    }

    #[test]
    fn test_threshold_arity_rejected_at_import() {
        let yaml = MODEL.replace("thresholds: [0.0, 0.02]", "thresholds: [0.0, 0.01, 0.02]");
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::ThresholdArity { .. }));
    }

    #[test]
    fn test_negative_weight_rejected_at_import() {
        let yaml = MODEL.replace(
            "{ Security: 0.8, Maintainability: 0.2 }",
            "{ Security: 5.0, Maintainability: -2.0 }",
        );
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(
            err,
            ModelError::InvalidWeight { ref node, ref child, weight }
                if node == "TQI" && child == "Maintainability" && weight == -2.0
        ));
    }

    #[test]
    fn test_weights_must_sum_to_one_at_import() {
        let yaml = MODEL.replace(
            "{ Security: 0.8, Maintainability: 0.2 }",
            "{ Security: 0.8, Maintainability: 0.8 }",
        );
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::WeightSum { ref node, .. } if node == "TQI"));

        // a partial set may be completed later, but never past 1
        let partial = MODEL.replace(
            "{ Security: 0.8, Maintainability: 0.2 }",
            "{ Security: 0.8 }",
        );
        assert!(ModelDescription::from_yaml(&partial).unwrap().build().is_ok());
        let overfull = MODEL.replace(
            "{ Security: 0.8, Maintainability: 0.2 }",
            "{ Security: 1.5 }",
        );
        assert!(ModelDescription::from_yaml(&overfull).unwrap().build().is_err());
    }

    #[test]
    fn test_descending_thresholds_rejected_at_import() {
        for bad in ["[0.02, 0.0]", "[0.0, .nan]", "[-.inf, 0.02]"] {
            let yaml = MODEL.replace("thresholds: [0.0, 0.02]", &format!("thresholds: {bad}"));
            let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
            assert!(
                matches!(err, ModelError::InvalidThresholds { ref node, .. } if node == "Injection Rate"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn test_orphan_rejected() {
        let yaml = format!("{MODEL}  - name: C0301\n    tool: pylint\n");
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::InvalidLinkage { ref node, .. } if node == "C0301"));
    }

    #[test]
    fn test_two_parents_rejected() {
        let yaml = MODEL.replace("children: [W0612, W0611]", "children: [W0612, W0611, B608]");
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::InvalidLinkage { .. }));
    }

    #[test]
    fn test_wrong_layer_rejected() {
        let yaml = MODEL.replace("children: [Injection]\n", "children: [Injection Rate]\n");
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::InvalidLinkage { .. }));
    }

    #[test]
    fn test_product_factor_with_two_measures_rejected() {
        let yaml = MODEL
            .replace("children: [Injection Rate]", "children: [Injection Rate, Dead Code Rate]")
            .replace("children: [Dead Code Rate]", "children: []");
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::InvalidStructure { .. }));
    }

    #[test]
    fn test_diagnostic_requires_tool() {
        let yaml = MODEL.replace("    tool: bandit\n", "");
        let err = ModelDescription::from_yaml(&yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, ModelError::Import { .. }));
    }

    #[test]
    fn test_json_format_detection() {
        assert_eq!(
            DescriptionFormat::from_path(Path::new("model.JSON")),
            DescriptionFormat::Json
        );
        assert_eq!(
            DescriptionFormat::from_path(Path::new("model.yml")),
            DescriptionFormat::Yaml
        );
    }
}
