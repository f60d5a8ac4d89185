//! A project under evaluation: its own copy of the quality model plus the
//! lines-of-code baseline, populated from tool results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::Result;
use crate::model::{EvalContext, Finding, ModelNode, QualityModel, LOC_BASELINE};
use crate::tools::{DiagnosticReport, Tool, LOC_DIAGNOSTIC};

#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    pub lines_of_code: Option<f64>,
    model: QualityModel,
}

impl Project {
    /// A project with an independent copy of `template`.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, template: &QualityModel) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            lines_of_code: None,
            model: template.instantiate(),
        }
    }

    /// Name the project after its directory.
    pub fn from_path(path: &Path, template: &QualityModel) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(name, path, template)
    }

    pub fn model(&self) -> &QualityModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut QualityModel {
        &mut self.model
    }

    /// Run every tool, then attach all results. The first tool failure
    /// aborts; nothing is attached in that case.
    pub fn run_tools(&mut self, tools: &[Arc<dyn Tool>]) -> Result<()> {
        let mut collected = BTreeMap::new();
        for tool in tools {
            log::debug!("{}: running {}", self.name, tool.name());
            collected.extend(tool.run(&self.path)?);
        }
        self.apply_reports(collected)?;
        Ok(())
    }

    /// Attach findings to matching diagnostics, replacing earlier ones.
    /// Returns how many diagnostics were populated.
    pub fn apply_reports(&mut self, reports: BTreeMap<String, DiagnosticReport>) -> Result<usize> {
        let mut attached = 0;
        for (name, report) in reports {
            if name == LOC_DIAGNOSTIC {
                self.lines_of_code = Some(report.total());
            }
            let findings = finding_nodes(&name, &report.findings);
            if self.model.attach_findings(&name, findings)? {
                attached += 1;
            } else if name != LOC_DIAGNOSTIC {
                log::debug!(
                    "{}: diagnostic '{}' from {} is not in the model",
                    self.name,
                    name,
                    report.tool
                );
            }
        }
        Ok(attached)
    }

    pub fn eval_context(&self) -> EvalContext {
        let mut ctx = EvalContext::new();
        if let Some(loc) = self.lines_of_code {
            ctx.set_baseline(LOC_BASELINE, loc);
        }
        ctx
    }

    /// TQI value of this project.
    pub fn evaluate(&self) -> Result<f64> {
        self.model.evaluate(&self.eval_context())
    }

    /// Normalized value of every measure, independently fallible.
    pub fn measure_signals(&self) -> BTreeMap<String, Result<f64>> {
        self.model.measure_signals(&self.eval_context())
    }
}

fn finding_nodes(diagnostic: &str, findings: &[Finding]) -> Vec<ModelNode> {
    findings
        .iter()
        .enumerate()
        .map(|(idx, finding)| {
            let name = format!(
                "{}:{}:{}:{}#{}",
                diagnostic,
                finding.file.display(),
                finding.line,
                finding.column,
                idx
            );
            ModelNode::finding(name, finding.clone())
        })
        .collect()
}
