//! Result and report writers.
//!
//! Evaluation results mirror the model tree. Findings are summarized as a
//! count on their diagnostic instead of being listed one by one.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationReport, ConsistencyRecord};
use crate::errors::Result;
use crate::model::{EvalContext, ModelNode, NodeKind, NodeWeights};
use crate::project::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    pub path: PathBuf,
    pub lines_of_code: Option<f64>,
}

/// One evaluated node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub value: f64,
    /// Pre-utility value, measures only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findings: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeResult>,
}

impl NodeResult {
    /// Evaluate `node` and everything below it, down to diagnostics.
    pub fn evaluate(node: &ModelNode, ctx: &EvalContext) -> Result<Self> {
        let value = node.value(ctx)?;
        let normalized_value = match node.kind() {
            NodeKind::Measure => Some(node.normalized_value(ctx)?),
            _ => None,
        };
        let (findings, children) = match node.kind() {
            NodeKind::Diagnostic => (Some(node.child_count()), Vec::new()),
            NodeKind::Finding => (None, Vec::new()),
            _ => (
                None,
                node.children()
                    .map(|child| NodeResult::evaluate(child, ctx))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };

        Ok(Self {
            name: node.name().to_string(),
            kind: node.kind(),
            description: node.description.clone(),
            value,
            normalized_value,
            weights: node.weights.clone(),
            thresholds: node.thresholds.clone(),
            findings,
            children,
        })
    }

    /// Pre-order walk with depth.
    fn walk<'a>(&'a self, depth: usize, f: &mut impl FnMut(&'a NodeResult, usize)) {
        f(self, depth);
        for child in &self.children {
            child.walk(depth + 1, f);
        }
    }
}

/// A fully evaluated project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub project: ProjectMeta,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub tqi: NodeResult,
}

impl EvaluationResult {
    /// Evaluate every node; any failure aborts, so a result is never partial.
    pub fn from_project(project: &Project) -> Result<Self> {
        let ctx = project.eval_context();
        let tqi = NodeResult::evaluate(project.model().root(), &ctx)?;
        Ok(Self {
            project: ProjectMeta {
                name: project.name.clone(),
                path: project.path.clone(),
                lines_of_code: project.lines_of_code,
            },
            model: project.model().name.clone(),
            generated_at: Utc::now(),
            tqi,
        })
    }
}

fn colored_score(value: f64) -> ColoredString {
    let text = format!("{value:.3}");
    if value >= 0.75 {
        text.green()
    } else if value >= 0.5 {
        text.yellow()
    } else {
        text.red()
    }
}

fn format_thresholds(thresholds: &[f64]) -> String {
    let parts: Vec<String> = thresholds.iter().map(|t| format!("{t:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(h)).collect::<Vec<_>>());
    table
}

pub fn write_evaluation<W: Write>(
    result: &EvaluationResult,
    format: OutputFormat,
    writer: &mut W,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => write_json(result, writer),
        OutputFormat::Terminal => write_evaluation_terminal(result, writer),
    }
}

fn write_json<T: Serialize, W: Write>(value: &T, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

fn write_evaluation_terminal<W: Write>(
    result: &EvaluationResult,
    writer: &mut W,
) -> anyhow::Result<()> {
    writeln!(
        writer,
        "{} {} ({})",
        "Project".bold(),
        result.project.name.bold(),
        result.project.path.display()
    )?;
    writeln!(writer, "Model: {}", result.model)?;
    if let Some(loc) = result.project.lines_of_code {
        writeln!(writer, "Lines of code: {loc:.0}")?;
    }
    writeln!(
        writer,
        "{} {}",
        "TQI:".bold(),
        colored_score(result.tqi.value).bold()
    )?;
    writeln!(writer)?;

    let mut table = new_table(&["Node", "Kind", "Value", "Signal", "Thresholds / Findings"]);
    let mut rows = Vec::new();
    result.tqi.walk(0, &mut |node, depth| rows.push((node, depth)));
    for (node, depth) in rows {
        let label = format!("{}{}", "  ".repeat(depth), node.name);
        let signal = node
            .normalized_value
            .map(|v| format!("{v:.4}"))
            .unwrap_or_default();
        let detail = match (&node.thresholds, node.findings) {
            (_, Some(count)) => format!("{count} findings"),
            (Some(thresholds), None) => format_thresholds(thresholds),
            (None, None) => String::new(),
        };
        let value = if node.kind == NodeKind::Diagnostic {
            format!("{:.0}", node.value)
        } else {
            format!("{:.3}", node.value)
        };
        table.add_row(vec![
            Cell::new(label),
            Cell::new(node.kind.as_str()),
            Cell::new(value).set_alignment(CellAlignment::Right),
            Cell::new(signal).set_alignment(CellAlignment::Right),
            Cell::new(detail),
        ]);
    }
    writeln!(writer, "{table}")?;
    Ok(())
}

pub fn write_calibration_report<W: Write>(
    report: &CalibrationReport,
    format: OutputFormat,
    writer: &mut W,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return write_json(report, writer);
    }

    writeln!(
        writer,
        "{} {} ({} of {} projects used, {} / {})",
        "Calibrated".bold(),
        report.model.bold(),
        report.used_projects(),
        report.projects.len(),
        report.benchmarker,
        report.weighter
    )?;
    writeln!(writer)?;

    let mut projects = new_table(&["Project", "Status", "LOC", "Notes"]);
    for outcome in &report.projects {
        let status = if outcome.used {
            "used".green().to_string()
        } else {
            "skipped".red().to_string()
        };
        let notes = match (&outcome.reason, outcome.skipped_measures.is_empty()) {
            (Some(reason), _) => reason.clone(),
            (None, false) => outcome
                .skipped_measures
                .iter()
                .map(|(measure, why)| format!("{measure}: {why}"))
                .collect::<Vec<_>>()
                .join("\n"),
            (None, true) => String::new(),
        };
        let loc = outcome
            .lines_of_code
            .map(|l| format!("{l:.0}"))
            .unwrap_or_default();
        projects.add_row(vec![
            Cell::new(&outcome.name),
            Cell::new(status),
            Cell::new(loc).set_alignment(CellAlignment::Right),
            Cell::new(notes),
        ]);
    }
    writeln!(writer, "{projects}")?;
    writeln!(writer)?;

    let mut thresholds = new_table(&["Measure", "Thresholds"]);
    for (measure, values) in &report.thresholds {
        thresholds.add_row(vec![Cell::new(measure), Cell::new(format_thresholds(values))]);
    }
    writeln!(writer, "{thresholds}")?;
    writeln!(writer)?;

    write_weights_terminal(&report.weights, &report.consistency, writer)
}

/// Weights and consistency ratios, as printed by the `weights` command.
pub fn write_weights<W: Write>(
    weights: &[NodeWeights],
    consistency: &[ConsistencyRecord],
    format: OutputFormat,
    writer: &mut W,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct WeightsOutput<'a> {
                weights: &'a [NodeWeights],
                consistency: &'a [ConsistencyRecord],
            }
            write_json(
                &WeightsOutput {
                    weights,
                    consistency,
                },
                writer,
            )
        }
        OutputFormat::Terminal => write_weights_terminal(weights, consistency, writer),
    }
}

fn write_weights_terminal<W: Write>(
    weights: &[NodeWeights],
    consistency: &[ConsistencyRecord],
    writer: &mut W,
) -> anyhow::Result<()> {
    let ratios: BTreeMap<&str, &ConsistencyRecord> = consistency
        .iter()
        .map(|record| (record.node.as_str(), record))
        .collect();

    let mut table = new_table(&["Node", "Child", "Weight", "CR"]);
    for entry in weights {
        let cr = match ratios.get(entry.node.as_str()) {
            Some(record) if record.acceptable => format!("{:.3}", record.consistency_ratio),
            Some(record) => format!("{:.3}", record.consistency_ratio)
                .red()
                .to_string(),
            None => "-".to_string(),
        };
        for (i, (child, weight)) in entry.weights.iter().enumerate() {
            let (node, cr) = if i == 0 {
                (entry.node.as_str(), cr.as_str())
            } else {
                ("", "")
            };
            table.add_row(vec![
                Cell::new(node),
                Cell::new(child),
                Cell::new(format!("{weight:.4}")).set_alignment(CellAlignment::Right),
                Cell::new(cr).set_alignment(CellAlignment::Right),
            ]);
        }
    }
    writeln!(writer, "{table}")?;
    Ok(())
}
