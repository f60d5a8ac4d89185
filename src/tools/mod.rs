//! Tool adapters.
//!
//! An adapter runs one analyzer over a project and turns its output into
//! diagnostics with findings, keyed by diagnostic name. The core only needs
//! those names to match diagnostics declared in the quality model.
//!
//! Two adapters ship with the crate:
//!
//! - [`ReportTool`]: optionally runs an external command, then reads a
//!   findings report in the common JSON format
//! - [`LocTool`]: counts lines of code and exposes them as the `loc`
//!   diagnostic used as the normalization baseline

pub mod loc;
pub mod report;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::QualmodelConfig;
use crate::errors::Result;
use crate::model::Finding;

pub use loc::{CommentSyntax, LocCount, LocCounter, LocTool};
pub use report::{FindingsReport, ReportTool};

/// Diagnostic name of the lines-of-code provider.
pub const LOC_DIAGNOSTIC: &str = "loc";

/// Handle to a tool's raw output, consumed by [`Tool::parse_result`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Path to a report file written by the tool.
    Report(PathBuf),
    /// Results computed in-process.
    Inline(Vec<DiagnosticReport>),
}

/// One diagnostic and the findings a tool reported for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub name: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl DiagnosticReport {
    pub fn new(name: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool: tool.into(),
            findings: Vec::new(),
        }
    }

    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }

    /// Sum of finding values.
    pub fn total(&self) -> f64 {
        self.findings.iter().map(Finding::value).sum()
    }
}

/// An analyzer adapter.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Run the analyzer over `project`.
    fn analyze(&self, project: &Path) -> Result<ToolOutput>;

    /// Parse what [`Tool::analyze`] produced.
    fn parse_result(&self, output: &ToolOutput) -> Result<BTreeMap<String, DiagnosticReport>>;

    /// `analyze` followed by `parse_result`.
    fn run(&self, project: &Path) -> Result<BTreeMap<String, DiagnosticReport>> {
        let output = self.analyze(project)?;
        self.parse_result(&output)
    }
}

/// The lines-of-code provider followed by one report adapter per
/// configured `[[tools]]` entry.
pub fn configured_tools(config: &QualmodelConfig) -> Vec<Arc<dyn Tool>> {
    let mut tools: Vec<Arc<dyn Tool>> = vec![Arc::new(LocTool::new(config.loc.clone()))];
    tools.extend(
        config
            .tools
            .iter()
            .map(|tool| Arc::new(ReportTool::new(tool.clone())) as Arc<dyn Tool>),
    );
    tools
}

/// Key inline reports by name, merging duplicates.
pub(crate) fn index_reports(
    reports: impl IntoIterator<Item = DiagnosticReport>,
) -> BTreeMap<String, DiagnosticReport> {
    let mut indexed: BTreeMap<String, DiagnosticReport> = BTreeMap::new();
    for report in reports {
        match indexed.get_mut(&report.name) {
            Some(existing) => existing.findings.extend(report.findings),
            None => {
                indexed.insert(report.name.clone(), report);
            }
        }
    }
    indexed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_reports_merges_duplicates() {
        let reports = vec![
            DiagnosticReport::new("B101", "bandit").with_finding(Finding::new("a.py", 1, 1, 1)),
            DiagnosticReport::new("B608", "bandit").with_finding(Finding::new("a.py", 2, 1, 1)),
            DiagnosticReport::new("B101", "bandit").with_finding(Finding::new("b.py", 3, 1, 2)),
        ];

        let indexed = index_reports(reports);
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed["B101"].findings.len(), 2);
        assert_eq!(indexed["B101"].total(), 3.0);
    }

    #[test]
    fn test_configured_tools_start_with_loc() {
        let config: QualmodelConfig = toml::from_str(
            r#"
            [[tools]]
            name = "bandit"
            "#,
        )
        .unwrap();

        let names: Vec<_> = configured_tools(&config)
            .iter()
            .map(|tool| tool.name().to_string())
            .collect();
        assert_eq!(names, vec!["loc", "bandit"]);
    }
}
