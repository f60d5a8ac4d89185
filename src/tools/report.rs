//! Findings-report adapter.
//!
//! Reads a JSON report of the form
//!
//! ```json
//! {
//!   "tool": "bandit",
//!   "diagnostics": [
//!     { "name": "B101", "findings": [ { "file": "app.py", "line": 3, "column": 1, "severity": 2 } ] }
//!   ]
//! }
//! ```
//!
//! Metric-style tools report one finding with a `metric` value instead of a
//! severity. When a command is configured it runs first, inside the project
//! directory, and must leave the report behind. Non-zero exit codes are not
//! failures on their own since most linters signal "findings present" that
//! way; a missing or unparsable report is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{index_reports, DiagnosticReport, Tool, ToolOutput};
use crate::config::ToolConfig;
use crate::errors::{ModelError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// On-disk report format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingsReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub diagnostics: Vec<DiagnosticReport>,
}

impl FindingsReport {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Adapter for any tool that writes (or has written) a findings report.
#[derive(Debug, Clone)]
pub struct ReportTool {
    config: ToolConfig,
}

impl ReportTool {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Report location for `project`, with placeholders substituted.
    pub fn report_path(&self, project: &Path) -> PathBuf {
        let rendered = self.substitute(&self.config.report, project, None);
        let path = PathBuf::from(rendered);
        if path.is_absolute() {
            path
        } else {
            project.join(path)
        }
    }

    fn substitute(&self, template: &str, project: &Path, output: Option<&Path>) -> String {
        let mut rendered = template
            .replace("{project}", &project.display().to_string())
            .replace("{tool}", &self.config.name);
        if let Some(output) = output {
            rendered = rendered.replace("{output}", &output.display().to_string());
        }
        rendered
    }

    fn run_command(&self, program: &str, project: &Path, report: &Path) -> Result<()> {
        if let Some(parent) = report.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|arg| self.substitute(arg, project, Some(report)))
            .collect();

        log::debug!("Running {} {:?} in {}", program, args, project.display());
        let mut child = Command::new(program)
            .args(&args)
            .current_dir(project)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.failure(format!("failed to start '{program}': {e}")))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                log::debug!(
                    "{} finished with {} after {:.1}s",
                    self.config.name,
                    status,
                    started.elapsed().as_secs_f64()
                );
                return Ok(());
            }
            if started.elapsed() >= timeout {
                // kill can race with a natural exit; wait reaps either way
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.failure(format!(
                    "timed out after {}s",
                    self.config.timeout_secs
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn failure(&self, message: impl Into<String>) -> ModelError {
        ModelError::tool(&self.config.name, message)
    }
}

impl Tool for ReportTool {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn analyze(&self, project: &Path) -> Result<ToolOutput> {
        let report = self.report_path(project);
        if let Some(program) = &self.config.command {
            self.run_command(program, project, &report)?;
        }
        if !report.is_file() {
            return Err(self.failure(format!("report not found: {}", report.display())));
        }
        Ok(ToolOutput::Report(report))
    }

    fn parse_result(&self, output: &ToolOutput) -> Result<BTreeMap<String, DiagnosticReport>> {
        let reports = match output {
            ToolOutput::Report(path) => FindingsReport::load(path)
                .map_err(|e| self.failure(format!("unreadable report {}: {e}", path.display())))?
                .diagnostics,
            ToolOutput::Inline(reports) => reports.clone(),
        };

        let name = &self.config.name;
        Ok(index_reports(reports.into_iter().map(|mut report| {
            if report.tool.is_empty() {
                report.tool = name.clone();
            }
            report
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::fs;
    use tempfile::TempDir;

    const REPORT: &str = indoc! {r#"
        {
          "tool": "bandit",
          "diagnostics": [
            { "name": "B101", "findings": [
              { "file": "app.py", "line": 3, "column": 1, "severity": 2 },
              { "file": "app.py", "line": 9 }
            ] },
            { "name": "B608", "findings": [] }
          ]
        }
    "#};

    fn tool(report: &str) -> ReportTool {
        ReportTool::new(ToolConfig {
            name: "bandit".to_string(),
            command: None,
            args: Vec::new(),
            report: report.to_string(),
            timeout_secs: 5,
        })
    }

    #[test]
    fn test_reads_precomputed_report() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("reports")).unwrap();
        fs::write(dir.path().join("reports/bandit.json"), REPORT).unwrap();

        let reports = tool("reports/{tool}.json").run(dir.path()).unwrap();
        assert_eq!(reports.len(), 2);
        let b101 = &reports["B101"];
        assert_eq!(b101.tool, "bandit");
        assert_eq!(b101.findings.len(), 2);
        assert_eq!(b101.findings[1].severity, 1);
        assert_eq!(b101.total(), 3.0);
    }

    #[test]
    fn test_missing_report_is_tool_failure() {
        let dir = TempDir::new().unwrap();
        let err = tool("missing.json").run(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::ToolFailure { ref tool, .. } if tool == "bandit"));
    }

    #[test]
    fn test_malformed_report_is_tool_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("r.json"), "{ not json").unwrap();
        let err = tool("r.json").run(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::ToolFailure { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_writes_report() {
        let dir = TempDir::new().unwrap();
        let mut config = tool("out/{tool}.json").config.clone();
        config.command = Some("sh".to_string());
        config.args = vec![
            "-c".to_string(),
            format!("printf '%s' '{}' > {{output}}", REPORT.replace('\n', " ")),
        ];

        let reports = ReportTool::new(config).run(dir.path()).unwrap();
        assert_eq!(reports["B101"].findings.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_timeout() {
        let dir = TempDir::new().unwrap();
        let mut config = tool("never.json").config.clone();
        config.command = Some("sleep".to_string());
        config.args = vec!["5".to_string()];
        config.timeout_secs = 0;

        let err = ReportTool::new(config).run(dir.path()).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
