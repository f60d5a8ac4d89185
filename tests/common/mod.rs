// Shared fixtures for qualmodel integration tests
#![allow(dead_code)]

use indoc::indoc;
use std::fs;
use std::path::{Path, PathBuf};

use qualmodel::config::{QualmodelConfig, ToolConfig};
use qualmodel::model::ModelDescription;
use qualmodel::tools::{DiagnosticReport, FindingsReport};
use qualmodel::{Finding, QualityModel};

/// Two aspects, one measure each, measures fed by bandit and pydocstyle.
pub const TEMPLATE_YAML: &str = indoc! {r#"
    name: sample
    description: Two-aspect sample model
    tqi:
      name: TQI
      children: [Security, Maintainability]
    quality_aspects:
      - name: Security
        children: [Injection]
      - name: Maintainability
        children: [Documentation]
    product_factors:
      - name: Injection
        children: [SqlInjection]
      - name: Documentation
        children: [MissingDocs]
    measures:
      - name: SqlInjection
        children: [B608]
      - name: MissingDocs
        children: [D100]
    diagnostics:
      - name: B608
        tool: bandit
      - name: D100
        tool: pydocstyle
"#};

/// The template with weights and thresholds filled in.
pub const CALIBRATED_YAML: &str = indoc! {r#"
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
        children: [Documentation]
        weights: { Documentation: 1.0 }
    product_factors:
      - name: Injection
        children: [SqlInjection]
      - name: Documentation
        children: [MissingDocs]
    measures:
      - name: SqlInjection
        children: [B608]
        thresholds: [0.0, 0.1]
      - name: MissingDocs
        children: [D100]
        thresholds: [0.0, 0.1]
    diagnostics:
      - name: B608
        tool: bandit
      - name: D100
        tool: pydocstyle
"#};

/// Comparison matrix favouring security 3:1.
pub const COMPARISONS_YAML: &str = indoc! {r#"
    - node: TQI
      items: [Security, Maintainability]
      upper:
        - [3]
"#};

pub fn template() -> QualityModel {
    ModelDescription::from_yaml(TEMPLATE_YAML)
        .unwrap()
        .build()
        .unwrap()
}

pub fn calibrated() -> QualityModel {
    ModelDescription::from_yaml(CALIBRATED_YAML)
        .unwrap()
        .build()
        .unwrap()
}

/// Same tree, measures mapped with the three-threshold utility.
pub fn three_zone_template() -> QualityModel {
    let yaml = TEMPLATE_YAML.replace(
        "children: [B608]\n",
        "children: [B608]\n    utility_function: three-zone\n",
    );
    let yaml = yaml.replace(
        "children: [D100]\n",
        "children: [D100]\n    utility_function: three-zone\n",
    );
    ModelDescription::from_yaml(&yaml).unwrap().build().unwrap()
}

pub fn bandit_report(findings: usize) -> DiagnosticReport {
    let mut report = DiagnosticReport::new("B608", "bandit");
    for line in 0..findings {
        report = report.with_finding(Finding::new("app.py", line + 1, 1, 1));
    }
    report
}

pub fn loc_report(lines: f64) -> DiagnosticReport {
    DiagnosticReport::new("loc", "loc").with_finding(Finding::metric(".", lines))
}

/// One benchmark project: `lines` lines of Python plus precomputed reports.
pub struct ProjectSpec {
    pub name: &'static str,
    pub lines: usize,
    pub b608: usize,
    pub d100: usize,
}

pub fn write_project(corpus: &Path, spec: &ProjectSpec) -> PathBuf {
    let dir = corpus.join(spec.name);
    fs::create_dir_all(dir.join(".qualmodel")).unwrap();

    let source: String = (0..spec.lines).map(|i| format!("x{i} = {i}\n")).collect();
    fs::write(dir.join("app.py"), source).unwrap();

    write_report(&dir, "bandit", "B608", spec.b608);
    write_report(&dir, "pydocstyle", "D100", spec.d100);
    dir
}

fn write_report(dir: &Path, tool: &str, diagnostic: &str, findings: usize) {
    let mut report = DiagnosticReport::new(diagnostic, tool);
    for line in 0..findings {
        report = report.with_finding(Finding::new("app.py", line + 1, 1, 1));
    }
    let report = FindingsReport {
        tool: Some(tool.to_string()),
        diagnostics: vec![report],
    };
    fs::write(
        dir.join(".qualmodel").join(format!("{tool}.json")),
        serde_json::to_string_pretty(&report).unwrap(),
    )
    .unwrap();
}

/// Normalized SqlInjection values: 0.1, 0.05, 0.0, 0.2.
pub const CORPUS: [ProjectSpec; 4] = [
    ProjectSpec {
        name: "alpha",
        lines: 10,
        b608: 1,
        d100: 0,
    },
    ProjectSpec {
        name: "beta",
        lines: 20,
        b608: 1,
        d100: 1,
    },
    ProjectSpec {
        name: "gamma",
        lines: 20,
        b608: 0,
        d100: 0,
    },
    ProjectSpec {
        name: "delta",
        lines: 10,
        b608: 2,
        d100: 0,
    },
];

pub fn write_corpus(corpus: &Path) -> Vec<PathBuf> {
    CORPUS.iter().map(|spec| write_project(corpus, spec)).collect()
}

/// Config with both report tools and sequential benchmarking.
pub fn config() -> QualmodelConfig {
    let mut config = QualmodelConfig::default();
    config.parallel.enabled = false;
    config.tools = ["bandit", "pydocstyle"]
        .iter()
        .map(|name| ToolConfig {
            name: name.to_string(),
            command: None,
            args: Vec::new(),
            report: ".qualmodel/{tool}.json".to_string(),
            timeout_secs: 60,
        })
        .collect();
    config
}

pub fn config_toml() -> &'static str {
    indoc! {r#"
        [parallel]
        enabled = false

        [[tools]]
        name = "bandit"

        [[tools]]
        name = "pydocstyle"
    "#}
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
