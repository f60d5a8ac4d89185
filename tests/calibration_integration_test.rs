mod common;

use common::{assert_close, config, template, three_zone_template, write_corpus, COMPARISONS_YAML};
use pretty_assertions::assert_eq;
use qualmodel::calibration::ahp::load_comparisons;
use qualmodel::calibration::benchmark::check_threshold_arity;
use qualmodel::calibration::{
    benchmarker_for, calibrate, discover_projects, AhpWeighter, CalibrationPlan, NaiveBenchmarker,
    NaiveWeighter, PercentileBenchmarker,
};
use qualmodel::config::WeightingConfig;
use qualmodel::model::ModelDescription;
use qualmodel::progress::{RecordingProgressSink, SilentProgressSink};
use qualmodel::tools::configured_tools;
use qualmodel::{ModelError, Project, QualmodelConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_naive_calibration_over_corpus() {
    let corpus = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let projects = discover_projects(corpus.path(), None).unwrap();
    assert_eq!(projects.len(), 4);

    let settings = config();
    let tools = configured_tools(&settings);
    let progress = RecordingProgressSink::new();
    let plan = CalibrationPlan {
        projects: &projects,
        tools: &tools,
        benchmarker: &NaiveBenchmarker,
        weighter: &NaiveWeighter,
        parallel: &settings.parallel,
        progress: &progress,
    };

    let calibration = calibrate(&template(), &plan).unwrap();
    let report = &calibration.report;

    assert_eq!(report.used_projects(), 4);
    let sql = &report.thresholds["SqlInjection"];
    assert_close(sql[0], 0.0);
    assert_close(sql[1], 0.2);
    let docs = &report.thresholds["MissingDocs"];
    assert_close(docs[0], 0.0);
    assert_close(docs[1], 0.05);

    assert_eq!(calibration.model.find("TQI").unwrap().weights["Security"], 0.5);
    assert!(progress.completed_stages().contains(&"Benchmark".to_string()));
}

#[test]
fn test_default_settings_calibrate_default_utilities() {
    let corpus = TempDir::new().unwrap();
    let projects = write_corpus(corpus.path());
    let defaults = QualmodelConfig::default();
    let benchmarker = benchmarker_for(&defaults.benchmark);
    check_threshold_arity(&template(), benchmarker.as_ref()).unwrap();

    let settings = config();
    let tools = configured_tools(&settings);
    let plan = CalibrationPlan {
        projects: &projects,
        tools: &tools,
        benchmarker: benchmarker.as_ref(),
        weighter: &NaiveWeighter,
        parallel: &defaults.parallel,
        progress: &SilentProgressSink,
    };

    let calibration = calibrate(&template(), &plan).unwrap();
    assert_eq!(calibration.report.thresholds["SqlInjection"].len(), 2);
    calibration.model.validate_calibration().unwrap();
}

#[test]
fn test_percentile_calibration_uses_quartiles() {
    let corpus = TempDir::new().unwrap();
    let projects = write_corpus(corpus.path());
    let settings = config();
    let tools = configured_tools(&settings);
    let plan = CalibrationPlan {
        projects: &projects,
        tools: &tools,
        benchmarker: &PercentileBenchmarker::default(),
        weighter: &NaiveWeighter,
        parallel: &settings.parallel,
        progress: &SilentProgressSink,
    };

    let calibration = calibrate(&three_zone_template(), &plan).unwrap();

    // sorted values 0, 0.05, 0.1, 0.2
    let sql = &calibration.report.thresholds["SqlInjection"];
    assert_close(sql[0], 0.0375);
    assert_close(sql[1], 0.075);
    assert_close(sql[2], 0.125);
}

#[test]
fn test_percentile_rule_needs_three_threshold_utility() {
    let corpus = TempDir::new().unwrap();
    let projects = write_corpus(corpus.path());
    let settings = config();
    let tools = configured_tools(&settings);
    let plan = CalibrationPlan {
        projects: &projects,
        tools: &tools,
        benchmarker: &PercentileBenchmarker::default(),
        weighter: &NaiveWeighter,
        parallel: &settings.parallel,
        progress: &SilentProgressSink,
    };

    assert!(matches!(
        calibrate(&template(), &plan).unwrap_err(),
        ModelError::ThresholdArity { .. }
    ));
}

#[test]
fn test_broken_project_is_skipped() {
    let corpus = TempDir::new().unwrap();
    let mut projects = write_corpus(corpus.path());
    // no reports at all
    let broken = corpus.path().join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("app.py"), "x = 1\n").unwrap();
    projects.push(broken);

    let mut settings = config();
    settings.parallel.enabled = true;
    let tools = configured_tools(&settings);
    let progress = RecordingProgressSink::new();
    let plan = CalibrationPlan {
        projects: &projects,
        tools: &tools,
        benchmarker: &NaiveBenchmarker,
        weighter: &NaiveWeighter,
        parallel: &settings.parallel,
        progress: &progress,
    };

    let calibration = calibrate(&template(), &plan).unwrap();
    let report = &calibration.report;

    assert_eq!(report.used_projects(), 4);
    let skipped: Vec<_> = report.projects.iter().filter(|p| !p.used).collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].name, "broken");
    assert!(skipped[0].reason.is_some());
    assert_close(report.thresholds["SqlInjection"][1], 0.2);
}

#[test]
fn test_ahp_calibration_and_evaluation() {
    let corpus = TempDir::new().unwrap();
    let projects = write_corpus(corpus.path());
    let comparisons = corpus.path().join("ahp.yaml");
    fs::write(&comparisons, COMPARISONS_YAML).unwrap();

    let settings = config();
    let tools = configured_tools(&settings);
    let weighter = AhpWeighter::new(
        load_comparisons(&comparisons).unwrap(),
        &WeightingConfig::default(),
    );
    let plan = CalibrationPlan {
        projects: &projects,
        tools: &tools,
        benchmarker: &NaiveBenchmarker,
        weighter: &weighter,
        parallel: &settings.parallel,
        progress: &SilentProgressSink,
    };
    let calibration = calibrate(&template(), &plan).unwrap();

    let tqi = calibration.model.find("TQI").unwrap();
    assert_close(tqi.weights["Security"], 0.75);
    assert_close(tqi.weights["Maintainability"], 0.25);
    assert_eq!(calibration.report.consistency.len(), 1);
    assert!(calibration.report.consistency[0].acceptable);

    // persist and reload, then score one of the benchmark projects
    let saved = corpus.path().join("calibrated.yaml");
    ModelDescription::from_model(&calibration.model)
        .save(&saved)
        .unwrap();
    let model = qualmodel::load_model(&saved).unwrap();

    let mut beta = Project::from_path(&projects[1], &model);
    beta.run_tools(&tools).unwrap();
    assert_eq!(beta.lines_of_code, Some(20.0));

    // SqlInjection 0.05 in [0, 0.2] -> 0.75; MissingDocs 0.05 in [0, 0.05] -> 0
    assert_close(beta.evaluate().unwrap(), 0.75 * 0.75 + 0.25 * 0.0);
}

#[test]
fn test_marker_discovery() {
    let corpus = TempDir::new().unwrap();
    write_corpus(corpus.path());
    fs::write(corpus.path().join("alpha").join("setup.py"), "").unwrap();
    fs::write(corpus.path().join("gamma").join("setup.py"), "").unwrap();

    let projects = discover_projects(corpus.path(), Some("setup.py")).unwrap();
    let names: Vec<_> = projects
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["alpha", "gamma"]);
}
