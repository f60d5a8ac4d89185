use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

use crate::calibration::{benchmarker_for, calibrate, discover_projects, CalibrationPlan};
use crate::cli::GlobalArgs;
use crate::config::{BenchmarkStrategy, QualmodelConfig, WeightingStrategy};
use crate::io::{self, output, OutputFormat};
use crate::model::ModelDescription;
use crate::observability::{set_phase, Phase};
use crate::progress::{CliProgressSink, ProgressConfig};
use crate::tools::configured_tools;

pub struct CalibrateConfig {
    pub corpus: PathBuf,
    pub model: PathBuf,
    pub comparisons: Option<PathBuf>,
    pub benchmarker: Option<BenchmarkStrategy>,
    pub weighter: Option<WeightingStrategy>,
    pub marker: Option<String>,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub format: OutputFormat,
    pub jobs: usize,
    pub no_parallel: bool,
    pub global: GlobalArgs,
}

impl CalibrateConfig {
    /// Fold command-line overrides into the file configuration.
    fn apply_overrides(&self, settings: &mut QualmodelConfig) {
        if let Some(strategy) = self.benchmarker {
            settings.benchmark.strategy = strategy;
        }
        if let Some(strategy) = self.weighter {
            settings.weighting.strategy = strategy;
        }
        if let Some(marker) = &self.marker {
            settings.benchmark.project_marker = Some(marker.clone());
        }
        if self.no_parallel {
            settings.parallel.enabled = false;
        }
        if self.jobs > 0 {
            settings.parallel.max_concurrency = Some(self.jobs);
        }
    }
}

pub fn calibrate_model(config: CalibrateConfig) -> Result<()> {
    let mut settings = super::load_settings(&config.global)?;
    config.apply_overrides(&mut settings);
    settings.validate().context("Invalid configuration")?;

    let template = super::load_model_file(&config.model)?;
    let projects = discover_projects(&config.corpus, settings.benchmark.project_marker.as_deref())
        .with_context(|| format!("Failed to read corpus {}", config.corpus.display()))?;
    if projects.is_empty() {
        anyhow::bail!("No benchmark projects found in {}", config.corpus.display());
    }
    log::info!(
        "Calibrating '{}' against {} projects",
        template.name,
        projects.len()
    );

    let tools = configured_tools(&settings);
    let benchmarker = benchmarker_for(&settings.benchmark);
    let weighter = super::build_weighter(&settings.weighting, config.comparisons.as_deref())?;
    let progress = CliProgressSink::new(ProgressConfig::from_env(
        config.global.quiet,
        config.global.verbosity,
    ));

    let plan = CalibrationPlan {
        projects: &projects,
        tools: &tools,
        benchmarker: benchmarker.as_ref(),
        weighter: weighter.as_ref(),
        parallel: &settings.parallel,
        progress: &progress,
    };
    let calibration = calibrate(&template, &plan).context("Calibration failed")?;

    let _phase = set_phase(Phase::OutputGeneration);
    let description = ModelDescription::from_model(&calibration.model);
    match &config.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                io::ensure_dir(parent)?;
            }
            description
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote calibrated model to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(serde_yaml::to_string(&description)?.as_bytes())?;
        }
    }

    // Without --report the report goes to stdout, unless the model already did.
    let report_target = match (&config.report, &config.output) {
        (Some(path), _) => Some(Some(path.as_path())),
        (None, Some(_)) => Some(None),
        (None, None) => None,
    };
    if let Some(path) = report_target {
        let mut writer = io::open_output(path)?;
        output::write_calibration_report(&calibration.report, config.format, &mut writer)?;
        writer.flush()?;
    }
    Ok(())
}
