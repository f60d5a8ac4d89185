use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

use crate::calibration::benchmark::check_tool_coverage;
use crate::cli::GlobalArgs;
use crate::io::{self, output, EvaluationResult, OutputFormat};
use crate::observability::{set_current_project, set_phase, Phase};
use crate::project::Project;
use crate::tools::configured_tools;

pub struct EvaluateConfig {
    pub project: PathBuf,
    pub model: PathBuf,
    pub name: Option<String>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub global: GlobalArgs,
}

pub fn evaluate_project(config: EvaluateConfig) -> Result<()> {
    let settings = super::load_settings(&config.global)?;
    let template = super::load_model_file(&config.model)?;
    template
        .validate_calibration()
        .context("The model is not calibrated; run `qualmodel calibrate` first")?;

    if !config.project.is_dir() {
        anyhow::bail!("Project directory not found: {}", config.project.display());
    }
    let mut project = match config.name {
        Some(name) => Project::new(name, &config.project, &template),
        None => Project::from_path(&config.project, &template),
    };
    let _project = set_current_project(&config.project);

    let tools = configured_tools(&settings);
    check_tool_coverage(&template, &tools)?;
    {
        let _phase = set_phase(Phase::ToolRun);
        project
            .run_tools(&tools)
            .with_context(|| format!("Analysis of '{}' failed", project.name))?;
    }

    let result = {
        let _phase = set_phase(Phase::Evaluation);
        EvaluationResult::from_project(&project)
            .with_context(|| format!("Evaluation of '{}' failed", project.name))?
    };
    log::info!("'{}' scored {:.3}", project.name, result.tqi.value);

    let _phase = set_phase(Phase::OutputGeneration);
    let mut writer = io::open_output(config.output.as_deref())?;
    output::write_evaluation(&result, config.format, &mut writer)?;
    writer.flush()?;
    Ok(())
}
