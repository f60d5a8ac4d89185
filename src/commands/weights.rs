use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

use crate::cli::GlobalArgs;
use crate::config::{PriorityMethod, WeightingStrategy};
use crate::io::{output, OutputFormat};
use crate::model::ModelDescription;
use crate::observability::{set_phase, Phase};

pub struct WeightsConfig {
    pub model: PathBuf,
    pub comparisons: Option<PathBuf>,
    pub method: Option<PriorityMethod>,
    pub strict: bool,
    pub apply: Option<PathBuf>,
    pub format: OutputFormat,
    pub global: GlobalArgs,
}

/// Elicit and print weights. Failed nodes are reported as warnings, then the
/// first failure is returned as the error.
pub fn show_weights<W: Write>(config: WeightsConfig, writer: &mut W) -> Result<()> {
    let mut settings = super::load_settings(&config.global)?.weighting;
    settings.strategy = if config.comparisons.is_some() {
        WeightingStrategy::Ahp
    } else {
        WeightingStrategy::Naive
    };
    if let Some(method) = config.method {
        settings.method = method;
    }
    settings.strict_consistency |= config.strict;

    let mut model = super::load_model_file(&config.model)?;
    let weighter = super::build_weighter(&settings, config.comparisons.as_deref())?;

    let report = {
        let _phase = set_phase(Phase::WeightElicitation);
        weighter.elicit(&model)
    };
    for failure in &report.failures {
        eprintln!("warning: no weights for '{}': {}", failure.node, failure.error);
    }
    output::write_weights(&report.weights, &report.consistency, config.format, writer)?;

    let weights = report.into_result().context("Weight elicitation failed")?;
    if let Some(path) = &config.apply {
        model.apply_weights(&weights)?;
        ModelDescription::from_model(&model)
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote weighted model to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::fs;

    const MODEL: &str = indoc! {r#"
        name: sample
        tqi:
          name: TQI
          children: [Security, Maintainability]
        quality_aspects:
          - name: Security
            children: [Injection]
          - name: Maintainability
            children: [Size]
        product_factors:
          - name: Injection
            children: [SqlStrings]
          - name: Size
            children: [LongFiles]
        measures:
          - name: SqlStrings
          - name: LongFiles
    "#};

    #[test]
    fn test_naive_weights_applied_to_model() {
        let dir = tempfile::TempDir::new().unwrap();
        let model_path = dir.path().join("model.yaml");
        let applied = dir.path().join("weighted.yaml");
        fs::write(&model_path, MODEL).unwrap();

        let mut buffer = Vec::new();
        show_weights(
            WeightsConfig {
                model: model_path,
                comparisons: None,
                method: None,
                strict: false,
                apply: Some(applied.clone()),
                format: OutputFormat::Json,
                global: GlobalArgs::default(),
            },
            &mut buffer,
        )
        .unwrap();

        let printed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        let tqi = printed["weights"]
            .as_array()
            .unwrap()
            .iter()
            .find(|w| w["node"] == "TQI")
            .unwrap();
        assert_eq!(tqi["weights"]["Security"], 0.5);

        let weighted = crate::model::load_model(&applied).unwrap();
        assert_eq!(weighted.find("TQI").unwrap().weights["Maintainability"], 0.5);
    }

    #[test]
    fn test_missing_matrix_fails_after_printing() {
        let dir = tempfile::TempDir::new().unwrap();
        let model_path = dir.path().join("model.yaml");
        let comparisons = dir.path().join("ahp.yaml");
        fs::write(&model_path, MODEL).unwrap();
        fs::write(&comparisons, "[]\n").unwrap();

        let mut buffer = Vec::new();
        let result = show_weights(
            WeightsConfig {
                model: model_path,
                comparisons: Some(comparisons),
                method: None,
                strict: false,
                apply: None,
                format: OutputFormat::Json,
                global: GlobalArgs::default(),
            },
            &mut buffer,
        );

        assert!(result.is_err());
        assert!(!buffer.is_empty());
    }
}
