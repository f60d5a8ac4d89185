//! Subcommand handlers. Each takes a plain config struct so it can be driven
//! from tests without going through clap.

pub mod calibrate;
pub mod evaluate;
pub mod init;
pub mod weights;

use anyhow::{Context, Result};
use std::path::Path;

use crate::calibration::ahp::load_comparisons;
use crate::calibration::{AhpWeighter, NaiveWeighter, Weighter};
use crate::cli::GlobalArgs;
use crate::config::{
    load_config, load_config_from_path, QualmodelConfig, WeightingConfig, WeightingStrategy,
};
use crate::model::{load_model, QualityModel};
use crate::observability::{set_phase, Phase};

/// The explicit `--config` file, or the usual search.
pub(crate) fn load_settings(global: &GlobalArgs) -> Result<QualmodelConfig> {
    match &global.config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(load_config()),
    }
}

pub(crate) fn load_model_file(path: &Path) -> Result<QualityModel> {
    let _phase = set_phase(Phase::ModelLoading);
    load_model(path).with_context(|| format!("Failed to load quality model {}", path.display()))
}

pub(crate) fn build_weighter(
    config: &WeightingConfig,
    comparisons: Option<&Path>,
) -> Result<Box<dyn Weighter>> {
    match config.strategy {
        WeightingStrategy::Naive => {
            if let Some(path) = comparisons {
                log::warn!(
                    "Ignoring {}: weighting strategy is naive",
                    path.display()
                );
            }
            Ok(Box::new(NaiveWeighter))
        }
        WeightingStrategy::Ahp => {
            let path =
                comparisons.context("AHP weighting needs comparison matrices (--comparisons)")?;
            let specs = load_comparisons(path).with_context(|| {
                format!("Failed to load comparison matrices from {}", path.display())
            })?;
            log::info!("Loaded {} comparison matrices", specs.len());
            Ok(Box::new(AhpWeighter::new(specs, config)))
        }
    }
}
