use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{BenchmarkStrategy, PriorityMethod, WeightingStrategy};
use crate::io::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "qualmodel")]
#[command(about = "Hierarchical software quality model evaluation and calibration", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options every subcommand accepts.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (skips the `.qualmodel.toml` search)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Suppress progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate one project with a calibrated quality model
    Evaluate {
        /// Project directory
        project: PathBuf,

        /// Calibrated model description (YAML or JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Project name in the result (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        global: GlobalArgs,
    },

    /// Derive thresholds over a benchmark corpus and elicit weights
    Calibrate {
        /// Directory holding the benchmark projects
        corpus: PathBuf,

        /// Model template description (YAML or JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Pairwise comparison matrices for AHP weighting
        #[arg(long)]
        comparisons: Option<PathBuf>,

        /// Threshold derivation strategy (overrides config)
        #[arg(long, value_enum)]
        benchmarker: Option<BenchmarkStrategy>,

        /// Weight elicitation strategy (overrides config)
        #[arg(long, value_enum)]
        weighter: Option<WeightingStrategy>,

        /// File name suffix marking project roots inside the corpus
        #[arg(long)]
        marker: Option<String>,

        /// Where to write the calibrated model (defaults to stdout as YAML)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Where to write the calibration report
        #[arg(long)]
        report: Option<PathBuf>,

        /// Calibration report format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Number of parallel jobs (0 = number of CPUs)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Analyze benchmark projects one at a time
        #[arg(long)]
        no_parallel: bool,

        #[command(flatten)]
        global: GlobalArgs,
    },

    /// Elicit weights for a model and print them with consistency ratios
    Weights {
        /// Model description (YAML or JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Pairwise comparison matrices; without them weights are equal
        #[arg(long)]
        comparisons: Option<PathBuf>,

        /// Priority vector computation
        #[arg(long, value_enum)]
        method: Option<PriorityMethod>,

        /// Fail on matrices whose consistency ratio exceeds the threshold
        #[arg(long)]
        strict: bool,

        /// Write the model with the elicited weights applied
        #[arg(long)]
        apply: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        #[command(flatten)]
        global: GlobalArgs,
    },

    /// Write a default .qualmodel.toml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_calibrate() {
        let cli = Cli::try_parse_from([
            "qualmodel",
            "calibrate",
            "corpus",
            "--model",
            "model.yaml",
            "--weighter",
            "ahp",
            "--comparisons",
            "ahp.yaml",
            "-j",
            "4",
            "-vv",
        ])
        .unwrap();

        match cli.command {
            Commands::Calibrate {
                corpus,
                weighter,
                jobs,
                global,
                benchmarker,
                ..
            } => {
                assert_eq!(corpus, PathBuf::from("corpus"));
                assert_eq!(weighter, Some(WeightingStrategy::Ahp));
                assert_eq!(benchmarker, None);
                assert_eq!(jobs, 4);
                assert_eq!(global.verbosity, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_requires_model() {
        assert!(Cli::try_parse_from(["qualmodel", "evaluate", "proj"]).is_err());
    }
}
