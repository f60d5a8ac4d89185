use anyhow::Result;
use qualmodel::cli::{self, Commands};
use qualmodel::commands;
use qualmodel::commands::calibrate::CalibrateConfig;
use qualmodel::commands::evaluate::EvaluateConfig;
use qualmodel::commands::weights::WeightsConfig;

fn main() -> Result<()> {
    let cli = cli::parse_args();

    match cli.command {
        Commands::Evaluate {
            project,
            model,
            name,
            format,
            output,
            global,
        } => {
            cli::init_runtime(global.verbosity);
            commands::evaluate::evaluate_project(EvaluateConfig {
                project,
                model,
                name,
                format,
                output,
                global,
            })
        }
        Commands::Calibrate {
            corpus,
            model,
            comparisons,
            benchmarker,
            weighter,
            marker,
            output,
            report,
            format,
            jobs,
            no_parallel,
            global,
        } => {
            cli::init_runtime(global.verbosity);
            commands::calibrate::calibrate_model(CalibrateConfig {
                corpus,
                model,
                comparisons,
                benchmarker,
                weighter,
                marker,
                output,
                report,
                format,
                jobs,
                no_parallel,
                global,
            })
        }
        Commands::Weights {
            model,
            comparisons,
            method,
            strict,
            apply,
            format,
            global,
        } => {
            cli::init_runtime(global.verbosity);
            let mut stdout = std::io::stdout().lock();
            commands::weights::show_weights(
                WeightsConfig {
                    model,
                    comparisons,
                    method,
                    strict,
                    apply,
                    format,
                    global,
                },
                &mut stdout,
            )
        }
        Commands::Init { force } => {
            cli::init_runtime(0);
            commands::init::init_config(force)
        }
    }
}
