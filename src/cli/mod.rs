//! Command-line interface for qualmodel
//!
//! - Argument parsing (`args`)
//! - Runtime setup (`setup`)

pub mod args;
pub mod setup;

pub use args::{Cli, Commands, GlobalArgs};
pub use setup::init_runtime;

/// Parse CLI arguments using Clap
pub fn parse_args() -> Cli {
    args::parse_args()
}
