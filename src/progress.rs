//! Progress feedback for corpus-wide work.
//!
//! # Progress Behavior
//!
//! - **Quiet Mode**: no bars (respects `QUALMODEL_QUIET` and `--quiet`)
//! - **Non-TTY**: bars are hidden in CI and piped output
//! - Warnings are always shown

pub mod implementations;
pub mod traits;

pub use implementations::{
    CliProgressSink, ProgressEvent, RecordingProgressSink, SilentProgressSink,
};
pub use traits::ProgressSink;

pub const TEMPLATE_PROJECTS: &str =
    "{spinner} {msg} [{bar:30}] {pos}/{len} projects ({percent}%) - {eta}";

/// Configuration for progress display behavior
#[derive(Debug, Clone, Default)]
pub struct ProgressConfig {
    /// Whether to suppress all progress output
    pub quiet_mode: bool,
    pub verbosity: u8,
}

impl ProgressConfig {
    /// Create progress configuration from environment and CLI arguments
    pub fn from_env(quiet: bool, verbosity: u8) -> Self {
        let env_quiet = std::env::var("QUALMODEL_QUIET").is_ok();
        Self {
            quiet_mode: quiet || env_quiet,
            verbosity,
        }
    }

    /// Bars only make sense on an interactive stderr.
    pub fn should_show_progress(&self) -> bool {
        if self.quiet_mode {
            return false;
        }

        use std::io::IsTerminal;
        std::io::stderr().is_terminal()
    }
}
