//! `.qualmodel.toml` configuration.

mod core;
mod loader;
mod parallel;

pub use core::{
    BenchmarkConfig, BenchmarkStrategy, LocConfig, PriorityMethod, QualmodelConfig, ToolConfig,
    WeightingConfig, WeightingStrategy, DEFAULT_CONFIG_TEMPLATE,
};
pub use loader::{
    directory_ancestors, load_config, load_config_from, load_config_from_path,
    parse_and_validate_config, user_config_path, CONFIG_FILE_NAME,
};
pub use parallel::ParallelConfig;
