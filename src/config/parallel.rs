//! Parallelism configuration for per-project benchmark work.

use serde::{Deserialize, Serialize};

/// Default value for parallel processing enabled
fn default_enabled() -> bool {
    true
}

/// Configuration for parallel processing operations.
///
/// When enabled, benchmark projects are analyzed concurrently on a rayon
/// pool; each project owns its model copy so no state is shared.
///
/// # Example
///
/// ```rust
/// use qualmodel::config::ParallelConfig;
///
/// let config = ParallelConfig {
///     enabled: true,
///     max_concurrency: Some(4),
/// };
/// assert_eq!(config.effective_concurrency(), 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParallelConfig {
    /// Enable parallel processing (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum concurrent projects (default: number of CPUs)
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_concurrency: None,
        }
    }
}

impl ParallelConfig {
    /// Create a config with parallel processing disabled.
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Effective number of workers: 1 when disabled, else the configured
    /// limit or the CPU count.
    pub fn effective_concurrency(&self) -> usize {
        if !self.enabled {
            return 1;
        }
        self.max_concurrency
            .unwrap_or_else(num_cpus::get)
            .max(1)
    }
}
