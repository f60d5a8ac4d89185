//! Runtime setup for the binary: crash reports and logging.
//!
//! Benchmark parallelism is not configured here; `calibrate` sizes its own
//! worker pool from `[parallel]` and `--jobs`.

use crate::observability;

pub fn init_runtime(verbosity: u8) {
    observability::install_panic_hook();
    observability::init_logging(verbosity);
}
