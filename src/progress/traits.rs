//! Progress sink trait.
//!
//! Long-running operations (benchmark derivation over a corpus) receive a
//! sink as a parameter and report through it. Nothing in the library keeps
//! global progress state.
//!
//! All implementations must be `Send + Sync`: projects are analyzed on a
//! rayon pool and may report from several threads at once.

/// Receives progress updates.
///
/// Methods must be cheap and non-blocking, and must not panic on odd input
/// such as `current > total`.
pub trait ProgressSink: Send + Sync + 'static {
    /// `current` items of `total` are done in `stage`.
    fn report(&self, stage: &str, current: usize, total: usize);

    fn start_stage(&self, name: &str);

    /// Called when a stage finishes, successfully or not.
    fn complete_stage(&self, name: &str);

    /// Report a warning without interrupting progress.
    fn warn(&self, message: &str);
}
