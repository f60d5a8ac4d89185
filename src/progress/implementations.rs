//! Progress sink implementations.
//!
//! | Use Case | Implementation |
//! |----------|----------------|
//! | Unit tests | [`SilentProgressSink`] or [`RecordingProgressSink`] |
//! | CI, piped output | [`SilentProgressSink`] |
//! | CLI on a terminal | [`CliProgressSink`] |
//!
//! # Example: Using RecordingProgressSink in Tests
//!
//! ```rust
//! use qualmodel::progress::implementations::{ProgressEvent, RecordingProgressSink};
//! use qualmodel::progress::traits::ProgressSink;
//!
//! let recorder = RecordingProgressSink::new();
//!
//! recorder.start_stage("Benchmark");
//! recorder.report("Benchmark", 1, 10);
//! recorder.complete_stage("Benchmark");
//!
//! let events = recorder.events();
//! assert_eq!(events.len(), 3);
//! assert!(matches!(events[0], ProgressEvent::StartStage { .. }));
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::traits::ProgressSink;
use super::{ProgressConfig, TEMPLATE_PROJECTS};

/// No-op sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentProgressSink;

impl ProgressSink for SilentProgressSink {
    #[inline]
    fn report(&self, _stage: &str, _current: usize, _total: usize) {}

    #[inline]
    fn start_stage(&self, _name: &str) {}

    #[inline]
    fn complete_stage(&self, _name: &str) {}

    #[inline]
    fn warn(&self, _message: &str) {}
}

/// Terminal sink backed by an indicatif bar.
///
/// The bar is hidden when progress should not be shown (quiet mode, stderr
/// not a TTY). Warnings are always printed to stderr, above the bar.
#[derive(Debug)]
pub struct CliProgressSink {
    config: ProgressConfig,
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressSink {
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            config,
            bar: Mutex::new(None),
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_bar(&self, name: &str) -> ProgressBar {
        if !self.config.should_show_progress() {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(0);
        // the template is a constant, a parse failure means a typo there
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE_PROJECTS) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }
}

impl Default for CliProgressSink {
    fn default() -> Self {
        Self::new(ProgressConfig::default())
    }
}

impl ProgressSink for CliProgressSink {
    fn report(&self, _stage: &str, current: usize, total: usize) {
        if let Some(bar) = self.bar().as_ref() {
            bar.set_length(total as u64);
            bar.set_position(current.min(total) as u64);
        }
    }

    fn start_stage(&self, name: &str) {
        let bar = self.create_bar(name);
        if let Some(previous) = self.bar().replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn complete_stage(&self, name: &str) {
        if let Some(bar) = self.bar().take() {
            bar.finish_with_message(format!("{name} complete"));
        }
    }

    fn warn(&self, message: &str) {
        match self.bar().as_ref() {
            Some(bar) => bar.suspend(|| eprintln!("Warning: {message}")),
            None => eprintln!("Warning: {message}"),
        }
    }
}

/// Event captured by [`RecordingProgressSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Report {
        stage: String,
        current: usize,
        total: usize,
    },
    StartStage {
        name: String,
    },
    CompleteStage {
        name: String,
    },
    Warn {
        message: String,
    },
}

/// Captures events for tests. Event order across threads is not
/// deterministic.
#[derive(Clone, Debug, Default)]
pub struct RecordingProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProgressEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: ProgressEvent) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.lock().clone()
    }

    /// Names of started stages, in order.
    pub fn stages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::StartStage { name } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn completed_stages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::CompleteStage { name } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Warn { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl ProgressSink for RecordingProgressSink {
    fn report(&self, stage: &str, current: usize, total: usize) {
        self.push(ProgressEvent::Report {
            stage: stage.to_string(),
            current,
            total,
        });
    }

    fn start_stage(&self, name: &str) {
        self.push(ProgressEvent::StartStage {
            name: name.to_string(),
        });
    }

    fn complete_stage(&self, name: &str) {
        self.push(ProgressEvent::CompleteStage {
            name: name.to_string(),
        });
    }

    fn warn(&self, message: &str) {
        self.push(ProgressEvent::Warn {
            message: message.to_string(),
        });
    }
}
