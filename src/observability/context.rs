//! Thread-local context tracking for crash reports.
//!
//! Each thread records the phase it is in and the project it is working on
//! (benchmark projects are analyzed on rayon workers, so the context is per
//! thread). Guards restore the previous context on drop.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

thread_local! {
    static CURRENT_CONTEXT: RefCell<RunContext> = const { RefCell::new(RunContext::new()) };
}

/// What this thread was doing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    pub phase: Option<Phase>,
    pub project: Option<PathBuf>,
}

impl RunContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: None,
            project: None,
        }
    }
}

/// Major stages of a qualmodel run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ModelLoading,
    ToolRun,
    Benchmark,
    WeightElicitation,
    Evaluation,
    OutputGeneration,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelLoading => write!(f, "model_loading"),
            Self::ToolRun => write!(f, "tool_run"),
            Self::Benchmark => write!(f, "benchmark"),
            Self::WeightElicitation => write!(f, "weight_elicitation"),
            Self::Evaluation => write!(f, "evaluation"),
            Self::OutputGeneration => write!(f, "output_generation"),
        }
    }
}

/// Restores the previous context when dropped.
pub struct ContextGuard {
    previous: RunContext,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|ctx| {
            *ctx.borrow_mut() = self.previous.clone();
        });
    }
}

fn update(f: impl FnOnce(&mut RunContext)) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let previous = ctx.borrow().clone();
        f(&mut ctx.borrow_mut());
        ContextGuard { previous }
    })
}

#[must_use]
pub fn set_phase(phase: Phase) -> ContextGuard {
    update(|ctx| ctx.phase = Some(phase))
}

#[must_use]
pub fn set_current_project(project: &Path) -> ContextGuard {
    update(|ctx| ctx.project = Some(project.to_path_buf()))
}

pub fn current_context() -> RunContext {
    CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_nest_and_restore() {
        assert_eq!(current_context(), RunContext::new());
        {
            let _phase = set_phase(Phase::Benchmark);
            {
                let _project = set_current_project(Path::new("/corpus/a"));
                let ctx = current_context();
                assert_eq!(ctx.phase, Some(Phase::Benchmark));
                assert_eq!(ctx.project.as_deref(), Some(Path::new("/corpus/a")));
            }
            assert!(current_context().project.is_none());
            assert_eq!(current_context().phase, Some(Phase::Benchmark));
        }
        assert_eq!(current_context(), RunContext::new());
    }

    #[test]
    fn test_context_is_per_thread() {
        let _phase = set_phase(Phase::Evaluation);
        let other = std::thread::spawn(current_context).join().unwrap();
        assert!(other.phase.is_none());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::WeightElicitation.to_string(), "weight_elicitation");
        assert_eq!(Phase::ToolRun.to_string(), "tool_run");
    }
}
