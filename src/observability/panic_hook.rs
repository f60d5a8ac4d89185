//! Panic hook that prints a crash report with the run context.

use super::context::{current_context, RunContext};
use std::panic::PanicHookInfo;
use tracing::Span;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const RULE: &str = "════════════════════════════════════════════════════════════════════════════════";

/// Install the crash-report hook. Call once, early in `main`.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        eprint!("{}", crash_report(info, &current_context()));
    }));
}

fn crash_report(info: &PanicHookInfo<'_>, context: &RunContext) -> String {
    let mut lines = vec![
        String::new(),
        RULE.to_string(),
        format!("qualmodel {VERSION} crashed ({})", std::env::consts::OS),
        format!("  time:     {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
        format!("  panic:    {}", panic_message(info)),
    ];
    if let Some(location) = info.location() {
        lines.push(format!(
            "  location: {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ));
    }
    lines.extend(context_lines(context));
    if let Some(metadata) = Span::current().metadata() {
        lines.push(format!("  span:     {}", metadata.name()));
    }

    if std::env::var("RUST_BACKTRACE").is_ok() {
        lines.push(RULE.to_string());
        lines.push(std::backtrace::Backtrace::capture().to_string());
    } else {
        lines.push("Run with RUST_BACKTRACE=1 for a stack trace".to_string());
        lines.push(RULE.to_string());
    }
    lines.push(String::new());
    lines.join("\n")
}

fn context_lines(context: &RunContext) -> Vec<String> {
    let mut lines = vec![match context.phase {
        Some(phase) => format!("  phase:    {phase}"),
        None => "  phase:    (not set)".to_string(),
    }];
    if let Some(project) = &context.project {
        lines.push(format!("  project:  {}", project.display()));
    }
    lines
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
