//! Lines-of-code provider.
//!
//! Counts code lines (non-blank, non-comment) across a project's source files
//! and reports the total as a single metric finding on the `loc` diagnostic.
//! The project turns that diagnostic into the normalization baseline.
//!
//! Comment detection is per extension: line markers plus optional block
//! delimiters, with nesting where the language allows it. Comment markers
//! inside string literals are not recognized.

use std::collections::BTreeMap;
use std::path::Path;

use glob::Pattern;
use ignore::WalkBuilder;

use super::{index_reports, DiagnosticReport, Tool, ToolOutput, LOC_DIAGNOSTIC};
use crate::config::LocConfig;
use crate::errors::{ModelError, Result};
use crate::model::Finding;

/// Comment markers for one family of languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    pub line: &'static [&'static str],
    pub block: Option<(&'static str, &'static str)>,
    pub nested: bool,
}

impl CommentSyntax {
    const C_LIKE: Self = Self {
        line: &["//"],
        block: Some(("/*", "*/")),
        nested: false,
    };
    const RUST: Self = Self {
        line: &["//"],
        block: Some(("/*", "*/")),
        nested: true,
    };
    const HASH: Self = Self {
        line: &["#"],
        block: None,
        nested: false,
    };
    const PYTHON: Self = Self {
        line: &["#"],
        block: Some(("\"\"\"", "\"\"\"")),
        nested: false,
    };
    const DASH: Self = Self {
        line: &["--"],
        block: Some(("/*", "*/")),
        nested: false,
    };
    const PLAIN: Self = Self {
        line: &[],
        block: None,
        nested: false,
    };

    /// Syntax for a file extension. Unknown extensions count every
    /// non-blank line as code.
    pub fn for_extension(ext: &str) -> Self {
        match ext {
            "rs" => Self::RUST,
            "py" | "pyi" => Self::PYTHON,
            "c" | "h" | "cc" | "cpp" | "hpp" | "cs" | "java" | "kt" | "go" | "js" | "jsx"
            | "mjs" | "cjs" | "ts" | "tsx" | "swift" | "scala" | "php" => Self::C_LIKE,
            "sh" | "bash" | "rb" | "pl" | "r" | "yml" | "yaml" | "toml" => Self::HASH,
            "sql" | "lua" => Self::DASH,
            _ => Self::PLAIN,
        }
    }
}

/// Line classification totals for a file or a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocCount {
    pub physical: usize,
    pub code: usize,
    pub comment: usize,
    pub blank: usize,
}

impl LocCount {
    fn add(&mut self, other: LocCount) {
        self.physical += other.physical;
        self.code += other.code;
        self.comment += other.comment;
        self.blank += other.blank;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Code,
}

/// Counts lines in files selected by a [`LocConfig`].
#[derive(Debug, Clone)]
pub struct LocCounter {
    config: LocConfig,
    excludes: Vec<Pattern>,
}

impl Default for LocCounter {
    fn default() -> Self {
        Self::new(LocConfig::default())
    }
}

impl LocCounter {
    pub fn new(config: LocConfig) -> Self {
        let excludes = config
            .exclude_patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    log::warn!("Ignoring invalid exclude pattern '{}': {}", raw, e);
                    None
                }
            })
            .collect();
        Self { config, excludes }
    }

    /// Classify every line of `content` using `syntax`.
    pub fn count_content(&self, content: &str, syntax: CommentSyntax) -> LocCount {
        let mut count = LocCount::default();
        let mut depth = 0usize;

        for line in content.lines() {
            count.physical += 1;
            match classify(line.trim(), syntax, &mut depth) {
                LineKind::Blank => count.blank += 1,
                LineKind::Comment => count.comment += 1,
                LineKind::Code => count.code += 1,
            }
        }
        count
    }

    pub fn count_file(&self, path: &Path) -> Result<LocCount> {
        let content = std::fs::read_to_string(path)?;
        let syntax = CommentSyntax::for_extension(extension(path));
        Ok(self.count_content(&content, syntax))
    }

    /// Whether a file under `root` takes part in the count.
    pub fn should_include(&self, root: &Path, path: &Path) -> bool {
        let ext = extension(path);
        if !self.config.extensions.iter().any(|e| e == ext) {
            return false;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !self.config.include_tests && is_test_file(relative) {
            log::trace!("Skipping test file: {}", relative.display());
            return false;
        }
        if self.excludes.iter().any(|p| p.matches_path(relative)) {
            log::trace!("Skipping excluded file: {}", relative.display());
            return false;
        }
        if !self.config.include_generated && is_generated(path) {
            log::trace!("Skipping generated file: {}", relative.display());
            return false;
        }
        true
    }

    /// Totals for every included file under `root`. Unreadable files are
    /// skipped with a debug log.
    pub fn count_project(&self, root: &Path) -> Result<LocCount> {
        if !root.is_dir() {
            return Err(ModelError::tool(
                LOC_DIAGNOSTIC,
                format!("project directory not found: {}", root.display()),
            ));
        }

        let mut total = LocCount::default();
        let walker = WalkBuilder::new(root).hidden(true).git_ignore(true).build();
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.should_include(root, path) {
                continue;
            }
            match self.count_file(path) {
                Ok(count) => total.add(count),
                Err(e) => log::debug!("Could not count {}: {}", path.display(), e),
            }
        }
        Ok(total)
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

fn is_test_file(relative: &Path) -> bool {
    let in_test_dir = relative
        .components()
        .any(|c| matches!(c.as_os_str().to_str(), Some("tests" | "test")));
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    in_test_dir || stem.starts_with("test_") || stem.ends_with("_test") || stem.ends_with("_tests")
}

fn is_generated(path: &Path) -> bool {
    let name = path.to_string_lossy();
    if name.contains(".generated.") || name.ends_with(".g.rs") || name.ends_with("_pb2.py") {
        return true;
    }
    std::fs::read_to_string(path)
        .map(|content| {
            content.lines().take(20).any(|line| {
                line.contains("@generated")
                    || line.contains("DO NOT EDIT")
                    || line.contains("automatically generated")
            })
        })
        .unwrap_or(false)
}

/// Classify one trimmed line, updating the open block-comment depth.
fn classify(line: &str, syntax: CommentSyntax, depth: &mut usize) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }

    let Some((open, close)) = syntax.block else {
        return if starts_line_comment(line, syntax) {
            LineKind::Comment
        } else {
            LineKind::Code
        };
    };

    let mut rest = line;
    let mut has_code = false;
    while !rest.is_empty() {
        if *depth > 0 {
            let next_close = rest.find(close);
            let next_open = if syntax.nested { rest.find(open) } else { None };
            match (next_open, next_close) {
                (Some(o), Some(c)) if o < c => {
                    *depth += 1;
                    rest = &rest[o + open.len()..];
                }
                (_, Some(c)) => {
                    *depth -= 1;
                    rest = &rest[c + close.len()..];
                }
                (Some(o), None) => {
                    *depth += 1;
                    rest = &rest[o + open.len()..];
                }
                (None, None) => break,
            }
            continue;
        }

        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        if starts_line_comment(trimmed, syntax) {
            break;
        }
        match trimmed.find(open) {
            Some(0) => {
                *depth = 1;
                rest = &trimmed[open.len()..];
            }
            Some(idx) => {
                has_code |= !code_prefix_is_comment(&trimmed[..idx], syntax);
                *depth = 1;
                rest = &trimmed[idx + open.len()..];
            }
            None => {
                has_code = true;
                break;
            }
        }
    }

    if has_code {
        LineKind::Code
    } else {
        LineKind::Comment
    }
}

fn starts_line_comment(line: &str, syntax: CommentSyntax) -> bool {
    // `#[attr]` and `#!` are code in Rust-like syntaxes, which never use `#` markers
    syntax.line.iter().any(|marker| line.starts_with(marker))
}

fn code_prefix_is_comment(prefix: &str, syntax: CommentSyntax) -> bool {
    let prefix = prefix.trim();
    prefix.is_empty() || starts_line_comment(prefix, syntax)
}

/// Lines-of-code adapter exposing the `loc` diagnostic.
#[derive(Debug, Clone, Default)]
pub struct LocTool {
    counter: LocCounter,
}

impl LocTool {
    pub fn new(config: LocConfig) -> Self {
        Self {
            counter: LocCounter::new(config),
        }
    }
}

impl Tool for LocTool {
    fn name(&self) -> &str {
        LOC_DIAGNOSTIC
    }

    fn analyze(&self, project: &Path) -> Result<ToolOutput> {
        let count = self.counter.count_project(project)?;
        log::debug!(
            "{}: {} code lines ({} physical)",
            project.display(),
            count.code,
            count.physical
        );
        let report = DiagnosticReport::new(LOC_DIAGNOSTIC, LOC_DIAGNOSTIC)
            .with_finding(Finding::metric(project, count.code as f64));
        Ok(ToolOutput::Inline(vec![report]))
    }

    fn parse_result(&self, output: &ToolOutput) -> Result<BTreeMap<String, DiagnosticReport>> {
        match output {
            ToolOutput::Inline(reports) => Ok(index_reports(reports.iter().cloned())),
            ToolOutput::Report(path) => Err(ModelError::tool(
                LOC_DIAGNOSTIC,
                format!("unexpected report file {}", path.display()),
            )),
        }
    }
}
