// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Linter contract and a command-backed implementation.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{Error, Result};
use crate::process::{run_tool, ToolCommand};

/// Options forwarded to the linter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintOptions {
    /// Apply automatic fixes.
    pub fix: bool,
}

/// Aggregated linter result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    /// Number of errors.
    pub error_count: usize,
    /// Number of warnings.
    pub warning_count: usize,
    /// Formatted output, ready to print.
    pub message: String,
}

impl LintReport {
    /// True when the report contains errors; warnings never block.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// True when there is nothing to report at all.
    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.warning_count == 0
    }
}

/// A static analysis tool producing error and warning counts.
#[async_trait]
pub trait Linter: Send + Sync {
    /// Lints the given files or directories.
    async fn lint_files(&self, paths: &[PathBuf], options: &LintOptions) -> Result<LintReport>;
}

fn summary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+) errors?, (\d+) warnings?\)").unwrap())
}

/// Extracts `(errors, warnings)` from a stylish-formatted summary line.
pub fn parse_summary(output: &str) -> Option<(usize, usize)> {
    let caps = summary_regex().captures_iter(output).last()?;
    let errors = caps.get(1)?.as_str().parse().ok()?;
    let warnings = caps.get(2)?.as_str().parse().ok()?;
    Some((errors, warnings))
}

/// Linter that runs an external program (eslint by default).
///
/// Exit status 0 or 1 is a completed run; anything else is a tool failure.
/// A failing run without a parseable summary counts as one error.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    command: ToolCommand,
    cwd: Option<PathBuf>,
}

impl CommandLinter {
    /// Creates a linter from a configured command.
    pub fn new(command: ToolCommand) -> Self {
        Self { command, cwd: None }
    }

    /// Runs the linter from `dir`.
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The underlying command.
    pub fn command(&self) -> &ToolCommand {
        &self.command
    }
}

impl Default for CommandLinter {
    fn default() -> Self {
        Self::new(ToolCommand::new("eslint", ["--format", "stylish"]))
    }
}

#[async_trait]
impl Linter for CommandLinter {
    async fn lint_files(&self, paths: &[PathBuf], options: &LintOptions) -> Result<LintReport> {
        let inputs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
        let mut args = self.command.expand_args(&inputs);
        if options.fix {
            args.insert(0, "--fix".into());
        }

        let output = run_tool(&self.command, args, self.cwd.as_deref()).await?;
        let message = output.stdout.trim_end().to_string();

        match output.code {
            Some(0) | Some(1) => {}
            _ => {
                let reason = if output.stderr.trim().is_empty() {
                    message.clone()
                } else {
                    output.stderr.trim().to_string()
                };
                return Err(Error::tool(&self.command.program, reason));
            }
        }

        let (error_count, warning_count) = match parse_summary(&message) {
            Some(counts) => counts,
            None if !output.success => (1, 0),
            None => (0, 0),
        };

        Ok(LintReport {
            error_count,
            warning_count,
            message,
        })
    }
}
