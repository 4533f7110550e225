// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Type checking.
//!
//! [`TypeChecker`] is the one-shot contract used by `lint`.
//! [`TypeCheckSession`] is the long-lived variant used by the build loop: it
//! tracks the set of root files and re-runs the checker on demand,
//! delivering diagnostics to a reporting callback.
//!
//! # Session modes
//!
//! A session either owns an explicit list of root files or follows a
//! project configuration file. Only the first can be edited in place; in
//! project mode [`TypeCheckSession::add_file`] and
//! [`TypeCheckSession::remove_file`] leave the session untouched and answer
//! [`FileSetUpdate::RecreateRequired`], and the caller recreates the
//! session to pick up the new file set.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::diagnostic::{Diagnostic, Severity};
use crate::error::{Error, Result};
use crate::process::{run_tool, ToolCommand};

/// "File not found". Reported transiently when a watched file was deleted
/// before the session dropped it.
pub const FILE_NOT_FOUND_CODE: u32 = 6053;

/// What a type check covers.
#[derive(Debug, Clone, Copy)]
pub enum CheckScope<'a> {
    /// Exactly these files.
    Files(&'a [PathBuf]),
    /// Everything the project configuration file includes.
    Project(&'a Path),
}

/// External type checker.
#[async_trait]
pub trait TypeChecker: Send + Sync {
    /// Checks the scope and returns every diagnostic found.
    async fn type_check(&self, scope: CheckScope<'_>) -> Result<Vec<Diagnostic>>;
}

fn tsc_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<file>.+?)\((?P<line>\d+),(?P<col>\d+)\): )?(?P<sev>error|warning) TS(?P<code>\d+): (?P<msg>.*)$",
        )
        .unwrap()
    })
}

/// Parses `tsc --pretty false` output. Continuation lines (indented
/// message chains) are appended to the preceding diagnostic. Relative file
/// names are resolved against `cwd`.
pub fn parse_tsc_output(output: &str, cwd: Option<&Path>) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    for line in output.lines() {
        if let Some(caps) = tsc_line_regex().captures(line) {
            let severity = match &caps["sev"] {
                "warning" => Severity::Warning,
                _ => Severity::Error,
            };
            let mut diagnostic = Diagnostic {
                filename: None,
                line: 0,
                column: 0,
                code: caps["code"].parse().ok(),
                severity,
                message: caps["msg"].to_string(),
            };
            if let Some(file) = caps.name("file") {
                let path = PathBuf::from(file.as_str());
                let path = match cwd {
                    Some(cwd) if path.is_relative() => cwd.join(path),
                    _ => path,
                };
                diagnostic.filename = Some(path);
                diagnostic.line = caps["line"].parse().unwrap_or(0);
                diagnostic.column = caps["col"].parse().unwrap_or(0);
            }
            diagnostics.push(diagnostic);
        } else if line.starts_with(' ') && !line.trim().is_empty() {
            if let Some(last) = diagnostics.last_mut() {
                last.message.push('\n');
                last.message.push_str(line.trim());
            }
        }
    }

    diagnostics
}

/// Type checker that runs `tsc` (or a compatible program).
#[derive(Debug, Clone)]
pub struct CommandTypeChecker {
    command: ToolCommand,
    cwd: Option<PathBuf>,
}

impl CommandTypeChecker {
    /// Creates a checker from a configured command.
    pub fn new(command: ToolCommand) -> Self {
        Self { command, cwd: None }
    }

    /// Runs the checker from `dir`.
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The underlying command.
    pub fn command(&self) -> &ToolCommand {
        &self.command
    }
}

impl Default for CommandTypeChecker {
    fn default() -> Self {
        Self::new(ToolCommand::new("tsc", ["--noEmit", "--pretty", "false"]))
    }
}

#[async_trait]
impl TypeChecker for CommandTypeChecker {
    async fn type_check(&self, scope: CheckScope<'_>) -> Result<Vec<Diagnostic>> {
        let args = match scope {
            CheckScope::Files(files) => {
                if files.is_empty() {
                    return Ok(Vec::new());
                }
                let inputs: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
                self.command.expand_args(&inputs)
            }
            CheckScope::Project(config) => {
                let mut args = self.command.expand_args(&[]);
                args.push("--project".into());
                args.push(config.as_os_str().to_os_string());
                args
            }
        };

        let output = run_tool(&self.command, args, self.cwd.as_deref()).await?;
        let cwd = match &self.cwd {
            Some(dir) => Some(dir.clone()),
            None => std::env::current_dir().ok(),
        };
        let diagnostics = parse_tsc_output(&output.stdout, cwd.as_deref());

        if !output.success && diagnostics.is_empty() {
            let reason = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(Error::tool(&self.command.program, reason));
        }
        Ok(diagnostics)
    }
}

/// How a session determines its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Editable set of root files.
    ExplicitFiles(BTreeSet<PathBuf>),
    /// Files come from this project configuration; the set cannot be edited.
    ProjectConfig(PathBuf),
}

/// Outcome of [`TypeCheckSession::add_file`] and
/// [`TypeCheckSession::remove_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSetUpdate {
    /// The root set changed.
    Applied,
    /// The file was already present (or absent).
    Unchanged,
    /// Project mode: recreate the session to observe the change.
    RecreateRequired,
}

/// Callback receiving the diagnostics of each check.
pub type DiagnosticReporter = Arc<dyn Fn(&[Diagnostic]) + Send + Sync>;

/// Long-lived type-check session.
pub struct TypeCheckSession {
    checker: Arc<dyn TypeChecker>,
    mode: SessionMode,
    reporter: DiagnosticReporter,
    generation: u64,
    closed: bool,
}

impl TypeCheckSession {
    /// Starts a session. When `project_config` is given and exists the
    /// session follows it; otherwise it checks `root_files`.
    pub fn start(
        checker: Arc<dyn TypeChecker>,
        root_files: impl IntoIterator<Item = PathBuf>,
        project_config: Option<&Path>,
        reporter: DiagnosticReporter,
    ) -> Self {
        let mode = match project_config {
            Some(config) if config.is_file() => {
                tracing::debug!("Found project config at {}", config.display());
                SessionMode::ProjectConfig(config.to_path_buf())
            }
            _ => SessionMode::ExplicitFiles(root_files.into_iter().collect()),
        };

        Self {
            checker,
            mode,
            reporter,
            generation: 0,
            closed: false,
        }
    }

    /// The session mode.
    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    /// Whether the file set comes from a project configuration.
    pub fn uses_project_config(&self) -> bool {
        matches!(self.mode, SessionMode::ProjectConfig(_))
    }

    /// Root files in explicit mode; empty in project mode.
    pub fn root_files(&self) -> Vec<PathBuf> {
        match &self.mode {
            SessionMode::ExplicitFiles(files) => files.iter().cloned().collect(),
            SessionMode::ProjectConfig(_) => Vec::new(),
        }
    }

    /// How many times the session has been recreated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Adds a root file.
    pub fn add_file(&mut self, path: &Path) -> FileSetUpdate {
        match &mut self.mode {
            SessionMode::ExplicitFiles(files) => {
                if files.insert(path.to_path_buf()) {
                    FileSetUpdate::Applied
                } else {
                    FileSetUpdate::Unchanged
                }
            }
            SessionMode::ProjectConfig(_) => FileSetUpdate::RecreateRequired,
        }
    }

    /// Removes a root file.
    pub fn remove_file(&mut self, path: &Path) -> FileSetUpdate {
        match &mut self.mode {
            SessionMode::ExplicitFiles(files) => {
                if files.remove(path) {
                    FileSetUpdate::Applied
                } else {
                    FileSetUpdate::Unchanged
                }
            }
            SessionMode::ProjectConfig(_) => FileSetUpdate::RecreateRequired,
        }
    }

    /// Drops any state derived from the old file set and reopens the
    /// session.
    pub fn recreate(&mut self) {
        self.generation += 1;
        self.closed = false;
        tracing::debug!(generation = self.generation, "Recreated type-check session");
    }

    /// Runs the checker, reports the diagnostics and returns them.
    ///
    /// File-not-found diagnostics are dropped. A closed session reports
    /// nothing.
    pub async fn check(&self) -> Result<Vec<Diagnostic>> {
        if self.closed {
            return Ok(Vec::new());
        }

        let diagnostics = match &self.mode {
            SessionMode::ExplicitFiles(files) => {
                let files: Vec<PathBuf> = files.iter().cloned().collect();
                self.checker.type_check(CheckScope::Files(&files)).await?
            }
            SessionMode::ProjectConfig(config) => {
                self.checker.type_check(CheckScope::Project(config)).await?
            }
        };

        let diagnostics: Vec<Diagnostic> = diagnostics
            .into_iter()
            .filter(|d| d.code != Some(FILE_NOT_FOUND_CODE))
            .collect();

        if !diagnostics.is_empty() {
            (self.reporter)(&diagnostics);
        }
        Ok(diagnostics)
    }

    /// Closes the session. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            tracing::debug!("Closed type-check session");
        }
    }

    /// Whether the session is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
