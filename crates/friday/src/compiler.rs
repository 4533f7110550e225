// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Single-file compilation.
//!
//! A [`Transformer`] turns one source file into emitted code. [`compile`]
//! wraps it so that every failure, including a transform that produced
//! nothing, comes back as a [`CompileFailure`] value instead of an error,
//! letting batch builds carry on with the remaining files.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::paths::normalize_error_message;
use crate::process::{run_tool, ToolCommand};

/// Message recorded when a transform returns no code.
pub const NO_CODE_GENERATED: &str = "no code was generated";

/// External source-to-output transform.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transforms one file. `Ok(None)` means the tool produced no output.
    async fn transform(&self, path: &Path) -> Result<Option<String>>;
}

/// Why a single file failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    /// Human-readable reason.
    pub message: String,
}

impl CompileFailure {
    /// Creates a failure with a normalized message.
    pub fn new(message: impl AsRef<str>) -> Self {
        Self {
            message: normalize_error_message(message.as_ref()),
        }
    }
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Compiles one file, folding every failure into [`CompileFailure`].
pub async fn compile(
    transformer: &dyn Transformer,
    path: &Path,
) -> std::result::Result<String, CompileFailure> {
    match transformer.transform(path).await {
        Ok(Some(code)) if !code.is_empty() => Ok(code),
        Ok(_) => Err(CompileFailure::new(NO_CODE_GENERATED)),
        // The tool's own reason, without the "Tool `x` failed" wrapper
        Err(Error::Tool { message, .. }) => Err(CompileFailure::new(message)),
        Err(e) => Err(CompileFailure::new(e.to_string())),
    }
}

/// Transformer that runs an external program and captures its stdout.
///
/// A non-zero exit status is a failure carrying stderr.
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    command: ToolCommand,
    cwd: Option<PathBuf>,
}

impl CommandTransformer {
    /// Creates a transformer for `program` with an argument template.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_command(ToolCommand::new(program, args))
    }

    /// Creates a transformer from a configured [`ToolCommand`].
    pub fn from_command(command: ToolCommand) -> Self {
        Self { command, cwd: None }
    }

    /// Runs the program from `dir`.
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The underlying command.
    pub fn command(&self) -> &ToolCommand {
        &self.command
    }
}

#[async_trait]
impl Transformer for CommandTransformer {
    async fn transform(&self, path: &Path) -> Result<Option<String>> {
        let args = self.command.expand_args(&[path]);
        let output = run_tool(&self.command, args, self.cwd.as_deref()).await?;

        if !output.success {
            let message = if output.stderr.trim().is_empty() {
                format!("exited with status {}", output.code.unwrap_or(-1))
            } else {
                normalize_error_message(output.stderr.trim())
            };
            return Err(Error::tool(&self.command.program, message));
        }

        if output.stdout.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }
}
