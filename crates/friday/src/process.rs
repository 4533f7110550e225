// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Invocation of external programs (transformers, linters, type checkers).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Placeholder in tool arguments replaced by the file being processed.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// A program plus its argument template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Program name (looked up on `PATH`) or path.
    pub program: String,
    /// Arguments; `{file}` is substituted with the input path(s).
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Creates a tool command.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Expands the argument template for the given inputs.
    ///
    /// Each `{file}` argument expands to every input; when the template has
    /// no placeholder the inputs are appended.
    pub fn expand_args(&self, inputs: &[&Path]) -> Vec<OsString> {
        let mut args = Vec::with_capacity(self.args.len() + inputs.len());
        let mut substituted = false;
        for arg in &self.args {
            if arg == FILE_PLACEHOLDER {
                args.extend(inputs.iter().map(|p| p.as_os_str().to_os_string()));
                substituted = true;
            } else {
                args.push(OsString::from(arg));
            }
        }
        if !substituted {
            args.extend(inputs.iter().map(|p| p.as_os_str().to_os_string()));
        }
        args
    }

    /// Fails with [`Error::ToolMissing`] unless the program can be found.
    pub fn ensure_available(&self) -> Result<PathBuf> {
        find_program(&self.program).ok_or_else(|| Error::ToolMissing(self.program.clone()))
    }
}

/// Captured result of a finished tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, when the process was not killed by a signal.
    pub code: Option<i32>,
    /// Standard output as UTF-8 (lossy).
    pub stdout: String,
    /// Standard error as UTF-8 (lossy).
    pub stderr: String,
}

/// Locates a program on `PATH`, or checks an explicit path exists.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    which::which(program).ok()
}

/// Runs a tool to completion and captures its output.
pub async fn run_tool(command: &ToolCommand, args: Vec<OsString>, cwd: Option<&Path>) -> Result<ToolOutput> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    tracing::trace!(program = %command.program, ?args, "Running tool");

    let output = cmd
        .output()
        .await
        .map_err(|e| Error::tool(&command.program, e))?;

    Ok(ToolOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
