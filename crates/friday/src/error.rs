// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the friday dev loop.
//!
//! This module defines [`Error`], the single error enum shared by every
//! component, and the [`Result`] alias.
//!
//! # Error Categories
//!
//! - **Configuration errors**: bad ports, conflicting options, unknown
//!   endpoint schemes, missing tools. Detected before any side effect.
//! - **I/O and watch errors**: filesystem and notification failures.
//! - **Tool errors**: an external transformer, linter or type checker
//!   could not be run.
//! - **Server errors**: binding, hooks, application construction and the
//!   restart sequence.
//!
//! [`Error::exit_code`] maps each category onto the CLI exit-code convention.

use std::path::PathBuf;
use thiserror::Error;

use crate::server::Hook;

/// The main error type for friday operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A port value outside 1..=65535 or not a number.
    #[error("Port option must be a number between 1 and 65535 but got: {0}")]
    InvalidPort(String),

    /// A `--listen` URI with a scheme other than tcp, http or unix.
    #[error("Unknown --listen endpoint scheme (protocol): {0}")]
    UnknownScheme(String),

    /// Mutually exclusive options were supplied together.
    #[error("Conflicting options: {0}")]
    ConflictingOptions(String),

    /// A path that should live under the source root does not.
    #[error("{} is not inside the source directory {}", path.display(), root.display())]
    OutsideSourceRoot {
        /// Offending path.
        path: PathBuf,
        /// Source root it was expected under.
        root: PathBuf,
    },

    /// A required external program is not installed.
    #[error("Required tool `{0}` was not found on PATH")]
    ToolMissing(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Copying a passthrough file failed.
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        /// Source file.
        from: PathBuf,
        /// Destination file.
        to: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Filesystem notification failure.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid ignore glob.
    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    /// An external tool could not be executed.
    #[error("Tool `{tool}` failed: {message}")]
    Tool {
        /// Program name.
        tool: String,
        /// Failure description.
        message: String,
    },

    /// Binding the listen endpoint failed.
    #[error("Failed to listen on {endpoint}: {source}")]
    Bind {
        /// Endpoint display string.
        endpoint: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A lifecycle hook returned an error.
    #[error("Hook `{hook}` failed: {message}")]
    Hook {
        /// Hook that failed.
        hook: Hook,
        /// Failure description.
        message: String,
    },

    /// The application factory could not build an instance.
    #[error("Application error: {0}")]
    App(String),

    /// The restart sequence failed; the served application is in an
    /// indeterminate state.
    #[error("Failed to restart the server: {0}")]
    Restart(#[source] Box<Error>),
}

impl Error {
    /// Returns true for errors caused by user input or configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InvalidPort(_)
                | Error::UnknownScheme(_)
                | Error::ConflictingOptions(_)
                | Error::OutsideSourceRoot { .. }
                | Error::ToolMissing(_)
                | Error::Glob(_)
        )
    }

    /// Process exit code for this error: 1 for configuration errors,
    /// 2 for operational failures.
    pub fn exit_code(&self) -> i32 {
        if self.is_config() {
            1
        } else {
            2
        }
    }

    /// Builds a [`Error::Tool`] from any displayable failure.
    pub fn tool(tool: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.to_string(),
        }
    }
}

/// Convenience type alias for friday results.
pub type Result<T> = std::result::Result<T, Error>;
