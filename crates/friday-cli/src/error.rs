// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Command outcomes that end the process with a failure code.

use thiserror::Error;

/// Failures a command reports after it ran to completion.
///
/// These are the user's to fix (exit code 1), unlike operational errors
/// from [`friday::Error`] which mostly exit with 2.
#[derive(Debug, Error)]
pub enum CliError {
    /// Some files failed to compile.
    #[error("{0} file(s) failed to compile")]
    BuildFailed(usize),

    /// The type checker reported problems.
    #[error("type-check failed: {0}")]
    TypeCheckFailed(String),

    /// The linter reported errors.
    #[error("lint failed with {0} error(s)")]
    LintFailed(usize),
}

/// Process exit code for a command error.
///
/// [`CliError`] exits with 1; [`friday::Error`] with its own code; anything
/// else with 2.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.downcast_ref::<CliError>().is_some() {
            return 1;
        }
        if let Some(e) = cause.downcast_ref::<friday::Error>() {
            return if e.is_config() { 1 } else { 2 };
        }
    }
    2
}
