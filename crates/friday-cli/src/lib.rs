// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Friday CLI library.
//!
//! This crate provides the command-line interface on top of the `friday`
//! engine: argument parsing, `friday.toml` configuration, terminal output
//! and exit codes.
//!
//! # Usage
//!
//! This crate is primarily used through the `friday` binary:
//!
//! ```bash
//! friday          # Serve the built application (same as `friday start`)
//! friday dev      # Build, serve and restart on change
//! friday build    # Compile src/ into dist/
//! friday lint     # Type-check and lint
//! ```
//!
//! # Exit codes
//!
//! - `0` success
//! - `1` configuration errors, failed files, type-check or lint problems
//! - `2` unexpected operational failures

/// Command-line arguments.
pub mod cli;
/// CLI commands (start, dev, build, lint).
pub mod commands;
/// Project configuration from `friday.toml` and environment variables.
pub mod config;
/// Command failures and exit codes.
pub mod error;
/// Terminal output helpers.
pub mod ui;
