// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # friday
//!
//! Incremental build-and-reload engine for the `friday` developer CLI.
//!
//! The crate keeps three independently running pieces consistent while the
//! filesystem changes underneath them:
//!
//! - a source-to-output file compiler ([`builder::TreeBuilder`]),
//! - a type/lint checker ([`typecheck::TypeCheckSession`], [`lint::Linter`]),
//! - the served HTTP application ([`server::ServerManager`]).
//!
//! The [`dev::DevOrchestrator`] wires them together: an initial full build,
//! per-file rebuilds on change, a restart of the application whenever its
//! own directory or the configuration directory changes, and a single
//! graceful shutdown that closes every watcher and the server exactly once.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use friday::builder::{BuildTarget, TreeBuilder};
//! use friday::compiler::CommandTransformer;
//!
//! let transformer = CommandTransformer::new("esbuild", ["{file}", "--format=cjs"]);
//! let builder = TreeBuilder::new(Arc::new(transformer));
//! let target = BuildTarget::new("src", "dist")?;
//! let result = builder.build_tree(&target).await?;
//! println!("compiled {} files", result.compiled);
//! ```

/// Tree Builder: full and per-file builds of a source tree.
pub mod builder;
/// Build Loop: initial build followed by per-file incremental rebuilds.
pub mod build_loop;
/// Single-file compilation through a pluggable transformer.
pub mod compiler;
/// Trailing-edge debouncing of watcher event streams.
pub mod debounce;
/// Dev Orchestrator: composes build loop, server and restart watchers.
pub mod dev;
/// Diagnostics reported by static analysis tools.
pub mod diagnostic;
/// Listen endpoints (TCP or UNIX socket) and port validation.
pub mod endpoint;
/// Error types.
pub mod error;
/// Linter contract and command-backed implementation.
pub mod lint;
/// Path mirroring and file classification.
pub mod paths;
/// External program invocation helpers.
pub mod process;
/// Server Lifecycle Manager and application contracts.
pub mod server;
/// Graceful shutdown signal handling.
pub mod shutdown;
/// Type-check contract and watch session.
pub mod typecheck;
/// File watching with ignore filtering.
pub mod watcher;

pub use error::{Error, Result};
