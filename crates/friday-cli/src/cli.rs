// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Mode;

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "friday")]
#[command(version)]
#[command(about = "Build, lint and dev-serve with incremental rebuilds and restarts", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Verbose mode: debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Command to run (default: start)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments of the default `start` command
    #[command(flatten)]
    pub start: StartArgs,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the built application in production mode
    Start(StartArgs),
    /// Build, serve and restart on change
    Dev(DevArgs),
    /// Compile the source directory into the output directory
    Build(BuildArgs),
    /// Type-check and lint the source directory
    Lint(LintArgs),
}

/// Where to listen, shared by `start` and `dev`.
#[derive(Debug, Default, Clone, Args)]
pub struct ListenArgs {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<String>,
    /// Endpoint URI: tcp://host:port, http://host:port or unix:/path
    #[arg(short, long)]
    pub listen: Option<String>,
    /// Path to a UNIX socket, same as `--listen unix:<path>`
    #[arg(short = 'n', long, conflicts_with = "listen")]
    pub unix_socket: Option<String>,
}

impl ListenArgs {
    /// The `--listen` URI with `--unix-socket` folded in.
    pub fn listen_uri(&self) -> Option<String> {
        self.listen
            .clone()
            .or_else(|| self.unix_socket.as_ref().map(|path| format!("unix:{}", path)))
    }

    /// Whether `--port` or an endpoint URI was given, making `PORT`
    /// irrelevant.
    pub fn overrides_port(&self) -> bool {
        self.port.is_some() || self.listen.is_some() || self.unix_socket.is_some()
    }
}

/// `friday start` arguments.
#[derive(Debug, Default, Clone, Args)]
pub struct StartArgs {
    /// Listen endpoint
    #[command(flatten)]
    pub endpoint: ListenArgs,
}

/// `friday dev` arguments.
#[derive(Debug, Default, Args)]
pub struct DevArgs {
    /// Listen endpoint
    #[command(flatten)]
    pub endpoint: ListenArgs,
    /// Keep the previous output
    #[arg(long)]
    pub no_clean: bool,
    /// Serve the source directory without building
    #[arg(long)]
    pub no_build: bool,
    /// Watch without the initial full build
    #[arg(long)]
    pub skip_initial_build: bool,
    /// Rebuild without linting first
    #[arg(long)]
    pub no_lint: bool,
    /// Output directory
    #[arg(long)]
    pub dist: Option<String>,
}

/// `friday build` arguments.
#[derive(Debug, Default, Args)]
pub struct BuildArgs {
    /// Remove the output directory first (default)
    #[arg(long, overrides_with = "no_clean")]
    pub clean: bool,
    /// Keep the previous output
    #[arg(long)]
    pub no_clean: bool,
    /// Keep watching and rebuild changed files
    #[arg(short, long)]
    pub watch: bool,
    /// Output directory
    #[arg(long)]
    pub dist: Option<String>,
}

/// `friday lint` arguments.
#[derive(Debug, Default, Args)]
pub struct LintArgs {
    /// Let the linter fix what it can
    #[arg(long)]
    pub fix: bool,
    /// Skip type-checking
    #[arg(long)]
    pub disable_type_check: bool,
}

impl Cli {
    /// Execution mode. `start` always runs in production; the others
    /// default per command and honour `FRIDAY_ENV`.
    pub fn mode(&self) -> Mode {
        let default = match &self.command {
            None | Some(Commands::Start(_)) => return Mode::Production,
            Some(Commands::Build(_)) => Mode::Production,
            Some(Commands::Dev(_)) | Some(Commands::Lint(_)) => Mode::Development,
        };
        Mode::from_env(default)
    }

    /// The command to run; `start` when none was named.
    pub fn into_command(self) -> Commands {
        match self.command {
            Some(command) => command,
            None => Commands::Start(self.start),
        }
    }

    /// Log filter directive: `--log-level`, then `-v`, then `-q`, then
    /// `RUST_LOG`, then the mode default.
    pub fn log_directive(&self, rust_log: Option<&str>, mode: Mode) -> String {
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        if self.verbose {
            return "debug".to_string();
        }
        if self.quiet {
            return "error".to_string();
        }
        match rust_log {
            Some(directive) if !directive.trim().is_empty() => directive.to_string(),
            _ => mode.default_log_level().to_string(),
        }
    }

    /// Tracing filter for this invocation.
    pub fn env_filter(&self, mode: Mode) -> EnvFilter {
        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let directive = self.log_directive(rust_log.as_deref(), mode);
        EnvFilter::try_new(&directive)
            .unwrap_or_else(|_| EnvFilter::new(mode.default_log_level()))
    }
}
