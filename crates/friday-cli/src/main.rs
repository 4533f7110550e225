// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::process::ExitCode;

use clap::Parser;
use friday_cli::cli::{Cli, Commands};
use friday_cli::{commands, error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let mode = cli.mode();
    tracing_subscriber::fmt()
        .with_env_filter(cli.env_filter(mode))
        .with_target(false)
        .init();

    let outcome = match cli.into_command() {
        Commands::Start(args) => commands::start::run(args).await,
        Commands::Dev(args) => commands::dev::run(args, mode).await,
        Commands::Build(args) => commands::build::run(args).await,
        Commands::Lint(args) => commands::lint::run(args).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(error::exit_code(&e))
        }
    }
}
