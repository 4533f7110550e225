// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build command: compiles the source tree into the output directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use console::style;
use friday::build_loop::{run_build_loop, BuildLoopOptions};
use friday::builder::{clean_output, BuildResult, BuildTarget};
use friday::paths::display_path;
use friday::shutdown::shutdown_signal;

use crate::cli::BuildArgs;
use crate::config::Config;
use crate::error::CliError;
use crate::ui;

/// Runs the build command.
pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::load(&cwd)?;
    run_in(&cwd, &config, args).await
}

/// Runs the build command against an explicit project root.
pub async fn run_in(cwd: &Path, config: &Config, args: BuildArgs) -> anyhow::Result<()> {
    let src = cwd.join(&config.build.src_dir);
    let dist = cwd.join(args.dist.as_deref().unwrap_or(&config.build.dist_dir));
    let target = BuildTarget::new(&src, &dist)?;

    tracing::debug!("Checking required tools");
    let transformer = config.transformer(cwd);
    transformer.command().ensure_available()?;

    tracing::debug!("Source dir: {}", src.display());
    tracing::debug!("Output dir: {}", dist.display());
    println!(
        "{} {} => {}",
        style("Compile files:").cyan(),
        display_path(&src),
        display_path(&dist)
    );

    let clean = if args.no_clean { false } else { args.clean || config.build.clean };
    if clean {
        tracing::debug!("Deleting the outputs in {}", dist.display());
        clean_output(&target).await?;
    }

    let pb = ui::build_progress();
    let progress = pb.clone();
    let builder = config.tree_builder(transformer).with_progress(Arc::new(move |done, total| {
        progress.set_length(total as u64);
        progress.set_position(done as u64);
    }));

    let started = Instant::now();
    let result = builder.build_tree(&target).await;
    pb.finish_and_clear();
    let result = result?;
    report(&result, started);

    if args.watch {
        let mut options = BuildLoopOptions::new(target, builder.without_progress());
        options.initial_build = false;
        options.debounce = config.rebuild_debounce();
        options.ignore = config.app.ignore.clone();

        let handle = run_build_loop(options).await?;
        println!(
            "{} {}",
            style("Watching for file changes:").cyan(),
            display_path(&src)
        );
        shutdown_signal().await;
        tracing::debug!("Gracefully shutting down. Please wait...");
        handle.close().await;
        tracing::debug!("Watcher has been closed");
        return Ok(());
    }

    if !result.is_success() {
        return Err(CliError::BuildFailed(result.failed).into());
    }
    Ok(())
}

fn report(result: &BuildResult, started: Instant) {
    for failure in &result.failures {
        ui::failure(format!("{}: {}", display_path(&failure.path), failure.message));
    }

    if result.failed > 0 {
        ui::failure("The following files are not compiled successfully:");
        ui::list(result.failed_files());
        eprintln!();
        println!(
            "Total: {}, compiled: {}, copied: {}, failed: {}",
            result.total, result.compiled, result.copied, result.failed
        );
        return;
    }

    let mut actions = format!("compiled {} {}", result.compiled, plural(result.compiled, "file"));
    if result.copied > 0 {
        actions.push_str(&format!(
            " and copied {} {}",
            result.copied,
            plural(result.copied, "file")
        ));
    }
    ui::success(format!(
        "Successfully {} ({:.2?}).",
        actions,
        started.elapsed()
    ));
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}
