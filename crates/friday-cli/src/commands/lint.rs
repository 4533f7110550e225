// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lint command: one-shot type-check followed by the linter.

use std::path::{Path, PathBuf};

use console::style;
use friday::builder::enumerate_files;
use friday::diagnostic;
use friday::lint::{LintOptions, Linter};
use friday::paths::display_path;
use friday::typecheck::{CheckScope, TypeChecker};

use crate::cli::LintArgs;
use crate::config::Config;
use crate::error::CliError;
use crate::ui;

/// Runs the lint command.
pub async fn run(args: LintArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::load(&cwd)?;
    run_in(&cwd, &config, args).await
}

/// Runs the lint command against an explicit project root.
pub async fn run_in(cwd: &Path, config: &Config, args: LintArgs) -> anyhow::Result<()> {
    let src = cwd.join(&config.build.src_dir);
    let src_exists = src.is_dir();

    if src_exists && !args.disable_type_check {
        type_check(cwd, &src, config).await?;
    } else if args.disable_type_check {
        tracing::debug!("Skip type-check due to --disable-type-check option");
    }

    let target_dir = if src_exists { src.clone() } else { cwd.to_path_buf() };
    println!(
        "{} {}",
        style("Find problems in all files in").cyan(),
        if src_exists {
            display_path(&src)
        } else {
            "current directory".to_string()
        }
    );

    let files = lintable_files(&target_dir, &config.lint.extensions).await?;
    if files.is_empty() {
        ui::success("No files to lint");
        return Ok(());
    }

    let linter = config.linter(cwd);
    linter.command().ensure_available()?;
    let report = linter.lint_files(&files, &LintOptions { fix: args.fix }).await?;

    if !report.message.trim().is_empty() {
        println!("{}", report.message);
    }

    if report.has_errors() {
        println!(
            "Search for the {} to learn more about each error.",
            style("keywords").red().underlined()
        );
        println!();
        return Err(CliError::LintFailed(report.error_count).into());
    }

    if report.warning_count > 0 {
        println!(
            "Search for the {} to learn more about each warning.",
            style("keywords").yellow().underlined()
        );
        println!(
            "To ignore, add {} to the line before.",
            style("// eslint-disable-next-line").cyan()
        );
        println!();
    }

    ui::success("All the code passed linter");
    Ok(())
}

async fn type_check(cwd: &Path, src: &Path, config: &Config) -> anyhow::Result<()> {
    let classifier = config.classifier();
    let files: Vec<PathBuf> = enumerate_files(src)
        .await?
        .into_iter()
        .filter(|f| classifier.is_transformable(f))
        .collect();

    if files.is_empty() {
        tracing::debug!("No transformable files, skipping type-check");
        return Ok(());
    }

    let checker = config.type_checker(cwd);
    checker.command().ensure_available()?;

    println!(
        "{} {}",
        style("Start type-check on all typescript files in").cyan(),
        display_path(src)
    );

    let project = config.project_config(cwd);
    let scope = if project.is_file() {
        CheckScope::Project(&project)
    } else {
        CheckScope::Files(&files)
    };
    let diagnostics = checker.type_check(scope).await?;

    if !diagnostics.is_empty() {
        ui::print_diagnostics(&diagnostics);
        return Err(CliError::TypeCheckFailed(diagnostic::summary(&diagnostics)).into());
    }

    ui::success("All the code passed type-check");
    Ok(())
}

/// Files under `dir` with a lintable extension, skipping `node_modules`.
async fn lintable_files(dir: &Path, extensions: &[String]) -> friday::Result<Vec<PathBuf>> {
    let files = enumerate_files(dir).await?;
    Ok(files
        .into_iter()
        .filter(|f| !f.components().any(|c| c.as_os_str() == "node_modules"))
        .filter(|f| {
            f.extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.iter().any(|x| x == ext))
                .unwrap_or(false)
        })
        .collect())
}
