// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development server command: build, serve and restart on change.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use friday::build_loop::LintGate;
use friday::builder::{enumerate_files, BuildTarget};
use friday::dev::{DevBuild, DevOptions, DevOrchestrator};
use friday::endpoint::Endpoint;
use friday::server::StaticSiteFactory;
use friday::shutdown::shutdown_signal;
use friday::typecheck::TypeCheckSession;

use super::endpoint_for;
use crate::cli::DevArgs;
use crate::config::{self, Config, Mode};
use crate::ui;

/// Runs the development server.
pub async fn run(args: DevArgs, mode: Mode) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::load(&cwd)?;
    let endpoint = endpoint_for(&args.endpoint, &config, config::port_env().as_deref())?;
    let config_dir = config::config_dir(&cwd);

    let options = dev_options(&cwd, &config, &args, mode, endpoint, config_dir).await?;
    let session = DevOrchestrator::new(options).start().await?;

    print!("{}", ui::dev_banner(&config.project_name(&cwd), session.summary()));
    session.wait(shutdown_signal()).await?;
    Ok(())
}

/// Assembles orchestrator options from configuration and flags.
pub async fn dev_options(
    cwd: &Path,
    config: &Config,
    args: &DevArgs,
    mode: Mode,
    endpoint: Endpoint,
    config_dir: PathBuf,
) -> anyhow::Result<DevOptions> {
    let src = cwd.join(&config.build.src_dir);
    let dist = cwd.join(args.dist.as_deref().unwrap_or(&config.build.dist_dir));
    let target = BuildTarget::new(&src, &dist)?;
    let building = !args.no_build && target.is_buildable();

    let app_dir = match &config.app.dir {
        Some(dir) => cwd.join(dir),
        None if building => dist.clone(),
        None if src.is_dir() => src.clone(),
        None => cwd.to_path_buf(),
    };

    let build = if building {
        let transformer = config.transformer(cwd);
        transformer.command().ensure_available()?;

        let lint_gate = if config.dev.lint_before_build && !args.no_lint {
            Some(lint_gate(cwd, &src, config).await?)
        } else {
            None
        };

        let mut build = DevBuild::new(target, config.tree_builder(transformer));
        build.clean = config.dev.clean && !args.no_clean;
        build.initial_build = !args.skip_initial_build;
        build.lint_gate = lint_gate;
        build.debounce = config.rebuild_debounce();
        Some(build)
    } else {
        None
    };

    let factory = StaticSiteFactory::new(&app_dir).with_index(&config.app.index);
    let mut options = DevOptions::new(Arc::new(factory), endpoint, app_dir);
    options.config_dir = Some(config_dir);
    options.build = build;
    options.restart_on_change = mode.restarts_on_change();
    options.restart_debounce = config.restart_debounce();
    options.ignore = config.app.ignore.clone();
    Ok(options)
}

async fn lint_gate(cwd: &Path, src: &Path, config: &Config) -> anyhow::Result<LintGate> {
    let linter = config.linter(cwd);
    linter.command().ensure_available()?;
    let checker = config.type_checker(cwd);
    checker.command().ensure_available()?;

    let classifier = config.classifier();
    let root_files: Vec<PathBuf> = enumerate_files(src)
        .await?
        .into_iter()
        .filter(|f| classifier.is_transformable(f))
        .collect();

    let project = config.project_config(cwd);
    let session = TypeCheckSession::start(
        Arc::new(checker),
        root_files,
        Some(&project),
        Arc::new(ui::print_diagnostics),
    );

    Ok(LintGate::new()
        .with_linter(Arc::new(linter), config.lint.extensions.clone())
        .with_type_check(session))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_build_serves_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let args = DevArgs {
            no_build: true,
            ..DevArgs::default()
        };
        let options = dev_options(
            dir.path(),
            &Config::default(),
            &args,
            Mode::Development,
            Endpoint::tcp("127.0.0.1", 0),
            dir.path().join("config"),
        )
        .await
        .unwrap();

        assert!(options.build.is_none());
        assert_eq!(options.app_dir, dir.path().join("src"));
        assert!(options.restart_on_change);
    }

    #[tokio::test]
    async fn test_production_disables_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let args = DevArgs {
            no_build: true,
            ..DevArgs::default()
        };
        let options = dev_options(
            dir.path(),
            &Config::default(),
            &args,
            Mode::Production,
            Endpoint::tcp("127.0.0.1", 0),
            dir.path().join("config"),
        )
        .await
        .unwrap();

        assert!(!options.restart_on_change);
        assert_eq!(options.app_dir, dir.path());
    }
}
