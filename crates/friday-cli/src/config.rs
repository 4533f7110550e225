// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Friday project configuration.
//!
//! Configuration is loaded from `friday.toml` at the project root. Every
//! section and field is optional.
//!
//! # Example Configuration
//!
//! ```toml
//! [project]
//! name = "my-service"
//!
//! [dev]
//! host = "127.0.0.1"
//! port = 4000
//! lint_before_build = true
//!
//! [build]
//! src_dir = "src"
//! dist_dir = "dist"
//! transform = { program = "esbuild", args = ["{file}", "--format=cjs", "--platform=node"] }
//!
//! [lint]
//! linter = { program = "eslint", args = ["--format", "stylish"] }
//! type_checker = { program = "tsc", args = ["--noEmit", "--pretty", "false"] }
//!
//! [app]
//! index = "index.html"
//! ignore = ["**/*.log"]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use friday::builder::TreeBuilder;
use friday::compiler::CommandTransformer;
use friday::endpoint::validate_port;
use friday::lint::CommandLinter;
use friday::paths::Classifier;
use friday::process::ToolCommand;
use friday::typecheck::CommandTypeChecker;
use friday::{Error, Result};
use serde::Deserialize;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "friday.toml";

/// Execution mode selected by `FRIDAY_ENV`.
pub const ENV_MODE: &str = "FRIDAY_ENV";
/// Default port override.
pub const ENV_PORT: &str = "PORT";
/// Configuration directory override.
pub const ENV_CONFIG_DIR: &str = "FRIDAY_CONFIG_DIR";

/// Main configuration structure loaded from `friday.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Development server settings.
    #[serde(default)]
    pub dev: DevConfig,
    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,
    /// Lint and type-check settings.
    #[serde(default)]
    pub lint: LintConfig,
    /// Served application settings.
    #[serde(default)]
    pub app: AppConfig,
}

/// Project metadata configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// Project name shown in the dev banner (default: the project
    /// directory's name).
    #[serde(default)]
    pub name: Option<String>,
}

/// Development server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DevConfig {
    /// Server host (default: "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Lint and type-check before each incremental rebuild (default: true).
    #[serde(default = "default_true")]
    pub lint_before_build: bool,
    /// Quiet period before a change restarts the server (default: 200).
    #[serde(default = "default_restart_debounce_ms")]
    pub restart_debounce_ms: u64,
    /// Clean the output before the initial build (default: true).
    #[serde(default = "default_true")]
    pub clean: bool,
}

/// Build configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Source directory (default: "src").
    #[serde(default = "default_src_dir")]
    pub src_dir: String,
    /// Output directory (default: "dist").
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,
    /// Extensions compiled by the transformer (default: ["ts"]).
    #[serde(default = "default_transform_extensions")]
    pub transform_extensions: Vec<String>,
    /// Extension of compiled output (default: "js").
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
    /// Clean the output before building (default: true).
    #[serde(default = "default_true")]
    pub clean: bool,
    /// Quiet period before a change is rebuilt (default: 500).
    #[serde(default = "default_rebuild_debounce_ms")]
    pub rebuild_debounce_ms: u64,
    /// Concurrent file operations (default: 8).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Transformer command.
    #[serde(default = "default_transform")]
    pub transform: ToolCommand,
}

/// Lint and type-check configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LintConfig {
    /// Linter command (default: eslint with the stylish formatter).
    #[serde(default = "default_linter")]
    pub linter: ToolCommand,
    /// Type-checker command (default: tsc --noEmit).
    #[serde(default = "default_type_checker")]
    pub type_checker: ToolCommand,
    /// Project configuration used by the type checker when present
    /// (default: "tsconfig.json").
    #[serde(default = "default_project_config")]
    pub project_config: String,
    /// Extensions handed to the linter (default: ["js", "json", "ts"]).
    #[serde(default = "default_lint_extensions")]
    pub extensions: Vec<String>,
}

/// Served application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Application directory; defaults to the output directory when
    /// building, else the source directory.
    #[serde(default)]
    pub dir: Option<String>,
    /// Directory index file (default: "index.html").
    #[serde(default = "default_index")]
    pub index: String,
    /// Extra watch ignore globs.
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_host() -> String {
    friday::endpoint::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    friday::endpoint::DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_restart_debounce_ms() -> u64 {
    200
}

fn default_src_dir() -> String {
    "src".to_string()
}

fn default_dist_dir() -> String {
    "dist".to_string()
}

fn default_transform_extensions() -> Vec<String> {
    vec!["ts".to_string()]
}

fn default_output_extension() -> String {
    "js".to_string()
}

fn default_rebuild_debounce_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    8
}

fn default_transform() -> ToolCommand {
    ToolCommand::new("esbuild", ["{file}", "--format=cjs", "--platform=node"])
}

fn default_linter() -> ToolCommand {
    ToolCommand::new("eslint", ["--format", "stylish"])
}

fn default_type_checker() -> ToolCommand {
    ToolCommand::new("tsc", ["--noEmit", "--pretty", "false"])
}

fn default_project_config() -> String {
    "tsconfig.json".to_string()
}

fn default_lint_extensions() -> Vec<String> {
    vec!["js".to_string(), "json".to_string(), "ts".to_string()]
}

fn default_index() -> String {
    "index.html".to_string()
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            lint_before_build: true,
            restart_debounce_ms: default_restart_debounce_ms(),
            clean: true,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            dist_dir: default_dist_dir(),
            transform_extensions: default_transform_extensions(),
            output_extension: default_output_extension(),
            clean: true,
            rebuild_debounce_ms: default_rebuild_debounce_ms(),
            concurrency: default_concurrency(),
            transform: default_transform(),
        }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            linter: default_linter(),
            type_checker: default_type_checker(),
            project_config: default_project_config(),
            extensions: default_lint_extensions(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dir: None,
            index: default_index(),
            ignore: Vec::new(),
        }
    }
}

impl Config {
    /// Loads `friday.toml` from `root`.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file exists but cannot be read,
    /// parsed or validated.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            tracing::debug!("No {} found, using defaults", CONFIG_FILE);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", config_path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses and validates configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid {}: {}", CONFIG_FILE, e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.dev.port == 0 {
            return Err(Error::InvalidPort("0".into()));
        }
        if self.build.concurrency == 0 {
            return Err(Error::Config("build.concurrency must be at least 1".into()));
        }
        if self.build.transform.program.is_empty() {
            return Err(Error::Config("build.transform.program must not be empty".into()));
        }
        Ok(())
    }

    /// The configured project name, else the name of `cwd`.
    pub fn project_name(&self, cwd: &Path) -> String {
        match &self.project.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => cwd
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "app".to_string()),
        }
    }

    /// Extension classifier for the build.
    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.build.transform_extensions.iter().map(String::as_str))
    }

    /// Transformer running the configured command from `cwd`.
    pub fn transformer(&self, cwd: &Path) -> CommandTransformer {
        CommandTransformer::from_command(self.build.transform.clone()).with_cwd(cwd)
    }

    /// Tree builder around `transformer`.
    pub fn tree_builder(&self, transformer: CommandTransformer) -> TreeBuilder {
        TreeBuilder::new(Arc::new(transformer))
            .with_classifier(self.classifier())
            .with_output_extension(&self.build.output_extension)
            .with_concurrency(self.build.concurrency)
    }

    /// Linter running the configured command from `cwd`.
    pub fn linter(&self, cwd: &Path) -> CommandLinter {
        CommandLinter::new(self.lint.linter.clone()).with_cwd(cwd)
    }

    /// Type checker running the configured command from `cwd`.
    pub fn type_checker(&self, cwd: &Path) -> CommandTypeChecker {
        CommandTypeChecker::new(self.lint.type_checker.clone()).with_cwd(cwd)
    }

    /// Project configuration file for the type checker.
    pub fn project_config(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.lint.project_config)
    }

    /// Rebuild debounce.
    pub fn rebuild_debounce(&self) -> Duration {
        Duration::from_millis(self.build.rebuild_debounce_ms)
    }

    /// Restart debounce.
    pub fn restart_debounce(&self) -> Duration {
        Duration::from_millis(self.dev.restart_debounce_ms)
    }
}

/// Execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Verbose logs, restart on change.
    Development,
    /// Quieter logs, no restart on change.
    Production,
}

impl Mode {
    /// Parses a `FRIDAY_ENV` value, falling back to `default` when unset.
    /// Unknown values are treated as development.
    pub fn parse(value: Option<&str>, default: Mode) -> Mode {
        match value.map(str::trim) {
            None | Some("") => default,
            Some(v) if v.eq_ignore_ascii_case("production") || v.eq_ignore_ascii_case("prod") => {
                Mode::Production
            }
            Some(_) => Mode::Development,
        }
    }

    /// Reads `FRIDAY_ENV`.
    pub fn from_env(default: Mode) -> Mode {
        Mode::parse(std::env::var(ENV_MODE).ok().as_deref(), default)
    }

    /// Log level used when nothing else selects one.
    pub fn default_log_level(self) -> &'static str {
        match self {
            Mode::Development => "info",
            Mode::Production => "warn",
        }
    }

    /// Whether the dev server restarts when files change.
    pub fn restarts_on_change(self) -> bool {
        self == Mode::Development
    }
}

/// Parses a `PORT` value.
pub fn port_from(value: Option<&str>) -> Result<Option<u16>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => validate_port(v).map(Some),
    }
}

/// Raw `PORT` value; validated by [`port_from`] only where it is used.
pub fn port_env() -> Option<String> {
    std::env::var(ENV_PORT).ok()
}

/// Configuration directory: `FRIDAY_CONFIG_DIR` (relative to `cwd`) or
/// `<cwd>/config`.
pub fn config_dir_from(cwd: &Path, value: Option<&str>) -> PathBuf {
    match value.map(str::trim) {
        Some(dir) if !dir.is_empty() => cwd.join(dir),
        _ => cwd.join("config"),
    }
}

/// Reads `FRIDAY_CONFIG_DIR`.
pub fn config_dir(cwd: &Path) -> PathBuf {
    config_dir_from(cwd, std::env::var(ENV_CONFIG_DIR).ok().as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.project.name, None);
        assert_eq!(
            config.project_name(Path::new("/work/shop-api")),
            "shop-api"
        );
        assert_eq!(config.dev.port, 3000);
        assert_eq!(config.dev.host, "0.0.0.0");
        assert!(config.dev.lint_before_build);
        assert_eq!(config.build.src_dir, "src");
        assert_eq!(config.build.transform.program, "esbuild");
        assert_eq!(config.lint.extensions, vec!["js", "json", "ts"]);
        assert_eq!(config.app.dir, None);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = Config::parse(
            r#"
            [dev]
            port = 4000

            [build]
            dist_dir = "out"
            transform = { program = "swc", args = ["{file}"] }
            "#,
        )
        .unwrap();
        assert_eq!(config.dev.port, 4000);
        assert_eq!(config.dev.restart_debounce_ms, 200);
        assert_eq!(config.build.dist_dir, "out");
        assert_eq!(config.build.src_dir, "src");
        assert_eq!(config.build.transform, ToolCommand::new("swc", ["{file}"]));
        assert_eq!(config.build.rebuild_debounce_ms, 500);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err = Config::parse("[dev]\nport = \"abc\"").unwrap_err();
        assert!(err.is_config());

        let err = Config::parse("[dev]\nport = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidPort(_)));

        let err = Config::parse("[build]\nconcurrency = 0").unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nname = \"api\"\n[app]\nignore = [\"**/*.log\"]\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.project_name(Path::new("/work/other")), "api");
        assert_eq!(config.app.ignore, vec!["**/*.log"]);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(Mode::parse(None, Mode::Production), Mode::Production);
        assert_eq!(Mode::parse(Some("production"), Mode::Development), Mode::Production);
        assert_eq!(Mode::parse(Some("development"), Mode::Production), Mode::Development);
        assert_eq!(Mode::Production.default_log_level(), "warn");
        assert!(!Mode::Production.restarts_on_change());
    }

    #[test]
    fn test_port_from_env_value() {
        assert_eq!(port_from(None).unwrap(), None);
        assert_eq!(port_from(Some("8080")).unwrap(), Some(8080));
        assert!(port_from(Some("70000")).is_err());
        assert!(port_from(Some("http")).is_err());
    }

    #[test]
    fn test_config_dir_override() {
        let cwd = Path::new("/p");
        assert_eq!(config_dir_from(cwd, None), PathBuf::from("/p/config"));
        assert_eq!(config_dir_from(cwd, Some("settings")), PathBuf::from("/p/settings"));
        assert_eq!(config_dir_from(cwd, Some("/etc/app")), PathBuf::from("/etc/app"));
    }
}
