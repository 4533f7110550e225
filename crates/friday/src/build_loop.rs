// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build Loop.
//!
//! Runs an optional initial full build, then watches the source tree and
//! rebuilds one file per debounced change. Each rebuild walks
//!
//! ```text
//! Idle -> Linting (when a lint gate is set) -> Compiling -> Idle
//! ```
//!
//! and rebuilds never overlap: the debouncer runs one action at a time and
//! the rebuilder sits behind a mutex.
//!
//! Lint errors abort the cycle before anything is written, leaving the
//! previous output in place. Warnings never block.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::builder::{BuildResult, BuildTarget, TreeBuilder};
use crate::debounce::Debouncer;
use crate::diagnostic::Severity;
use crate::error::Result;
use crate::lint::{LintOptions, Linter};
use crate::paths::display_path;
use crate::typecheck::{FileSetUpdate, TypeCheckSession};
use crate::watcher::{FileWatcher, WatchEvent, WatchEventKind};

/// Default quiet period before a change is rebuilt.
pub const DEFAULT_REBUILD_DEBOUNCE: Duration = Duration::from_millis(500);

/// Per-file rebuild stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for a change.
    Idle,
    /// Running the lint gate.
    Linting,
    /// Compiling or copying.
    Compiling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => f.write_str("idle"),
            Stage::Linting => f.write_str("linting"),
            Stage::Compiling => f.write_str("compiling"),
        }
    }
}

/// What one debounced change led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The file was rebuilt (possibly with a compile failure recorded).
    Rebuilt(BuildResult),
    /// The lint gate blocked the rebuild; carries the lint output.
    LintFailed(String),
    /// The source was deleted and its output removed.
    Removed,
    /// Nothing to do (directory events).
    Skipped,
    /// The rebuild could not run (for example, a copy failed).
    Failed(String),
}

/// Report passed to the `on_rebuilt` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Changed path.
    pub path: PathBuf,
    /// Raw event kind.
    pub kind: WatchEventKind,
    /// Outcome.
    pub outcome: RebuildOutcome,
}

/// Callback receiving each rebuild report.
pub type RebuildCallback = Arc<dyn Fn(&RebuildReport) + Send + Sync>;

/// Lint-before-build gate: an optional linter plus an optional type-check
/// session.
pub struct LintGate {
    linter: Option<Arc<dyn Linter>>,
    lint_extensions: Vec<String>,
    session: Option<TypeCheckSession>,
}

impl LintGate {
    /// A gate that checks nothing until configured.
    pub fn new() -> Self {
        Self {
            linter: None,
            lint_extensions: Vec::new(),
            session: None,
        }
    }

    /// Lints each changed file whose extension is in `extensions` (every
    /// file when empty).
    pub fn with_linter(mut self, linter: Arc<dyn Linter>, extensions: Vec<String>) -> Self {
        self.linter = Some(linter);
        self.lint_extensions = extensions;
        self
    }

    /// Type-checks through `session` before compiling transformable files.
    pub fn with_type_check(mut self, session: TypeCheckSession) -> Self {
        self.session = Some(session);
        self
    }

    /// The type-check session, if any.
    pub fn session(&self) -> Option<&TypeCheckSession> {
        self.session.as_ref()
    }

    /// Returns the blocking output when `path` must not be compiled.
    async fn check(&self, path: &Path, transformable: bool) -> Result<Option<String>> {
        if let Some(linter) = &self.linter {
            if self.should_lint(path) {
                let report = linter
                    .lint_files(&[path.to_path_buf()], &LintOptions::default())
                    .await?;
                if report.has_errors() {
                    return Ok(Some(report.message));
                }
                if report.warning_count > 0 {
                    tracing::warn!("{}", report.message);
                }
            }
        }

        if let (Some(session), true) = (&self.session, transformable) {
            let errors: Vec<String> = session
                .check()
                .await?
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .map(ToString::to_string)
                .collect();
            if !errors.is_empty() {
                return Ok(Some(errors.join("\n")));
            }
        }

        Ok(None)
    }

    fn should_lint(&self, path: &Path) -> bool {
        if self.lint_extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.lint_extensions.iter().any(|x| x == ext))
            .unwrap_or(false)
    }

    fn file_created(&mut self, path: &Path) {
        if let Some(session) = &mut self.session {
            match session.add_file(path) {
                FileSetUpdate::RecreateRequired => {
                    session.recreate();
                    tracing::debug!("Restarted type-check session due to file creation");
                }
                FileSetUpdate::Applied => {
                    tracing::debug!("Added {} to type-check session", display_path(path))
                }
                FileSetUpdate::Unchanged => {}
            }
        }
    }

    fn file_deleted(&mut self, path: &Path) {
        if let Some(session) = &mut self.session {
            match session.remove_file(path) {
                FileSetUpdate::RecreateRequired => {
                    session.recreate();
                    tracing::debug!("Restarted type-check session due to file deletion");
                }
                FileSetUpdate::Applied => {
                    tracing::debug!("Removed {} from type-check session", display_path(path))
                }
                FileSetUpdate::Unchanged => {}
            }
        }
    }

    fn close(&mut self) {
        if let Some(session) = &mut self.session {
            session.close();
        }
    }
}

impl Default for LintGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything [`run_build_loop`] needs.
pub struct BuildLoopOptions {
    /// Source and output roots.
    pub target: BuildTarget,
    /// Builder shared by the initial and incremental builds.
    pub builder: TreeBuilder,
    /// Run a full build before watching.
    pub initial_build: bool,
    /// Lint before compiling; `None` disables the gate.
    pub lint_gate: Option<LintGate>,
    /// Quiet period before a change is rebuilt.
    pub debounce: Duration,
    /// Extra watch ignore globs.
    pub ignore: Vec<String>,
    /// Called after each rebuild.
    pub on_rebuilt: Option<RebuildCallback>,
}

impl BuildLoopOptions {
    /// Options with an initial build, no lint gate and the default
    /// debounce.
    pub fn new(target: BuildTarget, builder: TreeBuilder) -> Self {
        Self {
            target,
            builder,
            initial_build: true,
            lint_gate: None,
            debounce: DEFAULT_REBUILD_DEBOUNCE,
            ignore: Vec::new(),
            on_rebuilt: None,
        }
    }
}

struct Rebuilder {
    target: BuildTarget,
    builder: TreeBuilder,
    gate: Option<LintGate>,
    on_rebuilt: Option<RebuildCallback>,
    stage: Stage,
}

impl Rebuilder {
    fn enter(&mut self, stage: Stage) {
        tracing::trace!(from = %self.stage, to = %stage, "Rebuild stage");
        self.stage = stage;
    }

    async fn handle(&mut self, event: WatchEvent) -> RebuildReport {
        let outcome = self.process(&event).await;
        self.enter(Stage::Idle);
        RebuildReport {
            path: event.path,
            kind: event.kind,
            outcome,
        }
    }

    async fn process(&mut self, event: &WatchEvent) -> RebuildOutcome {
        let path = &event.path;
        let relative = display_path(path);

        match event.kind {
            WatchEventKind::DirCreated | WatchEventKind::DirDeleted => {
                tracing::debug!("Directory {}: {}", event.kind, relative);
                return RebuildOutcome::Skipped;
            }
            WatchEventKind::Deleted => {
                tracing::debug!("File deleted: {}", relative);
                if let Some(gate) = &mut self.gate {
                    gate.file_deleted(path);
                }
                return match self.builder.remove_output(path, &self.target).await {
                    Ok(_) => RebuildOutcome::Removed,
                    Err(e) => {
                        tracing::error!("Cannot remove output of {}: {}", relative, e);
                        RebuildOutcome::Failed(e.to_string())
                    }
                };
            }
            WatchEventKind::Created => {
                tracing::debug!("File created: {}", relative);
                if self.builder.classifier().is_transformable(path) {
                    if let Some(gate) = &mut self.gate {
                        gate.file_created(path);
                    }
                }
            }
            WatchEventKind::Changed => {}
        }

        tracing::info!("File changed: {}", relative);
        let started = Instant::now();
        let transformable = self.builder.classifier().is_transformable(path);

        if self.gate.is_some() {
            self.enter(Stage::Linting);
            if let Some(gate) = &self.gate {
                match gate.check(path, transformable).await {
                    Ok(None) => {}
                    Ok(Some(message)) => {
                        tracing::error!("Cannot pass the linter, skipped rebuilding {}", relative);
                        if !message.is_empty() {
                            tracing::error!("\n{}", message);
                        }
                        return RebuildOutcome::LintFailed(message);
                    }
                    Err(e) => {
                        tracing::error!("Failed to lint {}: {}", relative, e);
                        return RebuildOutcome::LintFailed(e.to_string());
                    }
                }
            }
        }

        self.enter(Stage::Compiling);
        tracing::debug!("Rebuilding file: {}", relative);
        match self.builder.build_files(&[path.clone()], &self.target).await {
            Ok(result) => {
                if let Some(failure) = result.failures.first() {
                    tracing::error!("Cannot rebuild file {}, Error: {}", relative, failure.message);
                } else {
                    tracing::info!("Rebuilt file: {} ({:?})", relative, started.elapsed());
                }
                RebuildOutcome::Rebuilt(result)
            }
            Err(e) => {
                tracing::error!("Cannot rebuild file {}, Error: {}", relative, e);
                RebuildOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Running build loop.
pub struct BuildLoopHandle {
    initial: Option<BuildResult>,
    watcher: FileWatcher,
    debouncer: Debouncer<WatchEvent>,
    rebuilder: Arc<Mutex<Rebuilder>>,
}

impl BuildLoopHandle {
    /// Result of the initial full build, when one ran.
    pub fn initial_result(&self) -> Option<&BuildResult> {
        self.initial.as_ref()
    }

    /// The watched source root.
    pub fn watched_root(&self) -> &Path {
        self.watcher.root()
    }

    /// Stops watching, waits for a rebuild in progress and closes the
    /// type-check session. Idempotent.
    pub async fn close(&self) {
        self.watcher.close();
        self.debouncer.close().await;
        let mut rebuilder = self.rebuilder.lock().await;
        if let Some(gate) = &mut rebuilder.gate {
            gate.close();
        }
    }
}

/// Creates the output root, runs the initial build (when enabled) and
/// starts watching.
///
/// # Errors
///
/// An output root that cannot be created, a fatal initial build error
/// (copy failure) or a watcher that cannot start. Compile failures are
/// reported in the initial result instead.
pub async fn run_build_loop(options: BuildLoopOptions) -> Result<BuildLoopHandle> {
    let BuildLoopOptions {
        target,
        builder,
        initial_build,
        lint_gate,
        debounce,
        ignore,
        on_rebuilt,
    } = options;

    // The server may start before anything is emitted
    tokio::fs::create_dir_all(target.output_root()).await?;

    let initial = if initial_build {
        tracing::info!(
            "Compile files: {} => {}",
            display_path(target.source_root()),
            display_path(target.output_root())
        );
        let result = builder.build_tree(&target).await?;
        for failure in &result.failures {
            tracing::error!("{}: {}", display_path(&failure.path), failure.message);
        }
        tracing::info!(
            "Total: {}, compiled: {}, copied: {}, failed: {}",
            result.total,
            result.compiled,
            result.copied,
            result.failed
        );
        Some(result)
    } else {
        None
    };

    let rebuilder = Arc::new(Mutex::new(Rebuilder {
        target: target.clone(),
        builder,
        gate: lint_gate,
        on_rebuilt,
        stage: Stage::Idle,
    }));

    let action_rebuilder = rebuilder.clone();
    let debouncer = Debouncer::new(debounce, move |event: WatchEvent| {
        let rebuilder = action_rebuilder.clone();
        async move {
            let mut rebuilder = rebuilder.lock().await;
            let report = rebuilder.handle(event).await;
            if let Some(callback) = &rebuilder.on_rebuilt {
                callback(&report);
            }
        }
    });

    let trigger = debouncer.handle();
    let watcher = FileWatcher::watch(target.source_root(), &ignore, move |event| {
        trigger.trigger(event);
    })?;

    tracing::info!("Watching for file changes: {}", display_path(target.source_root()));

    Ok(BuildLoopHandle {
        initial,
        watcher,
        debouncer,
        rebuilder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Transformer;
    use crate::lint::LintReport;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    struct Copy;

    #[async_trait]
    impl Transformer for Copy {
        async fn transform(&self, path: &Path) -> Result<Option<String>> {
            Ok(Some(tokio::fs::read_to_string(path).await?))
        }
    }

    /// Fails any file whose content contains "lint-error".
    struct ContentLinter;

    #[async_trait]
    impl Linter for ContentLinter {
        async fn lint_files(&self, paths: &[PathBuf], _options: &LintOptions) -> Result<LintReport> {
            let mut report = LintReport::default();
            for path in paths {
                let source = tokio::fs::read_to_string(path).await.unwrap_or_default();
                if source.contains("lint-error") {
                    report.error_count += 1;
                    report.message = format!("{}: lint-error found", path.display());
                }
            }
            Ok(report)
        }
    }

    fn rebuilder(dir: &Path, gate: Option<LintGate>) -> Rebuilder {
        let target = BuildTarget::new(dir.join("src"), dir.join("dist")).unwrap();
        Rebuilder {
            target,
            builder: TreeBuilder::new(Arc::new(Copy)),
            gate,
            on_rebuilt: None,
            stage: Stage::Idle,
        }
    }

    fn event(kind: WatchEventKind, path: PathBuf) -> WatchEvent {
        WatchEvent { kind, path }
    }

    #[tokio::test]
    async fn test_changed_file_is_rebuilt() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let file = dir.path().join("src/a.ts");
        std::fs::write(&file, "export const a = 1").unwrap();

        let mut r = rebuilder(dir.path(), None);
        let report = r.handle(event(WatchEventKind::Changed, file)).await;
        assert!(matches!(report.outcome, RebuildOutcome::Rebuilt(ref res) if res.compiled == 1));
        assert!(dir.path().join("dist/a.js").exists());
        assert_eq!(r.stage, Stage::Idle);
    }

    #[tokio::test]
    async fn test_lint_errors_block_and_keep_previous_output() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("dist")).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("dist/a.js"), "old").unwrap();
        let file = dir.path().join("src/a.ts");
        std::fs::write(&file, "lint-error").unwrap();

        let gate = LintGate::new().with_linter(Arc::new(ContentLinter), vec![]);
        let mut r = rebuilder(dir.path(), Some(gate));
        let report = r.handle(event(WatchEventKind::Changed, file)).await;

        assert!(matches!(report.outcome, RebuildOutcome::LintFailed(_)));
        assert_eq!(std::fs::read_to_string(dir.path().join("dist/a.js")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_created_file_joins_type_check_session() {
        use crate::diagnostic::Diagnostic;
        use crate::typecheck::{CheckScope, TypeChecker};

        struct NoProblems;

        #[async_trait]
        impl TypeChecker for NoProblems {
            async fn type_check(&self, _scope: CheckScope<'_>) -> Result<Vec<Diagnostic>> {
                Ok(vec![])
            }
        }

        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let file = dir.path().join("src/new.ts");
        std::fs::write(&file, "export {}").unwrap();

        let session =
            TypeCheckSession::start(Arc::new(NoProblems), vec![], None, Arc::new(|_| {}));
        let gate = LintGate::new().with_type_check(session);
        let mut r = rebuilder(dir.path(), Some(gate));

        r.handle(event(WatchEventKind::Created, file.clone())).await;
        let roots = r.gate.as_ref().unwrap().session().unwrap().root_files();
        assert_eq!(roots, vec![file.clone()]);

        std::fs::remove_file(&file).unwrap();
        let report = r.handle(event(WatchEventKind::Deleted, file)).await;
        assert_eq!(report.outcome, RebuildOutcome::Removed);
        assert!(r.gate.as_ref().unwrap().session().unwrap().root_files().is_empty());
        assert!(!dir.path().join("dist/new.js").exists());
    }

    #[tokio::test]
    async fn test_directory_events_are_skipped() {
        let dir = tempdir().unwrap();
        let mut r = rebuilder(dir.path(), None);
        let report = r
            .handle(event(WatchEventKind::DirCreated, dir.path().join("src/sub")))
            .await;
        assert_eq!(report.outcome, RebuildOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_build_loop_initial_build_and_close() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "a").unwrap();
        std::fs::write(dir.path().join("src/b.json"), "{}").unwrap();

        let target = BuildTarget::new(dir.path().join("src"), dir.path().join("dist")).unwrap();
        let reports = Arc::new(StdMutex::new(Vec::new()));
        let sink = reports.clone();
        let mut options = BuildLoopOptions::new(target, TreeBuilder::new(Arc::new(Copy)));
        options.debounce = Duration::from_millis(50);
        options.on_rebuilt = Some(Arc::new(move |r: &RebuildReport| {
            sink.lock().unwrap().push(r.clone())
        }));

        let handle = run_build_loop(options).await.unwrap();
        let initial = handle.initial_result().unwrap();
        assert_eq!((initial.total, initial.compiled, initial.copied), (2, 1, 1));

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(dir.path().join("src/a.ts"), "changed").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while reports.lock().unwrap().is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!reports.lock().unwrap().is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dist/a.js")).unwrap(),
            "changed"
        );

        handle.close().await;
        handle.close().await;
    }

    #[tokio::test]
    async fn test_burst_of_writes_rebuilds_once() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let file = dir.path().join("src/a.ts");
        std::fs::write(&file, "v1").unwrap();

        let target = BuildTarget::new(dir.path().join("src"), dir.path().join("dist")).unwrap();
        let reports = Arc::new(StdMutex::new(Vec::new()));
        let sink = reports.clone();
        let mut options = BuildLoopOptions::new(target, TreeBuilder::new(Arc::new(Copy)));
        options.initial_build = false;
        options.debounce = Duration::from_millis(300);
        options.on_rebuilt = Some(Arc::new(move |r: &RebuildReport| {
            sink.lock().unwrap().push(r.clone())
        }));

        let handle = run_build_loop(options).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        for content in ["v2", "v3", "v4", "v5"] {
            std::fs::write(&file, content).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while reports.lock().unwrap().is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        // Well past the window: nothing else may follow
        tokio::time::sleep(Duration::from_millis(900)).await;

        let reports = reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path.file_name().unwrap(), "a.ts");
        assert!(matches!(reports[0].outcome, RebuildOutcome::Rebuilt(ref r) if r.compiled == 1));
        assert_eq!(std::fs::read_to_string(dir.path().join("dist/a.js")).unwrap(), "v5");

        handle.close().await;
    }
}
