//! Task execution: one task from plan request to written files.
//!
//! The pipeline is a fixed sequence of stages, each a function from the
//! previous stage's output:
//!
//! 1. [`plan_stage`]: scan, select context, ask the plan source, parse.
//! 2. [`apply_stage`]: guard targets, resolve content, apply patches in memory.
//! 3. [`diff_stage`]: render the applied patches for review.
//! 4. confirmation through [`Confirm`].
//! 5. [`write_stage`]: back up and write changed files.
//! 6. [`command_stage`]: run the plan's commands, stopping at the first failure.
//!
//! A [`Session`] carries everything that outlives a single task: the project
//! root, config, plan source and busy flag. Sessions share nothing, so several
//! can run side by side.

use crate::backup::{BackupManager, BackupRecord};
use crate::batch::{apply_all, BatchOutcome};
use crate::command::{CommandError, CommandRunner, ShellRunner};
use crate::config::AgentConfig;
use crate::diff::{replace_diff, unified_diff};
use crate::events::{AgentEvent, EventBus};
use crate::patch::{PatchError, PatchOperation, PatchOutcome, PatchResult};
use crate::plan::{
    build_system_prompt, build_user_prompt, parse_plan, AgentPlan, PlanError, PlanRequest,
    PlanSource, PlanSourceError,
};
use crate::safety::{normalize_target, SafetyError, WorkspaceGuard};
use crate::scan::scan_project;
use crate::select::select_relevant_files;
use crate::snapshot::{resolve_content, ContentSnapshot};
use crate::writer::{write_changes, WriteError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("a task is already running in this session")]
    Busy,

    #[error(transparent)]
    Source(#[from] PlanSourceError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// What the reviewer sees before patches are written.
#[derive(Debug, Clone, Copy)]
pub struct PatchPreview<'a> {
    pub plan: &'a AgentPlan,
    pub results: &'a [PatchResult],
    /// One block per applied patch
    pub diffs: &'a [String],
    /// Whole-file diffs of every changed file
    pub file_diffs: &'a [String],
}

/// Decides whether computed patches are written and commands run.
pub trait Confirm {
    fn confirm_patches(&self, preview: &PatchPreview<'_>) -> bool;

    fn confirm_commands(&self, commands: &[String]) -> bool;
}

/// Answers every question the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm_patches(&self, _preview: &PatchPreview<'_>) -> bool {
        self.0
    }

    fn confirm_commands(&self, _commands: &[String]) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub task: String,
    /// Compute and show patches but write nothing and run nothing
    pub dry_run: bool,
}

impl TaskOptions {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Everything a finished task produced.
#[derive(Debug, Clone, Default)]
pub struct TaskReport {
    pub plan: AgentPlan,
    /// One result per patch operation, in plan order
    pub results: Vec<PatchResult>,
    pub diffs: Vec<String>,
    pub file_diffs: Vec<String>,
    /// Files actually written, sorted
    pub files_modified: Vec<String>,
    pub backups: BackupRecord,
    pub commands_run: Vec<String>,
    pub message: String,
}

impl TaskReport {
    pub fn failed_patches(&self) -> impl Iterator<Item = &PatchResult> {
        self.results.iter().filter(|r| !r.applied())
    }
}

/// Closing message for a successful task.
pub fn success_message(files_modified: usize, patch_count: usize) -> String {
    if files_modified > 0 {
        format!("{files_modified} file(s) updated")
    } else if patch_count == 0 {
        "No edits in plan".to_string()
    } else {
        "No changes applied".to_string()
    }
}

/// Output of [`plan_stage`].
#[derive(Debug, Clone)]
pub struct Planned {
    pub plan: AgentPlan,
    /// `(relative_path, content)` of the files sent as context
    pub context: Vec<(String, String)>,
}

/// Scan the project, build the request and parse the producer's answer.
pub fn plan_stage(
    root: &Path,
    config: &AgentConfig,
    source: &dyn PlanSource,
    task: &str,
) -> Result<Planned, TaskError> {
    let scan = scan_project(root, &config.scan_options());
    let selected = select_relevant_files(task, &scan.files, config.context_budget());
    debug!(
        listed = scan.file_list.len(),
        selected = selected.len(),
        "context selected"
    );

    let request = PlanRequest {
        system: build_system_prompt(),
        user: build_user_prompt(task, &scan.file_list, &selected, config.context.list_limit),
    };
    let raw = source.produce(&request)?;
    debug!(source = source.name(), bytes = raw.len(), "plan received");
    let plan = parse_plan(&raw)?;

    let context = selected
        .iter()
        .map(|f| (f.relative_path.clone(), f.content.clone()))
        .collect();
    Ok(Planned { plan, context })
}

/// Output of [`apply_stage`].
#[derive(Debug, Clone)]
pub struct Applied {
    pub before: ContentSnapshot,
    pub batch: BatchOutcome,
}

impl Applied {
    /// Paths whose content differs between `before` and `after`.
    pub fn changed_paths(&self) -> Vec<&str> {
        self.batch
            .after
            .iter()
            .filter(|(path, content)| self.before.get(*path) != Some(*content))
            .map(|(path, _)| path.as_str())
            .collect()
    }
}

/// Apply the plan's patches to an in-memory snapshot.
///
/// Targets are keyed by [`normalize_target`], so `./a.txt` and `a.txt` are
/// one file. Targets rejected by `guard` are never read; their operations
/// fail with [`PatchError::UnsafePath`]. Other targets missing from `context`
/// are read from disk, firing `ReadFile` first.
pub fn apply_stage(
    guard: &WorkspaceGuard,
    plan: &AgentPlan,
    context: Vec<(String, String)>,
    bus: &mut EventBus,
) -> Applied {
    let normalized = AgentPlan {
        patches: plan
            .patches
            .iter()
            .map(|op| PatchOperation {
                file: normalize_target(&op.file),
                ..op.clone()
            })
            .collect(),
        ..AgentPlan::default()
    };

    let mut rejected: BTreeMap<&str, SafetyError> = BTreeMap::new();
    for target in normalized.patch_targets() {
        if let Err(e) = guard.validate_target(target) {
            warn!(path = target, error = %e, "rejecting patch target");
            rejected.insert(target, e);
        }
    }

    let safe_targets = normalized
        .patch_targets()
        .into_iter()
        .filter(|t| !rejected.contains_key(t));
    let mut before = resolve_content(context, safe_targets, guard.workspace_root(), |path| {
        bus.emit(AgentEvent::ReadFile {
            path: path.to_string(),
        })
    });
    before.retain(|path, _| !rejected.contains_key(path.as_str()));

    let mut batch = apply_all(&before, &normalized.patches);
    for result in &mut batch.results {
        if let Some(e) = rejected.get(result.file.as_str()) {
            result.outcome = PatchOutcome::Failed(PatchError::UnsafePath(e.to_string()));
        }
    }

    Applied { before, batch }
}

/// One [`replace_diff`] block per applied operation, in plan order.
pub fn diff_stage(plan: &AgentPlan, batch: &BatchOutcome) -> Vec<String> {
    batch
        .applied()
        .filter_map(|result| {
            plan.patches
                .get(result.index)
                .map(|op| replace_diff(&result.file, &op.find, &op.replace))
        })
        .collect()
}

/// Whole-file diffs for every changed file.
pub fn file_diff_stage(applied: &Applied) -> Vec<String> {
    applied
        .changed_paths()
        .into_iter()
        .map(|path| {
            let old = applied.before.get(path).map(String::as_str).unwrap_or("");
            let new = applied.batch.after.get(path).map(String::as_str).unwrap_or("");
            unified_diff(path, old, new)
        })
        .collect()
}

/// Back up the files about to change, then write them.
pub fn write_stage(
    root: &Path,
    config: &AgentConfig,
    applied: &Applied,
    bus: &mut EventBus,
) -> Result<(Vec<String>, BackupRecord), TaskError> {
    let backups = if config.backup.enabled {
        BackupManager::new(root, &config.backup.dir).backup_files(applied.changed_paths())
    } else {
        BackupRecord::new()
    };

    let written = write_changes(root, &applied.before, &applied.batch.after, |path| {
        bus.emit(AgentEvent::WriteFile {
            path: path.to_string(),
        })
    })?;
    Ok((written, backups))
}

/// Run `commands` in order from `root`; the first failure ends the stage.
pub fn command_stage(
    runner: &dyn CommandRunner,
    root: &Path,
    commands: &[String],
    bus: &mut EventBus,
) -> Result<Vec<String>, TaskError> {
    let mut run = Vec::with_capacity(commands.len());
    for command in commands {
        bus.emit(AgentEvent::RunCommand {
            command: command.clone(),
        });
        runner.run(command, root)?;
        run.push(command.clone());
    }
    Ok(run)
}

/// Clears the busy flag when the task ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-project execution context.
pub struct Session {
    root: PathBuf,
    config: AgentConfig,
    guard: WorkspaceGuard,
    source: Box<dyn PlanSource>,
    runner: Box<dyn CommandRunner>,
    busy: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("root", &self.root)
            .field("source", &self.source.name())
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl Session {
    /// Commands run through [`ShellRunner`] unless replaced with
    /// [`Session::with_runner`].
    pub fn new(
        root: impl AsRef<Path>,
        config: AgentConfig,
        source: Box<dyn PlanSource>,
    ) -> Result<Self, SafetyError> {
        let guard = WorkspaceGuard::new(root.as_ref(), &config.backup.dir)?;
        Ok(Self {
            root: guard.workspace_root().to_path_buf(),
            config,
            guard,
            source,
            runner: Box::new(ShellRunner),
            busy: AtomicBool::new(false),
        })
    }

    pub fn with_runner(mut self, runner: Box<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one task.
    ///
    /// Exactly one terminal event is emitted: `Success` with the report's
    /// message, or `Error` with the error's message.
    pub fn execute(
        &self,
        options: &TaskOptions,
        bus: &mut EventBus,
        confirm: &dyn Confirm,
    ) -> Result<TaskReport, TaskError> {
        let result = match BusyGuard::acquire(&self.busy) {
            Some(_busy) => self.run_task(options, bus, confirm),
            None => Err(TaskError::Busy),
        };

        match &result {
            Ok(report) => bus.emit(AgentEvent::Success {
                files_modified: report.files_modified.clone(),
                message: report.message.clone(),
            }),
            Err(e) => bus.emit(AgentEvent::Error {
                message: e.to_string(),
            }),
        }
        result
    }

    fn run_task(
        &self,
        options: &TaskOptions,
        bus: &mut EventBus,
        confirm: &dyn Confirm,
    ) -> Result<TaskReport, TaskError> {
        bus.emit(AgentEvent::Planning {
            task: options.task.clone(),
        });

        let Planned { plan, context } =
            plan_stage(&self.root, &self.config, self.source.as_ref(), &options.task)?;
        let applied = apply_stage(&self.guard, &plan, context, bus);
        let diffs = diff_stage(&plan, &applied.batch);
        let file_diffs = file_diff_stage(&applied);
        if !diffs.is_empty() {
            bus.emit(AgentEvent::Diffs {
                diffs: diffs.clone(),
            });
        }

        let mut report = TaskReport {
            results: applied.batch.results.clone(),
            diffs,
            file_diffs,
            ..TaskReport::default()
        };

        if options.dry_run {
            info!("dry run, nothing written");
        } else {
            let preview = PatchPreview {
                plan: &plan,
                results: &report.results,
                diffs: &report.diffs,
                file_diffs: &report.file_diffs,
            };
            if !report.diffs.is_empty() && confirm.confirm_patches(&preview) {
                let (written, backups) = write_stage(&self.root, &self.config, &applied, bus)?;
                report.files_modified = written;
                report.backups = backups;
            }

            if !plan.commands.is_empty() && confirm.confirm_commands(&plan.commands) {
                report.commands_run =
                    command_stage(self.runner.as_ref(), &self.root, &plan.commands, bus)?;
            }
        }

        report.message = success_message(report.files_modified.len(), plan.patches.len());
        report.plan = plan;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::plan::StaticPlanSource;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    fn plan_with(patches: Vec<PatchOperation>) -> AgentPlan {
        AgentPlan {
            patches,
            ..AgentPlan::default()
        }
    }

    fn recorder(bus: &mut EventBus) -> Rc<RefCell<Vec<AgentEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        bus.on_any(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn test_success_message() {
        assert_eq!(success_message(2, 3), "2 file(s) updated");
        assert_eq!(success_message(0, 0), "No edits in plan");
        assert_eq!(success_message(0, 1), "No changes applied");
    }

    #[test]
    fn test_apply_stage_rejects_unsafe_targets() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path(), ".backups").unwrap();
        let plan = plan_with(vec![
            PatchOperation::new("../escape.txt", "", "x"),
            PatchOperation::new("ok.txt", "", "fine"),
        ]);
        let mut bus = EventBus::new();
        let events = recorder(&mut bus);

        let applied = apply_stage(&guard, &plan, Vec::new(), &mut bus);

        assert!(matches!(
            applied.batch.results[0].error(),
            Some(PatchError::UnsafePath(_))
        ));
        assert!(applied.batch.results[1].applied());
        assert!(!applied.batch.after.contains_key("../escape.txt"));
        assert_eq!(
            *events.borrow(),
            vec![AgentEvent::ReadFile {
                path: "ok.txt".to_string()
            }]
        );
    }

    #[test]
    fn test_diff_stage_only_covers_applied_operations() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = WorkspaceGuard::new(temp_dir.path(), ".backups").unwrap();
        let plan = plan_with(vec![
            PatchOperation::new("a.txt", "one", "uno"),
            PatchOperation::new("a.txt", "missing", "x"),
        ]);
        let context = vec![("a.txt".to_string(), "one\ntwo".to_string())];

        let applied = apply_stage(&guard, &plan, context, &mut EventBus::new());
        let diffs = diff_stage(&plan, &applied.batch);
        let file_diffs = file_diff_stage(&applied);

        assert_eq!(diffs, vec!["--- a.txt\n+++ a.txt\n-one\n+uno"]);
        assert_eq!(file_diffs.len(), 1);
        assert!(file_diffs[0].contains("@@ -1,1 +1,1 @@\n-one\n+uno"));
    }

    #[test]
    fn test_busy_session_rejects_second_task() {
        let temp_dir = tempfile::tempdir().unwrap();
        let session = Session::new(
            temp_dir.path(),
            AgentConfig::default(),
            Box::new(StaticPlanSource::new("{}")),
        )
        .unwrap();
        let mut bus = EventBus::new();
        let events = recorder(&mut bus);

        let held = BusyGuard::acquire(&session.busy).unwrap();
        let err = session
            .execute(&TaskOptions::new("t"), &mut bus, &AutoConfirm(true))
            .unwrap_err();
        assert!(matches!(err, TaskError::Busy));
        assert_eq!(events.borrow().len(), 1);
        assert_eq!(events.borrow()[0].kind(), EventKind::Error);

        drop(held);
        assert!(!session.is_busy());
        let report = session
            .execute(&TaskOptions::new("t"), &mut bus, &AutoConfirm(true))
            .unwrap();
        assert_eq!(report.message, "No edits in plan");
        assert!(!session.is_busy());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "hello world").unwrap();
        let raw = r#"{"patches": [{"file": "a.txt", "find": "world", "replace": "there"}],
                      "commands": ["false"]}"#;
        let session = Session::new(
            temp_dir.path(),
            AgentConfig::default(),
            Box::new(StaticPlanSource::new(raw)),
        )
        .unwrap();

        let report = session
            .execute(
                &TaskOptions::new("greet").dry_run(true),
                &mut EventBus::new(),
                &AutoConfirm(true),
            )
            .unwrap();

        assert_eq!(report.diffs.len(), 1);
        assert!(report.files_modified.is_empty());
        assert!(report.commands_run.is_empty());
        assert_eq!(report.message, "No changes applied");
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("a.txt")).unwrap(),
            "hello world"
        );
    }

    #[test]
    fn test_declined_patches_are_not_written() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "hello world").unwrap();
        let raw = r#"{"patches": [{"file": "a.txt", "find": "world", "replace": "there"}]}"#;
        let session = Session::new(
            temp_dir.path(),
            AgentConfig::default(),
            Box::new(StaticPlanSource::new(raw)),
        )
        .unwrap();

        let report = session
            .execute(&TaskOptions::new("greet"), &mut EventBus::new(), &AutoConfirm(false))
            .unwrap();

        assert!(report.files_modified.is_empty());
        assert!(report.backups.is_empty());
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("a.txt")).unwrap(),
            "hello world"
        );
    }
}
