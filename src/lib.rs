//! planpatch: plan-driven find/replace patching for local projects
//!
//! A task runs as a fixed pipeline: the project is scanned, a plan producer
//! is asked for a JSON edit plan, the plan's find/replace patches are applied
//! to an in-memory snapshot, diffs are shown for review, and only then are
//! changed files backed up and written. Plan commands run last.
//!
//! # Architecture
//!
//! Every edit compiles down to one primitive: replace the first exact
//! occurrence of `find` with `replace` ([`apply_patch`]). Patches never touch
//! the disk directly. They produce a new [`ContentSnapshot`], and the
//! [`writer`] commits only files whose content actually changed.
//!
//! # Safety
//!
//! - Patch targets must stay inside the project root ([`WorkspaceGuard`])
//! - Malformed plans abort before anything is backed up or written
//! - Changed files are backed up before being overwritten
//! - Atomic file writes (tempfile + fsync + rename)
//! - Unchanged files are never written
//!
//! # Example
//!
//! ```no_run
//! use planpatch::{AgentConfig, AutoConfirm, EventBus, Session, StaticPlanSource, TaskOptions};
//!
//! let plan = r#"{"patches": [{"file": "a.txt", "find": "world", "replace": "there"}]}"#;
//! let session = Session::new(".", AgentConfig::default(), Box::new(StaticPlanSource::new(plan)))?;
//!
//! let mut bus = EventBus::new();
//! let report = session.execute(&TaskOptions::new("greet"), &mut bus, &AutoConfirm(true))?;
//! println!("{}", report.message);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
pub mod batch;
pub mod command;
pub mod config;
pub mod diff;
pub mod events;
pub mod executor;
pub mod logging;
pub mod patch;
pub mod plan;
pub mod safety;
pub mod scan;
pub mod select;
pub mod snapshot;
pub mod writer;

// Re-exports
pub use backup::{BackupError, BackupManager, BackupRecord};
pub use batch::{apply_all, BatchOutcome};
pub use command::{CommandError, CommandRunner, ShellRunner};
pub use config::{load_for_root, load_from_path, load_from_str, AgentConfig, ConfigError};
pub use diff::{replace_diff, unified_diff};
pub use events::{AgentEvent, EventBus, EventKind, ListenerId};
pub use executor::{
    AutoConfirm, Confirm, PatchPreview, Session, TaskError, TaskOptions, TaskReport,
};
pub use patch::{apply_patch, PatchError, PatchOperation, PatchOutcome, PatchResult};
pub use plan::{
    parse_plan, AgentPlan, CommandPlanSource, FilePlanSource, FileToEdit, PlanError, PlanSource,
    PlanSourceError, StaticPlanSource,
};
pub use safety::{SafetyError, WorkspaceGuard};
pub use scan::{scan_project, ScanOptions, ScanResult, ScannedFile};
pub use select::{select_relevant_files, ContextBudget};
pub use snapshot::{resolve_content, ContentSnapshot};
pub use writer::{write_changes, WriteError};
