use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use planpatch::config::{load_for_root, AgentConfig, PLAN_COMMAND_ENV};
use planpatch::executor::{Confirm, PatchPreview, Session, TaskOptions, TaskReport};
use planpatch::events::{AgentEvent, EventBus, EventKind};
use planpatch::plan::{AgentPlan, CommandPlanSource, FilePlanSource, PlanSource};
use planpatch::scan::scan_project;
use planpatch::{logging, BackupManager, PatchResult};
use std::cell::Cell;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "planpatch")]
#[command(about = "Plan-driven find/replace patching for local projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task against a project
    Run {
        /// What to change, in plain words
        task: String,

        /// Project root (defaults to the current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Read the plan from a file, or from stdin with `-`
        #[arg(short, long, conflicts_with = "plan_command")]
        plan: Option<PathBuf>,

        /// Shell command that answers a plan request on stdout
        #[arg(long)]
        plan_command: Option<String>,

        /// Show what would change without writing files or running commands
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Skip confirmation prompts
        #[arg(short, long)]
        yes: bool,

        /// Show whole-file diffs instead of per-patch diffs
        #[arg(long)]
        diff: bool,

        /// Verbose logging and full error chains
        #[arg(long)]
        debug: bool,
    },

    /// List the files a task would see as context
    Scan {
        /// Project root (defaults to the current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List backup copies
    Backups {
        /// Project root (defaults to the current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            task,
            dir,
            plan,
            plan_command,
            dry_run,
            yes,
            diff,
            debug,
        } => {
            logging::init(debug);
            let options = RunOptions {
                dry_run,
                yes,
                full_diff: diff,
            };
            if let Err(e) = cmd_run(task, dir, plan, plan_command, options) {
                if debug {
                    eprintln!("{} {:?}", "Error:".red().bold(), e);
                } else {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Scan { dir } => {
            logging::init(false);
            cmd_scan(dir)
        }

        Commands::Backups { dir } => {
            logging::init(false);
            cmd_backups(dir)
        }
    }
}

struct RunOptions {
    dry_run: bool,
    yes: bool,
    full_diff: bool,
}

fn resolve_root(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("project directory not found: {}", dir.display()))
}

/// Flag, then config (which already folds in the environment override).
fn select_source(
    plan: Option<PathBuf>,
    plan_command: Option<String>,
    config: &AgentConfig,
) -> Result<Box<dyn PlanSource>> {
    if let Some(path) = plan {
        return Ok(Box::new(FilePlanSource::new(path)));
    }
    if let Some(command) = plan_command.or_else(|| config.plan.command.clone()) {
        return Ok(Box::new(CommandPlanSource::new(command)));
    }
    bail!(
        "no plan source: pass --plan or --plan-command, set [plan] command in .planpatch.toml, or set {PLAN_COMMAND_ENV}"
    )
}

fn cmd_run(
    task: String,
    dir: Option<PathBuf>,
    plan: Option<PathBuf>,
    plan_command: Option<String>,
    options: RunOptions,
) -> Result<()> {
    let root = resolve_root(dir)?;
    let config = load_for_root(&root)?;
    let source = select_source(plan, plan_command, &config)?;
    let session = Session::new(&root, config, source)?;

    println!("Project: {}", session.root().display());
    println!("Plan source: {}", session.source_name());
    if options.dry_run {
        println!("{}", "[DRY RUN - nothing will be written]".cyan());
    }
    println!();

    let mut bus = EventBus::new();
    bus.on(EventKind::Planning, |e| {
        if let AgentEvent::Planning { task } = e {
            println!("{} {}", "Planning:".bold(), task);
        }
    });
    bus.on(EventKind::ReadFile, |e| {
        if let AgentEvent::ReadFile { path } = e {
            println!("  {} {}", "read".dimmed(), path);
        }
    });
    bus.on(EventKind::WriteFile, |e| {
        if let AgentEvent::WriteFile { path } = e {
            println!("  {} {}", "write".green(), path);
        }
    });
    bus.on(EventKind::RunCommand, |e| {
        if let AgentEvent::RunCommand { command } = e {
            println!("{} {}", "$".cyan(), command);
        }
    });

    let confirm = TerminalConfirm {
        assume_yes: options.yes,
        full_diff: options.full_diff,
        shown: Cell::new(false),
    };
    let report = session.execute(
        &TaskOptions::new(task).dry_run(options.dry_run),
        &mut bus,
        &confirm,
    )?;

    if !confirm.shown.get() {
        show_review(
            &report.plan,
            &report.results,
            if options.full_diff {
                &report.file_diffs
            } else {
                &report.diffs
            },
        );
    }
    show_summary(&report);
    Ok(())
}

/// Prompts on the terminal; the review is printed before the first question.
struct TerminalConfirm {
    assume_yes: bool,
    full_diff: bool,
    shown: Cell<bool>,
}

impl Confirm for TerminalConfirm {
    fn confirm_patches(&self, preview: &PatchPreview<'_>) -> bool {
        let diffs = if self.full_diff {
            preview.file_diffs
        } else {
            preview.diffs
        };
        show_review(preview.plan, preview.results, diffs);
        self.shown.set(true);
        self.assume_yes || ask("Apply these patches?", true)
    }

    fn confirm_commands(&self, commands: &[String]) -> bool {
        println!("{}", "Commands:".bold());
        for command in commands {
            println!("  {} {}", "$".cyan(), command);
        }
        self.assume_yes || ask("Run these commands?", false)
    }
}

/// Ask a yes/no question; empty input or EOF picks `default`.
///
/// A plan read from stdin leaves stdin at EOF, so every prompt takes its
/// default.
fn ask(question: &str, default: bool) -> bool {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{} {} ", question.bold(), hint.dimmed());
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => default,
        Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        },
    }
}

fn show_review(plan: &AgentPlan, results: &[PatchResult], diffs: &[String]) {
    if !plan.analysis.is_empty() {
        println!("{}", "Analysis:".bold());
        println!("  {}", plan.analysis);
        println!();
    }

    if !plan.files_to_edit.is_empty() {
        println!("{}", "Files to edit:".bold());
        for file in &plan.files_to_edit {
            if file.reason.is_empty() {
                println!("  - {}", file.path);
            } else {
                println!("  - {} {}", file.path, format!("({})", file.reason).dimmed());
            }
        }
        println!();
    }

    for result in results.iter().filter(|r| !r.applied()) {
        eprintln!("{} {}", "⚠".yellow(), result.to_string().yellow());
    }

    for diff in diffs {
        println!();
        for line in diff.lines() {
            let colored = if line.starts_with("---") || line.starts_with("+++") {
                line.dimmed()
            } else if line.starts_with("@@") {
                line.cyan()
            } else if line.starts_with('-') {
                line.red()
            } else if line.starts_with('+') {
                line.green()
            } else {
                line.normal()
            };
            println!("{colored}");
        }
    }
    println!();
}

fn show_summary(report: &TaskReport) {
    println!("{}", "Summary:".bold());
    let failed = report.failed_patches().count();
    let applied = report.results.len() - failed;
    println!("  {} applied", format!("{applied}").green());
    println!("  {} failed", format!("{failed}").red());
    if !report.backups.is_empty() {
        println!("  {} backed up", format!("{}", report.backups.len()).cyan());
    }
    if !report.commands_run.is_empty() {
        println!(
            "  {} command(s) run",
            format!("{}", report.commands_run.len()).cyan()
        );
    }
    for note in &report.plan.agent_notes {
        println!("  {} {}", "note:".dimmed(), note);
    }
    println!("{} {}", "✓".green(), report.message);
}

fn cmd_scan(dir: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(dir)?;
    let config = load_for_root(&root)?;
    let scan = scan_project(&root, &config.scan_options());

    let readable: std::collections::BTreeSet<&str> = scan
        .files
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect();
    for path in &scan.file_list {
        if readable.contains(path.as_str()) {
            println!("{path}");
        } else {
            println!("{} {}", path, "(too large or unreadable)".dimmed());
        }
    }

    println!();
    println!(
        "{} listed, {} readable",
        format!("{}", scan.file_list.len()).green(),
        format!("{}", scan.files.len()).green()
    );
    Ok(())
}

fn cmd_backups(dir: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(dir)?;
    let config = load_for_root(&root)?;
    let manager = BackupManager::new(&root, &config.backup.dir);
    let backups = manager
        .list()
        .with_context(|| format!("failed to list {}", manager.backup_dir().display()))?;

    if backups.is_empty() {
        println!("{}", "No backups found".yellow());
        return Ok(());
    }

    for path in &backups {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        println!("{name}");
    }
    println!();
    println!("{} backup(s) in {}", backups.len(), manager.backup_dir().display());
    Ok(())
}
