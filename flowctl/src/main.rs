//! Workflow session driver CLI.
//!
//! Thin dispatcher: each subcommand delegates to an orchestration module and
//! maps its outcome onto stable exit codes. Machine-consumed output (JSON
//! for the invoking hook) goes to stdout; diagnostics go to stderr.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use flowctl::can_exit::evaluate_can_exit;
use flowctl::core::gate::{ESCAPE_HATCH, ExitDecision};
use flowctl::core::types::ModeStatus;
use flowctl::core::validate::format_errors;
use flowctl::enter::{EnterOptions, enter_mode, resolve_session_id};
use flowctl::exit_codes;
use flowctl::io::git::Git;
use flowctl::io::layout::{InitOptions, WorkspacePaths, init_workspace};
use flowctl::io::session_store::{LedgerKind, read_session};
use flowctl::leave::leave_mode;
use flowctl::logging;
use flowctl::progress::{complete_phase, link_issue, record_note};
use flowctl::validate::validate_workspace;

#[derive(Debug, Parser)]
#[command(
    name = "flowctl",
    version,
    about = "Workflow session driver for AI coding agents"
)]
struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Session id (defaults to an id derived from the repository HEAD).
    #[arg(long, global = true)]
    session: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create `.flowctl/` scaffolding (modes, patterns, starter templates).
    Init {
        /// Overwrite existing configuration files.
        #[arg(short, long)]
        force: bool,
    },
    /// Enter a workflow mode and print the generated tasks and todos.
    Enter {
        /// Mode name or alias.
        mode: String,
        /// Numeric id of the spec document to expand through the container.
        #[arg(long)]
        spec: Option<u32>,
        /// Workflow id to record (defaults to the session id).
        #[arg(long)]
        workflow: Option<String>,
    },
    /// Evaluate the active mode's stop conditions (the stop hook).
    CanExit {
        /// Also print the escape-hatch guidance for blocked sessions.
        #[arg(long)]
        escape_hatch: bool,
    },
    /// Close the active mode and return to the default mode.
    Leave {
        /// Close as abandoned instead of completed.
        #[arg(long, conflicts_with = "pause")]
        abandon: bool,
        /// Close as paused instead of completed.
        #[arg(long)]
        pause: bool,
    },
    /// Mark a template phase completed and advance the current phase.
    PhaseDone { phase: String },
    /// Append a ledger note to the session.
    Note {
        #[arg(long, value_enum, default_value = "decision")]
        kind: NoteKind,
        text: String,
    },
    /// Link an external issue to the session.
    Issue {
        #[arg(long)]
        number: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "type")]
        issue_type: Option<String>,
    },
    /// Print a human-readable session summary.
    Status,
    /// Validate mode config, templates, and pattern references.
    Validate,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NoteKind {
    Decision,
    Discovery,
    Correction,
}

impl From<NoteKind> for LedgerKind {
    fn from(kind: NoteKind) -> Self {
        match kind {
            NoteKind::Decision => LedgerKind::Decision,
            NoteKind::Discovery => LedgerKind::Discovery,
            NoteKind::Correction => LedgerKind::Correction,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli
        .root
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let session = cli.session.as_deref();

    match cli.command {
        Command::Init { force } => {
            let paths = init_workspace(&root, &InitOptions { force })?;
            println!("initialized {}", paths.flow_dir.display());
            Ok(exit_codes::OK)
        }
        Command::Enter {
            mode,
            spec,
            workflow,
        } => {
            let outcome = enter_mode(
                &root,
                &EnterOptions {
                    mode,
                    session_id: cli.session.clone(),
                    workflow_id: workflow,
                    spec_id: spec,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_codes::OK)
        }
        Command::CanExit { escape_hatch } => {
            let report = evaluate_can_exit(&root, session)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            let code = match &report.decision {
                ExitDecision::Allow => exit_codes::OK,
                ExitDecision::Blocked(_) => exit_codes::BLOCKED,
            };
            if escape_hatch {
                eprintln!("{ESCAPE_HATCH}");
            }
            Ok(code)
        }
        Command::Leave { abandon, pause } => {
            let status = if abandon {
                ModeStatus::Abandoned
            } else if pause {
                ModeStatus::Paused
            } else {
                ModeStatus::Completed
            };
            let outcome = leave_mode(&root, session, status)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_codes::OK)
        }
        Command::PhaseDone { phase } => {
            let outcome = complete_phase(&root, session, &phase)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_codes::OK)
        }
        Command::Note { kind, text } => {
            record_note(&root, session, kind.into(), &text)?;
            Ok(exit_codes::OK)
        }
        Command::Issue {
            number,
            title,
            issue_type,
        } => {
            link_issue(&root, session, number, title.as_deref(), issue_type.as_deref())?;
            Ok(exit_codes::OK)
        }
        Command::Status => {
            print_status(&root, session)?;
            Ok(exit_codes::OK)
        }
        Command::Validate => {
            let report = validate_workspace(&root)?;
            if report.is_valid() {
                println!("ok: {} template(s) valid", report.checked.len());
                Ok(exit_codes::OK)
            } else {
                eprintln!("{}", format_errors(&report.errors));
                Ok(exit_codes::INVALID)
            }
        }
    }
}

fn print_status(root: &Path, session: Option<&str>) -> Result<()> {
    let paths = WorkspacePaths::new(root);
    let session_id = resolve_session_id(root, session);
    let state = read_session(&paths.session_path(&session_id))?;

    println!("session:  {}", state.session_id);
    println!("workflow: {}", state.workflow_id);
    println!("mode:     {}", state.current_mode);
    if let Some(phase) = &state.current_phase {
        println!("phase:    {phase}");
    }
    if !state.phases.is_empty() {
        println!(
            "progress: {}/{} phases completed",
            state.completed_phases.len(),
            state.phases.len()
        );
    }
    if let Some(issue) = state.issue_number {
        let title = state.issue_title.as_deref().unwrap_or("");
        println!("issue:    #{issue} {title}");
    }
    if let Ok(branch) = Git::new(root).current_branch() {
        println!("branch:   {branch}");
    }
    for entry in &state.mode_history {
        let entered = entry
            .entered_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let exited = entry
            .exited_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "open".to_string());
        println!("history:  {} ({entered} -> {exited})", entry.mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_enter_with_spec() {
        let cli = Cli::parse_from(["flowctl", "enter", "implement", "--spec", "3"]);
        match cli.command {
            Command::Enter { mode, spec, .. } => {
                assert_eq!(mode, "implement");
                assert_eq!(spec, Some(3));
            }
            _ => panic!("expected enter"),
        }
    }

    #[test]
    fn parse_global_session_flag() {
        let cli = Cli::parse_from(["flowctl", "--session", "ses-1", "can-exit"]);
        assert_eq!(cli.session.as_deref(), Some("ses-1"));
        assert!(matches!(
            cli.command,
            Command::CanExit {
                escape_hatch: false
            }
        ));
    }

    #[test]
    fn parse_leave_flags_conflict() {
        let err = Cli::try_parse_from(["flowctl", "leave", "--abandon", "--pause"]).unwrap_err();
        assert!(err.to_string().contains("--pause"));
    }
}
