//! Orchestration for entering a workflow mode.
//!
//! `enter` resolves the requested mode, loads and validates its template,
//! expands tasks (splicing spec phases through the container when a spec is
//! given), derives the required todos, and persists the session state. All
//! configuration and validation errors surface before any state mutation.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::guidance::{RequiredTodos, build_guidance};
use crate::core::tasks::{NativeTask, build_tasks};
use crate::core::types::ModeStatus;
use crate::core::validate::validate_phases_or_bail;
use crate::io::git::Git;
use crate::io::layout::WorkspacePaths;
use crate::io::modes::{load_modes, resolve_provider};
use crate::io::patterns::load_patterns;
use crate::io::session_store::{
    DEFAULT_MODE, ModeHistoryEntry, ModeState, load_or_create, write_session,
};
use crate::io::spec_store::load_spec;
use crate::io::template_store::load_template;

/// Options for `flowctl enter`.
#[derive(Debug, Clone, Default)]
pub struct EnterOptions {
    pub mode: String,
    pub session_id: Option<String>,
    pub workflow_id: Option<String>,
    /// Numeric id of the spec document to expand through the container.
    pub spec_id: Option<u32>,
}

/// Outcome of `flowctl enter`, serialized for the invoking hook.
#[derive(Debug, Clone, Serialize)]
pub struct EnterOutcome {
    pub session_id: String,
    pub mode: String,
    pub template: String,
    pub tasks: Vec<NativeTask>,
    pub todos: RequiredTodos,
}

/// Enter `mode` for the session rooted at `root`.
pub fn enter_mode(root: &Path, opts: &EnterOptions) -> Result<EnterOutcome> {
    let paths = WorkspacePaths::new(root);

    let modes = load_modes(&paths.modes_path)?;
    let resolved = modes.resolve(&opts.mode)?;
    debug!(requested = %opts.mode, mode = %resolved.name, "mode resolved");

    let template = load_template(&paths.templates_dir, &resolved.config.template)?;
    let phases = validate_phases_or_bail(template.doc.phases, &template.path)?;
    let patterns = load_patterns(&paths.patterns_path)?;

    let spec = match opts.spec_id {
        Some(id) => Some(load_spec(&paths.specs_dir, id)?.ok_or_else(|| {
            anyhow!(
                "spec {id} not found in {} (expected {id}-<name>.md)",
                paths.specs_dir.display()
            )
        })?),
        None => None,
    };
    let spec_phases = spec.as_ref().map(|doc| doc.phases.as_slice()).unwrap_or(&[]);

    let mut tasks = build_tasks(&phases, spec_phases, &patterns)
        .map_err(|err| anyhow!("task generation failed: {err}"))?;
    for task in &mut tasks {
        if let Some(agent) = &mut task.agent {
            agent.provider = resolve_provider(&agent.provider, &modes.agents)?;
        }
    }

    let phase_titles: Vec<String> = phases.iter().map(|p| p.name.clone()).collect();
    let todos = build_guidance(
        &resolved.name,
        resolved.config.issue_handling,
        &tasks,
        &phase_titles,
    );

    let session_id = resolve_session_id(root, opts.session_id.as_deref());
    let workflow_id = opts.workflow_id.clone().unwrap_or_else(|| session_id.clone());
    let session_path = paths.session_path(&session_id);

    let mut state = load_or_create(&session_path, &session_id, &workflow_id)?;
    let now = Utc::now();

    // Re-entering while another mode is active pauses that mode rather than
    // silently dropping its record.
    if state.current_mode != DEFAULT_MODE {
        let previous = state.current_mode.clone();
        if let Some(mode_state) = state.mode_state.get_mut(&previous)
            && mode_state.status == ModeStatus::Active
        {
            mode_state.status = ModeStatus::Paused;
            mode_state.closed_at = Some(now);
        }
        if let Some(entry) = state
            .mode_history
            .iter_mut()
            .rev()
            .find(|e| e.mode == previous && e.exited_at.is_none())
        {
            entry.exited_at = Some(now);
        }
    }

    state.current_mode = resolved.name.clone();
    state.current_phase = phases.first().map(|p| p.id.clone());
    state.template = Some(resolved.config.template.clone());
    state.phases = phases.iter().map(|p| p.id.clone()).collect();
    state.mode_history.push(ModeHistoryEntry {
        mode: resolved.name.clone(),
        entered_at: Some(now),
        exited_at: None,
    });
    state.mode_state.insert(
        resolved.name.clone(),
        ModeState {
            status: ModeStatus::Active,
            entered_at: now,
            closed_at: None,
        },
    );
    if let Some(issue) = spec.as_ref().and_then(|doc| doc.github_issue) {
        state.issue_number = Some(issue);
    }
    state.updated_at = now;
    write_session(&session_path, &state)
        .context("persist session state after entering mode")?;

    info!(session_id = %session_id, mode = %resolved.name, tasks = tasks.len(), "mode entered");
    Ok(EnterOutcome {
        session_id,
        mode: resolved.name,
        template: resolved.config.template,
        tasks,
        todos,
    })
}

/// Session id for this invocation: the explicit id when given, otherwise a
/// stable id derived from the repository HEAD, with a fixed fallback outside
/// git.
pub fn resolve_session_id(root: &Path, explicit: Option<&str>) -> String {
    if let Some(id) = explicit {
        return id.to_string();
    }
    match Git::new(root).head_short_sha(8) {
        Ok(sha) => format!("ses-{sha}"),
        Err(_) => "ses-local".to_string(),
    }
}
