//! Session progress updates: phase completion, ledger notes, issue linkage.
//!
//! Thin read-merge-write cycles over the session store; each command is one
//! `update_session` call.

use std::path::Path;

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::enter::resolve_session_id;
use crate::io::layout::WorkspacePaths;
use crate::io::session_store::{
    LedgerEntry, LedgerKind, SessionState, read_session, update_session,
};

/// Outcome of `flowctl phase-done`.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseDoneOutcome {
    pub session_id: String,
    pub completed: String,
    /// The phase the session advanced to, if any remain.
    pub current_phase: Option<String>,
}

/// Mark `phase_id` completed and advance `currentPhase` to the next phase in
/// template order. Completed phases are append-only.
pub fn complete_phase(
    root: &Path,
    session: Option<&str>,
    phase_id: &str,
) -> Result<PhaseDoneOutcome> {
    let paths = WorkspacePaths::new(root);
    let session_id = resolve_session_id(root, session);
    let session_path = paths.session_path(&session_id);

    let current = read_session(&session_path)?;
    if !current.phases.iter().any(|p| p == phase_id) {
        return Err(anyhow!(
            "phase '{phase_id}' is not part of the session's template (phases: {})",
            current.phases.join(", ")
        ));
    }

    let state = update_session(&session_path, |state| {
        if !state.completed_phases.iter().any(|p| p == phase_id) {
            state.completed_phases.push(phase_id.to_string());
        }
        state.current_phase = next_open_phase(state);
    })?;

    info!(session_id = %session_id, phase = phase_id, "phase completed");
    Ok(PhaseDoneOutcome {
        session_id,
        completed: phase_id.to_string(),
        current_phase: state.current_phase,
    })
}

fn next_open_phase(state: &SessionState) -> Option<String> {
    state
        .phases
        .iter()
        .find(|p| !state.completed_phases.contains(p))
        .cloned()
}

/// Append a ledger note to the session.
pub fn record_note(
    root: &Path,
    session: Option<&str>,
    kind: LedgerKind,
    note: &str,
) -> Result<()> {
    let paths = WorkspacePaths::new(root);
    let session_id = resolve_session_id(root, session);
    update_session(&paths.session_path(&session_id), |state| {
        state.ledger.push(LedgerEntry {
            kind,
            note: note.to_string(),
            at: Utc::now(),
        });
    })?;
    Ok(())
}

/// Link an external issue to the session.
pub fn link_issue(
    root: &Path,
    session: Option<&str>,
    number: u64,
    title: Option<&str>,
    issue_type: Option<&str>,
) -> Result<()> {
    let paths = WorkspacePaths::new(root);
    let session_id = resolve_session_id(root, session);
    update_session(&paths.session_path(&session_id), |state| {
        state.issue_number = Some(number);
        state.issue_title = title.map(str::to_string);
        state.issue_type = issue_type.map(str::to_string);
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enter::{EnterOptions, enter_mode};
    use crate::io::layout::{InitOptions, init_workspace};
    use crate::io::session_store::read_session;

    fn setup(root: &Path) -> WorkspacePaths {
        let paths = init_workspace(root, &InitOptions { force: false }).expect("init");
        enter_mode(
            root,
            &EnterOptions {
                mode: "debug".to_string(),
                session_id: Some("ses-test".to_string()),
                workflow_id: None,
                spec_id: None,
            },
        )
        .expect("enter");
        paths
    }

    #[test]
    fn completing_phases_advances_current_phase_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = setup(temp.path());

        let outcome = complete_phase(temp.path(), Some("ses-test"), "p0").expect("complete");
        assert_eq!(outcome.current_phase.as_deref(), Some("p1"));

        complete_phase(temp.path(), Some("ses-test"), "p1").expect("complete");
        let outcome = complete_phase(temp.path(), Some("ses-test"), "p2").expect("complete");
        assert_eq!(outcome.current_phase, None);

        let state = read_session(&paths.session_path("ses-test")).expect("read");
        assert_eq!(state.completed_phases, vec!["p0", "p1", "p2"]);
    }

    #[test]
    fn completing_a_phase_twice_does_not_duplicate() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = setup(temp.path());
        complete_phase(temp.path(), Some("ses-test"), "p0").expect("complete");
        complete_phase(temp.path(), Some("ses-test"), "p0").expect("complete again");
        let state = read_session(&paths.session_path("ses-test")).expect("read");
        assert_eq!(state.completed_phases, vec!["p0"]);
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        setup(temp.path());
        let err = complete_phase(temp.path(), Some("ses-test"), "p9").unwrap_err();
        assert!(err.to_string().contains("not part of the session"));
    }

    #[test]
    fn notes_and_issue_linkage_persist() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = setup(temp.path());

        record_note(
            temp.path(),
            Some("ses-test"),
            LedgerKind::Discovery,
            "the failure only reproduces with a stale cache",
        )
        .expect("note");
        link_issue(temp.path(), Some("ses-test"), 42, Some("Stale cache"), Some("bug"))
            .expect("issue");

        let state = read_session(&paths.session_path("ses-test")).expect("read");
        assert_eq!(state.ledger.len(), 1);
        assert_eq!(state.ledger[0].kind, LedgerKind::Discovery);
        assert_eq!(state.issue_number, Some(42));
        assert_eq!(state.issue_title.as_deref(), Some("Stale cache"));
    }
}
