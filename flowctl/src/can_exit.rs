//! Orchestration for the exit gate (`flowctl can-exit` / the stop hook).

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::core::gate::{ExitDecision, evaluate_exit};
use crate::enter::resolve_session_id;
use crate::io::layout::WorkspacePaths;
use crate::io::modes::load_modes;
use crate::io::session_store::{DEFAULT_MODE, read_session};
use crate::io::signals::LiveSignalSource;

/// Outcome of a gate evaluation, serialized for the invoking hook.
#[derive(Debug, Clone, Serialize)]
pub struct GateReport {
    pub session_id: String,
    pub mode: String,
    #[serde(flatten)]
    pub decision: ExitDecision,
}

/// Evaluate whether the session may exit its current mode.
pub fn evaluate_can_exit(root: &Path, session: Option<&str>) -> Result<GateReport> {
    let paths = WorkspacePaths::new(root);
    let session_id = resolve_session_id(root, session);
    let state = read_session(&paths.session_path(&session_id))?;

    // The default mode is the idle state; nothing gates it.
    if state.current_mode == DEFAULT_MODE {
        return Ok(GateReport {
            session_id,
            mode: state.current_mode,
            decision: ExitDecision::Allow,
        });
    }

    let modes = load_modes(&paths.modes_path)?;
    let resolved = modes.resolve(&state.current_mode)?;
    debug!(
        mode = %resolved.name,
        conditions = resolved.config.stop_conditions.len(),
        "evaluating stop conditions"
    );

    let mut signals = LiveSignalSource::new(paths, modes.check.clone());
    let decision = evaluate_exit(&resolved.config.stop_conditions, &mut signals)?;

    Ok(GateReport {
        session_id,
        mode: resolved.name,
        decision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StopKind;
    use crate::enter::{EnterOptions, enter_mode};
    use crate::io::layout::{InitOptions, init_workspace};
    use crate::test_support::TestRepo;
    use std::fs;

    fn enter_plan(root: &Path) {
        enter_mode(
            root,
            &EnterOptions {
                mode: "plan".to_string(),
                session_id: Some("ses-test".to_string()),
                workflow_id: None,
                spec_id: None,
            },
        )
        .expect("enter plan");
    }

    fn commit_all(repo: &TestRepo) {
        repo.commit_all("chore: session bookkeeping").expect("commit");
    }

    #[test]
    fn missing_session_is_a_state_error() {
        let repo = TestRepo::new().expect("repo");
        init_workspace(repo.root(), &InitOptions { force: false }).expect("init");
        let err = evaluate_can_exit(repo.root(), Some("ses-test")).unwrap_err();
        assert!(err.to_string().contains("session state not found"));
    }

    /// Drives the documented gate progression: pending tasks block first,
    /// then the dirty worktree, then exit is allowed.
    #[test]
    fn gate_progresses_through_conditions_in_order() {
        let repo = TestRepo::new().expect("repo");
        let paths = WorkspacePaths::new(repo.root());
        init_workspace(repo.root(), &InitOptions { force: false }).expect("init");
        enter_plan(repo.root());

        // Task state present, one task pending; worktree is dirty too.
        fs::write(
            &paths.tasks_path,
            r#"[{"id":"p0","title":"Frame","status":"pending"}]"#,
        )
        .expect("write tasks");

        let report = evaluate_can_exit(repo.root(), Some("ses-test")).expect("evaluate");
        match &report.decision {
            ExitDecision::Blocked(reason) => assert_eq!(reason.kind, StopKind::TasksComplete),
            ExitDecision::Allow => panic!("expected block"),
        }

        // Tasks complete, but the worktree still has uncommitted changes.
        fs::write(
            &paths.tasks_path,
            r#"[{"id":"p0","title":"Frame","status":"completed"}]"#,
        )
        .expect("write tasks");
        let report = evaluate_can_exit(repo.root(), Some("ses-test")).expect("evaluate");
        match &report.decision {
            ExitDecision::Blocked(reason) => assert_eq!(reason.kind, StopKind::Committed),
            ExitDecision::Allow => panic!("expected block"),
        }

        // Everything committed: exit permitted.
        commit_all(&repo);
        let report = evaluate_can_exit(repo.root(), Some("ses-test")).expect("evaluate");
        assert_eq!(report.decision, ExitDecision::Allow);
        assert_eq!(report.mode, "plan");
    }

    #[test]
    fn default_mode_always_allows_exit() {
        let repo = TestRepo::new().expect("repo");
        let paths = WorkspacePaths::new(repo.root());
        init_workspace(repo.root(), &InitOptions { force: false }).expect("init");
        crate::io::session_store::load_or_create(
            &paths.session_path("ses-test"),
            "ses-test",
            "wf-test",
        )
        .expect("create session");

        let report = evaluate_can_exit(repo.root(), Some("ses-test")).expect("evaluate");
        assert_eq!(report.decision, ExitDecision::Allow);
        assert_eq!(report.mode, DEFAULT_MODE);
    }
}
