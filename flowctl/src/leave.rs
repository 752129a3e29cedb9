//! Orchestration for closing the active mode.
//!
//! Exiting any mode returns the session to the implicit `default` mode; the
//! closed mode keeps its record in `modeState` and its history entry gets an
//! exit timestamp.

use std::path::Path;

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::core::types::ModeStatus;
use crate::enter::resolve_session_id;
use crate::io::layout::WorkspacePaths;
use crate::io::session_store::{DEFAULT_MODE, update_session};

/// Outcome of `flowctl leave`.
#[derive(Debug, Clone, Serialize)]
pub struct LeaveOutcome {
    pub session_id: String,
    pub mode: String,
    pub status: ModeStatus,
}

/// Close the active mode with `status` and return to the default mode.
///
/// `status` must be a terminal-or-paused status; callers map `--abandon` and
/// `--pause` onto it, defaulting to `Completed`.
pub fn leave_mode(root: &Path, session: Option<&str>, status: ModeStatus) -> Result<LeaveOutcome> {
    if status == ModeStatus::Active {
        return Err(anyhow!("cannot leave a mode into 'active' status"));
    }

    let paths = WorkspacePaths::new(root);
    let session_id = resolve_session_id(root, session);
    let session_path = paths.session_path(&session_id);

    let mut closed_mode = String::new();
    update_session(&session_path, |state| {
        closed_mode = state.current_mode.clone();
        if closed_mode == DEFAULT_MODE {
            return;
        }
        let now = Utc::now();
        if let Some(mode_state) = state.mode_state.get_mut(&closed_mode) {
            mode_state.status = status;
            mode_state.closed_at = Some(now);
        }
        if let Some(entry) = state
            .mode_history
            .iter_mut()
            .rev()
            .find(|e| e.mode == closed_mode && e.exited_at.is_none())
        {
            entry.exited_at = Some(now);
        }
        state.current_mode = DEFAULT_MODE.to_string();
        state.current_phase = None;
    })?;

    if closed_mode == DEFAULT_MODE {
        return Err(anyhow!("no active mode to leave (session is in 'default')"));
    }

    info!(session_id = %session_id, mode = %closed_mode, ?status, "mode closed");
    Ok(LeaveOutcome {
        session_id,
        mode: closed_mode,
        status,
    })
}
