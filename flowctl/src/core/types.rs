//! Shared deterministic types for workflow core logic.
//!
//! These types define stable contracts between core components and with the
//! host that consumes session documents. They must remain deterministic and
//! free of I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed vocabulary of stop-condition kinds gating session exit.
///
/// Adding a kind requires extending the evaluator's check table in
/// [`crate::core::gate`]; the match there is exhaustive, so the compiler
/// keeps both in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    TasksComplete,
    Committed,
    Pushed,
    Verified,
    TestsPass,
    FeatureTests,
}

impl StopKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StopKind::TasksComplete => "tasks_complete",
            StopKind::Committed => "committed",
            StopKind::Pushed => "pushed",
            StopKind::Verified => "verified",
            StopKind::TestsPass => "tests_pass",
            StopKind::FeatureTests => "feature_tests",
        }
    }
}

/// Status of a native task handed to the host's task tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

/// Per-mode lifecycle status recorded in session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeStatus {
    Active,
    Completed,
    Abandoned,
    Paused,
}

/// Whether a mode requires an external issue to be linked before it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueHandling {
    Required,
    #[default]
    None,
}

/// Outcome of the bounded check-command run backing `tests_pass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Pass,
    Fail,
    TimedOut,
}

/// Result recorded by a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStatus {
    Pass,
    Fail,
}

/// Verification evidence document written by the verifying agent
/// (`.flowctl/state/verification.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationEvidence {
    pub status: EvidenceStatus,
    #[serde(rename = "recordedAt")]
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "featureTests", default)]
    pub feature_tests: Vec<String>,
}

/// One entry of the host tracker's task state (`.flowctl/state/tasks.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostTask {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: TaskStatus,
}

impl HostTask {
    /// Display name for block messages: title when present, id otherwise.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_kind_serializes_to_snake_case() {
        let json = serde_json::to_string(&StopKind::TasksComplete).expect("serialize");
        assert_eq!(json, "\"tasks_complete\"");
        let kind: StopKind = serde_json::from_str("\"feature_tests\"").expect("parse");
        assert_eq!(kind, StopKind::FeatureTests);
    }

    #[test]
    fn unknown_stop_kind_is_rejected() {
        let err = serde_json::from_str::<StopKind>("\"linted\"").unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn task_status_wire_format_is_stable() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).expect("serialize"),
            "\"in_progress\""
        );
    }
}
