//! Stop-condition evaluation gating session exit.
//!
//! The evaluator walks the active mode's conditions in declared order and
//! blocks on the first unmet one, so the acting agent always gets a single
//! actionable next step. Signals are probed lazily through [`SignalSource`];
//! a condition later in the order is never probed once an earlier one
//! blocks.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{CheckOutcome, EvidenceStatus, StopKind, VerificationEvidence};

/// Guidance for sessions that are genuinely blocked. Deliberately distinct
/// from the automatic per-condition messages.
pub const ESCAPE_HATCH: &str = "If this session is genuinely blocked and no stop condition can \
     be satisfied, have a human operator review the blocking reason, adjust the mode's \
     stop_conditions in .flowctl/modes.toml, and re-run `flowctl can-exit`.";

/// Live signals consumed by the evaluator.
///
/// Each method is called at most once per evaluation, and only when its
/// condition is actually reached.
pub trait SignalSource {
    /// Display names of required tasks not yet completed, or `None` when the
    /// host has recorded no task state at all.
    fn pending_tasks(&mut self) -> Result<Option<Vec<String>>>;

    /// True when the worktree has no uncommitted or untracked changes.
    fn worktree_clean(&mut self) -> Result<bool>;

    /// Commits ahead of the upstream branch, or `None` when no upstream is
    /// configured.
    fn unpushed_commits(&mut self) -> Result<Option<u64>>;

    /// The recorded verification evidence, if any.
    fn verification(&mut self) -> Result<Option<VerificationEvidence>>;

    /// Commit time of HEAD, or `None` in a repo with no commits.
    fn head_commit_time(&mut self) -> Result<Option<DateTime<Utc>>>;

    /// Run the configured check command.
    fn check_outcome(&mut self) -> Result<CheckOutcome>;

    /// Feature-test paths recorded in evidence that exist on disk.
    fn existing_feature_tests(&mut self) -> Result<Vec<String>>;
}

/// The single blocking reason surfaced to the acting agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReason {
    pub kind: StopKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

/// Outcome of evaluating a mode's stop conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ExitDecision {
    Allow,
    Blocked(BlockReason),
}

/// Evaluate `conditions` in declared order against live signals.
///
/// Duplicate kinds are evaluated once (first occurrence wins the position).
/// An empty condition list always allows exit.
pub fn evaluate_exit(
    conditions: &[StopKind],
    source: &mut dyn SignalSource,
) -> Result<ExitDecision> {
    let mut seen = HashSet::new();
    for kind in conditions {
        if !seen.insert(*kind) {
            continue;
        }
        if let Some(reason) = check_condition(*kind, source)? {
            return Ok(ExitDecision::Blocked(reason));
        }
    }
    Ok(ExitDecision::Allow)
}

// Exhaustive over StopKind with no wildcard arm: extending the vocabulary
// without extending this table is a compile error.
fn check_condition(kind: StopKind, source: &mut dyn SignalSource) -> Result<Option<BlockReason>> {
    let reason = match kind {
        StopKind::TasksComplete => match source.pending_tasks()? {
            None => Some(BlockReason {
                kind,
                message: "no task state has been recorded for this session".to_string(),
                fix: Some("seed the required todos into the task tracker and work them".to_string()),
            }),
            Some(pending) if !pending.is_empty() => Some(BlockReason {
                kind,
                message: format!(
                    "{} required task(s) not completed: {}",
                    pending.len(),
                    summarize_names(&pending)
                ),
                fix: Some("finish the remaining todos before exiting".to_string()),
            }),
            Some(_) => None,
        },
        StopKind::Committed => {
            if source.worktree_clean()? {
                None
            } else {
                Some(BlockReason {
                    kind,
                    message: "the worktree has uncommitted changes".to_string(),
                    fix: Some("git add -A && git commit".to_string()),
                })
            }
        }
        StopKind::Pushed => match source.unpushed_commits()? {
            None => Some(BlockReason {
                kind,
                message: "the current branch has no upstream".to_string(),
                fix: Some("git push -u origin HEAD".to_string()),
            }),
            Some(0) => None,
            Some(n) => Some(BlockReason {
                kind,
                message: format!("{n} commit(s) not pushed to the upstream branch"),
                fix: Some("git push".to_string()),
            }),
        },
        StopKind::Verified => check_verified(source)?,
        StopKind::TestsPass => match source.check_outcome()? {
            CheckOutcome::Pass => None,
            CheckOutcome::Fail => Some(BlockReason {
                kind,
                message: "the check command failed".to_string(),
                fix: Some("re-run the check command and fix the failures".to_string()),
            }),
            CheckOutcome::TimedOut => Some(BlockReason {
                kind,
                message: "the check command timed out".to_string(),
                fix: Some("re-run the check command; investigate hangs if it times out again".to_string()),
            }),
        },
        StopKind::FeatureTests => {
            if source.existing_feature_tests()?.is_empty() {
                Some(BlockReason {
                    kind,
                    message: "no feature tests are recorded in the verification evidence".to_string(),
                    fix: Some(
                        "write tests for the feature and record their paths in the verification evidence"
                            .to_string(),
                    ),
                })
            } else {
                None
            }
        }
    };
    Ok(reason)
}

fn check_verified(source: &mut dyn SignalSource) -> Result<Option<BlockReason>> {
    let kind = StopKind::Verified;
    let Some(evidence) = source.verification()? else {
        return Ok(Some(BlockReason {
            kind,
            message: "no verification evidence has been recorded".to_string(),
            fix: Some("verify the change end-to-end and record the evidence".to_string()),
        }));
    };
    if evidence.status != EvidenceStatus::Pass {
        return Ok(Some(BlockReason {
            kind,
            message: "the recorded verification run failed".to_string(),
            fix: Some("fix the failure and re-record passing verification evidence".to_string()),
        }));
    }
    if let Some(head_time) = source.head_commit_time()?
        && evidence.recorded_at < head_time
    {
        return Ok(Some(BlockReason {
            kind,
            message: "verification evidence is stale: it predates the latest commit".to_string(),
            fix: Some("re-verify against the current commit and re-record the evidence".to_string()),
        }));
    }
    Ok(None)
}

fn summarize_names(names: &[String]) -> String {
    const SHOWN: usize = 3;
    let mut out = names
        .iter()
        .take(SHOWN)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > SHOWN {
        out.push_str(&format!(" (+{} more)", names.len() - SHOWN));
    }
    out
}
