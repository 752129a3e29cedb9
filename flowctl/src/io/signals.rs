//! Live signal collection for the exit gate.
//!
//! Implements [`SignalSource`] against the real project: the host task state
//! file, the git repository, the verification evidence document, and the
//! configured check command (run bounded, with its output logged).

use std::fs;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::gate::SignalSource;
use crate::core::types::{CheckOutcome, TaskStatus, VerificationEvidence};
use crate::io::evidence::{read_evidence, read_host_tasks};
use crate::io::git::Git;
use crate::io::layout::WorkspacePaths;
use crate::io::modes::CheckConfig;

const CHECK_OUTPUT_LIMIT_BYTES: usize = 100_000;

/// Signal source backed by the project on disk.
pub struct LiveSignalSource {
    paths: WorkspacePaths,
    git: Git,
    check: CheckConfig,
}

impl LiveSignalSource {
    pub fn new(paths: WorkspacePaths, check: CheckConfig) -> Self {
        let git = Git::new(paths.root.clone());
        Self { paths, git, check }
    }
}

impl SignalSource for LiveSignalSource {
    fn pending_tasks(&mut self) -> Result<Option<Vec<String>>> {
        let Some(tasks) = read_host_tasks(&self.paths.tasks_path)? else {
            return Ok(None);
        };
        let pending: Vec<String> = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .map(|t| t.display_name().to_string())
            .collect();
        Ok(Some(pending))
    }

    fn worktree_clean(&mut self) -> Result<bool> {
        self.git.is_clean()
    }

    fn unpushed_commits(&mut self) -> Result<Option<u64>> {
        self.git.unpushed_commits()
    }

    fn verification(&mut self) -> Result<Option<VerificationEvidence>> {
        read_evidence(&self.paths.evidence_path)
    }

    fn head_commit_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.git.head_commit_time()
    }

    fn check_outcome(&mut self) -> Result<CheckOutcome> {
        run_check_command(
            &self.check,
            &self.paths.root,
            &self.paths.check_log_path,
            CHECK_OUTPUT_LIMIT_BYTES,
        )
    }

    fn existing_feature_tests(&mut self) -> Result<Vec<String>> {
        let Some(evidence) = read_evidence(&self.paths.evidence_path)? else {
            return Ok(Vec::new());
        };
        Ok(evidence
            .feature_tests
            .iter()
            .filter(|rel| self.paths.root.join(rel).exists())
            .cloned()
            .collect())
    }
}

/// Run the configured check command with a timeout, logging output.
#[instrument(skip_all, fields(command = %check.command.join(" ")))]
fn run_check_command(
    check: &CheckConfig,
    workdir: &std::path::Path,
    log_path: &std::path::Path,
    output_limit_bytes: usize,
) -> Result<CheckOutcome> {
    let program = check
        .command
        .first()
        .ok_or_else(|| anyhow!("check command is empty"))?;

    let mut child = Command::new(program)
        .args(&check.command[1..])
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn check command '{program}'"))?;

    let timeout = Duration::from_secs(check.timeout_secs);
    let status = match child.wait_timeout(timeout).context("wait for check command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = check.timeout_secs, "check command timed out, killing");
            child.kill().context("kill check command")?;
            child.wait().context("wait check command after kill")?;
            write_check_log(log_path, b"", b"check command timed out", output_limit_bytes)?;
            return Ok(CheckOutcome::TimedOut);
        }
    };

    let output = child.wait_with_output().context("collect check output")?;
    write_check_log(log_path, &output.stdout, &output.stderr, output_limit_bytes)?;

    debug!(exit_code = ?status.code(), "check command finished");
    if status.success() {
        Ok(CheckOutcome::Pass)
    } else {
        Ok(CheckOutcome::Fail)
    }
}

fn write_check_log(
    path: &std::path::Path,
    stdout: &[u8],
    stderr: &[u8],
    output_limit: usize,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create check log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(stdout));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(stderr));

    if buf.len() > output_limit {
        let truncated = format!(
            "{}\n[truncated {} bytes]\n",
            &buf[..output_limit],
            buf.len() - output_limit
        );
        fs::write(path, truncated).with_context(|| format!("write check log {}", path.display()))?;
        return Ok(());
    }

    fs::write(path, buf).with_context(|| format!("write check log {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gate::{ExitDecision, evaluate_exit};
    use crate::core::types::StopKind;
    use crate::test_support::TestRepo;
    use std::fs;

    fn workspace(repo: &TestRepo) -> WorkspacePaths {
        WorkspacePaths::new(repo.root())
    }

    fn true_check() -> CheckConfig {
        CheckConfig {
            command: vec!["true".to_string()],
            timeout_secs: 30,
        }
    }

    #[test]
    fn pending_tasks_reflect_host_task_state() {
        let repo = TestRepo::new().expect("repo");
        let paths = workspace(&repo);
        fs::create_dir_all(&paths.state_dir).expect("mkdir");
        fs::write(
            &paths.tasks_path,
            r#"[{"id":"p0","title":"Prepare","status":"completed"},
                {"id":"p1","title":"Build","status":"pending"}]"#,
        )
        .expect("write tasks");

        let mut source = LiveSignalSource::new(paths, true_check());
        let pending = source.pending_tasks().expect("pending").expect("some");
        assert_eq!(pending, vec!["Build".to_string()]);
    }

    #[test]
    fn check_command_outcomes_map_to_exit_status() {
        let repo = TestRepo::new().expect("repo");
        let paths = workspace(&repo);

        let mut passing = LiveSignalSource::new(paths.clone(), true_check());
        assert_eq!(passing.check_outcome().expect("check"), CheckOutcome::Pass);

        let mut failing = LiveSignalSource::new(
            paths.clone(),
            CheckConfig {
                command: vec!["false".to_string()],
                timeout_secs: 30,
            },
        );
        assert_eq!(failing.check_outcome().expect("check"), CheckOutcome::Fail);
        assert!(paths.check_log_path.exists());
    }

    #[test]
    fn feature_tests_filter_to_existing_paths() {
        let repo = TestRepo::new().expect("repo");
        let paths = workspace(&repo);
        fs::create_dir_all(&paths.state_dir).expect("mkdir");
        fs::create_dir_all(repo.root().join("tests")).expect("mkdir tests");
        fs::write(repo.root().join("tests/parser.rs"), "#[test] fn t() {}\n").expect("write");
        fs::write(
            &paths.evidence_path,
            r#"{"status":"pass","recordedAt":"2026-08-01T10:00:00Z",
                "featureTests":["tests/parser.rs","tests/ghost.rs"]}"#,
        )
        .expect("write evidence");

        let mut source = LiveSignalSource::new(paths, true_check());
        let existing = source.existing_feature_tests().expect("feature tests");
        assert_eq!(existing, vec!["tests/parser.rs".to_string()]);
    }

    /// End-to-end against a real repo: committed passes on a clean tree and
    /// blocks after a stray file appears.
    #[test]
    fn committed_condition_tracks_worktree_state() {
        let repo = TestRepo::new().expect("repo");
        let paths = workspace(&repo);

        let mut source = LiveSignalSource::new(paths.clone(), true_check());
        assert_eq!(
            evaluate_exit(&[StopKind::Committed], &mut source).expect("evaluate"),
            ExitDecision::Allow
        );

        fs::write(repo.root().join("scratch.txt"), "wip\n").expect("write");
        let mut source = LiveSignalSource::new(paths, true_check());
        match evaluate_exit(&[StopKind::Committed], &mut source).expect("evaluate") {
            ExitDecision::Blocked(reason) => assert_eq!(reason.kind, StopKind::Committed),
            ExitDecision::Allow => panic!("expected block"),
        }
    }
}
