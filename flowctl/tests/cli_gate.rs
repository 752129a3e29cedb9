//! CLI tests for the enter/can-exit flow.
//!
//! Spawns the flowctl binary and verifies exit codes: blocked gates exit
//! with the dedicated BLOCKED code, never the error code.

use std::fs;
use std::process::Command;

use flowctl::exit_codes;
use flowctl::io::layout::WorkspacePaths;
use flowctl::test_support::TestRepo;

fn flowctl(repo: &TestRepo, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_flowctl"))
        .current_dir(repo.root())
        .args(["--session", "ses-test"])
        .args(args)
        .output()
        .expect("run flowctl")
}

fn assert_code(output: &std::process::Output, expected: i32) {
    assert_eq!(
        output.status.code(),
        Some(expected),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn gate_blocks_then_allows_across_the_session_lifecycle() {
    let repo = TestRepo::new().expect("repo");
    let paths = WorkspacePaths::new(repo.root());

    assert_code(&flowctl(&repo, &["init"]), exit_codes::OK);

    let enter = flowctl(&repo, &["enter", "plan"]);
    assert_code(&enter, exit_codes::OK);
    let stdout = String::from_utf8_lossy(&enter.stdout);
    assert!(stdout.contains("\"mode\": \"plan\""));
    assert!(stdout.contains("Frame the problem"));

    // Pending host tasks block the gate with the BLOCKED code.
    fs::create_dir_all(&paths.state_dir).expect("mkdir state");
    fs::write(
        &paths.tasks_path,
        r#"[{"id":"p0","title":"Frame","status":"pending"}]"#,
    )
    .expect("write tasks");
    let blocked = flowctl(&repo, &["can-exit"]);
    assert_code(&blocked, exit_codes::BLOCKED);
    assert!(String::from_utf8_lossy(&blocked.stdout).contains("tasks_complete"));

    // Completed tasks but a dirty worktree: blocked on `committed`.
    fs::write(
        &paths.tasks_path,
        r#"[{"id":"p0","title":"Frame","status":"completed"}]"#,
    )
    .expect("write tasks");
    let blocked = flowctl(&repo, &["can-exit"]);
    assert_code(&blocked, exit_codes::BLOCKED);
    assert!(String::from_utf8_lossy(&blocked.stdout).contains("committed"));

    // Commit everything: the gate opens.
    repo.commit_all("chore: session bookkeeping").expect("commit");
    let allowed = flowctl(&repo, &["can-exit"]);
    assert_code(&allowed, exit_codes::OK);

    assert_code(&flowctl(&repo, &["leave"]), exit_codes::OK);
    let status = flowctl(&repo, &["status"]);
    assert_code(&status, exit_codes::OK);
    assert!(String::from_utf8_lossy(&status.stdout).contains("mode:     default"));
}

#[test]
fn can_exit_without_a_session_is_an_error_not_a_block() {
    let repo = TestRepo::new().expect("repo");
    assert_code(&flowctl(&repo, &["init"]), exit_codes::OK);
    let output = flowctl(&repo, &["can-exit"]);
    assert_code(&output, exit_codes::INVALID);
    assert!(String::from_utf8_lossy(&output.stderr).contains("session state not found"));
}

#[test]
fn validate_reports_workspace_health() {
    let repo = TestRepo::new().expect("repo");
    assert_code(&flowctl(&repo, &["init"]), exit_codes::OK);
    assert_code(&flowctl(&repo, &["validate"]), exit_codes::OK);

    let paths = WorkspacePaths::new(repo.root());
    fs::write(&paths.patterns_path, "").expect("truncate patterns");
    let output = flowctl(&repo, &["validate"]);
    assert_code(&output, exit_codes::INVALID);
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown pattern"));
}
