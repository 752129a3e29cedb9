//! Test-only helpers: deterministic fixtures and a scratch git repository.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::phase::{
    PatternRef, PatternStep, PhaseDefinition, SpecPhase, SubphasePattern, TaskConfig,
};
use crate::core::tasks::NativeTask;
use crate::core::types::TaskStatus;

/// Create a deterministic phase with no task config.
pub fn phase(id: &str, name: &str) -> PhaseDefinition {
    PhaseDefinition {
        id: id.to_string(),
        name: name.to_string(),
        container: false,
        task_config: None,
        steps: Vec::new(),
        subphase_pattern: None,
    }
}

/// Create a phase that becomes a single native task with the given title.
pub fn phase_with_task(id: &str, name: &str, title: &str) -> PhaseDefinition {
    let mut phase = phase(id, name);
    phase.task_config = Some(TaskConfig {
        title: title.to_string(),
        labels: Vec::new(),
        depends_on: Vec::new(),
    });
    phase
}

/// Create a container phase with the given subphase pattern reference.
pub fn container_phase(id: &str, name: &str, pattern: PatternRef) -> PhaseDefinition {
    let mut phase = phase(id, name);
    phase.container = true;
    phase.subphase_pattern = Some(pattern);
    phase
}

/// Create a deterministic pattern step for a suffix.
pub fn pattern_step(suffix: &str) -> PatternStep {
    PatternStep {
        id_suffix: suffix.to_string(),
        title: format!("{} {{task_summary}}", capitalize(suffix)),
        todo: format!("{} {{task_summary}} ({{phase_name}})", capitalize(suffix)),
        active_form: format!("{}ing {{task_summary}}", capitalize(suffix)),
        labels: vec![suffix.to_string()],
        depends_on_previous: false,
        instruction: None,
        agent: None,
    }
}

/// The canonical impl/test/review pattern with review chained after test.
pub fn review_pattern() -> SubphasePattern {
    let mut impl_step = pattern_step("impl");
    impl_step.title = "Implement {task_summary}".to_string();
    impl_step.todo = "Implement {task_summary} ({phase_name})".to_string();
    impl_step.active_form = "Implementing {task_summary}".to_string();
    let mut test_step = pattern_step("test");
    test_step.depends_on_previous = true;
    let mut review_step = pattern_step("review");
    review_step.depends_on_previous = true;
    SubphasePattern {
        steps: vec![impl_step, test_step, review_step],
    }
}

/// Create a deterministic spec phase.
pub fn spec_phase(id: &str, name: &str, tasks: &[&str]) -> SpecPhase {
    SpecPhase {
        id: id.to_string(),
        name: Some(name.to_string()),
        tasks: tasks.iter().map(|t| t.to_string()).collect(),
    }
}

/// Create a deterministic pending native task.
pub fn native_task(id: &str, title: &str) -> NativeTask {
    NativeTask {
        id: id.to_string(),
        title: title.to_string(),
        todo: title.to_string(),
        active_form: title.to_string(),
        status: TaskStatus::Pending,
        labels: Vec::new(),
        depends_on: Vec::new(),
        instruction: None,
        agent: None,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A scratch git repository with one initial commit.
pub struct TestRepo {
    temp: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let root = temp.path();

        run_git(root, &["init", "--initial-branch=main"])?;
        run_git(root, &["config", "user.email", "test@example.com"])?;
        run_git(root, &["config", "user.name", "test"])?;
        std::fs::write(root.join("README.md"), "scratch\n").context("write README")?;
        run_git(root, &["add", "README.md"])?;
        run_git(root, &["commit", "-m", "chore: init"])?;

        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Stage everything and commit; errors if nothing changed.
    pub fn commit_all(&self, message: &str) -> Result<()> {
        run_git(self.root(), &["add", "-A"])?;
        run_git(self.root(), &["commit", "-m", message])?;
        Ok(())
    }
}

fn run_git(root: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}
