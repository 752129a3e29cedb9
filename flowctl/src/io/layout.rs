//! Workspace layout and scaffolding for `.flowctl/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

/// All canonical paths within `.flowctl/` for a project root.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub flow_dir: PathBuf,
    pub modes_path: PathBuf,
    pub patterns_path: PathBuf,
    pub templates_dir: PathBuf,
    pub specs_dir: PathBuf,
    pub state_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub evidence_path: PathBuf,
    pub tasks_path: PathBuf,
    pub check_log_path: PathBuf,
    pub gitignore_path: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let flow_dir = root.join(".flowctl");
        let state_dir = flow_dir.join("state");
        Self {
            root: root.clone(),
            modes_path: flow_dir.join("modes.toml"),
            patterns_path: flow_dir.join("patterns.toml"),
            templates_dir: flow_dir.join("templates"),
            specs_dir: flow_dir.join("specs"),
            sessions_dir: flow_dir.join("sessions"),
            evidence_path: state_dir.join("verification.json"),
            tasks_path: state_dir.join("tasks.json"),
            check_log_path: state_dir.join("check.log"),
            gitignore_path: flow_dir.join(".gitignore"),
            state_dir,
            flow_dir,
        }
    }

    /// Session state document for a session id.
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }
}

/// Options for `init_workspace`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing flowctl-owned configuration files.
    pub force: bool,
}

/// Create `.flowctl/` scaffolding in `root`.
///
/// Fails if `.flowctl/` already exists unless `options.force` is set.
pub fn init_workspace(root: &Path, options: &InitOptions) -> Result<WorkspacePaths> {
    let paths = WorkspacePaths::new(root);
    if paths.flow_dir.exists() && !options.force {
        return Err(anyhow!(
            "flowctl init: .flowctl already exists (use --force to overwrite)"
        ));
    }
    if paths.flow_dir.exists() && !paths.flow_dir.is_dir() {
        return Err(anyhow!(
            "flowctl init: .flowctl exists but is not a directory"
        ));
    }

    create_dir(&paths.flow_dir)?;
    create_dir(&paths.templates_dir)?;
    create_dir(&paths.specs_dir)?;
    create_dir(&paths.state_dir)?;
    create_dir(&paths.sessions_dir)?;

    write_file(&paths.modes_path, DEFAULT_MODES)?;
    write_file(&paths.patterns_path, DEFAULT_PATTERNS)?;
    write_file(&paths.templates_dir.join("plan.md"), PLAN_TEMPLATE)?;
    write_file(&paths.templates_dir.join("implement.md"), IMPLEMENT_TEMPLATE)?;
    write_file(&paths.templates_dir.join("debug.md"), DEBUG_TEMPLATE)?;
    write_file(&paths.gitignore_path, FLOW_GITIGNORE)?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const FLOW_GITIGNORE: &str = "state/\n";

const DEFAULT_MODES: &str = r#"# Workflow modes for this project. One table per mode.

[check]
command = ["just", "ci"]
timeout_secs = 1800

[agents]
reviewer = "claude"

[modes.plan]
template = "plan"
stop_conditions = ["tasks_complete", "committed"]
aliases = ["planning"]

[modes.implement]
template = "implement"
stop_conditions = ["tasks_complete", "tests_pass", "committed", "pushed"]
issue_handling = "required"
aliases = ["impl", "build"]

[modes.debug]
template = "debug"
stop_conditions = ["verified", "committed"]

[modes.bugfix]
deprecated = true
redirect_to = "debug"
template = "debug"
"#;

const DEFAULT_PATTERNS: &str = r#"# Shared subphase patterns referenced by template container phases.

[[patterns.build-test-review.steps]]
id_suffix = "impl"
title = "Implement {task_summary}"
todo = "Implement {task_summary} ({phase_name})"
active_form = "Implementing {task_summary}"
labels = ["impl"]

[[patterns.build-test-review.steps]]
id_suffix = "test"
title = "Test {task_summary}"
todo = "Write and run tests for {task_summary} ({phase_name})"
active_form = "Testing {task_summary}"
labels = ["test"]
depends_on_previous = true

[[patterns.build-test-review.steps]]
id_suffix = "review"
title = "Review {phase_name}"
todo = "Request review of {phase_label} and address findings"
active_form = "Reviewing {phase_name}"
labels = ["review"]
depends_on_previous = true

[patterns.build-test-review.steps.agent]
provider = "${config.reviewer}"
prompt = "review-implementation"
context = ["diff", "todo"]

[patterns.build-test-review.steps.agent.gate]
threshold = 0.8
"#;

const PLAN_TEMPLATE: &str = r#"+++
id = "plan"
name = "Planning"

[[phases]]
id = "p0"
name = "Frame"

[phases.task_config]
title = "Frame the problem and constraints"
labels = ["plan"]

[[phases]]
id = "p1"
name = "Draft"

[phases.task_config]
title = "Draft the phased plan"
labels = ["plan"]
depends_on = ["p0"]
+++

# Planning mode

Interview the operator, frame the problem, and produce a phased plan the
implementation mode can expand.
"#;

const IMPLEMENT_TEMPLATE: &str = r#"+++
id = "implement"
name = "Implementation"
reviewer_prompt = "review-implementation"

[[phases]]
id = "p0"
name = "Prepare"

[phases.task_config]
title = "Prepare working branch and context"
labels = ["orchestration"]

[[phases]]
id = "p1"
name = "Build"
container = true
subphase_pattern = "build-test-review"

[[phases]]
id = "p2"
name = "Finalize"

[phases.task_config]
title = "Final review and cleanup"
labels = ["orchestration"]
+++

# Implementation mode

Work the generated subphase tasks in order. Each spec phase expands into
implement, test, and review steps.
"#;

const DEBUG_TEMPLATE: &str = r#"+++
id = "debug"
name = "Debugging"

[[phases]]
id = "p0"
name = "Reproduce"

[phases.task_config]
title = "Reproduce the failure"
labels = ["debug"]

[[phases]]
id = "p1"
name = "Fix"

[phases.task_config]
title = "Isolate and fix the root cause"
labels = ["debug"]
depends_on = ["p0"]

[[phases]]
id = "p2"
name = "Verify"

[phases.task_config]
title = "Verify the fix end-to-end"
labels = ["debug"]
depends_on = ["p1"]
+++

# Debugging mode

Reproduce first. Do not touch the fix phase until the failure is reproduced
deterministically.
"#;
