//! Native task synthesis from template phases and spec phases.
//!
//! This is the expansion core: a validated phase list plus an optional list
//! of spec-authored phases becomes a flat, ordered, dependency-annotated
//! task list. Pure and deterministic: the same inputs always produce the
//! same tasks, so repeated generation is idempotent.

use serde::{Deserialize, Serialize};

use crate::core::phase::{
    AgentDelegation, PatternLibrary, PatternRef, PhaseDefinition, SpecPhase, SubphasePattern,
    TaskConfig, phase_number,
};
use crate::core::placeholders::{Substitutions, substitute};
use crate::core::types::TaskStatus;

/// The unit handed to the host's task tracker.
///
/// Generated ids are `p<N>` for simple phase tasks and
/// `p<container>.<specPhaseIndex>:<suffix>` for subphase tasks. This format
/// is a durable contract; tests lock it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeTask {
    pub id: String,
    pub title: String,
    pub todo: String,
    pub active_form: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentDelegation>,
}

/// Build the native task list for a template, optionally expanded with spec
/// phases through the container phase's subphase pattern.
///
/// Fails fast (before producing any task) when the container's pattern is
/// missing or a named pattern does not resolve.
pub fn build_tasks(
    phases: &[PhaseDefinition],
    spec_phases: &[SpecPhase],
    patterns: &PatternLibrary,
) -> Result<Vec<NativeTask>, String> {
    let container = phases.iter().find(|p| p.container);

    let (container, pattern) = match container {
        Some(container) if !spec_phases.is_empty() => {
            let pattern = resolve_pattern(container, patterns)?;
            (container, pattern)
        }
        // No container, or nothing to splice into it: the template stands
        // alone and every task-bearing phase becomes one task.
        _ => return Ok(simple_tasks(phases)),
    };

    let container_number = phase_number(&container.id)
        .ok_or_else(|| format!("container phase id '{}' is not numeric", container.id))?;

    let mut tasks = Vec::new();
    for phase in before_container(phases, container_number) {
        push_simple_task(&mut tasks, phase);
    }

    for (index, spec_phase) in spec_phases.iter().enumerate() {
        expand_spec_phase(&mut tasks, container_number, index + 1, spec_phase, pattern);
    }

    for phase in after_container(phases, container_number) {
        push_simple_task(&mut tasks, phase);
    }

    Ok(tasks)
}

fn resolve_pattern<'a>(
    container: &'a PhaseDefinition,
    patterns: &'a PatternLibrary,
) -> Result<&'a SubphasePattern, String> {
    match &container.subphase_pattern {
        Some(PatternRef::Inline(pattern)) => Ok(pattern),
        Some(PatternRef::Named(name)) => patterns.get(name).ok_or_else(|| {
            let known: Vec<&str> = patterns.names().collect();
            format!(
                "unknown subphase pattern '{name}' on container phase '{}' (known: {})",
                container.id,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )
        }),
        None => Err(format!(
            "container phase '{}' has no subphase_pattern",
            container.id
        )),
    }
}

fn simple_tasks(phases: &[PhaseDefinition]) -> Vec<NativeTask> {
    let mut tasks = Vec::new();
    for phase in phases {
        push_simple_task(&mut tasks, phase);
    }
    tasks
}

fn push_simple_task(tasks: &mut Vec<NativeTask>, phase: &PhaseDefinition) {
    let Some(task_config) = &phase.task_config else {
        return;
    };
    tasks.push(simple_task(&phase.id, task_config));
}

fn simple_task(phase_id: &str, task_config: &TaskConfig) -> NativeTask {
    NativeTask {
        id: phase_id.to_string(),
        title: task_config.title.clone(),
        todo: task_config.title.clone(),
        active_form: task_config.title.clone(),
        status: TaskStatus::Pending,
        labels: task_config.labels.clone(),
        depends_on: task_config.depends_on.clone(),
        instruction: None,
        agent: None,
    }
}

fn before_container<'a>(
    phases: &'a [PhaseDefinition],
    container_number: u32,
) -> impl Iterator<Item = &'a PhaseDefinition> {
    phases
        .iter()
        .filter(move |p| !p.container && phase_number(&p.id).is_some_and(|n| n < container_number))
}

fn after_container<'a>(
    phases: &'a [PhaseDefinition],
    container_number: u32,
) -> impl Iterator<Item = &'a PhaseDefinition> {
    phases
        .iter()
        .filter(move |p| !p.container && phase_number(&p.id).is_some_and(|n| n > container_number))
}

fn expand_spec_phase(
    tasks: &mut Vec<NativeTask>,
    container_number: u32,
    spec_index: usize,
    spec_phase: &SpecPhase,
    pattern: &SubphasePattern,
) {
    let label = format!("p{container_number}.{spec_index}");
    let summary = task_summary(spec_phase);
    let subs = Substitutions {
        task_summary: &summary,
        phase_name: spec_phase.display_name(),
        phase_label: &label,
    };

    let mut previous: Option<String> = None;
    for step in &pattern.steps {
        let id = format!("{label}:{}", step.id_suffix);
        let depends_on = if step.depends_on_previous {
            previous.iter().cloned().collect()
        } else {
            Vec::new()
        };
        tasks.push(NativeTask {
            id: id.clone(),
            title: substitute(&step.title, &subs),
            todo: substitute(&step.todo, &subs),
            active_form: substitute(&step.active_form, &subs),
            status: TaskStatus::Pending,
            labels: step.labels.clone(),
            depends_on,
            instruction: step.instruction.clone(),
            agent: step.agent.clone(),
        });
        previous = Some(id);
    }
}

/// Summary of a spec phase's work for placeholder substitution: the single
/// task verbatim, or "first + N more" when there are several.
fn task_summary(spec_phase: &SpecPhase) -> String {
    match spec_phase.tasks.as_slice() {
        [] => spec_phase.display_name().to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{first} + {} more", rest.len()),
    }
}
