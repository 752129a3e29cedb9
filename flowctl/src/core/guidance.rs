//! Required-todos projection for seeding the host's task tracker.
//!
//! Pure: no I/O. Decouples "what tasks exist" from how they are presented to
//! the acting agent.

use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};

use crate::core::tasks::NativeTask;
use crate::core::types::{IssueHandling, TaskStatus};

const GUIDANCE_TEMPLATE: &str = include_str!("guidance.md");

/// One entry of the required-todos checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub active_form: String,
    pub status: TaskStatus,
}

/// The checklist plus the mode's instructional text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredTodos {
    pub items: Vec<TodoItem>,
    pub instructions: String,
}

/// Project generated tasks (or, for modes that generate none, the template's
/// bare phase titles) into the required-todos view.
pub fn build_guidance(
    mode: &str,
    issue_handling: IssueHandling,
    tasks: &[NativeTask],
    phase_titles: &[String],
) -> RequiredTodos {
    let items: Vec<TodoItem> = if tasks.is_empty() {
        phase_titles
            .iter()
            .map(|title| TodoItem {
                content: title.clone(),
                active_form: title.clone(),
                status: TaskStatus::Pending,
            })
            .collect()
    } else {
        tasks
            .iter()
            .map(|task| TodoItem {
                content: task.todo.clone(),
                active_form: task.active_form.clone(),
                status: TaskStatus::Pending,
            })
            .collect()
    };

    let instructions = render_instructions(mode, issue_handling, items.len());
    RequiredTodos {
        items,
        instructions,
    }
}

fn render_instructions(mode: &str, issue_handling: IssueHandling, todo_count: usize) -> String {
    let mut env = Environment::new();
    env.add_template("guidance", GUIDANCE_TEMPLATE)
        .expect("guidance template should be valid");
    let template = env
        .get_template("guidance")
        .expect("guidance template registered above");
    template
        .render(context! {
            mode => mode,
            todo_count => todo_count,
            issue_required => issue_handling == IssueHandling::Required,
        })
        .expect("guidance template rendering should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::native_task;

    #[test]
    fn todos_mirror_generated_tasks_in_order() {
        let tasks = vec![native_task("p0", "Setup"), native_task("p1", "Build")];
        let todos = build_guidance("implement", IssueHandling::None, &tasks, &[]);
        let contents: Vec<&str> = todos.items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(contents, vec!["Setup", "Build"]);
        assert!(todos.items.iter().all(|i| i.status == TaskStatus::Pending));
    }

    #[test]
    fn falls_back_to_phase_titles_when_no_tasks_generated() {
        let titles = vec!["Interview".to_string(), "Summarize".to_string()];
        let todos = build_guidance("intake", IssueHandling::None, &[], &titles);
        assert_eq!(todos.items.len(), 2);
        assert_eq!(todos.items[0].content, "Interview");
    }

    #[test]
    fn instructions_mention_mode_and_gate() {
        let todos = build_guidance("plan", IssueHandling::None, &[native_task("p0", "T")], &[]);
        assert!(todos.instructions.contains("plan"));
        assert!(todos.instructions.contains("flowctl can-exit"));
    }

    #[test]
    fn issue_note_appears_only_when_required() {
        let tasks = vec![native_task("p0", "T")];
        let with = build_guidance("implement", IssueHandling::Required, &tasks, &[]);
        assert!(with.instructions.contains("linked issue"));
        let without = build_guidance("implement", IssueHandling::None, &tasks, &[]);
        assert!(!without.instructions.contains("linked issue"));
    }
}
