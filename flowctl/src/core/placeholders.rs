//! Whitelisted placeholder substitution for pattern step templates.
//!
//! The placeholder set is closed: `{task_summary}`, `{phase_name}`, and
//! `{phase_label}`. Anything else in the template text is left verbatim.
//! This is intentionally not a template language.

/// Values substituted into a pattern step's title/todo/active-form templates.
#[derive(Debug, Clone, Copy)]
pub struct Substitutions<'a> {
    pub task_summary: &'a str,
    pub phase_name: &'a str,
    pub phase_label: &'a str,
}

/// Replace every occurrence of the whitelisted placeholders.
pub fn substitute(template: &str, subs: &Substitutions<'_>) -> String {
    template
        .replace("{task_summary}", subs.task_summary)
        .replace("{phase_name}", subs.phase_name)
        .replace("{phase_label}", subs.phase_label)
}
