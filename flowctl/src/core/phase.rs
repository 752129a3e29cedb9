//! Phase, subphase-pattern, and spec-phase data types.
//!
//! These are the declarative inputs to the task factory. Template phases are
//! authored in a template document's metadata block; subphase patterns come
//! either inline or from the shared pattern library; spec phases come from a
//! separately authored specification document and are shape-checked only.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One phase within a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDefinition {
    /// Phase id: `p<N>`, `p<N>.<M>`, or `p<N>-<name>`.
    pub id: String,
    pub name: String,
    /// Marks the single phase into which spec-derived phases are spliced.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub container: bool,
    /// Present when the phase itself becomes a single native task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_config: Option<TaskConfig>,
    /// Fine-grained trackable sub-units (e.g. interview rounds).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<PhaseStep>,
    /// Expansion pattern used when this phase is the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subphase_pattern: Option<PatternRef>,
}

/// Task settings for a phase that maps to exactly one native task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Phase ids this task depends on. Must resolve within the same template.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A trackable sub-unit of a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStep {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentDelegation>,
}

/// Delegation of a step to an external review agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDelegation {
    /// Provider name, or a `${config.<key>}` reference resolved against the
    /// mode configuration's `[agents]` table.
    pub provider: String,
    /// Named prompt the delegated agent runs with.
    pub prompt: String,
    /// Context sources assembled for the delegated agent.
    #[serde(default)]
    pub context: Vec<String>,
    /// Output artifact path, when the delegated run produces one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Pass/fail gate applied to the delegated run's score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<ReviewGate>,
}

/// Numeric threshold gating progression past a delegated review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewGate {
    pub threshold: f64,
}

/// A subphase pattern: either inline steps or a name into the shared library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternRef {
    Named(String),
    Inline(SubphasePattern),
}

/// Reusable ordered step templates expanding one spec phase into tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubphasePattern {
    pub steps: Vec<PatternStep>,
}

/// One step template within a subphase pattern.
///
/// The `title`/`todo`/`active_form` strings support the closed placeholder
/// set substituted by [`crate::core::placeholders`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStep {
    pub id_suffix: String,
    pub title: String,
    pub todo: String,
    pub active_form: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Chains this step after the prior one within the same spec-phase group.
    #[serde(default)]
    pub depends_on_previous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentDelegation>,
}

/// An externally authored phase from a specification document.
///
/// Shape-checked by serde only; not subject to template phase validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecPhase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

impl SpecPhase {
    /// Display name: explicit name when present, id otherwise.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Shared pattern library resolved by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternLibrary {
    patterns: BTreeMap<String, SubphasePattern>,
}

impl PatternLibrary {
    pub fn new(patterns: BTreeMap<String, SubphasePattern>) -> Self {
        Self { patterns }
    }

    pub fn get(&self, name: &str) -> Option<&SubphasePattern> {
        self.patterns.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }
}

static PHASE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^p(\d+)").expect("phase number regex should be valid"));

/// Leading number of a phase id (`p2`, `p2.1`, and `p2-review` all yield 2).
pub fn phase_number(id: &str) -> Option<u32> {
    let caps = PHASE_NUMBER_RE.captures(id)?;
    caps.get(1)?.as_str().parse().ok()
}
