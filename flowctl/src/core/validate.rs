//! Structural and semantic validation of template phases.
//!
//! Validation never throws for data errors: violations are collected into a
//! list so an author can fix every issue in one pass. Call sites that want
//! failure use [`validate_phases_or_bail`].

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

use crate::core::phase::{PatternRef, PhaseDefinition, SubphasePattern};

/// Grammar for phase ids: `p<N>`, `p<N>.<M>`, or `p<N>-<name>`.
static PHASE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^p\d+(\.\d+|-[a-z0-9][a-z0-9-]*)?$").expect("phase id regex should be valid")
});

/// One validation violation, addressable by the author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Id of the offending phase, when the violation is phase-scoped.
    pub phase_id: Option<String>,
    /// Offending field within the phase.
    pub field: Option<String>,
    pub message: String,
    /// Document the phase list came from, when known.
    pub source: Option<PathBuf>,
}

impl ValidationError {
    fn new(phase_id: Option<&str>, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            phase_id: phase_id.map(str::to_string),
            field: field.map(str::to_string),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: &Path) -> Self {
        self.source = Some(source.to_path_buf());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{}: ", source.display())?;
        }
        match (&self.phase_id, &self.field) {
            (Some(id), Some(field)) => write!(f, "phase '{id}' field '{field}': "),
            (Some(id), None) => write!(f, "phase '{id}': "),
            (None, Some(field)) => write!(f, "field '{field}': "),
            (None, None) => Ok(()),
        }?;
        write!(f, "{}", self.message)
    }
}

/// Validate a template's phase list, returning the normalized list or every
/// violation found.
///
/// Structural checks run per phase (id grammar, non-empty names, well-formed
/// pattern steps); semantic checks run across the list (duplicate ids,
/// dangling `depends_on` references, at most one container).
pub fn validate_phases(
    phases: Vec<PhaseDefinition>,
) -> Result<Vec<PhaseDefinition>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let normalized: Vec<PhaseDefinition> = phases.into_iter().map(normalize_phase).collect();

    for phase in &normalized {
        validate_structure(phase, &mut errors);
    }

    let mut seen = HashSet::new();
    for phase in &normalized {
        if !seen.insert(phase.id.clone()) {
            errors.push(ValidationError::new(
                Some(phase.id.as_str()),
                Some("id"),
                format!("duplicate phase id '{}'", phase.id),
            ));
        }
    }

    let known_ids: HashSet<&str> = normalized.iter().map(|p| p.id.as_str()).collect();
    for phase in &normalized {
        if let Some(task_config) = &phase.task_config {
            for dep in &task_config.depends_on {
                if !known_ids.contains(dep.as_str()) {
                    errors.push(ValidationError::new(
                        Some(phase.id.as_str()),
                        Some("depends_on"),
                        format!("depends_on references unknown phase '{dep}'"),
                    ));
                }
            }
        }
    }

    let containers: Vec<&PhaseDefinition> = normalized.iter().filter(|p| p.container).collect();
    if containers.len() > 1 {
        for extra in &containers[1..] {
            errors.push(ValidationError::new(
                Some(extra.id.as_str()),
                Some("container"),
                format!(
                    "more than one container phase (first is '{}')",
                    containers[0].id
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(normalized)
    } else {
        Err(errors)
    }
}

fn normalize_phase(mut phase: PhaseDefinition) -> PhaseDefinition {
    phase.id = phase.id.trim().to_string();
    phase.name = phase.name.trim().to_string();
    phase
}

fn validate_structure(phase: &PhaseDefinition, errors: &mut Vec<ValidationError>) {
    if !PHASE_ID_RE.is_match(&phase.id) {
        errors.push(ValidationError::new(
            Some(phase.id.as_str()),
            Some("id"),
            format!(
                "id '{}' does not match p<N>, p<N>.<M>, or p<N>-<name>",
                phase.id
            ),
        ));
    }

    if phase.name.is_empty() {
        errors.push(ValidationError::new(
            Some(phase.id.as_str()),
            Some("name"),
            "name must not be empty",
        ));
    }

    if let Some(task_config) = &phase.task_config
        && task_config.title.trim().is_empty()
    {
        errors.push(ValidationError::new(
            Some(phase.id.as_str()),
            Some("task_config.title"),
            "task title must not be empty",
        ));
    }

    // Generated subphase ids are `p<C>.<i>:<suffix>`, so the container id
    // itself must be a plain numeric phase id.
    if phase.container && !is_plain_numeric_id(&phase.id) {
        errors.push(ValidationError::new(
            Some(phase.id.as_str()),
            Some("container"),
            format!("container phase id must be plain p<N> (got '{}')", phase.id),
        ));
    }

    if let Some(PatternRef::Inline(pattern)) = &phase.subphase_pattern {
        validate_inline_pattern(&phase.id, pattern, errors);
    }

    for step in &phase.steps {
        if step.id.trim().is_empty() {
            errors.push(ValidationError::new(
                Some(phase.id.as_str()),
                Some("steps.id"),
                "step id must not be empty",
            ));
        }
    }
}

fn is_plain_numeric_id(id: &str) -> bool {
    id.strip_prefix('p')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

fn validate_inline_pattern(
    phase_id: &str,
    pattern: &SubphasePattern,
    errors: &mut Vec<ValidationError>,
) {
    if pattern.steps.is_empty() {
        errors.push(ValidationError::new(
            Some(phase_id),
            Some("subphase_pattern"),
            "inline subphase pattern has no steps",
        ));
    }
    let mut suffixes = HashSet::new();
    for step in &pattern.steps {
        if step.id_suffix.trim().is_empty() {
            errors.push(ValidationError::new(
                Some(phase_id),
                Some("subphase_pattern.id_suffix"),
                "pattern step id_suffix must not be empty",
            ));
        } else if !suffixes.insert(step.id_suffix.clone()) {
            errors.push(ValidationError::new(
                Some(phase_id),
                Some("subphase_pattern.id_suffix"),
                format!("duplicate pattern step id_suffix '{}'", step.id_suffix),
            ));
        }
    }
}

/// Format violations for human display, one per line.
pub fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|err| format!("- {err}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raising wrapper for call sites that treat invalid phases as failure.
pub fn validate_phases_or_bail(
    phases: Vec<PhaseDefinition>,
    source: &Path,
) -> Result<Vec<PhaseDefinition>> {
    validate_phases(phases).map_err(|errors| {
        let errors: Vec<ValidationError> = errors
            .into_iter()
            .map(|err| err.with_source(source))
            .collect();
        anyhow!("invalid template phases:\n{}", format_errors(&errors))
    })
}
