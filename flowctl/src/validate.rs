//! Workspace validation: mode config, templates, and pattern references.
//!
//! Collects violations across every configured template so an author can fix
//! them in one pass, mirroring the validator's collect-not-fail-fast
//! contract.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;

use crate::core::phase::PatternRef;
use crate::core::validate::{ValidationError, validate_phases};
use crate::io::layout::WorkspacePaths;
use crate::io::modes::load_modes;
use crate::io::patterns::load_patterns;
use crate::io::template_store::load_template;

/// Result of validating the `.flowctl/` workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidateReport {
    /// Template names that were checked.
    pub checked: Vec<String>,
    pub errors: Vec<ValidationError>,
}

impl ValidateReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate mode configuration, every referenced template, and the pattern
/// references of container phases.
///
/// Configuration-load failures (missing modes.toml, unreadable template)
/// remain hard errors; data-level violations are collected in the report.
pub fn validate_workspace(root: &Path) -> Result<ValidateReport> {
    let paths = WorkspacePaths::new(root);
    let modes = load_modes(&paths.modes_path)?;
    let patterns = load_patterns(&paths.patterns_path)?;

    let template_names: BTreeSet<String> = modes
        .modes
        .values()
        .map(|config| config.template.clone())
        .collect();

    let mut checked = Vec::new();
    let mut errors = Vec::new();
    for name in template_names {
        let template = load_template(&paths.templates_dir, &name)?;
        checked.push(name);

        let phases = match validate_phases(template.doc.phases) {
            Ok(phases) => phases,
            Err(template_errors) => {
                errors.extend(
                    template_errors
                        .into_iter()
                        .map(|err| err.with_source(&template.path)),
                );
                continue;
            }
        };

        for phase in phases.iter().filter(|p| p.container) {
            if let Some(PatternRef::Named(pattern_name)) = &phase.subphase_pattern
                && patterns.get(pattern_name).is_none()
            {
                errors.push(
                    ValidationError {
                        phase_id: Some(phase.id.clone()),
                        field: Some("subphase_pattern".to_string()),
                        message: format!("references unknown pattern '{pattern_name}'"),
                        source: None,
                    }
                    .with_source(&template.path),
                );
            }
        }
    }

    Ok(ValidateReport { checked, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::layout::{InitOptions, init_workspace};
    use std::fs;

    #[test]
    fn default_workspace_validates_cleanly() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_workspace(temp.path(), &InitOptions { force: false }).expect("init");
        let report = validate_workspace(temp.path()).expect("validate");
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
        assert!(report.checked.contains(&"plan".to_string()));
        assert!(report.checked.contains(&"implement".to_string()));
    }

    #[test]
    fn collects_template_violations_with_source_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_workspace(temp.path(), &InitOptions { force: false }).expect("init");
        fs::write(
            paths.templates_dir.join("plan.md"),
            "+++\n[[phases]]\nid = \"bogus id\"\nname = \"\"\n+++\n\nprose\n",
        )
        .expect("write");

        let report = validate_workspace(temp.path()).expect("validate");
        assert!(!report.is_valid());
        assert!(
            report
                .errors
                .iter()
                .all(|e| e.source.as_ref().is_some_and(|s| s.ends_with("plan.md")))
        );
    }

    #[test]
    fn dangling_pattern_reference_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_workspace(temp.path(), &InitOptions { force: false }).expect("init");
        fs::write(paths.patterns_path, "").expect("truncate patterns");

        let report = validate_workspace(temp.path()).expect("validate");
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.message.contains("unknown pattern 'build-test-review'"))
        );
    }

    #[test]
    fn missing_modes_file_is_a_hard_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = validate_workspace(temp.path()).unwrap_err();
        assert!(err.to_string().contains("flowctl init"));
    }
}
