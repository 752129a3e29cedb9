//! Shared subphase pattern library (`.flowctl/patterns.toml`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::core::phase::{PatternLibrary, SubphasePattern};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PatternsFile {
    patterns: BTreeMap<String, SubphasePattern>,
}

/// Load the shared pattern library.
///
/// A missing file is an empty library: templates with inline patterns (or no
/// container at all) need no shared patterns.
pub fn load_patterns(path: &Path) -> Result<PatternLibrary> {
    if !path.exists() {
        return Ok(PatternLibrary::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file: PatternsFile =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    debug!(patterns = file.patterns.len(), "pattern library loaded");
    Ok(PatternLibrary::new(file.patterns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_empty_library() {
        let temp = tempfile::tempdir().expect("tempdir");
        let library = load_patterns(&temp.path().join("patterns.toml")).expect("load");
        assert_eq!(library, PatternLibrary::default());
    }

    #[test]
    fn loads_named_patterns_with_ordered_steps() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("patterns.toml");
        fs::write(
            &path,
            r#"
[[patterns.itr.steps]]
id_suffix = "impl"
title = "Implement {task_summary}"
todo = "Implement {task_summary}"
active_form = "Implementing {task_summary}"

[[patterns.itr.steps]]
id_suffix = "test"
title = "Test {task_summary}"
todo = "Test {task_summary}"
active_form = "Testing {task_summary}"
depends_on_previous = true
"#,
        )
        .expect("write");

        let library = load_patterns(&path).expect("load");
        let pattern = library.get("itr").expect("pattern present");
        let suffixes: Vec<&str> = pattern.steps.iter().map(|s| s.id_suffix.as_str()).collect();
        assert_eq!(suffixes, vec!["impl", "test"]);
        assert!(pattern.steps[1].depends_on_previous);
    }

    #[test]
    fn malformed_pattern_file_names_the_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("patterns.toml");
        fs::write(&path, "[[patterns.itr.steps]]\nid_suffix = 3\n").expect("write");
        let err = load_patterns(&path).unwrap_err();
        assert!(format!("{err:#}").contains("patterns.toml"));
    }
}
