//! Spec document lookup and parsing (`.flowctl/specs/`).
//!
//! Specs are located by numeric id via filename matching: `<id>.md` or
//! `<id>-<slug>.md`, with leading zeros tolerated (`007-parser.md` matches
//! id 7).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::core::phase::SpecPhase;
use crate::io::frontmatter::parse_metadata;

/// Metadata block of a spec document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpecDoc {
    pub phases: Vec<SpecPhase>,
    pub github_issue: Option<u64>,
    pub status: Option<String>,
}

/// Find the spec file for a numeric id.
///
/// Returns `Ok(None)` when no file matches; two matching files are an error
/// rather than a silent pick.
pub fn find_spec_file(specs_dir: &Path, id: u32) -> Result<Option<PathBuf>> {
    if !specs_dir.is_dir() {
        return Ok(None);
    }
    let pattern = Regex::new(&format!(r"^0*{id}(-[A-Za-z0-9._-]+)?\.md$"))
        .context("build spec filename pattern")?;

    let mut matches = Vec::new();
    for entry in
        fs::read_dir(specs_dir).with_context(|| format!("read dir {}", specs_dir.display()))?
    {
        let entry = entry.with_context(|| format!("read dir entry in {}", specs_dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if pattern.is_match(name) {
            matches.push(entry.path());
        }
    }
    matches.sort();

    match matches.as_slice() {
        [] => Ok(None),
        [only] => {
            debug!(id, path = %only.display(), "spec file located");
            Ok(Some(only.clone()))
        }
        many => Err(anyhow!(
            "ambiguous spec id {id}: {}",
            many.iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

/// Load and parse the spec document for a numeric id, if one exists.
pub fn load_spec(specs_dir: &Path, id: u32) -> Result<Option<SpecDoc>> {
    let Some(path) = find_spec_file(specs_dir, id)? else {
        return Ok(None);
    };
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read spec {}", path.display()))?;
    let doc: SpecDoc = parse_metadata(&contents, &path)?;
    Ok(Some(doc))
}
