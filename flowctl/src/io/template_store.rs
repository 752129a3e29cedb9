//! Template document loading (`.flowctl/templates/<name>.md`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::phase::PhaseDefinition;
use crate::io::frontmatter::parse_metadata;

/// Metadata block of a template document. The body is opaque prose for the
/// acting agent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemplateDoc {
    pub id: Option<String>,
    pub name: Option<String>,
    pub reviewer_prompt: Option<String>,
    pub phases: Vec<PhaseDefinition>,
}

/// A loaded template plus the path it came from (for error attribution).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTemplate {
    pub doc: TemplateDoc,
    pub path: PathBuf,
}

/// Load a template by name from the templates directory.
pub fn load_template(templates_dir: &Path, name: &str) -> Result<LoadedTemplate> {
    let path = templates_dir.join(format!("{name}.md"));
    if !path.exists() {
        return Err(anyhow!(
            "missing template '{name}' (expected {})",
            path.display()
        ));
    }
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let doc: TemplateDoc = parse_metadata(&contents, &path)?;
    Ok(LoadedTemplate { doc, path })
}
