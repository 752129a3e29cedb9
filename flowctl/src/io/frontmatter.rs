//! Metadata block handling for template and spec documents.
//!
//! Documents carry a leading TOML block fenced by `+++` marker lines; the
//! remainder of the file is opaque prose consumed by the acting agent, not
//! by this tool.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;

/// Fence line delimiting the metadata block.
pub const MARKER: &str = "+++";

/// Split a document into (metadata block, body). Returns `None` when the
/// document does not start with a fenced block.
pub fn split_metadata(contents: &str) -> Option<(&str, &str)> {
    let after = contents.strip_prefix("+++\n")?;
    let end = after.find("\n+++\n")?;
    let block = &after[..end];
    let rest = &after[end + 5..];
    Some((block, rest))
}

/// Parse the metadata block of `contents` into `T`.
///
/// `path` is used for error context only.
pub fn parse_metadata<T: DeserializeOwned>(contents: &str, path: &Path) -> Result<T> {
    let (block, _) = split_metadata(contents).ok_or_else(|| {
        anyhow!(
            "missing metadata block in {} (expected a leading section fenced by '{MARKER}' lines)",
            path.display()
        )
    })?;
    toml::from_str(block).with_context(|| format!("parse metadata block of {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Meta {
        id: String,
    }

    #[test]
    fn splits_block_and_body() {
        let doc = "+++\nid = \"plan\"\n+++\n\n# Prose\n";
        let (block, body) = split_metadata(doc).expect("split");
        assert_eq!(block, "id = \"plan\"");
        assert_eq!(body, "\n# Prose\n");
    }

    #[test]
    fn returns_none_without_leading_fence() {
        assert!(split_metadata("# Prose only\n").is_none());
        assert!(split_metadata("\n+++\nid = \"x\"\n+++\n").is_none());
    }

    #[test]
    fn parse_metadata_yields_typed_value() {
        let doc = "+++\nid = \"plan\"\n+++\n\nbody\n";
        let meta: Meta = parse_metadata(doc, Path::new("plan.md")).expect("parse");
        assert_eq!(meta.id, "plan");
    }

    #[test]
    fn parse_metadata_errors_name_the_document() {
        let err = parse_metadata::<Meta>("no block here\n", Path::new("plan.md")).unwrap_err();
        assert!(err.to_string().contains("plan.md"));
        assert!(err.to_string().contains("metadata block"));
    }

    #[test]
    fn bad_toml_is_a_parse_error_not_a_missing_block_error() {
        let doc = "+++\nid =\n+++\n\nbody\n";
        let err = parse_metadata::<Meta>(doc, Path::new("plan.md")).unwrap_err();
        assert!(format!("{err:#}").contains("parse metadata block"));
    }
}
