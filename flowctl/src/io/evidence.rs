//! Readers for host-written state documents: verification evidence and the
//! task tracker's view of the required tasks.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::{HostTask, VerificationEvidence};

/// Read the verification evidence document, if present.
pub fn read_evidence(path: &Path) -> Result<Option<VerificationEvidence>> {
    let Some(contents) = read_optional(path)? else {
        return Ok(None);
    };
    let evidence: VerificationEvidence = serde_json::from_str(&contents)
        .with_context(|| format!("corrupt verification evidence at {}", path.display()))?;
    Ok(Some(evidence))
}

/// Read the host tracker's task state, if present.
pub fn read_host_tasks(path: &Path) -> Result<Option<Vec<HostTask>>> {
    let Some(contents) = read_optional(path)? else {
        return Ok(None);
    };
    let tasks: Vec<HostTask> = serde_json::from_str(&contents)
        .with_context(|| format!("corrupt task state at {}", path.display()))?;
    Ok(Some(tasks))
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(contents))
}
