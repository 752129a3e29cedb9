//! Git adapter for exit-gate signals.
//!
//! This tool only observes the repository (status, upstream distance, commit
//! times); it never mutates it. Kept as a small, explicit wrapper around
//! `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Return the current branch name (errors on detached HEAD).
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            return Err(anyhow!("detached HEAD"));
        }
        Ok(name)
    }

    /// Return the current HEAD short SHA (stable given repo state).
    pub fn head_short_sha(&self, len: usize) -> Result<String> {
        let arg = format!("--short={len}");
        let out = self.run_capture(&["rev-parse", &arg, "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// True when the worktree has no uncommitted or untracked changes.
    #[instrument(skip_all)]
    pub fn is_clean(&self) -> Result<bool> {
        let entries = self.status_porcelain()?;
        debug!(changed = entries.len(), "worktree status");
        Ok(entries.is_empty())
    }

    /// Commits ahead of the upstream branch, or `None` without an upstream.
    #[instrument(skip_all)]
    pub fn unpushed_commits(&self) -> Result<Option<u64>> {
        let upstream = self
            .run(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{upstream}"])?
            .status;
        if !upstream.success() {
            debug!("no upstream configured");
            return Ok(None);
        }
        let out = self.run_capture(&["rev-list", "--count", "@{upstream}..HEAD"])?;
        let count: u64 = out
            .trim()
            .parse()
            .with_context(|| format!("parse rev-list count '{}'", out.trim()))?;
        debug!(count, "unpushed commits");
        Ok(Some(count))
    }

    /// Commit time of HEAD, or `None` in a repo with no commits yet.
    pub fn head_commit_time(&self) -> Result<Option<DateTime<Utc>>> {
        let out = self.run(&["log", "-1", "--format=%cI"])?;
        if !out.status.success() {
            return Ok(None);
        }
        let raw = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if raw.is_empty() {
            return Ok(None);
        }
        let parsed = DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("parse commit time '{raw}'"))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
