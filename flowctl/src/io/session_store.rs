//! Session state storage (`.flowctl/sessions/<sessionId>.json`).
//!
//! The store exclusively owns serialization and atomicity of the session
//! document. Reads validate against the embedded JSON Schema and normalize
//! legacy field encodings once; writes validate and then replace the file
//! via a sibling temp file + rename, so a concurrent reader never observes
//! a torn document. The atomic rename does NOT provide multi-step
//! isolation: two overlapping read-merge-write cycles can drop the first
//! writer's change. Acceptable for the single-human, single-agent model.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::types::ModeStatus;

const SESSION_SCHEMA: &str = include_str!("../../schemas/session_state.v1.schema.json");

/// The default (idle) mode. Exiting any mode returns the session here.
pub const DEFAULT_MODE: &str = "default";

/// One mode-history entry, normalized.
///
/// Entries read from the legacy scalar encoding carry no timestamps and
/// serialize back to the scalar form, so documents round-trip whichever
/// encoding they arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeHistoryEntry {
    pub mode: String,
    pub entered_at: Option<DateTime<Utc>>,
    pub exited_at: Option<DateTime<Utc>>,
}

/// Wire encoding for a mode-history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum ModeHistoryEncoding {
    Legacy(String),
    Current {
        mode: String,
        #[serde(rename = "enteredAt")]
        entered_at: DateTime<Utc>,
        #[serde(
            rename = "exitedAt",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        exited_at: Option<DateTime<Utc>>,
    },
}

impl From<ModeHistoryEncoding> for ModeHistoryEntry {
    fn from(wire: ModeHistoryEncoding) -> Self {
        match wire {
            ModeHistoryEncoding::Legacy(mode) => Self {
                mode,
                entered_at: None,
                exited_at: None,
            },
            ModeHistoryEncoding::Current {
                mode,
                entered_at,
                exited_at,
            } => Self {
                mode,
                entered_at: Some(entered_at),
                exited_at,
            },
        }
    }
}

impl From<&ModeHistoryEntry> for ModeHistoryEncoding {
    fn from(entry: &ModeHistoryEntry) -> Self {
        match entry.entered_at {
            Some(entered_at) => Self::Current {
                mode: entry.mode.clone(),
                entered_at,
                exited_at: entry.exited_at,
            },
            None => Self::Legacy(entry.mode.clone()),
        }
    }
}

/// One bead (ticket-creation) record, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeadRecord {
    pub id: String,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Wire encoding for a bead record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum BeadEncoding {
    Legacy(String),
    Current {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(
            rename = "createdAt",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        created_at: Option<DateTime<Utc>>,
    },
}

impl From<BeadEncoding> for BeadRecord {
    fn from(wire: BeadEncoding) -> Self {
        match wire {
            BeadEncoding::Legacy(id) => Self {
                id,
                title: None,
                created_at: None,
            },
            BeadEncoding::Current {
                id,
                title,
                created_at,
            } => Self {
                id,
                title,
                created_at,
            },
        }
    }
}

impl From<&BeadRecord> for BeadEncoding {
    fn from(record: &BeadRecord) -> Self {
        if record.title.is_none() && record.created_at.is_none() {
            Self::Legacy(record.id.clone())
        } else {
            Self::Current {
                id: record.id.clone(),
                title: record.title.clone(),
                created_at: record.created_at,
            }
        }
    }
}

/// Kind of a free-form ledger note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Decision,
    Discovery,
    Correction,
}

/// One ledger note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: LedgerKind,
    pub note: String,
    pub at: DateTime<Utc>,
}

/// Per-mode lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeState {
    pub status: ModeStatus,
    #[serde(rename = "enteredAt")]
    pub entered_at: DateTime<Utc>,
    #[serde(rename = "closedAt", default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// The session's durable record, normalized for in-process use.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session_id: String,
    pub workflow_id: String,
    pub current_mode: String,
    pub current_phase: Option<String>,
    pub completed_phases: Vec<String>,
    pub template: Option<String>,
    pub phases: Vec<String>,
    pub mode_history: Vec<ModeHistoryEntry>,
    pub mode_state: BTreeMap<String, ModeState>,
    pub issue_number: Option<u64>,
    pub issue_title: Option<String>,
    pub issue_type: Option<String>,
    pub beads: Vec<BeadRecord>,
    pub ledger: Vec<LedgerEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Unknown fields preserved verbatim across version skew.
    pub extra: Map<String, Value>,
}

/// Wire shape of the session document.
#[derive(Debug, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "workflowId")]
    workflow_id: String,
    #[serde(rename = "currentMode")]
    current_mode: String,
    #[serde(
        rename = "currentPhase",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    current_phase: Option<String>,
    #[serde(rename = "completedPhases", default)]
    completed_phases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    #[serde(default)]
    phases: Vec<String>,
    #[serde(rename = "modeHistory", default)]
    mode_history: Vec<ModeHistoryEncoding>,
    #[serde(rename = "modeState", default)]
    mode_state: BTreeMap<String, ModeState>,
    #[serde(
        rename = "issueNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    issue_number: Option<u64>,
    #[serde(
        rename = "issueTitle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    issue_title: Option<String>,
    #[serde(rename = "issueType", default, skip_serializing_if = "Option::is_none")]
    issue_type: Option<String>,
    #[serde(default)]
    beads: Vec<BeadEncoding>,
    #[serde(default)]
    ledger: Vec<LedgerEntry>,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<SessionDocument> for SessionState {
    fn from(doc: SessionDocument) -> Self {
        Self {
            session_id: doc.session_id,
            workflow_id: doc.workflow_id,
            current_mode: doc.current_mode,
            current_phase: doc.current_phase,
            completed_phases: doc.completed_phases,
            template: doc.template,
            phases: doc.phases,
            mode_history: doc.mode_history.into_iter().map(Into::into).collect(),
            mode_state: doc.mode_state,
            issue_number: doc.issue_number,
            issue_title: doc.issue_title,
            issue_type: doc.issue_type,
            beads: doc.beads.into_iter().map(Into::into).collect(),
            ledger: doc.ledger,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            extra: doc.extra,
        }
    }
}

impl From<&SessionState> for SessionDocument {
    fn from(state: &SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            workflow_id: state.workflow_id.clone(),
            current_mode: state.current_mode.clone(),
            current_phase: state.current_phase.clone(),
            completed_phases: state.completed_phases.clone(),
            template: state.template.clone(),
            phases: state.phases.clone(),
            mode_history: state.mode_history.iter().map(Into::into).collect(),
            mode_state: state.mode_state.clone(),
            issue_number: state.issue_number,
            issue_title: state.issue_title.clone(),
            issue_type: state.issue_type.clone(),
            beads: state.beads.iter().map(Into::into).collect(),
            ledger: state.ledger.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
            extra: state.extra.clone(),
        }
    }
}

/// Fresh session state: empty collections, the implicit `default` mode.
pub fn new_session(session_id: &str, workflow_id: &str, now: DateTime<Utc>) -> SessionState {
    SessionState {
        session_id: session_id.to_string(),
        workflow_id: workflow_id.to_string(),
        current_mode: DEFAULT_MODE.to_string(),
        current_phase: None,
        completed_phases: Vec::new(),
        template: None,
        phases: Vec::new(),
        mode_history: Vec::new(),
        mode_state: BTreeMap::new(),
        issue_number: None,
        issue_title: None,
        issue_type: None,
        beads: Vec::new(),
        ledger: Vec::new(),
        created_at: now,
        updated_at: now,
        extra: Map::new(),
    }
}

/// Read and validate a session document.
pub fn read_session(path: &Path) -> Result<SessionState> {
    if !path.exists() {
        return Err(anyhow!(
            "session state not found at {} (run `flowctl enter <mode>` to initialize the session)",
            path.display()
        ));
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session state {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("corrupt session state (invalid JSON) at {}", path.display()))?;
    validate_schema(&value)
        .with_context(|| format!("session state failed schema validation at {}", path.display()))?;
    let doc: SessionDocument = serde_json::from_value(value)
        .with_context(|| format!("deserialize session state {}", path.display()))?;
    let state = SessionState::from(doc);
    debug!(session_id = %state.session_id, mode = %state.current_mode, "session state loaded");
    Ok(state)
}

/// Validate and atomically write a session document (temp file + rename).
pub fn write_session(path: &Path, state: &SessionState) -> Result<()> {
    let doc = SessionDocument::from(state);
    let value = serde_json::to_value(&doc).context("serialize session state")?;
    validate_schema(&value).context("refusing to write invalid session state")?;

    let mut buf = serde_json::to_string_pretty(&value)?;
    buf.push('\n');
    write_atomic(path, &buf)?;
    debug!(session_id = %state.session_id, path = %path.display(), "session state written");
    Ok(())
}

/// Read, apply `apply`, refresh `updatedAt`, and write back atomically.
///
/// This composes one read-merge-write cycle; it is not a transaction across
/// concurrent invocations.
pub fn update_session(
    path: &Path,
    apply: impl FnOnce(&mut SessionState),
) -> Result<SessionState> {
    let mut state = read_session(path)?;
    apply(&mut state);
    state.updated_at = Utc::now();
    write_session(path, &state)?;
    Ok(state)
}

/// Read the session if it exists, otherwise create and persist a fresh one.
pub fn load_or_create(path: &Path, session_id: &str, workflow_id: &str) -> Result<SessionState> {
    if path.exists() {
        return read_session(path);
    }
    let state = new_session(session_id, workflow_id, Utc::now());
    write_session(path, &state)?;
    Ok(state)
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(SESSION_SCHEMA).context("parse embedded session schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile session schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!("schema violations: {}", messages.join("; ")));
    }
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    // The temp name is unique per writer so overlapping writers rename
    // distinct complete files instead of clobbering a shared temp.
    static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

    let parent = path
        .parent()
        .with_context(|| format!("session path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension(format!(
        "json.tmp.{}.{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp session state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace session state {}", path.display()))?;
    Ok(())
}
