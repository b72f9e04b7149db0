//! Typed error hierarchy for the warden engine.
//!
//! Each subsystem has its own enum so callers can match on the exact
//! failure. Every rejection carries the specific story, checkpoint, or
//! artifact identifier that caused it:
//! - `StoreError` — durable state store failures
//! - `GraphError` — story graph validation failures (fatal at load)
//! - `EvidenceError` — evidence artifact rejections
//! - `LedgerError` — checkpoint write refusals
//! - `RollbackError` — rollback failures
//! - `AuditError` — completion audit rejections
//! - `WorkflowError` — workflow lifecycle refusals

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the durable state store.
///
/// `CorruptState` is unrecoverable within a run: the backing record must be
/// repaired or reinitialized by hand, never auto-repaired.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State record at {path} is corrupt: {detail}")]
    CorruptState { path: PathBuf, detail: String },

    #[error("Failed to read state record at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state record at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to acquire workflow lock at {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from story graph construction. All of these are fatal at load
/// time: the pipeline refuses to start on a bad graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Duplicate story id: {id}")]
    DuplicateStory { id: String },

    #[error("Unknown dependency '{dependency}' in story '{story}': no story with that id exists")]
    UnknownDependency { story: String, dependency: String },

    #[error("Cycle detected in story dependencies. Involved stories: {involved:?}")]
    DependencyCycle { involved: Vec<String> },
}

/// Rejections from evidence verification.
///
/// Each variant names the artifact that failed and the check it failed.
/// A rejection blocks a single checkpoint write; the producing validator
/// must re-produce the evidence, not retry the same claim.
#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("Evidence artifact not found at {path}")]
    Missing { path: PathBuf },

    #[error("Evidence artifact at {path} is malformed: {detail}")]
    Malformed { path: PathBuf, detail: String },

    #[error(
        "Evidence artifact at {path} failed its integrity check: stored digest does not match recomputed digest"
    )]
    Tampered { path: PathBuf },

    #[error("Evidence artifact at {path} is stale: {age_secs}s old, freshness window is {window_secs}s")]
    Stale {
        path: PathBuf,
        age_secs: i64,
        window_secs: i64,
    },
}

impl EvidenceError {
    /// Short rejection kind for status output and conflict records.
    pub fn kind(&self) -> &'static str {
        match self {
            EvidenceError::Missing { .. } => "missing",
            EvidenceError::Malformed { .. } => "malformed",
            EvidenceError::Tampered { .. } => "tampered",
            EvidenceError::Stale { .. } => "stale",
        }
    }
}

/// Refusals from the checkpoint ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Checkpoint kind '{kind}' requires an evidence artifact but none was supplied")]
    EvidenceRequired { kind: String },

    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures from the rollback orchestrator.
///
/// `NoCheckpoint` is fatal for the story: there is no further automatic
/// recovery and a human must intervene.
#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("No working-tree checkpoint recorded for story '{story}': manual intervention required")]
    NoCheckpoint { story: String },

    #[error("Git error while rolling back story '{story}': {source}")]
    Git {
        story: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to write conflict artifact at {path}: {source}")]
    ConflictWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejections from the completion auditor. Completion is blocked by the
/// first checkpoint that fails independent re-verification.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Checkpoint '{kind}' for story '{story}' has never been recorded")]
    CheckpointMissing { story: String, kind: String },

    #[error("Checkpoint '{kind}' for story '{story}' is not PASS: {reason}")]
    CheckpointNotPass {
        story: String,
        kind: String,
        reason: String,
    },

    #[error("Checkpoint '{kind}' for story '{story}' failed re-verification: {source}")]
    EvidenceRejected {
        story: String,
        kind: String,
        #[source]
        source: EvidenceError,
    },

    #[error("Story '{story}' depends on '{dependency}', which is not complete")]
    DependencyIncomplete { story: String, dependency: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Refusals from the workflow lifecycle.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow is not active. Run 'warden start' first")]
    Inactive,

    #[error("Workflow is already active (started at {started_at})")]
    AlreadyActive { started_at: String },

    #[error("Unknown story id: {id}")]
    UnknownStory { id: String },

    #[error("Workflow exit blocked: stories {pending:?} have not passed their completion audit")]
    ExitBlocked { pending: Vec<String> },

    #[error(
        "Story '{story}' has reached the iteration bound ({count} failed attempts); rollback is required before further work"
    )]
    MaxIterationsReached { story: String, count: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
