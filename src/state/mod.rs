//! Durable, file-backed workflow state.
//!
//! Everything the engine knows lives under `.warden/`:
//!
//! ```text
//! .warden/
//! ├── workflow.json            # WorkflowState singleton
//! ├── workflow.lock            # advisory lock for singleton writes
//! └── stories/
//!     └── <id>/
//!         ├── record.json      # passes flag, cached views, snapshot handle
//!         ├── checkpoints.json # checkpoint ledger records
//!         └── iterations.json  # failed-attempt history
//! ```
//!
//! Every component reads the freshest state at the start of its operation
//! and persists at the end; no component holds state across calls. Writes
//! are write-temp-then-rename in the same directory, synced before the
//! rename, so a crash mid-write never leaves a half-written record visible.
//! Per-story records live in per-story directories, so processes working
//! different stories never contend; the workflow singleton is written under
//! a short-lived advisory lock.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::StoreError;
use crate::story::{CheckpointRecord, CheckpointView, GitCheckpoint, IterationRecord};

/// The pipeline phase the workflow is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowPhase {
    #[default]
    Idle,
    AuthorTests,
    Implement,
    Validate,
    Cleanup,
    Finalize,
}

impl WorkflowPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::AuthorTests => "author-tests",
            WorkflowPhase::Implement => "implement",
            WorkflowPhase::Validate => "validate",
            WorkflowPhase::Cleanup => "cleanup",
            WorkflowPhase::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(WorkflowPhase::Idle),
            "author-tests" => Ok(WorkflowPhase::AuthorTests),
            "implement" => Ok(WorkflowPhase::Implement),
            "validate" => Ok(WorkflowPhase::Validate),
            "cleanup" => Ok(WorkflowPhase::Cleanup),
            "finalize" => Ok(WorkflowPhase::Finalize),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid phases: idle, author-tests, implement, validate, cleanup, finalize",
                s
            ),
        }
    }
}

/// Process-wide singleton: is the workflow running, in which phase, on
/// which story. Initialized by `start`, torn down by `stop`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    pub active: bool,
    #[serde(default)]
    pub phase: WorkflowPhase,
    #[serde(default)]
    pub current_story: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

/// Durable per-story record: the completion flag plus cached views of the
/// story's progress. The checkpoint view here is a cache; the completion
/// auditor never trusts it and always re-reads the ledger records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: String,
    #[serde(default)]
    pub passes: bool,
    #[serde(default)]
    pub iteration_count: u32,
    #[serde(default)]
    pub checkpoints: CheckpointView,
    #[serde(default)]
    pub snapshot: Option<GitCheckpoint>,
    #[serde(default)]
    pub validated_at: Option<DateTime<Utc>>,
}

impl StoryRecord {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            passes: false,
            iteration_count: 0,
            checkpoints: CheckpointView::new(),
            snapshot: None,
            validated_at: None,
        }
    }
}

const WORKFLOW_FILE: &str = "workflow.json";
const WORKFLOW_LOCK: &str = "workflow.lock";
const STORIES_DIR: &str = "stories";
const RECORD_FILE: &str = "record.json";
const CHECKPOINTS_FILE: &str = "checkpoints.json";
const ITERATIONS_FILE: &str = "iterations.json";

/// File-backed store for all durable engine state.
pub struct StateStore {
    warden_dir: PathBuf,
}

impl StateStore {
    pub fn new(warden_dir: impl Into<PathBuf>) -> Self {
        Self {
            warden_dir: warden_dir.into(),
        }
    }

    pub fn warden_dir(&self) -> &Path {
        &self.warden_dir
    }

    fn workflow_path(&self) -> PathBuf {
        self.warden_dir.join(WORKFLOW_FILE)
    }

    pub fn story_dir(&self, story_id: &str) -> PathBuf {
        self.warden_dir.join(STORIES_DIR).join(story_id)
    }

    /// Load the workflow singleton. A missing record is the inactive idle
    /// state; an unreadable or malformed record is `CorruptState`.
    pub fn load_workflow(&self) -> Result<WorkflowState, StoreError> {
        Ok(self
            .read_json::<WorkflowState>(&self.workflow_path())?
            .unwrap_or_default())
    }

    /// Persist the workflow singleton under the advisory lock.
    pub fn save_workflow(&self, state: &WorkflowState) -> Result<(), StoreError> {
        let lock_path = self.warden_dir.join(WORKFLOW_LOCK);
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::LockFailed {
                path: lock_path.clone(),
                source,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|source| StoreError::LockFailed {
                path: lock_path.clone(),
                source,
            })?;

        let result = self.write_json_atomic(&self.workflow_path(), state);
        let _ = lock_file.unlock();
        result
    }

    /// Load a story's durable record; a story never touched yet gets a
    /// fresh empty record.
    pub fn load_story(&self, story_id: &str) -> Result<StoryRecord, StoreError> {
        Ok(self
            .read_json::<StoryRecord>(&self.story_dir(story_id).join(RECORD_FILE))?
            .unwrap_or_else(|| StoryRecord::new(story_id)))
    }

    pub fn save_story(&self, record: &StoryRecord) -> Result<(), StoreError> {
        self.write_json_atomic(&self.story_dir(&record.id).join(RECORD_FILE), record)
    }

    pub fn load_checkpoints(&self, story_id: &str) -> Result<Vec<CheckpointRecord>, StoreError> {
        Ok(self
            .read_json::<Vec<CheckpointRecord>>(&self.story_dir(story_id).join(CHECKPOINTS_FILE))?
            .unwrap_or_default())
    }

    pub fn save_checkpoints(
        &self,
        story_id: &str,
        records: &[CheckpointRecord],
    ) -> Result<(), StoreError> {
        self.write_json_atomic(&self.story_dir(story_id).join(CHECKPOINTS_FILE), &records)
    }

    pub fn load_iterations(&self, story_id: &str) -> Result<IterationRecord, StoreError> {
        Ok(self
            .read_json::<IterationRecord>(&self.story_dir(story_id).join(ITERATIONS_FILE))?
            .unwrap_or_default())
    }

    pub fn save_iterations(
        &self,
        story_id: &str,
        record: &IterationRecord,
    ) -> Result<(), StoreError> {
        self.write_json_atomic(&self.story_dir(story_id).join(ITERATIONS_FILE), record)
    }

    /// Ids of every story that has a durable record.
    pub fn list_story_ids(&self) -> Result<Vec<String>, StoreError> {
        let stories_dir = self.warden_dir.join(STORIES_DIR);
        if !stories_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&stories_dir).map_err(|source| StoreError::ReadFailed {
            path: stories_dir.clone(),
            source,
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| StoreError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let value: T =
            serde_json::from_str(&content).map_err(|source| StoreError::CorruptState {
                path: path.to_path_buf(),
                detail: source.to_string(),
            })?;

        Ok(Some(value))
    }

    /// Write-temp-then-rename so a reader never observes a half-written
    /// record; the temp file is synced before the rename so the mutation is
    /// durable when this returns.
    fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let write_failed = |source: std::io::Error| StoreError::WriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }

        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::WriteFailed {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;

        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        {
            let mut file = std::fs::File::create(&tmp_path).map_err(write_failed)?;
            file.write_all(json.as_bytes()).map_err(write_failed)?;
            file.sync_all().map_err(write_failed)?;
        }
        std::fs::rename(&tmp_path, path).map_err(write_failed)?;

        Ok(())
    }
}
