//! Working-tree snapshots and story rollback.
//!
//! When work on a story begins, the engine commits a snapshot of the whole
//! working tree. If the story later exhausts its iteration budget, the
//! orchestrator reverts the tree to that snapshot, clears the story's
//! checkpoint ledger and iteration history, and emits a conflict artifact:
//! the structured hand-off record an escalation process (human or agent)
//! picks up. The artifact schema is part of this module's public contract.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use git2::{Repository, Signature};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::RollbackError;
use crate::state::StateStore;
use crate::story::{CheckpointView, FailureEntry, GitCheckpoint, IterationRecord, StorySpec};

/// Name of the conflict artifact directory inside the warden directory.
pub const CONFLICTS_DIR: &str = "conflicts";

/// Git-backed snapshot/restore over the project working tree.
pub struct WorkTracker {
    repo: Repository,
}

impl WorkTracker {
    pub fn new(project_dir: &Path) -> Result<Self, git2::Error> {
        let repo = Repository::open(project_dir)?;
        Ok(Self { repo })
    }

    /// Commit a snapshot of the full working tree before story work starts.
    pub fn snapshot(&self, story_id: &str) -> Result<String, git2::Error> {
        let mut index = self.repo.index()?;

        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let sig = Signature::now("warden", "warden@localhost")?;
        let message = format!("[warden] checkpoint before story {}", story_id);

        // Handle unborn branch (new repo with no commits yet)
        let commit_id = if let Some(parent) = self.get_head_commit() {
            self.repo
                .commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])?
        } else {
            self.repo
                .commit(Some("HEAD"), &sig, &sig, &message, &tree, &[])?
        };

        Ok(commit_id.to_string())
    }

    /// Hard-reset the working tree to a snapshot revision.
    pub fn restore(&self, revision: &str) -> Result<(), git2::Error> {
        let oid = git2::Oid::from_str(revision)?;
        let commit = self.repo.find_commit(oid)?;
        self.repo
            .reset(commit.as_object(), git2::ResetType::Hard, None)
    }

    /// Get the HEAD commit if it exists (returns None for unborn branches)
    fn get_head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    /// Current HEAD SHA (returns None for unborn branches)
    pub fn head_sha(&self) -> Option<String> {
        self.get_head_commit().map(|c| c.id().to_string())
    }
}

/// The hand-off record emitted when a story exhausts its retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictArtifact {
    pub conflict_id: Uuid,
    pub story_id: String,
    pub title: String,
    pub acceptance_criteria: Vec<String>,
    /// Full failure history as recorded by the iteration guard
    pub failure_history: Vec<FailureEntry>,
    /// Last known value of every checkpoint before the clear
    pub last_checkpoints: CheckpointView,
    pub emitted_at: DateTime<Utc>,
}

/// What a successful rollback did.
#[derive(Debug, Clone)]
pub struct RollbackReport {
    /// The snapshot revision the tree was reverted to
    pub revision: String,
    /// Where the conflict artifact was written
    pub conflict_path: PathBuf,
}

pub struct RollbackOrchestrator<'a> {
    store: &'a StateStore,
    project_dir: PathBuf,
}

impl<'a> RollbackOrchestrator<'a> {
    pub fn new(store: &'a StateStore, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            project_dir: project_dir.into(),
        }
    }

    /// Create the story's safe-rollback point and record it. Called once,
    /// when work on the story begins.
    pub fn begin_story(&self, story_id: &str) -> Result<GitCheckpoint> {
        // The state dir must never be part of snapshots, or a later
        // hard-reset would wipe the very records that survived the failure
        ensure_state_ignored(self.store.warden_dir())?;

        let tracker = WorkTracker::new(&self.project_dir)
            .context("Failed to open git repository for snapshot")?;
        let revision = tracker
            .snapshot(story_id)
            .with_context(|| format!("Failed to snapshot working tree for story {}", story_id))?;

        let checkpoint = GitCheckpoint {
            story_id: story_id.to_string(),
            revision,
            created_at: Utc::now(),
        };

        let mut story = self.store.load_story(story_id)?;
        story.snapshot = Some(checkpoint.clone());
        self.store.save_story(&story)?;

        tracing::info!(story = story_id, revision = %checkpoint.revision, "snapshot created");

        Ok(checkpoint)
    }

    /// Revert the story to its snapshot, clear its progress records, and
    /// emit the conflict artifact.
    pub fn rollback(&self, spec: &StorySpec) -> Result<RollbackReport, RollbackError> {
        let mut story = self.store.load_story(&spec.id)?;
        let checkpoint = story
            .snapshot
            .clone()
            .ok_or_else(|| RollbackError::NoCheckpoint {
                story: spec.id.clone(),
            })?;

        // Capture history before the clears erase it
        let failure_history = self.store.load_iterations(&spec.id)?.failures;
        let last_checkpoints = story.checkpoints.clone();

        let git_err = |source: git2::Error| RollbackError::Git {
            story: spec.id.clone(),
            source,
        };
        let tracker = WorkTracker::new(&self.project_dir).map_err(git_err)?;
        tracker.restore(&checkpoint.revision).map_err(git_err)?;

        // Clear ledger records, iteration history, and the completion flag
        self.store.save_checkpoints(&spec.id, &[])?;
        self.store
            .save_iterations(&spec.id, &IterationRecord::default())?;
        story.checkpoints.clear();
        story.iteration_count = 0;
        story.passes = false;
        story.validated_at = None;
        // The snapshot is spent; re-beginning the story takes a fresh one
        story.snapshot = None;
        self.store.save_story(&story)?;

        let conflict_path = self.emit_conflict(spec, failure_history, last_checkpoints)?;

        tracing::warn!(
            story = %spec.id,
            revision = %checkpoint.revision,
            conflict = %conflict_path.display(),
            "story rolled back"
        );

        Ok(RollbackReport {
            revision: checkpoint.revision,
            conflict_path,
        })
    }

    fn emit_conflict(
        &self,
        spec: &StorySpec,
        failure_history: Vec<FailureEntry>,
        last_checkpoints: CheckpointView,
    ) -> Result<PathBuf, RollbackError> {
        let artifact = ConflictArtifact {
            conflict_id: Uuid::new_v4(),
            story_id: spec.id.clone(),
            title: spec.title.clone(),
            acceptance_criteria: spec.acceptance_criteria.clone(),
            failure_history,
            last_checkpoints,
            emitted_at: Utc::now(),
        };

        let conflicts_dir = self.store.warden_dir().join(CONFLICTS_DIR);
        let filename = format!(
            "{}_{}.json",
            artifact.emitted_at.format("%Y-%m-%dT%H-%M-%S"),
            &artifact.conflict_id.to_string()[..8]
        );
        let path = conflicts_dir.join(filename);

        let write_err = |source: std::io::Error| RollbackError::ConflictWriteFailed {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(&conflicts_dir).map_err(write_err)?;
        let json = serde_json::to_string_pretty(&artifact)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        std::fs::write(&path, json).map_err(write_err)?;

        Ok(path)
    }
}

/// Keep the warden state directory out of git's view entirely.
fn ensure_state_ignored(warden_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(warden_dir)
        .with_context(|| format!("Failed to create {}", warden_dir.display()))?;
    let ignore_path = warden_dir.join(".gitignore");
    if !ignore_path.exists() {
        std::fs::write(&ignore_path, "*\n")
            .with_context(|| format!("Failed to write {}", ignore_path.display()))?;
    }
    Ok(())
}
