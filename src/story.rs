//! Story definitions and the JSON story graph source.
//!
//! This module provides:
//! - `StorySpec` representing a single unit of work with its dependencies
//! - `StoriesFile` representing the full stories.json format
//! - The fixed set of checkpoint kinds and their two trust classes
//! - The per-story progress record types (iterations, git checkpoints)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A single unit of work tracked through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorySpec {
    /// Unique, stable story id (e.g., "auth-login")
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Ids of stories that must complete before this one can start
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Ordered acceptance criteria, carried into conflict artifacts
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

impl StorySpec {
    pub fn new(id: &str, title: &str, depends_on: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            depends_on,
            acceptance_criteria: Vec::new(),
        }
    }
}

/// The full stories.json file format: the story graph source, loaded once
/// at workflow start and cycle-checked immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoriesFile {
    /// Timestamp when the story graph was produced
    pub generated_at: String,
    /// List of stories in declared order (the scheduler preserves it)
    pub stories: Vec<StorySpec>,
}

impl StoriesFile {
    /// Load stories from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stories file: {}", path.display()))?;

        let stories_file: StoriesFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse stories JSON: {}", path.display()))?;

        Ok(stories_file)
    }

    /// Save stories to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize stories to JSON")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write stories file: {}", path.display()))?;

        Ok(())
    }

    /// Get a specific story by id.
    pub fn get_story(&self, id: &str) -> Option<&StorySpec> {
        self.stories.iter().find(|s| s.id == id)
    }

    /// All story ids in declared order.
    pub fn ids(&self) -> Vec<&str> {
        self.stories.iter().map(|s| s.id.as_str()).collect()
    }
}

/// The fixed set of checkpoint kinds every story must pass.
///
/// Kinds come in two trust classes: self-reported kinds are written with the
/// caller's claimed value; verified kinds are always re-derived from a
/// validator's evidence artifact and never trust the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointKind {
    /// Test author signals the story's tests exist (self-report)
    TestsAuthored,
    /// Implementer signals the build is green (self-report)
    BuildComplete,
    /// Test runner evidence: the story's tests pass (verified)
    TestsVerified,
    /// Static analyzer evidence: the story's code is clean (verified)
    AnalysisVerified,
    /// Cleanup actor signals scaffolding was removed (self-report)
    CleanupComplete,
}

impl CheckpointKind {
    /// Every kind, in the order completion audits check them.
    pub const ALL: [CheckpointKind; 5] = [
        CheckpointKind::TestsAuthored,
        CheckpointKind::BuildComplete,
        CheckpointKind::TestsVerified,
        CheckpointKind::AnalysisVerified,
        CheckpointKind::CleanupComplete,
    ];

    /// Whether this kind must be backed by a validator evidence artifact.
    pub fn is_verified(self) -> bool {
        matches!(
            self,
            CheckpointKind::TestsVerified | CheckpointKind::AnalysisVerified
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointKind::TestsAuthored => "tests-authored",
            CheckpointKind::BuildComplete => "build-complete",
            CheckpointKind::TestsVerified => "tests-verified",
            CheckpointKind::AnalysisVerified => "analysis-verified",
            CheckpointKind::CleanupComplete => "cleanup-complete",
        }
    }
}

impl std::fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckpointKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tests-authored" => Ok(CheckpointKind::TestsAuthored),
            "build-complete" => Ok(CheckpointKind::BuildComplete),
            "tests-verified" => Ok(CheckpointKind::TestsVerified),
            "analysis-verified" => Ok(CheckpointKind::AnalysisVerified),
            "cleanup-complete" => Ok(CheckpointKind::CleanupComplete),
            _ => anyhow::bail!(
                "Invalid checkpoint kind '{}'. Valid kinds: tests-authored, build-complete, tests-verified, analysis-verified, cleanup-complete",
                s
            ),
        }
    }
}

/// Outcome of one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointValue {
    Pass,
    Fail { reason: String },
}

impl CheckpointValue {
    pub fn fail(reason: impl Into<String>) -> Self {
        CheckpointValue::Fail {
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, CheckpointValue::Pass)
    }

    /// Short rendering for tables and conflict records.
    pub fn summary(&self) -> String {
        match self {
            CheckpointValue::Pass => "PASS".to_string(),
            CheckpointValue::Fail { reason } => format!("FAIL: {}", reason),
        }
    }
}

/// Cached per-story checkpoint view, keyed by kind.
pub type CheckpointView = BTreeMap<CheckpointKind, CheckpointValue>;

/// Evidence-backed or self-reported outcome of one phase for one story.
///
/// Immutable once written except by story-scoped clear; always replaced
/// whole, never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub story_id: String,
    pub name: CheckpointKind,
    pub value: CheckpointValue,
    pub recorded_at: DateTime<Utc>,
    /// Digest of the backing evidence; present only for verified kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_hash: Option<String>,
    /// Path of the evidence artifact that justified the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<std::path::PathBuf>,
}

/// A named safe-rollback point: the working-tree snapshot taken when work
/// on a story began. Used exactly once if the story exhausts its budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitCheckpoint {
    pub story_id: String,
    /// Commit id of the snapshot
    pub revision: String,
    pub created_at: DateTime<Utc>,
}

/// One recorded validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    /// 1-based attempt number
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    /// Checkpoint values as they stood when the failure was recorded
    pub validator_snapshot: CheckpointView,
}

/// Bounded counter of failed attempts for one story.
///
/// Grows by one per recorded failure; reset to empty only by rollback or
/// successful completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationRecord {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub failures: Vec<FailureEntry>,
}

impl IterationRecord {
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_stories_json() -> String {
        r#"{
            "generated_at": "2026-07-02T12:00:00Z",
            "stories": [
                {
                    "id": "scaffold",
                    "title": "Project scaffolding",
                    "depends_on": [],
                    "acceptance_criteria": ["repo builds", "CI wired"]
                },
                {
                    "id": "auth",
                    "title": "Authentication flow",
                    "depends_on": ["scaffold"]
                }
            ]
        }"#
        .to_string()
    }

    #[test]
    fn test_stories_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stories.json");
        fs::write(&path, create_test_stories_json()).unwrap();

        let sf = StoriesFile::load(&path).unwrap();

        assert_eq!(sf.stories.len(), 2);
        assert_eq!(sf.stories[0].id, "scaffold");
        assert_eq!(sf.stories[0].acceptance_criteria.len(), 2);
        assert_eq!(sf.stories[1].depends_on, vec!["scaffold"]);
        // acceptance_criteria defaults to empty when absent
        assert!(sf.stories[1].acceptance_criteria.is_empty());
    }

    #[test]
    fn test_stories_file_load_not_found() {
        let result = StoriesFile::load(Path::new("/nonexistent/stories.json"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read stories file")
        );
    }

    #[test]
    fn test_stories_file_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stories.json");
        fs::write(&path, "{ invalid json }").unwrap();

        let result = StoriesFile::load(&path);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse stories JSON")
        );
    }

    #[test]
    fn test_stories_file_save_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stories.json");

        let sf = StoriesFile {
            generated_at: "2026-07-02T12:00:00Z".to_string(),
            stories: vec![StorySpec::new("solo", "Solo story", vec![])],
        };
        sf.save(&path).unwrap();

        let loaded = StoriesFile::load(&path).unwrap();
        assert_eq!(loaded.stories.len(), 1);
        assert_eq!(loaded.stories[0].id, "solo");
    }

    #[test]
    fn test_get_story() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stories.json");
        fs::write(&path, create_test_stories_json()).unwrap();

        let sf = StoriesFile::load(&path).unwrap();
        assert_eq!(sf.get_story("auth").unwrap().title, "Authentication flow");
        assert!(sf.get_story("missing").is_none());
    }

    #[test]
    fn test_checkpoint_kind_classes() {
        assert!(!CheckpointKind::TestsAuthored.is_verified());
        assert!(!CheckpointKind::BuildComplete.is_verified());
        assert!(CheckpointKind::TestsVerified.is_verified());
        assert!(CheckpointKind::AnalysisVerified.is_verified());
        assert!(!CheckpointKind::CleanupComplete.is_verified());
    }

    #[test]
    fn test_checkpoint_kind_roundtrip() {
        for kind in CheckpointKind::ALL {
            let parsed: CheckpointKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("not-a-kind".parse::<CheckpointKind>().is_err());
    }

    #[test]
    fn test_checkpoint_kind_serde_kebab_case() {
        let json = serde_json::to_string(&CheckpointKind::TestsVerified).unwrap();
        assert_eq!(json, "\"tests-verified\"");
        let parsed: CheckpointKind = serde_json::from_str("\"cleanup-complete\"").unwrap();
        assert_eq!(parsed, CheckpointKind::CleanupComplete);
    }

    #[test]
    fn test_checkpoint_value_summary() {
        assert_eq!(CheckpointValue::Pass.summary(), "PASS");
        assert_eq!(
            CheckpointValue::fail("3 tests red").summary(),
            "FAIL: 3 tests red"
        );
        assert!(CheckpointValue::Pass.is_pass());
        assert!(!CheckpointValue::fail("x").is_pass());
    }

    #[test]
    fn test_checkpoint_view_serializes_with_kind_keys() {
        let mut view = CheckpointView::new();
        view.insert(CheckpointKind::TestsAuthored, CheckpointValue::Pass);
        view.insert(
            CheckpointKind::TestsVerified,
            CheckpointValue::fail("2 failing"),
        );

        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"tests-authored\""));

        let parsed: CheckpointView = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[&CheckpointKind::TestsAuthored].is_pass());
    }

    #[test]
    fn test_iteration_record_default_is_empty() {
        let record = IterationRecord::default();
        assert!(record.is_empty());
        assert_eq!(record.count, 0);
    }
}
