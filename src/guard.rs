//! Iteration guard: bounded retry tracking per story.
//!
//! Each recorded validation failure appends to the story's failure history
//! and bumps its counter. Once the counter reaches the configured bound the
//! guard flags escalation; the caller must then invoke rollback before any
//! further work on that story. The guard never triggers rollback itself,
//! so that decision point stays observable to the caller.

use chrono::Utc;

use crate::errors::StoreError;
use crate::state::StateStore;
use crate::story::{CheckpointView, FailureEntry, IterationRecord};

/// Result of recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Total failed attempts so far, including this one
    pub count: u32,
    /// True once the iteration bound is reached; normal retry is blocked
    pub escalate: bool,
}

pub struct IterationGuard<'a> {
    store: &'a StateStore,
    max_iterations: u32,
}

impl<'a> IterationGuard<'a> {
    pub fn new(store: &'a StateStore, max_iterations: u32) -> Self {
        Self {
            store,
            max_iterations,
        }
    }

    /// Record one failed attempt with the checkpoint values at failure time.
    pub fn record_failure(
        &self,
        story_id: &str,
        reason: &str,
        validator_snapshot: CheckpointView,
    ) -> Result<FailureOutcome, StoreError> {
        let mut record = self.store.load_iterations(story_id)?;
        record.count += 1;
        record.failures.push(FailureEntry {
            attempt: record.count,
            timestamp: Utc::now(),
            reason: reason.to_string(),
            validator_snapshot,
        });
        self.store.save_iterations(story_id, &record)?;

        // Mirror the counter into the story record's cached view
        let mut story = self.store.load_story(story_id)?;
        story.iteration_count = record.count;
        self.store.save_story(&story)?;

        let escalate = record.count >= self.max_iterations;
        if escalate {
            tracing::warn!(
                story = story_id,
                count = record.count,
                "iteration bound reached; rollback required"
            );
        }

        Ok(FailureOutcome {
            count: record.count,
            escalate,
        })
    }

    /// Whether the story has exhausted its budget and must be rolled back
    /// before further work.
    pub fn is_exhausted(&self, story_id: &str) -> Result<bool, StoreError> {
        Ok(self.store.load_iterations(story_id)?.count >= self.max_iterations)
    }

    /// Reset the counter and history. Called on successful completion or
    /// after rollback.
    pub fn clear(&self, story_id: &str) -> Result<(), StoreError> {
        self.store
            .save_iterations(story_id, &IterationRecord::default())?;

        let mut story = self.store.load_story(story_id)?;
        story.iteration_count = 0;
        self.store.save_story(&story)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{CheckpointKind, CheckpointValue};
    use tempfile::tempdir;

    fn setup() -> (StateStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (StateStore::new(dir.path().join(".warden")), dir)
    }

    #[test]
    fn test_counter_grows_by_one_per_failure() {
        let (store, _dir) = setup();
        let guard = IterationGuard::new(&store, 5);

        for expected in 1..=3 {
            let outcome = guard
                .record_failure("auth", "tests red", CheckpointView::new())
                .unwrap();
            assert_eq!(outcome.count, expected);
            assert!(!outcome.escalate);
        }

        let record = store.load_iterations("auth").unwrap();
        assert_eq!(record.count, 3);
        assert_eq!(record.failures.len(), 3);
        assert_eq!(record.failures[2].attempt, 3);
    }

    #[test]
    fn test_escalates_exactly_at_the_bound() {
        let (store, _dir) = setup();
        let guard = IterationGuard::new(&store, 3);

        assert!(
            !guard
                .record_failure("auth", "x", CheckpointView::new())
                .unwrap()
                .escalate
        );
        assert!(
            !guard
                .record_failure("auth", "x", CheckpointView::new())
                .unwrap()
                .escalate
        );
        let third = guard
            .record_failure("auth", "x", CheckpointView::new())
            .unwrap();
        assert_eq!(third.count, 3);
        assert!(third.escalate);
        assert!(guard.is_exhausted("auth").unwrap());
    }

    #[test]
    fn test_failure_entries_carry_snapshot_and_reason() {
        let (store, _dir) = setup();
        let guard = IterationGuard::new(&store, 5);

        let mut snapshot = CheckpointView::new();
        snapshot.insert(
            CheckpointKind::TestsVerified,
            CheckpointValue::fail("2 failing"),
        );
        guard
            .record_failure("auth", "validator rejected build", snapshot)
            .unwrap();

        let record = store.load_iterations("auth").unwrap();
        assert_eq!(record.failures[0].reason, "validator rejected build");
        assert!(
            !record.failures[0].validator_snapshot[&CheckpointKind::TestsVerified].is_pass()
        );
    }

    #[test]
    fn test_clear_resets_counter_and_history() {
        let (store, _dir) = setup();
        let guard = IterationGuard::new(&store, 2);

        guard
            .record_failure("auth", "x", CheckpointView::new())
            .unwrap();
        guard
            .record_failure("auth", "x", CheckpointView::new())
            .unwrap();
        assert!(guard.is_exhausted("auth").unwrap());

        guard.clear("auth").unwrap();

        let record = store.load_iterations("auth").unwrap();
        assert!(record.is_empty());
        assert!(!guard.is_exhausted("auth").unwrap());
        assert_eq!(store.load_story("auth").unwrap().iteration_count, 0);
    }

    #[test]
    fn test_counters_are_per_story() {
        let (store, _dir) = setup();
        let guard = IterationGuard::new(&store, 5);

        guard
            .record_failure("auth", "x", CheckpointView::new())
            .unwrap();
        guard
            .record_failure("auth", "x", CheckpointView::new())
            .unwrap();
        guard
            .record_failure("teams", "y", CheckpointView::new())
            .unwrap();

        assert_eq!(store.load_iterations("auth").unwrap().count, 2);
        assert_eq!(store.load_iterations("teams").unwrap().count, 1);
    }
}
