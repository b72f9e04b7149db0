//! Checkpoint ledger: records phase outcomes per story.
//!
//! Two trust classes. Self-reported kinds write the caller's claimed value
//! as-is. Verified kinds ignore the claim entirely: the ledger runs the
//! evidence verifier and writes the value recomputed from the artifact, or
//! refuses the write when verification rejects. Callers that get a
//! rejection must re-produce evidence, not retry the same claim.

use chrono::Utc;

use crate::errors::LedgerError;
use crate::evidence::EvidenceVerifier;
use crate::state::StateStore;
use crate::story::{CheckpointKind, CheckpointRecord, CheckpointValue};
use std::path::Path;

pub struct CheckpointLedger<'a> {
    store: &'a StateStore,
    verifier: EvidenceVerifier,
}

impl<'a> CheckpointLedger<'a> {
    pub fn new(store: &'a StateStore, verifier: EvidenceVerifier) -> Self {
        Self { store, verifier }
    }

    /// Record a checkpoint outcome. Returns the value actually written,
    /// which for verified kinds may differ from the caller's claim.
    pub fn record(
        &self,
        story_id: &str,
        kind: CheckpointKind,
        claimed: CheckpointValue,
        evidence_ref: Option<&Path>,
    ) -> Result<CheckpointValue, LedgerError> {
        let (value, integrity_hash, evidence_ref) = if kind.is_verified() {
            let path = evidence_ref.ok_or_else(|| LedgerError::EvidenceRequired {
                kind: kind.to_string(),
            })?;
            let verified = self.verifier.verify(path)?;
            (
                verified.value,
                Some(verified.digest),
                Some(path.to_path_buf()),
            )
        } else {
            (claimed, None, None)
        };

        let record = CheckpointRecord {
            story_id: story_id.to_string(),
            name: kind,
            value: value.clone(),
            recorded_at: Utc::now(),
            integrity_hash,
            evidence_ref,
        };

        // Replace whole, never update in place
        let mut records = self.store.load_checkpoints(story_id)?;
        records.retain(|r| r.name != kind);
        records.push(record);
        self.store.save_checkpoints(story_id, &records)?;

        // Refresh the cached view on the story record
        let mut story = self.store.load_story(story_id)?;
        story.checkpoints.insert(kind, value.clone());
        self.store.save_story(&story)?;

        tracing::info!(story = story_id, kind = %kind, value = %value.summary(), "checkpoint recorded");

        Ok(value)
    }

    /// The ledger record for one checkpoint kind, if any.
    pub fn get(
        &self,
        story_id: &str,
        kind: CheckpointKind,
    ) -> Result<Option<CheckpointRecord>, LedgerError> {
        Ok(self
            .store
            .load_checkpoints(story_id)?
            .into_iter()
            .find(|r| r.name == kind))
    }

    /// Remove every checkpoint record for a story and empty its cached
    /// view. Used by rollback.
    pub fn clear(&self, story_id: &str) -> Result<(), LedgerError> {
        self.store.save_checkpoints(story_id, &[])?;

        let mut story = self.store.load_story(story_id)?;
        story.checkpoints.clear();
        self.store.save_story(&story)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{EvidenceArtifact, EvidenceResult};
    use chrono::Duration;
    use tempfile::tempdir;

    fn setup() -> (StateStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (StateStore::new(dir.path().join(".warden")), dir)
    }

    fn verifier() -> EvidenceVerifier {
        EvidenceVerifier::new(Duration::seconds(1800))
    }

    fn write_evidence(
        dir: &std::path::Path,
        story: &str,
        result: EvidenceResult,
    ) -> std::path::PathBuf {
        let artifact = EvidenceArtifact::new(story, "test-runner", result, vec![]).seal();
        let path = dir.join(format!("{story}-tests.json"));
        artifact.write(&path).unwrap();
        path
    }

    #[test]
    fn test_self_report_accepts_claimed_value() {
        let (store, _dir) = setup();
        let ledger = CheckpointLedger::new(&store, verifier());

        let written = ledger
            .record(
                "auth",
                CheckpointKind::TestsAuthored,
                CheckpointValue::Pass,
                None,
            )
            .unwrap();
        assert!(written.is_pass());

        let record = ledger.get("auth", CheckpointKind::TestsAuthored).unwrap().unwrap();
        assert!(record.value.is_pass());
        assert!(record.integrity_hash.is_none());
        assert!(record.evidence_ref.is_none());
    }

    #[test]
    fn test_verified_kind_requires_evidence_ref() {
        let (store, _dir) = setup();
        let ledger = CheckpointLedger::new(&store, verifier());

        let err = ledger
            .record(
                "auth",
                CheckpointKind::TestsVerified,
                CheckpointValue::Pass,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::EvidenceRequired { .. }));
        assert!(ledger.get("auth", CheckpointKind::TestsVerified).unwrap().is_none());
    }

    #[test]
    fn test_verified_kind_ignores_caller_claim() {
        let (store, dir) = setup();
        let ledger = CheckpointLedger::new(&store, verifier());
        // Validator says FAIL; the caller claims PASS
        let evidence = write_evidence(dir.path(), "auth", EvidenceResult::Fail);

        let written = ledger
            .record(
                "auth",
                CheckpointKind::TestsVerified,
                CheckpointValue::Pass,
                Some(&evidence),
            )
            .unwrap();
        assert!(!written.is_pass(), "ledger must write the verified value");

        let record = ledger.get("auth", CheckpointKind::TestsVerified).unwrap().unwrap();
        assert!(!record.value.is_pass());
        assert!(record.integrity_hash.is_some());
        assert_eq!(record.evidence_ref.as_deref(), Some(evidence.as_path()));
    }

    #[test]
    fn test_rejected_evidence_refuses_the_write() {
        let (store, dir) = setup();
        let ledger = CheckpointLedger::new(&store, verifier());
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ledger
            .record(
                "auth",
                CheckpointKind::AnalysisVerified,
                CheckpointValue::Pass,
                Some(&path),
            )
            .unwrap_err();
        match err {
            LedgerError::Evidence(e) => assert_eq!(e.kind(), "malformed"),
            other => panic!("expected evidence rejection, got {other:?}"),
        }
        assert!(
            ledger
                .get("auth", CheckpointKind::AnalysisVerified)
                .unwrap()
                .is_none(),
            "a rejected write must leave no record"
        );
    }

    #[test]
    fn test_record_replaces_whole() {
        let (store, _dir) = setup();
        let ledger = CheckpointLedger::new(&store, verifier());

        ledger
            .record(
                "auth",
                CheckpointKind::BuildComplete,
                CheckpointValue::fail("link error"),
                None,
            )
            .unwrap();
        ledger
            .record(
                "auth",
                CheckpointKind::BuildComplete,
                CheckpointValue::Pass,
                None,
            )
            .unwrap();

        let records = store.load_checkpoints("auth").unwrap();
        assert_eq!(
            records
                .iter()
                .filter(|r| r.name == CheckpointKind::BuildComplete)
                .count(),
            1,
            "re-recording must replace, not append"
        );
        assert!(records[0].value.is_pass());
    }

    #[test]
    fn test_successful_write_updates_cached_view() {
        let (store, _dir) = setup();
        let ledger = CheckpointLedger::new(&store, verifier());

        ledger
            .record(
                "auth",
                CheckpointKind::TestsAuthored,
                CheckpointValue::Pass,
                None,
            )
            .unwrap();

        let story = store.load_story("auth").unwrap();
        assert!(story.checkpoints[&CheckpointKind::TestsAuthored].is_pass());
    }

    #[test]
    fn test_clear_removes_records_and_cached_view() {
        let (store, dir) = setup();
        let ledger = CheckpointLedger::new(&store, verifier());
        let evidence = write_evidence(dir.path(), "auth", EvidenceResult::Pass);

        ledger
            .record(
                "auth",
                CheckpointKind::TestsAuthored,
                CheckpointValue::Pass,
                None,
            )
            .unwrap();
        ledger
            .record(
                "auth",
                CheckpointKind::TestsVerified,
                CheckpointValue::Pass,
                Some(&evidence),
            )
            .unwrap();

        ledger.clear("auth").unwrap();

        assert!(store.load_checkpoints("auth").unwrap().is_empty());
        assert!(store.load_story("auth").unwrap().checkpoints.is_empty());
    }

    #[test]
    fn test_clear_is_story_scoped() {
        let (store, _dir) = setup();
        let ledger = CheckpointLedger::new(&store, verifier());

        ledger
            .record(
                "auth",
                CheckpointKind::TestsAuthored,
                CheckpointValue::Pass,
                None,
            )
            .unwrap();
        ledger
            .record(
                "teams",
                CheckpointKind::TestsAuthored,
                CheckpointValue::Pass,
                None,
            )
            .unwrap();

        ledger.clear("auth").unwrap();

        assert!(store.load_checkpoints("auth").unwrap().is_empty());
        assert_eq!(store.load_checkpoints("teams").unwrap().len(), 1);
    }
}
