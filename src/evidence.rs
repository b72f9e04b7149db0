//! Evidence artifacts and their verification.
//!
//! Validator actors (test runners, static analyzers, external reviewers)
//! drop a JSON artifact per story per validator kind. The verifier is the
//! single chokepoint through which every verified checkpoint must pass: it
//! never trusts the caller's claimed outcome, only the artifact's own
//! recomputed outcome.
//!
//! Verification order, each step a possible rejection:
//! 1. artifact exists (`missing`)
//! 2. artifact parses (`malformed`)
//! 3. recomputed digest matches the embedded digest (`tampered`)
//! 4. artifact is younger than the freshness window (`stale`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::errors::EvidenceError;
use crate::story::CheckpointValue;

/// Validator-reported outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceResult {
    Pass,
    Fail,
}

/// An externally produced, self-describing record that justifies a verified
/// checkpoint's value.
///
/// The producer computes `digest` over all other fields with
/// [`EvidenceArtifact::compute_digest`]; the verifier recomputes it with the
/// same scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub story_id: String,
    /// Which validator produced this (e.g., "test-runner", "analyzer")
    pub validator: String,
    pub result: EvidenceResult,
    pub timestamp: DateTime<Utc>,
    /// Free-form findings; folded into the FAIL reason
    #[serde(default)]
    pub detail: Vec<String>,
    /// SHA-256 over every content field, hex-encoded
    pub digest: String,
}

impl EvidenceArtifact {
    /// Build an unsealed artifact stamped now.
    pub fn new(
        story_id: &str,
        validator: &str,
        result: EvidenceResult,
        detail: Vec<String>,
    ) -> Self {
        Self {
            story_id: story_id.to_string(),
            validator: validator.to_string(),
            result,
            timestamp: Utc::now(),
            detail,
            digest: String::new(),
        }
    }

    /// The deterministic digest scheme shared by producers and the
    /// verifier: SHA-256 over a line-joined rendering of every field except
    /// the digest itself.
    pub fn compute_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.story_id.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.validator.as_bytes());
        hasher.update(b"\n");
        hasher.update(match self.result {
            EvidenceResult::Pass => b"pass" as &[u8],
            EvidenceResult::Fail => b"fail",
        });
        hasher.update(b"\n");
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        for line in &self.detail {
            hasher.update(b"\n");
            hasher.update(line.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Fill in the digest field. Producer-side convenience.
    pub fn seal(mut self) -> Self {
        self.digest = self.compute_digest();
        self
    }

    /// Write the artifact as pretty JSON.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize evidence artifact")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write evidence artifact: {}", path.display()))?;
        Ok(())
    }

    /// The checkpoint value this artifact vouches for.
    pub fn checkpoint_value(&self) -> CheckpointValue {
        match self.result {
            EvidenceResult::Pass => CheckpointValue::Pass,
            EvidenceResult::Fail => {
                let reason = if self.detail.is_empty() {
                    format!("{} reported failure", self.validator)
                } else {
                    self.detail.join("; ")
                };
                CheckpointValue::Fail { reason }
            }
        }
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedEvidence {
    pub value: CheckpointValue,
    pub digest: String,
    pub artifact: EvidenceArtifact,
}

/// Validates evidence artifacts: integrity, then freshness.
pub struct EvidenceVerifier {
    freshness_window: chrono::Duration,
}

impl EvidenceVerifier {
    pub fn new(freshness_window: chrono::Duration) -> Self {
        Self { freshness_window }
    }

    /// Verify the artifact at `path`. Rejections identify the artifact and
    /// the first check it failed.
    pub fn verify(&self, path: &Path) -> Result<VerifiedEvidence, EvidenceError> {
        if !path.exists() {
            return Err(EvidenceError::Missing {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| EvidenceError::Malformed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let artifact: EvidenceArtifact =
            serde_json::from_str(&content).map_err(|e| EvidenceError::Malformed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let recomputed = artifact.compute_digest();
        if recomputed != artifact.digest {
            return Err(EvidenceError::Tampered {
                path: path.to_path_buf(),
            });
        }

        let age = Utc::now().signed_duration_since(artifact.timestamp);
        if age > self.freshness_window {
            return Err(EvidenceError::Stale {
                path: path.to_path_buf(),
                age_secs: age.num_seconds(),
                window_secs: self.freshness_window.num_seconds(),
            });
        }

        tracing::debug!(
            story = %artifact.story_id,
            validator = %artifact.validator,
            "evidence verified"
        );

        Ok(VerifiedEvidence {
            value: artifact.checkpoint_value(),
            digest: recomputed,
            artifact,
        })
    }
}
