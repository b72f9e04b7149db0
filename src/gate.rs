//! Phase gate: decides whether the current phase may mutate a given path.
//!
//! A pure function of (phase, path) plus a static glob classification table.
//! The decision table:
//!
//! | phase        | denies mutation to                                  |
//! |--------------|------------------------------------------------------|
//! | author-tests | implementation source paths                          |
//! | implement    | test artifact paths                                  |
//! | validate     | anything outside the state/evidence/report namespace |
//! | cleanup, finalize, idle | nothing beyond global rules               |
//!
//! A DENY is fatal for the single edit attempt, never for the session.

use anyhow::{Context, Result};
use glob::Pattern;
use std::path::Path;

use crate::config::PathRules;
use crate::state::WorkflowPhase;

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Allow,
    Deny { rule: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// What kind of file a path is, for gating purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Engine state, evidence artifacts, reports
    StateNamespace,
    /// Test files and fixtures
    TestArtifact,
    /// Implementation sources
    SourceFile,
    /// Everything else (docs, config, assets)
    Other,
}

/// Compiled glob classifier for working-tree paths.
///
/// Classification precedence: state namespace, then test artifacts, then
/// sources. The first matching class wins.
pub struct PathClassifier {
    test: Vec<Pattern>,
    source: Vec<Pattern>,
    state: Vec<Pattern>,
}

impl PathClassifier {
    pub fn from_rules(rules: &PathRules) -> Result<Self> {
        Ok(Self {
            test: compile(&rules.test_globs)?,
            source: compile(&rules.source_globs)?,
            state: compile(&rules.state_globs)?,
        })
    }

    pub fn classify(&self, path: &Path) -> PathClass {
        if self.state.iter().any(|p| p.matches_path(path)) {
            PathClass::StateNamespace
        } else if self.test.iter().any(|p| p.matches_path(path)) {
            PathClass::TestArtifact
        } else if self.source.iter().any(|p| p.matches_path(path)) {
            PathClass::SourceFile
        } else {
            PathClass::Other
        }
    }
}

fn compile(globs: &[String]) -> Result<Vec<Pattern>> {
    globs
        .iter()
        .map(|g| Pattern::new(g).with_context(|| format!("Invalid path glob: {}", g)))
        .collect()
}

/// The gate itself: holds the compiled classifier, checks one mutation at
/// a time.
pub struct PhaseGate {
    classifier: PathClassifier,
}

impl PhaseGate {
    pub fn new(rules: &PathRules) -> Result<Self> {
        Ok(Self {
            classifier: PathClassifier::from_rules(rules)?,
        })
    }

    /// Decide ALLOW/DENY for mutating `path` while in `phase`.
    pub fn check(&self, phase: WorkflowPhase, path: &Path) -> GateDecision {
        let class = self.classifier.classify(path);

        match phase {
            WorkflowPhase::AuthorTests if class == PathClass::SourceFile => GateDecision::Deny {
                rule: format!(
                    "author-tests phase may not modify implementation sources ({})",
                    path.display()
                ),
            },
            WorkflowPhase::Implement if class == PathClass::TestArtifact => GateDecision::Deny {
                rule: format!(
                    "implement phase may not modify test artifacts ({})",
                    path.display()
                ),
            },
            WorkflowPhase::Validate if class != PathClass::StateNamespace => GateDecision::Deny {
                rule: format!(
                    "validate phase may only write state, evidence, and reports ({})",
                    path.display()
                ),
            },
            _ => GateDecision::Allow,
        }
    }
}
