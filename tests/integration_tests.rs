//! Integration tests for Warden
//!
//! These tests drive the CLI end to end against temporary projects.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use warden::evidence::{EvidenceArtifact, EvidenceResult};

/// Helper to create a warden Command
fn warden() -> Command {
    cargo_bin_cmd!("warden")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a warden project in a temp directory
fn init_project(dir: &TempDir) {
    warden()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

/// Overwrite the story graph with the given stories JSON fragment.
fn write_stories(dir: &TempDir, stories_json: &str) {
    let path = dir.path().join(".warden/stories.json");
    let content = format!(
        r#"{{"generated_at": "2026-07-02T12:00:00Z", "stories": {}}}"#,
        stories_json
    );
    fs::write(path, content).unwrap();
}

/// Two stories, `b` depending on `a`.
fn write_two_stories(dir: &TempDir) {
    write_stories(
        dir,
        r#"[
            {"id": "a", "title": "Story A", "depends_on": [], "acceptance_criteria": ["A works"]},
            {"id": "b", "title": "Story B", "depends_on": ["a"]}
        ]"#,
    );
}

fn start_workflow(dir: &TempDir) {
    warden()
        .current_dir(dir.path())
        .arg("start")
        .assert()
        .success();
}

/// Write a sealed PASS evidence artifact and return its path.
fn write_evidence(dir: &TempDir, story: &str, validator: &str, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(".warden/evidence").join(name);
    EvidenceArtifact::new(story, validator, EvidenceResult::Pass, vec![])
        .seal()
        .write(&path)
        .unwrap();
    path
}

/// Record all five required checkpoints for a story, PASS everywhere.
fn record_all_checkpoints(dir: &TempDir, story: &str) {
    for kind in ["tests-authored", "build-complete", "cleanup-complete"] {
        warden()
            .current_dir(dir.path())
            .args(["checkpoint", story, kind, "pass"])
            .assert()
            .success();
    }

    let tests_evidence = write_evidence(dir, story, "test-runner", &format!("{story}-tests.json"));
    let analysis_evidence = write_evidence(dir, story, "analyzer", &format!("{story}-analysis.json"));

    warden()
        .current_dir(dir.path())
        .args(["checkpoint", story, "tests-verified", "pass", "--evidence"])
        .arg(&tests_evidence)
        .assert()
        .success();
    warden()
        .current_dir(dir.path())
        .args(["checkpoint", story, "analysis-verified", "pass", "--evidence"])
        .arg(&analysis_evidence)
        .assert()
        .success();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_warden_help() {
        warden().arg("--help").assert().success();
    }

    #[test]
    fn test_warden_version() {
        warden().arg("--version").assert().success();
    }

    #[test]
    fn test_warden_init_creates_structure() {
        let dir = create_temp_project();

        warden()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized warden project"));

        assert!(dir.path().join(".warden").exists());
        assert!(dir.path().join(".warden/stories").exists());
        assert!(dir.path().join(".warden/evidence").exists());
        assert!(dir.path().join(".warden/conflicts").exists());
        assert!(dir.path().join(".warden/warden.toml").exists());
        assert!(dir.path().join(".warden/stories.json").exists());
    }

    #[test]
    fn test_warden_init_idempotent() {
        let dir = create_temp_project();

        warden().current_dir(dir.path()).arg("init").assert().success();
        warden().current_dir(dir.path()).arg("init").assert().success();
    }
}

// =============================================================================
// Workflow Lifecycle Tests
// =============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn test_start_requires_init() {
        let dir = create_temp_project();

        warden()
            .current_dir(dir.path())
            .arg("start")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not initialized"));
    }

    #[test]
    fn test_start_then_status() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);

        warden()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("active"))
            .stdout(predicate::str::contains("Story A"))
            .stdout(predicate::str::contains("0/2 stories complete"));
    }

    #[test]
    fn test_start_twice_is_refused() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);

        warden()
            .current_dir(dir.path())
            .arg("start")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already active"));
    }

    #[test]
    fn test_start_refuses_dependency_cycle() {
        let dir = create_temp_project();
        init_project(&dir);
        write_stories(
            &dir,
            r#"[
                {"id": "a", "title": "A", "depends_on": ["b"]},
                {"id": "b", "title": "B", "depends_on": ["a"]}
            ]"#,
        );

        warden()
            .current_dir(dir.path())
            .arg("start")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cycle"));
    }

    #[test]
    fn test_stop_blocked_lists_pending_stories() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);

        warden()
            .current_dir(dir.path())
            .arg("stop")
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Exit blocked"))
            .stdout(predicate::str::contains("a"))
            .stdout(predicate::str::contains("b"));

        // Still active afterwards
        warden()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("active"));
    }

    #[test]
    fn test_stop_force_is_a_degraded_exit() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);

        warden()
            .current_dir(dir.path())
            .args(["stop", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Degraded exit"));

        warden()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("inactive"));
    }
}

// =============================================================================
// Phase Gate Tests
// =============================================================================

mod gating {
    use super::*;

    fn set_phase(dir: &TempDir, phase: &str) {
        warden()
            .current_dir(dir.path())
            .args(["phase", phase])
            .assert()
            .success();
    }

    #[test]
    fn test_gate_requires_active_workflow() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);

        warden()
            .current_dir(dir.path())
            .args(["gate", "src/main.rs"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not active"));
    }

    #[test]
    fn test_author_tests_denies_source_edits() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);
        set_phase(&dir, "author-tests");

        warden()
            .current_dir(dir.path())
            .args(["gate", "src/auth/login.rs"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("DENY"));

        warden()
            .current_dir(dir.path())
            .args(["gate", "tests/login_test.rs"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ALLOW"));
    }

    #[test]
    fn test_implement_denies_test_edits() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);
        set_phase(&dir, "implement");

        warden()
            .current_dir(dir.path())
            .args(["gate", "tests/login_test.rs"])
            .assert()
            .code(1);

        warden()
            .current_dir(dir.path())
            .args(["gate", "src/auth/login.rs"])
            .assert()
            .success();
    }

    #[test]
    fn test_validate_only_allows_state_namespace() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);
        set_phase(&dir, "validate");

        warden()
            .current_dir(dir.path())
            .args(["gate", "src/auth/login.rs"])
            .assert()
            .code(1);

        warden()
            .current_dir(dir.path())
            .args(["gate", ".warden/evidence/tests.json"])
            .assert()
            .success();
    }
}

// =============================================================================
// Checkpoint Tests
// =============================================================================

mod checkpoints {
    use super::*;

    fn setup() -> TempDir {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);
        dir
    }

    #[test]
    fn test_self_report_checkpoint_recorded() {
        let dir = setup();

        warden()
            .current_dir(dir.path())
            .args(["checkpoint", "a", "tests-authored", "pass"])
            .assert()
            .success()
            .stdout(predicate::str::contains("PASS"));
    }

    #[test]
    fn test_verified_checkpoint_requires_evidence() {
        let dir = setup();

        warden()
            .current_dir(dir.path())
            .args(["checkpoint", "a", "tests-verified", "pass"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("requires an evidence artifact"));
    }

    #[test]
    fn test_verified_checkpoint_with_sealed_evidence() {
        let dir = setup();
        let evidence = write_evidence(&dir, "a", "test-runner", "a-tests.json");

        warden()
            .current_dir(dir.path())
            .args(["checkpoint", "a", "tests-verified", "pass", "--evidence"])
            .arg(&evidence)
            .assert()
            .success()
            .stdout(predicate::str::contains("PASS"));
    }

    #[test]
    fn test_tampered_evidence_is_refused() {
        let dir = setup();
        let evidence = write_evidence(&dir, "a", "test-runner", "a-tests.json");

        // Hand-edit the artifact after the validator wrote it
        let content = fs::read_to_string(&evidence).unwrap();
        fs::write(&evidence, content.replace("test-runner", "trust-me")).unwrap();

        warden()
            .current_dir(dir.path())
            .args(["checkpoint", "a", "tests-verified", "pass", "--evidence"])
            .arg(&evidence)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("integrity check"));
    }

    #[test]
    fn test_unknown_story_is_an_error() {
        let dir = setup();

        warden()
            .current_dir(dir.path())
            .args(["checkpoint", "ghost", "tests-authored", "pass"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown story"));
    }
}

// =============================================================================
// Scheduling and Completion Tests
// =============================================================================

mod completion {
    use super::*;

    fn setup() -> TempDir {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);
        dir
    }

    #[test]
    fn test_complete_blocked_without_checkpoints() {
        let dir = setup();

        warden()
            .current_dir(dir.path())
            .args(["complete", "a"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Completion blocked"))
            .stdout(predicate::str::contains("tests-authored"));
    }

    #[test]
    fn test_next_respects_dependency_order() {
        let dir = setup();

        // Only a is ready at the start
        warden()
            .current_dir(dir.path())
            .args(["next", "--batch"])
            .assert()
            .success()
            .stdout(predicate::str::diff("a\n"));

        // Complete a, then b becomes ready
        record_all_checkpoints(&dir, "a");
        warden()
            .current_dir(dir.path())
            .args(["complete", "a"])
            .assert()
            .success();

        warden()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::diff("b\n"));
    }

    #[test]
    fn test_full_lifecycle_to_clean_stop() {
        let dir = setup();

        record_all_checkpoints(&dir, "a");
        warden()
            .current_dir(dir.path())
            .args(["complete", "a"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Completed"));

        record_all_checkpoints(&dir, "b");
        warden()
            .current_dir(dir.path())
            .args(["complete", "b"])
            .assert()
            .success();

        warden()
            .current_dir(dir.path())
            .arg("next")
            .assert()
            .success()
            .stdout(predicate::str::contains("all stories complete"));

        warden()
            .current_dir(dir.path())
            .arg("stop")
            .assert()
            .success()
            .stdout(predicate::str::contains("All stories complete"));
    }

    #[test]
    fn test_dependent_cannot_complete_before_dependency() {
        let dir = setup();

        record_all_checkpoints(&dir, "b");
        warden()
            .current_dir(dir.path())
            .args(["complete", "b"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("depends on 'a'"));
    }
}

// =============================================================================
// Retry Bound Tests
// =============================================================================

mod retries {
    use super::*;

    #[test]
    fn test_fail_escalates_at_the_bound() {
        let dir = create_temp_project();
        init_project(&dir);
        write_two_stories(&dir);
        fs::write(
            dir.path().join(".warden/warden.toml"),
            "[limits]\nmax_iterations = 2\n",
        )
        .unwrap();
        start_workflow(&dir);

        warden()
            .current_dir(dir.path())
            .args(["fail", "a", "--reason", "tests red"])
            .assert()
            .success()
            .stdout(predicate::str::contains("attempt 1/2"));

        warden()
            .current_dir(dir.path())
            .args(["fail", "a", "--reason", "tests still red"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("Escalation required"));

        // Further work on the story is blocked until rollback
        warden()
            .current_dir(dir.path())
            .args(["begin", "a"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("iteration bound"));
    }
}

// =============================================================================
// Snapshot and Rollback Tests (require the git CLI)
// =============================================================================

mod rollback_flow {
    use super::*;

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .current_dir(dir)
            .args(args)
            .status()
            .expect("git must be available for rollback tests");
        assert!(status.success(), "git {:?} failed", args);
    }

    fn setup_git_project() -> TempDir {
        let dir = create_temp_project();
        git(dir.path(), &["init"]);
        git(dir.path(), &["config", "user.name", "test"]);
        git(dir.path(), &["config", "user.email", "test@test.com"]);
        dir
    }

    #[test]
    fn test_begin_rollback_restores_tree_and_emits_conflict() {
        let dir = setup_git_project();
        fs::write(dir.path().join("main.rs"), "fn original() {}\n").unwrap();

        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);

        warden()
            .current_dir(dir.path())
            .args(["begin", "a"])
            .assert()
            .success()
            .stdout(predicate::str::contains("author-tests"));

        // Story work mangles the file, a failure is recorded, then rollback
        fs::write(dir.path().join("main.rs"), "fn broken() {}\n").unwrap();
        warden()
            .current_dir(dir.path())
            .args(["fail", "a", "--reason", "validator rejected"])
            .assert()
            .success();

        warden()
            .current_dir(dir.path())
            .args(["rollback", "a", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("rolled back"));

        let content = fs::read_to_string(dir.path().join("main.rs")).unwrap();
        assert_eq!(content, "fn original() {}\n");

        // Conflict artifact emitted with the failure history
        let conflicts: Vec<_> = fs::read_dir(dir.path().join(".warden/conflicts"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(conflicts.len(), 1);
        let artifact = fs::read_to_string(conflicts[0].path()).unwrap();
        assert!(artifact.contains("validator rejected"));
        assert!(artifact.contains("A works"));

        // Iteration counter is reset; the story can be begun again
        warden()
            .current_dir(dir.path())
            .args(["begin", "a"])
            .assert()
            .success();
    }

    #[test]
    fn test_begin_refuses_unready_story() {
        let dir = setup_git_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);

        warden()
            .current_dir(dir.path())
            .args(["begin", "b"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("waiting on"));
    }

    #[test]
    fn test_rollback_without_snapshot_fails() {
        let dir = setup_git_project();
        init_project(&dir);
        write_two_stories(&dir);
        start_workflow(&dir);

        warden()
            .current_dir(dir.path())
            .args(["rollback", "a", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("manual intervention"));
    }
}
