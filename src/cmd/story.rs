//! Story-scoped commands: begin, checkpoint, fail, rollback, complete,
//! next, stories.

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use std::path::Path;
use std::process::ExitCode;

use warden::auditor::CompletionAuditor;
use warden::config::WardenConfig;
use warden::errors::WorkflowError;
use warden::evidence::EvidenceVerifier;
use warden::graph::ReadyScheduler;
use warden::guard::IterationGuard;
use warden::init::get_warden_dir;
use warden::ledger::CheckpointLedger;
use warden::rollback::RollbackOrchestrator;
use warden::state::WorkflowPhase;
use warden::story::{CheckpointKind, CheckpointValue};

use super::{completed_set, load_graph, open_store, require_active, require_project, require_story};

/// Claim a story: snapshot the working tree, set it current, enter the
/// author-tests phase.
pub fn cmd_begin(project_dir: &Path, story_id: &str) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    let mut state = require_active(&store)?;
    let graph = load_graph(project_dir)?;
    let spec = require_story(&graph, story_id)?;

    let record = store.load_story(story_id)?;
    if record.passes {
        anyhow::bail!("Story '{}' has already completed", story_id);
    }

    let config = WardenConfig::load(&get_warden_dir(project_dir))?;
    let guard = IterationGuard::new(&store, config.limits.max_iterations);
    if guard.is_exhausted(story_id)? {
        return Err(WorkflowError::MaxIterationsReached {
            story: story_id.to_string(),
            count: store.load_iterations(story_id)?.count,
        }
        .into());
    }

    // Dependency ordering is enforced here as well as in the scheduler
    let completed = completed_set(&store, &graph)?;
    let index = graph
        .get_index(story_id)
        .ok_or_else(|| WorkflowError::UnknownStory {
            id: story_id.to_string(),
        })?;
    if !graph.dependencies_satisfied(index, &completed) {
        let waiting: Vec<&str> = spec
            .depends_on
            .iter()
            .filter(|d| !completed.contains(d.as_str()))
            .map(|d| d.as_str())
            .collect();
        anyhow::bail!(
            "Story '{}' is not ready: waiting on {:?}",
            story_id,
            waiting
        );
    }

    let orchestrator = RollbackOrchestrator::new(&store, project_dir);
    let checkpoint = orchestrator.begin_story(story_id)?;

    state.current_story = Some(story_id.to_string());
    state.phase = WorkflowPhase::AuthorTests;
    store.save_workflow(&state)?;

    println!();
    println!("Working on: {} ({})", spec.id, spec.title);
    println!(
        "  snapshot {} taken; phase is now author-tests",
        &checkpoint.revision[..8]
    );
    println!();

    Ok(ExitCode::SUCCESS)
}

/// Record a checkpoint outcome for a story.
pub fn cmd_checkpoint(
    project_dir: &Path,
    story_id: &str,
    kind: &str,
    outcome: &str,
    reason: Option<&str>,
    evidence: Option<&Path>,
) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    require_active(&store)?;
    let graph = load_graph(project_dir)?;
    require_story(&graph, story_id)?;

    let kind: CheckpointKind = kind.parse()?;
    let claimed = match outcome {
        "pass" => CheckpointValue::Pass,
        "fail" => CheckpointValue::fail(reason.unwrap_or("unspecified")),
        other => anyhow::bail!("Invalid outcome '{}'. Use 'pass' or 'fail'.", other),
    };

    let config = WardenConfig::load(&get_warden_dir(project_dir))?;
    let ledger = CheckpointLedger::new(&store, EvidenceVerifier::new(config.freshness_window()));

    match ledger.record(story_id, kind, claimed, evidence) {
        Ok(written) => {
            println!(
                "Checkpoint {} for '{}' recorded: {}",
                kind,
                story_id,
                written.summary()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!(
                "{} {}",
                style("Checkpoint refused:").red().bold(),
                err
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Record a failed validation attempt. Exits with code 2 once the
/// iteration bound is reached and rollback becomes mandatory.
pub fn cmd_fail(project_dir: &Path, story_id: &str, reason: &str) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    require_active(&store)?;
    let graph = load_graph(project_dir)?;
    require_story(&graph, story_id)?;

    let config = WardenConfig::load(&get_warden_dir(project_dir))?;
    let guard = IterationGuard::new(&store, config.limits.max_iterations);

    let snapshot = store.load_story(story_id)?.checkpoints;
    let outcome = guard.record_failure(story_id, reason, snapshot)?;

    println!(
        "Failure recorded for '{}': attempt {}/{}",
        story_id, outcome.count, config.limits.max_iterations
    );

    if outcome.escalate {
        println!(
            "{} iteration bound reached; run 'warden rollback {}' before any further work",
            style("Escalation required:").red().bold(),
            story_id
        );
        return Ok(ExitCode::from(2));
    }

    Ok(ExitCode::SUCCESS)
}

/// Revert a story to its snapshot and emit the conflict artifact.
pub fn cmd_rollback(project_dir: &Path, story_id: &str, yes: bool) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    let graph = load_graph(project_dir)?;
    let spec = require_story(&graph, story_id)?;

    if !yes {
        let revision = store
            .load_story(story_id)?
            .snapshot
            .map(|s| s.revision[..8].to_string())
            .unwrap_or_else(|| "none".to_string());
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Revert the working tree to snapshot {} and clear all progress for '{}'?",
                revision, story_id
            ))
            .default(false)
            .interact()?;
        if !proceed {
            println!("Rollback aborted.");
            return Ok(ExitCode::FAILURE);
        }
    }

    let orchestrator = RollbackOrchestrator::new(&store, project_dir);
    let report = orchestrator.rollback(spec)?;

    // If the rolled-back story was current, the workflow returns to idle
    let mut state = store.load_workflow()?;
    if state.current_story.as_deref() == Some(story_id) {
        state.current_story = None;
        state.phase = WorkflowPhase::Idle;
        store.save_workflow(&state)?;
    }

    println!();
    println!(
        "Story '{}' rolled back to {}",
        story_id,
        &report.revision[..8]
    );
    println!(
        "Conflict artifact for escalation: {}",
        report.conflict_path.display()
    );
    println!();

    Ok(ExitCode::SUCCESS)
}

/// Run the completion audit and flip the story's passes flag.
pub fn cmd_complete(project_dir: &Path, story_id: &str) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    let mut state = require_active(&store)?;
    let graph = load_graph(project_dir)?;
    let spec = require_story(&graph, story_id)?;

    let config = WardenConfig::load(&get_warden_dir(project_dir))?;
    let auditor = CompletionAuditor::new(&store, EvidenceVerifier::new(config.freshness_window()));

    match auditor.mark_complete(spec) {
        Ok(()) => {
            if state.current_story.as_deref() == Some(story_id) {
                state.current_story = None;
                state.phase = WorkflowPhase::Idle;
                store.save_workflow(&state)?;
            }
            println!(
                "{} story '{}' passed its completion audit",
                style("Completed:").green().bold(),
                story_id
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{} {}", style("Completion blocked:").red().bold(), err);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print the next ready story, or all ready stories with --batch.
pub fn cmd_next(project_dir: &Path, batch: bool) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    require_active(&store)?;
    let graph = load_graph(project_dir)?;

    let completed = completed_set(&store, &graph)?;
    let scheduler = ReadyScheduler::new(&graph);

    let ready = scheduler.ready_set(&completed);
    if ready.is_empty() {
        if scheduler.all_complete(&completed) {
            println!("all stories complete");
        } else {
            println!("no stories ready");
        }
        return Ok(ExitCode::SUCCESS);
    }

    if batch {
        for story in ready {
            println!("{}", story.id);
        }
    } else {
        println!("{}", ready[0].id);
    }

    Ok(ExitCode::SUCCESS)
}

/// List the story graph with completion flags.
pub fn cmd_stories(project_dir: &Path) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    let graph = load_graph(project_dir)?;

    println!();
    println!("{:<16} {:<8} {:<24} Title", "Story", "Done", "Depends on");
    println!("{:<16} {:<8} {:<24} -----", "-----", "----", "----------");

    for story in graph.stories() {
        let record = store.load_story(&story.id)?;
        let deps = if story.depends_on.is_empty() {
            "-".to_string()
        } else {
            story.depends_on.join(", ")
        };
        println!(
            "{:<16} {:<8} {:<24} {}",
            story.id,
            if record.passes { "yes" } else { "no" },
            deps,
            story.title
        );
    }
    println!();

    Ok(ExitCode::SUCCESS)
}
