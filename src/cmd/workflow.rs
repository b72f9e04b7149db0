//! Workflow lifecycle commands: start, stop, status, phase.

use anyhow::Result;
use chrono::Utc;
use console::style;
use std::path::Path;
use std::process::ExitCode;

use warden::auditor::{CompletionAuditor, ExitReadiness};
use warden::config::WardenConfig;
use warden::errors::WorkflowError;
use warden::evidence::EvidenceVerifier;
use warden::init::get_warden_dir;
use warden::state::{WorkflowPhase, WorkflowState};
use warden::story::CheckpointKind;

use super::{completed_set, load_graph, open_store, require_active, require_project};

/// Activate the workflow: load the story graph, refuse cycles, materialize
/// per-story records.
pub fn cmd_start(project_dir: &Path) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);

    let state = store.load_workflow()?;
    if state.active {
        let started_at = state
            .started_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        return Err(WorkflowError::AlreadyActive { started_at }.into());
    }

    // A cycle or bad dependency reference is fatal here, before any work
    let graph = load_graph(project_dir)?;

    for story in graph.stories() {
        let record = store.load_story(&story.id)?;
        store.save_story(&record)?;
    }

    store.save_workflow(&WorkflowState {
        active: true,
        phase: WorkflowPhase::Idle,
        current_story: None,
        started_at: Some(Utc::now()),
    })?;

    println!();
    println!(
        "Workflow started: {} stories loaded, dependency graph validated",
        graph.len()
    );
    println!();

    Ok(ExitCode::SUCCESS)
}

/// Tear the workflow down. Refused while any story has not passed its
/// completion audit, unless forced (a degraded exit, and logged as one).
pub fn cmd_stop(project_dir: &Path, force: bool) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    let mut state = require_active(&store)?;

    let graph = load_graph(project_dir)?;
    let config = WardenConfig::load(&get_warden_dir(project_dir))?;
    let auditor = CompletionAuditor::new(&store, EvidenceVerifier::new(config.freshness_window()));

    match auditor.can_exit(graph.stories())? {
        ExitReadiness::Ready => {
            println!();
            println!("All stories complete. Workflow stopped.");
            println!();
        }
        ExitReadiness::Blocked { pending } => {
            if !force {
                println!();
                println!(
                    "{} {} incomplete {}:",
                    style("Exit blocked:").red().bold(),
                    pending.len(),
                    if pending.len() == 1 { "story" } else { "stories" }
                );
                for id in &pending {
                    println!("  - {}", id);
                }
                println!();
                println!("Complete them or pass --force to exit anyway.");
                println!();
                return Ok(ExitCode::FAILURE);
            }

            tracing::warn!(pending = ?pending, "degraded exit: workflow stopped with incomplete stories");
            println!();
            println!(
                "{} stopping with {} incomplete stories: {:?}",
                style("Degraded exit:").yellow().bold(),
                pending.len(),
                pending
            );
            println!();
        }
    }

    state.active = false;
    state.phase = WorkflowPhase::Idle;
    state.current_story = None;
    store.save_workflow(&state)?;

    Ok(ExitCode::SUCCESS)
}

/// Advance the global phase marker.
pub fn cmd_phase(project_dir: &Path, phase: &str) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    let mut state = require_active(&store)?;

    let phase: WorkflowPhase = phase.parse()?;
    state.phase = phase;
    store.save_workflow(&state)?;

    println!("Phase set to {}", phase);

    Ok(ExitCode::SUCCESS)
}

/// Show workflow state and per-story progress.
pub fn cmd_status(project_dir: &Path) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    let state = store.load_workflow()?;
    let graph = load_graph(project_dir)?;

    println!();
    println!("Warden Workflow Status");
    println!("======================");
    println!();
    println!(
        "Workflow: {}",
        if state.active {
            style("active").green().to_string()
        } else {
            style("inactive").dim().to_string()
        }
    );
    println!("Phase:    {}", state.phase);
    println!(
        "Story:    {}",
        state.current_story.as_deref().unwrap_or("-")
    );
    println!();

    if graph.is_empty() {
        println!("No stories declared.");
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:<16} {:<12} {:<12} {:<6} Title",
        "Story", "Status", "Checkpoints", "Iter"
    );
    println!(
        "{:<16} {:<12} {:<12} {:<6} -----",
        "-----", "------", "-----------", "----"
    );

    let required = CheckpointKind::ALL.len();
    for story in graph.stories() {
        let record = store.load_story(&story.id)?;
        let passed_checkpoints = record
            .checkpoints
            .values()
            .filter(|v| v.is_pass())
            .count();

        let status = if record.passes {
            style("done").green().to_string()
        } else if state.current_story.as_deref() == Some(story.id.as_str()) {
            style("in-progress").cyan().to_string()
        } else {
            style("pending").dim().to_string()
        };

        println!(
            "{:<16} {:<12} {:<12} {:<6} {}",
            story.id,
            status,
            format!("{}/{}", passed_checkpoints, required),
            record.iteration_count,
            story.title
        );
    }

    let completed = completed_set(&store, &graph)?;
    println!();
    println!("{}/{} stories complete", completed.len(), graph.len());
    println!();

    Ok(ExitCode::SUCCESS)
}
