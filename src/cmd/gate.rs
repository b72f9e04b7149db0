//! Phase gate and advisory scan commands.

use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use warden::advisor;
use warden::config::WardenConfig;
use warden::gate::{GateDecision, PhaseGate};
use warden::init::get_warden_dir;

use super::{open_store, require_active, require_project};

/// Check whether the current phase may mutate a path. Exit code 0 means
/// ALLOW; 1 means DENY, with the violated rule on stdout. A DENY is fatal
/// for this one edit attempt only.
pub fn cmd_gate(project_dir: &Path, path: &Path) -> Result<ExitCode> {
    require_project(project_dir)?;
    let store = open_store(project_dir);
    let state = require_active(&store)?;

    let config = WardenConfig::load(&get_warden_dir(project_dir))?;
    let gate = PhaseGate::new(&config.paths)?;

    match gate.check(state.phase, path) {
        GateDecision::Allow => {
            println!("ALLOW {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        GateDecision::Deny { rule } => {
            println!("{} {}", style("DENY").red().bold(), rule);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Advisory bad-pattern sweep over the given paths. Informational only;
/// findings never affect checkpoints or exit status.
pub fn cmd_advise(project_dir: &Path, paths: &[PathBuf]) -> Result<ExitCode> {
    require_project(project_dir)?;

    let findings = advisor::scan_paths(paths);

    if findings.is_empty() {
        println!("No advisory findings.");
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    for finding in &findings {
        println!(
            "{}:{}: [{}] {}",
            finding.path.display(),
            finding.line,
            style(finding.rule).yellow(),
            finding.excerpt
        );
    }
    println!();
    println!(
        "{} advisory {} (informational only)",
        findings.len(),
        if findings.len() == 1 {
            "finding"
        } else {
            "findings"
        }
    );
    println!();

    Ok(ExitCode::SUCCESS)
}
