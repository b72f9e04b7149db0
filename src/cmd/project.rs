//! Project initialization command.

use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;

use warden::init::init_project;

pub fn cmd_init(project_dir: &Path) -> Result<ExitCode> {
    let result = init_project(project_dir)?;

    println!();
    if result.created {
        println!("Initialized warden project");
    } else {
        println!("Warden project already initialized; structure verified");
    }
    println!("  {}", result.warden_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Describe your stories in {}",
        result.warden_dir.join("stories.json").display()
    );
    println!("  2. Run 'warden start' to activate the workflow");
    println!();

    Ok(ExitCode::SUCCESS)
}
