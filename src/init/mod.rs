//! Initialization module for warden projects.
//!
//! Provides the `warden init` functionality to create the `.warden/`
//! directory structure in a project:
//!
//! ```text
//! .warden/
//! ├── warden.toml      # Engine configuration (defaults written on init)
//! ├── stories.json     # Story graph source (placeholder)
//! ├── .gitignore       # Keeps engine state out of working-tree snapshots
//! ├── stories/         # Per-story durable records
//! ├── evidence/        # Validator evidence drop-box
//! └── conflicts/       # Conflict artifacts emitted by rollback
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::WardenConfig;
use crate::story::StoriesFile;

/// The name of the warden state directory.
pub const WARDEN_DIR: &str = ".warden";

/// The name of the story graph file inside the warden directory.
pub const STORIES_FILE: &str = "stories.json";

/// Result of initializing a warden project.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created .warden directory
    pub warden_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
}

/// Get the warden directory path for a project.
pub fn get_warden_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(WARDEN_DIR)
}

/// Check if a project has been initialized.
pub fn is_initialized(project_dir: &Path) -> bool {
    get_warden_dir(project_dir).exists()
}

/// Check if a project has a story graph.
pub fn has_stories(project_dir: &Path) -> bool {
    get_warden_dir(project_dir).join(STORIES_FILE).exists()
}

/// Initialize a warden project in the given directory. Idempotent: an
/// existing structure is completed, never overwritten.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let warden_dir = get_warden_dir(project_dir);
    let created = !warden_dir.exists();

    for sub in ["stories", "evidence", "conflicts"] {
        let dir = warden_dir.join(sub);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    // Engine state must never ride along in working-tree snapshots
    let gitignore = warden_dir.join(".gitignore");
    if !gitignore.exists() {
        std::fs::write(&gitignore, "*\n")
            .with_context(|| format!("Failed to write {}", gitignore.display()))?;
    }

    let config_path = warden_dir.join(crate::config::CONFIG_FILE);
    if !config_path.exists() {
        WardenConfig::default().save(&warden_dir)?;
    }

    let stories_path = warden_dir.join(STORIES_FILE);
    if !stories_path.exists() {
        let placeholder = StoriesFile {
            generated_at: chrono::Utc::now().to_rfc3339(),
            stories: Vec::new(),
        };
        placeholder.save(&stories_path)?;
    }

    Ok(InitResult {
        warden_dir,
        created,
    })
}

/// Load the project's story graph source.
pub fn load_stories(project_dir: &Path) -> Result<StoriesFile> {
    StoriesFile::load(&get_warden_dir(project_dir).join(STORIES_FILE))
}
