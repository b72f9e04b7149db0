//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                                        |
//! |------------|---------------------------------------------------------|
//! | `project`  | `Init`                                                  |
//! | `workflow` | `Start`, `Stop`, `Status`, `Phase`                      |
//! | `story`    | `Begin`, `Checkpoint`, `Fail`, `Rollback`, `Complete`, `Next`, `Stories` |
//! | `gate`     | `Gate`, `Advise`                                        |

pub mod gate;
pub mod project;
pub mod story;
pub mod workflow;

pub use gate::{cmd_advise, cmd_gate};
pub use project::cmd_init;
pub use story::{
    cmd_begin, cmd_checkpoint, cmd_complete, cmd_fail, cmd_next, cmd_rollback, cmd_stories,
};
pub use workflow::{cmd_phase, cmd_start, cmd_status, cmd_stop};

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;

use warden::errors::WorkflowError;
use warden::graph::{StoryGraph, StoryGraphBuilder};
use warden::init::{get_warden_dir, has_stories, is_initialized, load_stories};
use warden::state::{StateStore, WorkflowState};
use warden::story::StorySpec;

/// Bail unless `warden init` has been run and a story graph exists.
pub(crate) fn require_project(project_dir: &Path) -> Result<()> {
    if !is_initialized(project_dir) {
        anyhow::bail!("Project is not initialized. Run 'warden init' first.");
    }
    if !has_stories(project_dir) {
        anyhow::bail!(
            "No story graph found. Write {} first.",
            get_warden_dir(project_dir).join("stories.json").display()
        );
    }
    Ok(())
}

pub(crate) fn open_store(project_dir: &Path) -> StateStore {
    StateStore::new(get_warden_dir(project_dir))
}

/// Load and validate the story graph. A cycle or bad reference aborts here.
pub(crate) fn load_graph(project_dir: &Path) -> Result<StoryGraph> {
    let stories_file = load_stories(project_dir)?;
    Ok(StoryGraphBuilder::new(stories_file.stories).build()?)
}

/// Load the workflow state and require it to be active.
pub(crate) fn require_active(store: &StateStore) -> Result<WorkflowState> {
    let state = store.load_workflow()?;
    if !state.active {
        return Err(WorkflowError::Inactive.into());
    }
    Ok(state)
}

/// Look up a story in the graph or fail with its id.
pub(crate) fn require_story<'a>(graph: &'a StoryGraph, id: &str) -> Result<&'a StorySpec> {
    graph
        .get_story_by_id(id)
        .ok_or_else(|| WorkflowError::UnknownStory { id: id.to_string() }.into())
}

/// The set of story ids whose completion audit has passed.
pub(crate) fn completed_set(store: &StateStore, graph: &StoryGraph) -> Result<HashSet<String>> {
    let mut completed = HashSet::new();
    for story in graph.stories() {
        if store.load_story(&story.id)?.passes {
            completed.insert(story.id.clone());
        }
    }
    Ok(completed)
}
