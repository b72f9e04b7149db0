//! Story dependency graph: construction, validation, and scheduling.
//!
//! The builder validates the graph once at load time; duplicates, unknown
//! dependencies, and cycles are all fatal configuration errors. The
//! scheduler answers "which story next" as a pure read over the completed
//! set; it never waits, the external caller re-polls.

pub mod builder;
pub mod scheduler;

pub use builder::{StoryGraph, StoryGraphBuilder, StoryIndex};
pub use scheduler::ReadyScheduler;
