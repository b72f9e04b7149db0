//! Ready-story scheduling over the dependency graph.
//!
//! Iterates stories in declared order and picks those whose dependencies
//! have all completed. Stories with disjoint dependency sets are eligible
//! concurrently, so the batch form returns every currently-ready story for
//! the external orchestrator to fan out in parallel.

use std::collections::HashSet;

use crate::graph::StoryGraph;
use crate::story::StorySpec;

pub struct ReadyScheduler<'a> {
    graph: &'a StoryGraph,
}

impl<'a> ReadyScheduler<'a> {
    pub fn new(graph: &'a StoryGraph) -> Self {
        Self { graph }
    }

    /// The first story, in declared order, that has not completed and whose
    /// dependencies have all completed. `None` means either everything is
    /// done or nothing can proceed until the caller completes more work.
    pub fn next_ready(&self, completed: &HashSet<String>) -> Option<&'a StorySpec> {
        self.ready_set(completed).into_iter().next()
    }

    /// Every story currently ready to be worked, in declared order.
    pub fn ready_set(&self, completed: &HashSet<String>) -> Vec<&'a StorySpec> {
        self.graph
            .stories()
            .iter()
            .enumerate()
            .filter(|(_, story)| !completed.contains(&story.id))
            .filter(|(i, _)| self.graph.dependencies_satisfied(*i, completed))
            .map(|(_, story)| story)
            .collect()
    }

    /// True when every story in the graph has completed.
    pub fn all_complete(&self, completed: &HashSet<String>) -> bool {
        self.graph
            .stories()
            .iter()
            .all(|s| completed.contains(&s.id))
    }
}
