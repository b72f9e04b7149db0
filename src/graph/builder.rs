//! Builder for the story dependency graph.
//!
//! Takes the declared story list and constructs a validated directed
//! acyclic graph. Validation failures are `GraphError`s and abort the
//! pipeline before it starts.

use std::collections::{HashMap, HashSet};

use crate::errors::GraphError;
use crate::story::StorySpec;

/// Index into the story list.
pub type StoryIndex = usize;

/// A validated directed acyclic graph of stories.
#[derive(Debug)]
pub struct StoryGraph {
    /// Stories in declared order
    stories: Vec<StorySpec>,
    /// Map from story id to index
    index_map: HashMap<String, StoryIndex>,
    /// index -> stories that depend on it
    forward_edges: Vec<Vec<StoryIndex>>,
    /// index -> stories it depends on
    reverse_edges: Vec<Vec<StoryIndex>>,
}

impl StoryGraph {
    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn get_story(&self, index: StoryIndex) -> Option<&StorySpec> {
        self.stories.get(index)
    }

    pub fn get_story_by_id(&self, id: &str) -> Option<&StorySpec> {
        self.index_map.get(id).and_then(|&i| self.stories.get(i))
    }

    pub fn get_index(&self, id: &str) -> Option<StoryIndex> {
        self.index_map.get(id).copied()
    }

    /// All stories in declared order.
    pub fn stories(&self) -> &[StorySpec] {
        &self.stories
    }

    /// Stories that depend on the given story.
    pub fn dependents(&self, index: StoryIndex) -> &[StoryIndex] {
        self.forward_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Stories the given story depends on.
    pub fn dependencies(&self, index: StoryIndex) -> &[StoryIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Check if all dependencies of a story are in the completed set.
    pub fn dependencies_satisfied(
        &self,
        index: StoryIndex,
        completed: &HashSet<String>,
    ) -> bool {
        self.dependencies(index)
            .iter()
            .all(|&dep| completed.contains(&self.stories[dep].id))
    }
}

/// Builder for story graphs.
pub struct StoryGraphBuilder {
    stories: Vec<StorySpec>,
}

impl StoryGraphBuilder {
    pub fn new(stories: Vec<StorySpec>) -> Self {
        Self { stories }
    }

    /// Build the story graph.
    ///
    /// Validates the structure:
    /// - No duplicate story ids
    /// - All dependencies must reference existing stories
    /// - No cycles
    pub fn build(self) -> Result<StoryGraph, GraphError> {
        let mut index_map = HashMap::new();
        for (i, story) in self.stories.iter().enumerate() {
            if index_map.contains_key(&story.id) {
                return Err(GraphError::DuplicateStory {
                    id: story.id.clone(),
                });
            }
            index_map.insert(story.id.clone(), i);
        }

        let mut forward_edges: Vec<Vec<StoryIndex>> = vec![Vec::new(); self.stories.len()];
        let mut reverse_edges: Vec<Vec<StoryIndex>> = vec![Vec::new(); self.stories.len()];

        for (to_idx, story) in self.stories.iter().enumerate() {
            for dep in &story.depends_on {
                let from_idx =
                    *index_map
                        .get(dep)
                        .ok_or_else(|| GraphError::UnknownDependency {
                            story: story.id.clone(),
                            dependency: dep.clone(),
                        })?;

                forward_edges[from_idx].push(to_idx);
                reverse_edges[to_idx].push(from_idx);
            }
        }

        let graph = StoryGraph {
            stories: self.stories,
            index_map,
            forward_edges,
            reverse_edges,
        };

        Self::validate_no_cycles(&graph)?;

        Ok(graph)
    }

    /// Cycle detection via Kahn's algorithm: if topological processing
    /// cannot consume every node, the leftovers are on a cycle.
    fn validate_no_cycles(graph: &StoryGraph) -> Result<(), GraphError> {
        let mut in_degree: Vec<usize> = graph.reverse_edges.iter().map(|deps| deps.len()).collect();

        let mut queue: Vec<StoryIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut processed = 0;

        while let Some(node) = queue.pop() {
            processed += 1;

            for &dependent in graph.dependents(node) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if processed != graph.len() {
            let involved: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .filter_map(|(i, _)| graph.get_story(i).map(|s| s.id.clone()))
                .collect();

            return Err(GraphError::DependencyCycle { involved });
        }

        Ok(())
    }
}
