//! Task graph (directed acyclic graph) for dependency management.
//!
//! `TaskGraph` stores tasks as petgraph nodes in insertion order and mirrors
//! every `Task::dependencies` entry as an edge `dependency -> dependent`.
//! The two representations are kept consistent by `add_task` and
//! `add_dependency`; `validate` rejects dangling ids and cycles before a run.

use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::{Error, Result, StructuralError};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// JSON-serializable form of a graph, used for audit and export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskGraphSnapshot {
    pub tasks: Vec<Task>,
    /// `(from, to)`: `to` depends on `from`.
    pub edges: Vec<(TaskId, TaskId)>,
}

/// The task dependency graph for one run.
#[derive(Clone, Serialize, Deserialize)]
#[serde(into = "TaskGraphSnapshot", try_from = "TaskGraphSnapshot")]
pub struct TaskGraph {
    /// The underlying directed graph. Node indices follow insertion order.
    graph: DiGraph<Task, ()>,
    /// Index mapping from TaskId to NodeIndex for fast lookups.
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            task_index: HashMap::new(),
        }
    }

    /// Append a task to the graph.
    ///
    /// Dependencies listed on the task become edges for every id already in
    /// the graph; ids added later are linked when they arrive, so tasks may be
    /// added in any order.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateTask`] if the id is already present.
    pub fn add_task(&mut self, task: Task) -> Result<NodeIndex> {
        if self.task_index.contains_key(&task.id) {
            return Err(Error::DuplicateTask(task.id));
        }

        let id = task.id;
        let dependencies = task.dependencies.clone();
        let index = self.graph.add_node(task);
        self.task_index.insert(id, index);

        for dep in dependencies {
            if let Some(&dep_index) = self.task_index.get(&dep) {
                self.graph.update_edge(dep_index, index, ());
            }
        }

        let dependents: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&other| other != index && self.graph[other].dependencies.contains(&id))
            .collect();
        for dependent in dependents {
            self.graph.update_edge(index, dependent, ());
        }

        Ok(index)
    }

    /// Record that `to` depends on `from`.
    ///
    /// # Errors
    /// - [`Error::UnknownTask`] if either task is absent
    /// - [`Error::Structural`] if the edge would close a cycle (the graph is
    ///   left unchanged)
    pub fn add_dependency(&mut self, from: &TaskId, to: &TaskId) -> Result<()> {
        let from_index = *self
            .task_index
            .get(from)
            .ok_or(Error::UnknownTask(*from))?;
        let to_index = *self.task_index.get(to).ok_or(Error::UnknownTask(*to))?;

        if self.graph.find_edge(from_index, to_index).is_some() {
            return Ok(());
        }

        // Temporarily add the edge to check for cycles
        let edge = self.graph.add_edge(from_index, to_index, ());
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(StructuralError::Cycle(*to).into());
        }

        let task = &mut self.graph[to_index];
        if !task.dependencies.contains(from) {
            task.dependencies.push(*from);
        }
        Ok(())
    }

    /// Check that every dependency id exists and the relation is acyclic.
    pub fn validate(&self) -> Result<()> {
        for task in self.graph.node_weights() {
            if let Some(missing) = task
                .dependencies
                .iter()
                .find(|dep| !self.task_index.contains_key(dep))
            {
                return Err(StructuralError::DanglingDependency {
                    task: task.id,
                    dependency: *missing,
                }
                .into());
            }
        }

        toposort(&self.graph, None)
            .map(|_| ())
            .map_err(|cycle| StructuralError::Cycle(self.graph[cycle.node_id()].id).into())
    }

    /// Get a reference to a task by its ID.
    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.task_index
            .get(id)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Get a mutable reference to a task by its ID.
    ///
    /// Callers should only touch `status` and timestamps; dependencies are
    /// owned by the graph.
    pub fn get_task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        let index = *self.task_index.get(id)?;
        self.graph.node_weight_mut(index)
    }

    /// Get the number of tasks in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependency edges in the graph.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if `to` depends on `from`.
    pub fn has_dependency(&self, from: &TaskId, to: &TaskId) -> bool {
        match (self.task_index.get(from), self.task_index.get(to)) {
            (Some(&from_idx), Some(&to_idx)) => self.graph.find_edge(from_idx, to_idx).is_some(),
            _ => false,
        }
    }

    /// Get all tasks that the given task depends on (predecessors).
    pub fn get_dependencies(&self, id: &TaskId) -> Vec<&Task> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Get all tasks that depend on the given task (successors).
    pub fn get_dependents(&self, id: &TaskId) -> Vec<&Task> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &TaskId, direction: Direction) -> Vec<&Task> {
        match self.task_index.get(id) {
            Some(&index) => self
                .graph
                .neighbors_directed(index, direction)
                .filter_map(|neighbor| self.graph.node_weight(neighbor))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All tasks in insertion order.
    pub fn all_tasks(&self) -> Vec<&Task> {
        self.graph.node_weights().collect()
    }

    /// All edges as `(from, to)` pairs.
    pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| (self.graph[from].id, self.graph[to].id))
            .collect()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Check if the graph contains a task.
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    // ========== Scheduling Operations ==========

    /// Get all pending tasks whose dependencies are all in `completed`.
    ///
    /// The result is sorted by priority, highest first. The sort is stable,
    /// so equal priorities keep insertion order.
    pub fn get_ready_tasks<'a>(&'a self, completed: &HashSet<TaskId>) -> Vec<&'a Task> {
        let mut ready: Vec<&Task> = self
            .graph
            .node_weights()
            .filter(|task| task.is_pending() && !completed.contains(&task.id))
            .filter(|task| task.dependencies.iter().all(|dep| completed.contains(dep)))
            .collect();
        ready.sort_by_key(|task| std::cmp::Reverse(task.priority));
        ready
    }

    /// Check if every task in the graph is in the completed set.
    pub fn is_complete(&self, completed: &HashSet<TaskId>) -> bool {
        self.task_index.keys().all(|id| completed.contains(id))
    }

    /// Ids of tasks still waiting to be dispatched, in insertion order.
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.graph
            .node_weights()
            .filter(|task| task.is_pending())
            .map(|task| task.id)
            .collect()
    }

    /// Count tasks currently in the given status.
    pub fn count_status(&self, status: &TaskStatus) -> usize {
        self.graph
            .node_weights()
            .filter(|task| std::mem::discriminant(&task.status) == std::mem::discriminant(status))
            .count()
    }

    /// Get tasks in topological order (respecting dependencies).
    ///
    /// # Errors
    /// Returns a structural error if the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<&Task>> {
        let sorted = toposort(&self.graph, None)
            .map_err(|cycle| Error::from(StructuralError::Cycle(self.graph[cycle.node_id()].id)))?;

        Ok(sorted
            .into_iter()
            .filter_map(|index| self.graph.node_weight(index))
            .collect())
    }

    pub fn snapshot(&self) -> TaskGraphSnapshot {
        TaskGraphSnapshot {
            tasks: self.graph.node_weights().cloned().collect(),
            edges: self.edges(),
        }
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl From<TaskGraph> for TaskGraphSnapshot {
    fn from(graph: TaskGraph) -> Self {
        graph.snapshot()
    }
}

impl TryFrom<TaskGraphSnapshot> for TaskGraph {
    type Error = Error;

    fn try_from(snapshot: TaskGraphSnapshot) -> Result<Self> {
        let mut graph = TaskGraph::new();
        for task in snapshot.tasks {
            graph.add_task(task)?;
        }
        for (from, to) in snapshot.edges {
            if !graph.has_dependency(&from, &to) {
                graph.add_dependency(&from, &to)?;
            }
        }
        Ok(graph)
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
