//! Directed dependency graph for column recalculation.
//!
//! Nodes are keyed by string ids (`"sheet.column"`) that are mapped to
//! integer indices on insertion; edges live in per-node adjacency lists.
//! An edge `from -> to` means `from` reads `to`, so a processing order
//! lists `to` first.

use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DagError {
    #[error("duplicate node: {id}")]
    DuplicateNode { id: String },
    #[error("unknown node: {id}")]
    UnknownNode { id: String },
    #[error("circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct DagNode {
    pub id: String,
    pub is_formula: bool,
    pub formula: Option<String>,
    dependencies: Vec<usize>,
    dependents: Vec<usize>,
}

/// Serializable view of one node and its direct neighbours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub id: String,
    pub is_formula: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

#[derive(Debug, Clone, Default)]
pub struct Dag {
    nodes: Vec<DagNode>,
    index: HashMap<String, usize>,
    edges: usize,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&DagNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.iter()
    }

    /// Add a node; ids are unique.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        is_formula: bool,
        formula: Option<String>,
    ) -> Result<(), DagError> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(DagError::DuplicateNode { id });
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(DagNode {
            id,
            is_formula,
            formula,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        });
        Ok(())
    }

    /// Add a dependency edge: `from` reads `to`. Repeated edges are ignored.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), DagError> {
        let from_idx = self.require(from)?;
        let to_idx = self.require(to)?;
        if self.nodes[from_idx].dependencies.contains(&to_idx) {
            return Ok(());
        }
        self.nodes[from_idx].dependencies.push(to_idx);
        self.nodes[to_idx].dependents.push(from_idx);
        self.edges += 1;
        Ok(())
    }

    /// Direct dependencies of a node, in the order they were added.
    pub fn direct_dependencies(&self, id: &str) -> Result<Vec<String>, DagError> {
        let idx = self.require(id)?;
        Ok(self.ids(&self.nodes[idx].dependencies))
    }

    /// Direct dependents of a node, in the order they were added.
    pub fn direct_dependents(&self, id: &str) -> Result<Vec<String>, DagError> {
        let idx = self.require(id)?;
        Ok(self.ids(&self.nodes[idx].dependents))
    }

    /// Every node `id` transitively reads.
    pub fn dependencies_of(&self, id: &str) -> Result<Vec<String>, DagError> {
        let idx = self.require(id)?;
        Ok(self.reachable(idx, |node| &node.dependencies))
    }

    /// Every node that transitively reads `id`.
    pub fn dependents_of(&self, id: &str) -> Result<Vec<String>, DagError> {
        let idx = self.require(id)?;
        Ok(self.reachable(idx, |node| &node.dependents))
    }

    /// Find cycles with a three-color DFS. Each back edge yields one cycle,
    /// reported as a closed path such as `["A", "B", "A"]`.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut color = vec![Color::White; self.nodes.len()];
        let mut cycles = Vec::new();

        for root in 0..self.nodes.len() {
            if color[root] != Color::White {
                continue;
            }
            color[root] = Color::Gray;
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let Some(&child) = self.nodes[node].dependencies.get(frame.1) else {
                    color[node] = Color::Black;
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                match color[child] {
                    Color::White => {
                        color[child] = Color::Gray;
                        stack.push((child, 0));
                    }
                    Color::Gray => {
                        let start = stack
                            .iter()
                            .position(|(idx, _)| *idx == child)
                            .unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|(idx, _)| self.nodes[*idx].id.clone())
                            .collect();
                        path.push(self.nodes[child].id.clone());
                        cycles.push(path);
                    }
                    Color::Black => {}
                }
            }
        }
        cycles
    }

    /// Topological order via Kahn's algorithm: every node appears after all
    /// of its dependencies. Among ready nodes the earliest-added goes first.
    pub fn topological_order(&self) -> Result<Vec<String>, DagError> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.dependencies.len()).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for &dependent in &self.nodes[idx].dependents {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < self.nodes.len() {
            let cycle = self.find_cycles().into_iter().next().unwrap_or_default();
            return Err(DagError::CircularDependency { cycle });
        }
        Ok(self.ids(&order))
    }

    /// Node plus direct neighbours.
    pub fn node_info(&self, id: &str) -> Result<NodeInfo, DagError> {
        let idx = self.require(id)?;
        let node = &self.nodes[idx];
        Ok(NodeInfo {
            id: node.id.clone(),
            is_formula: node.is_formula,
            formula: node.formula.clone(),
            dependencies: self.direct_dependencies(id)?,
            dependents: self.direct_dependents(id)?,
        })
    }

    /// Graphviz rendering; formula nodes are boxes, inputs ellipses.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph dependencies {\n    rankdir=LR;\n");
        for node in &self.nodes {
            let shape = if node.is_formula { "box" } else { "ellipse" };
            let detail = node.formula.as_deref().unwrap_or("Input");
            let _ = writeln!(
                out,
                "    \"{id}\" [shape={shape}, label=\"{id}\\n{detail}\"];",
                id = escape(&node.id),
                detail = escape(detail),
            );
        }
        for node in &self.nodes {
            for &dep in &node.dependencies {
                let _ = writeln!(
                    out,
                    "    \"{}\" -> \"{}\";",
                    escape(&node.id),
                    escape(&self.nodes[dep].id)
                );
            }
        }
        out.push_str("}\n");
        out
    }

    fn require(&self, id: &str) -> Result<usize, DagError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| DagError::UnknownNode { id: id.to_string() })
    }

    fn ids(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&idx| self.nodes[idx].id.clone()).collect()
    }

    fn reachable<F>(&self, start: usize, next: F) -> Vec<String>
    where
        F: Fn(&DagNode) -> &Vec<usize>,
    {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue: VecDeque<usize> = next(&self.nodes[start]).iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            if seen[idx] {
                continue;
            }
            seen[idx] = true;
            queue.extend(next(&self.nodes[idx]).iter().copied().filter(|&n| !seen[n]));
        }
        seen.iter()
            .enumerate()
            .filter(|(_, &visited)| visited)
            .map(|(idx, _)| self.nodes[idx].id.clone())
            .collect()
    }
}

fn escape(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}
