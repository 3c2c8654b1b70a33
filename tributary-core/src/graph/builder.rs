//! Graph Builder
//!
//! Turns a terminal node into an executable [`Graph`].
//!
//! # Algorithm
//!
//! A depth-first walk from the terminal node over dependency edges, with
//! three visitation states per node:
//!
//! 1. Unvisited: not yet reached.
//! 2. In progress: on the current walk path. Reaching it again means the
//!    node depends on itself, so the build fails with `CycleDetected`.
//! 3. Done: its subtree is complete and it has a position in the order.
//!
//! Nodes are appended in post-order, so every node lands after all of its
//! dependencies and a shared dependency is placed exactly once. The terminal
//! node is always last.
//!
//! The walk uses an explicit stack, so long chains do not recurse.
//!
//! The walk only reads the flow. Once it succeeds, the nodes are moved out of
//! the flow into the graph, so a graph never shares a node with another one.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use super::flow::Flow;
use super::node::{Node, NodeId};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done(usize),
}

/// A node placed in evaluation order.
pub(crate) struct GraphNode<T> {
    pub(crate) name: Arc<str>,
    /// Positions of the dependencies in evaluation order.
    pub(crate) inputs: SmallVec<[usize; 4]>,
    pub(crate) kind: Box<dyn Node<T>>,
}

/// The resolved, ordered set of nodes reachable from a terminal node.
///
/// A graph owns its nodes and snapshots the edges between them: edges added
/// to the flow afterwards are not seen.
pub struct Graph<T> {
    nodes: IndexMap<NodeId, GraphNode<T>>,
    terminal: NodeId,
}

/// Builds graphs from a flow.
pub struct GraphBuilder<'a, T> {
    flow: &'a mut Flow<T>,
}

impl<'a, T> GraphBuilder<'a, T> {
    /// Create a builder over the given flow.
    pub fn new(flow: &'a mut Flow<T>) -> Self {
        Self { flow }
    }

    /// Build the graph rooted at `terminal`, moving its nodes out of the flow.
    ///
    /// Either returns a complete graph or an error; on error the flow is left
    /// untouched.
    pub fn build(self, terminal: NodeId) -> Result<Graph<T>> {
        let order = self.resolve(terminal)?;

        let mut nodes: IndexMap<NodeId, GraphNode<T>> = IndexMap::with_capacity(order.len());
        for (id, inputs) in order {
            let entry = self.flow.entry_mut(id)?;
            let Some(kind) = entry.kind.take() else {
                return Err(EngineError::NodeInUse {
                    node: id,
                    name: entry.name.to_string(),
                });
            };
            nodes.insert(
                id,
                GraphNode {
                    name: Arc::clone(&entry.name),
                    inputs,
                    kind,
                },
            );
        }

        debug!(terminal = %terminal, nodes = nodes.len(), "built graph");
        Ok(Graph { nodes, terminal })
    }

    /// Walk the flow from `terminal` and return the reachable nodes in
    /// evaluation order, each with the positions of its inputs.
    ///
    /// Only reads the flow, so a failed build takes nothing.
    fn resolve(&self, terminal: NodeId) -> Result<Vec<(NodeId, SmallVec<[usize; 4]>)>> {
        self.available(terminal)?;

        let mut state: HashMap<NodeId, Visit> = HashMap::new();
        let mut order: Vec<(NodeId, SmallVec<[usize; 4]>)> = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(terminal, 0)];
        state.insert(terminal, Visit::InProgress);

        while let Some(frame) = stack.last_mut() {
            let id = frame.0;
            let entry = self.flow.entry(id)?;

            if let Some(&dep) = entry.dependencies.get(frame.1) {
                frame.1 += 1;
                match state.get(&dep) {
                    Some(Visit::InProgress) => return Err(self.cycle_at(dep)),
                    Some(Visit::Done(_)) => {}
                    None => {
                        self.available(dep)?;
                        state.insert(dep, Visit::InProgress);
                        stack.push((dep, 0));
                    }
                }
                continue;
            }

            stack.pop();
            let inputs = entry
                .dependencies
                .iter()
                .map(|dep| match state.get(dep) {
                    Some(Visit::Done(position)) => Ok(*position),
                    _ => Err(self.cycle_at(*dep)),
                })
                .collect::<Result<SmallVec<[usize; 4]>>>()?;

            state.insert(id, Visit::Done(order.len()));
            order.push((id, inputs));
        }

        Ok(order)
    }

    /// Fails if the node is unknown or already owned by a graph.
    fn available(&self, id: NodeId) -> Result<()> {
        let entry = self.flow.entry(id)?;
        if entry.kind.is_none() {
            return Err(EngineError::NodeInUse {
                node: id,
                name: entry.name.to_string(),
            });
        }
        Ok(())
    }

    fn cycle_at(&self, node: NodeId) -> EngineError {
        EngineError::CycleDetected {
            node,
            name: self.flow.name(node).unwrap_or_default().to_string(),
        }
    }
}

impl<T> Graph<T> {
    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A built graph always contains at least its terminal node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The terminal node: last in evaluation order.
    pub fn terminal(&self) -> NodeId {
        self.terminal
    }

    /// Node ids in evaluation order.
    pub fn order(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Position of a node in evaluation order.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&id)
    }

    /// Check if the node is part of the graph.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get a node's name.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|node| &*node.name)
    }

    /// Get the dependencies of a node as captured at build time.
    pub fn dependencies(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let node = self.nodes.get(&id)?;
        node.inputs
            .iter()
            .map(|&position| self.nodes.get_index(position).map(|(dep, _)| *dep))
            .collect()
    }

    /// Render the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph tributary {\n");
        let terminal = self.terminal();
        for (id, node) in &self.nodes {
            let shape = if *id == terminal { "doublecircle" } else { "box" };
            let _ = writeln!(
                out,
                "    n{} [label=\"{}\", shape={}];",
                id.raw(),
                escape_label(&node.name),
                shape
            );
        }
        for (id, node) in &self.nodes {
            for &position in &node.inputs {
                if let Some((dep, _)) = self.nodes.get_index(position) {
                    let _ = writeln!(out, "    n{} -> n{};", dep.raw(), id.raw());
                }
            }
        }
        out.push_str("}\n");
        out
    }

    pub(crate) fn node_at_mut(&mut self, position: usize) -> Option<(NodeId, &mut GraphNode<T>)> {
        self.nodes.get_index_mut(position).map(|(id, node)| (*id, node))
    }
}

/// Escape a node name for use inside a quoted DOT label.
fn escape_label(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

impl<T> fmt::Debug for Graph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|(id, node)| (id, &*node.name)))
            .finish()
    }
}
