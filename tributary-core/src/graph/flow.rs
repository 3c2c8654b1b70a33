//! Node Arena
//!
//! A [`Flow`] owns every node created by user code, together with the
//! dependency edges between them. Nodes are referenced by [`NodeId`], so a
//! node listed as a dependency by several consumers is stored once.
//!
//! Edges are recorded as ordered dependency lists on the consumer: the order
//! in which dependencies are declared is the order in which their samples
//! reach the consumer's `evaluate`.
//!
//! Building a graph moves the reachable nodes out of the flow, so every graph
//! owns its nodes exclusively and node state never leaks between runs. The
//! edges and names stay behind for inspection.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::builder::{Graph, GraphBuilder};
use super::node::{Node, NodeId};
use crate::error::{EngineError, Result};

/// A node stored in the arena.
pub(crate) struct NodeEntry<T> {
    pub(crate) name: Arc<str>,
    pub(crate) dependencies: SmallVec<[NodeId; 4]>,
    /// `None` once the node has been moved into a graph.
    pub(crate) kind: Option<Box<dyn Node<T>>>,
}

/// The set of nodes a streaming computation is assembled from.
pub struct Flow<T> {
    nodes: IndexMap<NodeId, NodeEntry<T>>,
}

impl<T> Flow<T> {
    /// Create an empty flow.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    /// Add a node with no dependencies.
    pub fn add<N>(&mut self, node: N) -> NodeId
    where
        N: Node<T> + 'static,
    {
        self.insert(Box::new(node), SmallVec::new())
    }

    /// Add a node that consumes the given dependencies, in order.
    ///
    /// Fails with [`EngineError::UnknownNode`] if a dependency is not part of
    /// this flow.
    pub fn add_with<N, I>(&mut self, node: N, dependencies: I) -> Result<NodeId>
    where
        N: Node<T> + 'static,
        I: IntoIterator<Item = NodeId>,
    {
        let dependencies: SmallVec<[NodeId; 4]> = dependencies.into_iter().collect();
        if let Some(missing) = dependencies.iter().find(|id| !self.nodes.contains_key(*id)) {
            return Err(EngineError::UnknownNode(*missing));
        }
        Ok(self.insert(Box::new(node), dependencies))
    }

    fn insert(&mut self, node: Box<dyn Node<T>>, dependencies: SmallVec<[NodeId; 4]>) -> NodeId {
        let id = NodeId::new();
        let name: Arc<str> = Arc::from(node.name());
        self.nodes.insert(
            id,
            NodeEntry {
                name,
                dependencies,
                kind: Some(node),
            },
        );
        id
    }

    /// Append `dependency` to the dependency list of `dependent`.
    ///
    /// Unlike [`add_with`](Flow::add_with), this can close a cycle. Cycles
    /// are reported when a graph is built over them.
    pub fn connect(&mut self, dependent: NodeId, dependency: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&dependency) {
            return Err(EngineError::UnknownNode(dependency));
        }
        self.entry_mut(dependent)?.dependencies.push(dependency);
        Ok(())
    }

    /// Remove every edge from `dependent` to `dependency`.
    ///
    /// Returns whether any edge was removed.
    pub fn disconnect(&mut self, dependent: NodeId, dependency: NodeId) -> Result<bool> {
        let deps = &mut self.entry_mut(dependent)?.dependencies;
        let before = deps.len();
        deps.retain(|id| *id != dependency);
        Ok(deps.len() != before)
    }

    /// Override the name a node is reported under.
    pub fn rename(&mut self, id: NodeId, name: impl AsRef<str>) -> Result<()> {
        self.entry_mut(id)?.name = Arc::from(name.as_ref());
        Ok(())
    }

    /// Get the direct dependencies of a node, in declaration order.
    pub fn dependencies(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.entry(id)?.dependencies)
    }

    /// Get the nodes that list `id` as a dependency.
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, entry)| entry.dependencies.contains(&id))
            .map(|(dependent, _)| *dependent)
            .collect()
    }

    /// Get a node's name.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|entry| &*entry.name)
    }

    /// Check if the node belongs to this flow.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get the total number of nodes in the flow.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the flow has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if the node has been moved into a built graph.
    pub fn is_built(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|entry| entry.kind.is_none())
    }

    /// Iterate over node ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Build the executable graph rooted at `terminal`.
    ///
    /// The reachable nodes move into the graph. Building over a node that
    /// already belongs to another graph fails with
    /// [`EngineError::NodeInUse`].
    pub fn build(&mut self, terminal: NodeId) -> Result<Graph<T>> {
        GraphBuilder::new(self).build(terminal)
    }

    pub(crate) fn entry(&self, id: NodeId) -> Result<&NodeEntry<T>> {
        self.nodes.get(&id).ok_or(EngineError::UnknownNode(id))
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry<T>> {
        self.nodes.get_mut(&id).ok_or(EngineError::UnknownNode(id))
    }
}

impl<T> Default for Flow<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Flow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.nodes
                    .iter()
                    .map(|(id, entry)| (id, (&*entry.name, entry.dependencies.as_slice()))),
            )
            .finish()
    }
}
