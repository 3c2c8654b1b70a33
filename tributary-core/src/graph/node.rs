//! Graph Nodes
//!
//! This module defines the contract every graph participant implements and
//! the identifiers nodes are tracked by.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::error::NodeError;
use crate::sample::Sample;

/// Unique identifier for a node.
///
/// Ids come from a process-wide counter, so an id handed out by one flow is
/// never valid in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unit of computation in a streaming graph.
///
/// Node kinds never see the graph. The scheduler hands them the
/// current-tick samples of their dependencies, in the order the
/// dependencies were declared, and stores whatever they return.
///
/// A node may keep arbitrary internal state between ticks. Side effects
/// (printing, writing to a sink) are the node kind's business.
pub trait Node<T>: Send {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Produce this node's sample for `tick`.
    ///
    /// `inputs` never contains `Repeat`: the scheduler resolves it before
    /// handing samples downstream. It contains `End` only if
    /// [`tolerates_end`](Node::tolerates_end) returns `true`.
    fn evaluate(&mut self, tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError>;

    /// Whether this node wants to see `End` from its dependencies.
    ///
    /// When `false` (the default), an `End` from any dependency ends this
    /// node too, without calling `evaluate`.
    fn tolerates_end(&self) -> bool {
        false
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// The current-tick samples of a node's dependencies.
#[derive(Debug)]
pub struct Inputs<'a, T> {
    samples: &'a [&'a Sample<T>],
}

impl<T> Clone for Inputs<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Inputs<'_, T> {}

impl<'a, T> Inputs<'a, T> {
    /// Wrap a slice of resolved samples.
    pub fn new(samples: &'a [&'a Sample<T>]) -> Self {
        Self { samples }
    }

    /// An empty input set, as seen by source nodes.
    pub fn empty() -> Self {
        Self { samples: &[] }
    }

    /// Number of dependencies.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the node has no dependencies.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the sample of the `index`-th dependency.
    pub fn get(&self, index: usize) -> Option<&'a Sample<T>> {
        self.samples.get(index).copied()
    }

    /// Get the payload of the `index`-th dependency, if it has one.
    pub fn value(&self, index: usize) -> Option<&'a T> {
        self.get(index).and_then(Sample::value)
    }

    /// Iterate over the dependency samples in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Sample<T>> + 'a {
        self.samples.iter().copied()
    }

    /// Check if any dependency has no value this tick.
    pub fn any_none(&self) -> bool {
        self.iter().any(Sample::is_none)
    }

    /// Check if any dependency has ended.
    pub fn any_end(&self) -> bool {
        self.iter().any(Sample::is_end)
    }

    /// Check if every dependency has ended.
    pub fn all_end(&self) -> bool {
        !self.is_empty() && self.iter().all(Sample::is_end)
    }

    /// All payloads, or `None` if any dependency is a sentinel.
    pub fn values(&self) -> Option<SmallVec<[&'a T; 4]>> {
        self.iter().map(Sample::value).collect()
    }
}
