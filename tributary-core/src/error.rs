//! Error Types
//!
//! Two layers of errors:
//!
//! - [`NodeError`] is what a node kind returns from `evaluate`.
//! - [`EngineError`] is what graph construction and scheduling surface to the
//!   caller. Node errors are wrapped in [`EngineError::EvaluationFault`]
//!   together with the failing node and tick.

use thiserror::Error;

use crate::graph::NodeId;
use crate::graph::RunState;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while building or running a graph.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A node depends, directly or transitively, on itself.
    #[error("dependency cycle detected at node {name} ({node})")]
    CycleDetected { node: NodeId, name: String },

    /// A node kind failed while evaluating a tick.
    #[error("node {name} ({node}) failed on tick {tick}: {source}")]
    EvaluationFault {
        node: NodeId,
        name: String,
        tick: u64,
        #[source]
        source: NodeError,
    },

    /// A node returned a sentinel the scheduler cannot honour.
    #[error("node {name} ({node}) misused a sentinel on tick {tick}: {reason}")]
    InvalidSentinelUse {
        node: NodeId,
        name: String,
        tick: u64,
        reason: &'static str,
    },

    /// The id does not belong to the flow it was used with.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The node was already moved into another graph.
    #[error("node {name} ({node}) already belongs to a built graph")]
    NodeInUse { node: NodeId, name: String },

    /// A tick was requested from a run that can no longer make progress.
    #[error("run is halted in state {state:?}")]
    Halted { state: RunState },

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors returned by node kinds.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("{0}")]
    Message(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(String),
}

impl NodeError {
    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        NodeError::Message(message.into())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Encode(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for NodeError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        NodeError::Encode(err.to_string())
    }
}

impl EngineError {
    /// The node the error is attributed to, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            EngineError::CycleDetected { node, .. }
            | EngineError::EvaluationFault { node, .. }
            | EngineError::InvalidSentinelUse { node, .. }
            | EngineError::NodeInUse { node, .. } => Some(*node),
            EngineError::UnknownNode(node) => Some(*node),
            EngineError::Halted { .. } | EngineError::Config(_) => None,
        }
    }

    /// The tick the error occurred on, if it happened while running.
    pub fn tick(&self) -> Option<u64> {
        match self {
            EngineError::EvaluationFault { tick, .. }
            | EngineError::InvalidSentinelUse { tick, .. } => Some(*tick),
            _ => None,
        }
    }
}
