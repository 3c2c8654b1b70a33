//! Dependency Graph
//!
//! This module implements graph construction and tick scheduling.
//!
//! # Overview
//!
//! - A [`Flow`] is the arena nodes are created in. Each node lists its
//!   upstream dependencies by [`NodeId`].
//! - A [`Graph`] is the part of a flow reachable from one terminal node,
//!   resolved into evaluation order.
//! - A [`Scheduler`] drives a graph tick by tick.
//!
//! # Design Decisions
//!
//! 1. Nodes are stored once and referenced by id, so fan-out costs nothing
//!    and per-tick results are cached by position rather than by value.
//!
//! 2. Dependencies are declared on the consumer and kept in order; the
//!    order is the order of `evaluate`'s inputs.
//!
//! 3. A graph snapshots the flow's edges when it is built and takes
//!    ownership of the nodes it reaches. Two graphs never share a node, so
//!    runs cannot observe each other's node state.

mod builder;
mod flow;
mod node;
mod scheduler;

pub use builder::{Graph, GraphBuilder};
pub use flow::Flow;
pub use node::{Inputs, Node, NodeId};
pub use scheduler::{Outcome, RunState, Scheduler};
