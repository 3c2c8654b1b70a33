//! Node Kinds
//!
//! A small catalog of node kinds written purely against the [`Node`]
//! contract. The scheduler knows nothing about them; anything here could
//! live in a downstream crate.
//!
//! - `input`: sources with no dependencies
//! - `calculation`: pure functions of the current inputs, plus running
//!   aggregates
//! - `control`: routing, gating and holding values
//! - `output`: side-effecting sinks that forward their input
//!
//! [`Node`]: crate::graph::Node

mod calculation;
mod control;
mod input;
mod output;

pub use calculation::{Apply, Count, Reduce, Sum, Zip};
pub use control::{Filter, Hold, If, Merge};
pub use input::{Const, Curve, FromFn};
pub use output::{Collect, Collected, Format, Log, Writer};
