//! Tributary Core
//!
//! A pull-based streaming dataflow engine. Computations are graphs of nodes;
//! the engine drives the graph in discrete ticks, evaluating every node once
//! per tick in dependency order, until the terminal node signals the end of
//! the stream.
//!
//! It provides:
//!
//! - The node contract and the three sentinels (`End`, `None`, `Repeat`)
//! - Graph construction with cycle detection
//! - A tick scheduler with per-tick memoization and sentinel handling
//! - Blocking, stepping, and async run modes
//! - A small catalog of input, calculation, control, and output nodes
//!
//! # Architecture
//!
//! - `sample`: per-tick results and sentinels
//! - `graph`: node arena, graph builder, scheduler
//! - `run`: run entry points
//! - `nodes`: node-kind catalog
//! - `config`: run configuration
//!
//! # Example
//!
//! ```rust
//! use tributary_core::nodes::{Collect, Const, Zip};
//! use tributary_core::{run, Flow, RunState, Sample};
//!
//! let mut flow = Flow::new();
//! let a = flow.add(Const::new(3));
//! let b = flow.add(Const::new(4).times(2));
//! let c = flow.add_with(Zip::new(|a: &i64, b: &i64| a + b), [a, b]).unwrap();
//! let (collect, seen) = Collect::new();
//! let out = flow.add_with(collect, [c]).unwrap();
//!
//! let outcome = run(&mut flow, out, true).unwrap().into_outcome().unwrap();
//! assert_eq!(outcome.state, RunState::Ended);
//! assert_eq!(outcome.value, Some(7));
//! assert_eq!(seen.samples(), vec![Sample::Value(7), Sample::Value(7), Sample::End]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod run;
pub mod sample;

pub use config::RunConfig;
pub use error::{EngineError, NodeError, Result};
pub use graph::{Flow, Graph, Inputs, Node, NodeId, Outcome, RunState, Scheduler};
pub use run::{run, Run, Runner, StepHandle};
pub use sample::{Sample, SampleKind};
pub use tokio_util::sync::CancellationToken;
