//! Tick Scheduler
//!
//! The scheduler drives a built [`Graph`] forward one tick at a time.
//!
//! # Algorithm
//!
//! Each tick:
//!
//! 1. Clear the per-tick cache.
//! 2. Walk the graph in evaluation order. For every node, gather the cached
//!    samples of its dependencies (already computed, thanks to the order)
//!    and call `evaluate` exactly once.
//! 3. Interpret sentinels before caching the result:
//!    - `Repeat` becomes the node's last value, so consumers never see it.
//!    - `End` is remembered; the node is never evaluated again.
//!    - `None` is cached as-is.
//!    If a dependency ended and the node does not tolerate `End`, the node
//!    ends without being evaluated.
//! 4. If the terminal node ended, the run is over.
//!
//! The cache is a vector indexed by evaluation position, so a node with many
//! consumers is computed once and read by position.
//!
//! # States
//!
//! `Running` is the only state that accepts ticks. `Ended`, `Cancelled` and
//! `Faulted` are final.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use super::builder::Graph;
use super::node::{Inputs, NodeId};
use crate::config::RunConfig;
use crate::error::{EngineError, Result};
use crate::sample::Sample;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Ticks may be issued.
    Running,

    /// The terminal node emitted `End`.
    Ended,

    /// Stopped by an external signal or tick limit.
    Cancelled,

    /// A node faulted. The run cannot be resumed.
    Faulted,
}

/// The result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome<T> {
    /// State the run stopped in.
    pub state: RunState,

    /// Number of completed ticks.
    pub ticks: u64,

    /// Last value produced by the terminal node, if it ever produced one.
    pub value: Option<T>,
}

/// Executes ticks over a built graph.
pub struct Scheduler<T> {
    graph: Graph<T>,

    /// Number of completed ticks. Ticks are numbered from 1.
    tick: u64,

    state: RunState,

    /// Resolved samples of the current tick, by evaluation position.
    cache: Vec<Sample<T>>,

    /// Last non-sentinel value of each node, for resolving `Repeat`.
    last_values: Vec<Option<T>>,

    /// Nodes that have emitted `End`.
    ended: Vec<bool>,

    terminal_value: Option<T>,
}

impl<T> Scheduler<T> {
    /// The graph being executed.
    pub fn graph(&self) -> &Graph<T> {
        &self.graph
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Get a node's resolved sample from the most recent tick.
    pub fn sample(&self, id: NodeId) -> Option<&Sample<T>> {
        self.graph
            .position(id)
            .and_then(|position| self.cache.get(position))
    }

    /// Last value produced by the terminal node.
    pub fn last_value(&self) -> Option<&T> {
        self.terminal_value.as_ref()
    }
}

impl<T: Clone> Scheduler<T> {
    /// Create a scheduler for the given graph.
    pub fn new(graph: Graph<T>) -> Self {
        let len = graph.len();
        Self {
            graph,
            tick: 0,
            state: RunState::Running,
            cache: Vec::with_capacity(len),
            last_values: vec![None; len],
            ended: vec![false; len],
            terminal_value: None,
        }
    }

    /// Snapshot of the run.
    pub fn outcome(&self) -> Outcome<T> {
        Outcome {
            state: self.state,
            ticks: self.tick,
            value: self.terminal_value.clone(),
        }
    }

    /// Stop issuing ticks. Has no effect once the run is over.
    pub fn cancel(&mut self) {
        if self.state == RunState::Running {
            debug!(ticks = self.tick, "run cancelled");
            self.state = RunState::Cancelled;
        }
    }

    /// Execute one tick and return the terminal node's sample for it.
    ///
    /// The returned sample is never `Repeat`.
    pub fn tick(&mut self) -> Result<Sample<T>> {
        if self.state != RunState::Running {
            return Err(EngineError::Halted { state: self.state });
        }

        let tick = self.tick + 1;
        trace!(tick, "tick started");
        self.cache.clear();

        for position in 0..self.graph.len() {
            match self.evaluate_at(position, tick) {
                Ok(sample) => self.cache.push(sample),
                Err(err) => {
                    warn!(tick, error = %err, "run faulted");
                    self.state = RunState::Faulted;
                    return Err(err);
                }
            }
        }
        self.tick = tick;

        let result = self.cache.last().cloned().unwrap_or(Sample::End);
        match &result {
            Sample::Value(value) => self.terminal_value = Some(value.clone()),
            Sample::End => {
                debug!(ticks = tick, "run ended");
                self.state = RunState::Ended;
            }
            Sample::None | Sample::Repeat => {}
        }
        Ok(result)
    }

    fn evaluate_at(&mut self, position: usize, tick: u64) -> Result<Sample<T>> {
        let Some((id, node)) = self.graph.node_at_mut(position) else {
            return Ok(Sample::End);
        };

        if self.ended[position] {
            return Ok(Sample::End);
        }

        let inputs: SmallVec<[&Sample<T>; 4]> =
            node.inputs.iter().map(|&input| &self.cache[input]).collect();

        if !node.kind.tolerates_end() && inputs.iter().any(|sample| sample.is_end()) {
            trace!(tick, node = %id, name = %node.name, "upstream ended");
            self.ended[position] = true;
            return Ok(Sample::End);
        }

        let raw = node
            .kind
            .evaluate(tick, Inputs::new(&inputs))
            .map_err(|source| EngineError::EvaluationFault {
                node: id,
                name: node.name.to_string(),
                tick,
                source,
            })?;

        let resolved = match raw {
            Sample::Value(value) => {
                self.last_values[position] = Some(value.clone());
                Sample::Value(value)
            }
            Sample::Repeat => match &self.last_values[position] {
                Some(value) => Sample::Value(value.clone()),
                None => {
                    return Err(EngineError::InvalidSentinelUse {
                        node: id,
                        name: node.name.to_string(),
                        tick,
                        reason: "repeat before any value was produced",
                    })
                }
            },
            Sample::End => {
                self.ended[position] = true;
                Sample::End
            }
            Sample::None => Sample::None,
        };

        trace!(tick, node = %id, name = %node.name, result = %resolved.kind(), "evaluated");
        Ok(resolved)
    }

    /// Tick until the run ends, is cancelled, or faults.
    ///
    /// `cancel` and the configured tick limit are checked between ticks.
    #[instrument(skip_all, fields(terminal = %self.graph.terminal()))]
    pub fn run(&mut self, config: &RunConfig, cancel: Option<&CancellationToken>) -> Result<Outcome<T>> {
        if self.state == RunState::Faulted {
            return Err(EngineError::Halted { state: self.state });
        }

        debug!(nodes = self.graph.len(), "run started");
        while self.state == RunState::Running {
            if self.should_stop(config, cancel) {
                self.cancel();
                break;
            }
            self.tick()?;
        }
        Ok(self.outcome())
    }

    pub(crate) fn should_stop(&self, config: &RunConfig, cancel: Option<&CancellationToken>) -> bool {
        cancel.is_some_and(CancellationToken::is_cancelled)
            || config.max_ticks.is_some_and(|limit| self.tick >= limit)
    }
}
