//! Run Entry Point
//!
//! Builds a graph from a terminal node and drives it, either to completion
//! or one tick per call.
//!
//! # Modes
//!
//! - Blocking: tick until the terminal node ends, the run is cancelled, or a
//!   node faults. Returns an [`Outcome`].
//! - Stepping: return a [`StepHandle`] that performs exactly one tick per
//!   [`step`](StepHandle::step), for hosts that own the loop.
//! - Async: like blocking, but yields to the tokio runtime between ticks so
//!   a long run does not starve other tasks.
//!
//! # Example
//!
//! ```rust
//! use tributary_core::nodes::{Const, Zip};
//! use tributary_core::{run, Flow, Run};
//!
//! let mut flow = Flow::new();
//! let a = flow.add(Const::new(3).times(2));
//! let b = flow.add(Const::new(4));
//! let c = flow.add_with(Zip::new(|a: &i64, b: &i64| a + b), [a, b]).unwrap();
//!
//! match run(&mut flow, c, true).unwrap() {
//!     Run::Finished(outcome) => assert_eq!(outcome.value, Some(7)),
//!     Run::Stepping(_) => unreachable!(),
//! }
//! ```

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::RunConfig;
use crate::error::Result;
use crate::graph::{Flow, Graph, NodeId, Outcome, RunState, Scheduler};
use crate::sample::Sample;

/// What [`run`] returns, depending on the requested mode.
#[derive(Debug)]
pub enum Run<T> {
    /// The blocking run is over.
    Finished(Outcome<T>),

    /// A handle to step the run manually.
    Stepping(StepHandle<T>),
}

impl<T> Run<T> {
    /// Take the outcome of a blocking run.
    pub fn into_outcome(self) -> Option<Outcome<T>> {
        match self {
            Run::Finished(outcome) => Some(outcome),
            Run::Stepping(_) => None,
        }
    }

    /// Take the step handle of a non-blocking run.
    pub fn into_stepper(self) -> Option<StepHandle<T>> {
        match self {
            Run::Finished(_) => None,
            Run::Stepping(handle) => Some(handle),
        }
    }
}

/// Build the graph rooted at `node` and run it with the default settings.
///
/// With `blocking` set, ticks until the run is over. Otherwise returns a
/// step handle without executing any tick. Either way the graph's nodes move
/// out of `flow`, so each node takes part in exactly one run.
pub fn run<T: Clone>(flow: &mut Flow<T>, node: NodeId, blocking: bool) -> Result<Run<T>> {
    Runner::default().run(flow, node, blocking)
}

/// Runs graphs with a given configuration and cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: RunConfig,
    cancel: Option<CancellationToken>,
}

impl Runner {
    /// Create a runner with the given configuration.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Create a runner configured from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(RunConfig::from_env()?))
    }

    /// Stop blocking and async runs when `token` is cancelled.
    ///
    /// The token is checked between ticks, never during one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The configuration runs use.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Build and run in the requested mode.
    pub fn run<T: Clone>(&self, flow: &mut Flow<T>, node: NodeId, blocking: bool) -> Result<Run<T>> {
        if blocking {
            self.run_blocking(flow, node).map(Run::Finished)
        } else {
            self.stepper(flow, node).map(Run::Stepping)
        }
    }

    /// Tick until the run is over.
    pub fn run_blocking<T: Clone>(&self, flow: &mut Flow<T>, node: NodeId) -> Result<Outcome<T>> {
        let mut scheduler = Scheduler::new(flow.build(node)?);
        scheduler.run(&self.config, self.cancel.as_ref())
    }

    /// Build a graph and return a handle that ticks on demand.
    pub fn stepper<T: Clone>(&self, flow: &mut Flow<T>, node: NodeId) -> Result<StepHandle<T>> {
        Ok(StepHandle::new(flow.build(node)?))
    }

    /// Tick until the run is over, yielding to the runtime between ticks.
    #[instrument(skip_all, fields(terminal = %node))]
    pub async fn run_async<T: Clone>(&self, flow: &mut Flow<T>, node: NodeId) -> Result<Outcome<T>> {
        let mut scheduler = Scheduler::new(flow.build(node)?);
        let every = u64::from(self.config.yield_every.max(1));
        debug!("async run started");

        while scheduler.state() == RunState::Running {
            if scheduler.should_stop(&self.config, self.cancel.as_ref()) {
                scheduler.cancel();
                break;
            }
            scheduler.tick()?;
            if scheduler.ticks() % every == 0 {
                tokio::task::yield_now().await;
            }
        }
        Ok(scheduler.outcome())
    }
}

/// Drives a run one tick at a time.
///
/// Stepping after the run ended keeps returning `End` without ticking.
/// Stepping after a fault or cancellation fails with
/// [`EngineError::Halted`](crate::EngineError::Halted).
pub struct StepHandle<T> {
    scheduler: Scheduler<T>,
}

impl<T: Clone> StepHandle<T> {
    /// Create a handle over a built graph.
    pub fn new(graph: Graph<T>) -> Self {
        Self {
            scheduler: Scheduler::new(graph),
        }
    }

    /// Perform one tick and return the terminal node's sample.
    pub fn step(&mut self) -> Result<Sample<T>> {
        match self.scheduler.state() {
            RunState::Ended => Ok(Sample::End),
            _ => self.scheduler.tick(),
        }
    }

    /// Stop the run. Further steps fail.
    pub fn cancel(&mut self) {
        self.scheduler.cancel();
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.scheduler.state()
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    /// Snapshot of the run so far.
    pub fn outcome(&self) -> Outcome<T> {
        self.scheduler.outcome()
    }

    /// The underlying scheduler.
    pub fn scheduler(&self) -> &Scheduler<T> {
        &self.scheduler
    }
}

impl<T: Clone> Iterator for StepHandle<T> {
    type Item = Result<Sample<T>>;

    /// Yields one sample per tick, up to and including the first `End` or
    /// error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.scheduler.state() != RunState::Running {
            return None;
        }
        Some(self.step())
    }
}

impl<T> std::fmt::Debug for StepHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepHandle")
            .field("graph", self.scheduler.graph())
            .finish_non_exhaustive()
    }
}
