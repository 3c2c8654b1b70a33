//! Integration Tests for the Tick Engine
//!
//! These tests drive whole graphs through the public entry points and check
//! the engine's ordering, caching, and sentinel guarantees.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use tributary_core::nodes::{
    Apply, Collect, Collected, Const, Curve, Format, FromFn, Hold, Writer, Zip,
};
use tributary_core::{
    run, CancellationToken, EngineError, Flow, Inputs, Node, NodeError, NodeId, RunConfig,
    RunState, Runner, Sample,
};

fn adder(flow: &mut Flow<i64>, a: NodeId, b: NodeId) -> NodeId {
    flow.add_with(Zip::new(|a: &i64, b: &i64| a + b), [a, b]).unwrap()
}

/// Forwards the sum of its inputs and records what it was given.
struct Probe {
    seen: Arc<Mutex<Vec<Vec<Sample<i64>>>>>,
    calls: Arc<AtomicUsize>,
}

impl Probe {
    fn new() -> (Self, Arc<Mutex<Vec<Vec<Sample<i64>>>>>, Arc<AtomicUsize>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Self {
            seen: seen.clone(),
            calls: calls.clone(),
        };
        (probe, seen, calls)
    }
}

impl Node<i64> for Probe {
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, i64>) -> Result<Sample<i64>, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(inputs.iter().cloned().collect());

        // Skip ticks where anything is missing
        Ok(Sample::from_option(
            inputs.values().map(|values| values.into_iter().sum()),
        ))
    }
}

/// A(3) + B(4) yields 7 every tick until a leaf ends.
#[test]
fn constants_add_until_a_leaf_ends() {
    let mut flow = Flow::new();
    let a = flow.add(Const::new(3));
    let b = flow.add(Const::new(4).times(5));
    let c = adder(&mut flow, a, b);
    let (collect, seen) = Collect::new();
    let out = flow.add_with(collect, [c]).unwrap();

    let outcome = run(&mut flow, out, true).unwrap().into_outcome().unwrap();

    assert_eq!(outcome.state, RunState::Ended);
    assert_eq!(outcome.ticks, 6);
    assert_eq!(outcome.value, Some(7));
    assert_eq!(seen.values(), vec![7; 5]);
    assert_eq!(seen.samples().last(), Some(&Sample::End));
}

/// Without an ending leaf, the same graph keeps producing 7.
#[test]
fn constants_add_indefinitely() {
    let mut flow = Flow::new();
    let a = flow.add(Const::new(3));
    let b = flow.add(Const::new(4));
    let c = adder(&mut flow, a, b);

    let mut handle = run(&mut flow, c, false).unwrap().into_stepper().unwrap();
    for _ in 0..1_000 {
        assert_eq!(handle.step().unwrap(), Sample::Value(7));
    }
    assert_eq!(handle.state(), RunState::Running);
}

/// A `None` from a leaf reaches the calculation node unchanged.
#[test]
fn none_reaches_the_consumer() {
    let mut flow = Flow::new();
    let a = flow.add(Curve::new([Sample::Value(1), Sample::None, Sample::Value(3)]));
    let b = flow.add(Const::new(10));
    let (probe, seen, _) = Probe::new();
    let c = flow.add_with(probe, [a, b]).unwrap();

    let mut handle = Runner::default().stepper(&mut flow, c).unwrap();
    let results: Vec<_> = (0..3).map(|_| handle.step().unwrap()).collect();

    assert_eq!(
        results,
        vec![Sample::Value(11), Sample::None, Sample::Value(13)]
    );
    assert_eq!(seen.lock()[1], vec![Sample::None, Sample::Value(10)]);
}

/// A node with several consumers is evaluated once per tick.
#[test]
fn fan_out_is_evaluated_once_per_tick() {
    let mut flow = Flow::new();
    let leaf = flow.add(Const::new(1).times(10));
    let (shared, _, calls) = Probe::new();
    let shared = flow.add_with(shared, [leaf]).unwrap();

    let consumers: Vec<_> = (0..4)
        .map(|_| adder(&mut flow, shared, shared))
        .collect();
    let (sink, _, _) = Probe::new();
    let out = flow.add_with(sink, consumers).unwrap();

    let outcome = run(&mut flow, out, true).unwrap().into_outcome().unwrap();

    assert_eq!(outcome.value, Some(8));
    assert_eq!(outcome.ticks, 11);
    // The leaf ends on tick 11, so the probe is skipped then
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

/// A value followed by two `Repeat`s is observed three times.
#[test]
fn repeat_resolves_to_the_last_value() {
    let mut flow = Flow::new();
    let x = flow.add(Curve::new([
        Sample::Value(42),
        Sample::Repeat,
        Sample::Repeat,
    ]));
    let (left, left_seen, _) = Probe::new();
    let left = flow.add_with(left, [x]).unwrap();
    let (right, right_seen, _) = Probe::new();
    let right = flow.add_with(right, [x]).unwrap();
    let out = adder(&mut flow, left, right);

    let outcome = run(&mut flow, out, true).unwrap().into_outcome().unwrap();

    assert_eq!(outcome.value, Some(84));
    for seen in [left_seen, right_seen] {
        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|inputs| inputs == &vec![Sample::Value(42)]));
    }
}

/// `Hold` carries a value across gaps through `Repeat`.
#[test]
fn hold_fills_gaps() {
    let mut flow = Flow::new();
    let x = flow.add(Curve::new([
        Sample::None,
        Sample::Value(5),
        Sample::None,
        Sample::None,
        Sample::Value(6),
    ]));
    let held = flow.add_with(Hold::new(), [x]).unwrap();
    let (collect, seen) = Collect::new();
    let out = flow.add_with(collect, [held]).unwrap();

    run(&mut flow, out, true).unwrap();

    assert_eq!(
        seen.samples(),
        vec![
            Sample::None,
            Sample::Value(5),
            Sample::Value(5),
            Sample::Value(5),
            Sample::Value(6),
            Sample::End,
        ]
    );
}

/// Once the terminal node ends, no further tick happens.
#[test]
fn end_stops_the_run() {
    let mut flow = Flow::new();
    let (probe, _, calls) = Probe::new();
    let a = flow.add(Curve::from_values([1, 2]));
    let p = flow.add_with(probe, [a]).unwrap();

    let outcome = run(&mut flow, p, true).unwrap().into_outcome().unwrap();

    assert_eq!(outcome.state, RunState::Ended);
    assert_eq!(outcome.ticks, 3);
    assert_eq!(outcome.value, Some(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Stepping N times matches a blocking run cut at N ticks.
#[test]
fn stepping_matches_truncated_blocking_run() {
    fn build() -> (Flow<i64>, NodeId, Collected<i64>) {
        let mut flow = Flow::new();
        let a = flow.add(Curve::new([
            Sample::Value(1),
            Sample::None,
            Sample::Value(2),
            Sample::Repeat,
            Sample::Value(4),
            Sample::None,
        ]));
        let b = flow.add(Const::new(10));
        let c = adder(&mut flow, a, b);
        let (collect, seen) = Collect::new();
        let out = flow.add_with(collect, [c]).unwrap();
        (flow, out, seen)
    }

    for n in 0..9 {
        let (mut flow, out, _) = build();
        let stepped: Vec<_> = Runner::default()
            .stepper(&mut flow, out)
            .unwrap()
            .take(n)
            .collect::<tributary_core::Result<_>>()
            .unwrap();

        let (mut flow, out, seen) = build();
        let outcome = Runner::new(RunConfig::new().with_max_ticks(n as u64))
            .run_blocking(&mut flow, out)
            .unwrap();

        assert_eq!(stepped, seen.samples(), "diverged at {n} ticks");
        assert_eq!(outcome.ticks, stepped.len() as u64);
    }
}

/// A cycle fails the build and nothing is evaluated.
#[test]
fn cycle_is_rejected() {
    let mut flow = Flow::new();
    let (probe, _, calls) = Probe::new();
    let a = flow.add(probe);
    let b = adder(&mut flow, a, a);
    let c = adder(&mut flow, b, a);
    flow.connect(a, c).unwrap();

    let err = run(&mut flow, c, true).unwrap_err();

    assert!(matches!(err, EngineError::CycleDetected { .. }));
    assert!(err.node().is_some_and(|node| [a, b, c].contains(&node)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Every node comes after all of its dependencies.
#[test]
fn evaluation_order_is_topological() {
    // Small linear congruential generator so the graphs are reproducible
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |bound: usize| {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        (state >> 33) as usize % bound
    };

    for _ in 0..50 {
        let mut flow: Flow<i64> = Flow::new();
        let mut ids = vec![flow.add(Const::new(0))];

        for _ in 0..30 {
            let count = 1 + next(3);
            let deps: Vec<_> = (0..count).map(|_| ids[next(ids.len())]).collect();
            let (probe, _, _) = Probe::new();
            ids.push(flow.add_with(probe, deps).unwrap());
        }

        let terminal = *ids.last().unwrap();
        let graph = flow.build(terminal).unwrap();
        let order = graph.order();

        assert_eq!(order.last(), Some(&terminal));
        for id in &order {
            let position = graph.position(*id).unwrap();
            for dependency in graph.dependencies(*id).unwrap() {
                assert!(graph.position(dependency).unwrap() < position);
            }
        }
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A writer sink serializes every value as a JSON line.
#[test]
fn writer_sink_emits_json_lines() {
    let buffer = SharedBuffer::default();

    let mut flow = Flow::new();
    let a = flow.add(Curve::new([Sample::Value(1), Sample::None, Sample::Value(2)]));
    let b = flow.add(Const::new(100));
    let c = adder(&mut flow, a, b);
    let out = flow
        .add_with(Writer::new(buffer.clone(), Format::JsonLines), [c])
        .unwrap();

    let outcome = run(&mut flow, out, true).unwrap().into_outcome().unwrap();

    assert_eq!(outcome.state, RunState::Ended);
    let text = String::from_utf8(buffer.0.lock().clone()).unwrap();
    assert_eq!(text, "101\n102\n");
}

/// A fault surfaces from the step that hit it and halts the handle.
#[test]
fn fault_surfaces_from_the_step() {
    let mut flow = Flow::new();
    let a = flow.add(Curve::from_values([1, 2, 3]));
    let doubled = flow
        .add_with(Apply::new(|v: &i64| v * 2), [a])
        .unwrap();
    // Zip with a single input fails on its first evaluation
    let out = flow
        .add_with(Zip::new(|a: &i64, b: &i64| a + b), [doubled])
        .unwrap();

    let mut handle = Runner::default().stepper(&mut flow, out).unwrap();
    let err = handle.step().unwrap_err();

    assert!(matches!(err, EngineError::EvaluationFault { node, tick: 1, .. } if node == out));
    assert_eq!(handle.state(), RunState::Faulted);
    assert!(matches!(handle.step(), Err(EngineError::Halted { .. })));
}

/// A fault in a blocking run comes back as the run's error.
#[test]
fn blocking_run_surfaces_fault() {
    let mut flow = Flow::new();
    let source = flow.add(FromFn::new(|tick: u64| -> Result<Sample<i64>, NodeError> {
        if tick == 3 {
            Err(NodeError::msg("sensor offline"))
        } else {
            Ok(Sample::Value(tick as i64))
        }
    }));
    let (collect, seen) = Collect::new();
    let out = flow.add_with(collect, [source]).unwrap();

    let err = run(&mut flow, out, true).unwrap_err();

    assert!(matches!(
        &err,
        EngineError::EvaluationFault { node, tick: 3, source: cause, .. }
            if *node == source && cause.to_string().contains("sensor offline")
    ));
    assert_eq!(err.node(), Some(source));
    assert_eq!(err.tick(), Some(3));
    // Ticks 1 and 2 completed before the fault
    assert_eq!(seen.values(), vec![1, 2]);
}

/// Builds a source that cancels `token` on tick `at` and emits ten times
/// the tick number.
fn cancelling_source(flow: &mut Flow<u64>, token: CancellationToken, at: u64) -> NodeId {
    let source = flow.add(FromFn::new(move |tick: u64| -> Result<Sample<u64>, NodeError> {
        if tick == at {
            token.cancel();
        }
        Ok(Sample::Value(tick * 10))
    }));
    flow.add_with(Apply::new(|v: &u64| v + 1), [source]).unwrap()
}

/// Cancelling mid-run stops after the current tick and keeps its result.
#[test]
fn cancellation_between_ticks_keeps_last_tick() {
    let token = CancellationToken::new();
    let mut flow = Flow::new();
    let out = cancelling_source(&mut flow, token.clone(), 4);

    let outcome = Runner::default()
        .with_cancellation(token)
        .run_blocking(&mut flow, out)
        .unwrap();

    assert_eq!(outcome.state, RunState::Cancelled);
    assert_eq!(outcome.ticks, 4);
    assert_eq!(outcome.value, Some(41));
}

/// The async driver honours the same cancellation point.
#[tokio::test]
async fn async_cancellation_between_ticks_keeps_last_tick() {
    let token = CancellationToken::new();
    let mut flow = Flow::new();
    let out = cancelling_source(&mut flow, token.clone(), 7);

    let outcome = Runner::new(RunConfig::new().with_yield_every(3))
        .with_cancellation(token)
        .run_async(&mut flow, out)
        .await
        .unwrap();

    assert_eq!(outcome.state, RunState::Cancelled);
    assert_eq!(outcome.ticks, 7);
    assert_eq!(outcome.value, Some(71));
}

/// Each run owns its nodes, so a finished run cannot leak state into another.
#[test]
fn runs_do_not_share_node_state() {
    let mut flow = Flow::new();
    let a = flow.add(Const::new(5).times(5));

    let first = run(&mut flow, a, true).unwrap().into_outcome().unwrap();
    assert_eq!(first.ticks, 6);
    assert_eq!(first.value, Some(5));

    assert!(flow.is_built(a));
    assert!(matches!(
        run(&mut flow, a, false),
        Err(EngineError::NodeInUse { node, .. }) if node == a
    ));

    // Interleaved handles over separate flows advance independently
    let mut flows: Vec<(Flow<i64>, NodeId)> = (0..2)
        .map(|_| {
            let mut flow = Flow::new();
            let id = flow.add(Const::new(1).times(2));
            (flow, id)
        })
        .collect();
    let mut handles: Vec<_> = flows
        .iter_mut()
        .map(|(flow, id)| Runner::default().stepper(flow, *id).unwrap())
        .collect();

    assert_eq!(handles[0].step().unwrap(), Sample::Value(1));
    assert_eq!(handles[1].step().unwrap(), Sample::Value(1));
    assert_eq!(handles[0].step().unwrap(), Sample::Value(1));
    assert_eq!(handles[1].step().unwrap(), Sample::Value(1));
    assert_eq!(handles[0].step().unwrap(), Sample::End);
    assert_eq!(handles[1].step().unwrap(), Sample::End);
}
