//! Control nodes: route, gate, and hold values.

use crate::error::NodeError;
use crate::graph::{Inputs, Node};
use crate::sample::Sample;

/// Chooses between two inputs based on a predicate over a condition input.
///
/// Inputs: `[condition, if_true, if_false]`. The selected input's sample is
/// forwarded as-is, including `None`.
pub struct If<P> {
    predicate: P,
}

impl<P> If<P> {
    pub fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

impl<T, P> Node<T> for If<P>
where
    T: Clone,
    P: FnMut(&T) -> bool + Send,
{
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        if inputs.len() != 3 {
            return Err(NodeError::msg(format!("if expects 3 inputs, got {}", inputs.len())));
        }
        let Some(condition) = inputs.value(0) else {
            return Ok(Sample::None);
        };
        let branch = if (self.predicate)(condition) { 1 } else { 2 };
        Ok(inputs.get(branch).cloned().unwrap_or(Sample::None))
    }
}

/// Forwards values that satisfy a predicate, `None` otherwise.
pub struct Filter<P> {
    predicate: P,
}

impl<P> Filter<P> {
    pub fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

impl<T, P> Node<T> for Filter<P>
where
    T: Clone,
    P: FnMut(&T) -> bool + Send,
{
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        match inputs.value(0) {
            Some(value) if (self.predicate)(value) => Ok(Sample::Value(value.clone())),
            _ => Ok(Sample::None),
        }
    }
}

/// Holds the last value through ticks on which the input has none.
///
/// Emits `Repeat` for those ticks and lets the scheduler fill in the value.
/// Before the first value it emits `None`.
#[derive(Debug, Default)]
pub struct Hold {
    seen: bool,
}

impl Hold {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone> Node<T> for Hold {
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        match inputs.value(0) {
            Some(value) => {
                self.seen = true;
                Ok(Sample::Value(value.clone()))
            }
            None if self.seen => Ok(Sample::Repeat),
            None => Ok(Sample::None),
        }
    }
}

/// Forwards the first input that has a value this tick.
///
/// Keeps running while any input is alive and ends once all have ended.
#[derive(Debug, Default)]
pub struct Merge;

impl Merge {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Clone> Node<T> for Merge {
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        if inputs.all_end() {
            return Ok(Sample::End);
        }
        Ok(inputs
            .iter()
            .find_map(Sample::value)
            .cloned()
            .map_or(Sample::None, Sample::Value))
    }

    fn tolerates_end(&self) -> bool {
        true
    }
}
