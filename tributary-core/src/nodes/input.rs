//! Input nodes: sources with no dependencies.

use std::collections::VecDeque;

use crate::error::NodeError;
use crate::graph::{Inputs, Node};
use crate::sample::Sample;

/// Emits the same value every tick.
///
/// With [`times`](Const::times), ends after that many ticks.
#[derive(Debug, Clone)]
pub struct Const<T> {
    value: T,
    remaining: Option<u64>,
}

impl<T> Const<T> {
    /// Emit `value` forever.
    pub fn new(value: T) -> Self {
        Self {
            value,
            remaining: None,
        }
    }

    /// Emit `value` for `count` ticks, then end.
    pub fn times(mut self, count: u64) -> Self {
        self.remaining = Some(count);
        self
    }
}

impl<T: Clone + Send> Node<T> for Const<T> {
    fn evaluate(&mut self, _tick: u64, _inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        match &mut self.remaining {
            Some(0) => Ok(Sample::End),
            Some(left) => {
                *left -= 1;
                Ok(Sample::Value(self.value.clone()))
            }
            None => Ok(Sample::Value(self.value.clone())),
        }
    }
}

/// Replays a fixed sequence of samples, one per tick, then ends.
///
/// The script may contain sentinels, which makes this the usual way to feed
/// `None` and `Repeat` into a graph.
#[derive(Debug, Clone)]
pub struct Curve<T> {
    samples: VecDeque<Sample<T>>,
}

impl<T> Curve<T> {
    /// Replay the given samples.
    pub fn new<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = Sample<T>>,
    {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    /// Replay plain values.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::new(values.into_iter().map(Sample::Value))
    }
}

impl<T: Send> Node<T> for Curve<T> {
    fn evaluate(&mut self, _tick: u64, _inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        Ok(self.samples.pop_front().unwrap_or(Sample::End))
    }
}

/// Calls a closure with the tick number.
pub struct FromFn<F> {
    f: F,
}

impl<F> FromFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Node<T> for FromFn<F>
where
    F: FnMut(u64) -> Result<Sample<T>, NodeError> + Send,
{
    fn evaluate(&mut self, tick: u64, _inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        (self.f)(tick)
    }
}
