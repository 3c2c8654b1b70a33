//! Calculation nodes.
//!
//! All of these skip a tick (emit `None`) when any input has no value. They
//! never see `End`: an ended input ends them through the scheduler.

use std::ops::Add;

use crate::error::NodeError;
use crate::graph::{Inputs, Node};
use crate::sample::Sample;

/// Maps the value of a single input.
pub struct Apply<F> {
    f: F,
}

impl<F> Apply<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Node<T> for Apply<F>
where
    F: FnMut(&T) -> T + Send,
{
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        Ok(Sample::from_option(inputs.value(0).map(|v| (self.f)(v))))
    }
}

/// Combines the values of two inputs.
pub struct Zip<F> {
    f: F,
}

impl<F> Zip<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Node<T> for Zip<F>
where
    F: FnMut(&T, &T) -> T + Send,
{
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        if inputs.len() != 2 {
            return Err(NodeError::msg(format!("zip expects 2 inputs, got {}", inputs.len())));
        }
        match (inputs.value(0), inputs.value(1)) {
            (Some(a), Some(b)) => Ok(Sample::Value((self.f)(a, b))),
            _ => Ok(Sample::None),
        }
    }
}

/// Folds the values of all inputs, left to right.
pub struct Reduce<F> {
    f: F,
}

impl<F> Reduce<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Node<T> for Reduce<F>
where
    T: Clone,
    F: FnMut(&T, &T) -> T + Send,
{
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        let Some(values) = inputs.values() else {
            return Ok(Sample::None);
        };
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return Err(NodeError::msg("reduce needs at least one input"));
        };
        let folded = iter.fold(first.clone(), |acc, value| (self.f)(&acc, value));
        Ok(Sample::Value(folded))
    }
}

/// Counts the ticks on which its input had a value.
///
/// Ticks without a value repeat the current count.
#[derive(Debug, Default)]
pub struct Count {
    count: u64,
}

impl Count {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> Node<T> for Count
where
    T: TryFrom<u64>,
{
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        if inputs.value(0).is_none() {
            return Ok(if self.count == 0 {
                Sample::None
            } else {
                Sample::Repeat
            });
        }
        self.count += 1;
        T::try_from(self.count)
            .map(Sample::Value)
            .map_err(|_| NodeError::msg(format!("count {} does not fit the payload type", self.count)))
    }
}

/// Running total of its input.
#[derive(Debug)]
pub struct Sum<T> {
    total: Option<T>,
}

impl<T> Sum<T> {
    pub fn new() -> Self {
        Self { total: None }
    }
}

impl<T> Default for Sum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Node<T> for Sum<T>
where
    T: Clone + Add<Output = T> + Send,
{
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        let Some(value) = inputs.value(0) else {
            return Ok(Sample::None);
        };
        let total = match self.total.take() {
            Some(total) => total + value.clone(),
            None => value.clone(),
        };
        self.total = Some(total.clone());
        Ok(Sample::Value(total))
    }
}
