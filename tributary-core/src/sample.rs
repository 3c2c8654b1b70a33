//! Per-Tick Samples
//!
//! Every node evaluation produces a [`Sample`]: either a payload value or one
//! of three sentinels the scheduler interprets.
//!
//! # Sentinels
//!
//! - `End`: the node has no further values. The scheduler remembers this and
//!   never evaluates the node again for the remainder of the run.
//! - `None`: no value on this tick only. Passed to consumers as-is.
//! - `Repeat`: reuse the last value this node produced. Resolved once by the
//!   scheduler, so consumers never observe a `Repeat`.
//!
//! Keeping the sentinels as variants of a tagged union means a payload can
//! never be mistaken for a sentinel, whatever `T` is.

use serde::{Deserialize, Serialize};

/// The result of evaluating a node for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sample<T> {
    /// A payload value.
    Value(T),

    /// The stream has ended.
    End,

    /// No value on this tick.
    None,

    /// Reuse the previously emitted value.
    Repeat,
}

/// Discriminant of a [`Sample`], without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Value,
    End,
    None,
    Repeat,
}

impl<T> Sample<T> {
    /// Get the sample's kind.
    pub fn kind(&self) -> SampleKind {
        match self {
            Sample::Value(_) => SampleKind::Value,
            Sample::End => SampleKind::End,
            Sample::None => SampleKind::None,
            Sample::Repeat => SampleKind::Repeat,
        }
    }

    /// Check if this sample carries a payload.
    pub fn is_value(&self) -> bool {
        matches!(self, Sample::Value(_))
    }

    /// Check if this sample is the `End` sentinel.
    pub fn is_end(&self) -> bool {
        matches!(self, Sample::End)
    }

    /// Check if this sample is the `None` sentinel.
    pub fn is_none(&self) -> bool {
        matches!(self, Sample::None)
    }

    /// Check if this sample is any of the sentinels.
    pub fn is_sentinel(&self) -> bool {
        !self.is_value()
    }

    /// Borrow the payload, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Sample::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Take the payload, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Sample::Value(v) => Some(v),
            _ => None,
        }
    }

    /// `Some` becomes a value, `None` becomes the `None` sentinel.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Sample::Value(v),
            None => Sample::None,
        }
    }

    /// Borrow the payload inside the sample.
    pub fn as_ref(&self) -> Sample<&T> {
        match self {
            Sample::Value(v) => Sample::Value(v),
            Sample::End => Sample::End,
            Sample::None => Sample::None,
            Sample::Repeat => Sample::Repeat,
        }
    }

    /// Map the payload, keeping sentinels unchanged.
    pub fn map<U, F>(self, f: F) -> Sample<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Sample::Value(v) => Sample::Value(f(v)),
            Sample::End => Sample::End,
            Sample::None => Sample::None,
            Sample::Repeat => Sample::Repeat,
        }
    }
}

impl<T> From<T> for Sample<T> {
    fn from(value: T) -> Self {
        Sample::Value(value)
    }
}

impl std::fmt::Display for SampleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SampleKind::Value => "value",
            SampleKind::End => "end",
            SampleKind::None => "none",
            SampleKind::Repeat => "repeat",
        };
        f.write_str(name)
    }
}
