//! Output nodes.
//!
//! Sinks observe their first input, perform a side effect, and forward the
//! sample unchanged so they can sit anywhere in a graph, including at the
//! terminal position. They all tolerate `End`, so the end of a stream is
//! observed (recorded, logged, flushed) before it propagates.

use std::fmt::Debug;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::Level;

use crate::error::NodeError;
use crate::graph::{Inputs, Node};
use crate::sample::Sample;

fn first<T: Clone>(inputs: Inputs<'_, T>, kind: &str) -> Result<Sample<T>, NodeError> {
    inputs
        .get(0)
        .cloned()
        .ok_or_else(|| NodeError::msg(format!("{kind} needs an input")))
}

/// Shared buffer filled by a [`Collect`] node.
#[derive(Debug)]
pub struct Collected<T> {
    samples: Arc<Mutex<Vec<Sample<T>>>>,
}

impl<T> Clone for Collected<T> {
    fn clone(&self) -> Self {
        Self {
            samples: Arc::clone(&self.samples),
        }
    }
}

impl<T: Clone> Collected<T> {
    /// Every sample observed so far, one per tick.
    pub fn samples(&self) -> Vec<Sample<T>> {
        self.samples.lock().clone()
    }

    /// Only the payload values observed so far.
    pub fn values(&self) -> Vec<T> {
        self.samples
            .lock()
            .iter()
            .filter_map(|sample| sample.value().cloned())
            .collect()
    }

    /// Number of ticks observed.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Discard everything collected so far.
    pub fn clear(&self) {
        self.samples.lock().clear();
    }
}

/// Records every sample of its input.
pub struct Collect<T> {
    sink: Collected<T>,
}

impl<T> Collect<T> {
    /// Create the node and the handle to read what it collects.
    pub fn new() -> (Self, Collected<T>) {
        let sink = Collected {
            samples: Arc::new(Mutex::new(Vec::new())),
        };
        (Self { sink: sink.clone() }, sink)
    }
}

impl<T: Clone + Send> Node<T> for Collect<T> {
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        let sample = first(inputs, "collect")?;
        self.sink.samples.lock().push(sample.clone());
        Ok(sample)
    }

    fn tolerates_end(&self) -> bool {
        true
    }
}

/// Logs every sample of its input through `tracing`.
#[derive(Debug, Clone)]
pub struct Log {
    label: String,
    level: Level,
}

impl Log {
    /// Log at `INFO` under the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            level: Level::INFO,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl<T: Clone + Debug> Node<T> for Log {
    fn name(&self) -> &str {
        &self.label
    }

    fn evaluate(&mut self, tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        let sample = first(inputs, "log")?;
        let label = self.label.as_str();
        if self.level == Level::ERROR {
            tracing::error!(label = label, tick = tick, sample = ?sample, "sample observed");
        } else if self.level == Level::WARN {
            tracing::warn!(label = label, tick = tick, sample = ?sample, "sample observed");
        } else if self.level == Level::INFO {
            tracing::info!(label = label, tick = tick, sample = ?sample, "sample observed");
        } else if self.level == Level::DEBUG {
            tracing::debug!(label = label, tick = tick, sample = ?sample, "sample observed");
        } else {
            tracing::trace!(label = label, tick = tick, sample = ?sample, "sample observed");
        }
        Ok(sample)
    }

    fn tolerates_end(&self) -> bool {
        true
    }
}

/// Encoding used by [`Writer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// One JSON document per line.
    #[default]
    JsonLines,

    /// Back-to-back MessagePack values.
    MessagePack,
}

/// Serializes every value of its input into an `io::Write`.
///
/// `None` ticks write nothing. The writer is flushed when the input ends.
pub struct Writer<W> {
    writer: W,
    format: Format,
    written: u64,
}

impl<W: io::Write> Writer<W> {
    pub fn new(writer: W, format: Format) -> Self {
        Self {
            writer,
            format,
            written: 0,
        }
    }

    /// Number of values written.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    fn encode<T: Serialize>(&mut self, value: &T) -> Result<(), NodeError> {
        match self.format {
            Format::JsonLines => {
                serde_json::to_writer(&mut self.writer, value)?;
                self.writer.write_all(b"\n")?;
            }
            Format::MessagePack => rmp_serde::encode::write(&mut self.writer, value)?,
        }
        self.written += 1;
        Ok(())
    }
}

impl<T, W> Node<T> for Writer<W>
where
    T: Clone + Serialize,
    W: io::Write + Send,
{
    fn evaluate(&mut self, _tick: u64, inputs: Inputs<'_, T>) -> Result<Sample<T>, NodeError> {
        let sample = first(inputs, "writer")?;
        match &sample {
            Sample::Value(value) => self.encode(value)?,
            Sample::End => self.writer.flush()?,
            Sample::None | Sample::Repeat => {}
        }
        Ok(sample)
    }

    fn tolerates_end(&self) -> bool {
        true
    }
}
