//! Stage abstraction and the channel endpoints handed to each stage
//!
//! A stage consumes its [`Inbox`] until the upstream side closes, emits any
//! number of items through its [`Outbox`], and returns once every piece of
//! work it spawned has finished. The executor hands ownership of both
//! endpoints to the stage, so the output channel closes exactly when the
//! stage returns and its last `Outbox` clone is dropped.

use crate::core::PipelineItem;
use crate::error::{PipelineError, Result};
use crossbeam::channel::{Receiver, Sender};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A unit of pipeline work
pub trait Stage: Send + Sync {
    /// Stage name used in logs, reports and errors
    fn name(&self) -> &'static str;

    /// Drain `inbox`, emit results to `outbox`, return after all spawned work has joined
    fn run(&self, inbox: Inbox, outbox: Outbox) -> Result<()>;
}

/// Per-stage item counters
#[derive(Debug, Default)]
pub struct StageStats {
    /// Items taken from the input channel
    pub received: AtomicU64,
    /// Items sent to the output channel
    pub emitted: AtomicU64,
}

impl StageStats {
    /// Snapshot counters into a report
    pub fn report(&self, name: &'static str, elapsed: Duration) -> StageReport {
        StageReport {
            name,
            received: self.received.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// Summary of one stage after a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Stage name
    pub name: &'static str,
    /// Items received
    pub received: u64,
    /// Items emitted
    pub emitted: u64,
    /// Wall time between stage start and return
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

pub(crate) fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Receiving end of a stage's input channel
#[derive(Clone)]
pub struct Inbox {
    receiver: Receiver<PipelineItem>,
    stats: Arc<StageStats>,
}

impl Inbox {
    /// Wrap a receiver
    pub fn new(receiver: Receiver<PipelineItem>, stats: Arc<StageStats>) -> Self {
        Self { receiver, stats }
    }

    /// Block until an item arrives; `None` once upstream has closed and drained
    pub fn recv(&self) -> Option<PipelineItem> {
        let item = self.receiver.recv().ok()?;
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        Some(item)
    }

    /// Blocking iterator that ends when the channel is closed
    pub fn iter(&self) -> impl Iterator<Item = PipelineItem> + '_ {
        std::iter::from_fn(move || self.recv())
    }
}

/// Sending end of a stage's output channel
#[derive(Clone)]
pub struct Outbox {
    stage: &'static str,
    sender: Sender<PipelineItem>,
    stats: Arc<StageStats>,
}

impl Outbox {
    /// Wrap a sender owned by `stage`
    pub fn new(stage: &'static str, sender: Sender<PipelineItem>, stats: Arc<StageStats>) -> Self {
        Self {
            stage,
            sender,
            stats,
        }
    }

    /// Send an item downstream, blocking while the channel is full
    pub fn send(&self, item: impl Into<PipelineItem>) -> Result<()> {
        self.sender
            .send(item.into())
            .map_err(|_| PipelineError::ChannelClosed { stage: self.stage })?;
        self.stats.emitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Adapter turning a closure into a [`Stage`]
pub struct FnStage<F> {
    name: &'static str,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(Inbox, Outbox) -> Result<()> + Send + Sync,
{
    /// Create a named closure stage
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(Inbox, Outbox) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, inbox: Inbox, outbox: Outbox) -> Result<()> {
        (self.func)(inbox, outbox)
    }
}
