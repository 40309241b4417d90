//! Pipeline executor
//!
//! Wires an ordered list of stages with bounded channels, runs one thread per
//! stage, drains the terminal channel on the calling thread, and blocks until
//! every stage has returned.

use crate::config::PipelineConfig;
use crate::core::{Inbox, Outbox, PipelineItem, Stage, StageReport, StageStats};
use crate::error::{panic_message, PipelineError, Result};
use crossbeam::channel::bounded;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default capacity of every inter-stage channel
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Items produced by the terminal stage plus per-stage statistics
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Terminal items in arrival order
    pub items: Vec<PipelineItem>,
    /// One report per stage, in pipeline order
    pub stages: Vec<StageReport>,
    /// Total wall time of the run
    pub elapsed: Duration,
}

impl PipelineOutput {
    /// Take the single string produced by an aggregating terminal stage
    pub fn into_signature(self) -> Result<String> {
        let count = self.items.len();
        let mut items = self.items.into_iter();
        match (items.next(), items.next()) {
            (Some(item), None) => item.into_text("pipeline"),
            _ => Err(PipelineError::UnexpectedOutput { count }),
        }
    }
}

/// Runs stages concurrently, connected output-to-input
pub struct PipelineExecutor {
    buffer_size: usize,
    stages: Vec<Box<dyn Stage>>,
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl PipelineExecutor {
    /// Create an executor whose channels hold `buffer_size` items
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            stages: Vec::new(),
        }
    }

    /// Create an executor using the configured buffer size
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.buffer_size)
    }

    /// Append a stage
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append an already boxed stage
    pub fn push_stage(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    /// Channel capacity
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True if no stage has been added
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in pipeline order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Feed `inputs` into the first stage and run the pipeline to completion.
    ///
    /// Any stage error or panic fails the whole run and no items are
    /// returned. When several stages fail, the root cause wins over the
    /// closed-channel errors it induced in its neighbours.
    pub fn execute<I>(&self, inputs: I) -> Result<PipelineOutput>
    where
        I: IntoIterator<Item = PipelineItem>,
        I::IntoIter: Send,
    {
        let started = Instant::now();
        tracing::info!(
            stages = ?self.stage_names(),
            buffer = self.buffer_size,
            "Start pipeline"
        );

        let stats: Vec<Arc<StageStats>> = self
            .stages
            .iter()
            .map(|_| Arc::new(StageStats::default()))
            .collect();
        let inputs = inputs.into_iter();
        let (feed_tx, feed_rx) = bounded(self.buffer_size);

        let (items, feeder, outcomes) = thread::scope(|s| {
            let feeder = s.spawn(move || {
                for item in inputs {
                    if feed_tx.send(item).is_err() {
                        tracing::debug!("First stage stopped early, dropping remaining inputs");
                        break;
                    }
                }
            });

            let mut upstream = feed_rx;
            let mut handles = Vec::with_capacity(self.stages.len());
            for (stage, stats) in self.stages.iter().zip(&stats) {
                let (tx, rx) = bounded(self.buffer_size);
                let inbox = Inbox::new(upstream, Arc::clone(stats));
                let outbox = Outbox::new(stage.name(), tx, Arc::clone(stats));
                handles.push(s.spawn(move || run_stage(stage.as_ref(), inbox, outbox)));
                upstream = rx;
            }

            let items: Vec<PipelineItem> = upstream.iter().collect();

            let feeder = feeder.join().map_err(|payload| PipelineError::WorkerPanicked {
                stage: "feeder",
                message: panic_message(payload.as_ref()),
            });
            let outcomes: Vec<(Result<()>, Duration)> = self
                .stages
                .iter()
                .zip(handles)
                .map(|(stage, handle)| {
                    handle.join().unwrap_or_else(|payload| {
                        (
                            Err(PipelineError::WorkerPanicked {
                                stage: stage.name(),
                                message: panic_message(payload.as_ref()),
                            }),
                            Duration::ZERO,
                        )
                    })
                })
                .collect();

            (items, feeder, outcomes)
        });

        let mut reports = Vec::with_capacity(outcomes.len());
        let mut root_cause = feeder.err();
        let mut induced = None;
        for ((stage, stats), (result, elapsed)) in self.stages.iter().zip(&stats).zip(outcomes) {
            reports.push(stats.report(stage.name(), elapsed));
            if let Err(err) = result {
                if err.is_channel_closed() {
                    induced.get_or_insert(err);
                } else {
                    root_cause.get_or_insert(err);
                }
            }
        }

        if let Some(err) = root_cause.or(induced) {
            tracing::error!(error = %err, "Pipeline aborted");
            return Err(err);
        }

        let elapsed = started.elapsed();
        tracing::info!(items = items.len(), ?elapsed, "Pipeline finished");

        Ok(PipelineOutput {
            items,
            stages: reports,
            elapsed,
        })
    }
}

/// Run one stage; its outbox is dropped on return, closing the output channel.
fn run_stage(stage: &dyn Stage, inbox: Inbox, outbox: Outbox) -> (Result<()>, Duration) {
    let name = stage.name();
    let started = Instant::now();
    tracing::debug!(stage = name, "Stage started");

    let result = stage.run(inbox, outbox);
    let elapsed = started.elapsed();

    match &result {
        Ok(()) => tracing::debug!(stage = name, ?elapsed, "Stage finished, output closed"),
        Err(err) => tracing::warn!(stage = name, error = %err, "Stage failed"),
    }
    (result, elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FnStage;

    fn passthrough(name: &'static str) -> FnStage<impl Fn(Inbox, Outbox) -> Result<()> + Send + Sync> {
        FnStage::new(name, |inbox: Inbox, outbox: Outbox| {
            for item in inbox.iter() {
                outbox.send(item)?;
            }
            Ok(())
        })
    }

    #[test]
    fn test_no_stages_returns_inputs() {
        let executor = PipelineExecutor::default();
        assert!(executor.is_empty());

        let out = executor.execute((0..3).map(PipelineItem::Int)).unwrap();
        assert_eq!(
            out.items,
            vec![PipelineItem::Int(0), PipelineItem::Int(1), PipelineItem::Int(2)]
        );
        assert!(out.stages.is_empty());
    }

    #[test]
    fn test_stage_chaining() {
        let executor = PipelineExecutor::new(4)
            .stage(FnStage::new("square", |inbox: Inbox, outbox: Outbox| {
                for item in inbox.iter() {
                    let n = item.into_int("square")?;
                    outbox.send(n * n)?;
                }
                Ok(())
            }))
            .stage(passthrough("relay"))
            .stage(FnStage::new("render", |inbox: Inbox, outbox: Outbox| {
                for item in inbox.iter() {
                    let n = item.into_int("render")?;
                    outbox.send(format!("<{}>", n))?;
                }
                Ok(())
            }));

        assert_eq!(executor.stage_names(), vec!["square", "relay", "render"]);

        // More items than channel capacity to exercise backpressure
        let out = executor.execute((1..=20).map(PipelineItem::Int)).unwrap();
        let rendered: Vec<_> = out.items.iter().filter_map(|i| i.as_text()).collect();
        assert_eq!(rendered.len(), 20);
        assert_eq!(rendered[0], "<1>");
        assert_eq!(rendered[19], "<400>");

        assert_eq!(out.stages.len(), 3);
        for report in &out.stages {
            assert_eq!(report.received, 20);
            assert_eq!(report.emitted, 20);
        }
    }

    #[test]
    fn test_root_cause_wins_over_closed_channels() {
        let executor = PipelineExecutor::new(1)
            .stage(passthrough("upstream"))
            .stage(FnStage::new("strict", |inbox: Inbox, outbox: Outbox| {
                for item in inbox.iter() {
                    let text = item.into_text("strict")?;
                    outbox.send(text)?;
                }
                Ok(())
            }))
            .stage(passthrough("downstream"));

        let err = executor
            .execute((0..50).map(PipelineItem::Int))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TypeMismatch { stage: "strict", .. }
        ));
    }

    #[test]
    fn test_stage_panic_aborts_run() {
        let executor = PipelineExecutor::default()
            .stage(passthrough("before"))
            .stage(FnStage::new("explode", |inbox: Inbox, _outbox: Outbox| {
                if inbox.recv().is_some() {
                    panic!("stage blew up");
                }
                Ok(())
            }));

        let err = executor.execute(vec![PipelineItem::Int(1)]).unwrap_err();
        match err {
            PipelineError::WorkerPanicked { stage, message } => {
                assert_eq!(stage, "explode");
                assert!(message.contains("stage blew up"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_into_signature_requires_single_item() {
        let one = PipelineOutput {
            items: vec![PipelineItem::from("sig")],
            stages: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert_eq!(one.into_signature().unwrap(), "sig");

        let two = PipelineOutput {
            items: vec![PipelineItem::from("a"), PipelineItem::from("b")],
            stages: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert!(matches!(
            two.into_signature(),
            Err(PipelineError::UnexpectedOutput { count: 2 })
        ));

        let none = PipelineOutput {
            items: Vec::new(),
            stages: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert!(matches!(
            none.into_signature(),
            Err(PipelineError::UnexpectedOutput { count: 0 })
        ));
    }
}
