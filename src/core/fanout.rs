//! Fan-out strategies for per-item work inside a stage
//!
//! Every strategy rendezvous before returning: when `for_each` returns, all
//! work it started has finished, which is what lets a stage close its output
//! channel safely.

use crate::core::{Inbox, PipelineItem};
use crate::error::{panic_message, PipelineError, Result};
use crossbeam::channel::bounded;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ScopedJoinHandle};

/// How a stage spreads received items over threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FanOut {
    /// One thread per received item, no upper bound
    #[default]
    PerItem,
    /// A dedicated pool of this many threads per stage
    Workers(usize),
}

impl FanOut {
    /// Run `work` for every item in `inbox` until the channel closes.
    ///
    /// Returns the first error reported by any unit of work, after all of
    /// them have finished.
    pub fn for_each<F>(&self, stage: &'static str, inbox: &Inbox, work: F) -> Result<()>
    where
        F: Fn(PipelineItem) -> Result<()> + Sync,
    {
        match *self {
            Self::PerItem => per_item(stage, inbox, &work),
            Self::Workers(count) => workers(stage, inbox, count.max(1), &work),
        }
    }

    /// Upper bound on concurrently processed items, if any
    pub fn concurrency_limit(&self) -> Option<usize> {
        match *self {
            Self::PerItem => None,
            Self::Workers(count) => Some(count.max(1)),
        }
    }
}

/// One scoped thread per item. Finished threads are joined on every receive,
/// so only in-flight items hold a thread.
fn per_item<F>(stage: &'static str, inbox: &Inbox, work: &F) -> Result<()>
where
    F: Fn(PipelineItem) -> Result<()> + Sync,
{
    thread::scope(|s| {
        let mut running: Vec<ScopedJoinHandle<'_, Result<()>>> = Vec::new();
        let mut failure = None;

        for item in inbox.iter() {
            reap_finished(stage, &mut running, &mut failure);
            running.push(s.spawn(move || work(item)));
        }
        for handle in running {
            record(stage, handle.join(), &mut failure);
        }

        failure.map_or(Ok(()), Err)
    })
}

fn reap_finished(
    stage: &'static str,
    running: &mut Vec<ScopedJoinHandle<'_, Result<()>>>,
    failure: &mut Option<PipelineError>,
) {
    let mut index = 0;
    while index < running.len() {
        if running[index].is_finished() {
            let handle = running.swap_remove(index);
            record(stage, handle.join(), failure);
        } else {
            index += 1;
        }
    }
}

fn record(stage: &'static str, joined: thread::Result<Result<()>>, failure: &mut Option<PipelineError>) {
    let err = match joined {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => PipelineError::WorkerPanicked {
            stage,
            message: panic_message(payload.as_ref()),
        },
    };
    failure.get_or_insert(err);
}

/// Items are dispatched onto a rayon pool of `count` threads. A permit
/// channel of the same capacity keeps at most `count` items in flight, so
/// the input channel still applies backpressure.
fn workers<F>(stage: &'static str, inbox: &Inbox, count: usize, work: &F) -> Result<()>
where
    F: Fn(PipelineItem) -> Result<()> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(count)
        .thread_name(move |index| format!("{}-worker-{}", stage, index))
        .build()
        .map_err(|e| PipelineError::ThreadPoolError(e.to_string()))?;

    let (permits, released) = bounded::<()>(count);
    let failure: Mutex<Option<PipelineError>> = Mutex::new(None);

    pool.in_place_scope(|s| {
        for item in inbox.iter() {
            if permits.send(()).is_err() {
                break;
            }
            let (released, failure) = (&released, &failure);
            s.spawn(move |_| {
                if let Err(err) = catch_panic(stage, || work(item)) {
                    failure
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .get_or_insert(err);
                }
                let _ = released.recv();
            });
        }
    });
    tracing::trace!(stage, workers = count, "worker pool drained input");

    match failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Compute `width` values in parallel on the current rayon pool.
///
/// The returned vector is indexed by slot: `result[i] == compute(i)` no
/// matter in which order the slots finish.
pub fn fan_out_slots<F>(stage: &'static str, width: usize, compute: F) -> Result<Vec<String>>
where
    F: Fn(usize) -> Result<String> + Sync,
{
    catch_panic(stage, || {
        (0..width)
            .into_par_iter()
            .map(&compute)
            .collect::<Result<Vec<_>>>()
    })
}

/// Turn a panic inside `body` into [`PipelineError::WorkerPanicked`].
fn catch_panic<T>(stage: &'static str, body: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|payload| {
        Err(PipelineError::WorkerPanicked {
            stage,
            message: panic_message(payload.as_ref()),
        })
    })
}
