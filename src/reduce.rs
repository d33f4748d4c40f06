//! Concurrent reduction of ngram corpora
//!
//! One producer reads lines from a [`LineSource`] into a bounded queue, and a
//! configurable number of workers drain that queue, each turning lines into
//! records, running the filter chain and forwarding survivors to the sink.
//! The queue bound is what keeps memory usage independent of corpus size.
//!
//! Failure handling is fail-fast: a failing worker poisons the whole run.
//! The producer never blocks unconditionally on a full queue, because the
//! queue of a failed run may never drain again; instead it waits with a
//! timeout and re-checks worker health before retrying.

use crate::{
    filter::NgramFilter,
    parse,
    record::{NgramRecord, REDUCED_HEADER},
    sink::RecordSink,
    source::LineSource,
    Result,
};
use anyhow::Context;
use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
    time::Duration,
};

/// Capacity of the pending line queue
const LINE_QUEUE_CAPACITY: usize = 4913;

/// How long the producer waits for queue space before re-checking worker
/// health
const SEND_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Emit a progress log entry every time this many lines have been read
const LINES_PER_PROGRESS_REPORT: u64 = 100_000;

/// Counters reported by a successful pipeline run
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// Lines consumed from the source, including a skipped reduced header
    pub lines_read: u64,

    /// Records dropped by the filter chain
    pub records_filtered: u64,
}

/// The reduction pipeline
///
/// A reducer is reusable: every [`run()`](Self::run) call processes one line
/// source to completion with a fresh queue and worker set, feeding the same
/// sink. This is how a directory of data files becomes several runs against
/// one output.
pub struct NgramReducer {
    /// Filter chain applied to every parsed record
    filters: Arc<[Box<dyn NgramFilter>]>,

    /// Number of parallel parsing/filtering workers
    workers: NonZeroUsize,

    /// Where surviving records are sent
    sink: Arc<dyn RecordSink>,
}
//
impl NgramReducer {
    /// Set up a reduction pipeline
    pub fn new(
        filters: Vec<Box<dyn NgramFilter>>,
        workers: NonZeroUsize,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            filters: filters.into(),
            workers,
            sink,
        }
    }

    /// Process one line source to completion, or fail the run as a whole
    pub async fn run(&self, source: &mut dyn LineSource) -> Result<RunSummary> {
        // Probe the first line: a run whose input starts with the reduced
        // header re-ingests previously reduced data for its whole duration
        let first_line = source.next_line().await?;
        let reduced = first_line.as_deref() == Some(REDUCED_HEADER);
        let mut lines_read = 0;
        let mut pending_line = None;
        if reduced {
            // The header itself carries no data
            lines_read += 1;
        } else {
            pending_line = first_line;
        }

        // Spawn the parsing/filtering workers
        log::debug!("creating {} line processing workers", self.workers);
        let (sender, receiver) = mpsc::channel(LINE_QUEUE_CAPACITY);
        let receiver = Arc::new(Mutex::new(receiver));
        let failed = Arc::new(AtomicBool::new(false));
        let mut workers = JoinSet::new();
        for _ in 0..self.workers.get() {
            workers.spawn(
                Worker {
                    receiver: receiver.clone(),
                    reduced,
                    filters: self.filters.clone(),
                    sink: self.sink.clone(),
                    failed: failed.clone(),
                }
                .process_lines(),
            );
        }

        // Feed the queue until the source is exhausted or the run fails,
        // then drop the sender so that workers drain and stop
        let feeding = feed_lines(source, pending_line, sender, &failed, &mut lines_read).await;

        // Join the workers, re-raising the first worker failure
        let mut records_filtered = 0;
        let mut first_failure = None;
        while let Some(outcome) = workers.join_next().await {
            match outcome.context("collecting results from one worker")? {
                Ok(filtered) => records_filtered += filtered,
                Err(error) => {
                    first_failure.get_or_insert(error);
                }
            }
        }
        if let Some(failure) = first_failure {
            return Err(failure);
        }
        feeding?;

        log::info!(
            "processing finished: lines read={lines_read}, records filtered={records_filtered}"
        );
        Ok(RunSummary {
            lines_read,
            records_filtered,
        })
    }
}

/// Producer loop: move lines from the source into the queue
async fn feed_lines(
    source: &mut dyn LineSource,
    pending_line: Option<String>,
    sender: mpsc::Sender<String>,
    failed: &AtomicBool,
    lines_read: &mut u64,
) -> Result<()> {
    let mut pending_line = pending_line;
    loop {
        let line = match pending_line.take() {
            Some(line) => Some(line),
            None => source.next_line().await?,
        };
        let Some(line) = line else { break };
        *lines_read += 1;
        if *lines_read % LINES_PER_PROGRESS_REPORT == 0 {
            log::debug!("{lines_read} lines read");
        }
        enqueue(&sender, line, failed).await?;
    }
    Ok(())
}

/// Submit one line with bounded waits and worker health checks in between
async fn enqueue(sender: &mpsc::Sender<String>, line: String, failed: &AtomicBool) -> Result<()> {
    let mut line = line;
    loop {
        if failed.load(Ordering::Acquire) {
            log::error!("worker failure detected while feeding lines");
            anyhow::bail!("worker failure detected while feeding lines");
        }
        line = match sender.send_timeout(line, SEND_RETRY_INTERVAL).await {
            Ok(()) => return Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(line)) => line,
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                anyhow::bail!("all workers stopped before the input was exhausted")
            }
        };
    }
}

/// One parsing/filtering worker
///
/// Everything a worker touches beyond the shared queue, failure flag and sink
/// is private to it, so the parse→filter path runs contention-free.
struct Worker {
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    reduced: bool,
    filters: Arc<[Box<dyn NgramFilter>]>,
    sink: Arc<dyn RecordSink>,
    failed: Arc<AtomicBool>,
}
//
impl Worker {
    /// Drain the line queue, reporting how many records were filtered out
    async fn process_lines(self) -> Result<u64> {
        let result = self.drain_queue().await;
        if result.is_err() {
            self.failed.store(true, Ordering::Release);
        }
        result
    }

    async fn drain_queue(&self) -> Result<u64> {
        let mut records_filtered = 0;
        loop {
            // The lock is only held while popping, not while processing
            let line = self.receiver.lock().await.recv().await;
            let Some(line) = line else { break };
            if self.failed.load(Ordering::Acquire) {
                // Another worker poisoned the run: stop accepting lines
                break;
            }
            let record = self.reduce_line(&line)?;
            if self.filters.iter().any(|f| f.should_reject(&record)) {
                records_filtered += 1;
            } else {
                self.sink.process(record).await?;
            }
        }
        Ok(records_filtered)
    }

    fn reduce_line(&self, line: &str) -> Result<NgramRecord> {
        let record = if self.reduced {
            NgramRecord::from_reduced_line(line)?
        } else {
            parse::parse_line(line)?
        };
        Ok(record)
    }
}
