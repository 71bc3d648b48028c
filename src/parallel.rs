//! Batch-parallel alignment with ordered output
//!
//! The calling thread runs the [`Batcher`] and dispatches batches through a bounded
//! FIFO queue to a fixed pool of scoped worker threads. Each worker owns a clone of
//! the aligner and drives a [`BatchProcessor`]; completed batches reach the sink
//! through a shared [`ReorderingWriter`] and statistics through a shared
//! [`StatsAggregator`].
//!
//! The first fatal error cancels the run: the producer stops dispatching, idle
//! workers stop picking up batches and blocked submitters are woken. Output that was
//! already emitted (always a contiguous prefix of ordinals) is left in the sink.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use parking_lot::Mutex;

use crate::{
    Batch, DEFAULT_BATCH_SIZE, Error, Result,
    align::Aligner,
    batch::Batcher,
    error::{ConfigError, PipelineError},
    processor::BatchProcessor,
    reorder::ReorderingWriter,
    sink::BatchSink,
    source::PairSource,
    stats::StatsAggregator,
};

/// Records the first fatal error of a run and signals cancellation.
///
/// Later errors are logged and dropped, as are cancellations: a cancelled submitter
/// only reports the abort caused by another error, never a failure of its own.
#[derive(Debug, Default)]
pub struct FirstError {
    error: Mutex<Option<Error>>,
    cancelled: AtomicBool,
}
impl FirstError {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `error` if no error was recorded yet.
    ///
    /// Returns `true` if this call cancelled the run.
    pub fn record(&self, error: Error) -> bool {
        if error.is_cancelled() {
            log::debug!("ignoring cancellation: {error}");
            return false;
        }
        let mut slot = self.error.lock();
        if slot.is_some() {
            log::debug!("dropping error after cancellation: {error}");
            return false;
        }
        log::warn!("cancelling pipeline: {error}");
        *slot = Some(error);
        self.cancelled.store(true, Ordering::Release);
        true
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn into_inner(self) -> Option<Error> {
        self.error.into_inner()
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct PipelineReport<S, K> {
    /// Number of batches written to the sink
    pub batches: u64,
    /// Number of pairs written to the sink
    pub pairs: u64,
    /// Statistics merged across all workers
    pub stats: S,
    /// The finished sink
    pub sink: K,
}

/// A builder for [`Pipeline`] configurations
///
/// # Example
///
/// ```
/// use pairalign::PipelineBuilder;
///
/// let pipeline = PipelineBuilder::default()
///     .batch_size(256)
///     .threads(4)
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.holding_capacity(), 8);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PipelineBuilder {
    batch_size: usize,
    threads: usize,
    holding_capacity: Option<usize>,
    queue_depth: Option<usize>,
}
impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            threads: 0,
            holding_capacity: None,
            queue_depth: None,
        }
    }
}
impl PipelineBuilder {
    /// Number of pairs per batch
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Number of worker threads (0 uses every available core)
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Maximum number of completed batches held while waiting for a predecessor.
    ///
    /// Defaults to twice the number of threads and may not be smaller than it.
    #[must_use]
    pub fn holding_capacity(mut self, capacity: usize) -> Self {
        self.holding_capacity = Some(capacity);
        self
    }

    /// Number of batches buffered between the producer and the workers.
    ///
    /// Defaults to twice the number of threads.
    #[must_use]
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = Some(depth);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize.into());
        }
        let threads = if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        };
        let holding_capacity = self.holding_capacity.unwrap_or(2 * threads);
        if holding_capacity < threads {
            return Err(ConfigError::HoldingCapacityTooSmall {
                capacity: holding_capacity,
                threads,
            }
            .into());
        }
        let queue_depth = self.queue_depth.unwrap_or(2 * threads);
        if queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth.into());
        }
        Ok(Pipeline {
            batch_size: self.batch_size,
            threads,
            holding_capacity,
            queue_depth,
        })
    }
}

/// A validated, reusable pipeline configuration
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    batch_size: usize,
    threads: usize,
    holding_capacity: usize,
    queue_depth: usize,
}
impl Pipeline {
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[must_use]
    pub fn holding_capacity(&self) -> usize {
        self.holding_capacity
    }

    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    /// Aligns every pair of `source` and writes the results to `sink` in source order.
    ///
    /// Returns the first fatal error if any batch fails. In that case the sink has
    /// received a contiguous prefix of the batches and is dropped; pass `&mut sink`
    /// to keep access to it.
    ///
    /// Once the run is cancelled no further batch is read from the source or handed
    /// to a worker. Alignments already in progress are allowed to finish; their
    /// results are discarded by the aborted writer.
    pub fn run<S, A, K>(
        &self,
        source: S,
        aligner: A,
        sink: K,
    ) -> Result<PipelineReport<A::Stats, K>>
    where
        S: PairSource,
        A: Aligner,
        K: BatchSink,
    {
        log::info!(
            "starting pipeline: {} threads, batch size {}, holding capacity {}, queue depth {}",
            self.threads,
            self.batch_size,
            self.holding_capacity,
            self.queue_depth
        );
        if let Some(num_pairs) = source.size_hint() {
            log::info!("source holds {num_pairs} pairs");
        }

        let mut batcher = Batcher::new(source, self.batch_size)?;
        let writer = ReorderingWriter::new(sink, self.holding_capacity)?;
        let stats = StatsAggregator::<A::Stats>::new();
        let failure = FirstError::new();
        let (tx, rx) = crossbeam_channel::bounded::<Batch>(self.queue_depth);

        thread::scope(|scope| {
            let (writer, stats, failure) = (&writer, &stats, &failure);
            let handles = (0..self.threads)
                .map(|tid| {
                    let rx = rx.clone();
                    let mut processor = BatchProcessor::new(tid, aligner.clone(), writer, stats);
                    scope.spawn(move || {
                        for batch in rx {
                            if failure.is_cancelled() {
                                break;
                            }
                            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                                processor.process(batch)
                            }))
                            .unwrap_or_else(|_| Err(PipelineError::WorkerPanicked(tid).into()));
                            if let Err(e) = result {
                                if failure.record(e) {
                                    writer.abort();
                                }
                                break;
                            }
                        }
                        log::debug!(
                            "worker {tid} exiting after {} batches",
                            processor.processed()
                        );
                    })
                })
                .collect::<Vec<_>>();

            // workers hold the only receivers from here on
            drop(rx);

            while !failure.is_cancelled() {
                let Some(batch) = batcher.next() else {
                    break;
                };
                match batch {
                    Ok(batch) => {
                        log::debug!("dispatching batch {}", batch.ordinal());
                        if tx.send(batch).is_err() {
                            // every worker has exited
                            break;
                        }
                    }
                    Err(e) => {
                        if failure.record(e) {
                            writer.abort();
                        }
                        break;
                    }
                }
            }
            drop(tx);

            for (tid, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err()
                    && failure.record(PipelineError::WorkerPanicked(tid).into())
                {
                    writer.abort();
                }
            }
        });

        if let Some(error) = failure.into_inner() {
            return Err(error);
        }

        let (batches, pairs) = (writer.emitted_batches(), writer.emitted_pairs());
        let sink = writer.finish()?;
        log::info!("pipeline finished: {batches} batches, {pairs} pairs");
        Ok(PipelineReport {
            batches,
            pairs,
            stats: stats.into_inner(),
            sink,
        })
    }
}
