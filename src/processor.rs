//! Per-worker batch processing
//!
//! A [`BatchProcessor`] ties one worker's aligner to the writer and the statistics
//! aggregator shared by the run.

use crate::{
    Batch, Result,
    align::Aligner,
    reorder::ReorderingWriter,
    sink::BatchSink,
    stats::StatsAggregator,
};

/// Runs one batch through alignment, ordered output and statistics merging.
///
/// Each worker thread owns one processor and thus one aligner; the writer and the
/// aggregator are shared by every processor of a run.
pub struct BatchProcessor<'a, A: Aligner, K> {
    tid: usize,
    aligner: A,
    writer: &'a ReorderingWriter<K>,
    stats: &'a StatsAggregator<A::Stats>,
    processed: u64,
}

impl<'a, A: Aligner, K: BatchSink> BatchProcessor<'a, A, K> {
    pub fn new(
        tid: usize,
        aligner: A,
        writer: &'a ReorderingWriter<K>,
        stats: &'a StatsAggregator<A::Stats>,
    ) -> Self {
        Self {
            tid,
            aligner,
            writer,
            stats,
            processed: 0,
        }
    }

    /// Aligns `batch`, submits it for ordered output and merges its statistics.
    ///
    /// An alignment error is returned before anything reaches the writer or the
    /// aggregator, so a failed batch leaves no partial output.
    pub fn process(&mut self, mut batch: Batch) -> Result<()> {
        let ordinal = batch.ordinal();
        log::debug!(
            "worker {} aligning batch {ordinal} ({} pairs)",
            self.tid,
            batch.len()
        );

        if let Err(e) = self.aligner.process_reads(batch.pairs_mut()) {
            log::error!("worker {} failed on batch {ordinal}: {e}", self.tid);
            // drop whatever the aligner counted before failing
            let _ = self.aligner.take_stats();
            return Err(e);
        }
        let local = self.aligner.take_stats();

        self.writer.submit(batch)?;
        self.stats.merge(&local);
        self.processed += 1;
        Ok(())
    }

    #[must_use]
    pub fn tid(&self) -> usize {
        self.tid
    }

    /// Number of batches this processor has completed
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed
    }
}
