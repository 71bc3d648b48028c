//! The aligner interface consumed by the batch pipeline
//!
//! The alignment algorithm itself is opaque to the pipeline. Each worker thread owns
//! its own clone of the aligner, so implementations may keep mutable scratch state
//! and local statistics without any synchronization.

mod exact;

pub use exact::ExactAligner;

use crate::{Pair, Result, stats::Stats};

/// Trait for types that align a batch of pairs in place.
pub trait Aligner: Send + Clone {
    /// Statistics accumulated by this aligner
    type Stats: Stats;

    /// Aligns every pair in `pairs`, attaching results to the pairs themselves.
    ///
    /// An error is fatal for the batch: the pipeline never forwards a partially
    /// aligned batch.
    fn process_reads(&mut self, pairs: &mut [Pair]) -> Result<()>;

    /// Statistics accumulated since the last [`Aligner::take_stats`]
    fn stats(&self) -> &Self::Stats;

    /// Returns the accumulated statistics and resets the local accumulator
    fn take_stats(&mut self) -> Self::Stats;
}
