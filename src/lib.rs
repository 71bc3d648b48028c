//! # pairalign
//!
//! Ordered, batch-parallel alignment of paired sequencing reads.
//!
//! A single producer groups an ordered stream of read pairs into fixed-size batches.
//! A pool of worker threads aligns the batches concurrently, each with its own
//! [`Aligner`] clone. Completed batches pass through a [`ReorderingWriter`], which
//! emits them to the [`BatchSink`] in exactly the order the pairs were read, and
//! per-batch statistics are merged into one [`StatsAggregator`].
//!
//! ## Modules
//!
//! * [`record`]: reads, pairs and the alignments attached to them
//! * [`batch`]: ordinal-tagged batches and the [`Batcher`]
//! * [`source`]: ordered pair sources, including paired sequence stores
//! * [`align`]: the [`Aligner`] interface and an exact-match aligner
//! * [`stats`]: mergeable statistics and the shared aggregator
//! * [`reorder`]: the ordering writer with its bounded holding area
//! * [`sink`]: batch sinks, including SAM output
//! * [`parallel`]: the worker pool and its configuration
//! * [`sdf`]: a compact sequence store with a single-sequence writer
//! * [`error`]: error types
//!
//! ## Example
//!
//! ```
//! use pairalign::{Batch, ExactAligner, IterSource, Pair, PipelineBuilder, SequenceBuilder};
//!
//! let read = |name: &[u8], data: &[u8]| {
//!     SequenceBuilder::default().name(name).data(data).build().unwrap()
//! };
//! let pairs = (0..10)
//!     .map(|_| Pair::new(read(b"r/1", b"ACGTAC"), read(b"r/2", b"TTGCCA")))
//!     .collect();
//!
//! let report = PipelineBuilder::default()
//!     .batch_size(3)
//!     .threads(2)
//!     .build()
//!     .unwrap()
//!     .run(
//!         IterSource::from_pairs(pairs),
//!         ExactAligner::new(vec![b"GGACGTACTTTGGCAAG".to_vec()]),
//!         Vec::<Batch>::new(),
//!     )
//!     .unwrap();
//! assert_eq!(report.batches, 4);
//! assert_eq!(report.stats.mapped_reads, 20);
//! ```

pub mod align;
pub mod batch;
pub mod error;
pub mod parallel;
mod processor;
pub mod record;
pub mod reorder;
pub mod sdf;
pub mod sink;
pub mod source;
pub mod stats;

pub use align::{Aligner, ExactAligner};
pub use batch::{Batch, Batcher};
pub use error::{Error, IntoPairalignError, Result};
pub use parallel::{FirstError, Pipeline, PipelineBuilder, PipelineReport};
pub use processor::BatchProcessor;
pub use record::{Alignment, Pair, PairAlignment, Sequence, SequenceBuilder};
pub use reorder::ReorderingWriter;
pub use sdf::{SdfReader, SdfWriter, SequenceStore};
pub use sink::{BatchSink, SamHeader, SamSink};
pub use source::{IterSource, PairSource, PairedStoreSource};
pub use stats::{MappingStats, Stats, StatsAggregator};

/// Default number of pairs per batch
pub const DEFAULT_BATCH_SIZE: usize = 1024;
