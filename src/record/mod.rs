//! Read-level data model: single reads, read pairs and the alignments attached to them

mod pair;
mod sequence;

pub use pair::{Alignment, Pair, PairAlignment};
pub use sequence::{Sequence, SequenceBuilder, complement};
