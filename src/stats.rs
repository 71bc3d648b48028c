//! Mergeable alignment statistics and the process-wide aggregator
//!
//! Workers accumulate into a task-local [`Stats`] value and merge it into the shared
//! [`StatsAggregator`] once per batch. Because `merge` is associative and commutative,
//! the final totals do not depend on the order in which batches complete.

use std::fmt;

use parking_lot::Mutex;

use crate::Pair;

/// A mergeable aggregate of alignment metrics.
///
/// Implementations must make `merge` associative and commutative.
pub trait Stats: Default + Send {
    fn merge(&mut self, other: &Self);
}

/// Counters describing how a set of pairs aligned
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MappingStats {
    pub pairs: u64,
    pub reads: u64,
    pub mapped_reads: u64,
    pub unmapped_reads: u64,
    /// Pairs where both ends aligned
    pub both_mapped: u64,
    /// Aligned reads placed on the reverse strand
    pub reverse_strand: u64,
    pub bases: u64,
}
impl MappingStats {
    /// Accounts for one pair using the alignments currently attached to it
    pub fn record_pair(&mut self, pair: &Pair) {
        let alignment = pair.alignment();
        let mapped = alignment.num_mapped() as u64;
        self.pairs += 1;
        self.reads += 2;
        self.mapped_reads += mapped;
        self.unmapped_reads += 2 - mapped;
        self.both_mapped += u64::from(alignment.is_both_mapped());
        self.reverse_strand += [&alignment.first, &alignment.second]
            .into_iter()
            .flatten()
            .filter(|a| a.reverse)
            .count() as u64;
        self.bases += pair.num_bases() as u64;
    }

    /// Fraction of reads that aligned, 0 when no reads were seen
    #[must_use]
    pub fn mapped_fraction(&self) -> f64 {
        if self.reads == 0 {
            0.0
        } else {
            self.mapped_reads as f64 / self.reads as f64
        }
    }
}
impl Stats for MappingStats {
    fn merge(&mut self, other: &Self) {
        self.pairs += other.pairs;
        self.reads += other.reads;
        self.mapped_reads += other.mapped_reads;
        self.unmapped_reads += other.unmapped_reads;
        self.both_mapped += other.both_mapped;
        self.reverse_strand += other.reverse_strand;
        self.bases += other.bases;
    }
}
impl fmt::Display for MappingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pairs={} reads={} mapped={} ({:.2}%) unmapped={} both_mapped={} reverse={} bases={}",
            self.pairs,
            self.reads,
            self.mapped_reads,
            self.mapped_fraction() * 100.0,
            self.unmapped_reads,
            self.both_mapped,
            self.reverse_strand,
            self.bases
        )
    }
}

/// Owns the global statistics behind a single lock.
///
/// Every merge and every read happens under the same guard, so observers never see
/// a partially applied merge.
#[derive(Debug, Default)]
pub struct StatsAggregator<S> {
    inner: Mutex<S>,
}
impl<S: Stats> StatsAggregator<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(S::default()),
        }
    }

    /// Merges a task-local accumulation into the global total
    pub fn merge(&self, local: &S) {
        self.inner.lock().merge(local);
    }

    /// Runs `f` against the global total while holding the guard
    pub fn read<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&self.inner.lock())
    }

    /// Returns a copy of the global total
    #[must_use]
    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.inner.lock().clone()
    }

    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::{Alignment, PairAlignment, SequenceBuilder};

    fn pair(first_mapped: bool, second_reverse: Option<bool>) -> Pair {
        let read = |name: &[u8]| {
            SequenceBuilder::default()
                .name(name)
                .data(b"ACGTA")
                .build()
                .unwrap()
        };
        let hit = |reverse: bool| Alignment {
            reference_id: 0,
            position: 0,
            reverse,
            mapq: 60,
            score: 5,
            cigar: "5M".to_string(),
        };
        let mut pair = Pair::new(read(b"a/1"), read(b"a/2"));
        pair.set_alignment(PairAlignment {
            first: first_mapped.then(|| hit(false)),
            second: second_reverse.map(hit),
        });
        pair
    }

    #[test]
    fn test_record_pair() {
        let mut stats = MappingStats::default();
        stats.record_pair(&pair(true, Some(true)));
        stats.record_pair(&pair(false, None));
        assert_eq!(stats.pairs, 2);
        assert_eq!(stats.reads, 4);
        assert_eq!(stats.mapped_reads, 2);
        assert_eq!(stats.unmapped_reads, 2);
        assert_eq!(stats.both_mapped, 1);
        assert_eq!(stats.reverse_strand, 1);
        assert_eq!(stats.bases, 20);
        assert!((stats.mapped_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let pairs = [
            pair(true, Some(false)),
            pair(false, Some(true)),
            pair(true, None),
            pair(false, None),
        ];
        let mut sequential = MappingStats::default();
        pairs.iter().for_each(|p| sequential.record_pair(p));

        let locals = pairs
            .iter()
            .map(|p| {
                let mut local = MappingStats::default();
                local.record_pair(p);
                local
            })
            .collect::<Vec<_>>();

        let mut forward = MappingStats::default();
        locals.iter().for_each(|l| forward.merge(l));
        let mut backward = MappingStats::default();
        locals.iter().rev().for_each(|l| backward.merge(l));

        // (a + b) + (c + d) grouping
        let mut left = locals[0];
        left.merge(&locals[1]);
        let mut right = locals[2];
        right.merge(&locals[3]);
        left.merge(&right);

        assert_eq!(forward, sequential);
        assert_eq!(backward, sequential);
        assert_eq!(left, sequential);
    }

    #[test]
    fn test_aggregator_concurrent_merges() {
        let aggregator = Arc::new(StatsAggregator::<MappingStats>::new());
        let handles = (0..8)
            .map(|_| {
                let aggregator = Arc::clone(&aggregator);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let mut local = MappingStats::default();
                        local.record_pair(&pair(true, Some(false)));
                        aggregator.merge(&local);
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        let total = aggregator.snapshot();
        assert_eq!(total.pairs, 800);
        assert_eq!(total.reads, 1600);
        assert_eq!(total.both_mapped, 800);
        // readers always observe reads == 2 * pairs
        assert!(aggregator.read(|s| s.reads == 2 * s.pairs));
    }

    #[test]
    fn test_display() {
        let mut stats = MappingStats::default();
        stats.record_pair(&pair(true, Some(false)));
        let line = stats.to_string();
        assert!(line.contains("pairs=1"));
        assert!(line.contains("100.00%"));
    }
}
