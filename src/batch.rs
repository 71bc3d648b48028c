//! Ordinal-tagged batches of pairs and the batcher producing them

use crate::{Pair, Result, error::ConfigError, source::PairSource};

/// An ordered group of pairs processed together by one task.
///
/// The ordinal is the batch's position in source order; pairs inside the batch
/// keep their source order.
#[derive(Debug)]
pub struct Batch {
    ordinal: u64,
    pairs: Vec<Pair>,
}

impl Batch {
    #[must_use]
    pub fn new(ordinal: u64, pairs: Vec<Pair>) -> Self {
        Self { ordinal, pairs }
    }

    #[inline]
    #[must_use]
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    #[inline]
    #[must_use]
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Mutable access to the pairs, used by aligners to attach results
    #[inline]
    pub fn pairs_mut(&mut self) -> &mut [Pair] {
        &mut self.pairs
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[must_use]
    pub fn into_pairs(self) -> Vec<Pair> {
        self.pairs
    }
}

/// Groups an ordered pair stream into batches of at most `batch_size` pairs.
///
/// Ordinals start at 0 and increase by one per batch with no gaps. Only the last
/// batch may be short, and an empty source yields no batches. After the source
/// fails the error is yielded once and the batcher is exhausted.
pub struct Batcher<S> {
    source: S,
    batch_size: usize,
    next_ordinal: u64,
    done: bool,
}

impl<S: PairSource> Batcher<S> {
    pub fn new(source: S, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize.into());
        }
        Ok(Self {
            source,
            batch_size,
            next_ordinal: 0,
            done: false,
        })
    }

    /// The ordinal the next emitted batch will carry
    #[must_use]
    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    fn fill(&mut self) -> Result<Option<Batch>> {
        let mut pairs = Vec::with_capacity(self.batch_size);
        while pairs.len() < self.batch_size {
            match self.source.next_pair()? {
                Some(pair) => pairs.push(pair),
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if pairs.is_empty() {
            return Ok(None);
        }
        let batch = Batch::new(self.next_ordinal, pairs);
        self.next_ordinal += 1;
        Ok(Some(batch))
    }
}

impl<S: PairSource> Iterator for Batcher<S> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fill() {
            Ok(batch) => batch.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
