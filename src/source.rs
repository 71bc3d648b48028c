//! Ordered sources of read pairs
//!
//! A [`PairSource`] yields pairs in the order they were sequenced. The pipeline
//! consumes it from a single producer thread, so implementations need not be `Send`.

use auto_impl::auto_impl;

use crate::{
    Pair, Result,
    error::ReadError,
    sdf::SequenceStore,
};

/// A stream of read pairs in source order.
#[auto_impl(&mut, Box)]
pub trait PairSource {
    /// Returns the next pair, `Ok(None)` at end of stream.
    ///
    /// An underlying read failure is returned as an error; callers must not
    /// expect the source to recover afterwards.
    fn next_pair(&mut self) -> Result<Option<Pair>>;

    /// Number of pairs remaining, if known
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

/// Adapts any iterator of pairs (or of `Result<Pair>`) into a [`PairSource`]
pub struct IterSource<I> {
    inner: I,
}
impl<I> IterSource<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}
impl IterSource<std::iter::Map<std::vec::IntoIter<Pair>, fn(Pair) -> Result<Pair>>> {
    /// Builds an infallible source over an owned list of pairs
    #[must_use]
    pub fn from_pairs(pairs: Vec<Pair>) -> Self {
        Self::new(pairs.into_iter().map(Ok as fn(Pair) -> Result<Pair>))
    }
}
impl<I> PairSource for IterSource<I>
where
    I: Iterator<Item = Result<Pair>>,
{
    fn next_pair(&mut self) -> Result<Option<Pair>> {
        self.inner.next().transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        match self.inner.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(lower),
            _ => None,
        }
    }
}

/// Reads pairs from two sequence stores holding the first and second ends.
///
/// Record `i` of the left store is paired with record `i` of the right store.
pub struct PairedStoreSource<L, R> {
    left: L,
    right: R,
    next_id: usize,
    num_pairs: usize,
}
impl<L: SequenceStore, R: SequenceStore> PairedStoreSource<L, R> {
    pub fn new(left: L, right: R) -> Result<Self> {
        let (n_left, n_right) = (left.num_sequences(), right.num_sequences());
        if n_left != n_right {
            return Err(ReadError::PairCountMismatch {
                left: n_left,
                right: n_right,
            }
            .into());
        }
        Ok(Self {
            left,
            right,
            next_id: 0,
            num_pairs: n_left,
        })
    }

    #[must_use]
    pub fn num_pairs(&self) -> usize {
        self.num_pairs
    }

    /// Returns the store holding the first ends
    pub fn left(&self) -> &L {
        &self.left
    }

    /// Returns the store holding the second ends
    pub fn right(&self) -> &R {
        &self.right
    }
}
impl<L: SequenceStore, R: SequenceStore> PairSource for PairedStoreSource<L, R> {
    fn next_pair(&mut self) -> Result<Option<Pair>> {
        if self.next_id >= self.num_pairs {
            return Ok(None);
        }
        let first = self.left.sequence(self.next_id)?;
        let second = self.right.sequence(self.next_id)?;
        self.next_id += 1;
        Ok(Some(Pair::new(first, second)))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.num_pairs - self.next_id)
    }
}
