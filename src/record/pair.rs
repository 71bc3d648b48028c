use super::Sequence;

/// A single placement of one read end on a reference sequence.
///
/// The core pipeline never interprets alignments; it only carries them from the
/// aligner to the sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alignment {
    /// Index of the reference sequence (matches the sink's reference list)
    pub reference_id: usize,
    /// 0-based leftmost position on the reference
    pub position: u64,
    /// Whether the read aligned to the reverse strand
    pub reverse: bool,
    /// Mapping quality
    pub mapq: u8,
    /// Aligner-specific alignment score
    pub score: i32,
    /// CIGAR string describing the alignment
    pub cigar: String,
}

/// Alignment results attached to the two ends of a pair
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PairAlignment {
    pub first: Option<Alignment>,
    pub second: Option<Alignment>,
}
impl PairAlignment {
    #[must_use]
    pub fn is_both_mapped(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }

    #[must_use]
    pub fn num_mapped(&self) -> usize {
        usize::from(self.first.is_some()) + usize::from(self.second.is_some())
    }
}

/// Two associated reads (first-end and second-end) treated as one unit.
///
/// The reads themselves are immutable; only the attached [`PairAlignment`] is
/// written to, by the aligner that owns the batch containing this pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    first: Sequence,
    second: Sequence,
    alignment: PairAlignment,
}

impl Pair {
    #[must_use]
    pub fn new(first: Sequence, second: Sequence) -> Self {
        Self {
            first,
            second,
            alignment: PairAlignment::default(),
        }
    }

    /// Returns the first-end read
    #[inline]
    #[must_use]
    pub fn first(&self) -> &Sequence {
        &self.first
    }

    /// Returns the second-end read
    #[inline]
    #[must_use]
    pub fn second(&self) -> &Sequence {
        &self.second
    }

    #[inline]
    #[must_use]
    pub fn alignment(&self) -> &PairAlignment {
        &self.alignment
    }

    /// Attaches alignment results, replacing any previous ones
    #[inline]
    pub fn set_alignment(&mut self, alignment: PairAlignment) {
        self.alignment = alignment;
    }

    /// Total number of bases across both ends
    #[inline]
    #[must_use]
    pub fn num_bases(&self) -> usize {
        self.first.len() + self.second.len()
    }
}
