use std::sync::Arc;

use memchr::memmem::Finder;

use super::Aligner;
use crate::{
    Alignment, Pair, PairAlignment, Result, Sequence,
    error::AlignError,
    record::complement,
    sdf::SequenceStore,
    stats::MappingStats,
};

/// Mapping quality reported for reads with a single exact placement
pub const UNIQUE_MAPQ: u8 = 60;

/// Aligns reads by exact forward or reverse-complement matching against a reference set.
///
/// Reads with a single placement get [`UNIQUE_MAPQ`], reads with several get 0 and
/// the leftmost forward placement is reported. This is a reference implementation of
/// [`Aligner`] rather than a sensitive mapper.
#[derive(Clone)]
pub struct ExactAligner {
    /// Upper-cased reference sequences, shared between worker clones
    references: Arc<Vec<Vec<u8>>>,

    // thread-local scratch buffers
    fwd: Vec<u8>,
    rev: Vec<u8>,

    // thread-local statistics
    stats: MappingStats,
}

impl ExactAligner {
    #[must_use]
    pub fn new(references: Vec<Vec<u8>>) -> Self {
        let references = references
            .into_iter()
            .map(|mut r| {
                r.make_ascii_uppercase();
                r
            })
            .collect();
        Self {
            references: Arc::new(references),
            fwd: Vec::new(),
            rev: Vec::new(),
            stats: MappingStats::default(),
        }
    }

    /// Loads every sequence of `store` as a reference
    pub fn from_store<S: SequenceStore>(store: &S) -> Result<Self> {
        let references = (0..store.num_sequences())
            .map(|id| store.read(id).map(<[u8]>::to_vec))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(references))
    }

    #[must_use]
    pub fn num_references(&self) -> usize {
        self.references.len()
    }

    /// Fills the scratch buffers with the upper-cased read and its reverse complement
    fn prepare(&mut self, read: &Sequence) -> Result<()> {
        self.fwd.clear();
        self.rev.clear();
        for (position, &base) in read.data().iter().enumerate() {
            let upper = base.to_ascii_uppercase();
            if !matches!(upper, b'A' | b'C' | b'G' | b'T' | b'N') {
                return Err(AlignError::InvalidResidue {
                    name: String::from_utf8_lossy(read.name()).into_owned(),
                    residue: char::from(base),
                    position,
                }
                .into());
            }
            self.fwd.push(upper);
        }
        self.rev.extend(self.fwd.iter().rev().map(|&b| complement(b)));
        Ok(())
    }

    fn align_read(&mut self, read: &Sequence) -> Result<Option<Alignment>> {
        self.prepare(read)?;
        if self.fwd.is_empty() {
            return Ok(None);
        }

        let (fwd_hit, fwd_count) = find_placements(&self.references, &self.fwd);
        let (rev_hit, rev_count) = find_placements(&self.references, &self.rev);
        let (hit, reverse) = match (fwd_hit, rev_hit) {
            (Some(hit), _) => (hit, false),
            (None, Some(hit)) => (hit, true),
            (None, None) => return Ok(None),
        };

        let len = self.fwd.len();
        Ok(Some(Alignment {
            reference_id: hit.0,
            position: hit.1 as u64,
            reverse,
            mapq: if fwd_count + rev_count == 1 { UNIQUE_MAPQ } else { 0 },
            score: i32::try_from(len).unwrap_or(i32::MAX),
            cigar: format!("{len}M"),
        }))
    }
}

impl Aligner for ExactAligner {
    type Stats = MappingStats;

    fn process_reads(&mut self, pairs: &mut [Pair]) -> Result<()> {
        for pair in pairs.iter_mut() {
            let first = self.align_read(pair.first())?;
            let second = self.align_read(pair.second())?;
            pair.set_alignment(PairAlignment { first, second });
            self.stats.record_pair(pair);
        }
        Ok(())
    }

    fn stats(&self) -> &MappingStats {
        &self.stats
    }

    fn take_stats(&mut self) -> MappingStats {
        std::mem::take(&mut self.stats)
    }
}

/// Returns the first placement `(reference_id, position)` and the number of
/// placements found, counting at most two
fn find_placements(references: &[Vec<u8>], needle: &[u8]) -> (Option<(usize, usize)>, usize) {
    let finder = Finder::new(needle);
    let mut first = None;
    let mut count = 0;
    for (reference_id, reference) in references.iter().enumerate() {
        for position in finder.find_iter(reference) {
            if first.is_none() {
                first = Some((reference_id, position));
            }
            count += 1;
            if count > 1 {
                return (first, count);
            }
        }
    }
    (first, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, SequenceBuilder};

    const REFERENCE: &[u8] = b"TTTTACGTACCGGATTTTGGGAAACCCTTTT";

    fn read(name: &str, data: &[u8]) -> Sequence {
        SequenceBuilder::default()
            .name(name.as_bytes())
            .data(data)
            .build()
            .unwrap()
    }

    #[test]
    fn test_forward_and_reverse_hits() {
        let mut aligner = ExactAligner::new(vec![REFERENCE.to_vec()]);
        // ACGTACCGGA occurs forward at 4; TCCCAAA is the reverse complement of TTTGGGA
        let mut pairs = vec![Pair::new(read("p/1", b"acgtaccgga"), read("p/2", b"TCCCAAA"))];
        aligner.process_reads(&mut pairs).unwrap();

        let alignment = pairs[0].alignment();
        let first = alignment.first.as_ref().unwrap();
        assert_eq!(first.position, 4);
        assert!(!first.reverse);
        assert_eq!(first.mapq, UNIQUE_MAPQ);
        assert_eq!(first.cigar, "10M");

        let second = alignment.second.as_ref().unwrap();
        assert!(second.reverse);
        assert_eq!(second.position, 15);
    }

    #[test]
    fn test_repeated_read_has_zero_mapq() {
        let mut aligner = ExactAligner::new(vec![REFERENCE.to_vec()]);
        let mut pairs = vec![Pair::new(read("p/1", b"TTTT"), read("p/2", b"GCGCGCGC"))];
        aligner.process_reads(&mut pairs).unwrap();
        let alignment = pairs[0].alignment();
        assert_eq!(alignment.first.as_ref().unwrap().mapq, 0);
        assert!(alignment.second.is_none());
    }

    #[test]
    fn test_stats_are_taken_and_reset() {
        let mut aligner = ExactAligner::new(vec![REFERENCE.to_vec()]);
        let mut pairs = vec![
            Pair::new(read("a/1", b"ACGTACC"), read("a/2", b"GGGGGGG")),
            Pair::new(read("b/1", b"GGAAACCC"), read("b/2", b"CCGGAT")),
        ];
        aligner.process_reads(&mut pairs).unwrap();
        assert_eq!(aligner.stats().pairs, 2);

        let taken = aligner.take_stats();
        assert_eq!(taken.pairs, 2);
        assert_eq!(taken.mapped_reads, 3);
        assert_eq!(taken.unmapped_reads, 1);
        assert_eq!(aligner.stats(), &MappingStats::default());
    }

    #[test]
    fn test_invalid_residue_is_fatal() {
        let mut aligner = ExactAligner::new(vec![REFERENCE.to_vec()]);
        let mut pairs = vec![Pair::new(read("bad/1", b"ACXT"), read("bad/2", b"ACGT"))];
        let err = aligner.process_reads(&mut pairs).unwrap_err();
        match err {
            Error::AlignError(AlignError::InvalidResidue {
                name,
                residue,
                position,
            }) => {
                assert_eq!(name, "bad/1");
                assert_eq!(residue, 'X');
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_clones_share_references() {
        let aligner = ExactAligner::new(vec![REFERENCE.to_vec(), b"ACGT".to_vec()]);
        let clone = aligner.clone();
        assert_eq!(clone.num_references(), 2);
        assert!(Arc::ptr_eq(&aligner.references, &clone.references));
    }
}
