use crate::{Result, error::RecordError};

/// One sequencing read: an identifier, its bases and (optionally) its quality scores.
///
/// A `Sequence` is immutable once constructed. An empty quality buffer means the
/// read carries no quality scores; a non-empty one always covers the bases exactly.
///
/// # Example
///
/// ```
/// use pairalign::SequenceBuilder;
///
/// let read = SequenceBuilder::default()
///     .name(b"read_001/1")
///     .data(b"ACGTACGT")
///     .quality(b"IIIIFFFF")
///     .build()
///     .unwrap();
/// assert_eq!(read.len(), 8);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequence {
    name: Vec<u8>,
    data: Vec<u8>,
    quality: Vec<u8>,
}

impl Sequence {
    /// Creates a new sequence, validating that quality scores (if any) cover the bases
    pub fn new(name: Vec<u8>, data: Vec<u8>, quality: Vec<u8>) -> Result<Self> {
        if !quality.is_empty() && quality.len() != data.len() {
            return Err(RecordError::QualityLengthMismatch {
                name: String::from_utf8_lossy(&name).into_owned(),
                seq_len: data.len(),
                qual_len: quality.len(),
            }
            .into());
        }
        Ok(Self {
            name,
            data,
            quality,
        })
    }

    /// Returns the read identifier
    #[inline]
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the nucleotide bases
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the quality scores (empty if the read has none)
    #[inline]
    #[must_use]
    pub fn quality(&self) -> &[u8] {
        &self.quality
    }

    #[inline]
    #[must_use]
    pub fn has_quality(&self) -> bool {
        !self.quality.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Complements a nucleotide, preserving case. Anything that is not `ACGT` maps to `N`.
#[inline]
#[must_use]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        b'n' => b'n',
        _ => b'N',
    }
}

/// A convenience builder struct for creating a [`Sequence`] from borrowed buffers
#[derive(Default)]
pub struct SequenceBuilder<'a> {
    name: Option<&'a [u8]>,
    data: Option<&'a [u8]>,
    quality: Option<&'a [u8]>,
}

impl<'a> SequenceBuilder<'a> {
    /// Sets the read identifier
    #[must_use]
    pub fn name(mut self, name: &'a [u8]) -> Self {
        self.name = Some(name);
        self
    }

    /// Sets the nucleotide bases
    #[must_use]
    pub fn data(mut self, data: &'a [u8]) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the quality scores
    #[must_use]
    pub fn quality(mut self, quality: &'a [u8]) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Sets the quality scores from an Option
    #[must_use]
    pub fn opt_quality(mut self, quality: Option<&'a [u8]>) -> Self {
        self.quality = quality;
        self
    }

    /// Builds the owned `Sequence`
    ///
    /// Missing fields default to empty buffers.
    pub fn build(self) -> Result<Sequence> {
        Sequence::new(
            self.name.unwrap_or_default().to_vec(),
            self.data.unwrap_or_default().to_vec(),
            self.quality.unwrap_or_default().to_vec(),
        )
    }
}
