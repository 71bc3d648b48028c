use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use super::{
    DEFAULT_COMPRESSION_LEVEL,
    header::{IndexEntry, SdfFooter, SdfHeader},
};
use crate::{Result, error::WriteError};

/// Writes sequences one at a time into a sequence store.
///
/// The header is written on construction; sequences are appended as they arrive and
/// the metadata, compressed index and footer are written by [`SdfWriter::finish`].
/// A writer that goes out of scope unfinished is finished on drop, so the store is
/// always closed out on every exit path (errors during drop are logged).
///
/// An I/O error while appending a sequence poisons the writer: the bytes already on
/// disk no longer match the index, so every later call fails with
/// [`WriteError::Poisoned`] and nothing is written on drop.
///
/// # Example
///
/// ```
/// use pairalign::sdf::{SdfReader, SdfWriter};
/// use std::io::Cursor;
///
/// let mut writer = SdfWriter::new(Cursor::new(Vec::new()), true).unwrap();
/// writer.set_comment("demo reads").unwrap();
/// writer.write_sequence(b"read_1", b"ACGTACGT", Some(b"IIIIFFFF")).unwrap();
/// let bytes = writer.into_inner().unwrap().into_inner();
///
/// let reader = SdfReader::from_bytes(bytes, "memory").unwrap();
/// assert_eq!(reader.len(), 1);
/// ```
pub struct SdfWriter<W: Write> {
    /// Internal writer, only taken by `into_inner`
    inner: Option<W>,

    header: SdfHeader,

    /// Number of bytes written so far
    position: u64,

    /// Location of every record written
    index: Vec<IndexEntry>,

    comment: String,
    command_line: String,
    read_group: String,

    finished: bool,

    /// Set once a sequence was only partially written
    poisoned: bool,
}

impl SdfWriter<io::BufWriter<fs::File>> {
    /// Creates a buffered writer on a new file at `path`
    pub fn create<P: AsRef<Path>>(path: P, qualities: bool) -> Result<Self> {
        let handle = io::BufWriter::new(fs::File::create(path)?);
        Self::new(handle, qualities)
    }
}

impl<W: Write> SdfWriter<W> {
    /// Creates a new writer with the header written to the inner writer
    pub fn new(mut inner: W, qualities: bool) -> Result<Self> {
        let header = SdfHeader::new(qualities);
        inner.write_all(header.as_bytes())?;
        Ok(Self {
            inner: Some(inner),
            header,
            position: size_of::<SdfHeader>() as u64,
            index: Vec::new(),
            comment: String::new(),
            command_line: String::new(),
            read_group: String::new(),
            finished: false,
            poisoned: false,
        })
    }

    #[must_use]
    pub fn has_qualities(&self) -> bool {
        self.header.has_qualities()
    }

    /// Number of sequences written so far
    #[must_use]
    pub fn num_sequences(&self) -> usize {
        self.index.len()
    }

    fn check_open(&self) -> Result<()> {
        if self.poisoned {
            return Err(WriteError::Poisoned.into());
        }
        if self.finished {
            return Err(WriteError::Finished.into());
        }
        Ok(())
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) -> Result<()> {
        self.check_open()?;
        self.comment = comment.into();
        Ok(())
    }

    /// Records the command line used to build the store
    pub fn set_command_line(&mut self, command_line: impl Into<String>) -> Result<()> {
        self.check_open()?;
        self.command_line = command_line.into();
        Ok(())
    }

    /// Records the SAM read-group header line associated with the reads
    pub fn set_read_group(&mut self, read_group: impl Into<String>) -> Result<()> {
        self.check_open()?;
        self.read_group = read_group.into();
        Ok(())
    }

    /// Appends one sequence to the store.
    ///
    /// Quality scores must be provided if and only if the store was created with
    /// qualities, and must cover the bases exactly.
    pub fn write_sequence(&mut self, name: &[u8], data: &[u8], quality: Option<&[u8]>) -> Result<()> {
        self.check_open()?;
        match (self.header.has_qualities(), quality) {
            (true, None) => return Err(WriteError::QualityFlagSet.into()),
            (false, Some(_)) => return Err(WriteError::QualityFlagNotSet.into()),
            (true, Some(qual)) if qual.len() != data.len() => {
                return Err(WriteError::QualityLengthMismatch {
                    seq_len: data.len(),
                    qual_len: qual.len(),
                }
                .into());
            }
            _ => {}
        }
        let name_len = u32::try_from(name.len()).map_err(|_| WriteError::NameTooLong(name.len()))?;
        let seq_len = u32::try_from(data.len()).map_err(|_| WriteError::SequenceTooLong(data.len()))?;

        let entry = IndexEntry {
            offset: self.position,
            name_len,
            seq_len,
        };
        let Some(inner) = self.inner.as_mut() else {
            return Err(WriteError::Finished.into());
        };
        let written = inner
            .write_all(name)
            .and_then(|()| inner.write_all(data))
            .and_then(|()| quality.map_or(Ok(()), |qual| inner.write_all(qual)));
        if let Err(e) = written {
            log::error!("Failed to write sequence {}: {e}", self.index.len());
            self.poisoned = true;
            return Err(e.into());
        }
        self.position += entry.record_len(self.header.has_qualities());
        self.index.push(entry);
        Ok(())
    }

    /// Writes the metadata, index and footer, then flushes the inner writer.
    ///
    /// No further sequences can be written afterwards.
    pub fn finish(&mut self) -> Result<()> {
        self.check_open()?;
        let Some(inner) = self.inner.as_mut() else {
            return Err(WriteError::Finished.into());
        };
        // Mark finished up front so a failed finish is not retried on drop
        self.finished = true;

        inner.write_all(self.comment.as_bytes())?;
        inner.write_all(self.command_line.as_bytes())?;
        inner.write_all(self.read_group.as_bytes())?;

        let mut index_buf = Vec::with_capacity(self.index.len() * IndexEntry::SIZE);
        for entry in &self.index {
            entry.write(&mut index_buf)?;
        }
        let z_index = zstd::stream::encode_all(index_buf.as_slice(), DEFAULT_COMPRESSION_LEVEL)?;

        let footer = SdfFooter::new(
            self.index.len() as u64,
            self.comment.len() as u64,
            self.command_line.len() as u64,
            self.read_group.len() as u64,
            z_index.len() as u64,
        );
        inner.write_all(&z_index)?;
        inner.write_all(footer.as_bytes())?;
        inner.flush()?;

        log::debug!(
            "Finished sequence store with {} sequences ({} index bytes)",
            self.index.len(),
            z_index.len()
        );
        Ok(())
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Finishes the store if needed and returns the inner writer
    pub fn into_inner(mut self) -> Result<W> {
        if !self.finished {
            self.finish()?;
        }
        self.inner.take().ok_or_else(|| WriteError::Finished.into())
    }
}

impl<W: Write> Drop for SdfWriter<W> {
    fn drop(&mut self) {
        if self.finished || self.poisoned || self.inner.is_none() {
            return;
        }
        if let Err(e) = self.finish() {
            log::warn!("Failed to finish sequence store on drop: {e}");
        }
    }
}
