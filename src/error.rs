use std::error::Error as StdError;

/// Custom Result type for pairalign operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the pairalign library, encompassing all possible error cases
/// that can occur while reading, aligning and writing paired reads.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors that occur while reading from a sequence store or pair source
    #[error("Error reading sequences: {0}")]
    ReadError(#[from] ReadError),

    /// Errors from the single-sequence store writer
    #[error("Error writing sequences: {0}")]
    WriteError(#[from] WriteError),

    /// Errors raised while building records
    #[error("Error building record: {0}")]
    RecordError(#[from] RecordError),

    /// Errors raised by an aligner
    #[error("Alignment failed: {0}")]
    AlignError(#[from] AlignError),

    /// Invalid pipeline configuration, detected before any processing starts
    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] ConfigError),

    /// Errors raised by the ordering and dispatch machinery
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] PipelineError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// UTF-8 conversion errors
    #[error("Error with UTF8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Conversion errors from anyhow errors
    #[error("Generic error: {0}")]
    AnyhowError(#[from] anyhow::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}
impl Error {
    /// Checks if the error reports a structurally invalid sequence store.
    ///
    /// Corruption is permanent: retrying the same read will fail again.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::Corrupt { .. }))
    }

    /// Checks if the error is the cancellation signal observed by a worker
    /// after another task already failed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::PipelineError(PipelineError::Cancelled))
    }
}

/// Errors that can occur while reading sequences or pairs
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The underlying store is structurally invalid
    ///
    /// # Fields
    /// * `resource` - The store (usually a path) that failed validation
    /// * `reason` - What was found to be wrong
    #[error("Corrupt sequence store {resource}: {reason}")]
    Corrupt { resource: String, reason: String },

    /// Attempted to access a sequence index that is beyond the available range
    #[error("Requested sequence index ({requested_index}) is out of range ({max_index})")]
    OutOfRange {
        requested_index: usize,
        max_index: usize,
    },

    /// The two ends of a paired source do not hold the same number of reads
    #[error("Paired stores disagree on read count: left has {left}, right has {right}")]
    PairCountMismatch { left: usize, right: usize },
}
impl ReadError {
    pub fn corrupt(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while constructing records
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// Quality scores were provided but do not cover the bases exactly
    #[error("Quality length ({qual_len}) does not match sequence length ({seq_len}) for {name}")]
    QualityLengthMismatch {
        name: String,
        seq_len: usize,
        qual_len: usize,
    },
}

/// Errors that can occur while writing sequences with the single-sequence writer
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// The writer has already written its index and cannot accept more data
    #[error("Writer has already been finished")]
    Finished,

    /// An earlier write failed part way, so the store can no longer be closed out consistently
    #[error("Writer failed on an earlier I/O error and cannot continue")]
    Poisoned,

    /// When trying to write data without quality scores but the store expects them
    #[error("Quality flag is set in header but trying to write without quality scores.")]
    QualityFlagSet,

    /// When trying to write quality scores but the store was created without them
    #[error("Quality flag not set in header but trying to write quality scores.")]
    QualityFlagNotSet,

    /// The quality string does not cover the sequence exactly
    #[error("Quality length ({qual_len}) does not match sequence length ({seq_len})")]
    QualityLengthMismatch { seq_len: usize, qual_len: usize },

    /// Sequence names are stored with a 32-bit length
    #[error("Sequence name of {0} bytes exceeds the maximum name length")]
    NameTooLong(usize),

    /// Sequence lengths are stored with a 32-bit length
    #[error("Sequence of {0} bases exceeds the maximum sequence length")]
    SequenceTooLong(usize),

    /// An alignment names a reference the output header does not declare
    #[error("Alignment refers to reference {reference_id} but only {num_references} are declared")]
    UnknownReference {
        reference_id: usize,
        num_references: usize,
    },
}

/// Errors raised by aligners
#[derive(thiserror::Error, Debug)]
pub enum AlignError {
    /// A read contains a byte that is not a nucleotide
    #[error("Read {name} contains invalid residue {residue:?} at position {position}")]
    InvalidResidue {
        name: String,
        residue: char,
        position: usize,
    },

    /// The aligner could not process a batch
    #[error("Aligner failed on batch {ordinal}: {reason}")]
    Failed { ordinal: u64, reason: String },
}

/// Configuration errors, all fatal before processing begins
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Dispatch queue depth must be at least 1")]
    ZeroQueueDepth,

    #[error("Holding capacity must be at least 1")]
    ZeroHoldingCapacity,

    /// The reorder holding area must fit at least one batch per worker
    #[error("Holding capacity ({capacity}) must be at least the number of worker threads ({threads})")]
    HoldingCapacityTooSmall { capacity: usize, threads: usize },
}

/// Errors raised by the ordering and dispatch machinery
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Another task failed first; this task stopped without emitting
    #[error("Pipeline was cancelled")]
    Cancelled,

    /// An ordinal was submitted after it had already been emitted or while it is held
    #[error("Batch ordinal {ordinal} was submitted more than once (next expected: {next})")]
    DuplicateOrdinal { ordinal: u64, next: u64 },

    /// A worker thread panicked while processing a batch
    #[error("Worker thread {0} panicked")]
    WorkerPanicked(usize),

    /// The writer was finished while batches were still waiting for a predecessor
    #[error("Output is incomplete: next expected ordinal is {next} but {held} batches are still held")]
    IncompleteOutput { next: u64, held: usize },
}

/// Trait for converting arbitrary errors into `Error`
pub trait IntoPairalignError {
    fn into_pairalign_error(self) -> Error;
}

impl<E> IntoPairalignError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn into_pairalign_error(self) -> Error {
        Error::GenericError(Box::new(self))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum MyError {
        #[error("Custom error: {0}")]
        CustomError(String),
    }

    #[test]
    fn test_into_pairalign_error() {
        let my_error = MyError::CustomError(String::from("some error"));
        let error = my_error.into_pairalign_error();
        assert!(matches!(error, Error::GenericError(_)));
    }

    #[test]
    fn test_is_corrupt() {
        let error: Error = ReadError::corrupt("reads.sdf", "bad magic").into();
        assert!(error.is_corrupt());
        assert!(!error.is_cancelled());
    }

    #[test]
    fn test_is_corrupt_with_other_read_error() {
        let error: Error = ReadError::OutOfRange {
            requested_index: 10,
            max_index: 5,
        }
        .into();
        assert!(!error.is_corrupt());
    }

    #[test]
    fn test_is_cancelled() {
        let error: Error = PipelineError::Cancelled.into();
        assert!(error.is_cancelled());
        assert!(!error.is_corrupt());
    }

    #[test]
    fn test_corrupt_names_resource() {
        let error = ReadError::corrupt("/data/left.sdf", "truncated footer");
        let error_str = format!("{}", error);
        assert!(error_str.contains("/data/left.sdf"));
        assert!(error_str.contains("truncated footer"));
    }

    #[test]
    fn test_pair_count_mismatch() {
        let error = ReadError::PairCountMismatch { left: 12, right: 11 };
        let error_str = format!("{}", error);
        assert!(error_str.contains("12"));
        assert!(error_str.contains("11"));
    }

    #[test]
    fn test_holding_capacity_too_small() {
        let error = ConfigError::HoldingCapacityTooSmall {
            capacity: 2,
            threads: 8,
        };
        let error_str = format!("{}", error);
        assert!(error_str.contains('2'));
        assert!(error_str.contains('8'));
    }

    #[test]
    fn test_invalid_residue() {
        let error = AlignError::InvalidResidue {
            name: "read_7".to_string(),
            residue: 'X',
            position: 3,
        };
        let error_str = format!("{}", error);
        assert!(error_str.contains("read_7"));
        assert!(error_str.contains("'X'"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::other("disk full");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::IoError(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let error: Error = anyhow::anyhow!("aligner index missing").into();
        assert!(matches!(error, Error::AnyhowError(_)));
    }

    #[test]
    fn test_error_debug_output() {
        let error = Error::WriteError(WriteError::Finished);
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("WriteError"));
    }
}
