//! # Sequence store
//!
//! A compact, write-once store of named reads with optional quality scores and a small
//! amount of provenance metadata (comment, command line and SAM read-group line).
//!
//! ## File Structure
//!
//! ```text
//! ┌───────────────────┐
//! │   SDF Header      │ 16 bytes
//! ├───────────────────┤
//! │                   │
//! │     Records       │ name | bases | qualities (if flagged)
//! │                   │
//! ├───────────────────┤
//! │     Metadata      │ comment | command line | read group (UTF-8)
//! ├───────────────────┤
//! │ Compressed Index  │ ZSTD, 16 bytes per record
//! ├───────────────────┤
//! │   SDF Footer      │ 48 bytes
//! └───────────────────┘
//! ```
//!
//! Stores are written with [`SdfWriter`] (one sequence at a time) and read with
//! [`SdfReader`], which validates the whole layout up front.

mod header;
mod reader;
mod writer;

use auto_impl::auto_impl;

pub use header::{IndexEntry, SdfFooter, SdfHeader};
pub use reader::SdfReader;
pub use writer::SdfWriter;

use crate::{Result, Sequence};

/// The magic number for sequence store files.
pub const FILE_MAGIC: &[u8; 7] = b"PALNSDF";

/// The magic number closing the index footer.
pub const INDEX_MAGIC: &[u8; 8] = b"SDFINDEX";

/// The current file version.
pub const FILE_VERSION: u8 = 1;

/// The compression level used for the record index.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Read-only lookup of sequences by index, plus store-level metadata.
#[auto_impl(&, Box, Arc)]
pub trait SequenceStore {
    fn num_sequences(&self) -> usize;

    fn has_qualities(&self) -> bool;

    /// Name of sequence `id`
    fn name(&self, id: usize) -> Result<&[u8]>;

    /// Bases of sequence `id`
    fn read(&self, id: usize) -> Result<&[u8]>;

    /// Quality scores of sequence `id`, `None` if the store has none
    fn read_quality(&self, id: usize) -> Result<Option<&[u8]>>;

    /// Length of sequence `id` in bases
    fn length(&self, id: usize) -> Result<usize>;

    /// Owned copy of sequence `id`
    fn sequence(&self, id: usize) -> Result<Sequence>;

    /// The SAM `@RG` header line associated with the reads (may be empty)
    fn sam_read_group(&self) -> &str;

    fn comment(&self) -> &str;

    /// The command line used to build the store
    fn command_line(&self) -> &str;
}
