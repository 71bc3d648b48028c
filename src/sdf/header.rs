use std::io::{self, Read, Write};

use bytemuck::{Pod, Zeroable};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{FILE_MAGIC, FILE_VERSION, INDEX_MAGIC};
use crate::{Result, error::ReadError};

/// Records carry quality scores
pub const PRESENCE_QUALITIES: u64 = 1 << 0;

/// The leading header of a sequence store.
///
/// This is stored identically in memory and on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct SdfHeader {
    /// File magic number
    magic: [u8; 7],
    /// File version number
    pub version: u8,
    /// A bitfield indicating which data fields are present in the file
    pub presence_flags: u64,
}
impl SdfHeader {
    #[must_use]
    pub fn new(qualities: bool) -> Self {
        let mut header = Self {
            magic: *FILE_MAGIC,
            version: FILE_VERSION,
            presence_flags: 0,
        };
        if qualities {
            header.set_qualities();
        }
        header
    }

    pub fn set_qualities(&mut self) {
        self.presence_flags |= PRESENCE_QUALITIES;
    }

    #[must_use]
    pub fn has_qualities(&self) -> bool {
        self.presence_flags & PRESENCE_QUALITIES != 0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8], resource: &str) -> Result<Self> {
        if bytes.len() < size_of::<Self>() {
            return Err(ReadError::corrupt(resource, "file is shorter than its header").into());
        }
        let header: Self = bytemuck::pod_read_unaligned(&bytes[..size_of::<Self>()]);
        if header.magic != *FILE_MAGIC {
            return Err(ReadError::corrupt(resource, "invalid file magic").into());
        }
        if header.version != FILE_VERSION {
            return Err(ReadError::corrupt(
                resource,
                format!("unsupported format version {}", header.version),
            )
            .into());
        }
        Ok(header)
    }
}

/// The trailing footer of a sequence store, locating the metadata and the index.
///
/// This is stored identically in memory and on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct SdfFooter {
    pub num_sequences: u64,
    pub comment_len: u64,
    pub command_line_len: u64,
    pub read_group_len: u64,
    /// Number of bytes in the compressed index
    pub z_index_len: u64,
    /// Magic number identifying the index format
    magic: [u8; 8],
}
impl SdfFooter {
    #[must_use]
    pub fn new(
        num_sequences: u64,
        comment_len: u64,
        command_line_len: u64,
        read_group_len: u64,
        z_index_len: u64,
    ) -> Self {
        Self {
            num_sequences,
            comment_len,
            command_line_len,
            read_group_len,
            z_index_len,
            magic: *INDEX_MAGIC,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Parses the footer from the last bytes of `bytes`
    pub fn from_tail(bytes: &[u8], resource: &str) -> Result<Self> {
        if bytes.len() < size_of::<SdfHeader>() + size_of::<Self>() {
            return Err(ReadError::corrupt(resource, "file is too short to hold a footer").into());
        }
        let footer: Self = bytemuck::pod_read_unaligned(&bytes[bytes.len() - size_of::<Self>()..]);
        if footer.magic != *INDEX_MAGIC {
            return Err(ReadError::corrupt(resource, "invalid index footer magic").into());
        }
        Ok(footer)
    }

    /// Total length of the metadata section in bytes
    #[must_use]
    pub fn metadata_len(&self) -> u64 {
        self.comment_len
            .saturating_add(self.command_line_len)
            .saturating_add(self.read_group_len)
    }
}

/// Location of one record inside the record region
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset of the record from the start of the file
    pub offset: u64,
    pub name_len: u32,
    pub seq_len: u32,
}
impl IndexEntry {
    pub const SIZE: usize = 16;

    /// Record size in bytes (name + bases + optional qualities)
    #[must_use]
    pub fn record_len(&self, qualities: bool) -> u64 {
        let seq = u64::from(self.seq_len);
        u64::from(self.name_len) + if qualities { seq * 2 } else { seq }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.name_len)?;
        writer.write_u32::<LittleEndian>(self.seq_len)?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            offset: reader.read_u64::<LittleEndian>()?,
            name_len: reader.read_u32::<LittleEndian>()?,
            seq_len: reader.read_u32::<LittleEndian>()?,
        })
    }
}
