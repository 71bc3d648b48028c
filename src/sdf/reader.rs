use std::{
    fs,
    io::Read,
    ops::Range,
    path::Path,
};

use memmap2::Mmap;
use zstd::stream::Decoder;

use super::{
    SequenceStore,
    header::{IndexEntry, SdfFooter, SdfHeader},
};
use crate::{
    Result, Sequence,
    error::ReadError,
};

/// Read-only access to a sequence store.
///
/// The full structure (header, footer, metadata and every index entry) is validated
/// when the reader is created, so lookups afterwards only fail on out-of-range ids.
/// Any structural problem is reported as [`ReadError::Corrupt`] naming the resource.
///
/// The backing bytes are generic: [`SdfReader::open`] memory-maps a file, while
/// [`SdfReader::from_bytes`] accepts any in-memory buffer.
pub struct SdfReader<B: AsRef<[u8]> = Mmap> {
    data: B,
    resource: String,
    header: SdfHeader,
    index: Vec<IndexEntry>,
    comment: Range<usize>,
    command_line: Range<usize>,
    read_group: Range<usize>,
}

impl SdfReader<Mmap> {
    /// Memory-maps the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let resource = path.as_ref().display().to_string();
        let file = fs::File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::corrupt(resource, "not a regular file").into());
        }

        // Load the mmap
        let inner = unsafe { Mmap::map(&file) }?;
        Self::from_bytes(inner, resource)
    }
}

impl<B: AsRef<[u8]>> SdfReader<B> {
    /// Builds a reader over `data`, using `resource` to identify it in errors
    pub fn from_bytes(data: B, resource: impl Into<String>) -> Result<Self> {
        let resource = resource.into();
        let bytes = data.as_ref();

        let header = SdfHeader::from_bytes(bytes, &resource)?;
        let footer = SdfFooter::from_tail(bytes, &resource)?;

        // Walk backwards from the footer: [records][metadata][z_index][footer]
        let footer_start = bytes.len() - size_of::<SdfFooter>();
        let z_index_start = footer_start
            .checked_sub(footer.z_index_len as usize)
            .filter(|&start| start >= size_of::<SdfHeader>())
            .ok_or_else(|| ReadError::corrupt(&resource, "index extends past the file start"))?;
        let records_end = z_index_start
            .checked_sub(footer.metadata_len() as usize)
            .filter(|&start| start >= size_of::<SdfHeader>())
            .ok_or_else(|| ReadError::corrupt(&resource, "metadata extends past the file start"))?;

        let comment = records_end..records_end + footer.comment_len as usize;
        let command_line = comment.end..comment.end + footer.command_line_len as usize;
        let read_group = command_line.end..command_line.end + footer.read_group_len as usize;
        for span in [&comment, &command_line, &read_group] {
            if std::str::from_utf8(&bytes[span.clone()]).is_err() {
                return Err(ReadError::corrupt(&resource, "metadata is not valid UTF-8").into());
            }
        }

        let index = Self::load_index(
            &bytes[z_index_start..footer_start],
            &footer,
            &header,
            records_end as u64,
            &resource,
        )?;

        Ok(Self {
            data,
            resource,
            header,
            index,
            comment,
            command_line,
            read_group,
        })
    }

    /// Decompresses and validates the record index
    fn load_index(
        z_index: &[u8],
        footer: &SdfFooter,
        header: &SdfHeader,
        records_end: u64,
        resource: &str,
    ) -> Result<Vec<IndexEntry>> {
        let expected_len = usize::try_from(footer.num_sequences)
            .ok()
            .and_then(|n| n.checked_mul(IndexEntry::SIZE))
            .ok_or_else(|| ReadError::corrupt(resource, "declared index size overflows"))?;

        // Decode at most one byte past the declared size
        let mut index_buf = Vec::new();
        Decoder::new(z_index)
            .and_then(|decoder| {
                decoder
                    .take(expected_len as u64 + 1)
                    .read_to_end(&mut index_buf)
            })
            .map_err(|e| ReadError::corrupt(resource, format!("undecodable index: {e}")))?;
        if index_buf.len() > expected_len {
            return Err(ReadError::corrupt(
                resource,
                format!(
                    "index is larger than the {} entries the footer declares",
                    footer.num_sequences
                ),
            )
            .into());
        }

        if index_buf.len() % IndexEntry::SIZE != 0 {
            return Err(ReadError::corrupt(resource, "index has a partial entry").into());
        }
        let num_entries = index_buf.len() / IndexEntry::SIZE;
        if num_entries as u64 != footer.num_sequences {
            return Err(ReadError::corrupt(
                resource,
                format!(
                    "index holds {num_entries} entries but the footer declares {}",
                    footer.num_sequences
                ),
            )
            .into());
        }

        let mut index = Vec::with_capacity(num_entries);
        let mut expected_offset = size_of::<SdfHeader>() as u64;
        let mut cursor = index_buf.as_slice();
        for id in 0..num_entries {
            let entry = IndexEntry::read(&mut cursor)?;
            let end = entry.offset + entry.record_len(header.has_qualities());
            if entry.offset != expected_offset || end > records_end {
                return Err(ReadError::corrupt(
                    resource,
                    format!("record {id} lies outside the record region"),
                )
                .into());
            }
            expected_offset = end;
            index.push(entry);
        }
        if expected_offset != records_end {
            return Err(ReadError::corrupt(resource, "trailing bytes after the last record").into());
        }
        Ok(index)
    }

    /// The name used to identify this store in errors
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn entry(&self, id: usize) -> Result<&IndexEntry> {
        self.index.get(id).ok_or_else(|| {
            ReadError::OutOfRange {
                requested_index: id,
                max_index: self.index.len(),
            }
            .into()
        })
    }

    fn slice(&self, start: u64, len: u64) -> &[u8] {
        &self.data.as_ref()[start as usize..(start + len) as usize]
    }

    fn metadata(&self, span: &Range<usize>) -> &str {
        // validated as UTF-8 on construction
        std::str::from_utf8(&self.data.as_ref()[span.clone()]).unwrap_or_default()
    }
}

impl<B: AsRef<[u8]>> SequenceStore for SdfReader<B> {
    fn num_sequences(&self) -> usize {
        self.index.len()
    }

    fn has_qualities(&self) -> bool {
        self.header.has_qualities()
    }

    fn name(&self, id: usize) -> Result<&[u8]> {
        let entry = self.entry(id)?;
        Ok(self.slice(entry.offset, u64::from(entry.name_len)))
    }

    fn read(&self, id: usize) -> Result<&[u8]> {
        let entry = self.entry(id)?;
        Ok(self.slice(
            entry.offset + u64::from(entry.name_len),
            u64::from(entry.seq_len),
        ))
    }

    fn read_quality(&self, id: usize) -> Result<Option<&[u8]>> {
        let entry = self.entry(id)?;
        if !self.header.has_qualities() {
            return Ok(None);
        }
        let seq_len = u64::from(entry.seq_len);
        Ok(Some(self.slice(
            entry.offset + u64::from(entry.name_len) + seq_len,
            seq_len,
        )))
    }

    fn length(&self, id: usize) -> Result<usize> {
        Ok(self.entry(id)?.seq_len as usize)
    }

    fn sequence(&self, id: usize) -> Result<Sequence> {
        Sequence::new(
            self.name(id)?.to_vec(),
            self.read(id)?.to_vec(),
            self.read_quality(id)?.unwrap_or_default().to_vec(),
        )
    }

    fn sam_read_group(&self) -> &str {
        self.metadata(&self.read_group)
    }

    fn comment(&self) -> &str {
        self.metadata(&self.comment)
    }

    fn command_line(&self) -> &str {
        self.metadata(&self.command_line)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{Error, sdf::SdfWriter};

    fn build_store(qualities: bool) -> Vec<u8> {
        let mut writer = SdfWriter::new(Cursor::new(Vec::new()), qualities).unwrap();
        writer.set_comment("simulated reads").unwrap();
        writer.set_command_line("pairalign format -o reads.sdf").unwrap();
        writer.set_read_group("@RG\tID:rg1\tSM:s1\tPL:ILLUMINA").unwrap();
        let records: [(&[u8], &[u8], &[u8]); 3] = [
            (b"read_1", b"ACGTACGTAC", b"IIIIIIIIII"),
            (b"read_2", b"GGGCCC", b"FFFFFF"),
            (b"r3", b"", b""),
        ];
        for (name, data, qual) in records {
            writer
                .write_sequence(name, data, qualities.then_some(qual))
                .unwrap();
        }
        writer.into_inner().unwrap().into_inner()
    }

    #[test]
    fn test_lookups_with_qualities() {
        let reader = SdfReader::from_bytes(build_store(true), "mem").unwrap();
        assert_eq!(reader.num_sequences(), 3);
        assert!(reader.has_qualities());
        assert_eq!(reader.name(0).unwrap(), b"read_1");
        assert_eq!(reader.read(1).unwrap(), b"GGGCCC");
        assert_eq!(reader.read_quality(1).unwrap(), Some(&b"FFFFFF"[..]));
        assert_eq!(reader.length(0).unwrap(), 10);
        assert_eq!(reader.length(2).unwrap(), 0);

        let seq = reader.sequence(0).unwrap();
        assert_eq!(seq.name(), b"read_1");
        assert_eq!(seq.quality(), b"IIIIIIIIII");
    }

    #[test]
    fn test_lookups_without_qualities() {
        let reader = SdfReader::from_bytes(build_store(false), "mem").unwrap();
        assert!(!reader.has_qualities());
        assert_eq!(reader.read(0).unwrap(), b"ACGTACGTAC");
        assert_eq!(reader.read_quality(0).unwrap(), None);
        assert!(!reader.sequence(1).unwrap().has_quality());
    }

    #[test]
    fn test_metadata() {
        let reader = SdfReader::from_bytes(build_store(true), "mem").unwrap();
        assert_eq!(reader.comment(), "simulated reads");
        assert_eq!(reader.command_line(), "pairalign format -o reads.sdf");
        assert_eq!(reader.sam_read_group(), "@RG\tID:rg1\tSM:s1\tPL:ILLUMINA");
    }

    #[test]
    fn test_out_of_range() {
        let reader = SdfReader::from_bytes(build_store(true), "mem").unwrap();
        assert!(matches!(
            reader.name(3),
            Err(Error::ReadError(ReadError::OutOfRange {
                requested_index: 3,
                max_index: 3
            }))
        ));
    }

    #[test]
    fn test_empty_store() {
        let writer = SdfWriter::new(Cursor::new(Vec::new()), false).unwrap();
        let bytes = writer.into_inner().unwrap().into_inner();
        let reader = SdfReader::from_bytes(bytes, "mem").unwrap();
        assert!(reader.is_empty());
        assert_eq!(reader.comment(), "");
    }

    #[test]
    fn test_truncated_store_is_corrupt() {
        let bytes = build_store(true);
        let truncated = bytes[..bytes.len() - 5].to_vec();
        let err = SdfReader::from_bytes(truncated, "reads.sdf").err().unwrap();
        assert!(err.is_corrupt());
        assert!(format!("{err}").contains("reads.sdf"));
    }

    #[test]
    fn test_bad_index_is_corrupt() {
        let mut bytes = build_store(true);
        let footer_start = bytes.len() - size_of::<SdfFooter>();
        // clobber the first bytes of the compressed index
        let footer = SdfFooter::from_tail(&bytes, "mem").unwrap();
        let z_start = footer_start - footer.z_index_len as usize;
        bytes[z_start..z_start + 4].copy_from_slice(b"JUNK");
        let err = SdfReader::from_bytes(bytes, "left.sdf").err().unwrap();
        match err {
            Error::ReadError(ReadError::Corrupt { resource, .. }) => assert_eq!(resource, "left.sdf"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_footer_count_mismatch_is_corrupt() {
        let mut bytes = build_store(false);
        let footer_start = bytes.len() - size_of::<SdfFooter>();
        // num_sequences is the first footer field
        bytes[footer_start..footer_start + 8].copy_from_slice(&7u64.to_le_bytes());
        assert!(SdfReader::from_bytes(bytes, "mem").err().unwrap().is_corrupt());
    }

    #[test]
    fn test_oversized_index_is_corrupt() {
        let mut bytes = build_store(true);
        let footer_start = bytes.len() - size_of::<SdfFooter>();
        // the index holds three entries but the footer now declares one
        bytes[footer_start..footer_start + 8].copy_from_slice(&1u64.to_le_bytes());
        let err = SdfReader::from_bytes(bytes, "mem").err().unwrap();
        assert!(err.is_corrupt());
        assert!(format!("{err}").contains("larger than the 1 entries"));
    }

    #[test]
    fn test_not_a_store() {
        let err = SdfReader::from_bytes(vec![0u8; 128], "random.bin").err().unwrap();
        assert!(err.is_corrupt());
    }
}
