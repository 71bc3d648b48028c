//! Destinations for ordered batches
//!
//! A [`BatchSink`] only ever sees batches in ordinal order: it is driven by the
//! [`ReorderingWriter`](crate::ReorderingWriter), which holds it behind its lock.

use std::io::Write;

use auto_impl::auto_impl;

use crate::{
    Alignment, Batch, Result, Sequence,
    error::WriteError,
    record::complement,
    sdf::SequenceStore,
};

/// Trait for consumers of aligned batches
#[auto_impl(&mut, Box)]
pub trait BatchSink: Send {
    /// Consumes one batch. Batches arrive in strictly increasing ordinal order.
    fn write_batch(&mut self, batch: Batch) -> Result<()>;

    /// Called once after the final batch has been written
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects batches in memory
impl BatchSink for Vec<Batch> {
    fn write_batch(&mut self, batch: Batch) -> Result<()> {
        self.push(batch);
        Ok(())
    }
}

// SAM flag bits
pub const FLAG_PAIRED: u16 = 0x1;
pub const FLAG_PROPER_PAIR: u16 = 0x2;
pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;
pub const FLAG_REVERSE: u16 = 0x10;
pub const FLAG_MATE_REVERSE: u16 = 0x20;
pub const FLAG_FIRST: u16 = 0x40;
pub const FLAG_SECOND: u16 = 0x80;

/// Derives the SAM flag of one end from its own and its mate's alignment
#[must_use]
pub fn sam_flags(this: Option<&Alignment>, mate: Option<&Alignment>, is_first: bool) -> u16 {
    let mut flags = FLAG_PAIRED | if is_first { FLAG_FIRST } else { FLAG_SECOND };
    match this {
        Some(a) if a.reverse => flags |= FLAG_REVERSE,
        Some(_) => {}
        None => flags |= FLAG_UNMAPPED,
    }
    match mate {
        Some(m) if m.reverse => flags |= FLAG_MATE_REVERSE,
        Some(_) => {}
        None => flags |= FLAG_MATE_UNMAPPED,
    }
    if let (Some(a), Some(m)) = (this, mate) {
        if a.reference_id == m.reference_id && a.reverse != m.reverse {
            flags |= FLAG_PROPER_PAIR;
        }
    }
    flags
}

/// Header lines written at the top of a SAM stream
#[derive(Clone, Debug, Default)]
pub struct SamHeader {
    /// Reference names and lengths, in `reference_id` order
    references: Vec<(String, u64)>,
    /// Full `@RG` line
    read_group: Option<String>,
    command_line: Option<String>,
}
impl SamHeader {
    #[must_use]
    pub fn new(references: Vec<(String, u64)>) -> Self {
        Self {
            references,
            ..Default::default()
        }
    }

    /// Declares every sequence of `store` as a reference
    pub fn from_references<S: SequenceStore>(store: &S) -> Result<Self> {
        let references = (0..store.num_sequences())
            .map(|id| -> Result<(String, u64)> {
                let name = std::str::from_utf8(store.name(id)?)?;
                let name = name.split_ascii_whitespace().next().unwrap_or_default();
                Ok((name.to_string(), store.length(id)? as u64))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(references))
    }

    /// Takes the read group and command line of a read store, when it has them
    #[must_use]
    pub fn with_provenance<S: SequenceStore>(mut self, reads: &S) -> Self {
        if !reads.sam_read_group().is_empty() {
            self.read_group = Some(reads.sam_read_group().to_string());
        }
        if !reads.command_line().is_empty() {
            self.command_line = Some(reads.command_line().to_string());
        }
        self
    }

    #[must_use]
    pub fn with_read_group(mut self, read_group: impl Into<String>) -> Self {
        self.read_group = Some(read_group.into());
        self
    }

    #[must_use]
    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = Some(command_line.into());
        self
    }

    #[must_use]
    pub fn references(&self) -> &[(String, u64)] {
        &self.references
    }

    /// The `ID` field of the read group line, attached to every record as `RG:Z`
    #[must_use]
    pub fn read_group_id(&self) -> Option<&str> {
        self.read_group
            .as_deref()?
            .split('\t')
            .find_map(|field| field.strip_prefix("ID:"))
    }

    fn reference_name(&self, reference_id: usize) -> Result<&str> {
        self.references
            .get(reference_id)
            .map(|(name, _)| name.as_str())
            .ok_or_else(|| {
                WriteError::UnknownReference {
                    reference_id,
                    num_references: self.references.len(),
                }
                .into()
            })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "@HD\tVN:1.6\tSO:unsorted")?;
        for (name, length) in &self.references {
            writeln!(writer, "@SQ\tSN:{name}\tLN:{length}")?;
        }
        if let Some(read_group) = &self.read_group {
            writeln!(writer, "{read_group}")?;
        }
        write!(
            writer,
            "@PG\tID:{name}\tPN:{name}\tVN:{version}",
            name = env!("CARGO_PKG_NAME"),
            version = env!("CARGO_PKG_VERSION")
        )?;
        if let Some(command_line) = &self.command_line {
            write!(writer, "\tCL:{command_line}")?;
        }
        writeln!(writer)?;
        Ok(())
    }
}

/// Writes aligned pairs as SAM text, two records per pair.
///
/// The header is written when the sink is created.
pub struct SamSink<W: Write + Send> {
    writer: W,
    header: SamHeader,
    /// Scratch for reverse-complemented bases and reversed qualities
    sbuf: Vec<u8>,
    qbuf: Vec<u8>,
    records_written: u64,
}

impl<W: Write + Send> SamSink<W> {
    pub fn new(mut writer: W, header: SamHeader) -> Result<Self> {
        header.write(&mut writer)?;
        Ok(Self {
            writer,
            header,
            sbuf: Vec::new(),
            qbuf: Vec::new(),
            records_written: 0,
        })
    }

    #[must_use]
    pub fn header(&self) -> &SamHeader {
        &self.header
    }

    /// Number of SAM records (not pairs) written so far
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(
        &mut self,
        read: &Sequence,
        this: Option<&Alignment>,
        mate: Option<&Alignment>,
        mate_len: usize,
        is_first: bool,
    ) -> Result<()> {
        let flags = sam_flags(this, mate, is_first);

        // an unmapped end is placed at its mate's position
        let placement = this.or(mate);
        let (rname, pos) = match placement {
            Some(a) => (self.header.reference_name(a.reference_id)?, a.position + 1),
            None => ("*", 0),
        };
        let mate_placement = mate.or(this);
        let (rnext, pnext) = match (mate_placement, placement) {
            (Some(m), Some(p)) if m.reference_id == p.reference_id => ("=", m.position + 1),
            (Some(m), _) => (self.header.reference_name(m.reference_id)?, m.position + 1),
            (None, _) => ("*", 0),
        };
        let tlen = match (this, mate) {
            (Some(a), Some(m)) if a.reference_id == m.reference_id => {
                template_length(a, read.len(), m, mate_len, is_first)
            }
            _ => 0,
        };
        let (mapq, cigar) = match this {
            Some(a) => (a.mapq, a.cigar.as_str()),
            None => (0, "*"),
        };

        let reverse = this.is_some_and(|a| a.reverse);
        self.sbuf.clear();
        self.qbuf.clear();
        if reverse {
            self.sbuf
                .extend(read.data().iter().rev().map(|&b| complement(b)));
            self.qbuf.extend(read.quality().iter().rev());
        } else {
            self.sbuf.extend_from_slice(read.data());
            self.qbuf.extend_from_slice(read.quality());
        }

        self.writer.write_all(qname(read.name()))?;
        write!(
            self.writer,
            "\t{flags}\t{rname}\t{pos}\t{mapq}\t{cigar}\t{rnext}\t{pnext}\t{tlen}\t"
        )?;
        let seq: &[u8] = if self.sbuf.is_empty() { b"*" } else { &self.sbuf };
        let qual: &[u8] = if self.qbuf.is_empty() { b"*" } else { &self.qbuf };
        self.writer.write_all(seq)?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(qual)?;
        if let Some(id) = self.header.read_group_id() {
            write!(self.writer, "\tRG:Z:{id}")?;
        }
        self.writer.write_all(b"\n")?;
        self.records_written += 1;
        Ok(())
    }
}

impl<W: Write + Send> BatchSink for SamSink<W> {
    fn write_batch(&mut self, batch: Batch) -> Result<()> {
        for pair in batch.pairs() {
            let alignment = pair.alignment();
            let (first, second) = (alignment.first.as_ref(), alignment.second.as_ref());
            self.write_record(pair.first(), first, second, pair.second().len(), true)?;
            self.write_record(pair.second(), second, first, pair.first().len(), false)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Read name up to the first whitespace, without a trailing `/1` or `/2`
fn qname(name: &[u8]) -> &[u8] {
    let end = name
        .iter()
        .position(u8::is_ascii_whitespace)
        .unwrap_or(name.len());
    let name = &name[..end];
    name.strip_suffix(b"/1")
        .or_else(|| name.strip_suffix(b"/2"))
        .unwrap_or(name)
}

/// Signed observed template length: positive for the leftmost end
fn template_length(
    this: &Alignment,
    this_len: usize,
    mate: &Alignment,
    mate_len: usize,
    is_first: bool,
) -> i64 {
    let start = this.position.min(mate.position);
    let end = (this.position + this_len as u64).max(mate.position + mate_len as u64);
    let span = (end - start) as i64;
    if this.position < mate.position || (this.position == mate.position && is_first) {
        span
    } else {
        -span
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        Error, Pair, PairAlignment, SequenceBuilder,
        sdf::{SdfReader, SdfWriter},
    };

    fn hit(reference_id: usize, position: u64, reverse: bool, len: usize) -> Alignment {
        Alignment {
            reference_id,
            position,
            reverse,
            mapq: 60,
            score: len as i32,
            cigar: format!("{len}M"),
        }
    }

    fn pair(first: Option<Alignment>, second: Option<Alignment>) -> Pair {
        let r1 = SequenceBuilder::default()
            .name(b"frag1/1")
            .data(b"ACGTT")
            .quality(b"ABCDE")
            .build()
            .unwrap();
        let r2 = SequenceBuilder::default()
            .name(b"frag1/2 extra")
            .data(b"GGCAA")
            .quality(b"FGHIJ")
            .build()
            .unwrap();
        let mut pair = Pair::new(r1, r2);
        pair.set_alignment(PairAlignment { first, second });
        pair
    }

    fn render(header: SamHeader, batches: Vec<Batch>) -> Result<String> {
        let mut sink = SamSink::new(Vec::new(), header)?;
        for batch in batches {
            sink.write_batch(batch)?;
        }
        sink.finish()?;
        Ok(String::from_utf8(sink.into_inner()).unwrap())
    }

    #[test]
    fn test_flags() {
        let fwd = hit(0, 10, false, 5);
        let rev = hit(0, 40, true, 5);
        assert_eq!(sam_flags(Some(&fwd), Some(&rev), true), 0x1 | 0x2 | 0x20 | 0x40);
        assert_eq!(sam_flags(Some(&rev), Some(&fwd), false), 0x1 | 0x2 | 0x10 | 0x80);
        assert_eq!(sam_flags(None, None, true), 0x1 | 0x4 | 0x8 | 0x40);
        assert_eq!(sam_flags(Some(&fwd), None, false), 0x1 | 0x8 | 0x80);
        // same strand is not a proper pair
        assert_eq!(sam_flags(Some(&fwd), Some(&fwd), true) & FLAG_PROPER_PAIR, 0);
    }

    #[test]
    fn test_header_lines() {
        let header = SamHeader::new(vec![("chr1".into(), 1000), ("chr2".into(), 500)])
            .with_read_group("@RG\tID:rg7\tSM:sample")
            .with_command_line("pairalign map");
        assert_eq!(header.read_group_id(), Some("rg7"));
        let text = render(header, Vec::new()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "@HD\tVN:1.6\tSO:unsorted");
        assert_eq!(lines[1], "@SQ\tSN:chr1\tLN:1000");
        assert_eq!(lines[2], "@SQ\tSN:chr2\tLN:500");
        assert_eq!(lines[3], "@RG\tID:rg7\tSM:sample");
        assert!(lines[4].starts_with("@PG\tID:pairalign"));
        assert!(lines[4].ends_with("\tCL:pairalign map"));
    }

    #[test]
    fn test_proper_pair_records() {
        let header = SamHeader::new(vec![("chr1".into(), 100)]).with_read_group("@RG\tID:rg1");
        let batch = Batch::new(0, vec![pair(Some(hit(0, 10, false, 5)), Some(hit(0, 30, true, 5)))]);
        let text = render(header, vec![batch]).unwrap();
        let records = text.lines().filter(|l| !l.starts_with('@')).collect::<Vec<_>>();
        assert_eq!(
            records[0],
            "frag1\t99\tchr1\t11\t60\t5M\t=\t31\t25\tACGTT\tABCDE\tRG:Z:rg1"
        );
        // reverse strand: reverse-complemented bases, reversed qualities
        assert_eq!(
            records[1],
            "frag1\t147\tchr1\t31\t60\t5M\t=\t11\t-25\tTTGCC\tJIHGF\tRG:Z:rg1"
        );
    }

    #[test]
    fn test_unmapped_mate_is_placed_with_mapped_end() {
        let header = SamHeader::new(vec![("chr1".into(), 100)]);
        let batch = Batch::new(0, vec![pair(Some(hit(0, 4, false, 5)), None)]);
        let text = render(header, vec![batch]).unwrap();
        let records = text.lines().filter(|l| !l.starts_with('@')).collect::<Vec<_>>();
        assert_eq!(records[0], "frag1\t73\tchr1\t5\t60\t5M\t=\t5\t0\tACGTT\tABCDE");
        assert_eq!(records[1], "frag1\t133\tchr1\t5\t0\t*\t=\t5\t0\tGGCAA\tFGHIJ");
    }

    #[test]
    fn test_unknown_reference() {
        let header = SamHeader::new(vec![("chr1".into(), 100)]);
        let batch = Batch::new(0, vec![pair(Some(hit(3, 4, false, 5)), None)]);
        assert!(matches!(
            render(header, vec![batch]),
            Err(Error::WriteError(WriteError::UnknownReference {
                reference_id: 3,
                num_references: 1
            }))
        ));
    }

    #[test]
    fn test_header_from_stores() {
        let mut refs = SdfWriter::new(Cursor::new(Vec::new()), false).unwrap();
        refs.write_sequence(b"chrA description", b"ACGTACGT", None).unwrap();
        refs.write_sequence(b"chrB", b"ACG", None).unwrap();
        let refs = SdfReader::from_bytes(refs.into_inner().unwrap().into_inner(), "refs").unwrap();

        let mut reads = SdfWriter::new(Cursor::new(Vec::new()), false).unwrap();
        reads.set_read_group("@RG\tID:lane1\tSM:x").unwrap();
        reads.set_command_line("pairalign format").unwrap();
        let reads = SdfReader::from_bytes(reads.into_inner().unwrap().into_inner(), "reads").unwrap();

        let header = SamHeader::from_references(&refs)
            .unwrap()
            .with_provenance(&reads);
        assert_eq!(
            header.references(),
            &[("chrA".to_string(), 8), ("chrB".to_string(), 3)]
        );
        assert_eq!(header.read_group_id(), Some("lane1"));
    }

    fn write_two<K: BatchSink>(mut sink: K) {
        sink.write_batch(Batch::new(0, Vec::new())).unwrap();
        sink.write_batch(Batch::new(1, Vec::new())).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_vec_sink_through_mut_ref() {
        let mut batches: Vec<Batch> = Vec::new();
        write_two(&mut batches);
        let ordinals = batches.iter().map(Batch::ordinal).collect::<Vec<_>>();
        assert_eq!(ordinals, vec![0, 1]);
    }
}
