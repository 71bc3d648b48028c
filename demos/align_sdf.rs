use std::{
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

use anyhow::Result;
use pairalign::{
    ExactAligner, PairedStoreSource, PipelineBuilder, SamHeader, SamSink, SdfReader, SdfWriter,
    SequenceStore, record::complement,
};
use rand::{Rng, SeedableRng, rngs::SmallRng};

const NUM_PAIRS: usize = 10_000;
const READ_LEN: usize = 100;
const FRAGMENT_LEN: usize = 350;

fn random_bases(rng: &mut SmallRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.random_range(0..4)]).collect()
}

/// Writes a reference store with two random contigs
fn write_references(path: &Path, rng: &mut SmallRng) -> Result<()> {
    let mut writer = SdfWriter::create(path, false)?;
    writer.set_comment("simulated contigs")?;
    for (name, len) in [("contig_1", 50_000), ("contig_2", 20_000)] {
        writer.write_sequence(name.as_bytes(), &random_bases(rng, len), None)?;
    }
    writer.finish()?;
    Ok(())
}

/// Samples fragments from the references and writes their two ends to separate stores
fn write_reads(refs: &SdfReader, left: &Path, right: &Path, rng: &mut SmallRng) -> Result<()> {
    let read_group = "@RG\tID:sim\tSM:demo\tPL:ILLUMINA";
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let mut writers = [SdfWriter::create(left, true)?, SdfWriter::create(right, true)?];
    for writer in &mut writers {
        writer.set_read_group(read_group)?;
        writer.set_command_line(command_line.as_str())?;
    }

    let qual: &[u8] = &[b'I'; READ_LEN];
    for idx in 0..NUM_PAIRS {
        let reference = refs.read(rng.random_range(0..refs.num_sequences()))?;
        let start = rng.random_range(0..reference.len() - FRAGMENT_LEN);
        let fragment = &reference[start..start + FRAGMENT_LEN];

        let first = fragment[..READ_LEN].to_vec();
        let mut second = fragment[FRAGMENT_LEN - READ_LEN..]
            .iter()
            .rev()
            .map(|&b| complement(b))
            .collect::<Vec<_>>();
        // one in twenty second ends picks up a sequencing error
        if rng.random_bool(0.05) {
            second[READ_LEN / 2] = b'N';
        }

        writers[0].write_sequence(format!("frag_{idx}/1").as_bytes(), &first, Some(qual))?;
        writers[1].write_sequence(format!("frag_{idx}/2").as_bytes(), &second, Some(qual))?;
    }
    for writer in &mut writers {
        writer.finish()?;
    }
    Ok(())
}

pub fn main() -> Result<()> {
    env_logger::init();

    let dir = std::env::args()
        .nth(1)
        .map_or_else(std::env::temp_dir, PathBuf::from);
    let refs_path = dir.join("pairalign_refs.sdf");
    let left_path = dir.join("pairalign_reads_1.sdf");
    let right_path = dir.join("pairalign_reads_2.sdf");

    let mut rng = SmallRng::seed_from_u64(42);
    write_references(&refs_path, &mut rng)?;
    let refs = SdfReader::open(&refs_path)?;
    write_reads(&refs, &left_path, &right_path, &mut rng)?;

    let source =
        PairedStoreSource::new(SdfReader::open(&left_path)?, SdfReader::open(&right_path)?)?;
    let header = SamHeader::from_references(&refs)?.with_provenance(source.left());
    let aligner = ExactAligner::from_store(&refs)?;
    let sink = SamSink::new(BufWriter::new(io::stdout()), header)?;

    let report = PipelineBuilder::default()
        .batch_size(500)
        .build()?
        .run(source, aligner, sink)?;

    eprintln!(
        "Aligned {} pairs in {} batches ({} SAM records)",
        report.pairs,
        report.batches,
        report.sink.records_written()
    );
    eprintln!("{}", report.stats);
    Ok(())
}
