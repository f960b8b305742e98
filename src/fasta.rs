//! Assembly FASTA input and filtered output.
//!
//! Reading records per-contig length and GC content and seeds the contig
//! registry in FASTA order; writing re-streams the input emitting only
//! retained records, so sequences are never held in memory.

use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use log::info;
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::seq_registry::SeqRegistry;
use crate::summary::ContigSummary;

/// Parsed assembly: contig registry plus one summary per contig with
/// length and GC set.
pub struct Assembly {
    pub names: SeqRegistry,
    pub contigs: Vec<ContigSummary>,
}

fn open_fasta<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader: Box<dyn Read> = if path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "gz")
        .unwrap_or(false)
    {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Contig id: the header token up to the first whitespace.
fn header_id(line: &str) -> &str {
    line[1..].split_whitespace().next().unwrap_or("")
}

/// Stream an assembly FASTA, recording length and GC% per contig.
/// Duplicate contig names are fatal.
pub fn read_assembly<P: AsRef<Path>>(path: P) -> Result<Assembly> {
    let path = path.as_ref();
    let reader = open_fasta(path)?;

    let mut names = SeqRegistry::new();
    let mut contigs: Vec<ContigSummary> = Vec::new();
    let mut length = 0u64;
    let mut gc = 0u64;
    let mut current: Option<String> = None;

    let mut flush = |name: Option<String>, length: u64, gc: u64| -> Result<()> {
        if let Some(name) = name {
            if names.get(&name).is_some() {
                bail!("duplicate contig {name} in {}", path.display());
            }
            let id = names.intern(&name);
            if length > u32::MAX as u64 {
                bail!("contig {name} longer than 2^32-1 bases");
            }
            let gc_percent = if length > 0 {
                (gc as f64 / length as f64 * 100.0) as f32
            } else {
                0.0
            };
            contigs.push(ContigSummary::new(id, length as u32, gc_percent));
        }
        Ok(())
    };

    for line in reader.lines() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if let Some(rest) = line.strip_prefix('>') {
            flush(current.take(), length, gc)?;
            let id = rest.split_whitespace().next().unwrap_or("");
            if id.is_empty() {
                bail!("FASTA header without a sequence name in {}", path.display());
            }
            current = Some(id.to_string());
            length = 0;
            gc = 0;
        } else {
            if current.is_none() && !line.trim().is_empty() {
                bail!("sequence data before first FASTA header in {}", path.display());
            }
            for b in line.bytes() {
                match b {
                    b'G' | b'C' | b'g' | b'c' => {
                        gc += 1;
                        length += 1;
                    }
                    b if b.is_ascii_alphabetic() => length += 1,
                    _ => {}
                }
            }
        }
    }
    flush(current.take(), length, gc)?;

    if contigs.is_empty() {
        bail!("no sequences found in {}", path.display());
    }
    info!("assembly: {} contigs", contigs.len());
    Ok(Assembly { names, contigs })
}

/// Re-stream the input FASTA, writing only retained contigs. Returns
/// (written, skipped) record counts.
pub fn write_filtered<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    retained: &FxHashSet<String>,
) -> Result<(u64, u64)> {
    let reader = open_fasta(&input)?;
    let output = output.as_ref();
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("failed to create {}", output.display()))?,
    );

    let mut written = 0u64;
    let mut skipped = 0u64;
    let mut keeping = false;
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('>') {
            keeping = retained.contains(header_id(&line));
            if keeping {
                written += 1;
            } else {
                skipped += 1;
            }
        }
        if keeping {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    info!(
        "filtered assembly: {written} contigs written, {skipped} dropped -> {}",
        output.display()
    );
    Ok((written, skipped))
}
