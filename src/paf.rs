//! PAF input: line parsing and conversion into compact alignment records.
//!
//! Columns 1-12 are the standard PAF fields. The aligner's `AS:i:` tag is
//! mandatory for this tool (the selection engine ranks by alignment score);
//! rows without it are treated as malformed.

use anyhow::{bail, Context, Result};
use log::warn;
use noodles::bgzf;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::alignment_store::Alignment;
use crate::seq_registry::SeqRegistry;

/// At most this many unknown contig names are collected for the error report.
const MAX_REPORTED_IDS: usize = 20;

/// Fraction of malformed rows above which parsing aborts.
pub const MAX_MALFORMED_FRACTION: f64 = 0.01;

/// Open a possibly bgzip-compressed text input, detected by extension.
pub fn open_text_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz" || ext == "bgz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(bgzf::Reader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// One parsed PAF row, still carrying string names.
#[derive(Debug, Clone)]
pub struct PafRow {
    pub query_name: String,
    pub query_len: u32,
    pub query_start: u32,
    pub query_end: u32,
    pub strand: char,
    pub target_name: String,
    pub target_len: u32,
    pub target_start: u32,
    pub target_end: u32,
    pub matches: u32,
    pub block_len: u32,
    pub mapq: u8,
    /// Value of the `AS:i:` tag, if present.
    pub score: Option<i32>,
}

/// Parse a single PAF line. Errors on missing or non-numeric mandatory
/// fields and on degenerate intervals.
pub fn parse_paf_row(line: &str) -> Result<PafRow> {
    let fields: Vec<&str> = line.trim_end().split('\t').collect();
    if fields.len() < 12 {
        bail!("PAF row has {} fields, expected at least 12", fields.len());
    }

    let strand = fields[4].chars().next().unwrap_or(' ');
    if strand != '+' && strand != '-' {
        bail!("invalid strand {:?}", fields[4]);
    }

    let mut row = PafRow {
        query_name: fields[0].to_string(),
        query_len: fields[1].parse().context("query length")?,
        query_start: fields[2].parse().context("query start")?,
        query_end: fields[3].parse().context("query end")?,
        strand,
        target_name: fields[5].to_string(),
        target_len: fields[6].parse().context("target length")?,
        target_start: fields[7].parse().context("target start")?,
        target_end: fields[8].parse().context("target end")?,
        matches: fields[9].parse().context("matches")?,
        block_len: fields[10].parse().context("block length")?,
        mapq: fields[11].parse().context("mapping quality")?,
        score: None,
    };

    if row.query_start >= row.query_end {
        bail!(
            "degenerate query interval {}..{}",
            row.query_start,
            row.query_end
        );
    }
    if row.target_start >= row.target_end {
        bail!(
            "degenerate target interval {}..{}",
            row.target_start,
            row.target_end
        );
    }

    for field in &fields[12..] {
        if let Some(value) = field.strip_prefix("AS:i:") {
            row.score = Some(value.parse().context("AS tag value")?);
            break;
        }
    }

    Ok(row)
}

/// Read a PAF stream into compact alignment records.
///
/// Query names must already exist in `queries` (seeded from the assembly
/// FASTA); unknown names are an input-consistency error reported with a
/// bounded list of offenders. Target names are interned into `targets` on
/// first sight. Malformed rows (including rows without `AS:i:`) are skipped
/// with a warning, but more than [`MAX_MALFORMED_FRACTION`] of them aborts.
pub fn read_paf<P: AsRef<Path>>(
    path: P,
    queries: &SeqRegistry,
    targets: &mut SeqRegistry,
) -> Result<Vec<Alignment>> {
    let path = path.as_ref();
    let reader = open_text_input(path)?;

    let mut alignments = Vec::new();
    let mut total_rows = 0u64;
    let mut malformed = 0u64;
    let mut unknown: BTreeSet<String> = BTreeSet::new();
    let mut unknown_total = 0u64;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.is_empty() {
            continue;
        }
        total_rows += 1;

        let row = match parse_paf_row(&line) {
            Ok(row) => row,
            Err(e) => {
                malformed += 1;
                warn!(
                    "{}:{}: skipping malformed PAF row: {e}",
                    path.display(),
                    line_no + 1
                );
                continue;
            }
        };

        let score = match row.score {
            Some(score) => score,
            None => {
                malformed += 1;
                warn!(
                    "{}:{}: skipping PAF row without AS:i: tag",
                    path.display(),
                    line_no + 1
                );
                continue;
            }
        };

        let query = match queries.get(&row.query_name) {
            Some(id) => id,
            None => {
                unknown_total += 1;
                if unknown.len() < MAX_REPORTED_IDS {
                    unknown.insert(row.query_name.clone());
                }
                continue;
            }
        };

        let target = targets.intern(&row.target_name);
        alignments.push(Alignment {
            query,
            target,
            query_start: row.query_start,
            query_end: row.query_end,
            target_start: row.target_start,
            target_end: row.target_end,
            matches: row.matches,
            block_len: row.block_len,
            score,
            mapq: row.mapq,
            reverse: row.strand == '-',
        });
    }

    if unknown_total > 0 {
        let shown: Vec<&str> = unknown.iter().map(|s| s.as_str()).collect();
        bail!(
            "{} PAF rows name query contigs absent from the assembly FASTA \
             (first {}: {})",
            unknown_total,
            shown.len(),
            shown.join(", ")
        );
    }

    if total_rows > 0 {
        let fraction = malformed as f64 / total_rows as f64;
        if fraction > MAX_MALFORMED_FRACTION {
            bail!(
                "{malformed} of {total_rows} PAF rows malformed ({:.1}%), refusing input",
                fraction * 100.0
            );
        }
    }

    Ok(alignments)
}
