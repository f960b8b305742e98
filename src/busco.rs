//! BUSCO `full_table.tsv` input. Purely informational: gene counts decorate
//! the ledger and reports, they never influence selection.

use anyhow::{Context, Result};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::BufRead;
use std::path::Path;

use crate::paf::open_text_input;

/// Complete/Duplicated BUSCO gene ids per contig.
pub type BuscoTable = FxHashMap<String, FxHashSet<String>>;

/// Completeness of a contig set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuscoCounts {
    /// Genes found exactly once across the set.
    pub complete_single: usize,
    /// Genes found more than once across the set.
    pub duplicated: usize,
}

/// Parse a BUSCO full table. Comment lines start with `#`; the columns of
/// interest are busco id, status and sequence. Only `Complete` and
/// `Duplicated` genes are recorded.
pub fn read_busco<P: AsRef<Path>>(path: P) -> Result<BuscoTable> {
    let path = path.as_ref();
    let reader = open_text_input(path)?;

    let mut table: BuscoTable = FxHashMap::default();
    let mut skipped = 0u64;
    for line in reader.lines() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let (gene, status, sequence) = match (fields.next(), fields.next(), fields.next()) {
            (Some(g), Some(s), Some(q)) if !q.is_empty() => (g, s, q),
            _ => {
                skipped += 1;
                continue;
            }
        };
        if status == "Complete" || status == "Duplicated" {
            table
                .entry(sequence.to_string())
                .or_default()
                .insert(gene.to_string());
        }
    }
    if skipped > 0 {
        warn!("{skipped} BUSCO rows without a sequence column in {}", path.display());
    }
    Ok(table)
}

/// Count single-copy and duplicated genes over a set of contigs.
pub fn busco_counts(table: &BuscoTable, contigs: &FxHashSet<String>) -> BuscoCounts {
    let mut occurrences: FxHashMap<&str, usize> = FxHashMap::default();
    for (contig, genes) in table {
        if !contigs.contains(contig) {
            continue;
        }
        for gene in genes {
            *occurrences.entry(gene.as_str()).or_insert(0) += 1;
        }
    }

    let mut counts = BuscoCounts::default();
    for &n in occurrences.values() {
        if n == 1 {
            counts.complete_single += 1;
        } else {
            counts.duplicated += 1;
        }
    }
    counts
}
