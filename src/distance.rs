//! Sparse symmetric pairwise-distance index over query contigs.
//!
//! Distances are stored once per unordered pair; a per-contig adjacency
//! table (sorted by distance) serves threshold-bounded neighbour queries.
//! A missing pair means "unknown", which every caller treats as larger than
//! any threshold.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::Path;

use crate::paf::{open_text_input, MAX_MALFORMED_FRACTION};
use crate::seq_registry::{SeqId, SeqRegistry};

/// Mash rows with a p-value at or above this are discarded on load.
pub const MAX_P_VALUE: f64 = 0.05;

const MAX_REPORTED_IDS: usize = 20;

#[derive(Debug, Default)]
pub struct DistanceIndex {
    pairs: FxHashMap<(SeqId, SeqId), f32>,
    /// Per-contig neighbours sorted by (distance, id). Built by `finalize`.
    adjacency: Vec<Vec<(SeqId, f32)>>,
}

fn ordered(a: SeqId, b: SeqId) -> (SeqId, SeqId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl DistanceIndex {
    pub fn new(n_contigs: usize) -> Self {
        DistanceIndex {
            pairs: FxHashMap::default(),
            adjacency: vec![Vec::new(); n_contigs],
        }
    }

    /// Record a pairwise distance. Self-pairs are ignored; on duplicate
    /// submissions the first value wins.
    pub fn insert(&mut self, a: SeqId, b: SeqId, d: f32) {
        if a == b {
            return;
        }
        let key = ordered(a, b);
        if let Some(&existing) = self.pairs.get(&key) {
            if (existing - d).abs() > f32::EPSILON {
                debug!(
                    "duplicate distance for pair ({a}, {b}): keeping {existing}, ignoring {d}"
                );
            }
            return;
        }
        self.pairs.insert(key, d);
    }

    /// Build the adjacency table. Must be called after the last `insert`
    /// and before any `neighbors` query.
    pub fn finalize(&mut self) {
        for list in &mut self.adjacency {
            list.clear();
        }
        for (&(a, b), &d) in &self.pairs {
            self.adjacency[a as usize].push((b, d));
            self.adjacency[b as usize].push((a, d));
        }
        for list in &mut self.adjacency {
            list.sort_by(|x, y| {
                x.1.partial_cmp(&y.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| x.0.cmp(&y.0))
            });
        }
    }

    /// Distance between two contigs. `Some(0.0)` for a contig and itself,
    /// `None` when the pair was never supplied.
    pub fn distance(&self, a: SeqId, b: SeqId) -> Option<f32> {
        if a == b {
            return Some(0.0);
        }
        self.pairs.get(&ordered(a, b)).copied()
    }

    /// All contigs within `tau` of `a`, nearest first.
    pub fn neighbors(&self, a: SeqId, tau: f64) -> impl Iterator<Item = (SeqId, f32)> + '_ {
        self.adjacency[a as usize]
            .iter()
            .take_while(move |&&(_, d)| d as f64 <= tau)
            .copied()
    }

    /// Number of stored unordered pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Approximate heap footprint, for the pre-flight memory gate.
    pub fn estimated_bytes(&self) -> u64 {
        let pair_entry = (std::mem::size_of::<(SeqId, SeqId)>() + std::mem::size_of::<f32>()) as u64;
        let adj_entry = std::mem::size_of::<(SeqId, f32)>() as u64;
        self.pairs.len() as u64 * (pair_entry + 2 * adj_entry)
    }
}

/// Read a distance stream into an index.
///
/// Accepts three-column `a b d` rows or five-column Mash `dist` output
/// (`a b d p-value shared-hashes`); five-column rows with p >= 0.05 are
/// dropped. Both endpoint names must exist in `contigs` (fatal otherwise);
/// distances outside [0, 1] are malformed rows, skipped with a warning and
/// subject to the 1% abort rule.
pub fn read_distances<P: AsRef<Path>>(
    path: P,
    contigs: &SeqRegistry,
) -> Result<DistanceIndex> {
    let path = path.as_ref();
    let reader = open_text_input(path)?;

    let mut index = DistanceIndex::new(contigs.len());
    let mut total_rows = 0u64;
    let mut malformed = 0u64;
    let mut p_filtered = 0u64;
    let mut unknown: BTreeSet<String> = BTreeSet::new();
    let mut unknown_total = 0u64;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.is_empty() {
            continue;
        }
        total_rows += 1;

        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        let parsed = parse_distance_fields(&fields);
        let (name_a, name_b, d, p) = match parsed {
            Ok(row) => row,
            Err(e) => {
                malformed += 1;
                warn!(
                    "{}:{}: skipping malformed distance row: {e}",
                    path.display(),
                    line_no + 1
                );
                continue;
            }
        };

        if let Some(p) = p {
            if p >= MAX_P_VALUE {
                p_filtered += 1;
                continue;
            }
        }

        let mut resolve = |name: &str| match contigs.get(name) {
            Some(id) => Some(id),
            None => {
                unknown_total += 1;
                if unknown.len() < MAX_REPORTED_IDS {
                    unknown.insert(name.to_string());
                }
                None
            }
        };
        let (a, b) = match (resolve(name_a), resolve(name_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };

        index.insert(a, b, d as f32);
    }

    if unknown_total > 0 {
        let shown: Vec<&str> = unknown.iter().map(|s| s.as_str()).collect();
        bail!(
            "{} distance rows name contigs absent from the assembly FASTA (first {}: {})",
            unknown_total,
            shown.len(),
            shown.join(", ")
        );
    }

    if total_rows > 0 && (malformed as f64 / total_rows as f64) > MAX_MALFORMED_FRACTION {
        bail!(
            "{malformed} of {total_rows} distance rows malformed, refusing input"
        );
    }

    if p_filtered > 0 {
        info!("dropped {p_filtered} distance rows with p-value >= {MAX_P_VALUE}");
    }

    index.finalize();
    info!("distance index: {} pairs", index.len());
    Ok(index)
}

fn parse_distance_fields<'a>(
    fields: &[&'a str],
) -> Result<(&'a str, &'a str, f64, Option<f64>)> {
    if fields.len() < 3 {
        bail!("expected at least 3 tab-separated columns, found {}", fields.len());
    }
    let d: f64 = fields[2].parse().context("distance value")?;
    if !(0.0..=1.0).contains(&d) {
        bail!("distance {d} outside [0, 1]");
    }
    let p = if fields.len() >= 4 {
        Some(fields[3].parse::<f64>().context("p-value")?)
    } else {
        None
    };
    Ok((fields[0], fields[1], d, p))
}
