use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rustc_hash::FxHashSet;
use std::io::BufRead;
use std::path::PathBuf;

use purga::alignment_store::AlignmentStore;
use purga::busco::{busco_counts, read_busco};
use purga::distance::read_distances;
use purga::fasta::{self, Assembly};
use purga::paf::{open_text_input, read_paf};
use purga::purge::{PurgeConfig, PurgeInput, Purger};
use purga::report;
use purga::seq_registry::{SeqId, SeqRegistry};
use purga::stats::AssemblyStats;

/// Parse a number that may have a metric suffix (k/K=1000, m/M=1e6, g/G=1e9)
fn parse_metric_number(s: &str) -> Result<u64, String> {
    if s.is_empty() {
        return Err("Empty string".to_string());
    }

    let (num_part, suffix) = if s.ends_with(|c: char| c.is_ascii_alphabetic()) {
        let last_char = s.chars().last().unwrap();
        (&s[..s.len() - last_char.len_utf8()], Some(last_char))
    } else {
        (s, None)
    };

    let base: f64 = num_part
        .parse()
        .map_err(|e| format!("Invalid number: {e}"))?;

    let multiplier = match suffix {
        Some('k') | Some('K') => 1000.0,
        Some('m') | Some('M') => 1_000_000.0,
        Some('g') | Some('G') => 1_000_000_000.0,
        Some(c) => {
            return Err(format!(
                "Unknown suffix '{c}'. Use k/K (1000), m/M (1e6), or g/G (1e9)"
            ))
        }
        None => 1.0,
    };

    Ok((base * multiplier) as u64)
}

/// purga - reference-guided purging of duplicate haplotigs
///
/// Selects a non-redundant subset of an assembly using alignments to a
/// reference (PAF with AS:i: tags, e.g. minimap2 -c) as the spatial guide
/// and pairwise Mash distances between contigs as the similarity guide.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Alignments of assembly contigs against the reference (PAF, may be bgzipped)
    #[clap(short = 'p', long = "paf")]
    paf: PathBuf,

    /// Pairwise contig distances: `a b d` or Mash dist output (TSV, may be bgzipped)
    #[clap(short = 'm', long = "distances")]
    distances: PathBuf,

    /// Assembly FASTA (may be gzipped)
    #[clap(short = 'f', long = "fasta")]
    fasta: PathBuf,

    /// Optional BUSCO full_table.tsv, reported but never used for selection
    #[clap(short = 'b', long = "busco")]
    busco: Option<PathBuf>,

    /// File of contig ids to exclude before selection (one per line)
    #[clap(long = "exclude")]
    exclude: Option<PathBuf>,

    /// Output directory
    #[clap(short = 'o', long = "output", default_value = "./output")]
    output: PathBuf,

    /// Minimum mapping quality for an alignment to be considered
    #[clap(long = "min-mq", default_value_t = 20)]
    min_mq: u8,

    /// Minimum overlap in bases for tiling rejection and locus grouping
    #[clap(long = "min-overlap", default_value_t = 1)]
    min_overlap: u32,

    /// Champion length fraction below which a similar contig cannot be safeguarded
    #[clap(long = "min-size-safeguard", default_value_t = 0.50)]
    min_size_safeguard: f64,

    /// Fixed distance threshold (bypasses estimation)
    #[clap(long = "distance-threshold")]
    distance_threshold: Option<f64>,

    /// Discard all unaligned contigs instead of screening them
    #[clap(long = "aligned-only")]
    aligned_only: bool,

    /// Hard cap on tournament rounds per locus and rescue passes
    #[clap(long = "max-tournament-iterations", default_value_t = 100_000)]
    max_tournament_iterations: u64,

    /// Abort before processing if the alignment store plus distance index
    /// would exceed this many bytes (metric suffixes accepted)
    #[clap(long = "memory-limit", value_parser = parse_metric_number)]
    memory_limit: Option<u64>,

    /// Number of worker threads (0 = all cores)
    #[clap(short = 't', long = "threads", default_value_t = 0)]
    threads: usize,
}

/// Read a pre-filter exclusion list (e.g. GC outliers), one contig id per
/// line. Ids absent from the assembly are ignored with a warning.
fn read_exclusions(path: &PathBuf, names: &SeqRegistry) -> Result<FxHashSet<SeqId>> {
    let reader = open_text_input(path)?;
    let mut excluded = FxHashSet::default();
    for line in reader.lines() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let name = line.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        match names.get(name) {
            Some(id) => {
                excluded.insert(id);
            }
            None => log::warn!("excluded contig {name} not present in the assembly"),
        }
    }
    info!("{} contigs excluded by pre-filter", excluded.len());
    Ok(excluded)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .context("failed to configure the thread pool")?;
    }
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    info!("reading assembly {}", args.fasta.display());
    let Assembly { names, mut contigs } = fasta::read_assembly(&args.fasta)?;

    let excluded = match &args.exclude {
        Some(path) => read_exclusions(path, &names)?,
        None => FxHashSet::default(),
    };

    let busco_table = match &args.busco {
        Some(path) => {
            info!("reading BUSCO table {}", path.display());
            let table = read_busco(path)?;
            for contig in contigs.iter_mut() {
                if let Some(genes) = table.get(names.name(contig.id)) {
                    contig.busco_genes = genes.len() as u32;
                }
            }
            Some(table)
        }
        None => None,
    };

    info!("reading alignments {}", args.paf.display());
    let mut targets = SeqRegistry::new();
    let alignments = read_paf(&args.paf, &names, &mut targets)?;
    let store = AlignmentStore::build(alignments, args.min_mq, names.len(), targets.len());

    info!("reading distances {}", args.distances.display());
    let distances = read_distances(&args.distances, &names)?;

    let config = PurgeConfig {
        min_mq: args.min_mq,
        min_overlap: args.min_overlap,
        min_size_safeguard: args.min_size_safeguard,
        distance_threshold: args.distance_threshold,
        aligned_only: args.aligned_only,
        max_tournament_iterations: args.max_tournament_iterations,
        memory_limit: args.memory_limit,
    };
    let input = PurgeInput {
        contigs,
        store,
        distances,
        excluded,
    };
    let outcome = Purger::new(config).run(input, &names, &targets)?;

    report::write_decisions(args.output.join("decisions.tsv"), &outcome, &names, &targets)?;
    report::write_threshold(args.output.join("threshold.tsv"), &outcome)?;
    report::write_retained(args.output.join("retained.txt"), &outcome, &names)?;

    let initial_lengths: Vec<u32> = outcome.contigs.iter().map(|c| c.length).collect();
    let retained_lengths: Vec<u32> = outcome
        .kept
        .iter()
        .map(|&id| outcome.contigs[id as usize].length)
        .collect();
    let initial_stats = AssemblyStats::from_lengths(&initial_lengths);
    let retained_stats = AssemblyStats::from_lengths(&retained_lengths);

    let retained_names: FxHashSet<String> = outcome
        .kept
        .iter()
        .map(|&id| names.name(id).to_string())
        .collect();
    let (busco_initial, busco_retained) = match &busco_table {
        Some(table) => {
            let all: FxHashSet<String> = names.names().iter().cloned().collect();
            (
                Some(busco_counts(table, &all)),
                Some(busco_counts(table, &retained_names)),
            )
        }
        None => (None, None),
    };
    report::write_assembly_stats(
        args.output.join("assembly_stats.tsv"),
        &initial_stats,
        &retained_stats,
        busco_initial,
        busco_retained,
    )?;

    fasta::write_filtered(
        &args.fasta,
        args.output.join("filtered_assembly.fasta"),
        &retained_names,
    )?;

    info!("done; results in {}", args.output.display());
    Ok(())
}
