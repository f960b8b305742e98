//! TSV reports written from the decision ledger.

use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::busco::BuscoCounts;
use crate::purge::PurgeOutcome;
use crate::seq_registry::SeqRegistry;
use crate::stats::AssemblyStats;
use crate::threshold::EstimatorStatus;

fn create<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    Ok(BufWriter::new(File::create(path).with_context(|| {
        format!("failed to create {}", path.display())
    })?))
}

/// One row per contig: verdict, reason and the tournament evidence.
pub fn write_decisions<P: AsRef<Path>>(
    path: P,
    outcome: &PurgeOutcome,
    names: &SeqRegistry,
    targets: &SeqRegistry,
) -> Result<()> {
    let mut w = create(&path)?;
    writeln!(
        w,
        "contig\tlength\tgc_percent\tverdict\treason\tdisqualifier\titeration\
         \tnorm_score\tprimary_target\tlocus_start\tlocus_end\ttiled_intervals\
         \tbusco_genes\topponents"
    )?;

    for record in outcome.ledger.iter() {
        let contig = &outcome.contigs[record.id as usize];
        let disqualifier = record
            .disqualifier
            .map(|id| names.name(id).to_string())
            .unwrap_or_else(|| ".".to_string());
        let (target, start, end) = match contig.locus {
            Some(locus) => (
                targets.name(locus.target).to_string(),
                locus.start.to_string(),
                locus.end.to_string(),
            ),
            None => (".".to_string(), ".".to_string(), ".".to_string()),
        };
        let opponents = if record.opponents.is_empty() {
            ".".to_string()
        } else {
            record
                .opponents
                .iter()
                .map(|&id| names.name(id))
                .collect::<Vec<_>>()
                .join(",")
        };
        writeln!(
            w,
            "{}\t{}\t{:.2}\t{}\t{}\t{}\t{}\t{:.4}\t{}\t{}\t{}\t{}\t{}\t{}",
            names.name(record.id),
            contig.length,
            contig.gc_percent,
            record.verdict.as_str(),
            record.reason.as_str(),
            disqualifier,
            record.round,
            contig.norm_score,
            target,
            start,
            end,
            contig.tiled.len(),
            contig.busco_genes,
            opponents,
        )?;
    }
    w.flush()?;
    Ok(())
}

/// The threshold and how it was obtained.
pub fn write_threshold<P: AsRef<Path>>(path: P, outcome: &PurgeOutcome) -> Result<()> {
    let report = &outcome.threshold;
    let mut w = create(&path)?;
    writeln!(w, "tau\tsample_size\tstatus\tuser_supplied\tminima")?;
    let minima = if report.minima.is_empty() {
        ".".to_string()
    } else {
        report
            .minima
            .iter()
            .map(|m| format!("{m:.4}"))
            .collect::<Vec<_>>()
            .join(",")
    };
    writeln!(
        w,
        "{:.6}\t{}\t{}\t{}\t{}",
        report.tau,
        report.sample_size,
        report.status.as_str(),
        report.status == EstimatorStatus::UserSupplied,
        minima,
    )?;
    w.flush()?;
    Ok(())
}

/// Before/after contiguity table, with BUSCO completeness when available.
pub fn write_assembly_stats<P: AsRef<Path>>(
    path: P,
    initial: &AssemblyStats,
    retained: &AssemblyStats,
    busco_initial: Option<BuscoCounts>,
    busco_retained: Option<BuscoCounts>,
) -> Result<()> {
    let mut w = create(&path)?;
    writeln!(w, "metric\tinitial\tretained")?;
    writeln!(w, "contigs\t{}\t{}", initial.num_contigs, retained.num_contigs)?;
    writeln!(w, "total_bases\t{}\t{}", initial.total_bases, retained.total_bases)?;
    for x in (50..=100).step_by(10) {
        let find = |stats: &AssemblyStats| {
            stats
                .nx
                .iter()
                .find(|p| p.x == x)
                .map(|p| (p.length, p.count))
                .unwrap_or((0, 0))
        };
        let (il, ic) = find(initial);
        let (rl, rc) = find(retained);
        writeln!(w, "N{x}\t{il}\t{rl}")?;
        writeln!(w, "L{x}\t{ic}\t{rc}")?;
    }
    if let (Some(bi), Some(br)) = (busco_initial, busco_retained) {
        writeln!(
            w,
            "busco_complete_single\t{}\t{}",
            bi.complete_single, br.complete_single
        )?;
        writeln!(w, "busco_duplicated\t{}\t{}", bi.duplicated, br.duplicated)?;
    }
    w.flush()?;
    Ok(())
}

/// Kept contig ids, one per line, assembly order.
pub fn write_retained<P: AsRef<Path>>(
    path: P,
    outcome: &PurgeOutcome,
    names: &SeqRegistry,
) -> Result<()> {
    let mut w = create(&path)?;
    for &id in &outcome.kept {
        writeln!(w, "{}", names.name(id))?;
    }
    w.flush()?;
    info!("{} retained contig ids written", outcome.kept.len());
    Ok(())
}
