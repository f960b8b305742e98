//! Pipeline driver: wires the selection stages together.
//!
//! Stages C2 (locus assignment) and threshold finalisation are serial;
//! tiling, threshold sample collection and locus tournaments run on the
//! rayon pool. Loci have disjoint contig sets, so tournament workers never
//! contend; all verdict merging happens on the driver thread, which is the
//! only writer of contig state and of the decision ledger.

use anyhow::{bail, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::alignment_store::AlignmentStore;
use crate::distance::DistanceIndex;
use crate::ledger::{DecisionLedger, DecisionRecord};
use crate::locus::{build_loci, Locus};
use crate::primary_locus::assign_primary_loci;
use crate::seq_registry::{SeqId, SeqRegistry};
use crate::summary::{ContigSummary, Reason, Verdict};
use crate::threshold::{estimate_threshold, ThresholdReport};
use crate::tiling::tile_alignments;
use crate::tournament::{
    is_orphan, run_locus_tournament, Entrant, TournamentParams,
};
use crate::unaligned::screen_unaligned;

/// Selection options. Validated before any processing starts.
#[derive(Debug, Clone)]
pub struct PurgeConfig {
    /// Minimum mapping quality for an alignment to enter the store.
    pub min_mq: u8,
    /// Minimum overlap in bases, for tiling rejection and locus grouping.
    pub min_overlap: u32,
    /// Length fraction of the champion below which the size safeguard
    /// cannot fire.
    pub min_size_safeguard: f64,
    /// Fixed distance threshold; bypasses estimation when set.
    pub distance_threshold: Option<f64>,
    /// Discard all unaligned contigs instead of screening them.
    pub aligned_only: bool,
    /// Hard cap on tournament rounds per locus and on rescue passes.
    pub max_tournament_iterations: u64,
    /// Upper bound in bytes on the alignment store plus distance index.
    pub memory_limit: Option<u64>,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        PurgeConfig {
            min_mq: 20,
            min_overlap: 1,
            min_size_safeguard: 0.50,
            distance_threshold: None,
            aligned_only: false,
            max_tournament_iterations: 100_000,
            memory_limit: None,
        }
    }
}

impl PurgeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_size_safeguard) {
            bail!(
                "--min-size-safeguard must be within [0, 1], got {}",
                self.min_size_safeguard
            );
        }
        if let Some(tau) = self.distance_threshold {
            if !(0.0..=1.0).contains(&tau) {
                bail!("--distance-threshold must be within [0, 1], got {tau}");
            }
        }
        if self.max_tournament_iterations == 0 {
            bail!("--max-tournament-iterations must be positive");
        }
        Ok(())
    }
}

/// Everything the driver consumes. The store and index are read-only from
/// here on and shared across workers without locking.
pub struct PurgeInput {
    /// One summary per assembly contig, indexed by id (FASTA order).
    pub contigs: Vec<ContigSummary>,
    pub store: AlignmentStore,
    pub distances: DistanceIndex,
    /// Contigs excluded upstream (e.g. GC outliers).
    pub excluded: FxHashSet<SeqId>,
}

/// Final state of a run.
#[derive(Debug)]
pub struct PurgeOutcome {
    pub ledger: DecisionLedger,
    /// Retained contig ids in assembly order.
    pub kept: Vec<SeqId>,
    pub threshold: ThresholdReport,
    /// Per-contig state as frozen into the ledger, for reports.
    pub contigs: Vec<ContigSummary>,
}

/// Extra per-contig decision data merged from stage outcomes before the
/// ledger is written.
#[derive(Debug, Clone, Default)]
struct DecisionParts {
    opponents: Vec<SeqId>,
    round: u32,
}

pub struct Purger {
    config: PurgeConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl Purger {
    pub fn new(config: PurgeConfig) -> Self {
        Purger {
            config,
            cancel: None,
        }
    }

    /// Install an external cancel flag, checked between loci and before the
    /// unaligned screen. A cancelled run returns an error and emits nothing.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check_cancel(&self) -> Result<()> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                bail!("run cancelled");
            }
        }
        Ok(())
    }

    pub fn run(
        &self,
        input: PurgeInput,
        names: &SeqRegistry,
        targets: &SeqRegistry,
    ) -> Result<PurgeOutcome> {
        self.config.validate()?;

        let PurgeInput {
            mut contigs,
            store,
            distances,
            excluded,
        } = input;

        if let Some(limit) = self.config.memory_limit {
            let needed = store.estimated_bytes() + distances.estimated_bytes();
            if needed > limit {
                bail!(
                    "estimated working set {needed} bytes exceeds memory limit {limit} bytes"
                );
            }
        }

        // C2: primary locus per aligned contig. Excluded contigs take no
        // further part in the pipeline.
        info!("assigning primary loci");
        let assigned = assign_primary_loci(&store, targets);
        for contig in contigs.iter_mut() {
            if excluded.contains(&contig.id) {
                continue;
            }
            contig.locus = assigned[contig.id as usize];
        }

        // C3: tile each aligned contig on its primary target.
        info!("tiling alignments");
        let tiled: Vec<(SeqId, crate::tiling::TiledSet)> = contigs
            .par_iter()
            .filter(|c| c.locus.is_some())
            .map(|contig| {
                let locus = contig.locus.unwrap();
                let alns: Vec<&crate::alignment_store::Alignment> = store
                    .query_alignments(contig.id)
                    .filter(|a| a.target == locus.target)
                    .collect();
                (
                    contig.id,
                    tile_alignments(&alns, contig.length, self.config.min_overlap),
                )
            })
            .collect();
        for (id, set) in tiled {
            let contig = &mut contigs[id as usize];
            if set.intervals.is_empty() {
                contig.locus = None;
                contig.verdict = Verdict::UnalignedPending;
            } else {
                contig.norm_score = set.norm_score;
                contig.tiled = set.intervals;
                contig.verdict = Verdict::Pending;
            }
        }

        // C6 grouping, needed before C5: the threshold sample is drawn from
        // contig pairs with overlapping loci.
        let loci = build_loci(&contigs, self.config.min_overlap);
        info!(
            "{} loci across {} targets",
            loci.len(),
            targets.len()
        );

        // C5: threshold from co-located pair distances.
        let sample = collect_colocated_distances(&contigs, &distances, targets.len());
        let threshold = estimate_threshold(sample, self.config.distance_threshold)?;
        let tau = threshold.tau;

        // C6: per-locus tournaments.
        info!("running locus tournaments (tau = {tau:.4})");
        let params = TournamentParams {
            tau,
            min_size_safeguard: self.config.min_size_safeguard,
            max_iterations: self.config.max_tournament_iterations,
        };
        let mut parts: Vec<DecisionParts> = vec![DecisionParts::default(); contigs.len()];
        let mut locus_rounds: Vec<u32> = vec![0; loci.len()];

        let results: Result<Vec<(usize, Vec<crate::tournament::Outcome>, u32, bool)>> = loci
            .par_iter()
            .enumerate()
            .map(|(locus_idx, locus)| {
                self.check_cancel()?;
                let entrants = make_entrants(&locus.members, &contigs, names);
                let (outcomes, rounds, capped) =
                    run_locus_tournament(&entrants, &distances, &params, 0, false);
                Ok((locus_idx, outcomes, rounds, capped))
            })
            .collect();

        for (locus_idx, outcomes, rounds, capped) in results? {
            locus_rounds[locus_idx] = rounds;
            if capped {
                warn!(
                    "locus {} on {} hit the iteration cap",
                    locus_idx,
                    targets.name(loci[locus_idx].target)
                );
            }
            for outcome in outcomes {
                apply_outcome(&mut contigs, &mut parts, outcome);
            }
        }

        // Orphan rescue: global barrier, then per-locus re-runs until a
        // full pass finds nothing new.
        let rescue_passes = self.rescue_orphans(
            &loci,
            &mut contigs,
            &mut parts,
            &mut locus_rounds,
            names,
            &distances,
            &params,
        )?;
        debug!("orphan rescue finished after {rescue_passes} passes");

        // C7: screen unaligned contigs against the retained set.
        self.check_cancel()?;
        info!("screening unaligned contigs");
        let mut retained: Vec<SeqId> = contigs
            .iter()
            .filter(|c| c.verdict == Verdict::Kept)
            .map(|c| c.id)
            .collect();
        let candidates: Vec<(SeqId, u32, String)> = contigs
            .iter()
            .filter(|c| c.verdict == Verdict::UnalignedPending && !excluded.contains(&c.id))
            .map(|c| (c.id, c.length, names.name(c.id).to_string()))
            .collect();
        let screened = screen_unaligned(
            candidates,
            &mut retained,
            &distances,
            tau,
            self.config.aligned_only,
        );
        for outcome in screened {
            let contig = &mut contigs[outcome.id as usize];
            contig.verdict = outcome.verdict;
            contig.reason = Some(outcome.reason);
            contig.disqualifier = outcome.disqualifier;
        }

        // C8: freeze every contig into the ledger, assembly order.
        let mut ledger = DecisionLedger::new(contigs.len());
        for contig in contigs.iter_mut() {
            if excluded.contains(&contig.id) {
                contig.verdict = Verdict::Discarded;
                contig.reason = Some(Reason::GcOutlier);
            }
            let reason = match contig.reason {
                Some(reason) => reason,
                None => bail!(
                    "internal: contig {} reached the ledger with verdict {} and no reason",
                    names.name(contig.id),
                    contig.verdict.as_str()
                ),
            };
            ledger.record(DecisionRecord {
                id: contig.id,
                verdict: contig.verdict,
                reason,
                disqualifier: contig.disqualifier,
                opponents: std::mem::take(&mut parts[contig.id as usize].opponents),
                round: parts[contig.id as usize].round,
            })?;
        }

        let kept: Vec<SeqId> = contigs
            .iter()
            .filter(|c| c.verdict.is_retained())
            .map(|c| c.id)
            .collect();
        let summary = ledger.summarise();
        info!(
            "retained {} of {} contigs ({} aligned, {} unaligned)",
            summary.retained(),
            summary.total(),
            summary.kept,
            summary.unaligned_kept
        );

        Ok(PurgeOutcome {
            ledger,
            kept,
            threshold,
            contigs,
        })
    }

    /// Reset orphaned contigs to active and re-run their locus tournaments
    /// until a pass produces no new orphans or the pass cap is exhausted.
    #[allow(clippy::too_many_arguments)]
    fn rescue_orphans(
        &self,
        loci: &[Locus],
        contigs: &mut [ContigSummary],
        parts: &mut [DecisionParts],
        locus_rounds: &mut [u32],
        names: &SeqRegistry,
        distances: &DistanceIndex,
        params: &TournamentParams,
    ) -> Result<u64> {
        let mut passes = 0u64;
        loop {
            self.check_cancel()?;
            if passes >= self.config.max_tournament_iterations {
                warn!(
                    "orphan rescue stopped at the pass cap ({}); accepting current kept set",
                    self.config.max_tournament_iterations
                );
                return Ok(passes);
            }
            passes += 1;

            let mut rescued_any = false;
            for (locus_idx, locus) in loci.iter().enumerate() {
                let kept: Vec<SeqId> = locus
                    .members
                    .iter()
                    .copied()
                    .filter(|&id| contigs[id as usize].verdict == Verdict::Kept)
                    .collect();
                let orphans: Vec<SeqId> = locus
                    .members
                    .iter()
                    .copied()
                    .filter(|&id| {
                        let c = &contigs[id as usize];
                        c.verdict == Verdict::Discarded
                            && is_orphan(
                                id,
                                c.disqualifier,
                                |other| contigs[other as usize].verdict,
                                &kept,
                                distances,
                                params.tau,
                            )
                    })
                    .collect();
                if orphans.is_empty() {
                    continue;
                }

                debug!(
                    "rescuing {} orphans in locus {locus_idx}",
                    orphans.len()
                );
                rescued_any = true;
                let entrants = make_entrants(&orphans, contigs, names);
                let (outcomes, rounds, capped) = run_locus_tournament(
                    &entrants,
                    distances,
                    params,
                    locus_rounds[locus_idx],
                    true,
                );
                locus_rounds[locus_idx] = rounds;
                if capped {
                    warn!("orphan rescue in locus {locus_idx} hit the iteration cap");
                }
                for outcome in outcomes {
                    apply_outcome(contigs, parts, outcome);
                }
            }

            if !rescued_any {
                return Ok(passes);
            }
        }
    }
}

fn make_entrants(
    members: &[SeqId],
    contigs: &[ContigSummary],
    names: &SeqRegistry,
) -> Vec<Entrant> {
    members
        .iter()
        .map(|&id| {
            let c = &contigs[id as usize];
            Entrant {
                id,
                name: names.name(id).to_string(),
                length: c.length,
                score: c.norm_score,
            }
        })
        .collect()
}

fn apply_outcome(
    contigs: &mut [ContigSummary],
    parts: &mut [DecisionParts],
    outcome: crate::tournament::Outcome,
) {
    let contig = &mut contigs[outcome.id as usize];
    contig.verdict = outcome.verdict;
    contig.reason = Some(outcome.reason);
    contig.disqualifier = outcome.disqualifier;
    let slot = &mut parts[outcome.id as usize];
    slot.opponents.extend(outcome.opponents);
    slot.round = outcome.round;
}

/// Distances between contig pairs whose locus hulls overlap by at least one
/// base on the same target. Sorted for deterministic estimation.
fn collect_colocated_distances(
    contigs: &[ContigSummary],
    distances: &DistanceIndex,
    n_targets: usize,
) -> Vec<f64> {
    let mut by_target: Vec<Vec<(u32, u32, SeqId)>> = vec![Vec::new(); n_targets];
    for contig in contigs {
        if let Some(locus) = contig.locus {
            by_target[locus.target as usize].push((locus.start, locus.end, contig.id));
        }
    }

    let mut sample: Vec<f64> = by_target
        .par_iter()
        .flat_map_iter(|group| {
            let mut group = group.clone();
            group.sort_unstable();
            let mut local = Vec::new();
            for i in 0..group.len() {
                let (_, end_i, id_i) = group[i];
                for &(start_j, _, id_j) in &group[i + 1..] {
                    if start_j >= end_i {
                        break;
                    }
                    if let Some(d) = distances.distance(id_i, id_j) {
                        local.push(d as f64);
                    }
                }
            }
            local
        })
        .collect();
    sample.sort_by(|a, b| a.partial_cmp(b).unwrap());
    sample
}
