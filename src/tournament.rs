//! Per-locus tournament: iteratively promote the best remaining contig and
//! retire the redundant contigs it covers.
//!
//! Each round the highest-scoring active contig becomes champion and is
//! kept. Active contigs within the distance threshold of the champion are
//! similarity losers and are discarded, unless the size safeguard fires:
//! a contig nearly as long and nearly as well-scoring as the champion stays
//! active (and is re-checked against every later champion). Contigs beyond
//! the threshold are distinct neighbours and stay active. One contig leaves
//! the active set per round at minimum, so a locus of n contigs converges
//! in at most n rounds unless the iteration cap cuts it short.

use log::warn;

use crate::distance::DistanceIndex;
use crate::seq_registry::SeqId;
use crate::summary::{Reason, Verdict};

/// Score fraction of the champion a safeguarded contig must reach.
pub const SAFEGUARD_SCORE_RATIO: f64 = 0.90;

/// Knobs for one tournament run.
#[derive(Debug, Clone, Copy)]
pub struct TournamentParams {
    pub tau: f64,
    /// Length fraction of the champion a safeguarded contig must reach.
    pub min_size_safeguard: f64,
    /// Hard cap on rounds per locus (cumulative across rescue re-runs).
    pub max_iterations: u64,
}

/// One contig competing in a locus.
#[derive(Debug, Clone)]
pub struct Entrant {
    pub id: SeqId,
    pub name: String,
    pub length: u32,
    pub score: f64,
}

/// Terminal outcome for one entrant.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub id: SeqId,
    pub verdict: Verdict,
    pub reason: Reason,
    pub disqualifier: Option<SeqId>,
    pub opponents: Vec<SeqId>,
    /// Round at which the verdict was fixed.
    pub round: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Kept,
    Discarded,
}

/// True when `a` outranks `b`: higher normalised score, then greater
/// length, then lexicographically smaller name. Total order, so champion
/// selection is deterministic.
fn outranks(a: &Entrant, b: &Entrant) -> bool {
    if a.score != b.score {
        return a.score > b.score;
    }
    if a.length != b.length {
        return a.length > b.length;
    }
    a.name < b.name
}

/// Run the tournament over one locus.
///
/// `start_round` carries the round counter across rescue re-runs of the
/// same locus. When `rescued` is set, promoted contigs are recorded as
/// orphan rescues. Returns one outcome per entrant plus the final round
/// counter and whether the iteration cap was hit.
pub fn run_locus_tournament(
    entrants: &[Entrant],
    distances: &DistanceIndex,
    params: &TournamentParams,
    start_round: u32,
    rescued: bool,
) -> (Vec<Outcome>, u32, bool) {
    let n = entrants.len();
    let mut state = vec![State::Active; n];
    let mut challenged = vec![false; n];
    let mut opponents: Vec<Vec<SeqId>> = vec![Vec::new(); n];
    let mut outcomes: Vec<Option<Outcome>> = vec![None; n];

    let mut round = start_round;
    let mut capped = false;

    loop {
        let champion = (0..n)
            .filter(|&i| state[i] == State::Active)
            .reduce(|best, i| {
                if outranks(&entrants[i], &entrants[best]) {
                    i
                } else {
                    best
                }
            });
        let champion = match champion {
            Some(c) => c,
            None => break,
        };

        if round as u64 >= params.max_iterations {
            capped = true;
            let unresolved = (0..n).filter(|&i| state[i] == State::Active).count();
            warn!(
                "locus tournament hit the iteration cap ({}) with {unresolved} contigs unresolved",
                params.max_iterations
            );
            for i in 0..n {
                if state[i] == State::Active {
                    state[i] = State::Discarded;
                    outcomes[i] = Some(Outcome {
                        id: entrants[i].id,
                        verdict: Verdict::Discarded,
                        reason: Reason::IterationCap,
                        disqualifier: None,
                        opponents: std::mem::take(&mut opponents[i]),
                        round,
                    });
                }
            }
            break;
        }
        round += 1;

        state[champion] = State::Kept;
        let champ = &entrants[champion];

        for i in 0..n {
            if i == champion || state[i] != State::Active {
                continue;
            }
            let contender = &entrants[i];
            // Unknown distance counts as larger than any threshold.
            let d = match distances.distance(champ.id, contender.id) {
                Some(d) => d as f64,
                None => continue,
            };
            if d > params.tau {
                continue; // distinct neighbour
            }

            opponents[i].push(champ.id);
            opponents[champion].push(contender.id);

            let size_ok =
                contender.length as f64 >= params.min_size_safeguard * champ.length as f64;
            let score_ok = contender.score >= SAFEGUARD_SCORE_RATIO * champ.score;
            if size_ok && score_ok {
                challenged[i] = true;
            } else {
                state[i] = State::Discarded;
                outcomes[i] = Some(Outcome {
                    id: contender.id,
                    verdict: Verdict::Discarded,
                    reason: Reason::SimilarityLoser,
                    disqualifier: Some(champ.id),
                    opponents: std::mem::take(&mut opponents[i]),
                    round,
                });
            }
        }

        let reason = if rescued {
            Reason::OrphanRescued
        } else if challenged[champion] {
            Reason::SizeSafeguarded
        } else {
            Reason::Tiled
        };
        outcomes[champion] = Some(Outcome {
            id: champ.id,
            verdict: Verdict::Kept,
            reason,
            disqualifier: None,
            opponents: std::mem::take(&mut opponents[champion]),
            round,
        });
    }

    let results: Vec<Outcome> = outcomes.into_iter().map(|o| o.unwrap()).collect();
    (results, round, capped)
}

/// Orphan test used by the rescue pass: a discarded contig whose
/// disqualifier itself ended up discarded, with no kept contig of its
/// locus within the distance threshold.
pub fn is_orphan(
    contig: SeqId,
    disqualifier: Option<SeqId>,
    verdict_of: impl Fn(SeqId) -> Verdict,
    kept_in_locus: &[SeqId],
    distances: &DistanceIndex,
    tau: f64,
) -> bool {
    let dq = match disqualifier {
        Some(dq) => dq,
        None => return false,
    };
    if verdict_of(dq).is_retained() {
        return false;
    }
    !kept_in_locus.iter().any(|&k| {
        distances
            .distance(contig, k)
            .map(|d| d as f64 <= tau)
            .unwrap_or(false)
    })
}
