//! Primary-locus assignment: pick one reference target per contig.
//!
//! The winner is the target with the highest 90th-percentile alignment score
//! over the contig's alignments there. Using a high percentile rather than
//! the single best alignment keeps one spurious high-scoring block from
//! capturing the assignment.

use rustc_hash::FxHashMap;

use crate::alignment_store::AlignmentStore;
use crate::seq_registry::{SeqId, SeqRegistry};
use crate::summary::PrimaryLocus;

/// Nearest-rank 90th percentile of raw alignment scores. Falls back to the
/// maximum when fewer than 10 values are available.
fn score_percentile_90(scores: &mut Vec<i32>) -> i32 {
    scores.sort_unstable();
    let n = scores.len();
    if n < 10 {
        return scores[n - 1];
    }
    let rank = (9 * n).div_ceil(10); // ceil(0.9 * n)
    scores[rank - 1]
}

/// Assign each query with at least one stored alignment its primary locus:
/// the arg-max target by 90th-percentile score, ties broken by greater
/// summed block length, then lexicographically smaller target name. The
/// locus interval is the convex hull of the query's alignments on the
/// chosen target.
pub fn assign_primary_loci(
    store: &AlignmentStore,
    targets: &SeqRegistry,
) -> Vec<Option<PrimaryLocus>> {
    let n_queries = store.n_queries();
    let mut loci: Vec<Option<PrimaryLocus>> = vec![None; n_queries];

    for query in 0..n_queries as SeqId {
        if store.query_alignment_count(query) == 0 {
            continue;
        }

        let mut per_target: FxHashMap<SeqId, (Vec<i32>, u64)> = FxHashMap::default();
        for aln in store.query_alignments(query) {
            let entry = per_target.entry(aln.target).or_insert_with(|| (Vec::new(), 0));
            entry.0.push(aln.score);
            entry.1 += aln.block_len as u64;
        }

        let mut candidates: Vec<(i32, u64, &str, SeqId)> = per_target
            .into_iter()
            .map(|(target, (mut scores, block_sum))| {
                let p90 = score_percentile_90(&mut scores);
                (p90, block_sum, targets.name(target), target)
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.cmp(b.2))
        });
        let best = candidates[0].3;

        let mut start = u32::MAX;
        let mut end = 0u32;
        for aln in store.query_alignments(query) {
            if aln.target == best {
                start = start.min(aln.target_start);
                end = end.max(aln.target_end);
            }
        }
        loci[query as usize] = Some(PrimaryLocus {
            target: best,
            start,
            end,
        });
    }

    loci
}
