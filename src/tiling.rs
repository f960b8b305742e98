//! Greedy interval tiling of a contig's alignments on its primary target.
//!
//! Alignments are taken best-score-first; one is accepted only if its target
//! interval overlaps every already-accepted interval by at most the
//! configured tolerance. The surviving set is pairwise disjoint (up to the
//! tolerance) and yields the contig's normalised score.

use crate::alignment_store::Alignment;

/// Result of tiling one contig on its primary target.
#[derive(Debug, Clone, Default)]
pub struct TiledSet {
    /// Accepted target intervals, sorted by start.
    pub intervals: Vec<(u32, u32)>,
    /// Sum of score x matched bases over accepted alignments, divided by
    /// the query length.
    pub norm_score: f64,
    /// Alignments rejected for overlapping an accepted interval.
    pub tiled_out: u32,
}

fn overlap_len(a: (u32, u32), b: (u32, u32)) -> u32 {
    let lo = a.0.max(b.0);
    let hi = a.1.min(b.1);
    hi.saturating_sub(lo)
}

/// Tile `alignments` (all on the same target) against each other.
///
/// Sort order is alignment score descending with block length, target start
/// and query start as deterministic tie-breaks. Worst case O(k^2) in the
/// number of alignments on the primary target.
pub fn tile_alignments(
    alignments: &[&Alignment],
    query_length: u32,
    min_overlap: u32,
) -> TiledSet {
    let mut order: Vec<usize> = (0..alignments.len()).collect();
    order.sort_by(|&i, &j| {
        let a = alignments[i];
        let b = alignments[j];
        b.score
            .cmp(&a.score)
            .then_with(|| b.block_len.cmp(&a.block_len))
            .then_with(|| a.target_start.cmp(&b.target_start))
            .then_with(|| a.query_start.cmp(&b.query_start))
    });

    let mut accepted: Vec<(u32, u32)> = Vec::new();
    let mut score_sum = 0.0f64;
    let mut tiled_out = 0u32;

    for &i in &order {
        let aln = alignments[i];
        let candidate = (aln.target_start, aln.target_end);
        let conflicts = accepted
            .iter()
            .any(|&kept| overlap_len(candidate, kept) > min_overlap);
        if conflicts {
            tiled_out += 1;
        } else {
            accepted.push(candidate);
            score_sum += aln.score as f64 * aln.matches as f64;
        }
    }

    accepted.sort_unstable();
    let norm_score = if query_length > 0 {
        score_sum / query_length as f64
    } else {
        0.0
    };

    TiledSet {
        intervals: accepted,
        norm_score,
        tiled_out,
    }
}
