//! Locus construction: cluster contigs sharing a primary target into
//! maximal overlap-connected groups.

use crate::seq_registry::SeqId;
use crate::summary::ContigSummary;
use crate::union_find::UnionFind;
use rustc_hash::FxHashMap;

/// One locus: contigs on the same target whose locus intervals are
/// transitively overlap-connected.
#[derive(Debug, Clone)]
pub struct Locus {
    pub target: SeqId,
    /// Member contig ids, sorted by locus start (ties by id).
    pub members: Vec<SeqId>,
}

/// Group contigs with assigned primary loci into loci. Two contigs connect
/// when their locus intervals on the shared target overlap by at least
/// `min_overlap` bases; connection is transitive.
pub fn build_loci(summaries: &[ContigSummary], min_overlap: u32) -> Vec<Locus> {
    let mut by_target: FxHashMap<SeqId, Vec<&ContigSummary>> = FxHashMap::default();
    for summary in summaries {
        if let Some(locus) = &summary.locus {
            by_target.entry(locus.target).or_default().push(summary);
        }
    }

    let mut targets: Vec<SeqId> = by_target.keys().copied().collect();
    targets.sort_unstable();

    let min_overlap = min_overlap.max(1);
    let mut loci = Vec::new();
    for target in targets {
        let mut members = by_target.remove(&target).unwrap();
        members.sort_by_key(|s| (s.locus.unwrap().start, s.id));

        // Sweep left to right: an interval connects to the cluster so far
        // iff it overlaps the member with the furthest end seen.
        let mut uf = UnionFind::new(members.len());
        let mut max_end_idx = 0usize;
        for i in 1..members.len() {
            let cur = members[i].locus.unwrap();
            let furthest = members[max_end_idx].locus.unwrap();
            if furthest.overlap(&cur) >= min_overlap {
                uf.union(max_end_idx, i);
            }
            if cur.end > furthest.end {
                max_end_idx = i;
            }
        }

        for group in uf.groups() {
            loci.push(Locus {
                target,
                members: group.into_iter().map(|i| members[i].id).collect(),
            });
        }
    }
    loci
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::PrimaryLocus;

    fn summary(id: SeqId, target: SeqId, start: u32, end: u32) -> ContigSummary {
        let mut s = ContigSummary::new(id, end - start, 40.0);
        s.locus = Some(PrimaryLocus { target, start, end });
        s
    }

    #[test]
    fn overlap_chains_transitively() {
        // a-b overlap, b-c overlap, a-c disjoint: one locus of three.
        let summaries = vec![
            summary(0, 0, 0, 100),
            summary(1, 0, 80, 200),
            summary(2, 0, 180, 300),
            summary(3, 0, 500, 600),
        ];
        let loci = build_loci(&summaries, 1);
        assert_eq!(loci.len(), 2);
        assert_eq!(loci[0].members, vec![0, 1, 2]);
        assert_eq!(loci[1].members, vec![3]);
    }

    #[test]
    fn targets_split_loci() {
        let summaries = vec![summary(0, 0, 0, 100), summary(1, 1, 0, 100)];
        let loci = build_loci(&summaries, 1);
        assert_eq!(loci.len(), 2);
        assert_eq!(loci[0].target, 0);
        assert_eq!(loci[1].target, 1);
    }

    #[test]
    fn min_overlap_gates_connection() {
        let summaries = vec![summary(0, 0, 0, 100), summary(1, 0, 95, 200)];
        assert_eq!(build_loci(&summaries, 5).len(), 1);
        assert_eq!(build_loci(&summaries, 6).len(), 2);
    }

    #[test]
    fn nested_interval_keeps_cluster_open() {
        // Long interval spans a short one entirely; a third overlaps only
        // the long one past the short one's end.
        let summaries = vec![
            summary(0, 0, 0, 1000),
            summary(1, 0, 100, 200),
            summary(2, 0, 600, 900),
        ];
        let loci = build_loci(&summaries, 1);
        assert_eq!(loci.len(), 1);
        assert_eq!(loci[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn unaligned_contigs_ignored() {
        let mut unaligned = ContigSummary::new(9, 100, 40.0);
        unaligned.locus = None;
        let summaries = vec![summary(0, 0, 0, 100), unaligned];
        let loci = build_loci(&summaries, 1);
        assert_eq!(loci.len(), 1);
        assert_eq!(loci[0].members, vec![0]);
    }
}
