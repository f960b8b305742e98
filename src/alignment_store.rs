//! In-memory table of quality-filtered alignments, indexed by query and
//! by target.

use log::info;

use crate::seq_registry::SeqId;

/// Compact alignment record (40 bytes). Intervals are 0-based half-open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub query: SeqId,
    pub target: SeqId,
    pub query_start: u32,
    pub query_end: u32,
    pub target_start: u32,
    pub target_end: u32,
    pub matches: u32,
    pub block_len: u32,
    /// Aligner score (`AS:i:` tag). Mandatory for every stored alignment.
    pub score: i32,
    pub mapq: u8,
    pub reverse: bool,
}

impl Alignment {
    /// Overlap in bases between this alignment's target interval and
    /// another interval on the same axis.
    pub fn target_overlap(&self, start: u32, end: u32) -> u32 {
        let lo = self.target_start.max(start);
        let hi = self.target_end.min(end);
        hi.saturating_sub(lo)
    }
}

/// Read-only store of mapping-quality-filtered alignments with per-query and
/// per-target access. Shared across workers without locking once built.
#[derive(Debug, Default)]
pub struct AlignmentStore {
    alignments: Vec<Alignment>,
    by_query: Vec<Vec<u32>>,
    /// Per-target alignment indices, sorted by target start.
    by_target: Vec<Vec<u32>>,
    dropped_mapq: u64,
}

impl AlignmentStore {
    /// Build the store from parsed alignments, dropping those below
    /// `min_mq`. `n_queries` / `n_targets` are the registry sizes.
    pub fn build(
        alignments: Vec<Alignment>,
        min_mq: u8,
        n_queries: usize,
        n_targets: usize,
    ) -> Self {
        let total = alignments.len();
        let kept: Vec<Alignment> = alignments
            .into_iter()
            .filter(|a| a.mapq >= min_mq)
            .collect();
        let dropped_mapq = (total - kept.len()) as u64;

        let mut by_query: Vec<Vec<u32>> = vec![Vec::new(); n_queries];
        let mut by_target: Vec<Vec<u32>> = vec![Vec::new(); n_targets];
        for (idx, aln) in kept.iter().enumerate() {
            by_query[aln.query as usize].push(idx as u32);
            by_target[aln.target as usize].push(idx as u32);
        }
        for list in &mut by_target {
            list.sort_by_key(|&i| kept[i as usize].target_start);
        }

        info!(
            "alignment store: {} alignments kept, {} dropped below MQ {}",
            kept.len(),
            dropped_mapq,
            min_mq
        );

        AlignmentStore {
            alignments: kept,
            by_query,
            by_target,
            dropped_mapq,
        }
    }

    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }

    pub fn dropped_below_mapq(&self) -> u64 {
        self.dropped_mapq
    }

    pub fn n_queries(&self) -> usize {
        self.by_query.len()
    }

    /// Alignments of one query contig, in input order.
    pub fn query_alignments(&self, query: SeqId) -> impl Iterator<Item = &Alignment> {
        self.by_query[query as usize]
            .iter()
            .map(move |&i| &self.alignments[i as usize])
    }

    pub fn query_alignment_count(&self, query: SeqId) -> usize {
        self.by_query[query as usize].len()
    }

    /// Alignments on one target, sorted by target start.
    pub fn target_alignments(&self, target: SeqId) -> impl Iterator<Item = &Alignment> {
        self.by_target[target as usize]
            .iter()
            .map(move |&i| &self.alignments[i as usize])
    }

    pub fn iter_all(&self) -> impl Iterator<Item = &Alignment> {
        self.alignments.iter()
    }

    /// Approximate heap footprint, for the pre-flight memory gate.
    pub fn estimated_bytes(&self) -> u64 {
        let records = self.alignments.len() as u64 * std::mem::size_of::<Alignment>() as u64;
        let index_entries: u64 = self
            .by_query
            .iter()
            .chain(self.by_target.iter())
            .map(|v| v.len() as u64)
            .sum();
        records + index_entries * std::mem::size_of::<u32>() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aln(
        query: SeqId,
        target: SeqId,
        target_start: u32,
        target_end: u32,
        score: i32,
        mapq: u8,
    ) -> Alignment {
        Alignment {
            query,
            target,
            query_start: 0,
            query_end: target_end - target_start,
            target_start,
            target_end,
            matches: target_end - target_start,
            block_len: target_end - target_start,
            score,
            mapq,
            reverse: false,
        }
    }

    #[test]
    fn record_is_compact() {
        assert!(std::mem::size_of::<Alignment>() <= 64);
    }

    #[test]
    fn filters_by_mapq_and_indexes_both_axes() {
        let alns = vec![
            aln(0, 0, 100, 200, 50, 60),
            aln(0, 1, 0, 100, 40, 60),
            aln(1, 0, 0, 50, 30, 5), // below MQ cutoff
            aln(1, 0, 20, 80, 20, 60),
        ];
        let store = AlignmentStore::build(alns, 20, 2, 2);

        assert_eq!(store.len(), 3);
        assert_eq!(store.dropped_below_mapq(), 1);
        assert_eq!(store.query_alignment_count(0), 2);
        assert_eq!(store.query_alignment_count(1), 1);

        // target lists sorted by start
        let starts: Vec<u32> = store.target_alignments(0).map(|a| a.target_start).collect();
        assert_eq!(starts, vec![20, 100]);
    }

    #[test]
    fn target_overlap_is_clamped() {
        let a = aln(0, 0, 100, 200, 1, 60);
        assert_eq!(a.target_overlap(150, 300), 50);
        assert_eq!(a.target_overlap(200, 300), 0);
        assert_eq!(a.target_overlap(0, 100), 0);
    }
}
