//! Per-contig state carried across pipeline stages.

use crate::seq_registry::SeqId;

/// Verdict for a contig. Transitions are monotone forward:
/// `Pending` becomes `Kept` or `Discarded`, `UnalignedPending` becomes
/// `UnalignedKept` or `UnalignedDiscarded`. Terminal verdicts never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Pending,
    Kept,
    Discarded,
    UnalignedPending,
    UnalignedKept,
    UnalignedDiscarded,
}

impl Verdict {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Verdict::Pending | Verdict::UnalignedPending)
    }

    /// True for verdicts that put the contig in the output assembly.
    pub fn is_retained(self) -> bool {
        matches!(self, Verdict::Kept | Verdict::UnalignedKept)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pending => "PENDING",
            Verdict::Kept => "KEPT",
            Verdict::Discarded => "DISCARDED",
            Verdict::UnalignedPending => "UNALIGNED-PENDING",
            Verdict::UnalignedKept => "UNALIGNED-KEPT",
            Verdict::UnalignedDiscarded => "UNALIGNED-DISCARDED",
        }
    }
}

/// Why a contig ended up with its verdict. Closed set, written to the ledger
/// and the decisions report verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    GcOutlier,
    Tiled,
    SimilarityLoser,
    SizeSafeguarded,
    OrphanRescued,
    UnalignedKept,
    UnalignedSimilarToKept,
    AlignedOnlyMode,
    IterationCap,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::GcOutlier => "gc-outlier",
            Reason::Tiled => "tiled",
            Reason::SimilarityLoser => "similarity-loser",
            Reason::SizeSafeguarded => "size-safeguarded",
            Reason::OrphanRescued => "orphan-rescued",
            Reason::UnalignedKept => "unaligned-kept",
            Reason::UnalignedSimilarToKept => "unaligned-similar-to-kept",
            Reason::AlignedOnlyMode => "aligned-only-mode",
            Reason::IterationCap => "iteration-cap",
        }
    }
}

/// Primary reference locus of a contig: the target it maps to and the convex
/// hull of its alignments there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryLocus {
    pub target: SeqId,
    pub start: u32,
    pub end: u32,
}

impl PrimaryLocus {
    /// Overlap in bases between two loci on the same target (0 if disjoint
    /// or on different targets).
    pub fn overlap(&self, other: &PrimaryLocus) -> u32 {
        if self.target != other.target {
            return 0;
        }
        let lo = self.start.max(other.start);
        let hi = self.end.min(other.end);
        hi.saturating_sub(lo)
    }
}

/// Everything the pipeline knows about one query contig.
///
/// Created when the assembly FASTA is read, mutated by the selection stages,
/// then frozen into the decision ledger.
#[derive(Debug, Clone)]
pub struct ContigSummary {
    pub id: SeqId,
    pub length: u32,
    pub gc_percent: f32,
    /// Assigned primary locus, or `None` for unaligned contigs.
    pub locus: Option<PrimaryLocus>,
    /// Normalised alignment score from tiling; 0 until tiling runs.
    pub norm_score: f64,
    /// Tiled (pairwise-disjoint) target intervals on the primary target.
    pub tiled: Vec<(u32, u32)>,
    pub verdict: Verdict,
    pub reason: Option<Reason>,
    pub disqualifier: Option<SeqId>,
    /// Number of complete BUSCO genes on this contig (informational).
    pub busco_genes: u32,
}

impl ContigSummary {
    pub fn new(id: SeqId, length: u32, gc_percent: f32) -> Self {
        ContigSummary {
            id,
            length,
            gc_percent,
            locus: None,
            norm_score: 0.0,
            tiled: Vec::new(),
            verdict: Verdict::UnalignedPending,
            reason: None,
            disqualifier: None,
            busco_genes: 0,
        }
    }
}
