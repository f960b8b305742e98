//! Similarity screen for contigs with no primary locus.
//!
//! Unaligned contigs are processed longest first. One that sits within the
//! distance threshold of any retained contig (aligned or unaligned kept
//! earlier in the pass) duplicates sequence already in the output and is
//! discarded; the rest are kept.

use crate::distance::DistanceIndex;
use crate::seq_registry::SeqId;
use crate::summary::{Reason, Verdict};

/// Verdict produced for one unaligned contig.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenOutcome {
    pub id: SeqId,
    pub verdict: Verdict,
    pub reason: Reason,
    pub disqualifier: Option<SeqId>,
}

/// Screen `candidates` (unaligned contigs) against the retained set.
///
/// `candidates` are (id, length, name) triples; `retained` must hold every
/// contig already kept by the tournament stage and is extended with each
/// newly kept unaligned contig. With `aligned_only` set the screen is
/// skipped and every candidate is discarded outright.
pub fn screen_unaligned(
    mut candidates: Vec<(SeqId, u32, String)>,
    retained: &mut Vec<SeqId>,
    distances: &DistanceIndex,
    tau: f64,
    aligned_only: bool,
) -> Vec<ScreenOutcome> {
    if aligned_only {
        return candidates
            .into_iter()
            .map(|(id, _, _)| ScreenOutcome {
                id,
                verdict: Verdict::UnalignedDiscarded,
                reason: Reason::AlignedOnlyMode,
                disqualifier: None,
            })
            .collect();
    }

    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));

    let mut outcomes = Vec::with_capacity(candidates.len());
    for (id, _, _) in candidates {
        // Nearest retained neighbour within tau, if any.
        let hit = distances
            .neighbors(id, tau)
            .find(|(other, _)| retained.contains(other));

        match hit {
            Some((other, _)) => outcomes.push(ScreenOutcome {
                id,
                verdict: Verdict::UnalignedDiscarded,
                reason: Reason::UnalignedSimilarToKept,
                disqualifier: Some(other),
            }),
            None => {
                retained.push(id);
                outcomes.push(ScreenOutcome {
                    id,
                    verdict: Verdict::UnalignedKept,
                    reason: Reason::UnalignedKept,
                    disqualifier: None,
                });
            }
        }
    }
    outcomes
}
