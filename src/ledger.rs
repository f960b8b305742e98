//! Append-only record of every contig's final verdict.
//!
//! The ledger is the single mutable sink of the pipeline and the source of
//! truth for all reports. Writes happen once per contig; a second write for
//! the same contig means a stage bug and is a hard error, as is recording a
//! non-terminal verdict.

use anyhow::{bail, Result};

use crate::seq_registry::SeqId;
use crate::summary::{Reason, Verdict};

/// Frozen decision for one contig.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub id: SeqId,
    pub verdict: Verdict,
    pub reason: Reason,
    pub disqualifier: Option<SeqId>,
    /// Contigs this one was weighed against during selection.
    pub opponents: Vec<SeqId>,
    /// Tournament round (0 outside the tournament) fixing the verdict.
    pub round: u32,
}

/// Per-verdict contig counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub kept: usize,
    pub discarded: usize,
    pub unaligned_kept: usize,
    pub unaligned_discarded: usize,
}

impl LedgerSummary {
    pub fn retained(&self) -> usize {
        self.kept + self.unaligned_kept
    }

    pub fn total(&self) -> usize {
        self.kept + self.discarded + self.unaligned_kept + self.unaligned_discarded
    }
}

#[derive(Debug)]
pub struct DecisionLedger {
    records: Vec<Option<DecisionRecord>>,
    /// Insertion order, for reports that follow write order.
    order: Vec<SeqId>,
}

impl DecisionLedger {
    /// A ledger with one empty slot per contig in the assembly.
    pub fn new(n_contigs: usize) -> Self {
        DecisionLedger {
            records: vec![None; n_contigs],
            order: Vec::with_capacity(n_contigs),
        }
    }

    /// Append a record. Errors on a repeated contig or a non-terminal
    /// verdict; both indicate internal invariant violations.
    pub fn record(&mut self, record: DecisionRecord) -> Result<()> {
        if !record.verdict.is_terminal() {
            bail!(
                "internal: ledger write with non-terminal verdict {} for contig {}",
                record.verdict.as_str(),
                record.id
            );
        }
        let slot = &mut self.records[record.id as usize];
        if slot.is_some() {
            bail!("internal: double ledger write for contig {}", record.id);
        }
        self.order.push(record.id);
        *slot = Some(record);
        Ok(())
    }

    pub fn verdict(&self, id: SeqId) -> Option<&DecisionRecord> {
        self.records[id as usize].as_ref()
    }

    /// Records with the given verdict, in insertion order.
    pub fn iter_by_verdict(&self, verdict: Verdict) -> impl Iterator<Item = &DecisionRecord> {
        self.order
            .iter()
            .filter_map(move |&id| self.records[id as usize].as_ref())
            .filter(move |r| r.verdict == verdict)
    }

    /// All records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.order
            .iter()
            .filter_map(move |&id| self.records[id as usize].as_ref())
    }

    /// True once every contig has a verdict.
    pub fn is_complete(&self) -> bool {
        self.order.len() == self.records.len()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn summarise(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for record in self.iter() {
            match record.verdict {
                Verdict::Kept => summary.kept += 1,
                Verdict::Discarded => summary.discarded += 1,
                Verdict::UnalignedKept => summary.unaligned_kept += 1,
                Verdict::UnalignedDiscarded => summary.unaligned_discarded += 1,
                Verdict::Pending | Verdict::UnalignedPending => unreachable!(),
            }
        }
        summary
    }
}
