// File-based integration tests: FASTA + PAF + distances in, reports out.

use std::fs;
use std::io::Write;
use std::path::Path;

use rustc_hash::FxHashSet;
use tempfile::TempDir;

use purga::alignment_store::AlignmentStore;
use purga::distance::read_distances;
use purga::fasta::{self, Assembly};
use purga::paf::read_paf;
use purga::purge::{PurgeConfig, PurgeInput, Purger};
use purga::report;
use purga::seq_registry::SeqRegistry;

fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

/// Two near-identical haplotigs (one much weaker) plus one unaligned
/// duplicate of the winner.
fn standard_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf, std::path::PathBuf) {
    let fasta = write_file(
        dir,
        "assembly.fa",
        ">hap_a\nACGTACGTACGTACGTACGT\n>hap_b\nACGTACGTACGTACGTACG\n>floater\nTTTTACGTACGTACGTACGT\n",
    );
    // hap_a: AS 200 over 20 bases, matches 19 -> norm 190
    // hap_b: AS 100, matches 10 -> norm ~52
    let paf = write_file(
        dir,
        "aln.paf",
        "hap_a\t20\t0\t20\t+\tchr1\t1000\t0\t20\t19\t20\t60\tAS:i:200\n\
         hap_b\t19\t0\t19\t+\tchr1\t1000\t0\t19\t17\t19\t60\tAS:i:100\n",
    );
    let dist = write_file(
        dir,
        "dist.tsv",
        "hap_a\thap_b\t0.01\nfloater\thap_a\t0.02\nhap_b\tfloater\t0.03\n",
    );
    (fasta, paf, dist)
}

fn run_pipeline(
    fasta: &Path,
    paf: &Path,
    dist: &Path,
    config: PurgeConfig,
) -> (purga::purge::PurgeOutcome, SeqRegistry, SeqRegistry) {
    let Assembly { names, contigs } = fasta::read_assembly(fasta).unwrap();
    let mut targets = SeqRegistry::new();
    let alignments = read_paf(paf, &names, &mut targets).unwrap();
    let store = AlignmentStore::build(alignments, config.min_mq, names.len(), targets.len());
    let distances = read_distances(dist, &names).unwrap();

    let input = PurgeInput {
        contigs,
        store,
        distances,
        excluded: FxHashSet::default(),
    };
    let outcome = Purger::new(config)
        .run(input, &names, &targets)
        .unwrap();
    (outcome, names, targets)
}

#[test]
fn end_to_end_reports_and_filtered_fasta() {
    let dir = TempDir::new().unwrap();
    let (fasta, paf, dist) = standard_inputs(dir.path());

    let config = PurgeConfig {
        distance_threshold: Some(0.05),
        ..PurgeConfig::default()
    };
    let (outcome, names, targets) = run_pipeline(&fasta, &paf, &dist, config);

    // hap_b loses to hap_a (similar, much weaker, too small a score ratio);
    // floater duplicates hap_a and is screened out.
    let kept_names: Vec<&str> = outcome.kept.iter().map(|&id| names.name(id)).collect();
    assert_eq!(kept_names, vec!["hap_a"]);

    let decisions = dir.path().join("decisions.tsv");
    report::write_decisions(&decisions, &outcome, &names, &targets).unwrap();
    let text = fs::read_to_string(&decisions).unwrap();
    assert!(text.starts_with("contig\t"));
    assert!(text.contains("hap_a\t20\t"));
    assert!(text.contains("\tKEPT\ttiled\t"));
    assert!(text.contains("\tDISCARDED\tsimilarity-loser\thap_a\t"));
    assert!(text.contains("\tUNALIGNED-DISCARDED\tunaligned-similar-to-kept\t"));

    let threshold = dir.path().join("threshold.tsv");
    report::write_threshold(&threshold, &outcome).unwrap();
    let text = fs::read_to_string(&threshold).unwrap();
    assert!(text.contains("0.050000\t"));
    assert!(text.contains("user-supplied\ttrue"));

    let retained = dir.path().join("retained.txt");
    report::write_retained(&retained, &outcome, &names).unwrap();
    assert_eq!(fs::read_to_string(&retained).unwrap(), "hap_a\n");

    let filtered = dir.path().join("filtered.fa");
    let retained_names: FxHashSet<String> =
        kept_names.iter().map(|s| s.to_string()).collect();
    let (written, skipped) = fasta::write_filtered(&fasta, &filtered, &retained_names).unwrap();
    assert_eq!(written, 1);
    assert_eq!(skipped, 2);
    let text = fs::read_to_string(&filtered).unwrap();
    assert!(text.contains(">hap_a"));
    assert!(!text.contains(">hap_b"));
}

#[test]
fn unknown_paf_contig_is_fatal() {
    let dir = TempDir::new().unwrap();
    let fasta = write_file(dir.path(), "assembly.fa", ">a\nACGT\n");
    let paf = write_file(
        dir.path(),
        "aln.paf",
        "ghost\t20\t0\t20\t+\tchr1\t1000\t0\t20\t19\t20\t60\tAS:i:200\n",
    );

    let Assembly { names, .. } = fasta::read_assembly(&fasta).unwrap();
    let mut targets = SeqRegistry::new();
    let err = read_paf(&paf, &names, &mut targets).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn unknown_distance_contig_is_fatal() {
    let dir = TempDir::new().unwrap();
    let fasta = write_file(dir.path(), "assembly.fa", ">a\nACGT\n>b\nACGT\n");
    let dist = write_file(dir.path(), "dist.tsv", "a\tphantom\t0.01\n");

    let Assembly { names, .. } = fasta::read_assembly(&fasta).unwrap();
    let err = read_distances(&dist, &names).unwrap_err();
    assert!(err.to_string().contains("phantom"));
}

#[test]
fn isolated_malformed_rows_are_skipped() {
    let dir = TempDir::new().unwrap();
    let fasta = write_file(dir.path(), "assembly.fa", ">a\nACGT\n");
    // 1 bad row among 200: under the 1% abort line.
    let mut paf_content = String::from("a\t20\t0\tnot_a_number\n");
    for _ in 0..200 {
        paf_content.push_str("a\t20\t0\t20\t+\tchr1\t1000\t0\t20\t19\t20\t60\tAS:i:200\n");
    }
    let paf = write_file(dir.path(), "aln.paf", &paf_content);

    let Assembly { names, .. } = fasta::read_assembly(&fasta).unwrap();
    let mut targets = SeqRegistry::new();
    let alignments = read_paf(&paf, &names, &mut targets).unwrap();
    assert_eq!(alignments.len(), 200);
}

#[test]
fn mostly_malformed_input_aborts() {
    let dir = TempDir::new().unwrap();
    let fasta = write_file(dir.path(), "assembly.fa", ">a\nACGT\n");
    // Rows without AS:i: count as malformed; half the input is bad.
    let paf = write_file(
        dir.path(),
        "aln.paf",
        "a\t20\t0\t20\t+\tchr1\t1000\t0\t20\t19\t20\t60\tAS:i:200\n\
         a\t20\t0\t20\t+\tchr1\t1000\t0\t20\t19\t20\t60\n",
    );

    let Assembly { names, .. } = fasta::read_assembly(&fasta).unwrap();
    let mut targets = SeqRegistry::new();
    let err = read_paf(&paf, &names, &mut targets).unwrap_err();
    assert!(err.to_string().contains("malformed"));
}

#[test]
fn invalid_config_fails_preflight() {
    let bad_safeguard = PurgeConfig {
        min_size_safeguard: 1.5,
        ..PurgeConfig::default()
    };
    assert!(bad_safeguard.validate().is_err());

    let bad_tau = PurgeConfig {
        distance_threshold: Some(-0.1),
        ..PurgeConfig::default()
    };
    assert!(bad_tau.validate().is_err());

    let bad_iters = PurgeConfig {
        max_tournament_iterations: 0,
        ..PurgeConfig::default()
    };
    assert!(bad_iters.validate().is_err());

    assert!(PurgeConfig::default().validate().is_ok());
}

#[test]
fn memory_limit_gates_processing() {
    let dir = TempDir::new().unwrap();
    let (fasta, paf, dist) = standard_inputs(dir.path());

    let Assembly { names, contigs } = fasta::read_assembly(&fasta).unwrap();
    let mut targets = SeqRegistry::new();
    let alignments = read_paf(&paf, &names, &mut targets).unwrap();
    let store = AlignmentStore::build(alignments, 20, names.len(), targets.len());
    let distances = read_distances(&dist, &names).unwrap();

    let config = PurgeConfig {
        distance_threshold: Some(0.05),
        memory_limit: Some(1),
        ..PurgeConfig::default()
    };
    let input = PurgeInput {
        contigs,
        store,
        distances,
        excluded: FxHashSet::default(),
    };
    let err = Purger::new(config)
        .run(input, &names, &targets)
        .unwrap_err();
    assert!(err.to_string().contains("memory limit"));
}

#[test]
fn cancel_flag_stops_the_run() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let dir = TempDir::new().unwrap();
    let (fasta, paf, dist) = standard_inputs(dir.path());

    let Assembly { names, contigs } = fasta::read_assembly(&fasta).unwrap();
    let mut targets = SeqRegistry::new();
    let alignments = read_paf(&paf, &names, &mut targets).unwrap();
    let store = AlignmentStore::build(alignments, 20, names.len(), targets.len());
    let distances = read_distances(&dist, &names).unwrap();

    let cancel = Arc::new(AtomicBool::new(true));
    cancel.store(true, Ordering::Relaxed);

    let config = PurgeConfig {
        distance_threshold: Some(0.05),
        ..PurgeConfig::default()
    };
    let input = PurgeInput {
        contigs,
        store,
        distances,
        excluded: FxHashSet::default(),
    };
    let err = Purger::new(config)
        .with_cancel_flag(cancel)
        .run(input, &names, &targets)
        .unwrap_err();
    assert!(err.to_string().contains("cancelled"));
}
