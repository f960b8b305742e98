// Threshold estimation on a realistic bimodal distance sample.

use purga::threshold::{estimate_threshold, EstimatorStatus, DEFAULT_TAU};

/// Deterministic jitter in [-spread, spread].
fn jitter(i: usize, spread: f64) -> f64 {
    let x = ((i as u64).wrapping_mul(2654435761) % 1024) as f64 / 1024.0;
    (x - 0.5) * 2.0 * spread
}

/// 200 co-located pair distances: a haplotig mode near 0.02 and a paralog
/// mode near 0.18.
fn mixture() -> Vec<f64> {
    let mut sample = Vec::with_capacity(200);
    for i in 0..120 {
        sample.push((0.02 + jitter(i, 0.015)).max(0.0));
    }
    for i in 0..80 {
        sample.push(0.18 + jitter(i + 120, 0.025));
    }
    sample
}

#[test]
fn valley_separates_haplotig_and_paralog_modes() {
    let report = estimate_threshold(mixture(), None).unwrap();

    assert_eq!(report.status, EstimatorStatus::KdeValley);
    assert_eq!(report.sample_size, 200);
    assert!(
        report.tau > 0.05 && report.tau < 0.15,
        "tau = {} not between the modes",
        report.tau
    );

    // A same-haplotype pair classifies as similar, a paralog pair as
    // distinct.
    assert!(0.03 <= report.tau);
    assert!(0.20 > report.tau);
}

#[test]
fn estimation_is_deterministic() {
    let a = estimate_threshold(mixture(), None).unwrap();
    let b = estimate_threshold(mixture(), None).unwrap();
    assert_eq!(a.tau.to_bits(), b.tau.to_bits());
    assert_eq!(a.minima.len(), b.minima.len());
}

#[test]
fn shuffled_sample_gives_the_same_threshold() {
    let sample = mixture();
    let mut reversed = sample.clone();
    reversed.reverse();

    let a = estimate_threshold(sample, None).unwrap();
    let b = estimate_threshold(reversed, None).unwrap();
    assert_eq!(a.tau.to_bits(), b.tau.to_bits());
}

#[test]
fn user_threshold_short_circuits_even_tiny_samples() {
    let report = estimate_threshold(Vec::new(), Some(0.04)).unwrap();
    assert_eq!(report.tau, 0.04);
    assert_eq!(report.status, EstimatorStatus::UserSupplied);
    assert_eq!(report.sample_size, 0);
}

#[test]
fn empty_sample_without_user_threshold_uses_default() {
    let report = estimate_threshold(Vec::new(), None).unwrap();
    assert_eq!(report.tau, DEFAULT_TAU);
    assert_eq!(report.status, EstimatorStatus::InsufficientSample);
}
