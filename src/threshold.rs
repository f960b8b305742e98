//! Distance-threshold estimation from locus-co-located contig pairs.
//!
//! The sample is the set of pairwise distances between contigs whose primary
//! loci overlap. A bimodal sample separates "same haplotype" pairs (low
//! distance) from "distinct sequence" pairs (high distance); the threshold
//! is the valley between the two modes, found on a Gaussian kernel density
//! estimate. Everything here is first principles: Scott-rule bandwidth, a
//! fixed evaluation grid, and an interior-minimum scan with symmetric mass
//! conditions.

use anyhow::{bail, Result};
use log::{info, warn};

/// Threshold applied when the sample is too small to estimate from.
pub const DEFAULT_TAU: f64 = 0.05;

/// Minimum sample size for estimation.
pub const MIN_SAMPLE_SIZE: usize = 30;

/// Evaluation grid resolution.
const GRID_POINTS: usize = 1024;

/// Required sample mass on each side of an accepted valley.
const SIDE_MASS_FRACTION: f64 = 0.05;

/// Offset applied when every sampled distance is identical.
const DEGENERATE_EPSILON: f64 = 1e-6;

/// How the final threshold was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorStatus {
    /// Caller supplied the threshold; estimation bypassed.
    UserSupplied,
    /// Fewer than [`MIN_SAMPLE_SIZE`] co-located pairs; default applied.
    InsufficientSample,
    /// Interior KDE valley with enough mass on both sides.
    KdeValley,
    /// No acceptable valley; sample median used.
    MedianFallback,
    /// All sampled distances identical; value plus epsilon used.
    DegenerateSample,
}

impl EstimatorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EstimatorStatus::UserSupplied => "user-supplied",
            EstimatorStatus::InsufficientSample => "insufficient-sample",
            EstimatorStatus::KdeValley => "kde-valley",
            EstimatorStatus::MedianFallback => "median-fallback",
            EstimatorStatus::DegenerateSample => "degenerate-sample",
        }
    }
}

/// Chosen threshold plus the evidence behind it, for reporting.
#[derive(Debug, Clone)]
pub struct ThresholdReport {
    pub tau: f64,
    pub sample_size: usize,
    pub status: EstimatorStatus,
    /// Interior density minima considered, leftmost first.
    pub minima: Vec<f64>,
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn std_dev(sample: &[f64]) -> f64 {
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    let var = sample.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Gaussian KDE evaluated over a uniform grid.
fn kde_grid(sample: &[f64], lo: f64, hi: f64, bandwidth: f64) -> (Vec<f64>, Vec<f64>) {
    let step = (hi - lo) / (GRID_POINTS - 1) as f64;
    let norm = 1.0 / (sample.len() as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    let xs: Vec<f64> = (0..GRID_POINTS).map(|i| lo + i as f64 * step).collect();
    let density = xs
        .iter()
        .map(|&x| {
            let mut acc = 0.0;
            for &s in sample {
                let z = (x - s) / bandwidth;
                acc += (-0.5 * z * z).exp();
            }
            acc * norm
        })
        .collect();
    (xs, density)
}

/// Estimate the distance threshold from co-located pair distances.
///
/// `user_tau`, when set, wins outright. Otherwise small samples fall back to
/// [`DEFAULT_TAU`], and full estimation runs KDE valley-finding with a
/// median fallback. An estimate escaping (0, 1) is a degenerate input and an
/// error (the caller can always pin the threshold explicitly).
pub fn estimate_threshold(
    mut sample: Vec<f64>,
    user_tau: Option<f64>,
) -> Result<ThresholdReport> {
    let sample_size = sample.len();

    if let Some(tau) = user_tau {
        info!("distance threshold {tau:.4} supplied by caller");
        return Ok(ThresholdReport {
            tau,
            sample_size,
            status: EstimatorStatus::UserSupplied,
            minima: Vec::new(),
        });
    }

    if sample_size < MIN_SAMPLE_SIZE {
        warn!(
            "only {sample_size} co-located pair distances (< {MIN_SAMPLE_SIZE}); \
             using default threshold {DEFAULT_TAU}"
        );
        return Ok(ThresholdReport {
            tau: DEFAULT_TAU,
            sample_size,
            status: EstimatorStatus::InsufficientSample,
            minima: Vec::new(),
        });
    }

    sample.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let lo = sample[0];
    let hi = sample[sample_size - 1];

    let sigma = std_dev(&sample);
    if sigma == 0.0 || hi == lo {
        let tau = lo + DEGENERATE_EPSILON;
        warn!("all {sample_size} sampled distances equal {lo}; threshold set to {tau}");
        return Ok(ThresholdReport {
            tau,
            sample_size,
            status: EstimatorStatus::DegenerateSample,
            minima: Vec::new(),
        });
    }

    // Scott's rule for one dimension.
    let bandwidth = sigma * (sample_size as f64).powf(-0.2);
    let (xs, density) = kde_grid(&sample, lo, hi, bandwidth);

    let mut minima = Vec::new();
    let mut tau = None;
    let required = SIDE_MASS_FRACTION * sample_size as f64;
    for i in 1..GRID_POINTS - 1 {
        if density[i] < density[i - 1] && density[i] < density[i + 1] {
            let x = xs[i];
            minima.push(x);
            if tau.is_none() {
                let left = sample.partition_point(|&s| s <= x);
                let right = sample_size - left;
                if left as f64 >= required && right as f64 >= required {
                    tau = Some(x);
                }
            }
        }
    }

    let (tau, status) = match tau {
        Some(t) => {
            info!(
                "distance threshold {t:.4} from KDE valley ({} interior minima, n={sample_size})",
                minima.len()
            );
            (t, EstimatorStatus::KdeValley)
        }
        None => {
            let m = median(&sample);
            info!(
                "no balanced KDE valley in {} minima; median threshold {m:.4} (n={sample_size})",
                minima.len()
            );
            (m, EstimatorStatus::MedianFallback)
        }
    };

    if !(0.0..1.0).contains(&tau) || tau <= 0.0 {
        bail!(
            "threshold estimation degenerate: tau={tau:.6} from sample \
             [min={lo:.6}, median={:.6}, max={hi:.6}, n={sample_size}]; \
             supply --distance-threshold explicitly",
            median(&sample)
        );
    }

    Ok(ThresholdReport {
        tau,
        sample_size,
        status,
        minima,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-uniform jitter in [-spread, spread].
    fn jitter(i: usize, spread: f64) -> f64 {
        let x = ((i as u64).wrapping_mul(2654435761) % 1000) as f64 / 1000.0;
        (x - 0.5) * 2.0 * spread
    }

    fn bimodal_sample(n_low: usize, n_high: usize) -> Vec<f64> {
        let mut sample = Vec::new();
        for i in 0..n_low {
            sample.push(0.02 + jitter(i, 0.012));
        }
        for i in 0..n_high {
            sample.push(0.18 + jitter(i + n_low, 0.02));
        }
        sample
    }

    #[test]
    fn user_threshold_bypasses_estimation() {
        let report = estimate_threshold(bimodal_sample(100, 100), Some(0.07)).unwrap();
        assert_eq!(report.tau, 0.07);
        assert_eq!(report.status, EstimatorStatus::UserSupplied);
    }

    #[test]
    fn small_sample_uses_default() {
        let report = estimate_threshold(vec![0.01; 10], None).unwrap();
        assert_eq!(report.tau, DEFAULT_TAU);
        assert_eq!(report.status, EstimatorStatus::InsufficientSample);
        assert_eq!(report.sample_size, 10);
    }

    #[test]
    fn bimodal_sample_yields_valley_between_modes() {
        let report = estimate_threshold(bimodal_sample(100, 100), None).unwrap();
        assert_eq!(report.status, EstimatorStatus::KdeValley);
        assert!(
            report.tau > 0.05 && report.tau < 0.15,
            "tau = {}",
            report.tau
        );
        assert!(!report.minima.is_empty());
    }

    #[test]
    fn skewed_bimodal_sample_still_finds_valley() {
        let report = estimate_threshold(bimodal_sample(170, 30), None).unwrap();
        assert_eq!(report.status, EstimatorStatus::KdeValley);
        assert!(
            report.tau > 0.05 && report.tau < 0.15,
            "tau = {}",
            report.tau
        );
    }

    #[test]
    fn unimodal_sample_falls_back_to_median() {
        // Quantile-spaced triangular sample centred on 0.10: smooth, one
        // mode, no interior density minima.
        let n = 200;
        let sample: Vec<f64> = (0..n)
            .map(|i| {
                let u = (i as f64 + 0.5) / n as f64;
                let offset = if u < 0.5 {
                    (2.0 * u).sqrt() - 1.0
                } else {
                    1.0 - (2.0 * (1.0 - u)).sqrt()
                };
                0.10 + 0.01 * offset
            })
            .collect();
        let report = estimate_threshold(sample.clone(), None).unwrap();
        assert_eq!(report.status, EstimatorStatus::MedianFallback);

        let mut sorted = sample;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((report.tau - median(&sorted)).abs() < 1e-12);
    }

    #[test]
    fn identical_distances_get_epsilon_offset() {
        let report = estimate_threshold(vec![0.03; 50], None).unwrap();
        assert_eq!(report.status, EstimatorStatus::DegenerateSample);
        assert!(report.tau > 0.03 && report.tau < 0.031);
    }

    #[test]
    fn median_of_even_and_odd_counts() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }
}
