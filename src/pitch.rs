//! # Period Estimation Module
//!
//! This module estimates the fundamental period of a signal using normalized
//! autocorrelation (NAC), with sub-sample refinement and octave error
//! correction. It is the numerical heart of the note detector.
//!
//! The normalization is such that a perfectly periodic signal with integer
//! period `p` has a NAC of exactly 1.0 at lag `p`; this also holds for
//! periodic signals with an exponential decay or rise in magnitude, which is
//! what a plucked string produces.
//!
//! ## Features
//! - Normalized autocorrelation over a configurable period range
//! - Parabolic interpolation for sub-sample accuracy
//! - Octave error correction through submultiple peak checking
//! - Periodicity quality reporting for noise rejection

/// NAC strength required at every submultiple lag, relative to the peak, for
/// a submultiple to be accepted as the real period.
const SUBMULTIPLE_THRESHOLD: f64 = 0.90;

/// The outcome of a period estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeriodEstimate {
    /// A periodic signal was found.
    Pitch {
        /// The fractional period in samples, after octave correction.
        period: f64,
        /// The integer lag of the autocorrelation peak.
        peak: usize,
        /// The NAC value at the peak, in [0, 1]. Values near 1 indicate a
        /// cleanly periodic signal.
        quality: f64,
    },
    /// The autocorrelation has no interior peak in the search range. This
    /// happens for silence, noise, and signals whose period falls outside
    /// the range.
    NoPeak,
}

/// A period estimator with an amortized scratch buffer.
///
/// The buffer holding the normalized autocorrelation is kept across calls to
/// avoid reallocation on the analysis path; its contents carry no meaning
/// between calls. Each estimator instance is independent, so several
/// analyzers can coexist.
#[derive(Debug, Default)]
pub struct PeriodEstimator {
    nac: Vec<f64>,
}

impl PeriodEstimator {
    pub fn new() -> Self {
        PeriodEstimator { nac: Vec::new() }
    }

    /// Estimates the fundamental period of `samples`.
    ///
    /// The search is limited to periods in `[min_period, max_period]`
    /// samples. The input must be long enough to correlate two full windows
    /// of the largest period of interest.
    ///
    /// # Panics
    /// * If `min_period <= 1`
    /// * If `max_period <= min_period`
    /// * If `samples.len() < 2 * max_period`
    pub fn estimate(
        &mut self,
        samples: &[f32],
        min_period: usize,
        max_period: usize,
    ) -> PeriodEstimate {
        assert!(min_period > 1, "the minimum period must be at least 2");
        assert!(
            max_period > min_period,
            "the maximum period must exceed the minimum period"
        );
        assert!(
            samples.len() >= 2 * max_period,
            "the signal must hold at least two windows of the maximum period"
        );

        // Lags min_period - 1 and max_period + 1 are computed solely so that
        // peaks at the range boundaries can be tested.
        self.nac.clear();
        self.nac.resize(max_period + 2, 0.0);
        compute_nac(samples, min_period, max_period, &mut self.nac);

        let (peak, period) = match find_peak(&self.nac, min_period, max_period) {
            Some(found) => found,
            None => return PeriodEstimate::NoPeak,
        };

        // The quality is the NAC at the best lag, which may still be a
        // multiple of the actual period.
        let quality = self.nac[peak];
        let period = fix_octaves(&self.nac, min_period, period, peak);

        PeriodEstimate::Pitch {
            period,
            peak,
            quality,
        }
    }
}

/// Computes the normalized autocorrelation for every lag of interest.
///
/// For each lag `p`, the plain autocorrelation is divided by the geometric
/// mean of the energies of the two windows being correlated, which maps the
/// result into [-1, 1] independently of the signal amplitude.
fn compute_nac(samples: &[f32], min_period: usize, max_period: usize, nac: &mut [f64]) {
    let n = samples.len();

    for p in (min_period - 1)..=(max_period + 1) {
        let mut ac = 0.0;
        let mut sum_sq_begin = 0.0;
        let mut sum_sq_end = 0.0;

        for i in 0..n - p {
            let begin = samples[i] as f64;
            let end = samples[i + p] as f64;

            ac += begin * end;
            sum_sq_begin += begin * begin;
            sum_sq_end += end * end;
        }

        nac[p] = if sum_sq_begin > 0.0 && sum_sq_end > 0.0 {
            ac / (sum_sq_begin * sum_sq_end).sqrt()
        } else {
            0.0
        };
    }
}

/// Finds the autocorrelation peak and refines it to a fractional lag.
///
/// Returns the integer peak position and the interpolated period, or `None`
/// when the maximum is not an interior local peak, which happens when the
/// period lies outside `[min_period, max_period]`.
fn find_peak(nac: &[f64], min_period: usize, max_period: usize) -> Option<(usize, f64)> {
    let mut best = min_period;
    for p in min_period..=max_period {
        if nac[p] > nac[best] {
            best = p;
        }
    }

    if nac[best] <= nac[best - 1] && nac[best] <= nac[best + 1] {
        return None;
    }

    // Interpolate from the neighboring values: if the value to the right is
    // bigger than the one to the left, the real peak sits a bit to the right
    // of the discretized peak, and vice versa.
    let left = nac[best - 1];
    let mid = nac[best];
    let right = nac[best + 1];

    let denominator = 2.0 * mid - left - right;
    let mut shift = if denominator != 0.0 {
        0.5 * (right - left) / denominator
    } else {
        0.0
    };

    // An ill-conditioned parabola can push the period arbitrarily far from
    // the peak, even below zero; in that case the integer peak is kept.
    if shift.abs() >= 0.2 * best as f64 {
        shift = 0.0;
    }

    let period = best as f64 + shift;
    if !period.is_finite() {
        return None;
    }

    Some((best, period))
}

/// Checks for and corrects octave errors.
///
/// When the searched range spans more than an octave, the peak may land on
/// an integer multiple of the real period: a signal periodic with period `p`
/// is also periodic with period `2p`. The real period is hypothesized to be
/// some submultiple of the peak, and a submultiple is accepted when the NAC
/// is strong at each of its hypothetical subpeak positions. E.g. for a
/// candidate at 1/3 of the estimate, the NAC must be strong at 1/3 and 2/3
/// of the original period.
fn fix_octaves(nac: &[f64], min_period: usize, period: f64, peak: usize) -> f64 {
    let threshold = SUBMULTIPLE_THRESHOLD * nac[peak];

    // Start from the biggest possible multiple error. A multiple of 1 has no
    // submultiples to check, so the loop always terminates with a result.
    let max_multiple = peak / min_period;
    for multiple in (1..=max_multiple).rev() {
        let all_strong = (1..multiple).all(|k| {
            let sub_peak = (k as f64 * period / multiple as f64).round() as usize;
            nac.get(sub_peak).copied().unwrap_or(0.0) >= threshold
        });

        if all_strong {
            return period / multiple as f64;
        }
    }

    period
}
