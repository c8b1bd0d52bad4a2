//! Success-plot curve construction.

use std::cmp::Ordering;

/// Build a success-plot curve from a flat collection of per-frame overlap
/// scores.
///
/// Values are expected to be policy-adjusted already (NaNs replaced by 0 at
/// the call site). Each value is rounded down to 2 decimal places and the
/// curve is the one-minus-empirical-CDF of the rounded distribution: points
/// `(threshold, fraction of frames with overlap above threshold)`, scanning
/// distinct rounded values in ascending order.
///
/// The curve starts at threshold 0 (flat extension carrying the first
/// computed success rate) and is forced to terminate at threshold 1; the
/// success rate is non-increasing throughout. Empty input yields the
/// degenerate all-zero curve `[(0, 0), (1, 0)]`.
pub fn compute_success_plot(values: &[f64]) -> Vec<(f64, f64)> {
    if values.is_empty() {
        return vec![(0.0, 0.0), (1.0, 0.0)];
    }

    let n = values.len();
    let mut rounded: Vec<f64> = values
        .iter()
        .map(|v| (v * 100.0).floor() / 100.0)
        .collect();
    rounded.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    if rounded[n - 1] != 1.0 {
        rounded.push(1.0);
    }

    let mut points: Vec<(f64, f64)> = Vec::new();
    let mut remaining = n as f64;
    // Seeding with 0 suppresses a duplicate point when the smallest rounded
    // value is itself 0; the prepended origin point covers it.
    let mut last = 0.0;
    for &u in &rounded {
        if u != last {
            points.push((u, remaining / n as f64));
        }
        remaining -= 1.0;
        last = u;
    }

    let mut curve = Vec::with_capacity(points.len() + 1);
    curve.push((0.0, points[0].1));
    curve.extend(points);
    curve
}
