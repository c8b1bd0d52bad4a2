//! Per-frame overlap summaries: average, recall/precision, throughput.

/// Force overlap to 0 on frames where ground truth is defined but the
/// tracker produced no estimate.
///
/// Frames where the ground truth itself is undefined keep their (NaN)
/// overlap and are excluded from averaging downstream.
pub(crate) fn zero_undefined_output(
    overlap: &[f64],
    output_defined: &[bool],
    gt_defined: &[bool],
) -> Vec<f64> {
    overlap
        .iter()
        .zip(output_defined.iter().zip(gt_defined.iter()))
        .map(|(&ov, (&out_def, &gt_def))| {
            if gt_def && !out_def {
                0.0
            } else {
                ov
            }
        })
        .collect()
}

/// Mean ignoring NaN entries; NaN when no finite entries remain.
pub(crate) fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }
    sum / count as f64
}

/// Average overlap over a trajectory pair.
///
/// Applies the undefined-output zeroing policy, then averages the remaining
/// values ignoring NaN (frames where the ground truth itself is undefined
/// were never scored and stay out of the mean).
pub fn compute_average(overlap: &[f64], output_defined: &[bool], gt_defined: &[bool]) -> f64 {
    let adjusted = zero_undefined_output(overlap, output_defined, gt_defined);
    nan_mean(&adjusted)
}

/// Recall and precision at overlap threshold `theta`.
///
/// After the zeroing policy, each frame classifies as:
///
/// - True positive: overlap > theta.
/// - False positive: overlap <= theta, or ground truth undefined while the
///   output is defined.
/// - False negative: overlap <= theta, or ground truth defined while the
///   output is undefined.
///
/// A frame can count toward both FP and FN; recall and precision are
/// independent counts, not a single confusion matrix. NaN overlap (ground
/// truth undefined) satisfies no threshold comparison.
///
/// # Returns
/// `(recall, precision)`; either is NaN when its denominator is empty.
pub fn compute_recall_precision(
    overlap: &[f64],
    output_defined: &[bool],
    gt_defined: &[bool],
    theta: f64,
) -> (f64, f64) {
    let adjusted = zero_undefined_output(overlap, output_defined, gt_defined);

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for i in 0..adjusted.len() {
        let ov = adjusted[i];
        let out_def = output_defined[i];
        let gt_def = gt_defined[i];

        if ov > theta {
            tp += 1;
        }
        if ov <= theta || (!gt_def && out_def) {
            fp += 1;
        }
        if ov <= theta || (gt_def && !out_def) {
            fn_ += 1;
        }
    }

    let precision = tp as f64 / (tp + fp) as f64;
    let recall = tp as f64 / (tp + fn_) as f64;
    (recall, precision)
}

/// Aggregate throughput: total frames divided by total elapsed seconds.
///
/// Pairs with no recorded timing (`None`) are skipped entirely, frame count
/// included. NaN when no timing was recorded at all.
pub fn compute_fps(frame_counts: &[usize], elapsed: &[Option<f64>]) -> f64 {
    debug_assert_eq!(frame_counts.len(), elapsed.len());

    let mut frames = 0usize;
    let mut time = 0.0;
    let mut any = false;
    for (&count, &t) in frame_counts.iter().zip(elapsed.iter()) {
        if let Some(t) = t {
            frames += count;
            time += t;
            any = true;
        }
    }

    if any {
        frames as f64 / time
    } else {
        f64::NAN
    }
}
