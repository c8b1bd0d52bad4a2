//! Region representations and batch overlap computation.
//!
//! A region batch is a `DMatrix<f64>` with one row per frame. Boxes use 4
//! columns `[x, y, w, h]` (origin plus size); corner-point form uses 4 columns
//! `[x_min, y_min, x_max, y_max]`; polygons use 8 columns of interleaved
//! `(x, y)` vertex pairs. A row containing any NaN marks an *undefined*
//! region (no estimate for that frame).
//!
//! Conversions follow the inclusive-pixel convention: `x_max = x + w - 1`,
//! so an integer-valued box round-trips exactly through corner form.

use crate::{Error, Result};
use nalgebra::DMatrix;

/// Minimum that propagates NaN (`f64::min` would discard it).
#[inline]
fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

/// Maximum that propagates NaN (`f64::max` would discard it).
#[inline]
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// Convert a batch of boxes `[x, y, w, h]` to corner points
/// `[x_min, y_min, x_max, y_max]`.
///
/// Uses the inclusive-pixel convention: `x_max = x + w - 1`.
pub fn to_corners(boxes: &DMatrix<f64>) -> DMatrix<f64> {
    let n = boxes.nrows();
    let mut pts = DMatrix::zeros(n, 4);
    for i in 0..n {
        pts[(i, 0)] = boxes[(i, 0)];
        pts[(i, 1)] = boxes[(i, 1)];
        pts[(i, 2)] = boxes[(i, 0)] + boxes[(i, 2)] - 1.0;
        pts[(i, 3)] = boxes[(i, 1)] + boxes[(i, 3)] - 1.0;
    }
    pts
}

/// Convert a batch of corner points `[x_min, y_min, x_max, y_max]` back to
/// boxes `[x, y, w, h]`, with `w = x_max - x_min + 1`.
pub fn to_box(points: &DMatrix<f64>) -> DMatrix<f64> {
    let n = points.nrows();
    let mut boxes = DMatrix::zeros(n, 4);
    for i in 0..n {
        boxes[(i, 0)] = points[(i, 0)];
        boxes[(i, 1)] = points[(i, 1)];
        boxes[(i, 2)] = points[(i, 2)] - points[(i, 0)] + 1.0;
        boxes[(i, 3)] = points[(i, 3)] - points[(i, 1)] + 1.0;
    }
    boxes
}

/// Convert a batch of boxes to 4-vertex polygons (N x 8).
///
/// Vertices are emitted clockwise starting at the minimum corner:
/// top-left, top-right, bottom-right, bottom-left.
pub fn box_to_polygon(boxes: &DMatrix<f64>) -> DMatrix<f64> {
    let pts = to_corners(boxes);
    let n = pts.nrows();
    let mut poly = DMatrix::zeros(n, 8);
    for i in 0..n {
        let (x_min, y_min, x_max, y_max) =
            (pts[(i, 0)], pts[(i, 1)], pts[(i, 2)], pts[(i, 3)]);
        poly[(i, 0)] = x_min;
        poly[(i, 1)] = y_min;
        poly[(i, 2)] = x_max;
        poly[(i, 3)] = y_min;
        poly[(i, 4)] = x_max;
        poly[(i, 5)] = y_max;
        poly[(i, 6)] = x_min;
        poly[(i, 7)] = y_max;
    }
    poly
}

/// Collapse a batch of polygons (N x 2k, interleaved x/y) to boxes.
///
/// Takes the axis-aligned envelope of the vertices (min/max over the x and y
/// channels independently) and converts it to box form. Rotated polygons are
/// therefore approximated by their enclosing box; this is an accepted lossy
/// conversion, not a defect.
pub fn polygon_to_box(poly: &DMatrix<f64>) -> DMatrix<f64> {
    let n = poly.nrows();
    let cols = poly.ncols();
    let mut pts = DMatrix::zeros(n, 4);
    for i in 0..n {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for c in (0..cols).step_by(2) {
            min_x = nan_min(min_x, poly[(i, c)]);
            max_x = nan_max(max_x, poly[(i, c)]);
            min_y = nan_min(min_y, poly[(i, c + 1)]);
            max_y = nan_max(max_y, poly[(i, c + 1)]);
        }
        pts[(i, 0)] = min_x;
        pts[(i, 1)] = min_y;
        pts[(i, 2)] = max_x;
        pts[(i, 3)] = max_y;
    }
    to_box(&pts)
}

/// Per-row definedness flags: a row is defined iff it contains no NaN.
pub fn defined_rows(batch: &DMatrix<f64>) -> Vec<bool> {
    (0..batch.nrows())
        .map(|i| (0..batch.ncols()).all(|j| !batch[(i, j)].is_nan()))
        .collect()
}

/// Elementwise IoU between two equal-length batches of boxes `[x, y, w, h]`.
///
/// Intersection lengths are clamped at 0; union = area1 + area2 -
/// intersection. The result may be NaN for a row where the union is 0 (both
/// regions degenerate) or where either region is undefined; callers must
/// handle NaN explicitly.
///
/// # Errors
/// `ShapeMismatch` if the batches differ in row count.
pub fn overlap(t1: &DMatrix<f64>, t2: &DMatrix<f64>) -> Result<Vec<f64>> {
    if t1.nrows() != t2.nrows() {
        return Err(Error::ShapeMismatch {
            left: t1.nrows(),
            right: t2.nrows(),
        });
    }

    let mut result = Vec::with_capacity(t1.nrows());
    for i in 0..t1.nrows() {
        let (x1, y1, w1, h1) = (t1[(i, 0)], t1[(i, 1)], t1[(i, 2)], t1[(i, 3)]);
        let (x2, y2, w2, h2) = (t2[(i, 0)], t2[(i, 1)], t2[(i, 2)], t2[(i, 3)]);

        let hrz = nan_max(0.0, nan_min(x1 + w1, x2 + w2) - nan_max(x1, x2));
        let vrt = nan_max(0.0, nan_min(y1 + h1, y2 + h2) - nan_max(y1, y2));
        let intersection = hrz * vrt;
        let union = w1 * h1 + w2 * h2 - intersection;

        result.push(intersection / union);
    }
    Ok(result)
}

/// Compute overlap plus definedness flags between a tracker output and the
/// ground truth.
///
/// # Returns
/// `(overlap, output_defined, gt_defined)` - one entry per frame.
pub fn overlap_with_flags(
    output: &DMatrix<f64>,
    gt: &DMatrix<f64>,
) -> Result<(Vec<f64>, Vec<bool>, Vec<bool>)> {
    let ov = overlap(output, gt)?;
    let output_defined = defined_rows(output);
    let gt_defined = defined_rows(gt);
    Ok((ov, output_defined, gt_defined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn boxes(rows: &[[f64; 4]]) -> DMatrix<f64> {
        DMatrix::from_fn(rows.len(), 4, |i, j| rows[i][j])
    }

    #[test]
    fn test_corner_round_trip() {
        let b = boxes(&[[10.0, 20.0, 30.0, 40.0], [0.0, 0.0, 1.0, 1.0]]);
        let round = to_box(&to_corners(&b));
        assert_eq!(b, round);
    }

    #[test]
    fn test_corners_inclusive_convention() {
        let b = boxes(&[[5.0, 5.0, 10.0, 10.0]]);
        let pts = to_corners(&b);
        assert_eq!(pts[(0, 2)], 14.0);
        assert_eq!(pts[(0, 3)], 14.0);
    }

    #[test]
    fn test_polygon_round_trip_axis_aligned() {
        let b = boxes(&[[10.0, 20.0, 30.0, 40.0]]);
        let poly = box_to_polygon(&b);
        assert_eq!(poly.ncols(), 8);
        let back = polygon_to_box(&poly);
        assert_eq!(b, back);
    }

    #[test]
    fn test_polygon_to_box_envelope() {
        // A rotated quadrilateral collapses to its axis-aligned envelope.
        let poly = DMatrix::from_row_slice(
            1,
            8,
            &[5.0, 0.0, 10.0, 5.0, 5.0, 10.0, 0.0, 5.0],
        );
        let b = polygon_to_box(&poly);
        assert_eq!(b[(0, 0)], 0.0);
        assert_eq!(b[(0, 1)], 0.0);
        assert_eq!(b[(0, 2)], 11.0);
        assert_eq!(b[(0, 3)], 11.0);
    }

    #[test]
    fn test_overlap_identity() {
        let b = boxes(&[[0.0, 0.0, 10.0, 10.0], [5.0, 7.0, 3.0, 4.0]]);
        let ov = overlap(&b, &b).unwrap();
        for v in ov {
            assert_relative_eq!(v, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_overlap_partial() {
        let a = boxes(&[[0.0, 0.0, 10.0, 10.0]]);
        let b = boxes(&[[5.0, 5.0, 10.0, 10.0]]);
        let ov = overlap(&a, &b).unwrap();
        // Intersection 5x5 = 25, union 100 + 100 - 25 = 175
        assert_relative_eq!(ov[0], 25.0 / 175.0, epsilon = 1e-12);
    }

    #[test]
    fn test_overlap_disjoint() {
        let a = boxes(&[[0.0, 0.0, 10.0, 10.0]]);
        let b = boxes(&[[20.0, 20.0, 10.0, 10.0]]);
        let ov = overlap(&a, &b).unwrap();
        assert_relative_eq!(ov[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_overlap_in_unit_range() {
        let a = boxes(&[[0.0, 0.0, 7.0, 3.0], [2.0, 2.0, 4.0, 9.0]]);
        let b = boxes(&[[1.0, 1.0, 5.0, 5.0], [0.0, 0.0, 8.0, 8.0]]);
        for v in overlap(&a, &b).unwrap() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_overlap_shape_mismatch() {
        let a = boxes(&[[0.0, 0.0, 10.0, 10.0]]);
        let b = boxes(&[[0.0, 0.0, 10.0, 10.0], [0.0, 0.0, 10.0, 10.0]]);
        assert!(matches!(
            overlap(&a, &b),
            Err(Error::ShapeMismatch { left: 1, right: 2 })
        ));
    }

    #[test]
    fn test_overlap_zero_union_is_nan() {
        let a = boxes(&[[0.0, 0.0, 0.0, 0.0]]);
        let ov = overlap(&a, &a).unwrap();
        assert!(ov[0].is_nan());
    }

    #[test]
    fn test_overlap_undefined_row_is_nan() {
        let a = boxes(&[[f64::NAN, f64::NAN, f64::NAN, f64::NAN]]);
        let b = boxes(&[[0.0, 0.0, 10.0, 10.0]]);
        let ov = overlap(&a, &b).unwrap();
        assert!(ov[0].is_nan());
    }

    #[test]
    fn test_defined_rows() {
        let m = boxes(&[
            [0.0, 0.0, 1.0, 1.0],
            [f64::NAN, 0.0, 1.0, 1.0],
            [f64::NAN, f64::NAN, f64::NAN, f64::NAN],
        ]);
        assert_eq!(defined_rows(&m), vec![true, false, false]);
    }

    #[test]
    fn test_overlap_with_flags() {
        let gt = boxes(&[[0.0, 0.0, 10.0, 10.0], [0.0, 0.0, 10.0, 10.0]]);
        let out = boxes(&[
            [0.0, 0.0, 10.0, 10.0],
            [f64::NAN, f64::NAN, f64::NAN, f64::NAN],
        ]);
        let (ov, out_def, gt_def) = overlap_with_flags(&out, &gt).unwrap();
        assert_relative_eq!(ov[0], 1.0, epsilon = 1e-12);
        assert!(ov[1].is_nan());
        assert_eq!(out_def, vec![true, false]);
        assert_eq!(gt_def, vec![true, true]);
    }
}
