//! The tracker-by-sequence evaluation driver and report writers.
//!
//! For every tracker x sequence pair the driver obtains a trajectory and an
//! elapsed time - from the outcome cache when one exists, otherwise by
//! invoking the tracker - and collects an owned per-pair record. Pairs are
//! processed strictly sequentially; any per-pair failure (blacklist,
//! invocation error, frame-count mismatch) is logged and recorded as missing
//! without aborting the run. Only configuration-level errors (bad catalog
//! root, malformed registry or selection files) abort.
//!
//! Reports are flat comma-delimited text files under `output_dir/plot/`:
//! pooled-frame success plots, per-threshold success plots over sequence
//! recalls, a recall table with an averaged row, an fps table, and a tracker
//! name listing.

use crate::geometry::{overlap_with_flags, polygon_to_box};
use crate::metrics::scores::nan_mean;
use crate::metrics::{compute_fps, compute_recall_precision, compute_success_plot};
use crate::region_file::{read_regions, write_regions};
use crate::sequence::{load_sequence_selection, Sequence};
use crate::tracker::{load_tracker_selection, Tracker, TrackerRegistry};
use crate::{Error, Result};
use log::{info, warn};
use nalgebra::DMatrix;
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Recall thresholds of the per-threshold success-plot report.
const RECALL_THETAS: [f64; 3] = [0.25, 0.5, 0.75];

/// Recall threshold of the combined recall table.
const TABLE_THETA: f64 = 0.5;

/// Everything an evaluation run needs, passed in explicitly and immutable
/// for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Benchmark name; prefixes every report file.
    pub name: String,
    /// JSON registry of known trackers.
    pub tracker_registry: PathBuf,
    /// JSON selection of trackers to evaluate (with run names).
    pub tracker_selection: PathBuf,
    /// Sequence catalog root directory.
    pub sequence_root: PathBuf,
    /// Newline-separated sequence identifiers to evaluate.
    pub sequence_selection: PathBuf,
    /// Cache directory for raw tracker outcomes and timings.
    pub outcome_dir: PathBuf,
    /// Directory the `plot/` report folder is created under.
    pub output_dir: PathBuf,
}

/// Owned result record for one tracker x sequence pair.
///
/// A missing pair (blacklisted, failed, or inconsistent) carries `None` for
/// the outcome; timing is recorded independently since a cached outcome may
/// lack a timing file.
struct PairRecord {
    tracker: usize,
    sequence: usize,
    outcome: Option<DMatrix<f64>>,
    elapsed: Option<f64>,
}

/// Obtain the outcome for one pair: cached if present, otherwise by running
/// the tracker (and caching the result). Returns `None` outcome on any
/// per-pair failure.
fn collect_pair(
    tracker: &Tracker,
    tracker_idx: usize,
    sequence: &Sequence,
    sequence_idx: usize,
    outcome_dir: &Path,
) -> Result<PairRecord> {
    let missing = |elapsed| PairRecord {
        tracker: tracker_idx,
        sequence: sequence_idx,
        outcome: None,
        elapsed,
    };

    if tracker.blacklist.contains(&sequence.identifier) {
        info!(
            "{} is in blacklist of {}",
            sequence.identifier, tracker.name
        );
        return Ok(missing(None));
    }

    let gt = match &sequence.gt {
        Some(gt) => gt,
        None => {
            warn!(
                "sequence {} has no groundtruth, skipping for {}",
                sequence.identifier, tracker.name
            );
            return Ok(missing(None));
        }
    };

    let pair_dir = outcome_dir.join(&tracker.name).join(&sequence.identifier);
    fs::create_dir_all(&pair_dir)?;
    let outcome_file = pair_dir.join("output.txt");
    let timing_file = pair_dir.join("timing.txt");

    let (mut outcome, elapsed) = if outcome_file.exists() {
        info!(
            "{} already exists, using cached version",
            outcome_file.display()
        );
        let outcome = read_regions(&outcome_file)?;
        let elapsed = fs::read_to_string(&timing_file)
            .ok()
            .and_then(|t| t.trim().parse::<f64>().ok());
        if elapsed.is_none() {
            warn!(
                "no usable timing for cached pair {}/{}",
                tracker.name, sequence.identifier
            );
        }
        (outcome, elapsed)
    } else {
        match tracker.run_on_sequence(sequence) {
            Ok((outcome, elapsed)) => {
                // Cache the raw outcome for the next run.
                write_regions(&outcome_file, &outcome)?;
                fs::write(&timing_file, format!("{}\n", elapsed))?;
                (outcome, Some(elapsed))
            }
            Err(e) => {
                warn!(
                    "tracker {} failed on sequence {}: {}",
                    tracker.name, sequence.identifier, e
                );
                return Ok(missing(None));
            }
        }
    };

    // Normalize polygon outcomes to box form.
    if outcome.ncols() > 4 {
        outcome = polygon_to_box(&outcome);
    } else if outcome.ncols() < 4 {
        warn!(
            "outcome for {}/{} has {} columns, recording as missing",
            tracker.name,
            sequence.identifier,
            outcome.ncols()
        );
        return Ok(missing(elapsed));
    }

    if outcome.nrows() != gt.nrows() {
        warn!(
            "outcome for {}/{} has {} frames but groundtruth has {}, recording as missing",
            tracker.name,
            sequence.identifier,
            outcome.nrows(),
            gt.nrows()
        );
        return Ok(missing(elapsed));
    }

    Ok(PairRecord {
        tracker: tracker_idx,
        sequence: sequence_idx,
        outcome: Some(outcome),
        elapsed,
    })
}

/// Stack box batches row-wise.
fn vstack(matrices: &[&DMatrix<f64>]) -> DMatrix<f64> {
    let nrows: usize = matrices.iter().map(|m| m.nrows()).sum();
    let mut out = DMatrix::zeros(nrows, 4);
    let mut row = 0;
    for m in matrices {
        for i in 0..m.nrows() {
            for j in 0..4 {
                out[(row, j)] = m[(i, j)];
            }
            row += 1;
        }
    }
    out
}

fn write_curve(path: &Path, curve: &[(f64, f64)]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (threshold, rate) in curve {
        writeln!(writer, "{},{}", threshold, rate)?;
    }
    writer.flush()?;
    Ok(())
}

/// Recall at `theta` for one scored pair.
fn pair_recall(outcome: &DMatrix<f64>, gt: &DMatrix<f64>, theta: f64) -> Result<f64> {
    let (ov, out_def, gt_def) = overlap_with_flags(outcome, gt)?;
    let (recall, _) = compute_recall_precision(&ov, &out_def, &gt_def, theta);
    Ok(recall)
}

/// Pooled-frame success plot per tracker: every scored frame of every
/// non-missing sequence lumped together.
fn write_pooled_success_plots(
    name: &str,
    trackers: &[Tracker],
    sequences: &[Sequence],
    outcomes: &[Vec<Option<DMatrix<f64>>>],
    plot_dir: &Path,
) -> Result<()> {
    for (i, tracker) in trackers.iter().enumerate() {
        info!("evaluating {}", tracker.name);

        let mut outs: Vec<&DMatrix<f64>> = Vec::new();
        let mut gts: Vec<&DMatrix<f64>> = Vec::new();
        for (j, sequence) in sequences.iter().enumerate() {
            if let (Some(outcome), Some(gt)) = (&outcomes[i][j], &sequence.gt) {
                outs.push(outcome);
                gts.push(gt);
            }
        }

        let num_missing = sequences.len() - outs.len();
        if num_missing > 0 {
            warn!("{} sequences have no result", num_missing);
        }

        let values: Vec<f64> = if outs.is_empty() {
            Vec::new()
        } else {
            let pooled_out = vstack(&outs);
            let pooled_gt = vstack(&gts);
            let (ov, _, gt_def) = overlap_with_flags(&pooled_out, &pooled_gt)?;
            // Score only annotated frames; an undefined outcome there is a
            // total miss.
            ov.iter()
                .zip(gt_def.iter())
                .filter(|(_, &def)| def)
                .map(|(&v, _)| if v.is_nan() { 0.0 } else { v })
                .collect()
        };

        let curve = compute_success_plot(&values);
        let path = plot_dir.join(format!(
            "{}_success_plot_cvpr_{}.txt",
            name, tracker.name
        ));
        write_curve(&path, &curve)?;
    }
    Ok(())
}

/// Per-threshold success plots over per-sequence recalls.
fn write_threshold_success_plots(
    name: &str,
    trackers: &[Tracker],
    sequences: &[Sequence],
    outcomes: &[Vec<Option<DMatrix<f64>>>],
    plot_dir: &Path,
) -> Result<()> {
    for theta in RECALL_THETAS {
        for (i, tracker) in trackers.iter().enumerate() {
            let mut recalls = Vec::new();
            for (j, sequence) in sequences.iter().enumerate() {
                let (outcome, gt) = match (&outcomes[i][j], &sequence.gt) {
                    (Some(outcome), Some(gt)) => (outcome, gt),
                    _ => {
                        warn!("skipping sequence {}", sequence.identifier);
                        continue;
                    }
                };
                let recall = pair_recall(outcome, gt, theta)?;
                if !recall.is_nan() {
                    recalls.push(recall);
                }
            }

            let curve = compute_success_plot(&recalls);
            let path = plot_dir.join(format!(
                "{}_success_plot_wacv_{}_{}.txt",
                name, theta, tracker.name
            ));
            // The recall curves carry an explicit (0, 1) anchor row.
            let mut anchored = vec![(0.0, 1.0)];
            anchored.extend(curve);
            write_curve(&path, &anchored)?;
        }
    }
    Ok(())
}

/// Combined recall table: sequences x trackers at the table threshold, with
/// a trailing NaN-ignoring average row.
fn write_recall_table(
    name: &str,
    trackers: &[Tracker],
    sequences: &[Sequence],
    outcomes: &[Vec<Option<DMatrix<f64>>>],
    plot_dir: &Path,
) -> Result<()> {
    let m = trackers.len();
    let n = sequences.len();

    let mut recalls = vec![vec![f64::NAN; m]; n];
    for (i, _) in trackers.iter().enumerate() {
        for (j, sequence) in sequences.iter().enumerate() {
            if let (Some(outcome), Some(gt)) = (&outcomes[i][j], &sequence.gt) {
                recalls[j][i] = pair_recall(outcome, gt, TABLE_THETA)?;
            } else {
                warn!("skipping sequence {}", sequence.identifier);
            }
        }
    }

    let averages: Vec<f64> = (0..m)
        .map(|i| {
            let column: Vec<f64> = (0..n).map(|j| recalls[j][i]).collect();
            nan_mean(&column)
        })
        .collect();

    let path = plot_dir.join(format!("{}_recall.txt", name));
    let mut writer = BufWriter::new(File::create(path)?);

    let header: Vec<&str> = std::iter::once("Sequence")
        .chain(trackers.iter().map(|t| t.name.as_str()))
        .collect();
    writeln!(writer, "{}", header.join(","))?;

    for (j, sequence) in sequences.iter().enumerate() {
        let identifier = sequence.identifier.replace('_', "\\_");
        let row: Vec<String> = recalls[j].iter().map(|r| r.to_string()).collect();
        writeln!(writer, "{},{}", identifier, row.join(","))?;
    }
    let avg_row: Vec<String> = averages.iter().map(|r| r.to_string()).collect();
    writeln!(writer, "avg,{}", avg_row.join(","))?;
    writer.flush()?;
    Ok(())
}

/// Throughput table: one `fps, tracker` row per tracker, over the pairs
/// that recorded a timing.
fn write_fps_table(
    name: &str,
    trackers: &[Tracker],
    sequences: &[Sequence],
    timings: &[Vec<Option<f64>>],
    plot_dir: &Path,
) -> Result<()> {
    let frame_counts: Vec<usize> = sequences.iter().map(|s| s.num_frames()).collect();

    let path = plot_dir.join(format!("{}_fps.txt", name));
    let mut writer = BufWriter::new(File::create(path)?);
    for (i, tracker) in trackers.iter().enumerate() {
        let fps = compute_fps(&frame_counts, &timings[i]);
        writeln!(writer, "{}, {}", fps, tracker.name)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_tracker_list(name: &str, trackers: &[Tracker], plot_dir: &Path) -> Result<()> {
    let path = plot_dir.join(format!("{}_list.txt", name));
    let mut writer = BufWriter::new(File::create(path)?);
    for tracker in trackers {
        writeln!(writer, "{}", tracker.name)?;
    }
    writer.flush()?;
    Ok(())
}

/// Run the full evaluation: load configuration, collect per-pair outcomes,
/// and write all reports.
///
/// # Errors
/// Configuration-level problems (unreadable registry/selection files, bad
/// catalog root, unknown protocol) abort; per-pair failures are logged and
/// degrade to missing data in the reports.
pub fn evaluate(config: &EvalConfig) -> Result<()> {
    let registry = TrackerRegistry::load(&config.tracker_registry)?;
    let trackers = load_tracker_selection(&config.tracker_selection, &registry)?;
    let sequences =
        load_sequence_selection(&config.sequence_selection, &config.sequence_root)?;

    if trackers.is_empty() {
        return Err(Error::Config("no trackers selected".to_string()));
    }

    let plot_dir = config.output_dir.join("plot");
    fs::create_dir_all(&plot_dir)?;

    let n = sequences.len();

    // Collection phase: one owned record per pair, strictly sequential.
    let mut records = Vec::with_capacity(trackers.len() * n);
    for (i, tracker) in trackers.iter().enumerate() {
        for (j, sequence) in sequences.iter().enumerate() {
            info!("sequence {}/{}", j + 1, n);
            records.push(collect_pair(tracker, i, sequence, j, &config.outcome_dir)?);
        }
    }

    // Assembly phase: records into per-tracker grids, once.
    let mut outcomes: Vec<Vec<Option<DMatrix<f64>>>> =
        (0..trackers.len()).map(|_| (0..n).map(|_| None).collect()).collect();
    let mut timings: Vec<Vec<Option<f64>>> = vec![vec![None; n]; trackers.len()];
    for record in records {
        outcomes[record.tracker][record.sequence] = record.outcome;
        timings[record.tracker][record.sequence] = record.elapsed;
    }

    write_pooled_success_plots(&config.name, &trackers, &sequences, &outcomes, &plot_dir)?;
    write_threshold_success_plots(&config.name, &trackers, &sequences, &outcomes, &plot_dir)?;
    write_recall_table(&config.name, &trackers, &sequences, &outcomes, &plot_dir)?;
    write_fps_table(&config.name, &trackers, &sequences, &timings, &plot_dir)?;
    write_tracker_list(&config.name, &trackers, &plot_dir)?;

    Ok(())
}
