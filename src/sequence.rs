//! Sequence catalog discovery and ground-truth loading.
//!
//! A catalog root either contains dataset subdirectories (detected by the
//! presence of a `datasets` marker directory) or is itself a flat collection
//! of sequence directories. Each sequence directory holds sequentially
//! numbered image files (`00000001.jpg` or `.png`) and an optional
//! `groundtruth.txt` region file with one box row per frame.

use crate::region_file::read_regions;
use crate::{Error, Result};
use log::{info, warn};
use nalgebra::DMatrix;
use std::fs;
use std::path::{Path, PathBuf};

/// A video sequence: its images and optional ground-truth annotation.
#[derive(Debug)]
pub struct Sequence {
    /// Dataset the sequence belongs to (`.` for a flat catalog).
    pub dataset: String,
    /// Directory name of the sequence.
    pub name: String,
    /// Unique identifier: `dataset.name`, or just `name` in a flat catalog.
    pub identifier: String,
    /// Absolute sequence directory.
    pub directory: PathBuf,
    /// Absolute paths of the frame images, in order.
    pub images: Vec<PathBuf>,
    /// Ground-truth boxes, one row per frame; None if the sequence has no
    /// `groundtruth.txt`.
    pub gt: Option<DMatrix<f64>>,
}

impl Sequence {
    /// Number of frames in the sequence.
    pub fn num_frames(&self) -> usize {
        self.images.len()
    }
}

/// Enumerate `00000001.jpg`-style numbered images in a sequence directory.
///
/// Probes for a `.jpg` first frame, then `.png`; returns the contiguous run
/// of numbered files starting at 1.
fn list_images(directory: &Path) -> Vec<PathBuf> {
    let ext = if directory.join("00000001.jpg").exists() {
        ".jpg"
    } else {
        ".png"
    };

    let mut images = Vec::new();
    for i in 1.. {
        let path = directory.join(format!("{:08}{}", i, ext));
        if path.exists() {
            images.push(path);
        } else {
            break;
        }
    }
    images
}

fn load_sequence(dataset: &str, directory: PathBuf, flat: bool) -> Result<Option<Sequence>> {
    let name = directory
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let identifier = if flat {
        name.clone()
    } else {
        format!("{}.{}", dataset, name)
    };

    info!("loading sequence {}", identifier);

    let images = list_images(&directory);
    if images.is_empty() {
        warn!("sequence {} contains no numbered images, skipping", identifier);
        return Ok(None);
    }

    let gt_file = directory.join("groundtruth.txt");
    let gt = if gt_file.exists() {
        let gt = read_regions(&gt_file)?;
        if gt.nrows() != images.len() {
            return Err(Error::FrameCountMismatch {
                expected: images.len(),
                got: gt.nrows(),
            });
        }
        Some(gt)
    } else {
        warn!("sequence {} doesn't have a groundtruth file", identifier);
        None
    };

    Ok(Some(Sequence {
        dataset: dataset.to_string(),
        name,
        identifier,
        directory,
        images,
        gt,
    }))
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Load every sequence under a catalog root.
///
/// The root holds dataset subdirectories when a `datasets` marker directory
/// is present, otherwise the sequence directories sit directly in the root.
///
/// # Errors
/// `Config` if the root is not a directory; `FrameCountMismatch` if any
/// sequence's ground truth disagrees with its image count.
pub fn load_sequences<P: AsRef<Path>>(top_dir: P) -> Result<Vec<Sequence>> {
    let top_dir = top_dir.as_ref();
    if !top_dir.is_dir() {
        return Err(Error::Config(format!(
            "catalog root '{}' is not a directory",
            top_dir.display()
        )));
    }

    info!("listing sequences in directory {}", top_dir.display());

    let has_datasets = top_dir.join("datasets").exists();

    let mut sequences = Vec::new();
    if has_datasets {
        for dataset_dir in subdirectories(top_dir)? {
            let dataset = dataset_dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            for seq_dir in subdirectories(&dataset_dir)? {
                if let Some(seq) = load_sequence(&dataset, seq_dir, false)? {
                    sequences.push(seq);
                }
            }
        }
    } else {
        for seq_dir in subdirectories(top_dir)? {
            if let Some(seq) = load_sequence(".", seq_dir, true)? {
                sequences.push(seq);
            }
        }
    }

    Ok(sequences)
}

/// Load the sequences named in a selection file (one identifier per line),
/// in selection order.
///
/// # Errors
/// `Config` if a selected identifier is not present in the catalog.
pub fn load_sequence_selection<P1: AsRef<Path>, P2: AsRef<Path>>(
    selection_file: P1,
    top_dir: P2,
) -> Result<Vec<Sequence>> {
    let text = fs::read_to_string(&selection_file).map_err(|e| {
        Error::Config(format!(
            "failed to read sequence selection '{}': {}",
            selection_file.as_ref().display(),
            e
        ))
    })?;

    let mut catalog: Vec<Sequence> = load_sequences(top_dir)?;
    let mut selected = Vec::new();
    for line in text.lines() {
        let identifier = line.trim();
        if identifier.is_empty() {
            continue;
        }
        match catalog.iter().position(|s| s.identifier == identifier) {
            Some(idx) => selected.push(catalog.swap_remove(idx)),
            None => {
                return Err(Error::Config(format!(
                    "selected sequence '{}' not found in catalog",
                    identifier
                )))
            }
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn make_sequence(root: &Path, name: &str, frames: usize, with_gt: bool) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for i in 1..=frames {
            File::create(dir.join(format!("{:08}.jpg", i))).unwrap();
        }
        if with_gt {
            let mut gt = File::create(dir.join("groundtruth.txt")).unwrap();
            for _ in 0..frames {
                writeln!(gt, "0.00,0.00,10.00,10.00").unwrap();
            }
        }
    }

    #[test]
    fn test_flat_catalog() {
        let root = TempDir::new().unwrap();
        make_sequence(root.path(), "ball", 3, true);
        make_sequence(root.path(), "car", 2, false);

        let seqs = load_sequences(root.path()).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].identifier, "ball");
        assert_eq!(seqs[0].num_frames(), 3);
        assert!(seqs[0].gt.is_some());
        assert!(seqs[1].gt.is_none());
    }

    #[test]
    fn test_dataset_catalog_identifiers() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("datasets")).unwrap();
        make_sequence(&root.path().join("otb"), "ball", 2, true);

        let seqs = load_sequences(root.path()).unwrap();
        let identifiers: Vec<&str> =
            seqs.iter().map(|s| s.identifier.as_str()).collect();
        assert!(identifiers.contains(&"otb.ball"));
    }

    #[test]
    fn test_gt_frame_count_mismatch_is_fatal() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("bad");
        fs::create_dir_all(&dir).unwrap();
        for i in 1..=2 {
            File::create(dir.join(format!("{:08}.jpg", i))).unwrap();
        }
        let mut gt = File::create(dir.join("groundtruth.txt")).unwrap();
        for _ in 0..3 {
            writeln!(gt, "0.00,0.00,10.00,10.00").unwrap();
        }

        assert!(matches!(
            load_sequences(root.path()),
            Err(Error::FrameCountMismatch {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_png_fallback() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("pngseq");
        fs::create_dir_all(&dir).unwrap();
        for i in 1..=2 {
            File::create(dir.join(format!("{:08}.png", i))).unwrap();
        }

        let seqs = load_sequences(root.path()).unwrap();
        assert_eq!(seqs.len(), 1);
        assert_eq!(seqs[0].num_frames(), 2);
    }

    #[test]
    fn test_selection_order_and_unknown() {
        let root = TempDir::new().unwrap();
        make_sequence(root.path(), "ball", 2, true);
        make_sequence(root.path(), "car", 2, true);

        let sel = root.path().join("selection.txt");
        fs::write(&sel, "car\nball\n").unwrap();
        let seqs = load_sequence_selection(&sel, root.path()).unwrap();
        assert_eq!(seqs[0].identifier, "car");
        assert_eq!(seqs[1].identifier, "ball");

        fs::write(&sel, "ghost\n").unwrap();
        assert!(matches!(
            load_sequence_selection(&sel, root.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_bad_root() {
        assert!(matches!(
            load_sequences("/definitely/not/a/dir"),
            Err(Error::Config(_))
        ));
    }
}
