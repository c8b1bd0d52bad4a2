//! Tracker registry, selection, and external process invocation.
//!
//! Trackers are external programs described by a JSON registry file mapping
//! tracker names to their shell command, initialization protocol, and an
//! optional per-sequence blacklist:
//!
//! ```json
//! {
//!     "kcf": { "command": "run_kcf", "protocol": "BB" },
//!     "cmt": { "command": "run_cmt", "protocol": "POLY", "blacklist": ["otb.car"] }
//! }
//! ```
//!
//! The invocation contract: the evaluator prepares a scratch working
//! directory containing `images.txt` (newline-separated absolute image
//! paths) and `region.txt` (the initial region, serialized per the
//! tracker's protocol), runs the command in that directory, and reads back
//! `output.txt` with one region row per frame.

use crate::geometry::box_to_polygon;
use crate::region_file::{read_regions, write_regions};
use crate::sequence::Sequence;
use crate::{Error, Result};
use log::info;
use nalgebra::DMatrix;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// How a tracker expects its initial region to be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `region.txt` holds a single `x,y,w,h` box row.
    Box,
    /// `region.txt` holds a single 8-column polygon row.
    Polygon,
}

impl Protocol {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "BB" => Ok(Protocol::Box),
            "POLY" => Ok(Protocol::Polygon),
            other => Err(Error::UnknownProtocol(other.to_string())),
        }
    }
}

/// Raw registry entry as it appears in the JSON file.
#[derive(Debug, Deserialize)]
struct RegistryEntry {
    command: String,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    blacklist: Vec<String>,
}

/// An external tracker loaded from the registry.
#[derive(Debug, Clone)]
pub struct Tracker {
    /// Name used in reports (may be renamed by the selection file).
    pub name: String,
    /// Shell command run inside the prepared working directory.
    pub command: String,
    /// Initial-region serialization protocol.
    pub protocol: Protocol,
    /// Sequence identifiers this tracker must not be run on.
    pub blacklist: Vec<String>,
}

/// The set of known trackers, loaded once from an explicit registry path.
#[derive(Debug)]
pub struct TrackerRegistry {
    trackers: HashMap<String, Tracker>,
}

impl TrackerRegistry {
    /// Load a tracker registry from a JSON file.
    ///
    /// # Errors
    /// `Config` if the file cannot be read, `Json` if it is malformed, and
    /// `UnknownProtocol` if any entry declares a protocol other than `BB`
    /// or `POLY`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "failed to read tracker registry '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let entries: HashMap<String, RegistryEntry> = serde_json::from_str(&text)?;

        let mut trackers = HashMap::new();
        for (name, entry) in entries {
            let protocol = match entry.protocol.as_deref() {
                Some(s) => Protocol::parse(s)?,
                None => Protocol::Box,
            };
            trackers.insert(
                name.clone(),
                Tracker {
                    name,
                    command: entry.command,
                    protocol,
                    blacklist: entry.blacklist,
                },
            );
        }
        Ok(Self { trackers })
    }

    /// Look up a tracker by registry name.
    pub fn get(&self, name: &str) -> Option<&Tracker> {
        self.trackers.get(name)
    }

    /// Number of registered trackers.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

/// Selection file shape: `{"selection": [{"registry_name": "run_name"}]}`.
#[derive(Debug, Deserialize)]
struct SelectionFile {
    selection: Vec<HashMap<String, String>>,
}

/// Resolve a selection file against the registry, renaming each selected
/// tracker to its run name.
///
/// # Errors
/// `Config` if the file is unreadable, an entry does not hold exactly one
/// name pair, or it names a tracker missing from the registry.
pub fn load_tracker_selection<P: AsRef<Path>>(
    selection_file: P,
    registry: &TrackerRegistry,
) -> Result<Vec<Tracker>> {
    let text = fs::read_to_string(&selection_file).map_err(|e| {
        Error::Config(format!(
            "failed to read tracker selection '{}': {}",
            selection_file.as_ref().display(),
            e
        ))
    })?;

    let file: SelectionFile = serde_json::from_str(&text)?;

    let mut selected = Vec::new();
    for entry in file.selection {
        if entry.len() != 1 {
            return Err(Error::Config(
                "selection entries must map exactly one registry name to one run name"
                    .to_string(),
            ));
        }
        let (registry_name, run_name) = entry.into_iter().next().unwrap_or_default();
        let tracker = registry.get(&registry_name).ok_or_else(|| {
            Error::Config(format!(
                "selected tracker '{}' not found in registry",
                registry_name
            ))
        })?;
        let mut tracker = tracker.clone();
        tracker.name = run_name;
        selected.push(tracker);
    }
    Ok(selected)
}

fn absolute(path: &PathBuf) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.clone())
}

impl Tracker {
    /// Run the tracker on a sequence and return its trajectory and the
    /// elapsed wall-clock time in seconds.
    ///
    /// Prepares a scratch working directory with `images.txt` and
    /// `region.txt`, runs the command there via the shell, waits for it to
    /// terminate (no timeout; callers wanting one should wrap this call),
    /// and reads back `output.txt`.
    ///
    /// # Errors
    /// `MissingGroundTruth` if the sequence has no annotation to
    /// initialize from; `InvocationFailure` if the process cannot be
    /// spawned or leaves no `output.txt`; `FrameCountMismatch` if the
    /// output row count differs from the ground truth.
    pub fn run_on_sequence(&self, sequence: &Sequence) -> Result<(DMatrix<f64>, f64)> {
        let gt = sequence
            .gt
            .as_ref()
            .ok_or_else(|| Error::MissingGroundTruth(sequence.identifier.clone()))?;

        let working_dir = tempfile::tempdir()?;
        info!("working dir is {}", working_dir.path().display());

        let image_list: Vec<String> = sequence
            .images
            .iter()
            .map(|p| absolute(p).display().to_string())
            .collect();
        let mut listing = image_list.join("\n");
        listing.push('\n');
        fs::write(working_dir.path().join("images.txt"), listing)?;

        let init_box = DMatrix::from_fn(1, 4, |_, j| gt[(0, j)]);
        let init_region = match self.protocol {
            Protocol::Box => init_box,
            Protocol::Polygon => box_to_polygon(&init_box),
        };
        write_regions(working_dir.path().join("region.txt"), &init_region)?;

        info!(
            "running tracker {} on sequence {} ({} frames) using command {}",
            self.name,
            sequence.identifier,
            sequence.num_frames(),
            self.command
        );

        let start = Instant::now();
        let status = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(working_dir.path())
            .status()
            .map_err(|e| {
                Error::InvocationFailure(format!(
                    "failed to spawn '{}': {}",
                    self.command, e
                ))
            })?;
        let elapsed = start.elapsed().as_secs_f64();

        if !status.success() {
            info!("tracker {} exited with status {}", self.name, status);
        }

        let output_file = working_dir.path().join("output.txt");
        if !output_file.exists() {
            return Err(Error::InvocationFailure(
                "no output file was generated".to_string(),
            ));
        }

        let results = read_regions(&output_file)?;
        if results.nrows() != gt.nrows() {
            return Err(Error::FrameCountMismatch {
                expected: gt.nrows(),
                got: results.nrows(),
            });
        }

        Ok((results, elapsed))
    }
}
