//! Delimited-text persistence for region batches.
//!
//! Region files are comma-delimited with one row per frame and 2-decimal
//! fixed precision: 4 columns for boxes, 8 for polygons. Reading is tolerant
//! of missing or non-numeric fields; each such field becomes NaN, which marks
//! the region undefined for that frame.

use crate::{Error, Result};
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Write a region batch as comma-delimited rows with 2-decimal precision.
pub fn write_regions<P: AsRef<Path>>(path: P, batch: &DMatrix<f64>) -> Result<()> {
    let file = File::create(&path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "failed to create region file '{}': {}",
                path.as_ref().display(),
                e
            ),
        ))
    })?;

    let mut writer = BufWriter::new(file);
    for i in 0..batch.nrows() {
        let row: Vec<String> = (0..batch.ncols())
            .map(|j| format!("{:.2}", batch[(i, j)]))
            .collect();
        writeln!(writer, "{}", row.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a region batch from a comma-delimited file.
///
/// Blank or unparseable fields become NaN. The column count is the widest
/// row seen; shorter rows are padded with NaN. An empty file yields a 0x0
/// matrix.
pub fn read_regions<P: AsRef<Path>>(path: P) -> Result<DMatrix<f64>> {
    let file = File::open(&path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "failed to open region file '{}': {}",
                path.as_ref().display(),
                e
            ),
        ))
    })?;

    let reader = BufReader::new(file);
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut ncols = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let values: Vec<f64> = line
            .split(',')
            .map(|field| field.trim().parse().unwrap_or(f64::NAN))
            .collect();
        ncols = ncols.max(values.len());
        rows.push(values);
    }

    let nrows = rows.len();
    let matrix = DMatrix::from_fn(nrows, ncols, |i, j| {
        rows[i].get(j).copied().unwrap_or(f64::NAN)
    });
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_read_round_trip() {
        let batch =
            DMatrix::from_row_slice(2, 4, &[1.0, 2.0, 3.0, 4.0, 5.5, 6.25, 7.0, 8.0]);
        let file = NamedTempFile::new().unwrap();
        write_regions(file.path(), &batch).unwrap();

        let back = read_regions(file.path()).unwrap();
        assert_eq!(back.nrows(), 2);
        assert_eq!(back.ncols(), 4);
        assert_eq!(back[(0, 0)], 1.0);
        // 2-decimal precision preserved
        assert_eq!(back[(1, 1)], 6.25);
    }

    #[test]
    fn test_read_tolerates_missing_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1.0,2.0,3.0,4.0").unwrap();
        writeln!(file, "NaN,NaN,NaN,NaN").unwrap();
        writeln!(file, "5.0,,7.0,x").unwrap();

        let batch = read_regions(file.path()).unwrap();
        assert_eq!(batch.nrows(), 3);
        assert!(batch[(1, 0)].is_nan());
        assert!(batch[(2, 1)].is_nan());
        assert!(batch[(2, 3)].is_nan());
        assert_eq!(batch[(2, 2)], 7.0);
    }

    #[test]
    fn test_read_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let batch = read_regions(file.path()).unwrap();
        assert_eq!(batch.nrows(), 0);
    }

    #[test]
    fn test_write_formats_two_decimals() {
        let batch = DMatrix::from_row_slice(1, 4, &[1.234, 2.0, 3.999, 4.0]);
        let file = NamedTempFile::new().unwrap();
        write_regions(file.path(), &batch).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.trim(), "1.23,2.00,4.00,4.00");
    }
}
