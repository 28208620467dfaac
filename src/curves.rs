//! Curve Repository
//!
//! Static equalization data loaded once at startup: one frequency axis,
//! magnitude/phase tables for the loudness, treble and bass families, and
//! the per-speaker target curve. Tables are plain-text matrices, one row per
//! frequency, one column per 1 dB curve step. Read-only during operation;
//! any load failure is fatal because gain cannot be computed safely without
//! the full set.

use std::fs;
use std::path::Path;

use log::info;

use crate::config::Config;
use crate::error::{ClaroError, Result};

/// Frequency axis file name.
pub const FREQ_FILE: &str = "freq.dat";
/// Curve family file names, magnitude and phase.
pub const LOUDNESS_MAG_FILE: &str = "loudness_mag.dat";
pub const LOUDNESS_PHA_FILE: &str = "loudness_pha.dat";
pub const TREBLE_MAG_FILE: &str = "treble_mag.dat";
pub const TREBLE_PHA_FILE: &str = "treble_pha.dat";
pub const BASS_MAG_FILE: &str = "bass_mag.dat";
pub const BASS_PHA_FILE: &str = "bass_pha.dat";
/// Per-speaker target curve file names.
pub const TARGET_MAG_FILE: &str = "target_mag.dat";
pub const TARGET_PHA_FILE: &str = "target_pha.dat";

/// One curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Loudness,
    Treble,
    Bass,
}

/// Magnitude and phase matrices of one family, `[frequency][step]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveTable {
    pub mag: Vec<Vec<f64>>,
    pub pha: Vec<Vec<f64>>,
}

impl CurveTable {
    /// Number of curve steps (columns) in this family.
    pub fn steps(&self) -> usize {
        self.mag.first().map(Vec::len).unwrap_or(0)
    }
}

/// The full set of pre-loaded curves.
#[derive(Debug, Clone)]
pub struct CurveRepository {
    frequencies: Vec<f64>,
    target_mag: Vec<f64>,
    target_pha: Vec<f64>,
    loudness: CurveTable,
    treble: CurveTable,
    bass: CurveTable,
}

impl CurveRepository {
    /// Load every curve file from `dir` and validate shapes against the
    /// configured spans.
    pub fn load(dir: &Path, config: &Config) -> Result<Self> {
        let frequencies = read_vector(&dir.join(FREQ_FILE))?;
        let target_mag = read_vector(&dir.join(TARGET_MAG_FILE))?;
        let target_pha = read_vector(&dir.join(TARGET_PHA_FILE))?;
        let loudness = CurveTable {
            mag: read_matrix(&dir.join(LOUDNESS_MAG_FILE))?,
            pha: read_matrix(&dir.join(LOUDNESS_PHA_FILE))?,
        };
        let treble = CurveTable {
            mag: read_matrix(&dir.join(TREBLE_MAG_FILE))?,
            pha: read_matrix(&dir.join(TREBLE_PHA_FILE))?,
        };
        let bass = CurveTable {
            mag: read_matrix(&dir.join(BASS_MAG_FILE))?,
            pha: read_matrix(&dir.join(BASS_PHA_FILE))?,
        };
        let repository =
            Self::from_parts(frequencies, target_mag, target_pha, loudness, treble, bass, config)?;
        info!(
            "loaded curves: {} frequencies, {} loudness steps, {} tone steps",
            repository.frequencies.len(),
            repository.loudness.steps(),
            repository.treble.steps()
        );
        Ok(repository)
    }

    /// Assemble a repository from already-parsed tables, validating shapes.
    pub fn from_parts(
        frequencies: Vec<f64>,
        target_mag: Vec<f64>,
        target_pha: Vec<f64>,
        loudness: CurveTable,
        treble: CurveTable,
        bass: CurveTable,
        config: &Config,
    ) -> Result<Self> {
        let freq_count = frequencies.len();
        if freq_count == 0 {
            return Err(ClaroError::CurveShape {
                reason: "frequency axis is empty".to_string(),
            });
        }
        check_vector("target_mag", &target_mag, freq_count)?;
        check_vector("target_pha", &target_pha, freq_count)?;
        check_table("loudness", &loudness, freq_count, config.loudness_steps())?;
        check_table("treble", &treble, freq_count, config.tone_steps())?;
        check_table("bass", &bass, freq_count, config.tone_steps())?;
        Ok(Self {
            frequencies,
            target_mag,
            target_pha,
            loudness,
            treble,
            bass,
        })
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn target_mag(&self) -> &[f64] {
        &self.target_mag
    }

    pub fn target_pha(&self) -> &[f64] {
        &self.target_pha
    }

    pub fn family(&self, family: Family) -> &CurveTable {
        match family {
            Family::Loudness => &self.loudness,
            Family::Treble => &self.treble,
            Family::Bass => &self.bass,
        }
    }
}

fn check_vector(name: &str, vector: &[f64], freq_count: usize) -> Result<()> {
    if vector.len() != freq_count {
        return Err(ClaroError::CurveShape {
            reason: format!(
                "{name} has {} points, frequency axis has {freq_count}",
                vector.len()
            ),
        });
    }
    Ok(())
}

fn check_table(name: &str, table: &CurveTable, freq_count: usize, steps: usize) -> Result<()> {
    for (kind, matrix) in [("mag", &table.mag), ("pha", &table.pha)] {
        if matrix.len() != freq_count {
            return Err(ClaroError::CurveShape {
                reason: format!(
                    "{name}_{kind} has {} rows, frequency axis has {freq_count}",
                    matrix.len()
                ),
            });
        }
        for (row_index, row) in matrix.iter().enumerate() {
            if row.len() != steps {
                return Err(ClaroError::CurveShape {
                    reason: format!(
                        "{name}_{kind} row {row_index} has {} columns, expected {steps}",
                        row.len()
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Read a whitespace-separated matrix, one row per non-comment line.
fn read_matrix(path: &Path) -> Result<Vec<Vec<f64>>> {
    let text = fs::read_to_string(path).map_err(|source| ClaroError::CurveFileNotFound {
        path: path.display().to_string(),
        source,
    })?;
    let mut rows = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut row = Vec::new();
        for field in line.split_whitespace() {
            let value: f64 = field.parse().map_err(|_| ClaroError::InvalidCurve {
                path: path.display().to_string(),
                reason: format!("line {}: '{field}' is not a number", line_number + 1),
            })?;
            row.push(value);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(ClaroError::InvalidCurve {
            path: path.display().to_string(),
            reason: "file contains no data".to_string(),
        });
    }
    Ok(rows)
}

/// Read a single-column (or single-value-per-line) vector.
fn read_vector(path: &Path) -> Result<Vec<f64>> {
    let rows = read_matrix(path)?;
    let mut values = Vec::with_capacity(rows.len());
    for (row_index, row) in rows.iter().enumerate() {
        if row.len() != 1 {
            return Err(ClaroError::InvalidCurve {
                path: path.display().to_string(),
                reason: format!("row {row_index} has {} values, expected 1", row.len()),
            });
        }
        values.push(row[0]);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        write!(file, "{content}").unwrap();
    }

    fn flat_table(freq_count: usize, steps: usize) -> CurveTable {
        CurveTable {
            mag: vec![vec![0.0; steps]; freq_count],
            pha: vec![vec![0.0; steps]; freq_count],
        }
    }

    #[test]
    fn test_read_matrix_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "table.dat",
            "# comment\n1.0 2.0\n\n3.0 4.0\n",
        );
        let matrix = read_matrix(&dir.path().join("table.dat")).unwrap();
        assert_eq!(matrix, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_read_matrix_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "table.dat", "1.0 oops\n");
        assert!(matches!(
            read_matrix(&dir.path().join("table.dat")),
            Err(ClaroError::InvalidCurve { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_matrix(&dir.path().join("absent.dat")),
            Err(ClaroError::CurveFileNotFound { .. })
        ));
    }

    #[test]
    fn test_from_parts_validates_tone_steps() {
        let config = Config::default();
        let result = CurveRepository::from_parts(
            vec![100.0, 1000.0],
            vec![0.0; 2],
            vec![0.0; 2],
            flat_table(2, config.loudness_steps()),
            flat_table(2, 12), // one column short
            flat_table(2, config.tone_steps()),
            &config,
        );
        assert!(matches!(result, Err(ClaroError::CurveShape { .. })));
    }

    #[test]
    fn test_from_parts_validates_row_count() {
        let config = Config::default();
        let result = CurveRepository::from_parts(
            vec![100.0, 1000.0],
            vec![0.0; 2],
            vec![0.0; 2],
            flat_table(3, config.loudness_steps()),
            flat_table(2, config.tone_steps()),
            flat_table(2, config.tone_steps()),
            &config,
        );
        assert!(matches!(result, Err(ClaroError::CurveShape { .. })));
    }

    #[test]
    fn test_load_full_directory() {
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let freq_count = 3;
        let freq = "20\n1000\n20000\n";
        write_file(dir.path(), FREQ_FILE, freq);
        write_file(dir.path(), TARGET_MAG_FILE, "0\n0\n0\n");
        write_file(dir.path(), TARGET_PHA_FILE, "0\n0\n0\n");
        let tone_row = vec!["0.5"; config.tone_steps()].join(" ");
        let loud_row = vec!["1.5"; config.loudness_steps()].join(" ");
        let tone = format!("{tone_row}\n").repeat(freq_count);
        let loud = format!("{loud_row}\n").repeat(freq_count);
        for name in [TREBLE_MAG_FILE, TREBLE_PHA_FILE, BASS_MAG_FILE, BASS_PHA_FILE] {
            write_file(dir.path(), name, &tone);
        }
        for name in [LOUDNESS_MAG_FILE, LOUDNESS_PHA_FILE] {
            write_file(dir.path(), name, &loud);
        }

        let repository = CurveRepository::load(dir.path(), &config).unwrap();
        assert_eq!(repository.frequencies(), &[20.0, 1000.0, 20000.0]);
        assert_eq!(repository.family(Family::Loudness).mag[1][0], 1.5);
        assert_eq!(repository.family(Family::Bass).steps(), 13);
    }
}
