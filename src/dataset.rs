//! Labeled training table: 14 feature columns plus the 2 target columns.

use std::path::Path;

use log::{debug, info};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::DatasetError;
use crate::features::{FEATURE_COLS, NUM_FEATURES, NUM_TARGETS, TARGET_COLS};

/// Feature and target matrices, one row per sample.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Array2<f64>, // (n_samples, 14)
    pub targets: Array2<f64>,  // (n_samples, 2)
}

impl Dataset {
    /// Read a CSV file with a header row. Columns are located by name, so
    /// extra columns and any column order are accepted.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatasetError::NotFound(path.to_path_buf()));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let locate = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };
        let feature_idx = FEATURE_COLS
            .iter()
            .map(|name| locate(name))
            .collect::<Result<Vec<_>, _>>()?;
        let target_idx = TARGET_COLS
            .iter()
            .map(|name| locate(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut features = Vec::new();
        let mut targets = Vec::new();
        let mut rows = 0;

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let cell = |idx: usize, column: &str| -> Result<f64, DatasetError> {
                let raw = record.get(idx).unwrap_or("");
                let invalid = || DatasetError::InvalidValue {
                    row: row + 1,
                    column: column.to_string(),
                    value: raw.to_string(),
                };
                // `parse` accepts "nan" and "inf"; neither can be scaled
                match raw.trim().parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(invalid()),
                }
            };

            for (&idx, name) in feature_idx.iter().zip(FEATURE_COLS.iter()) {
                features.push(cell(idx, name)?);
            }
            for (&idx, name) in target_idx.iter().zip(TARGET_COLS.iter()) {
                targets.push(cell(idx, name)?);
            }
            rows += 1;
        }

        if rows == 0 {
            return Err(DatasetError::Empty);
        }

        info!("Loaded {} rows from {}", rows, path.display());

        Ok(Self {
            features: Array2::from_shape_vec((rows, NUM_FEATURES), features)?,
            targets: Array2::from_shape_vec((rows, NUM_TARGETS), targets)?,
        })
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rows of a shuffled train/validation split.
#[derive(Debug, Clone)]
pub struct Split {
    pub train_x: Array2<f64>,
    pub train_y: Array2<f64>,
    pub val_x: Array2<f64>,
    pub val_y: Array2<f64>,
}

/// Shuffle rows with a seeded RNG and hold out `validation_fraction` of them.
///
/// A fraction of 0.0 (or less) keeps every row for training. Otherwise, with
/// two or more rows, both sides get at least one row.
pub fn train_validation_split(
    inputs: &Array2<f64>,
    targets: &Array2<f64>,
    validation_fraction: f64,
    seed: u64,
) -> Split {
    let n = inputs.nrows();
    assert_eq!(n, targets.nrows(), "inputs and targets must have the same number of rows");

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_val = if validation_fraction <= 0.0 || n < 2 {
        0
    } else {
        ((n as f64 * validation_fraction).ceil() as usize).clamp(1, n - 1)
    };
    let (val_idx, train_idx) = indices.split_at(n_val);
    debug!("Split {} rows into {} train / {} validation", n, train_idx.len(), val_idx.len());

    Split {
        train_x: inputs.select(Axis(0), train_idx),
        train_y: targets.select(Axis(0), train_idx),
        val_x: inputs.select(Axis(0), val_idx),
        val_y: targets.select(Axis(0), val_idx),
    }
}
