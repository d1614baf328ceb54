#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use floodsight::models::flood_network::HiddenLayerConfig;
use floodsight::training::EarlyStoppingConfig;
use floodsight::{NetworkConfig, PipelineConfig, TrainingConfig, FEATURE_COLS, TARGET_COLS};

/// Write a small deterministic dataset where both targets depend on a few
/// of the features.
pub fn write_dataset(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("flood.csv");
    let mut text = FEATURE_COLS.join(",");
    text.push(',');
    text.push_str(&TARGET_COLS.join(","));
    text.push('\n');

    for i in 0..rows {
        let features: Vec<f64> = (0..FEATURE_COLS.len())
            .map(|j| ((i * 7 + j * 3) % 11) as f64 + j as f64 * 0.5)
            .collect();
        let rainfall = 2.0 * features[1] + features[4] - 0.5 * features[6];
        let flood = (5.0 * features[9] + 3.0 * features[2]).min(100.0);

        let mut cells: Vec<String> = features.iter().map(|v| format!("{}", v)).collect();
        cells.push(format!("{}", rainfall));
        cells.push(format!("{}", flood));
        text.push_str(&cells.join(","));
        text.push('\n');
    }

    fs::write(&path, text).unwrap();
    path
}

/// A pipeline config small enough to train in a test
pub fn quick_config(epochs: usize) -> PipelineConfig {
    PipelineConfig {
        network: NetworkConfig {
            hidden_layers: vec![
                HiddenLayerConfig { units: 16, dropout: 0.2 },
                HiddenLayerConfig { units: 8, dropout: 0.2 },
            ],
            ..NetworkConfig::default()
        },
        training: TrainingConfig {
            epochs,
            batch_size: 16,
            print_every: 1,
            early_stopping: Some(EarlyStoppingConfig {
                patience: 3,
                ..EarlyStoppingConfig::default()
            }),
            ..TrainingConfig::default()
        },
        ..PipelineConfig::default()
    }
}
