//! End-to-end training procedure: dataset → scalers → network → artifacts.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::dataset::{train_validation_split, Dataset};
use crate::error::{FloodSightError, Result};
use crate::models::flood_network::{FloodNetwork, NetworkConfig};
use crate::persistence::{ArtifactPaths, ModelMetadata, ModelPersistence, PersistentModel};
use crate::scaler::StandardScaler;
use crate::training::{create_adam_trainer, TrainingConfig, TrainingMetrics};

/// Everything that shapes a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub network: NetworkConfig,
    pub training: TrainingConfig,
    /// Fraction of rows held out for validation
    pub validation_fraction: f64,
    pub split_seed: u64,
    pub model_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            network: NetworkConfig::default(),
            training: TrainingConfig::default(),
            validation_fraction: 0.15,
            split_seed: 42,
            model_name: "floodsight".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config; absent fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&contents)
            .map_err(|e| FloodSightError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.training.validate()?;
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(FloodSightError::Config(format!(
                "validation_fraction {} must be in [0, 1)",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// Summary of a finished training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_validation_loss: Option<f64>,
    pub final_metrics: Option<TrainingMetrics>,
    pub artifacts: ArtifactPaths,
    pub scaler_x: StandardScaler,
    pub scaler_y: StandardScaler,
}

/// Fit the input and output scalers on the full dataset
pub fn fit_scalers(dataset: &Dataset) -> Result<(StandardScaler, StandardScaler)> {
    let scaler_x = StandardScaler::fit(&dataset.features)?;
    let scaler_y = StandardScaler::fit(&dataset.targets)?;
    Ok((scaler_x, scaler_y))
}

/// Train a model on `dataset_path` and write the three artifacts into
/// `artifact_dir`, overwriting earlier ones.
pub fn train_pipeline<P: AsRef<Path>, Q: AsRef<Path>>(
    dataset_path: P,
    artifact_dir: Q,
    config: &PipelineConfig,
) -> Result<TrainingReport> {
    config.validate()?;

    let dataset = Dataset::from_csv(dataset_path.as_ref())?;

    let (scaler_x, scaler_y) = fit_scalers(&dataset)?;
    let x = scaler_x.transform(&dataset.features)?;
    let y = scaler_y.transform(&dataset.targets)?;

    let split = train_validation_split(&x, &y, config.validation_fraction, config.split_seed);
    info!(
        "Training on {} rows, validating on {} rows",
        split.train_x.nrows(),
        split.val_x.nrows()
    );
    if split.val_x.nrows() == 0 {
        warn!("No validation rows; early stopping will monitor training loss");
    }

    let network = FloodNetwork::new(config.network.clone())?;
    let mut trainer = create_adam_trainer(network, config.training.clone());
    let validation = if split.val_x.nrows() > 0 {
        Some((&split.val_x, &split.val_y))
    } else {
        None
    };
    trainer.train(&split.train_x, &split.train_y, validation)?;

    let history = trainer.get_metrics_history();
    let best_epoch = trainer.best_epoch();
    let best_validation_loss = match best_epoch {
        Some(epoch) => history.get(epoch).and_then(TrainingMetrics::validation_loss),
        None => history
            .iter()
            .filter_map(TrainingMetrics::validation_loss)
            .fold(None, |best: Option<f64>, loss| Some(best.map_or(loss, |b| b.min(loss)))),
    };

    let artifacts = ArtifactPaths::in_dir(artifact_dir.as_ref());
    let metadata = ModelMetadata::new(config.model_name.clone(), history.len(), best_epoch, best_validation_loss)
        .with_description(format!(
            "Trained on {} rows from {}",
            dataset.len(),
            dataset_path.as_ref().display()
        ));
    trainer.network.save(&artifacts.model, metadata)?;
    ModelPersistence::save_scaler(&scaler_x, &artifacts.scaler_x)?;
    ModelPersistence::save_scaler(&scaler_y, &artifacts.scaler_y)?;
    info!("Saved artifacts to {}", artifact_dir.as_ref().display());

    Ok(TrainingReport {
        epochs_run: history.len(),
        best_epoch,
        best_validation_loss,
        final_metrics: trainer.get_latest_metrics().cloned(),
        artifacts,
        scaler_x,
        scaler_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_recipe() {
        let config = PipelineConfig::default();
        assert_eq!(config.validation_fraction, 0.15);
        assert_eq!(config.split_seed, 42);
        assert_eq!(config.training.batch_size, 256);
        assert_eq!(config.training.epochs, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"split_seed": 7}"#).unwrap();
        assert_eq!(config.split_seed, 7);
        assert_eq!(config.network, NetworkConfig::default());
    }

    #[test]
    fn test_invalid_fraction() {
        let config = PipelineConfig {
            validation_fraction: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FloodSightError::Config(_))));
    }
}
