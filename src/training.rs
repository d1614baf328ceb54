use std::time::Instant;

use log::{info, warn};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{FloodSightError, Result};
use crate::features::NUM_TARGETS;
use crate::loss::{LossFunction, MAELoss, MSELoss};
use crate::models::flood_network::{FloodNetwork, HeadOutputs};
use crate::optimizers::{Adam, Optimizer};

/// Quantity watched by early stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarlyStoppingMetric {
    ValidationLoss,
    TrainLoss,
}

/// Early stopping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    /// Epochs without improvement before stopping
    pub patience: usize,
    /// Minimum decrease that counts as an improvement
    pub min_delta: f64,
    /// Roll the network back to the best epoch when training ends
    pub restore_best_weights: bool,
    pub monitor: EarlyStoppingMetric,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        EarlyStoppingConfig {
            patience: 10,
            min_delta: 0.0,
            restore_best_weights: true,
            monitor: EarlyStoppingMetric::ValidationLoss,
        }
    }
}

/// Configuration for training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub print_every: usize,
    pub clip_gradient: Option<f64>,
    /// Seed for the per-epoch mini-batch shuffle
    pub seed: u64,
    pub early_stopping: Option<EarlyStoppingConfig>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 100,
            batch_size: 256,
            learning_rate: 1e-3,
            print_every: 10,
            clip_gradient: None,
            seed: 42,
            early_stopping: Some(EarlyStoppingConfig::default()),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(FloodSightError::Config("epochs must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(FloodSightError::Config("batch_size must be positive".into()));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(FloodSightError::Config("learning_rate must be positive".into()));
        }
        Ok(())
    }
}

/// Loss and error figures for one pass over a data set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Sum of the per-head MSE losses
    pub loss: f64,
    pub rainfall_loss: f64,
    pub flood_loss: f64,
    pub rainfall_mae: f64,
    pub flood_mae: f64,
}

impl EvaluationMetrics {
    fn from_outputs(outputs: &HeadOutputs, targets: &Array2<f64>) -> Self {
        let rain_target = targets.row(0).insert_axis(Axis(0)).to_owned();
        let flood_target = targets.row(1).insert_axis(Axis(0)).to_owned();

        let rainfall_loss = MSELoss.compute_loss(&outputs.rainfall, &rain_target);
        let flood_loss = MSELoss.compute_loss(&outputs.flood, &flood_target);

        EvaluationMetrics {
            loss: rainfall_loss + flood_loss,
            rainfall_loss,
            flood_loss,
            rainfall_mae: MAELoss.compute_loss(&outputs.rainfall, &rain_target),
            flood_mae: MAELoss.compute_loss(&outputs.flood, &flood_target),
        }
    }

    fn weighted_sum(parts: &[(EvaluationMetrics, usize)]) -> Self {
        let total: usize = parts.iter().map(|(_, n)| n).sum();
        let total = total.max(1) as f64;
        let avg = |f: fn(&EvaluationMetrics) -> f64| {
            parts.iter().map(|(m, n)| f(m) * *n as f64).sum::<f64>() / total
        };

        EvaluationMetrics {
            loss: avg(|m| m.loss),
            rainfall_loss: avg(|m| m.rainfall_loss),
            flood_loss: avg(|m| m.flood_loss),
            rainfall_mae: avg(|m| m.rainfall_mae),
            flood_mae: avg(|m| m.flood_mae),
        }
    }
}

/// Training metrics tracked per epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub epoch: usize,
    pub train: EvaluationMetrics,
    pub validation: Option<EvaluationMetrics>,
    pub time_elapsed: f64,
    pub learning_rate: f64,
}

impl TrainingMetrics {
    pub fn train_loss(&self) -> f64 {
        self.train.loss
    }

    pub fn validation_loss(&self) -> Option<f64> {
        self.validation.map(|v| v.loss)
    }
}

/// Tracks the monitored loss and decides when to stop
pub struct EarlyStopper {
    config: EarlyStoppingConfig,
    best_score: f64,
    best_epoch: Option<usize>,
    wait: usize,
    stopped_epoch: Option<usize>,
    best_network: Option<FloodNetwork>,
}

impl EarlyStopper {
    pub fn new(config: EarlyStoppingConfig) -> Self {
        EarlyStopper {
            config,
            best_score: f64::INFINITY,
            best_epoch: None,
            wait: 0,
            stopped_epoch: None,
            best_network: None,
        }
    }

    /// Record an epoch. Returns `(should_stop, is_best)`.
    pub fn should_stop(&mut self, metrics: &TrainingMetrics, network: &FloodNetwork) -> (bool, bool) {
        let score = match self.config.monitor {
            EarlyStoppingMetric::ValidationLoss => match metrics.validation_loss() {
                Some(loss) => loss,
                None => {
                    warn!("Validation loss unavailable, early stopping falls back to train loss");
                    metrics.train_loss()
                }
            },
            EarlyStoppingMetric::TrainLoss => metrics.train_loss(),
        };

        if score < self.best_score - self.config.min_delta {
            self.best_score = score;
            self.best_epoch = Some(metrics.epoch);
            self.wait = 0;
            if self.config.restore_best_weights {
                let mut snapshot = network.clone();
                snapshot.eval();
                self.best_network = Some(snapshot);
            }
            return (false, true);
        }

        self.wait += 1;
        if self.wait >= self.config.patience {
            self.stopped_epoch = Some(metrics.epoch);
            return (true, false);
        }
        (false, false)
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }

    /// Hand over the best-weights snapshot, if one was kept
    pub fn take_best_network(&mut self) -> Option<FloodNetwork> {
        self.best_network.take()
    }
}

/// Mini-batch trainer for [`FloodNetwork`]
///
/// Data is passed row-major: `(samples, features)` inputs and
/// `(samples, 2)` targets, already scaled.
pub struct FloodTrainer<L: LossFunction, O: Optimizer> {
    pub network: FloodNetwork,
    pub loss_function: L,
    pub optimizer: O,
    pub config: TrainingConfig,
    pub metrics_history: Vec<TrainingMetrics>,
    best_epoch: Option<usize>,
    stopped_epoch: Option<usize>,
}

impl<L: LossFunction, O: Optimizer> FloodTrainer<L, O> {
    pub fn new(network: FloodNetwork, loss_function: L, optimizer: O) -> Self {
        FloodTrainer {
            network,
            loss_function,
            optimizer,
            config: TrainingConfig::default(),
            metrics_history: Vec::new(),
            best_epoch: None,
            stopped_epoch: None,
        }
    }

    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// One optimizer step on a batch given as (features, batch) / (2, batch)
    pub fn train_batch(&mut self, inputs: &Array2<f64>, targets: &Array2<f64>) -> EvaluationMetrics {
        let outputs = self.network.forward_train(inputs);
        let metrics = EvaluationMetrics::from_outputs(&outputs, targets);

        let rain_target = targets.row(0).insert_axis(Axis(0)).to_owned();
        let flood_target = targets.row(1).insert_axis(Axis(0)).to_owned();
        let d_rain = self.loss_function.compute_gradient(&outputs.rainfall, &rain_target);
        let d_flood = self.loss_function.compute_gradient(&outputs.flood, &flood_target);

        let mut gradients = self.network.backward(&d_rain, &d_flood);
        if let Some(max_norm) = self.config.clip_gradient {
            gradients.clip_by_global_norm(max_norm);
        }

        self.optimizer.step();
        self.network.update_parameters(&gradients, &mut self.optimizer);
        metrics
    }

    /// Train for up to `config.epochs` epochs with optional validation data
    pub fn train(
        &mut self,
        train_x: &Array2<f64>,
        train_y: &Array2<f64>,
        validation: Option<(&Array2<f64>, &Array2<f64>)>,
    ) -> Result<()> {
        self.config.validate()?;
        self.check_data(train_x, train_y)?;
        if let Some((val_x, val_y)) = validation {
            self.check_data(val_x, val_y)?;
        }
        if train_x.nrows() == 0 {
            return Err(FloodSightError::Config("training set is empty".into()));
        }

        // Each call is a fresh fit from the current weights
        self.optimizer.reset();
        self.metrics_history.clear();
        self.best_epoch = None;
        self.stopped_epoch = None;

        let mut stopper = self.config.early_stopping.clone().map(EarlyStopper::new);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut indices: Vec<usize> = (0..train_x.nrows()).collect();

        info!(
            "Starting training for up to {} epochs ({} samples, batch size {}, {} loss, {} parameters)",
            self.config.epochs,
            train_x.nrows(),
            self.config.batch_size,
            self.loss_function.name(),
            self.network.num_parameters()
        );

        for epoch in 0..self.config.epochs {
            let start_time = Instant::now();
            self.network.train();
            indices.shuffle(&mut rng);

            let mut batch_metrics = Vec::new();
            for batch in indices.chunks(self.config.batch_size) {
                let x = train_x.select(Axis(0), batch).reversed_axes();
                let y = train_y.select(Axis(0), batch).reversed_axes();
                batch_metrics.push((self.train_batch(&x, &y), batch.len()));
            }
            let train = EvaluationMetrics::weighted_sum(&batch_metrics);

            self.network.eval();
            let validation = validation.map(|(val_x, val_y)| self.evaluate(val_x, val_y));

            let metrics = TrainingMetrics {
                epoch,
                train,
                validation,
                time_elapsed: start_time.elapsed().as_secs_f64(),
                learning_rate: self.optimizer.learning_rate(),
            };
            self.metrics_history.push(metrics.clone());

            if epoch % self.config.print_every.max(1) == 0 {
                match metrics.validation {
                    Some(val) => info!(
                        "Epoch {}: loss {:.6} (rain mae {:.4}, flood mae {:.4}), val loss {:.6} (rain mae {:.4}, flood mae {:.4}), {:.2}s",
                        epoch, train.loss, train.rainfall_mae, train.flood_mae,
                        val.loss, val.rainfall_mae, val.flood_mae, metrics.time_elapsed
                    ),
                    None => info!(
                        "Epoch {}: loss {:.6} (rain mae {:.4}, flood mae {:.4}), {:.2}s",
                        epoch, train.loss, train.rainfall_mae, train.flood_mae, metrics.time_elapsed
                    ),
                }
            }

            if let Some(ref mut stopper) = stopper {
                let (should_stop, _) = stopper.should_stop(&metrics, &self.network);
                if should_stop {
                    info!("Early stopping at epoch {} (best epoch {:?})", epoch, stopper.best_epoch());
                    break;
                }
            }
        }

        if let Some(mut stopper) = stopper {
            self.best_epoch = stopper.best_epoch();
            self.stopped_epoch = stopper.stopped_epoch();
            if let Some(best) = stopper.take_best_network() {
                info!("Restoring weights from epoch {:?}", self.best_epoch);
                self.network = best;
            }
        }
        self.network.eval();

        info!("Training completed after {} epochs", self.metrics_history.len());
        Ok(())
    }

    /// Evaluate on row-major data in evaluation mode
    pub fn evaluate(&self, x: &Array2<f64>, y: &Array2<f64>) -> EvaluationMetrics {
        let outputs = self.network.predict(&x.t().to_owned());
        EvaluationMetrics::from_outputs(&outputs, &y.t().to_owned())
    }

    pub fn get_latest_metrics(&self) -> Option<&TrainingMetrics> {
        self.metrics_history.last()
    }

    pub fn get_metrics_history(&self) -> &[TrainingMetrics] {
        &self.metrics_history
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }

    fn check_data(&self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.network.input_size() {
            return Err(FloodSightError::ShapeMismatch {
                context: "training input columns",
                expected: self.network.input_size(),
                actual: x.ncols(),
            });
        }
        if y.ncols() != NUM_TARGETS {
            return Err(FloodSightError::ShapeMismatch {
                context: "training target columns",
                expected: NUM_TARGETS,
                actual: y.ncols(),
            });
        }
        if x.nrows() != y.nrows() {
            return Err(FloodSightError::ShapeMismatch {
                context: "training rows",
                expected: x.nrows(),
                actual: y.nrows(),
            });
        }
        Ok(())
    }
}

/// Default trainer: MSE per head with Adam at the configured learning rate
pub fn create_adam_trainer(network: FloodNetwork, config: TrainingConfig) -> FloodTrainer<MSELoss, Adam> {
    let optimizer = Adam::new(config.learning_rate);
    FloodTrainer::new(network, MSELoss, optimizer).with_config(config)
}
