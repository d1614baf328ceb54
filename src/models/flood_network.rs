use ndarray::{concatenate, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{FloodSightError, Result};
use crate::features::NUM_FEATURES;
use crate::layers::batch_norm::{BatchNorm, BatchNormGradients};
use crate::layers::dropout::Dropout;
use crate::layers::linear::{LinearGradients, LinearLayer};
use crate::optimizers::Optimizer;
use crate::utils::{relu, relu_derivative};

/// One hidden block of the shared trunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenLayerConfig {
    pub units: usize,
    pub dropout: f64,
}

/// Architecture of the two-head regression network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub input_size: usize,
    pub hidden_layers: Vec<HiddenLayerConfig>,
    /// Seed for weight initialization and dropout masks
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            input_size: NUM_FEATURES,
            hidden_layers: vec![
                HiddenLayerConfig { units: 128, dropout: 0.2 },
                HiddenLayerConfig { units: 64, dropout: 0.2 },
            ],
            seed: 42,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(FloodSightError::Config("input_size must be positive".into()));
        }
        if self.hidden_layers.is_empty() {
            return Err(FloodSightError::Config("at least one hidden layer is required".into()));
        }
        for (i, layer) in self.hidden_layers.iter().enumerate() {
            if layer.units == 0 {
                return Err(FloodSightError::Config(format!("hidden layer {} has zero units", i)));
            }
            if !(0.0..1.0).contains(&layer.dropout) {
                return Err(FloodSightError::Config(format!(
                    "hidden layer {} dropout {} must be in [0, 1)",
                    i, layer.dropout
                )));
            }
        }
        Ok(())
    }

    /// Width of the trunk output feeding both heads.
    pub fn trunk_output_size(&self) -> usize {
        self.hidden_layers.last().map_or(self.input_size, |l| l.units)
    }
}

/// Dense → ReLU → BatchNorm → Dropout
#[derive(Debug, Clone)]
pub struct DenseBlock {
    pub linear: LinearLayer,
    pub norm: BatchNorm,
    pub dropout: Dropout,
    pre_activation: Option<Array2<f64>>,
}

#[derive(Debug, Clone)]
pub struct DenseBlockGradients {
    pub linear: LinearGradients,
    pub norm: BatchNormGradients,
}

impl DenseBlock {
    pub fn new(linear: LinearLayer, norm: BatchNorm, dropout: Dropout) -> Self {
        DenseBlock {
            linear,
            norm,
            dropout,
            pre_activation: None,
        }
    }

    fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        let z = self.linear.forward(input);
        let a = relu(&z);
        self.pre_activation = Some(z);
        let n = self.norm.forward(&a);
        self.dropout.forward(&n)
    }

    /// Inference path: running statistics, no dropout, no caching
    fn apply(&self, input: &Array2<f64>) -> Array2<f64> {
        let a = relu(&self.linear.apply(input));
        self.norm.apply(&a)
    }

    fn backward(&self, grad_output: &Array2<f64>) -> (DenseBlockGradients, Array2<f64>) {
        let z = self
            .pre_activation
            .as_ref()
            .expect("DenseBlock cache not found for backward pass");

        let grad = self.dropout.backward(grad_output);
        let (norm_grads, grad) = self.norm.backward(&grad);
        let grad = grad * relu_derivative(z);
        let (linear_grads, grad_input) = self.linear.backward(&grad);

        (
            DenseBlockGradients {
                linear: linear_grads,
                norm: norm_grads,
            },
            grad_input,
        )
    }

    fn set_training(&mut self, training: bool) {
        if training {
            self.norm.train();
            self.dropout.train();
        } else {
            self.norm.eval();
            self.dropout.eval();
            self.pre_activation = None;
            self.linear.clear_cache();
        }
    }
}

/// Scaled outputs of the two heads, each of shape (1, batch)
#[derive(Debug, Clone, PartialEq)]
pub struct HeadOutputs {
    pub rainfall: Array2<f64>,
    pub flood: Array2<f64>,
}

impl HeadOutputs {
    /// Heads stacked row-wise into a (2, batch) matrix in target order
    pub fn stacked(&self) -> Array2<f64> {
        concatenate(Axis(0), &[self.rainfall.view(), self.flood.view()])
            .expect("both heads share the batch dimension")
    }
}

/// Gradients for every trainable parameter of the network
#[derive(Debug, Clone)]
pub struct NetworkGradients {
    pub blocks: Vec<DenseBlockGradients>,
    pub rainfall_head: LinearGradients,
    pub flood_head: LinearGradients,
}

impl NetworkGradients {
    pub fn global_norm(&self) -> f64 {
        let blocks: f64 = self
            .blocks
            .iter()
            .map(|b| b.linear.squared_norm() + b.norm.squared_norm())
            .sum();
        (blocks + self.rainfall_head.squared_norm() + self.flood_head.squared_norm()).sqrt()
    }

    /// Rescale all gradients so their global L2 norm is at most `max_norm`
    pub fn clip_by_global_norm(&mut self, max_norm: f64) {
        let norm = self.global_norm();
        if norm > max_norm && norm > 0.0 {
            let factor = max_norm / norm;
            for block in &mut self.blocks {
                block.linear.scale(factor);
                block.norm.scale(factor);
            }
            self.rainfall_head.scale(factor);
            self.flood_head.scale(factor);
        }
    }
}

/// Feed-forward regression network with a shared trunk and two linear heads
/// (rainfall, flood risk).
///
/// Inputs are (features, batch) matrices of already-scaled values.
#[derive(Debug, Clone)]
pub struct FloodNetwork {
    pub config: NetworkConfig,
    pub blocks: Vec<DenseBlock>,
    pub rainfall_head: LinearLayer,
    pub flood_head: LinearLayer,
    pub is_training: bool,
}

impl FloodNetwork {
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut blocks = Vec::with_capacity(config.hidden_layers.len());
        let mut fan_in = config.input_size;
        for (i, layer) in config.hidden_layers.iter().enumerate() {
            blocks.push(DenseBlock::new(
                LinearLayer::new(fan_in, layer.units, &mut rng),
                BatchNorm::new(layer.units),
                Dropout::new(layer.dropout, config.seed.wrapping_add(1 + i as u64)),
            ));
            fan_in = layer.units;
        }

        let rainfall_head = LinearLayer::new(fan_in, 1, &mut rng);
        let flood_head = LinearLayer::new(fan_in, 1, &mut rng);

        Ok(FloodNetwork {
            config,
            blocks,
            rainfall_head,
            flood_head,
            is_training: true,
        })
    }

    /// Reassemble a network from stored parts (used by persistence)
    pub fn from_parts(
        config: NetworkConfig,
        blocks: Vec<DenseBlock>,
        rainfall_head: LinearLayer,
        flood_head: LinearLayer,
    ) -> Result<Self> {
        config.validate()?;
        if blocks.len() != config.hidden_layers.len() {
            return Err(FloodSightError::ShapeMismatch {
                context: "hidden layer count",
                expected: config.hidden_layers.len(),
                actual: blocks.len(),
            });
        }
        let mut fan_in = config.input_size;
        for (block, layer) in blocks.iter().zip(config.hidden_layers.iter()) {
            if block.linear.input_size != fan_in {
                return Err(FloodSightError::ShapeMismatch {
                    context: "hidden layer input",
                    expected: fan_in,
                    actual: block.linear.input_size,
                });
            }
            if block.linear.output_size != layer.units || block.norm.num_features != layer.units {
                return Err(FloodSightError::ShapeMismatch {
                    context: "hidden layer units",
                    expected: layer.units,
                    actual: block.linear.output_size,
                });
            }
            fan_in = layer.units;
        }
        for head in [&rainfall_head, &flood_head] {
            if head.dimensions() != (fan_in, 1) {
                return Err(FloodSightError::ShapeMismatch {
                    context: "output head input",
                    expected: fan_in,
                    actual: head.input_size,
                });
            }
        }

        let mut network = FloodNetwork {
            config,
            blocks,
            rainfall_head,
            flood_head,
            is_training: false,
        };
        network.eval();
        Ok(network)
    }

    pub fn input_size(&self) -> usize {
        self.config.input_size
    }

    /// Training-mode forward pass; caches activations for `backward`
    pub fn forward_train(&mut self, input: &Array2<f64>) -> HeadOutputs {
        let mut hidden = input.clone();
        for block in &mut self.blocks {
            hidden = block.forward(&hidden);
        }

        HeadOutputs {
            rainfall: self.rainfall_head.forward(&hidden),
            flood: self.flood_head.forward(&hidden),
        }
    }

    /// Evaluation-mode forward pass. Pure: no caches, no dropout, running
    /// batch-norm statistics.
    pub fn predict(&self, input: &Array2<f64>) -> HeadOutputs {
        let mut hidden = input.clone();
        for block in &self.blocks {
            hidden = block.apply(&hidden);
        }

        HeadOutputs {
            rainfall: self.rainfall_head.apply(&hidden),
            flood: self.flood_head.apply(&hidden),
        }
    }

    /// Backpropagate head gradients of shape (1, batch) through the network
    pub fn backward(&self, d_rainfall: &Array2<f64>, d_flood: &Array2<f64>) -> NetworkGradients {
        let (rainfall_grads, grad_r) = self.rainfall_head.backward(d_rainfall);
        let (flood_grads, grad_f) = self.flood_head.backward(d_flood);

        let mut grad = grad_r + grad_f;
        let mut block_grads = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.iter().rev() {
            let (grads, grad_input) = block.backward(&grad);
            block_grads.push(grads);
            grad = grad_input;
        }
        block_grads.reverse();

        NetworkGradients {
            blocks: block_grads,
            rainfall_head: rainfall_grads,
            flood_head: flood_grads,
        }
    }

    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &NetworkGradients, optimizer: &mut O) {
        for (i, (block, grads)) in self.blocks.iter_mut().zip(gradients.blocks.iter()).enumerate() {
            block.linear.update_parameters(&grads.linear, optimizer, &format!("dense{}", i));
            block.norm.update_parameters(&grads.norm, optimizer, &format!("batch_norm{}", i));
        }
        self.rainfall_head.update_parameters(&gradients.rainfall_head, optimizer, "rainfall_output");
        self.flood_head.update_parameters(&gradients.flood_head, optimizer, "flood_output");
    }

    pub fn num_parameters(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.linear.num_parameters() + b.norm.num_parameters())
            .sum::<usize>()
            + self.rainfall_head.num_parameters()
            + self.flood_head.num_parameters()
    }

    pub fn train(&mut self) {
        self.is_training = true;
        for block in &mut self.blocks {
            block.set_training(true);
        }
    }

    pub fn eval(&mut self) {
        self.is_training = false;
        for block in &mut self.blocks {
            block.set_training(false);
        }
        self.rainfall_head.clear_cache();
        self.flood_head.clear_cache();
    }
}
