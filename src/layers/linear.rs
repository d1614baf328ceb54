use ndarray::{Array2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::optimizers::Optimizer;

/// Holds gradients for linear layer parameters during backpropagation
#[derive(Clone, Debug)]
pub struct LinearGradients {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

impl LinearGradients {
    /// Squared L2 norm of all gradient entries
    pub fn squared_norm(&self) -> f64 {
        self.weight.iter().chain(self.bias.iter()).map(|g| g * g).sum()
    }

    pub fn scale(&mut self, factor: f64) {
        self.weight.mapv_inplace(|g| g * factor);
        self.bias.mapv_inplace(|g| g * factor);
    }
}

/// A fully connected (dense) layer
///
/// Performs the transformation: output = weight * input + bias
/// where weight has shape (output_size, input_size) and bias has shape (output_size, 1).
/// Inputs are column-major batches of shape (input_size, batch_size).
#[derive(Clone, Debug)]
pub struct LinearLayer {
    pub weight: Array2<f64>, // (output_size, input_size)
    pub bias: Array2<f64>,   // (output_size, 1)
    pub input_size: usize,
    pub output_size: usize,
    input_cache: Option<Array2<f64>>,
}

impl LinearLayer {
    /// Create a layer with Glorot-uniform weights drawn from `rng`
    ///
    /// Weights are sampled from U(-limit, limit) with
    /// limit = sqrt(6 / (input_size + output_size)); bias starts at zero.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        let weight = Array2::random_using((output_size, input_size), Uniform::new(-limit, limit), rng);
        let bias = Array2::zeros((output_size, 1));

        Self::from_weights(weight, bias)
    }

    /// Create a new linear layer with zero initialization
    pub fn new_zeros(input_size: usize, output_size: usize) -> Self {
        Self::from_weights(
            Array2::zeros((output_size, input_size)),
            Array2::zeros((output_size, 1)),
        )
    }

    /// Create a layer from existing parameters
    pub fn from_weights(weight: Array2<f64>, bias: Array2<f64>) -> Self {
        let (output_size, input_size) = weight.dim();
        assert_eq!(bias.shape(), &[output_size, 1], "Bias shape must be (output_size, 1)");

        Self {
            weight,
            bias,
            input_size,
            output_size,
            input_cache: None,
        }
    }

    /// Forward pass that caches the input for `backward`
    pub fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        self.input_cache = Some(input.clone());
        self.apply(input)
    }

    /// Forward pass without touching the cache
    pub fn apply(&self, input: &Array2<f64>) -> Array2<f64> {
        let (input_features, _batch_size) = input.dim();
        assert_eq!(input_features, self.input_size,
                   "Input size {} doesn't match layer input size {}",
                   input_features, self.input_size);

        &self.weight.dot(input) + &self.bias
    }

    /// Backward pass through the linear layer
    ///
    /// Returns the parameter gradients and the gradient w.r.t. the input.
    pub fn backward(&self, grad_output: &Array2<f64>) -> (LinearGradients, Array2<f64>) {
        let input = self.input_cache.as_ref().expect("Input cache not found for backward pass");
        assert_eq!(grad_output.nrows(), self.output_size, "Gradient output size mismatch");
        assert_eq!(grad_output.ncols(), input.ncols(), "Batch size mismatch");

        let gradients = LinearGradients {
            weight: grad_output.dot(&input.t()),
            bias: grad_output.sum_axis(Axis(1)).insert_axis(Axis(1)),
        };
        let input_grad = self.weight.t().dot(grad_output);

        (gradients, input_grad)
    }

    /// Update parameters using the provided optimizer
    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &LinearGradients, optimizer: &mut O, prefix: &str) {
        optimizer.update(&format!("{}_weight", prefix), &mut self.weight, &gradients.weight);
        optimizer.update(&format!("{}_bias", prefix), &mut self.bias, &gradients.bias);
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.input_size, self.output_size)
    }

    pub fn clear_cache(&mut self) {
        self.input_cache = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizers::SGD;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_layer_creation() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = LinearLayer::new(14, 128, &mut rng);
        assert_eq!(layer.weight.shape(), &[128, 14]);
        assert_eq!(layer.bias.shape(), &[128, 1]);

        let limit = (6.0 / 142.0_f64).sqrt();
        assert!(layer.weight.iter().all(|w| w.abs() <= limit));
    }

    #[test]
    fn test_seeded_initialization_is_reproducible() {
        let a = LinearLayer::new(4, 3, &mut StdRng::seed_from_u64(7));
        let b = LinearLayer::new(4, 3, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.weight, b.weight);
    }

    #[test]
    fn test_linear_layer_forward() {
        let layer = LinearLayer::from_weights(arr2(&[[1.0, 2.0, 3.0]]), arr2(&[[0.5]]));
        let input = arr2(&[[1.0, 0.0], [1.0, 1.0], [1.0, 2.0]]); // (3, 2)

        let output = layer.apply(&input);
        assert_eq!(output, arr2(&[[6.5, 8.5]]));
    }

    #[test]
    fn test_linear_layer_backward() {
        let mut layer = LinearLayer::new(3, 2, &mut StdRng::seed_from_u64(1));
        let input = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let grad_output = arr2(&[[1.0, 1.0], [1.0, 1.0]]);

        layer.forward(&input);
        let (gradients, input_grad) = layer.backward(&grad_output);

        assert_eq!(gradients.weight.shape(), &[2, 3]);
        assert_eq!(gradients.bias, arr2(&[[2.0], [2.0]]));
        assert_eq!(input_grad.shape(), &[3, 2]);
    }

    #[test]
    fn test_linear_layer_with_optimizer() {
        let mut layer = LinearLayer::new_zeros(2, 1);
        let mut optimizer = SGD::new(0.1);

        let input = arr2(&[[1.0], [2.0]]);
        let target = arr2(&[[3.0]]);

        let output = layer.forward(&input);
        let (gradients, _) = layer.backward(&(&output - &target));
        layer.update_parameters(&gradients, &mut optimizer, "linear");

        assert_abs_diff_eq!(layer.weight[[0, 0]], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.weight[[0, 1]], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.bias[[0, 0]], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_num_parameters() {
        let layer = LinearLayer::new_zeros(128, 64);
        assert_eq!(layer.dimensions(), (128, 64));
        assert_eq!(layer.num_parameters(), 128 * 64 + 64);
    }
}
