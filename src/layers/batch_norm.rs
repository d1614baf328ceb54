use ndarray::{Array2, Axis};

use crate::optimizers::Optimizer;

/// Gradients of the learnable batch-norm parameters
#[derive(Clone, Debug)]
pub struct BatchNormGradients {
    pub gamma: Array2<f64>,
    pub beta: Array2<f64>,
}

impl BatchNormGradients {
    pub fn squared_norm(&self) -> f64 {
        self.gamma.iter().chain(self.beta.iter()).map(|g| g * g).sum()
    }

    pub fn scale(&mut self, factor: f64) {
        self.gamma.mapv_inplace(|g| g * factor);
        self.beta.mapv_inplace(|g| g * factor);
    }
}

/// Batch normalization over the batch axis of a (features, batch) input
///
/// Training mode normalizes with the batch statistics and folds them into the
/// running estimates: `running = momentum * running + (1 - momentum) * batch`.
/// Evaluation mode uses the running estimates only, so inference is a pure
/// function of the stored parameters.
#[derive(Clone, Debug)]
pub struct BatchNorm {
    pub gamma: Array2<f64>,        // (num_features, 1)
    pub beta: Array2<f64>,         // (num_features, 1)
    pub running_mean: Array2<f64>, // (num_features, 1)
    pub running_var: Array2<f64>,  // (num_features, 1)
    pub momentum: f64,
    pub epsilon: f64,
    pub num_features: usize,
    pub is_training: bool,
    cache: Option<BatchNormCache>,
}

#[derive(Clone, Debug)]
struct BatchNormCache {
    x_hat: Array2<f64>,
    inv_std: Array2<f64>,
}

impl BatchNorm {
    pub fn new(num_features: usize) -> Self {
        Self::with_params(num_features, 0.99, 1e-3)
    }

    pub fn with_params(num_features: usize, momentum: f64, epsilon: f64) -> Self {
        BatchNorm {
            gamma: Array2::ones((num_features, 1)),
            beta: Array2::zeros((num_features, 1)),
            running_mean: Array2::zeros((num_features, 1)),
            running_var: Array2::ones((num_features, 1)),
            momentum,
            epsilon,
            num_features,
            is_training: true,
            cache: None,
        }
    }

    pub fn train(&mut self) {
        self.is_training = true;
    }

    pub fn eval(&mut self) {
        self.is_training = false;
        self.cache = None;
    }

    /// Forward pass; in training mode caches what `backward` needs
    pub fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        assert_eq!(input.nrows(), self.num_features,
                   "BatchNorm expects {} features, got {}", self.num_features, input.nrows());

        if !self.is_training {
            return self.apply(input);
        }

        let batch = input.ncols() as f64;
        let mean = input.sum_axis(Axis(1)).insert_axis(Axis(1)) / batch;
        let centered = input - &mean;
        let var = centered.mapv(|x| x * x).sum_axis(Axis(1)).insert_axis(Axis(1)) / batch;

        self.running_mean = self.momentum * &self.running_mean + (1.0 - self.momentum) * &mean;
        self.running_var = self.momentum * &self.running_var + (1.0 - self.momentum) * &var;

        let inv_std = var.mapv(|v| 1.0 / (v + self.epsilon).sqrt());
        let x_hat = &centered * &inv_std;
        let output = &x_hat * &self.gamma + &self.beta;

        self.cache = Some(BatchNormCache { x_hat, inv_std });
        output
    }

    /// Normalize with the running statistics
    pub fn apply(&self, input: &Array2<f64>) -> Array2<f64> {
        let inv_std = self.running_var.mapv(|v| 1.0 / (v + self.epsilon).sqrt());
        (input - &self.running_mean) * &inv_std * &self.gamma + &self.beta
    }

    pub fn backward(&self, grad_output: &Array2<f64>) -> (BatchNormGradients, Array2<f64>) {
        let cache = self.cache.as_ref().expect("BatchNorm cache not found for backward pass");
        let batch = grad_output.ncols() as f64;

        let gradients = BatchNormGradients {
            gamma: (grad_output * &cache.x_hat).sum_axis(Axis(1)).insert_axis(Axis(1)),
            beta: grad_output.sum_axis(Axis(1)).insert_axis(Axis(1)),
        };

        // dx = inv_std / N * (N * dx_hat - sum(dx_hat) - x_hat * sum(dx_hat * x_hat))
        let dx_hat = grad_output * &self.gamma;
        let sum_dx_hat = dx_hat.sum_axis(Axis(1)).insert_axis(Axis(1));
        let sum_dx_hat_x_hat = (&dx_hat * &cache.x_hat).sum_axis(Axis(1)).insert_axis(Axis(1));
        let input_grad = (batch * &dx_hat - &sum_dx_hat - &cache.x_hat * &sum_dx_hat_x_hat)
            * &cache.inv_std
            / batch;

        (gradients, input_grad)
    }

    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &BatchNormGradients, optimizer: &mut O, prefix: &str) {
        optimizer.update(&format!("{}_gamma", prefix), &mut self.gamma, &gradients.gamma);
        optimizer.update(&format!("{}_beta", prefix), &mut self.beta, &gradients.beta);
    }

    /// Learnable parameters only; running statistics are not trained
    pub fn num_parameters(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn test_training_output_is_normalized() {
        let mut bn = BatchNorm::with_params(2, 0.9, 1e-8);
        let input = arr2(&[[1.0, 2.0, 3.0, 4.0], [10.0, 10.0, 30.0, 30.0]]);

        let output = bn.forward(&input);
        for row in output.rows() {
            assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-9);
            let var = row.mapv(|x| x * x).sum() / 4.0;
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_running_statistics_update() {
        let mut bn = BatchNorm::with_params(1, 0.5, 1e-3);
        bn.forward(&arr2(&[[2.0, 4.0]]));

        // mean 3, var 1
        assert_abs_diff_eq!(bn.running_mean[[0, 0]], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(bn.running_var[[0, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_eval_uses_running_statistics() {
        let mut bn = BatchNorm::new(1);
        bn.running_mean = arr2(&[[5.0]]);
        bn.running_var = arr2(&[[4.0 - 1e-3]]);
        bn.eval();

        let output = bn.forward(&arr2(&[[7.0, 5.0]]));
        assert_abs_diff_eq!(output[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(output[[0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let input = arr2(&[[0.3, -1.2, 2.0], [1.0, 0.5, -0.7]]);
        let upstream = arr2(&[[1.0, -2.0, 0.5], [0.3, 0.1, -1.0]]);
        let loss = |x: &Array2<f64>| {
            let mut bn = BatchNorm::with_params(2, 0.99, 1e-5);
            bn.gamma = arr2(&[[1.5], [0.7]]);
            (bn.forward(x) * &upstream).sum()
        };

        let mut bn = BatchNorm::with_params(2, 0.99, 1e-5);
        bn.gamma = arr2(&[[1.5], [0.7]]);
        bn.forward(&input);
        let (_, grad) = bn.backward(&upstream);

        let h = 1e-6;
        for i in 0..2 {
            for j in 0..3 {
                let mut plus = input.clone();
                plus[[i, j]] += h;
                let mut minus = input.clone();
                minus[[i, j]] -= h;
                let numeric = (loss(&plus) - loss(&minus)) / (2.0 * h);
                assert_abs_diff_eq!(grad[[i, j]], numeric, epsilon = 1e-5);
            }
        }
    }
}
