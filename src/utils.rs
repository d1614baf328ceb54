//! Activation helpers shared by the network layers.

use ndarray::Array2;

/// Rectified linear unit: max(0, x)
pub fn relu(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| v.max(0.0))
}

/// Derivative of ReLU evaluated at the pre-activation `x`
pub fn relu_derivative(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_relu() {
        let x = arr2(&[[-1.0, 0.0], [0.5, 3.0]]);
        assert_eq!(relu(&x), arr2(&[[0.0, 0.0], [0.5, 3.0]]));
    }

    #[test]
    fn test_relu_derivative() {
        let x = arr2(&[[-1.0, 0.0], [0.5, 3.0]]);
        assert_eq!(relu_derivative(&x), arr2(&[[0.0, 0.0], [1.0, 1.0]]));
    }
}
