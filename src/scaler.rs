use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{FloodSightError, Result};

/// Per-column standardization: `z = (x - mean) / scale`.
///
/// Fitted once on a training matrix (rows are samples) and read-only after
/// that. `scale` is the population standard deviation; constant columns get a
/// scale of 1.0 so they pass through centered rather than dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
    pub n_samples: usize,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Result<Self> {
        let n_samples = data.nrows();
        let mean = data.mean_axis(Axis(0)).ok_or(FloodSightError::EmptyFit)?;
        if data.ncols() == 0 {
            return Err(FloodSightError::EmptyFit);
        }
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });

        Ok(Self {
            mean,
            scale,
            n_samples,
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(data)?;
        Ok((data - &self.mean) / &self.scale)
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(data)?;
        Ok(data * &self.scale + &self.mean)
    }

    pub fn fit_transform(data: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(data)?;
        let transformed = scaler.transform(data)?;
        Ok((scaler, transformed))
    }

    fn check_width(&self, data: &Array2<f64>) -> Result<()> {
        if data.ncols() != self.n_features() {
            return Err(FloodSightError::ShapeMismatch {
                context: "scaler columns",
                expected: self.n_features(),
                actual: data.ncols(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn test_fit_population_statistics() {
        let data = arr2(&[[1.0, 10.0], [3.0, 10.0]]);
        let scaler = StandardScaler::fit(&data).unwrap();

        assert_eq!(scaler.mean.to_vec(), vec![2.0, 10.0]);
        assert_abs_diff_eq!(scaler.scale[0], 1.0, epsilon = 1e-12);
        // Constant column falls back to unit scale
        assert_eq!(scaler.scale[1], 1.0);
        assert_eq!(scaler.n_samples, 2);
    }

    #[test]
    fn test_transform_inverse() {
        let data = arr2(&[[1.0, 200.0], [4.0, 150.0], [7.0, 100.0]]);
        let (scaler, scaled) = StandardScaler::fit_transform(&data).unwrap();

        let col_mean = scaled.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(col_mean[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(col_mean[1], 0.0, epsilon = 1e-12);

        let restored = scaler.inverse_transform(&scaled).unwrap();
        for (a, b) in restored.iter().zip(data.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_width_mismatch() {
        let scaler = StandardScaler::fit(&arr2(&[[1.0, 2.0], [3.0, 4.0]])).unwrap();
        let result = scaler.transform(&arr2(&[[1.0, 2.0, 3.0]]));
        assert!(matches!(
            result,
            Err(FloodSightError::ShapeMismatch { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn test_empty_fit() {
        let data = Array2::<f64>::zeros((0, 3));
        assert!(matches!(StandardScaler::fit(&data), Err(FloodSightError::EmptyFit)));
    }
}
