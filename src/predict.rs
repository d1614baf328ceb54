//! Inference over loaded artifacts.
//!
//! An [`InferenceContext`] owns the trained network and both scalers. It is
//! built once (from disk or from in-memory parts) and then only read, so the
//! same context can serve any number of predictions.

use std::collections::HashMap;

use log::{debug, info};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{FloodSightError, Result};
use crate::features::{FeatureVector, NUM_FEATURES, NUM_TARGETS};
use crate::models::flood_network::FloodNetwork;
use crate::persistence::{ArtifactPaths, ModelMetadata, ModelPersistence, PersistentModel};
use crate::scaler::StandardScaler;

/// Predicted values in original units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub rainfall_mm: f64,
    pub flood_risk_pct: f64,
}

/// Trained network plus the scalers it was trained with
#[derive(Clone)]
pub struct InferenceContext {
    network: FloodNetwork,
    scaler_x: StandardScaler,
    scaler_y: StandardScaler,
    metadata: Option<ModelMetadata>,
}

impl InferenceContext {
    /// Assemble a context from in-memory parts, checking that widths line up
    pub fn new(mut network: FloodNetwork, scaler_x: StandardScaler, scaler_y: StandardScaler) -> Result<Self> {
        if network.input_size() != NUM_FEATURES {
            return Err(FloodSightError::ShapeMismatch {
                context: "network input",
                expected: NUM_FEATURES,
                actual: network.input_size(),
            });
        }
        if scaler_x.n_features() != NUM_FEATURES {
            return Err(FloodSightError::ShapeMismatch {
                context: "input scaler",
                expected: NUM_FEATURES,
                actual: scaler_x.n_features(),
            });
        }
        if scaler_y.n_features() != NUM_TARGETS {
            return Err(FloodSightError::ShapeMismatch {
                context: "output scaler",
                expected: NUM_TARGETS,
                actual: scaler_y.n_features(),
            });
        }
        network.eval();

        Ok(InferenceContext {
            network,
            scaler_x,
            scaler_y,
            metadata: None,
        })
    }

    /// Load the model and both scalers. Every file is checked up front so a
    /// missing artifact is reported by name before anything is parsed.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let required = [
            ("model", &paths.model),
            ("input scaler", &paths.scaler_x),
            ("output scaler", &paths.scaler_y),
        ];
        for (artifact, path) in required {
            if !path.is_file() {
                return Err(FloodSightError::ArtifactMissing {
                    artifact,
                    path: path.clone(),
                });
            }
        }

        let (network, metadata) = FloodNetwork::load(&paths.model)?;
        let scaler_x = ModelPersistence::load_scaler(&paths.scaler_x)?;
        let scaler_y = ModelPersistence::load_scaler(&paths.scaler_y)?;

        info!(
            "Loaded model '{}' (v{}, created {}) from {}",
            metadata.model_name,
            metadata.version,
            metadata.created_at,
            paths.model.display()
        );

        let mut context = Self::new(network, scaler_x, scaler_y)?;
        context.metadata = Some(metadata);
        Ok(context)
    }

    pub fn network(&self) -> &FloodNetwork {
        &self.network
    }

    pub fn scaler_x(&self) -> &StandardScaler {
        &self.scaler_x
    }

    pub fn scaler_y(&self) -> &StandardScaler {
        &self.scaler_y
    }

    /// Metadata stored alongside the model, when loaded from disk
    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    /// Predict from a name → value mapping. Keys are re-ordered through the
    /// fixed feature list; extra keys are ignored.
    pub fn predict(&self, input: &HashMap<String, f64>) -> Result<Prediction> {
        let features = FeatureVector::from_map(input)?;
        self.predict_vector(&features)
    }

    pub fn predict_vector(&self, features: &FeatureVector) -> Result<Prediction> {
        let row = Array2::from_shape_vec((1, NUM_FEATURES), features.values().to_vec())
            .map_err(|e| FloodSightError::PredictionFailed(e.to_string()))?;
        let scaled = self.scaler_x.transform(&row)?;

        // Network works on (features, batch) columns
        let outputs = self.network.predict(&scaled.reversed_axes());
        let combined = outputs.stacked().reversed_axes();
        let unscaled = self.scaler_y.inverse_transform(&combined)?;
        debug!("Scaled outputs {:?} -> {:?}", combined, unscaled);

        let prediction = Prediction {
            rainfall_mm: unscaled[[0, 0]],
            flood_risk_pct: unscaled[[0, 1]],
        };
        if !prediction.rainfall_mm.is_finite() || !prediction.flood_risk_pct.is_finite() {
            return Err(FloodSightError::PredictionFailed(format!(
                "non-finite output ({}, {})",
                prediction.rainfall_mm, prediction.flood_risk_pct
            )));
        }
        Ok(prediction)
    }
}

/// Predict through an optional context; `ModelNotLoaded` when none is loaded
pub fn predict_with(context: Option<&InferenceContext>, input: &HashMap<String, f64>) -> Result<Prediction> {
    context.ok_or(FloodSightError::ModelNotLoaded)?.predict(input)
}
