use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{FEATURE_COLS, TARGET_COLS};
use crate::layers::batch_norm::BatchNorm;
use crate::layers::dropout::Dropout;
use crate::layers::linear::LinearLayer;
use crate::models::flood_network::{DenseBlock, FloodNetwork, NetworkConfig};
use crate::scaler::StandardScaler;

/// File name of the serialized network inside an artifact directory
pub const MODEL_FILE: &str = "flood_model.json";
/// File name of the input (feature) scaler
pub const SCALER_X_FILE: &str = "scaler_x.json";
/// File name of the output (target) scaler
pub const SCALER_Y_FILE: &str = "scaler_y.json";

/// Errors that can occur during model persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The file decoded but does not describe a usable model
    #[error("Invalid model data: {0}")]
    InvalidModel(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        PersistenceError::SerializationError(error.to_string())
    }
}

impl From<bincode::Error> for PersistenceError {
    fn from(error: bincode::Error) -> Self {
        PersistenceError::SerializationError(error.to_string())
    }
}

/// Serializable version of Array2<f64> for persistence
#[derive(Serialize, Deserialize)]
struct SerializableArray2 {
    data: Vec<f64>,
    shape: (usize, usize),
}

impl From<&Array2<f64>> for SerializableArray2 {
    fn from(array: &Array2<f64>) -> Self {
        Self {
            data: array.iter().cloned().collect(),
            shape: array.dim(),
        }
    }
}

impl TryFrom<SerializableArray2> for Array2<f64> {
    type Error = PersistenceError;

    fn try_from(value: SerializableArray2) -> Result<Self, Self::Error> {
        Array2::from_shape_vec(value.shape, value.data)
            .map_err(|e| PersistenceError::InvalidModel(format!("bad array shape: {}", e)))
    }
}

/// Serializable dense layer parameters
#[derive(Serialize, Deserialize)]
struct SerializableLinear {
    weight: SerializableArray2,
    bias: SerializableArray2,
}

impl From<&LinearLayer> for SerializableLinear {
    fn from(layer: &LinearLayer) -> Self {
        Self {
            weight: (&layer.weight).into(),
            bias: (&layer.bias).into(),
        }
    }
}

impl TryFrom<SerializableLinear> for LinearLayer {
    type Error = PersistenceError;

    fn try_from(value: SerializableLinear) -> Result<Self, Self::Error> {
        let weight = Array2::try_from(value.weight)?;
        let bias = Array2::try_from(value.bias)?;
        if bias.dim() != (weight.nrows(), 1) {
            return Err(PersistenceError::InvalidModel(format!(
                "bias shape {:?} does not match weight rows {}",
                bias.dim(),
                weight.nrows()
            )));
        }
        Ok(LinearLayer::from_weights(weight, bias))
    }
}

/// Serializable batch normalization parameters and running statistics
#[derive(Serialize, Deserialize)]
struct SerializableBatchNorm {
    gamma: SerializableArray2,
    beta: SerializableArray2,
    running_mean: SerializableArray2,
    running_var: SerializableArray2,
    momentum: f64,
    epsilon: f64,
}

impl From<&BatchNorm> for SerializableBatchNorm {
    fn from(norm: &BatchNorm) -> Self {
        Self {
            gamma: (&norm.gamma).into(),
            beta: (&norm.beta).into(),
            running_mean: (&norm.running_mean).into(),
            running_var: (&norm.running_var).into(),
            momentum: norm.momentum,
            epsilon: norm.epsilon,
        }
    }
}

impl TryFrom<SerializableBatchNorm> for BatchNorm {
    type Error = PersistenceError;

    fn try_from(value: SerializableBatchNorm) -> Result<Self, Self::Error> {
        let gamma = Array2::try_from(value.gamma)?;
        let num_features = gamma.nrows();
        let mut norm = BatchNorm::with_params(num_features, value.momentum, value.epsilon);

        let parts = [
            Array2::try_from(value.beta)?,
            Array2::try_from(value.running_mean)?,
            Array2::try_from(value.running_var)?,
        ];
        if gamma.dim() != (num_features, 1) || parts.iter().any(|p| p.dim() != (num_features, 1)) {
            return Err(PersistenceError::InvalidModel(
                "batch norm parameters must all be (num_features, 1)".to_string(),
            ));
        }
        let [beta, running_mean, running_var] = parts;

        norm.gamma = gamma;
        norm.beta = beta;
        norm.running_mean = running_mean;
        norm.running_var = running_var;
        norm.eval();
        Ok(norm)
    }
}

#[derive(Serialize, Deserialize)]
struct SerializableDenseBlock {
    linear: SerializableLinear,
    norm: SerializableBatchNorm,
}

/// Serializable two-head network
#[derive(Serialize, Deserialize)]
pub struct SerializableFloodNetwork {
    config: NetworkConfig,
    blocks: Vec<SerializableDenseBlock>,
    rainfall_head: SerializableLinear,
    flood_head: SerializableLinear,
}

impl From<&FloodNetwork> for SerializableFloodNetwork {
    fn from(network: &FloodNetwork) -> Self {
        Self {
            config: network.config.clone(),
            blocks: network
                .blocks
                .iter()
                .map(|block| SerializableDenseBlock {
                    linear: (&block.linear).into(),
                    norm: (&block.norm).into(),
                })
                .collect(),
            rainfall_head: (&network.rainfall_head).into(),
            flood_head: (&network.flood_head).into(),
        }
    }
}

impl TryFrom<SerializableFloodNetwork> for FloodNetwork {
    type Error = PersistenceError;

    fn try_from(value: SerializableFloodNetwork) -> Result<Self, Self::Error> {
        let config = value.config;
        config
            .validate()
            .map_err(|e| PersistenceError::InvalidModel(e.to_string()))?;
        if value.blocks.len() != config.hidden_layers.len() {
            return Err(PersistenceError::InvalidModel(format!(
                "{} stored blocks for {} configured hidden layers",
                value.blocks.len(),
                config.hidden_layers.len()
            )));
        }
        let mut blocks = Vec::with_capacity(value.blocks.len());
        for (i, (block, layer)) in value.blocks.into_iter().zip(config.hidden_layers.iter()).enumerate() {
            blocks.push(DenseBlock::new(
                LinearLayer::try_from(block.linear)?,
                BatchNorm::try_from(block.norm)?,
                Dropout::new(layer.dropout, config.seed.wrapping_add(1 + i as u64)),
            ));
        }

        FloodNetwork::from_parts(
            config,
            blocks,
            LinearLayer::try_from(value.rainfall_head)?,
            LinearLayer::try_from(value.flood_head)?,
        )
        .map_err(|e| PersistenceError::InvalidModel(e.to_string()))
    }
}

/// Model metadata for tracking training information
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelMetadata {
    pub model_name: String,
    pub version: String,
    pub created_at: String,
    pub feature_names: Vec<String>,
    pub target_names: Vec<String>,
    pub total_epochs: usize,
    pub best_epoch: Option<usize>,
    pub final_loss: Option<f64>,
    pub description: Option<String>,
}

impl ModelMetadata {
    pub fn new(model_name: impl Into<String>, total_epochs: usize, best_epoch: Option<usize>, final_loss: Option<f64>) -> Self {
        ModelMetadata {
            model_name: model_name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            feature_names: FEATURE_COLS.iter().map(|s| s.to_string()).collect(),
            target_names: TARGET_COLS.iter().map(|s| s.to_string()).collect(),
            total_epochs,
            best_epoch,
            final_loss,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Complete saved model including network and metadata
#[derive(Serialize, Deserialize)]
pub struct SavedModel {
    pub network: SerializableFloodNetwork,
    pub metadata: ModelMetadata,
}

/// Locations of the three artifacts produced by training
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler_x: PathBuf,
    pub scaler_y: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        ArtifactPaths {
            model: dir.join(MODEL_FILE),
            scaler_x: dir.join(SCALER_X_FILE),
            scaler_y: dir.join(SCALER_Y_FILE),
        }
    }
}

/// Model persistence operations
pub struct ModelPersistence;

impl ModelPersistence {
    /// Save model to JSON format (human-readable)
    pub fn save_to_json<P: AsRef<Path>>(model: &SavedModel, path: P) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(model)?;
        let mut file = create_file(path.as_ref())?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Load model from JSON format
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<SavedModel, PersistenceError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save model to binary format (compact and fast)
    pub fn save_to_binary<P: AsRef<Path>>(model: &SavedModel, path: P) -> Result<(), PersistenceError> {
        let encoded = bincode::serialize(model)?;
        let mut file = create_file(path.as_ref())?;
        file.write_all(&encoded)?;
        Ok(())
    }

    /// Load model from binary format
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<SavedModel, PersistenceError> {
        let mut file = File::open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(bincode::deserialize(&contents)?)
    }

    pub fn save_scaler<P: AsRef<Path>>(scaler: &StandardScaler, path: P) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(scaler)?;
        let mut file = create_file(path.as_ref())?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn load_scaler<P: AsRef<Path>>(path: P) -> Result<StandardScaler, PersistenceError> {
        let contents = fs::read_to_string(path)?;
        let scaler: StandardScaler = serde_json::from_str(&contents)?;
        if scaler.mean.len() != scaler.scale.len() {
            return Err(PersistenceError::InvalidModel(
                "scaler mean and scale lengths differ".to_string(),
            ));
        }
        if scaler.scale.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(PersistenceError::InvalidModel(
                "scaler contains a zero or non-finite scale".to_string(),
            ));
        }
        Ok(scaler)
    }

    /// Bundle a network with fresh metadata
    pub fn create_saved_model(network: &FloodNetwork, metadata: ModelMetadata) -> SavedModel {
        SavedModel {
            network: network.into(),
            metadata,
        }
    }
}

/// Convenience trait for easy model saving/loading
pub trait PersistentModel {
    /// Save model to file (format determined by file extension)
    fn save<P: AsRef<Path>>(&self, path: P, metadata: ModelMetadata) -> Result<(), PersistenceError>;

    /// Load model from file (format determined by file extension)
    fn load<P: AsRef<Path>>(path: P) -> Result<(Self, ModelMetadata), PersistenceError>
    where
        Self: Sized;
}

impl PersistentModel for FloodNetwork {
    fn save<P: AsRef<Path>>(&self, path: P, metadata: ModelMetadata) -> Result<(), PersistenceError> {
        let saved_model = ModelPersistence::create_saved_model(self, metadata);

        if is_binary(path.as_ref()) {
            ModelPersistence::save_to_binary(&saved_model, path)
        } else {
            ModelPersistence::save_to_json(&saved_model, path)
        }
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<(Self, ModelMetadata), PersistenceError> {
        let saved_model = if is_binary(path.as_ref()) {
            ModelPersistence::load_from_binary(path)?
        } else {
            ModelPersistence::load_from_json(path)?
        };

        let network = FloodNetwork::try_from(saved_model.network)?;
        Ok((network, saved_model.metadata))
    }
}

fn is_binary(path: &Path) -> bool {
    matches!(path.extension().and_then(|s| s.to_str()), Some("bin") | Some("model"))
}

/// Create (or truncate) a file, creating missing parent directories
fn create_file(path: &Path) -> Result<File, PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

