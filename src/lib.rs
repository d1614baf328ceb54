//! # FloodSight
//!
//! Rainfall and flood-risk prediction from 14 environmental readings.
//!
//! ## Core Components
//!
//! - **Features**: the fixed, ordered list of input columns and feature vectors
//! - **Scalers**: per-column standardization for inputs and targets
//! - **Network**: a dense trunk with batch normalization and dropout feeding
//!   two linear heads (rainfall in mm, flood risk in percent)
//! - **Training**: mini-batch Adam with early stopping and best-weight restore
//! - **Persistence**: model and scaler artifacts in JSON or binary form
//! - **Inference**: an owned [`InferenceContext`] that turns feature maps into predictions
//! - **Session**: append-only run history, risk banners and a dual-axis chart
//!
//! ## Quick Start
//!
//! ```no_run
//! use floodsight::{train_pipeline, ArtifactPaths, FeatureVector, InferenceContext, PipelineConfig};
//!
//! # fn main() -> floodsight::Result<()> {
//! // Train and write flood_model.json, scaler_x.json and scaler_y.json
//! let report = train_pipeline("data/flood.csv", "saved_model", &PipelineConfig::default())?;
//! println!("stopped after {} epochs", report.epochs_run);
//!
//! // Load the artifacts once and predict as often as needed
//! let context = InferenceContext::load(&ArtifactPaths::in_dir("saved_model"))?;
//! let prediction = context.predict(&FeatureVector::sample().to_map())?;
//! println!("{:.2} mm, {:.2}%", prediction.rainfall_mm, prediction.flood_risk_pct);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod features;
pub mod scaler;
pub mod dataset;
pub mod utils;
pub mod layers;
pub mod models;
pub mod loss;
pub mod optimizers;
pub mod training;
pub mod persistence;
pub mod pipeline;
pub mod predict;
pub mod session;
pub mod chart;

// Re-export commonly used items
pub use error::{DatasetError, FloodSightError, Result};
pub use features::{FeatureVector, FEATURE_COLS, NUM_FEATURES, NUM_TARGETS, TARGET_COLS};
pub use scaler::StandardScaler;
pub use dataset::Dataset;
pub use models::flood_network::{FloodNetwork, NetworkConfig};
pub use training::{create_adam_trainer, EarlyStoppingConfig, FloodTrainer, TrainingConfig};
pub use optimizers::{Adam, SGD};
pub use loss::{MAELoss, MSELoss};
pub use persistence::{ArtifactPaths, ModelMetadata, ModelPersistence, PersistenceError, PersistentModel};
pub use pipeline::{train_pipeline, PipelineConfig, TrainingReport};
pub use predict::{predict_with, InferenceContext, Prediction};
pub use session::{History, HistoryRecord, RiskLevel, Session, SessionState};
pub use chart::render_history_chart;
