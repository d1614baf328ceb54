use ndarray::{arr1, Array2};
use floodsight::{
    persistence::{ModelPersistence, PersistentModel, ModelMetadata, PersistenceError},
    FloodNetwork, NetworkConfig, StandardScaler, NUM_FEATURES,
};
use tempfile::tempdir;

fn batch() -> Array2<f64> {
    Array2::from_shape_fn((NUM_FEATURES, 4), |(i, j)| (i as f64 - 6.0) * 0.3 + j as f64)
}

#[test]
fn test_model_metadata_creation() {
    let metadata = ModelMetadata::new("test_model", 12, Some(7), Some(0.05))
        .with_description("Test model for validation");

    assert_eq!(metadata.model_name, "test_model");
    assert_eq!(metadata.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(metadata.feature_names.len(), 14);
    assert_eq!(metadata.target_names, vec!["rainfall_mm", "flood_risk_pct"]);
    assert_eq!(metadata.total_epochs, 12);
    assert_eq!(metadata.best_epoch, Some(7));
    assert!(chrono::DateTime::parse_from_rfc3339(&metadata.created_at).is_ok());
}

#[test]
fn test_network_save_load_json() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("flood_model.json");

    let network = FloodNetwork::new(NetworkConfig::default()).unwrap();
    let before = network.predict(&batch());

    let metadata = ModelMetadata::new("json_model", 0, None, None);
    network.save(&file_path, metadata.clone()).unwrap();
    assert!(file_path.exists());

    let (loaded, loaded_metadata) = FloodNetwork::load(&file_path).unwrap();
    assert_eq!(loaded_metadata, metadata);
    assert_eq!(loaded.config, network.config);
    let after = loaded.predict(&batch());
    for (a, b) in after.stacked().iter().zip(before.stacked().iter()) {
        assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
    }
}

#[test]
fn test_network_save_load_binary() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("nested").join("flood_model.bin");

    let network = FloodNetwork::new(NetworkConfig::default()).unwrap();
    network
        .save(&file_path, ModelMetadata::new("binary_model", 3, Some(1), Some(0.2)))
        .unwrap();

    // Binary output is not JSON
    let bytes = std::fs::read(&file_path).unwrap();
    assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());

    let (loaded, metadata) = FloodNetwork::load(&file_path).unwrap();
    assert_eq!(metadata.model_name, "binary_model");
    assert_eq!(loaded.predict(&batch()), network.predict(&batch()));
}

#[test]
fn test_scaler_save_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scaler_y.json");
    let scaler = StandardScaler {
        mean: arr1(&[12.5, 40.0]),
        scale: arr1(&[3.0, 18.5]),
        n_samples: 200,
    };

    ModelPersistence::save_scaler(&scaler, &path).unwrap();
    let loaded = ModelPersistence::load_scaler(&path).unwrap();

    assert_eq!(loaded, scaler);
}

#[test]
fn test_scaler_with_zero_scale_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scaler_x.json");
    std::fs::write(&path, r#"{"mean":{"v":1,"dim":[2],"data":[0.0,0.0]},"scale":{"v":1,"dim":[2],"data":[1.0,0.0]},"n_samples":3}"#).unwrap();

    assert!(matches!(
        ModelPersistence::load_scaler(&path),
        Err(PersistenceError::InvalidModel(_))
    ));
}

#[test]
fn test_corrupt_model_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flood_model.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        FloodNetwork::load(&path),
        Err(PersistenceError::SerializationError(_))
    ));
}

#[test]
fn test_load_nonexistent_file() {
    let result = ModelPersistence::load_from_json("definitely/not/here.json");
    assert!(matches!(result, Err(PersistenceError::IoError(_))));
}
