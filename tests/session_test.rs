use floodsight::{
    FeatureVector, FloodNetwork, FloodSightError, InferenceContext, NetworkConfig, RiskLevel, Session, SessionState,
    StandardScaler, NUM_FEATURES,
};
use ndarray::{arr1, Array1};
use tempfile::tempdir;

fn context() -> InferenceContext {
    let scaler_x = StandardScaler {
        mean: Array1::from_elem(NUM_FEATURES, 10.0),
        scale: Array1::from_elem(NUM_FEATURES, 5.0),
        n_samples: 100,
    };
    let scaler_y = StandardScaler {
        mean: arr1(&[15.0, 50.0]),
        scale: arr1(&[5.0, 25.0]),
        n_samples: 100,
    };
    InferenceContext::new(FloodNetwork::new(NetworkConfig::default()).unwrap(), scaler_x, scaler_y).unwrap()
}

fn reading(offset: f64) -> std::collections::HashMap<String, f64> {
    let mut input = FeatureVector::sample().to_map();
    for value in input.values_mut() {
        *value += offset;
    }
    input
}

#[test]
fn test_history_grows_with_each_success() {
    let mut session = Session::new(context());
    assert_eq!(session.state(), SessionState::Idle);

    for n in 1..=4 {
        let outcome = session.submit(&reading(n as f64)).unwrap();
        assert_eq!(outcome.run, n);
        assert_eq!(outcome.risk, RiskLevel::classify(outcome.prediction.flood_risk_pct));
        assert_eq!(session.state(), SessionState::DisplayingResult);
    }

    let runs: Vec<usize> = session.history().records().iter().map(|r| r.run).collect();
    assert_eq!(runs, vec![1, 2, 3, 4]);
    assert_eq!(session.history().to_string().lines().count(), 5);
}

#[test]
fn test_failure_leaves_history_untouched() {
    let mut session = Session::new(context());
    session.submit(&reading(0.0)).unwrap();
    let before = session.history().clone();

    let mut incomplete = reading(0.0);
    incomplete.remove("soil_moisture");
    let result = session.submit(&incomplete);

    assert!(matches!(result, Err(FloodSightError::MissingFeature(_))));
    assert_eq!(session.state(), SessionState::DisplayingError);
    assert_eq!(session.history(), &before);
    assert_eq!(session.last_error(), Some("Error: missing feature 'soil_moisture'"));

    // Next submission recovers and continues numbering
    let outcome = session.submit(&reading(1.0)).unwrap();
    assert_eq!(outcome.run, 2);
    assert_eq!(session.last_error(), None);
}

#[test]
fn test_history_records_match_predictions() {
    let mut session = Session::new(context());
    let outcome = session.submit(&reading(2.0)).unwrap();

    let record = session.history().last().unwrap();
    assert_eq!(record.rainfall_mm, outcome.prediction.rainfall_mm);
    assert_eq!(record.flood_risk_pct, outcome.prediction.flood_risk_pct);
}

#[test]
fn test_chart_is_redrawn_after_each_run() {
    let dir = tempdir().unwrap();
    let chart_path = dir.path().join("live_chart.svg");
    let mut session = Session::new(context()).with_chart(&chart_path);

    for (run, offset) in [(1, 0.0), (2, 3.0), (3, 6.0)] {
        let outcome = session.submit(&reading(offset)).unwrap();
        assert_eq!(outcome.chart.as_deref(), Some(chart_path.as_path()));

        // One rainfall marker per run in the history
        let svg = std::fs::read_to_string(&chart_path).unwrap();
        assert_eq!(svg.matches("<circle").count(), run);
        assert!(svg.contains("Run Number"));
    }
}

#[test]
fn test_session_without_model() {
    let mut session = Session::without_model();
    assert!(!session.is_model_loaded());
    assert!(matches!(
        session.submit(&reading(0.0)),
        Err(FloodSightError::ModelNotLoaded)
    ));
    assert!(session.history().is_empty());

    session.load_model(context());
    assert!(session.submit(&reading(0.0)).is_ok());
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_risk_classification_boundaries() {
    let cases = [
        (71.0, RiskLevel::High),
        (70.01, RiskLevel::High),
        (70.0, RiskLevel::Moderate),
        (69.9, RiskLevel::Moderate),
        (40.0, RiskLevel::Low),
        (39.9, RiskLevel::Low),
        (0.0, RiskLevel::Low),
    ];
    for (pct, expected) in cases {
        assert_eq!(RiskLevel::classify(pct), expected, "flood risk {}", pct);
    }
    assert_eq!(RiskLevel::Low.message(), "Low Flood Risk. Conditions stable.");
}
