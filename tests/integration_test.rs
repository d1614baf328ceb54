mod common;

use floodsight::{train_pipeline, FeatureVector, InferenceContext, RiskLevel, Session, SessionState};
use tempfile::tempdir;

#[test]
fn test_train_load_and_predict_integration() {
    let dir = tempdir().unwrap();
    let data = common::write_dataset(dir.path(), 80);
    let report = train_pipeline(&data, dir.path().join("saved_model"), &common::quick_config(4)).unwrap();

    let context = InferenceContext::load(&report.artifacts).unwrap();
    let metadata = context.metadata().unwrap();
    assert_eq!(metadata.total_epochs, report.epochs_run);
    assert_eq!(metadata.best_epoch, report.best_epoch);

    let chart = dir.path().join("chart.svg");
    let mut session = Session::new(context).with_chart(&chart);
    let sample = FeatureVector::sample().to_map();

    let first = session.submit(&sample).unwrap();
    let second = session.submit(&sample).unwrap();

    assert_eq!(first.prediction, second.prediction);
    assert_eq!(first.risk, RiskLevel::classify(first.prediction.flood_risk_pct));
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.state(), SessionState::DisplayingResult);
    assert!(chart.is_file());
}
