use inference_engine::{encode_snapshot, load_model, InferenceEngine, InferenceError, ModelFormat};
use std::path::PathBuf;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/acl_stress_model.json")
}

#[test]
fn loads_xgboost_json_fixture() {
    let model = load_model(fixture()).unwrap();
    assert_eq!(model.info.format, ModelFormat::XgboostJson);
    assert_eq!(model.info.library_version.as_deref(), Some("2.0.3"));
    assert_eq!(model.info.objective, "reg:squarederror");
    assert_eq!(model.info.n_trees, 4);
    assert_eq!(model.info.n_features, 9);
    assert_eq!(model.forest.feature_names()[8], "H/Q");
    assert!(model.forest.trees().iter().all(|t| t.has_covers()));
}

#[test]
fn predicts_zero_vector() {
    let engine = InferenceEngine::from_path(fixture()).unwrap();
    // 30 + 1.8 - 0.9 + 0.7 - 0.2
    let prediction = engine.predict(&[0.0; 9]).unwrap();
    assert!((prediction - 31.4).abs() < 1e-5, "got {prediction}");
}

#[test]
fn predicts_high_valgus_moment() {
    let engine = InferenceEngine::from_path(fixture()).unwrap();
    let mut x = [0.0; 9];
    x[5] = 50.0; // KVM past both thresholds
    x[7] = 350.0; // ASF
    // 30 + 4.1 - 0.9 + 0.7 + 0.35
    let prediction = engine.predict(&x).unwrap();
    assert!((prediction - 34.25).abs() < 1e-5, "got {prediction}");
}

#[test]
fn snapshot_on_disk_matches_json() {
    let json = load_model(fixture()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    std::fs::write(&path, encode_snapshot(&json).unwrap()).unwrap();

    let snapshot = load_model(&path).unwrap();
    assert_eq!(snapshot.info.format, ModelFormat::Snapshot);
    assert_eq!(snapshot.forest, json.forest);

    let x = [40.0, 30.0, 12.0, 9.0, 3.0, 30.0, -60.0, 250.0, 0.7];
    assert_eq!(
        snapshot.forest.predict(&x).to_bits(),
        json.forest.predict(&x).to_bits()
    );
}

#[test]
fn corrupt_artifact_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("final_model.bin");
    std::fs::write(&path, b"ACLF\x01\x00\xff\xff\xff").unwrap();
    assert!(matches!(load_model(&path), Err(InferenceError::ModelLoadError(_))));
}
