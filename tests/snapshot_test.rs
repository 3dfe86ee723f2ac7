use std::path::Path;
use trackview_wasm::converter::{feature_layer_to_feature_collection, gpx_to_feature_collection};
use trackview_wasm::kml::parse_kml;
use trackview_wasm::options::ViewerOptions;

fn load_fixture(path: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{path}")).unwrap()
}

fn convert(gpx: &str) -> serde_json::Value {
    let fc = gpx_to_feature_collection(gpx, &ViewerOptions::default()).unwrap();
    serde_json::to_value(&fc).unwrap()
}

/// Compare actual GeoJSON output against the expected snapshot file.
/// When `UPDATE_SNAPSHOTS=1` is set, write/overwrite the expected file instead.
fn assert_snapshot(actual: &serde_json::Value, expected_path: &str) {
    let path = format!("tests/fixtures/expected/{expected_path}");

    if matches!(std::env::var("UPDATE_SNAPSHOTS").as_deref(), Ok("1")) {
        let dir = Path::new(&path).parent().unwrap();
        std::fs::create_dir_all(dir).unwrap();
        let pretty = serde_json::to_string_pretty(actual).unwrap();
        std::fs::write(&path, pretty.as_bytes()).unwrap();
        eprintln!("Updated snapshot: {path}");
        return;
    }

    let expected_str = std::fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Expected file not found: {path}. Run with UPDATE_SNAPSHOTS=1 to generate."));
    let expected: serde_json::Value = serde_json::from_str(&expected_str)
        .unwrap_or_else(|e| panic!("Failed to parse {path}: {e}"));

    assert_eq!(
        *actual, expected,
        "Snapshot mismatch for {path}.\nRun with UPDATE_SNAPSHOTS=1 to update."
    );
}

#[test]
fn snapshot_01_three_points() {
    let actual = convert(&load_fixture("basic/01_three_points.gpx"));
    assert_snapshot(&actual, "basic/01_three_points.geojson");
}

#[test]
fn snapshot_04_no_time() {
    let actual = convert(&load_fixture("edge_cases/04_no_time.gpx"));
    assert_snapshot(&actual, "edge_cases/04_no_time.geojson");
}

#[test]
fn snapshot_08_places() {
    let layer = parse_kml("Places", &load_fixture("kml/08_places.kml")).unwrap();
    let fc = feature_layer_to_feature_collection(&layer);
    assert_snapshot(&serde_json::to_value(&fc).unwrap(), "kml/08_places.geojson");
}
