//! Kit logging goes to a JSON log file.
//!
//! Lives in its own test binary: the tracing subscriber is process-global.

use som_test_utils::{baseline_types, clear_log, get_migrator_test_kit, read_log, TestKitParams};

#[tokio::test]
async fn kit_writes_json_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("migrator_test_kit.log");

    let kit = get_migrator_test_kit(TestKitParams {
        types: baseline_types(),
        log_file_path: Some(path.clone()),
        ..TestKitParams::default()
    })
    .unwrap();
    kit.run_migrations().await.unwrap();

    let log = read_log(&path).unwrap();
    for line in log.lines() {
        let entry: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(entry.get("level").is_some());
    }

    clear_log(&path);
    assert!(read_log(&path).unwrap().is_empty());
}
