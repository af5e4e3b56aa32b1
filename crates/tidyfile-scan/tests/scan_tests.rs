use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tidyfile_scan::{BINARY_SENTINEL, ScanConfig, ScanError, Scanner};
use tokio_util::sync::CancellationToken;

fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("b.txt"), "bravo").unwrap();
    fs::write(root.join("sub/c.txt"), "charlie").unwrap();

    temp
}

#[test]
fn test_scan_non_recursive_returns_top_level_files_only() {
    let temp = create_test_tree();
    let records = Scanner::new().scan(&ScanConfig::new(temp.path())).unwrap();

    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert!(records.iter().all(|r| r.path.is_absolute()));
    assert!(records.iter().all(|r| r.extension == "txt"));
}

#[test]
fn test_scan_recursive_includes_subdirectories() {
    let temp = create_test_tree();
    let config = ScanConfig::builder()
        .root(temp.path())
        .recursive(true)
        .build()
        .unwrap();

    let records = Scanner::new().scan(&config).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().any(|r| r.name == "c.txt"));
}

#[test]
fn test_scan_missing_directory() {
    let temp = TempDir::new().unwrap();
    let err = Scanner::new()
        .scan(&ScanConfig::new(temp.path().join("nope")))
        .unwrap_err();
    assert!(matches!(err, ScanError::NotFound { .. }));
}

#[test]
fn test_scan_file_is_not_a_directory() {
    let temp = create_test_tree();
    let err = Scanner::new()
        .scan(&ScanConfig::new(temp.path().join("a.txt")))
        .unwrap_err();
    assert!(matches!(err, ScanError::NotADirectory { .. }));
}

#[test]
fn test_extension_filter() {
    let temp = create_test_tree();
    fs::write(temp.path().join("photo.JPG"), "jpeg-ish").unwrap();

    let mut config = ScanConfig::new(temp.path());
    config.extensions.insert(".jpg".to_string());

    let records = Scanner::new().scan(&config).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].extension, "jpg");
}

#[test]
fn test_hidden_directories_are_descended() {
    let temp = create_test_tree();
    fs::create_dir(temp.path().join(".config")).unwrap();
    fs::write(temp.path().join(".config/visible.txt"), "x").unwrap();
    fs::write(temp.path().join(".config/.secret"), "x").unwrap();

    let mut config = ScanConfig::new(temp.path());
    config.recursive = true;

    let records = Scanner::new().scan(&config).unwrap();
    assert!(records.iter().any(|r| r.name == "visible.txt"));
    assert!(!records.iter().any(|r| r.name.starts_with('.')));
}

#[test]
fn test_content_sampling_is_size_gated() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("small.txt"), "tiny").unwrap();
    fs::write(temp.path().join("large.txt"), "x".repeat(64)).unwrap();
    fs::write(temp.path().join("blob.bin"), [0u8, 255, 0, 7]).unwrap();

    let config = ScanConfig::builder()
        .root(temp.path())
        .include_content(true)
        .max_content_bytes(64u64)
        .build()
        .unwrap();

    let records = Scanner::new().scan(&config).unwrap();
    let by_name = |name: &str| records.iter().find(|r| r.name == name).unwrap();

    assert_eq!(by_name("small.txt").content_sample.as_deref(), Some("tiny"));
    assert_eq!(by_name("large.txt").content_sample, None);
    assert_eq!(
        by_name("blob.bin").content_sample.as_deref(),
        Some(BINARY_SENTINEL)
    );
}

#[test]
fn test_metadata_can_be_disabled() {
    let temp = create_test_tree();
    let mut config = ScanConfig::new(temp.path());
    config.include_metadata = false;

    let records = Scanner::new().scan(&config).unwrap();
    assert!(records.iter().all(|r| r.metadata.is_none()));

    config.include_metadata = true;
    let records = Scanner::new().scan(&config).unwrap();
    assert!(records.iter().all(|r| r.metadata.is_some()));
}

#[test]
fn test_vanished_candidates_are_dropped_silently() {
    let temp = create_test_tree();
    let config = ScanConfig::new(temp.path());
    let scanner = Scanner::new();
    let cancel = CancellationToken::new();

    let mut candidates = scanner
        .collect_candidates(&config, temp.path(), &cancel)
        .unwrap();
    candidates.push(temp.path().join("vanished.txt"));
    fs::remove_file(temp.path().join("b.txt")).unwrap();

    let records = scanner
        .extract_records(&config, &candidates, &cancel)
        .unwrap();

    assert_eq!(candidates.len(), 3);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "a.txt");
}

#[test]
fn test_directory_candidate_is_dropped() {
    let temp = create_test_tree();
    let config = ScanConfig::new(temp.path());
    let candidates: Vec<PathBuf> = vec![temp.path().join("sub"), temp.path().join("a.txt")];

    let records = Scanner::new()
        .extract_records(&config, &candidates, &CancellationToken::new())
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_cancelled_scan_is_interrupted() {
    let temp = create_test_tree();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Scanner::new()
        .scan_with_cancel(&ScanConfig::new(temp.path()), &cancel)
        .unwrap_err();
    assert!(matches!(err, ScanError::Interrupted));
}

#[test]
fn test_records_carry_timestamps_and_size() {
    let temp = create_test_tree();
    let records = Scanner::new().scan(&ScanConfig::new(temp.path())).unwrap();
    let a = &records[0];
    assert_eq!(a.size, 5);
    assert!(a.modified <= chrono::Utc::now());
}
