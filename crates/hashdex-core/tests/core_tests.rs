use hashdex_core::{FileMode, FileRecord, HashType, IndexConfig, RecordError, ReuseMode};
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

#[test]
fn test_record_digest_selection() {
    let mut record = FileRecord::new(
        "docs/readme.md",
        5,
        UNIX_EPOCH + Duration::from_secs(1_600_000_000),
        FileMode::regular(0o644),
    );
    record.sha1 = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d".to_string();

    assert_eq!(
        record.digest(HashType::Sha1),
        Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
    );
    assert_eq!(record.digest(HashType::Md5), None);

    record.md5 = "5d41402abc4b2a76b9719d911017c592".to_string();
    assert_eq!(
        record.digest(HashType::Md5),
        Some("5d41402abc4b2a76b9719d911017c592")
    );
}

#[test]
fn test_record_full_path() {
    let record = FileRecord::new("a/b.bin", 1, UNIX_EPOCH, FileMode::regular(0o600));
    assert_eq!(
        record.full_path(&PathBuf::from("/srv/root")),
        PathBuf::from("/srv/root/a/b.bin")
    );
}

#[test]
fn test_record_error_round_trips_as_text() {
    let original = RecordError::Open {
        message: "Permission denied (os error 13)".to_string(),
    };
    let recorded = RecordError::Recorded(original.to_string());
    assert_eq!(recorded.to_string(), original.to_string());
    assert!(!recorded.is_hashable());
}

#[test]
fn test_mode_string_is_stable() {
    let mode = FileMode::regular(0o640);
    let text = mode.to_string();
    assert_eq!(text, "-rw-r-----");
    assert_eq!(text.parse::<FileMode>().unwrap(), mode);
    assert!(mode.is_regular());
    assert_eq!(mode.permissions(), 0o640);
}

#[test]
fn test_config_new_defaults() {
    let config = IndexConfig::new("/tmp/tree");
    assert_eq!(config.reuse, ReuseMode::Off);
    assert_eq!(config.progress_interval, 1000);
    assert!(config.include_hidden);
    assert!(!config.follow_symlinks);
    assert!(config.output.is_none());
}

#[test]
fn test_config_serde_defaults() {
    let config: IndexConfig = serde_json::from_str(r#"{"root": "/tmp/tree"}"#).unwrap();
    assert_eq!(config.root, PathBuf::from("/tmp/tree"));
    assert_eq!(config.open_timeout, Some(Duration::from_secs(10)));
    assert_eq!(config.progress_interval, 1000);
    assert!(config.include_hidden);
    assert_eq!(config.reuse, ReuseMode::Off);
    assert_eq!(config.workers, 0);
    assert!(!config.compute_md5);
    assert!(config.ignore_patterns.is_empty());

    let config: IndexConfig =
        serde_json::from_str(r#"{"root": "/tmp/tree", "include_hidden": false, "reuse": "SamePath"}"#)
            .unwrap();
    assert!(!config.include_hidden);
    assert_eq!(config.reuse, ReuseMode::SamePath);
}
