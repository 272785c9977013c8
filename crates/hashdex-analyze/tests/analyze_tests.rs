use hashdex_analyze::{
    DuplicateConfig, DuplicateFinder, ExternError, ExternalManifest, HashType, extern_diff,
};
use hashdex_store::{FileDatabase, FileMode, FileRecord, write_manifest};
use std::fs;
use std::time::UNIX_EPOCH;
use tempfile::TempDir;

const H1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
const H2: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
const H3: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

fn rec(path: &str, size: u64, sha1: &str) -> FileRecord {
    let mut r = FileRecord::new(path, size, UNIX_EPOCH, FileMode::regular(0o644));
    r.sha1 = sha1.to_string();
    r
}

#[test]
fn test_diff_scenario_from_files() {
    let temp = TempDir::new().unwrap();
    let manifest = temp.path().join("hashdex.csv");
    write_manifest(&manifest, &[rec("a.txt", 5, H1), rec("b.txt", 3, H2)], false).unwrap();

    let listing = temp.path().join("remote.sha1");
    fs::write(&listing, format!("{H2}  b.txt\n{H3}  c.txt\n")).unwrap();

    let local = FileDatabase::open(&manifest).unwrap();
    let remote = ExternalManifest::open(&listing).unwrap();
    assert_eq!(remote.hash_type, Some(HashType::Sha1));

    let diff = extern_diff(&local, &remote);
    assert_eq!(diff.local_only, vec!["a.txt"]);
    assert_eq!(diff.remote_only, vec!["c.txt"]);
}

#[test]
fn test_diff_against_md5_listing() {
    let mut a = rec("a.txt", 5, H1);
    a.md5 = "5d41402abc4b2a76b9719d911017c592".to_string();
    let local = FileDatabase::new(vec![a]);

    let remote = ExternalManifest::parse(
        "5D41402ABC4B2A76B9719D911017C592 *a-copy.txt\n".as_bytes(),
        std::path::Path::new("remote.md5"),
    )
    .unwrap();

    let diff = extern_diff(&local, &remote);
    assert!(diff.is_empty());
}

#[test]
fn test_inconsistent_listing_never_diffs() {
    let temp = TempDir::new().unwrap();
    let listing = temp.path().join("mixed.txt");
    fs::write(
        &listing,
        format!("{H1}  a\n5d41402abc4b2a76b9719d911017c592  b\n"),
    )
    .unwrap();

    let err = ExternalManifest::open(&listing).unwrap_err();
    assert!(err.is_inconsistent_hash());
}

#[test]
fn test_missing_listing_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = ExternalManifest::open(&temp.path().join("nope")).unwrap_err();
    assert!(matches!(err, ExternError::Io { .. }));
}

#[test]
fn test_duplicates_from_manifest() {
    let temp = TempDir::new().unwrap();
    let manifest = temp.path().join("hashdex.csv");
    write_manifest(
        &manifest,
        &[
            rec("x/one", 4096, H1),
            rec("y/two", 4096, H1),
            rec("z/tiny1", 3, H2),
            rec("z/tiny2", 3, H2),
        ],
        false,
    )
    .unwrap();

    let db = FileDatabase::open(&manifest).unwrap();
    let config = DuplicateConfig::builder().min_size(1024u64).build().unwrap();
    let report = DuplicateFinder::with_config(config).find_duplicates(&db);

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.paths, vec!["x/one", "y/two"]);
    assert_eq!(group.deletable_count(), 1);
    assert_eq!(report.total_wasted_space, 4096);
}
