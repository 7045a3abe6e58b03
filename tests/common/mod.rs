#![allow(dead_code)]

use std::path::PathBuf;

use covtree::db::SqliteStore;
use covtree::model::CoverageData;
use tempfile::TempDir;

/// Create a fresh on-disk store, returning the store, dir handle, and db path.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn setup_store() -> (SqliteStore, TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let store = SqliteStore::open(&db_path).unwrap();
    (store, dir, db_path)
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load_fixture(name: &str) -> CoverageData {
    covtree::parsers::parse_file(&fixture(name)).unwrap()
}
