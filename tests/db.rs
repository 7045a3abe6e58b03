mod common;

use chrono::{TimeZone, Utc};
use covtree::db::{SqliteStore, SCHEMA_VERSION};
use covtree::error::CovtreeError;
use covtree::history::{
    CoverageSnapshot, ReportHistory, TrendDirection, TrendStore, REPORTS_KEY,
};
use covtree::store::KeyValueStore;

#[test]
fn set_get_remove() {
    let (mut store, _dir, _) = common::setup_store();

    assert_eq!(store.get("k").unwrap(), None);
    store.set("k", "v1").unwrap();
    store.set("k", "v2").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

    store.remove("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
    // Removing again is fine.
    store.remove("k").unwrap();
}

#[test]
fn values_survive_reopen() {
    let (mut store, _dir, path) = common::setup_store();
    store.set("covtree:test", "persisted").unwrap();
    drop(store);

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.get("covtree:test").unwrap().as_deref(), Some("persisted"));
}

#[test]
fn keys_by_prefix() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.set("covtree:b", "1").unwrap();
    store.set("covtree:a", "1").unwrap();
    store.set("other", "1").unwrap();

    assert_eq!(store.keys("covtree:").unwrap(), vec!["covtree:a", "covtree:b"]);
}

#[test]
fn init_schema_is_idempotent() {
    let (store, _dir, _) = common::setup_store();
    covtree::db::init_schema(store.connection()).unwrap();
    covtree::db::init_schema(store.connection()).unwrap();

    let rows: u32 = store
        .connection()
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(covtree::db::schema_version(store.connection()).unwrap(), SCHEMA_VERSION);
}

#[test]
fn newer_schema_refused() {
    let (store, _dir, path) = common::setup_store();
    store
        .connection()
        .execute("UPDATE schema_version SET version = ?1", [SCHEMA_VERSION + 1])
        .unwrap();
    drop(store);

    let err = SqliteStore::open(&path).err().unwrap();
    assert!(matches!(err, CovtreeError::Other(ref msg) if msg.contains("newer")));
}

#[test]
fn unmigratable_schema_refused() {
    let (store, _dir, path) = common::setup_store();
    store
        .connection()
        .execute("UPDATE schema_version SET version = 0", [])
        .unwrap();
    drop(store);

    let err = SqliteStore::open(&path).err().unwrap();
    assert!(matches!(err, CovtreeError::Other(ref msg) if msg.contains("No migration path")));
}

#[test]
fn corrupt_history_is_a_json_error() {
    let (mut store, _dir, _) = common::setup_store();
    store.set(REPORTS_KEY, "[{\"name\":").unwrap();

    let err = ReportHistory::new(&mut store).list().unwrap_err();
    assert!(matches!(err, CovtreeError::Json(_)));
}

#[test]
fn history_on_sqlite() {
    let (mut store, _dir, path) = common::setup_store();
    let older = common::load_fixture("dotnet.xml");
    let newer = common::load_fixture("dotnet_next.xml");
    let day = |d: u32| Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0).unwrap();

    ReportHistory::new(&mut store).save_at("v1", &older, day(1)).unwrap();
    ReportHistory::new(&mut store).save_at("v2", &newer, day(2)).unwrap();
    let mut trend = TrendStore::new(&mut store);
    trend.record(CoverageSnapshot::from_data(&older, day(1))).unwrap();
    trend.record(CoverageSnapshot::from_data(&newer, day(2))).unwrap();
    drop(store);

    let mut reopened = SqliteStore::open(&path).unwrap();
    let saved = ReportHistory::new(&mut reopened).load("v1").unwrap().unwrap();
    assert_eq!(saved.data.packages.len(), older.packages.len());
    assert_eq!(saved.data.summary.metrics.lines_covered, 13);
    assert_eq!(saved.data.summary.timestamp, older.summary.timestamp);
    assert_eq!(saved.saved_at, day(1));

    let analysis = TrendStore::new(&mut reopened).analyze().unwrap().unwrap();
    assert_eq!(analysis.direction, TrendDirection::Improving);
    assert_eq!(analysis.line_change, 30.35);
    assert_eq!(analysis.current.package_count, 3);
    assert_eq!(analysis.previous.class_count, 7);
}
