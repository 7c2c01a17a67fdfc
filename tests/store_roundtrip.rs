use dataset_session::file_store::FileSnapshotStore;
use dataset_session::inmemory::InMemorySnapshotStore;
use dataset_session::model::{Cell, Column, ColumnKind, DatasetPair, SessionId, Snapshot, Table};
use dataset_session::SnapshotStore;
use proptest::prelude::*;
use std::fs;

fn numbered_table(prefix: &str, rows: usize) -> Table {
    let labels: Vec<String> = (0..rows).map(|i| format!("{prefix}-{i}")).collect();
    let values: Vec<f64> = (0..rows).map(|i| i as f64 * 1.25).collect();
    Table::new(vec![
        Column::text("label", labels.as_slice()),
        Column::numbers("value", &values),
        Column::text("label", labels.as_slice()),
    ])
    .expect("table")
}

fn file_store() -> (FileSnapshotStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileSnapshotStore::open(dir.path()).expect("open store");
    (store, dir)
}

#[test]
fn ten_and_three_rows_survive_a_round_trip() {
    let (store, _dir) = file_store();
    let id = SessionId::new();
    let pair = DatasetPair::new(numbered_table("ad", 10), numbered_table("sale", 3));

    store
        .save(&id, Snapshot::new(id.clone(), pair.clone()))
        .expect("save");
    let loaded = store.load(&id).expect("load").expect("present");

    assert_eq!(loaded.pair.ads.row_count(), 10);
    assert_eq!(loaded.pair.sales.row_count(), 3);
    assert_eq!(loaded.pair.ads.column_names(), vec!["label", "value", "label"]);
    assert_eq!(loaded.pair, pair);
    assert_eq!(loaded.meta.ads.rows, 10);
    assert_eq!(loaded.meta.sales.columns, 3);
}

#[test]
fn nulls_come_back_as_empty_strings() {
    let (store, _dir) = file_store();
    let id = SessionId::new();
    let ads = Table::new(vec![Column::new(
        "spend",
        ColumnKind::Number,
        vec![Cell::Number(1.0), Cell::Null, Cell::text("")],
    )])
    .expect("ads");
    store
        .save(&id, Snapshot::new(id.clone(), DatasetPair::new(ads, Table::default())))
        .expect("save");

    let loaded = store.load(&id).expect("load").expect("present");
    assert_eq!(
        loaded.pair.ads.columns()[0].cells,
        vec![Cell::Number(1.0), Cell::text(""), Cell::text("")]
    );
    assert_eq!(loaded.pair.ads.columns()[0].kind, ColumnKind::Number);
}

#[test]
fn upload_clear_load_is_absent() {
    let (store, _dir) = file_store();
    let id = SessionId::new();
    let pair = DatasetPair::new(numbered_table("ad", 2), numbered_table("sale", 2));
    store.save(&id, Snapshot::new(id.clone(), pair)).expect("save");

    store.clear(&id).expect("clear");
    assert!(store.load(&id).expect("load after clear").is_none());

    store.clear(&id).expect("second clear is not an error");
    assert!(!store.snapshot_path(&id).exists());
}

#[test]
fn load_before_upload_is_absent() {
    let (store, _dir) = file_store();
    assert!(store.load(&SessionId::new()).expect("load").is_none());
    let memory = InMemorySnapshotStore::new();
    assert!(memory.load(&SessionId::new()).expect("load").is_none());
}

#[test]
fn reupload_replaces_instead_of_merging() {
    let (store, _dir) = file_store();
    let id = SessionId::new();
    let first = DatasetPair::new(numbered_table("ad", 10), numbered_table("sale", 10));
    let second = DatasetPair::new(numbered_table("new", 1), Table::default());
    store.save(&id, Snapshot::new(id.clone(), first)).expect("save");
    store
        .save(&id, Snapshot::new(id.clone(), second.clone()))
        .expect("replace");

    let loaded = store.load(&id).expect("load").expect("present");
    assert_eq!(loaded.pair, second);
    assert_eq!(loaded.meta.sales.rows, 0);
}

#[test]
fn sessions_are_isolated() {
    let (store, _dir) = file_store();
    let a = SessionId::new();
    let b = SessionId::new();
    let pair_a = DatasetPair::new(numbered_table("a", 4), Table::default());
    let pair_b = DatasetPair::new(numbered_table("b", 2), Table::default());
    store.save(&a, Snapshot::new(a.clone(), pair_a.clone())).expect("save a");
    store.save(&b, Snapshot::new(b.clone(), pair_b.clone())).expect("save b");
    assert_ne!(store.snapshot_path(&a), store.snapshot_path(&b));

    store.clear(&a).expect("clear a");
    assert!(store.load(&a).expect("load a").is_none());
    assert_eq!(store.load(&b).expect("load b").expect("b present").pair, pair_b);
    assert_eq!(store.snapshot_count().expect("count"), 1);
}

#[test]
fn corrupt_snapshot_does_not_affect_other_sessions() {
    let (store, _dir) = file_store();
    let broken = SessionId::new();
    let healthy = SessionId::new();
    let pair = DatasetPair::new(numbered_table("ok", 1), Table::default());
    store
        .save(&healthy, Snapshot::new(healthy.clone(), pair.clone()))
        .expect("save");
    fs::write(store.snapshot_path(&broken), b"{\"version\":1,\"pair\":").expect("write junk");

    let err = store.load(&broken).expect_err("corrupt snapshot");
    assert!(err.to_string().contains("corrupt"), "unexpected error: {err}");
    assert_eq!(store.load(&healthy).expect("load").expect("present").pair, pair);

    store.clear(&broken).expect("corrupt snapshot can be cleared");
    assert!(store.load(&broken).expect("load").is_none());
}

fn cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        Just(Cell::Null),
        (-1.0e12f64..1.0e12f64).prop_map(Cell::Number),
        "\\PC{0,12}".prop_map(Cell::Text),
    ]
}

fn table() -> impl Strategy<Value = Table> {
    (0usize..4, 0usize..8).prop_flat_map(|(columns, rows)| {
        prop::collection::vec(
            ("\\PC{0,6}", prop::collection::vec(cell(), rows), any::<bool>()),
            columns,
        )
        .prop_map(|cols| {
            let columns = cols
                .into_iter()
                .map(|(name, cells, numeric)| {
                    let kind = if numeric {
                        ColumnKind::Number
                    } else {
                        ColumnKind::Text
                    };
                    Column::new(name, kind, cells)
                })
                .collect();
            Table::new(columns).expect("rectangular by construction")
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn round_trip_matches_modulo_null_sentinel(ads in table(), sales in table()) {
        let (store, _dir) = file_store();
        let id = SessionId::new();
        let pair = DatasetPair::new(ads, sales);
        store.save(&id, Snapshot::new(id.clone(), pair.clone())).expect("save");
        let loaded = store.load(&id).expect("load").expect("present");

        let mut expected = pair;
        expected.fill_nulls();
        prop_assert_eq!(&loaded.pair, &expected);

        let memory = InMemorySnapshotStore::new();
        memory.save(&id, Snapshot::new(id.clone(), expected.clone())).expect("save");
        prop_assert_eq!(memory.load(&id).expect("load").expect("present").pair, expected);
    }
}
