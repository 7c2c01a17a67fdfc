use dataset_session::model::{Column, DatasetPair, SessionId, Snapshot, Table};
use dataset_session::{create_snapshot_store, SessionBackendConfig};

fn pair() -> DatasetPair {
    let ads = Table::new(vec![
        Column::text("campaign", &["spring"]),
        Column::numbers("clicks", &[42.0]),
    ])
    .expect("ads");
    let sales = Table::new(vec![Column::numbers("revenue", &[99.5])]).expect("sales");
    DatasetPair::new(ads, sales)
}

#[test]
fn factory_returns_inmemory_store() {
    let store = create_snapshot_store(&SessionBackendConfig::InMemory)
        .expect("factory should build in-memory store");
    let id = SessionId::new();
    store
        .save(&id, Snapshot::new(id.clone(), pair()))
        .expect("save succeeds");
    let fetched = store
        .load(&id)
        .expect("load succeeds")
        .expect("snapshot exists");
    assert_eq!(fetched.pair, pair());
}

#[test]
fn factory_returns_file_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path().join("nested").join("sessions");
    let store = create_snapshot_store(&SessionBackendConfig::File {
        dir: data_dir.clone(),
    })
    .expect("factory should build file store");
    assert!(data_dir.is_dir(), "store directory is created on open");

    let id = SessionId::new();
    store
        .save(&id, Snapshot::new(id.clone(), pair()))
        .expect("save succeeds");
    let fetched = store
        .load(&id)
        .expect("load succeeds")
        .expect("snapshot exists");
    assert_eq!(fetched.pair, pair());
    assert_eq!(fetched.meta.ads.column_names, vec!["campaign", "clicks"]);
}
