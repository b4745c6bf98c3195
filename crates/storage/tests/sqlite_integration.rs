use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteStore;

#[tokio::test]
async fn sqlite_round_trips_and_overwrites_values() {
    let store = SqliteStore::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");

    assert_eq!(store.get("quiz_progress_read_and_select").await.unwrap(), None);

    store
        .set("quiz_progress_read_and_select", r#"{"completed":1,"total":6}"#)
        .await
        .unwrap();
    store
        .set("quiz_progress_read_and_select", r#"{"completed":2,"total":6}"#)
        .await
        .unwrap();

    let value = store
        .get("quiz_progress_read_and_select")
        .await
        .unwrap()
        .expect("value present");
    assert_eq!(value, r#"{"completed":2,"total":6}"#);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let store = SqliteStore::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("first migrate");
    store.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn storage_builder_runs_migrations() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage.kv.set("k", "v").await.unwrap();
    assert_eq!(storage.kv.get("k").await.unwrap().as_deref(), Some("v"));
}
