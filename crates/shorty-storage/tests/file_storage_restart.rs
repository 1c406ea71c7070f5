use std::time::Duration;

use shorty_storage::{open_storage, Lookup, Stats, StorageSettings, WriterRegistry};

fn settings(path: &std::path::Path) -> StorageSettings {
    StorageSettings::builder()
        .file_storage_path(path)
        .flush_interval(Duration::from_secs(3600))
        .build()
}

#[tokio::test]
async fn records_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.json");

    {
        let registry = WriterRegistry::new();
        let storage = open_storage(&settings(&path), &registry).await.unwrap();
        storage.put("ab12cd", "https://example.com", "u1").await.unwrap();
        storage.put("ef34gh", "https://example.org", "u2").await.unwrap();
        storage.close().await.unwrap();
    }

    let registry = WriterRegistry::new();
    let storage = open_storage(&settings(&path), &registry).await.unwrap();

    assert_eq!(
        storage.get("ab12cd").await.unwrap(),
        Lookup::Live("https://example.com".to_string())
    );
    assert_eq!(storage.stats().await.unwrap(), Stats { urls: 2, users: 1 });
}

#[tokio::test]
async fn later_flushes_keep_earlier_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.json");

    {
        let registry = WriterRegistry::new();
        let storage = open_storage(&settings(&path), &registry).await.unwrap();
        storage.put("first", "https://one.com", "u1").await.unwrap();
        storage.flush().await.unwrap();
        storage.put("second", "https://two.com", "u1").await.unwrap();
        storage.close().await.unwrap();
    }

    let registry = WriterRegistry::new();
    let storage = open_storage(&settings(&path), &registry).await.unwrap();

    assert!(storage.get("first").await.unwrap().exists());
    assert!(storage.get("second").await.unwrap().exists());
}

#[tokio::test]
async fn legacy_array_snapshot_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.json");
    std::fs::write(
        &path,
        r#"[
            {"uuid":"1","short_url":"old1","original_url":"https://one.com","user_id":"system"},
            {"uuid":"2","short_url":"old2","original_url":"https://two.com","user_id":"system"}
        ]"#,
    )
    .unwrap();

    let registry = WriterRegistry::new();
    let storage = open_storage(&settings(&path), &registry).await.unwrap();

    assert_eq!(
        storage.find_short_id("https://two.com").await.unwrap(),
        Some("old2".to_string())
    );
    assert_eq!(storage.stats().await.unwrap().urls, 2);
}
