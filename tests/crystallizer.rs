use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use pensieve::embedding::HashingProvider;
use pensieve::persistence::Crystallizer;
use pensieve::store::{PensieveStore, StoreOptions};

async fn open(path: &Path) -> PensieveStore {
    PensieveStore::open(
        StoreOptions {
            snapshot_path: path.to_path_buf(),
            max_memories: 10,
            max_topics: 2,
            max_unsaved_memories: 100,
        },
        Arc::new(HashingProvider::new("title", 64)),
        Arc::new(HashingProvider::new("topic", 64)),
    )
    .await
    .unwrap()
}

async fn wait_for(path: &Path) -> bool {
    for _ in 0..200 {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_first_snapshot_is_immediate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snap.json");
    let store = open(&path).await;

    let crystallizer = Crystallizer::spawn(store, Duration::from_secs(3600));
    assert!(wait_for(&path).await);
    assert!(crystallizer.is_running());

    crystallizer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_is_prompt_and_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snap.json");
    let store = open(&path).await;

    let crystallizer = Crystallizer::spawn(store.clone(), Duration::from_secs(3600));
    assert!(wait_for(&path).await);

    store
        .write("late write", TimeDelta::zero(), "", &["Misc".to_string()])
        .await
        .unwrap();

    let written = tokio::time::timeout(Duration::from_secs(5), crystallizer.shutdown())
        .await
        .expect("shutdown should not wait for the next tick")
        .unwrap();
    assert!(written.ends_with("snap.json"));

    let reopened = open(&path).await;
    assert_eq!(reopened.memory_count().await, 1);
}

#[tokio::test]
async fn test_failed_snapshots_keep_the_loop_alive() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    let store = open(&blocker.join("snap.json")).await;
    // The snapshot directory becomes a plain file after the store is open.
    std::fs::write(&blocker, b"not a directory").unwrap();

    let crystallizer = Crystallizer::spawn(store, Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(crystallizer.is_running());

    let result = tokio::time::timeout(Duration::from_secs(5), crystallizer.shutdown())
        .await
        .expect("shutdown should be prompt");
    assert!(result.is_err());
}
