#![cfg(feature = "file")]

use checkout_store::file::FileSessionStore;
use checkout_types::ports::session_store::{SessionStore, StoreError};

fn temp_session_path() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("session.json");
    (dir, path)
}

#[tokio::test]
async fn file_store_persists_across_instances() {
    let (_dir, path) = temp_session_path();
    let store = FileSessionStore::open(&path).await.unwrap();
    assert!(store.get("authToken").await.unwrap().is_none());

    store.set("authToken", "abc").await.unwrap();
    store.set("currentUser", r#"{"id":1}"#).await.unwrap();

    let reopened = FileSessionStore::open(&path).await.unwrap();
    assert_eq!(reopened.get("authToken").await.unwrap().as_deref(), Some("abc"));
    assert_eq!(
        reopened.get("currentUser").await.unwrap().as_deref(),
        Some(r#"{"id":1}"#)
    );

    assert!(reopened.remove("authToken").await.unwrap());
    assert!(store.get("authToken").await.unwrap().is_none());
}

#[tokio::test]
async fn file_store_clear_removes_file() {
    let (_dir, path) = temp_session_path();
    let store = FileSessionStore::open(&path).await.unwrap();
    store.set("authToken", "abc").await.unwrap();
    assert!(path.exists());

    store.clear().await.unwrap();
    assert!(!path.exists());
    // clearing twice is fine
    store.clear().await.unwrap();
}

#[tokio::test]
async fn file_store_reports_corrupt_contents() {
    let (_dir, path) = temp_session_path();
    let store = FileSessionStore::open(&path).await.unwrap();
    tokio::fs::write(&path, "[1,2,3]").await.unwrap();

    let err = store.get("authToken").await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}
