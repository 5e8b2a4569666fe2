#![cfg(feature = "memory")]

use checkout_store::memory::MemorySessionStore;
use checkout_types::ports::session_store::SessionStore;

#[tokio::test]
async fn memory_store_get_set_remove_flow() {
    let store = MemorySessionStore::new();
    assert!(store.get("authToken").await.unwrap().is_none());

    store.set("authToken", "abc").await.unwrap();
    store.set("authToken", "def").await.unwrap();
    assert_eq!(store.get("authToken").await.unwrap().as_deref(), Some("def"));

    assert!(store.remove("authToken").await.unwrap());
    assert!(!store.remove("authToken").await.unwrap());
}

#[tokio::test]
async fn memory_store_clones_share_state_and_clear() {
    let store = MemorySessionStore::new();
    let other = store.clone();
    store.set("authToken", "abc").await.unwrap();
    store.set("currentUser", "{}").await.unwrap();
    assert_eq!(other.get("authToken").await.unwrap().as_deref(), Some("abc"));

    other.clear().await.unwrap();
    assert!(store.get("currentUser").await.unwrap().is_none());
}
