use async_trait::async_trait;
use checkout_types::ports::session_store::{SessionStore, StoreError};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct MemorySessionStore {
    pub map: Arc<DashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            map: Arc::new(DashMap::new()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.map.remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.map.clear();
        Ok(())
    }
}
