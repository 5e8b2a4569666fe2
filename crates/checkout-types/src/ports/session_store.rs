use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("session store io: {0}")]
    Io(String),

    #[error("session store data: {0}")]
    Corrupt(String),
}

/// String key/value storage for the signed-in session (auth token,
/// current user). Stands in for the browser's local storage.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}
