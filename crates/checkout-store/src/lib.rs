#[cfg(not(any(feature = "memory", feature = "file")))]
compile_error!("Enable a store feature: `memory` or `file`.");

use checkout_types::ports::session_store::{SessionStore, StoreError};

#[cfg(feature = "file")]
pub mod file;
#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "file")]
const DEFAULT_SESSION_FILE: &str = "session.json";

pub enum Store {
    #[cfg(feature = "memory")]
    Memory(memory::MemorySessionStore),
    #[cfg(feature = "file")]
    File(file::FileSessionStore),
}

pub async fn build_store(path: Option<&str>) -> anyhow::Result<Store> {
    Store::build_store(path).await
}

impl Store {
    #[cfg(all(feature = "memory", not(feature = "file")))]
    pub async fn build_store(_: Option<&str>) -> anyhow::Result<Self> {
        Ok(Store::Memory(memory::MemorySessionStore::new()))
    }

    #[cfg(all(feature = "file", not(feature = "memory")))]
    pub async fn build_store(path: Option<&str>) -> anyhow::Result<Self> {
        let path = path.unwrap_or(DEFAULT_SESSION_FILE);
        Ok(Store::File(file::FileSessionStore::open(path).await?))
    }

    // With both backends compiled in, a path selects the file store.
    #[cfg(all(feature = "file", feature = "memory"))]
    pub async fn build_store(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Ok(Store::File(file::FileSessionStore::open(p).await?)),
            None => Ok(Store::Memory(memory::MemorySessionStore::new())),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            #[cfg(feature = "memory")]
            Store::Memory(_) => "memory",
            #[cfg(feature = "file")]
            Store::File(_) => "file",
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for Store {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            #[cfg(feature = "memory")]
            Store::Memory(s) => s.get(key).await,
            #[cfg(feature = "file")]
            Store::File(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            #[cfg(feature = "memory")]
            Store::Memory(s) => s.set(key, value).await,
            #[cfg(feature = "file")]
            Store::File(s) => s.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        match self {
            #[cfg(feature = "memory")]
            Store::Memory(s) => s.remove(key).await,
            #[cfg(feature = "file")]
            Store::File(s) => s.remove(key).await,
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match self {
            #[cfg(feature = "memory")]
            Store::Memory(s) => s.clear().await,
            #[cfg(feature = "file")]
            Store::File(s) => s.clear().await,
        }
    }
}
