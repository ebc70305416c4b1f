//! Durable client-side storage
//!
//! A small string key/value contract standing in for browser-style local
//! storage. Values are opaque strings; structured values are JSON-encoded by
//! the caller.

pub mod memory;
pub mod persistence;

pub use memory::MemoryStore;
pub use persistence::FileStore;

use crate::core::Result;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage key names, all derived from one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub cart: String,
    pub session_id: String,
    pub auth_token: String,
}

impl StorageKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            cart: format!("{}_cart", prefix),
            session_id: format!("{}_session_id", prefix),
            auth_token: format!("{}_auth_token", prefix),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::with_prefix("storefront")
    }
}
