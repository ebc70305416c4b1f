//! File-backed key/value persistence
//!
//! Every key is stored as its own file inside the data directory. Writes go to
//! a temporary file in the same directory which is then renamed over the
//! target, so a crash never leaves a half-written value behind.

use super::KeyValueStore;
use crate::core::{Result, StorefrontError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|e| {
            StorefrontError::Storage(format!(
                "Failed to create data directory '{}': {}",
                data_dir.display(),
                e
            ))
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorefrontError::Storage(format!("Invalid storage key '{}'", key)));
        }
        Ok(self.data_dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorefrontError::Storage(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let mut temp = NamedTempFile::new_in(&self.data_dir)
            .map_err(|e| StorefrontError::Storage(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(value.as_bytes())
            .map_err(|e| StorefrontError::Storage(format!("Failed to write '{}': {}", key, e)))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StorefrontError::Storage(format!("Failed to sync '{}': {}", key, e)))?;
        temp.persist(&path).map_err(|e| {
            StorefrontError::Storage(format!("Failed to rename into '{}': {}", path.display(), e))
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorefrontError::Storage(format!(
                "Failed to delete '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("nested")).unwrap();

        assert_eq!(store.get("storefront_cart").unwrap(), None);
        store.set("storefront_cart", "{\"items\":[]}").unwrap();
        store.set("storefront_cart", "{\"items\":[1]}").unwrap();
        assert_eq!(
            store.get("storefront_cart").unwrap().as_deref(),
            Some("{\"items\":[1]}")
        );

        store.remove("storefront_cart").unwrap();
        store.remove("storefront_cart").unwrap();
        assert_eq!(store.get("storefront_cart").unwrap(), None);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        FileStore::new(temp_dir.path())
            .unwrap()
            .set("session", "abc")
            .unwrap();

        let reopened = FileStore::new(temp_dir.path()).unwrap();
        assert_eq!(reopened.get("session").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }
}
