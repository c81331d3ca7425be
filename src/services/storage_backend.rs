//! Synchronous string key-value storage used for persisted link data.

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::PathBuf;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).context("Failed to create link storage directory")?;
        }
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("[FileStore] Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemoryStore;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("links")).unwrap();

        assert_eq!(store.get("kick_chat_links_a").unwrap(), None);
        store.set("kick_chat_links_a", "[]").unwrap();
        assert_eq!(store.get("kick_chat_links_a").unwrap().as_deref(), Some("[]"));
        store.remove("kick_chat_links_a").unwrap();
        store.remove("kick_chat_links_a").unwrap();
        assert_eq!(store.get("kick_chat_links_a").unwrap(), None);
    }

    #[test]
    fn test_file_store_keys_cannot_escape_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.set("../evil", "x").unwrap();
        assert!(store.path_for("../evil").starts_with(dir.path()));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(20);
        store.set("k", "0123456789").unwrap();
        // replacing an entry only counts the new value
        store.set("k", "0123456789abcdef").unwrap();
        assert!(store.set("other", "0123456789").is_err());
        assert_eq!(store.get("other").unwrap(), None);
    }
}
