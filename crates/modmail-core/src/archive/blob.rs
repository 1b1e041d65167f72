//! Key-value blob storage used to persist the archive.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::Result;

/// Synchronous key-value blob storage.
pub trait BlobStore: Send {
    /// Reads the blob stored under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Stores each blob as `<key>.json` inside a directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the blobs live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        // Readers never observe a partially written blob
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;

        debug!("Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}

/// In-memory blob store.
///
/// Clones share the same contents, so a test can keep a handle after moving
/// the store into an [`ArchiveStore`](super::ArchiveStore).
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of the blob under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().ok()?.get(key).cloned()
    }

    /// Stores a blob directly, bypassing write failure injection.
    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut blobs) = self.lock() {
            blobs.insert(key.into(), bytes.into());
        }
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| io::Error::other("blob store lock poisoned"))
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure").into());
        }
        self.lock()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());
        assert!(store.read("ModMail").unwrap().is_none());
    }

    #[test]
    fn test_file_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("modmail");
        let mut store = FileBlobStore::new(&nested);

        store.write("ModMail", b"{\"Mails\":[]}").unwrap();
        assert!(nested.join("ModMail.json").exists());
        assert!(!nested.join("ModMail.json.tmp").exists());
        assert_eq!(
            store.read("ModMail").unwrap().as_deref(),
            Some(&b"{\"Mails\":[]}"[..])
        );
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let mut store = MemoryBlobStore::new();
        store.write("a", b"1").unwrap();

        store.set_fail_writes(true);
        assert!(store.write("a", b"2").is_err());
        assert_eq!(store.get("a"), Some(b"1".to_vec()));

        store.set_fail_writes(false);
        store.write("a", b"3").unwrap();
        assert_eq!(store.read("a").unwrap(), Some(b"3".to_vec()));
    }
}
