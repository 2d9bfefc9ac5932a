//! Credential store - the single durable home of the salt/hash pair
//!
//! Readers subscribe to a `watch` channel holding the latest credential
//! (`None` until the first write). A write is committed to storage first and
//! only then published, so anyone reading after `write` returns sees the new
//! value. There is no delete: overwriting is the only mutation.
//!
//! A file write cannot be cancelled halfway: once the commit has started,
//! dropping the `write` future still lets it land and be published.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use screenblock_core::{Credential, DEFAULT_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::{fsutil, Result, StoreError};

/// Durable, observable storage for one credential
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Receiver that always holds the latest stored credential
    fn subscribe(&self) -> watch::Receiver<Option<Credential>>;

    /// Latest stored credential
    fn current(&self) -> Option<Credential> {
        self.subscribe().borrow().clone()
    }

    /// Stream yielding the current value, then every subsequent write
    fn stream(&self) -> WatchStream<Option<Credential>> {
        WatchStream::new(self.subscribe())
    }

    /// Replace the stored credential as a whole
    ///
    /// Either the new pair is durable and published, or nothing changed.
    async fn write(&self, credential: Credential) -> Result<()>;
}

/// In-process store
pub struct MemoryCredentialStore {
    tx: watch::Sender<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Store pre-loaded with a credential
    pub fn with_credential(credential: Credential) -> Self {
        let (tx, _) = watch::channel(Some(credential));
        Self { tx }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.tx.subscribe()
    }

    async fn write(&self, credential: Credential) -> Result<()> {
        debug!(?credential, "storing credential in memory");
        self.tx.send_replace(Some(credential));
        Ok(())
    }
}

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout: two fixed byte-array keys plus the round count
#[derive(Debug, Serialize, Deserialize)]
struct CredentialDocument {
    version: u32,
    /// base64 of the 16-byte salt
    salt: String,
    /// base64 of the 32-byte verifier
    hash: String,
    #[serde(default = "default_iterations")]
    iterations: u32,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl CredentialDocument {
    fn from_credential(credential: &Credential) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            salt: STANDARD.encode(credential.salt()),
            hash: STANDARD.encode(credential.hash()),
            iterations: credential.iterations(),
        }
    }

    fn into_credential(self) -> Result<Credential> {
        if self.version != DOCUMENT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported credential format version {}",
                self.version
            )));
        }
        if self.iterations == 0 {
            return Err(StoreError::Corrupt("iteration count is zero".into()));
        }

        let salt = STANDARD
            .decode(&self.salt)
            .map_err(|e| StoreError::Corrupt(format!("salt: {}", e)))?;
        let hash = STANDARD
            .decode(&self.hash)
            .map_err(|e| StoreError::Corrupt(format!("hash: {}", e)))?;

        Credential::from_slices(&salt, &hash, self.iterations)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

/// Credential persisted as a small JSON document
///
/// Writes are serialized and go through temp file + rename, so the salt and
/// hash on disk always belong to the same credential.
pub struct FileCredentialStore {
    path: PathBuf,
    tx: Arc<watch::Sender<Option<Credential>>>,
    write_lock: Arc<Mutex<()>>,
}

impl FileCredentialStore {
    /// Open the store, reading whatever credential is already on disk
    ///
    /// A missing file is an empty store. An unreadable or malformed file is
    /// logged and also treated as empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = Self::read_from_disk(&path).await;
        match &initial {
            Some(credential) => info!(path = %path.display(), ?credential, "credential loaded"),
            None => debug!(path = %path.display(), "no stored credential"),
        }

        let (tx, _) = watch::channel(initial);
        Self {
            path,
            tx: Arc::new(tx),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_from_disk(path: &Path) -> Option<Credential> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read credential file");
                return None;
            }
        };

        let parsed = serde_json::from_slice::<CredentialDocument>(&bytes)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
            .and_then(CredentialDocument::into_credential);

        match parsed {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unusable credential file");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.tx.subscribe()
    }

    async fn write(&self, credential: Credential) -> Result<()> {
        let document = CredentialDocument::from_credential(&credential);
        let body = serde_json::to_vec_pretty(&document)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let path = self.path.clone();
        let tx = Arc::clone(&self.tx);

        // The lock travels with the commit, so a dropped caller cannot let
        // the next write overtake it
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            fsutil::write_atomic(&path, &body)?;
            info!(path = %path.display(), ?credential, "credential stored");
            tx.send_replace(Some(credential));
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn credential(fill: u8) -> Credential {
        Credential::new([fill; 16], [fill.wrapping_add(1); 32], 1_000)
    }

    #[tokio::test]
    async fn test_memory_starts_empty() {
        let store = MemoryCredentialStore::new();
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_memory_write_then_read() {
        let store = MemoryCredentialStore::new();
        let cred = credential(1);

        store.write(cred.clone()).await.unwrap();
        let read = store.current().unwrap();
        assert_eq!(read.salt(), cred.salt());
        assert_eq!(read.hash(), cred.hash());
        assert_eq!(read.iterations(), cred.iterations());
    }

    #[tokio::test]
    async fn test_observers_see_latest() {
        let store = MemoryCredentialStore::new();
        let mut early = store.subscribe();
        let mut stream = store.stream();

        // Stream yields the current value first
        assert_eq!(stream.next().await, Some(None));

        store.write(credential(1)).await.unwrap();
        store.write(credential(2)).await.unwrap();

        early.changed().await.unwrap();
        assert_eq!(*early.borrow(), Some(credential(2)));

        // A late subscriber gets the latest value straight away
        let late = store.subscribe();
        assert_eq!(*late.borrow(), Some(credential(2)));

        assert_eq!(stream.next().await, Some(Some(credential(2))));
    }

    #[tokio::test]
    async fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");

        let store = FileCredentialStore::open(&path).await;
        assert!(store.current().is_none());

        let cred = credential(9);
        store.write(cred.clone()).await.unwrap();
        assert_eq!(store.current(), Some(cred.clone()));

        // Reopen from disk
        let reopened = FileCredentialStore::open(&path).await;
        assert_eq!(reopened.current(), Some(cred));
    }

    #[tokio::test]
    async fn test_file_overwrite_replaces_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");
        let store = FileCredentialStore::open(&path).await;

        store.write(credential(1)).await.unwrap();
        store.write(credential(5)).await.unwrap();

        let reopened = FileCredentialStore::open(&path).await;
        let stored = reopened.current().unwrap();
        assert_eq!(stored.salt(), &[5; 16]);
        assert_eq!(stored.hash(), &[6; 32]);
    }

    #[tokio::test]
    async fn test_file_layout_has_fixed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");
        let store = FileCredentialStore::open(&path).await;
        store.write(credential(3)).await.unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["iterations"], 1_000);
        assert_eq!(STANDARD.decode(raw["salt"].as_str().unwrap()).unwrap(), vec![3u8; 16]);
        assert_eq!(STANDARD.decode(raw["hash"].as_str().unwrap()).unwrap(), vec![4u8; 32]);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");

        std::fs::write(&path, "garbage").unwrap();
        assert!(FileCredentialStore::open(&path).await.current().is_none());

        // Valid JSON, truncated salt
        let doc = format!(
            r#"{{"version":1,"salt":"{}","hash":"{}","iterations":10}}"#,
            STANDARD.encode([1u8; 8]),
            STANDARD.encode([2u8; 32])
        );
        std::fs::write(&path, doc).unwrap();
        assert!(FileCredentialStore::open(&path).await.current().is_none());

        // Unknown format version
        let doc = format!(
            r#"{{"version":7,"salt":"{}","hash":"{}"}}"#,
            STANDARD.encode([1u8; 16]),
            STANDARD.encode([2u8; 32])
        );
        std::fs::write(&path, doc).unwrap();
        assert!(FileCredentialStore::open(&path).await.current().is_none());
    }

    #[tokio::test]
    async fn test_missing_iterations_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");
        let doc = format!(
            r#"{{"version":1,"salt":"{}","hash":"{}"}}"#,
            STANDARD.encode([1u8; 16]),
            STANDARD.encode([2u8; 32])
        );
        std::fs::write(&path, doc).unwrap();

        let store = FileCredentialStore::open(&path).await;
        assert_eq!(store.current().unwrap().iterations(), DEFAULT_ITERATIONS);
    }

    #[tokio::test]
    async fn test_abandoned_write_still_published() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");
        let store = FileCredentialStore::open(&path).await;
        let mut rx = store.subscribe();

        // Poll the write once, then drop it
        let mut write = store.write(credential(7));
        tokio::select! {
            biased;
            _ = &mut write => {}
            _ = std::future::ready(()) => {}
        }
        drop(write);

        tokio::time::timeout(std::time::Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.current(), Some(credential(7)));
        assert_eq!(FileCredentialStore::open(&path).await.current(), Some(credential(7)));
    }

    #[tokio::test]
    async fn test_failed_write_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // Parent "directory" is a regular file, so the write cannot land
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = FileCredentialStore::open(blocker.join("credential.json")).await;

        let result = store.write(credential(1)).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.current().is_none());
    }
}
