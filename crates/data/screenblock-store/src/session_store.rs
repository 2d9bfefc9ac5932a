//! Session snapshot persistence
//!
//! Saves where the bubble sat and whether the curtain was up. Saving never
//! fails outward: a session that cannot checkpoint keeps running and logs.

use chrono::{DateTime, TimeZone, Utc};
use screenblock_core::BubblePosition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::{fsutil, Result, StoreError};

/// Current snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// What survives a restart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedSession {
    pub position: BubblePosition,
    pub was_blocking: bool,
}

/// Snapshot sink used by the overlay session
pub trait SessionStatePersistence: Send + Sync {
    /// Replace the stored snapshot, logging on failure
    fn save(&self, snapshot: &PersistedSession);

    /// Last saved snapshot, if one is readable
    fn load(&self) -> Option<PersistedSession>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    position: BubblePosition,
    was_blocking: bool,
    /// Unix seconds
    saved_at: i64,
}

/// Snapshot stored as JSON next to the credential
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot plus the time it was written
    pub fn inspect(&self) -> Result<Option<(PersistedSession, DateTime<Utc>)>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: SnapshotEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        if envelope.version != SNAPSHOT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported snapshot version {}",
                envelope.version
            )));
        }

        let saved_at = Utc
            .timestamp_opt(envelope.saved_at, 0)
            .single()
            .unwrap_or_default();
        let snapshot = PersistedSession {
            position: envelope.position,
            was_blocking: envelope.was_blocking,
        };
        Ok(Some((snapshot, saved_at)))
    }

    fn try_save(&self, snapshot: &PersistedSession) -> Result<()> {
        let envelope = SnapshotEnvelope {
            version: SNAPSHOT_VERSION,
            position: snapshot.position,
            was_blocking: snapshot.was_blocking,
            saved_at: Utc::now().timestamp(),
        };
        let body = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fsutil::write_atomic(&self.path, &body)?;
        Ok(())
    }
}

impl SessionStatePersistence for FileSessionStore {
    fn save(&self, snapshot: &PersistedSession) {
        match self.try_save(snapshot) {
            Ok(()) => debug!(path = %self.path.display(), ?snapshot, "session snapshot saved"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to save session snapshot"),
        }
    }

    fn load(&self) -> Option<PersistedSession> {
        match self.inspect() {
            Ok(found) => found.map(|(snapshot, _)| snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable session snapshot");
                None
            }
        }
    }
}

/// In-process snapshot holder
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<PersistedSession>>,
    saves: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds a snapshot from an earlier run
    pub fn with_snapshot(snapshot: PersistedSession) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of saves since construction
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SessionStatePersistence for MemorySessionStore {
    fn save(&self, snapshot: &PersistedSession) {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(*snapshot);
        self.saves.fetch_add(1, Ordering::SeqCst);
    }

    fn load(&self) -> Option<PersistedSession> {
        *self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(x: i32, y: i32, was_blocking: bool) -> PersistedSession {
        PersistedSession {
            position: BubblePosition::new(x, y),
            was_blocking,
        }
    }

    #[test]
    fn test_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::at_path(dir.path().join("session.json"));
        assert!(store.load().is_none());

        store.save(&snapshot(40, 120, true));
        assert_eq!(store.load(), Some(snapshot(40, 120, true)));

        // A fresh handle on the same file sees the same snapshot
        let reopened = FileSessionStore::at_path(store.path());
        assert_eq!(reopened.load(), Some(snapshot(40, 120, true)));
    }

    #[test]
    fn test_file_save_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::at_path(dir.path().join("session.json"));

        store.save(&snapshot(1, 2, true));
        store.save(&snapshot(3, 4, false));
        assert_eq!(store.load(), Some(snapshot(3, 4, false)));
    }

    #[test]
    fn test_inspect_reports_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::at_path(dir.path().join("session.json"));

        let before = Utc::now().timestamp();
        store.save(&snapshot(0, 0, false));
        let (_, saved_at) = store.inspect().unwrap().unwrap();
        assert!(saved_at.timestamp() >= before);
    }

    #[test]
    fn test_corrupt_or_foreign_snapshot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileSessionStore::at_path(&path);

        std::fs::write(&path, "{{{").unwrap();
        assert!(store.load().is_none());
        assert!(matches!(store.inspect(), Err(StoreError::Corrupt(_))));

        std::fs::write(
            &path,
            r#"{"version":2,"position":{"x":1,"y":1},"was_blocking":true,"saved_at":0}"#,
        )
        .unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let store = FileSessionStore::at_path(blocker.join("session.json"));
        store.save(&snapshot(1, 1, true));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(store.load().is_none());
        assert_eq!(store.save_count(), 0);

        store.save(&snapshot(5, 6, true));
        store.save(&snapshot(7, 8, false));
        assert_eq!(store.load(), Some(snapshot(7, 8, false)));
        assert_eq!(store.save_count(), 2);

        let seeded = MemorySessionStore::with_snapshot(snapshot(40, 120, true));
        assert_eq!(seeded.load(), Some(snapshot(40, 120, true)));
    }
}
