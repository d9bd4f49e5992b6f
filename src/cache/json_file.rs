//! Snapshot store backed by a JSON file.
//!
//! A missing file means no snapshot. A file that no longer parses, for
//! example after a schema change, is treated the same way rather than
//! failing the read.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use super::{Snapshot, SnapshotStore};

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read snapshot {}", self.path.display())
                })
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(path = %self.path.display(), "discarding unreadable snapshot: {err}");
                Ok(None)
            }
        }
    }

    async fn store(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("failed to write snapshot {}", self.path.display()))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove snapshot {}", self.path.display())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Holding, HoldingKind};
    use chrono::Utc;

    #[tokio::test]
    async fn round_trips_a_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("snapshot.json"));

        assert!(store.load().await.unwrap().is_none());

        let snapshot = Snapshot {
            holdings: vec![Holding::new("ETH", 2.0, "w", HoldingKind::Onchain)],
            timestamp: Utc::now(),
        };
        store.store(&snapshot).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.holdings, snapshot.holdings);
        assert_eq!(loaded.timestamp, snapshot.timestamp);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = JsonFileStore::new(path);
        assert!(store.load().await.unwrap().is_none());
    }
}
