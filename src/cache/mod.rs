//! Aggregation snapshot caching with TTL expiry.

pub mod fx;
pub mod json_file;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::models::Holding;

pub use fx::FxRateCache;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// A fully priced aggregation result plus when it was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub holdings: Vec<Holding>,
    pub timestamp: DateTime<Utc>,
}

/// Where snapshots live. One store keeps them in memory, another on
/// disk so a restart can serve the last snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<Snapshot>>;
    async fn store(&self, snapshot: &Snapshot) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// TTL gate in front of a [`SnapshotStore`].
pub struct SnapshotCache {
    store: Arc<dyn SnapshotStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn SnapshotStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, ttl, clock }
    }

    /// The cached snapshot, if one exists and is still fresh. An expired
    /// snapshot is purged on read so a later crash cannot resurrect it.
    pub async fn get(&self) -> Result<Option<Snapshot>> {
        let Some(snapshot) = self.store.load().await? else {
            return Ok(None);
        };
        let age = self
            .clock
            .now()
            .signed_duration_since(snapshot.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        // Freshness is strict: a snapshot exactly as old as the TTL is
        // already expired.
        if age >= self.ttl {
            debug!(age_secs = age.as_secs(), "snapshot expired, purging");
            self.store.clear().await?;
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    pub async fn set(&self, holdings: Vec<Holding>) -> Result<Snapshot> {
        let snapshot = Snapshot {
            holdings,
            timestamp: self.clock.now(),
        };
        self.store.store(&snapshot).await?;
        Ok(snapshot)
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }
}
