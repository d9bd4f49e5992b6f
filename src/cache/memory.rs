//! In-process snapshot store.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{Snapshot, SnapshotStore};

#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn store(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
