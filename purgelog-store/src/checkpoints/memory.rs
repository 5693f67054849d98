// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use purgelog_core::{PermissionSignature, ReplicationId, SeqNum};
use tokio::sync::{Mutex, RwLock};

use crate::checkpoints::CheckpointStore;
use crate::memory::MemoryStore;

type CheckpointKey = (PermissionSignature, ReplicationId);

/// In-memory checkpoint store with one lock per (signature, replication id) entry.
///
/// The map itself is only locked exclusively when an entry is created for the first time, writes
/// to existing entries and all reads share the map's read lock and only contend on their own
/// entry.
#[derive(Clone, Debug, Default)]
pub struct CheckpointMemoryStore {
    entries: Arc<RwLock<HashMap<CheckpointKey, Arc<Mutex<SeqNum>>>>>,
}

impl CheckpointMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, key: &CheckpointKey) -> Option<Arc<Mutex<SeqNum>>> {
        self.entries.read().await.get(key).cloned()
    }
}

impl CheckpointStore for MemoryStore {
    type Error = Infallible;

    async fn get_checkpoint(
        &self,
        signature: &PermissionSignature,
        replication_id: &ReplicationId,
    ) -> Result<Option<SeqNum>, Self::Error> {
        let key = (*signature, replication_id.to_owned());
        match self.checkpoints.entry(&key).await {
            Some(entry) => Ok(Some(*entry.lock().await)),
            None => Ok(None),
        }
    }

    async fn set_checkpoint(
        &self,
        signature: &PermissionSignature,
        replication_id: &ReplicationId,
        seq: SeqNum,
    ) -> Result<(), Self::Error> {
        let key = (*signature, replication_id.to_owned());

        let entry = match self.checkpoints.entry(&key).await {
            Some(entry) => entry,
            None => {
                let mut entries = self.checkpoints.entries.write().await;
                // Another writer might have created the entry between both locks.
                entries
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(seq)))
                    .clone()
            }
        };

        *entry.lock().await = seq;

        Ok(())
    }
}
