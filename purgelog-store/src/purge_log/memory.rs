// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::ops::Bound;
use std::sync::Arc;

use purgelog_core::{DocumentId, PermissionSignature, PurgeEvent, SeqNum};
use tokio::sync::RwLock;

use crate::memory::MemoryStore;
use crate::purge_log::PurgeLogStore;

#[derive(Debug, Default)]
struct PurgeLogState {
    /// Sequence of the last appended event across all partitions.
    tail: SeqNum,
    partitions: HashMap<PermissionSignature, BTreeMap<SeqNum, DocumentId>>,
}

/// In-memory purge log.
///
/// Appends take the write lock, assign the next sequence from a single counter and insert the
/// event before releasing it again. Readers share the read lock and therefore always observe a
/// contiguous prefix of the log.
#[derive(Clone, Debug, Default)]
pub struct PurgeLogMemoryStore {
    inner: Arc<RwLock<PurgeLogState>>,
}

impl PurgeLogMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PurgeLogStore for MemoryStore {
    type Error = Infallible;

    async fn append_purge(
        &self,
        signature: &PermissionSignature,
        document_id: &DocumentId,
    ) -> Result<PurgeEvent, Self::Error> {
        let mut state = self.purge_log.inner.write().await;

        state.tail += 1;
        let seq = state.tail;

        state
            .partitions
            .entry(*signature)
            .or_default()
            .insert(seq, document_id.to_owned());

        Ok(PurgeEvent {
            document_id: document_id.to_owned(),
            signature: *signature,
            seq,
        })
    }

    async fn scan(
        &self,
        signature: &PermissionSignature,
        after: SeqNum,
        limit: Option<usize>,
    ) -> Result<Vec<PurgeEvent>, Self::Error> {
        let state = self.purge_log.inner.read().await;

        let Some(partition) = state.partitions.get(signature) else {
            return Ok(Vec::new());
        };

        let events = partition
            .range((Bound::Excluded(after), Bound::Unbounded))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(seq, document_id)| PurgeEvent {
                document_id: document_id.to_owned(),
                signature: *signature,
                seq: *seq,
            })
            .collect();

        Ok(events)
    }

    async fn latest_seq(
        &self,
        signature: &PermissionSignature,
    ) -> Result<Option<SeqNum>, Self::Error> {
        let state = self.purge_log.inner.read().await;
        Ok(state
            .partitions
            .get(signature)
            .and_then(|partition| partition.last_key_value())
            .map(|(seq, _)| *seq))
    }
}
