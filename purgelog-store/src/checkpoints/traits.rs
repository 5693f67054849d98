// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use purgelog_core::{PermissionSignature, ReplicationId, SeqNum};

/// Key-value store for the last acknowledged purge log position of every replicating client.
///
/// Checkpoints are keyed by the pair of permission signature and replication id, no two pairs
/// share a record. Writes are unconditional upserts (last writer wins): a client may move its
/// checkpoint backwards to replay purges after a local failure.
pub trait CheckpointStore {
    type Error: Error + Send + Sync + 'static;

    /// Get the last acknowledged sequence for this pair, `None` if it never checkpointed.
    fn get_checkpoint(
        &self,
        signature: &PermissionSignature,
        replication_id: &ReplicationId,
    ) -> impl Future<Output = Result<Option<SeqNum>, Self::Error>>;

    /// Insert or overwrite the checkpoint for this pair.
    fn set_checkpoint(
        &self,
        signature: &PermissionSignature,
        replication_id: &ReplicationId,
        seq: SeqNum,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}
