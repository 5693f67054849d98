// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use purgelog_core::{DocumentId, PermissionSignature, PurgeEvent, SeqNum};

/// Append-only log of purge events, partitioned by permission signature.
///
/// Implementations need to guarantee the following:
///
/// - Sequence numbers are assigned at one serialized point, are unique across all partitions,
///   strictly increase in write order and are never reused.
/// - A scan observes a contiguous prefix of the log: when an event with sequence `n` is visible,
///   every event with a lower sequence is visible as well.
/// - Events are never mutated or removed through this interface.
pub trait PurgeLogStore {
    type Error: Error + Send + Sync + 'static;

    /// Append a purge event for the given document to the partition of the given signature.
    ///
    /// Returns the stored event including its freshly assigned sequence number.
    fn append_purge(
        &self,
        signature: &PermissionSignature,
        document_id: &DocumentId,
    ) -> impl Future<Output = Result<PurgeEvent, Self::Error>>;

    /// Return events of the signature's partition with a sequence strictly greater than `after`,
    /// in ascending order.
    ///
    /// At most `limit` events are returned when a limit is given.
    fn scan(
        &self,
        signature: &PermissionSignature,
        after: SeqNum,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<PurgeEvent>, Self::Error>>;

    /// Sequence of the latest event in the signature's partition, `None` if it is empty.
    fn latest_seq(
        &self,
        signature: &PermissionSignature,
    ) -> impl Future<Output = Result<Option<SeqNum>, Self::Error>>;
}
