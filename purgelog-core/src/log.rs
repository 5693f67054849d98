// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::identity::PermissionSignature;
use crate::ids::{DocumentId, ReplicationId};

/// Position in the purge log.
///
/// Sequence numbers are assigned by the log on append, are unique across all permission
/// signatures and are never reused.
pub type SeqNum = u64;

/// Sequence number preceding every event in the log. The first appended event receives `1`.
pub const GENESIS: SeqNum = 0;

/// Highest sequence number every storage backend can represent (SQLite integers are signed).
pub const MAX_SEQ: SeqNum = i64::MAX as SeqNum;

/// Immutable record of one document's removal, visible to one permission signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurgeEvent {
    pub document_id: DocumentId,
    pub signature: PermissionSignature,
    pub seq: SeqNum,
}

/// Last acknowledged position of one replicating client within one permission signature's
/// partition of the purge log.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint {
    pub signature: PermissionSignature,
    pub replication_id: ReplicationId,
    pub last_seq: SeqNum,
}
