// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data-types shared by the purge log, its storage backends and the replication-facing service.
//!
//! Purge visibility is partitioned by [`PermissionSignature`], a digest of the role set of the
//! calling [`Identity`]. Every [`PurgeEvent`] belongs to exactly one signature and carries a
//! globally unique, monotonically increasing [`SeqNum`]. Replicating clients keep a
//! [`Checkpoint`] per signature, pointing at the last sequence they acknowledged.
pub mod hash;
pub mod identity;
pub mod ids;
pub mod log;
mod serde;

pub use hash::{Hash, HashError};
pub use identity::{Identity, PermissionSignature, Roles};
pub use ids::{DocumentId, ReplicationId, ReplicationIdError, SubjectId};
pub use log::{Checkpoint, GENESIS, MAX_SEQ, PurgeEvent, SeqNum};
