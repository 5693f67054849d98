// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for purge logs and replication checkpoints.
//!
//! Two independent interfaces are offered:
//!
//! - [`PurgeLogStore`](purge_log::PurgeLogStore): append-only log of purge events partitioned by
//!   permission signature, with a single authority handing out sequence numbers.
//! - [`CheckpointStore`](checkpoints::CheckpointStore): last acknowledged position per
//!   (permission signature, replication id) pair.
//!
//! Both are implemented for an in-memory store (`MemoryStore`, feature `memory`) and a SQLite
//! store (`SqliteStore`, feature `sqlite`). Writes go through the [`Transaction`] provider, reads
//! don't.
pub mod checkpoints;
#[cfg(feature = "memory")]
pub mod memory;
pub mod purge_log;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test_utils"))]
mod test_utils;
mod traits;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteError, SqliteStore, SqliteStoreBuilder};
pub use traits::Transaction;
