// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission-scoped purge notifications for offline-first replicating clients.
//!
//! Documents which are permanently removed from the server ("purged") also need to disappear from
//! every client holding a local replica. Clients can't detect this on their own, so purges are
//! recorded in an append-only log, partitioned by the permission signature of the role sets which
//! could see the purged documents. Clients fetch the purged ids visible to them and acknowledge
//! the position they processed, the next fetch resumes after it.
//!
//! ```text
//!  client                          PurgeService
//!    │  get_purged_docs(identity) ──▶ build_context ─▶ resolve ─▶ purged_since
//!    │ ◀── { purged_ids, last_seq }
//!    │  (remove documents locally)
//!    │  checkpoint(identity, id, seq) ─▶ write_checkpoint
//!    │ ◀── { success: true }
//! ```
//!
//! Purge events are written through [`PurgeService::record_purges`] by whatever removes documents
//! from the server.
//!
//! ## Example
//!
//! ```rust
//! # use std::collections::BTreeSet;
//! # use purgelog::{Config, PurgeService};
//! # use purgelog::auth::memory::{MemoryDocumentIndex, StaticPermissions};
//! # use purgelog_core::{DocumentId, Identity, Roles};
//! # use purgelog_store::MemoryStore;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let permissions = StaticPermissions::new().grant("chw", ["district-1"]);
//! let documents = MemoryDocumentIndex::new();
//! documents.insert("district-1", "patient-42").await;
//!
//! let service = PurgeService::new(permissions, documents, MemoryStore::new(), Config::default());
//! service
//!     .record_purges(&[Roles::from(["chw"])], &BTreeSet::from([DocumentId::from("patient-42")]))
//!     .await
//!     .unwrap();
//!
//! let identity = Identity::new("mary", ["chw"]);
//! let purged = service
//!     .get_purged_docs(&identity, Some("phone-1"), None)
//!     .await
//!     .unwrap();
//! assert_eq!(purged.purged_ids, vec![DocumentId::from("patient-42")]);
//!
//! let seq = purged.last_seq.to_string();
//! let ack = service
//!     .checkpoint(&identity, Some("phone-1"), Some(seq.as_str()))
//!     .await
//!     .unwrap();
//! assert!(ack.success);
//! # }
//! ```
pub mod auth;
mod checkpoint;
mod config;
mod error;
pub mod purged;
mod record;
mod service;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use checkpoint::{CheckpointAck, read_checkpoint, write_checkpoint};
pub use config::Config;
pub use error::{
    AuthorizationError, BoxedError, CheckpointWriteError, ClientInputError, LogQueryError,
    PurgeError, PurgeRecordError, ResolutionError,
};
pub use purged::{PurgedDocs, PurgedSinceOptions};
pub use record::record_purges;
pub use service::PurgeService;

/// Header a transport layer reads the replication id of a client from.
pub const REPLICATION_ID_HEADER: &str = "purgelog-replication-id";
