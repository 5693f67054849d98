// SPDX-License-Identifier: MIT OR Apache-2.0

//! Querying the purge log for documents a caller needs to remove locally.
use std::collections::BTreeSet;

use purgelog_core::{DocumentId, GENESIS, ReplicationId, Roles, SeqNum};
use purgelog_store::checkpoints::CheckpointStore;
use purgelog_store::purge_log::PurgeLogStore;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::checkpoint::read_checkpoint;
use crate::config::Config;
use crate::error::{LogQueryError, boxed};

/// Options for querying purged documents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurgedSinceOptions {
    /// Replica whose last acknowledged position is the starting point.
    ///
    /// Default: `None`, start at the beginning of the log.
    pub checkpointer_id: Option<ReplicationId>,

    /// Maximum number of purged ids to return.
    ///
    /// Default: `None` (unbounded).
    pub limit: Option<usize>,
}

impl PurgedSinceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpointer_id(mut self, replication_id: ReplicationId) -> Self {
        self.checkpointer_id = Some(replication_id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Purged document ids together with the position a client acknowledges after removing them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgedDocs {
    pub purged_ids: Vec<DocumentId>,
    pub last_seq: SeqNum,
}

/// Return ids of purged documents visible to `roles` and contained in `allowed`, in log order.
///
/// Events are filtered by `allowed` but every scanned event advances `last_seq`, so acknowledging
/// it skips events which did not match as well. Nothing is written.
pub async fn purged_since<S>(
    store: &S,
    config: &Config,
    roles: &Roles,
    allowed: &BTreeSet<DocumentId>,
    options: PurgedSinceOptions,
) -> Result<PurgedDocs, LogQueryError>
where
    S: PurgeLogStore + CheckpointStore,
{
    let signature = roles.signature();

    let start = match &options.checkpointer_id {
        Some(replication_id) => read_checkpoint(store, config, roles, replication_id)
            .await?
            .map_or(GENESIS, |checkpoint| checkpoint.last_seq),
        None => GENESIS,
    };

    let mut result = PurgedDocs {
        purged_ids: Vec::new(),
        last_seq: start,
    };

    if options.limit == Some(0) {
        return Ok(result);
    }

    // Only the first page is bounded by the limit, events the caller can't see never shrink
    // later pages.
    let mut batch_size = options
        .limit
        .map_or(config.scan_batch_size, |limit| limit.min(config.scan_batch_size));

    loop {
        let page = timeout(
            config.store_timeout,
            store.scan(&signature, result.last_seq, Some(batch_size)),
        )
        .await
        .map_err(|_| LogQueryError::Timeout(config.store_timeout))?
        .map_err(|err| LogQueryError::Store(boxed(err)))?;
        let exhausted = page.len() < batch_size;

        for event in page {
            result.last_seq = event.seq;
            if !allowed.contains(&event.document_id) {
                continue;
            }

            result.purged_ids.push(event.document_id);
            if options.limit == Some(result.purged_ids.len()) {
                debug!(
                    %signature,
                    start,
                    last_seq = result.last_seq,
                    purged = result.purged_ids.len(),
                    "purge query reached its limit"
                );
                return Ok(result);
            }
        }

        if exhausted {
            break;
        }
        batch_size = config.scan_batch_size;
    }

    debug!(
        %signature,
        start,
        last_seq = result.last_seq,
        purged = result.purged_ids.len(),
        "purge query reached end of partition"
    );

    Ok(result)
}

/// Sequence of the latest event visible to `roles`, or `GENESIS` when nothing was purged yet.
pub async fn current_seq<S>(
    store: &S,
    config: &Config,
    roles: &Roles,
) -> Result<SeqNum, LogQueryError>
where
    S: PurgeLogStore,
{
    let latest = timeout(config.store_timeout, store.latest_seq(&roles.signature()))
        .await
        .map_err(|_| LogQueryError::Timeout(config.store_timeout))?
        .map_err(|err| LogQueryError::Store(boxed(err)))?;
    Ok(latest.unwrap_or(GENESIS))
}
