// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-level operations offered to a transport layer.
//!
//! `PurgeService` ties the permission provider, the document index and storage together. The two
//! client-facing operations are [`PurgeService::get_purged_docs`] and
//! [`PurgeService::checkpoint`]. Reading and acknowledging are separate calls, a
//! client acknowledges a position only after it removed the returned documents locally.
#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use purgelog_core::{
    Checkpoint, DocumentId, Identity, MAX_SEQ, PurgeEvent, ReplicationId, Roles, SeqNum,
};
use purgelog_store::Transaction;
use purgelog_store::checkpoints::CheckpointStore;
use purgelog_store::purge_log::PurgeLogStore;
use tracing::{debug, warn};

use crate::auth::{
    AuthorizationContext, DocumentIndex, PermissionProvider, ResolveOptions, validate_identity,
};
use crate::checkpoint::{CheckpointAck, read_checkpoint, write_checkpoint};
use crate::config::Config;
use crate::error::{
    AuthorizationError, CheckpointWriteError, ClientInputError, LogQueryError, PurgeError,
    PurgeRecordError, ResolutionError,
};
use crate::purged::{PurgedDocs, PurgedSinceOptions};
use crate::{auth, purged, record};

/// Permission-scoped purge notifications and checkpoints for replicating clients.
#[derive(Debug)]
pub struct PurgeService<P, D, S> {
    permissions: P,
    documents: D,
    store: S,
    config: Config,
}

impl<P, D, S> PurgeService<P, D, S>
where
    P: PermissionProvider,
    D: DocumentIndex,
    S: PurgeLogStore + CheckpointStore + Transaction,
{
    pub fn new(permissions: P, documents: D, store: S, config: Config) -> Self {
        Self {
            permissions,
            documents,
            store,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Derive the authorization context of an identity.
    pub async fn build_context(
        &self,
        identity: &Identity,
    ) -> Result<AuthorizationContext, AuthorizationError> {
        auth::build_context(&self.permissions, identity).await
    }

    /// Ids of all documents the context may currently observe, including the configured
    /// unconditional ones.
    pub async fn allowed_doc_ids(
        &self,
        context: &AuthorizationContext,
        options: ResolveOptions,
    ) -> Result<BTreeSet<DocumentId>, ResolutionError> {
        auth::resolve(
            &self.documents,
            context,
            options,
            self.config.unconditional_doc_ids(),
        )
        .await
    }

    /// Purged ids visible to `roles` and contained in `allowed`, see [`purged::purged_since`].
    pub async fn purged_since(
        &self,
        roles: &Roles,
        allowed: &BTreeSet<DocumentId>,
        options: PurgedSinceOptions,
    ) -> Result<PurgedDocs, LogQueryError> {
        purged::purged_since(&self.store, &self.config, roles, allowed, options).await
    }

    /// Latest position in the partition of `roles`, `GENESIS` if nothing was purged for it yet.
    pub async fn current_seq(&self, roles: &Roles) -> Result<SeqNum, LogQueryError> {
        purged::current_seq(&self.store, &self.config, roles).await
    }

    /// Persist the acknowledged position of a replica.
    pub async fn write_checkpoint(
        &self,
        roles: &Roles,
        replication_id: &ReplicationId,
        seq: SeqNum,
    ) -> Result<(), CheckpointWriteError> {
        write_checkpoint(&self.store, &self.config, roles, replication_id, seq).await
    }

    /// Last position a replica acknowledged for the signature of `roles`.
    pub async fn read_checkpoint(
        &self,
        roles: &Roles,
        replication_id: &ReplicationId,
    ) -> Result<Option<Checkpoint>, LogQueryError> {
        read_checkpoint(&self.store, &self.config, roles, replication_id).await
    }

    /// Record purged documents for every role set which could observe them.
    ///
    /// Called by whatever removes documents from the system, once per purge batch.
    pub async fn record_purges(
        &self,
        role_sets: &[Roles],
        doc_ids: &BTreeSet<DocumentId>,
    ) -> Result<Vec<PurgeEvent>, PurgeRecordError> {
        let result = record::record_purges(
            &self.permissions,
            &self.documents,
            &self.store,
            &self.config,
            role_sets,
            doc_ids,
        )
        .await;

        if let Err(err) = &result {
            warn!(documents = doc_ids.len(), "recording purges failed: {err}");
        }

        result
    }

    /// Purged documents the identity needs to remove locally.
    ///
    /// Without a replication id the query starts at the beginning of the log. Without a limit the
    /// configured default limit applies.
    pub async fn get_purged_docs(
        &self,
        identity: &Identity,
        replication_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<PurgedDocs, PurgeError> {
        let result = self
            .get_purged_docs_inner(identity, replication_id, limit)
            .await;
        log_result("get_purged_docs", identity, &result);
        result
    }

    async fn get_purged_docs_inner(
        &self,
        identity: &Identity,
        replication_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<PurgedDocs, PurgeError> {
        // An empty header counts as an absent one, the client then reads from the beginning.
        let checkpointer_id = replication_id.and_then(|value| ReplicationId::new(value).ok());

        let limit = match limit.or(self.config.default_limit) {
            Some(0) => return Err(ClientInputError::InvalidLimit.into()),
            limit => limit,
        };

        let context = self.build_context(identity).await?;
        let allowed = self
            .allowed_doc_ids(&context, ResolveOptions::default())
            .await?;

        let purged = self
            .purged_since(
                &identity.roles,
                &allowed,
                PurgedSinceOptions {
                    checkpointer_id,
                    limit,
                },
            )
            .await?;

        Ok(purged)
    }

    /// Acknowledge that a replica removed every purged document up to and including `seq`.
    ///
    /// Replication id and sequence are both required. Malformed input is rejected before storage
    /// is touched.
    pub async fn checkpoint(
        &self,
        identity: &Identity,
        replication_id: Option<&str>,
        seq: Option<&str>,
    ) -> Result<CheckpointAck, PurgeError> {
        let result = self.checkpoint_inner(identity, replication_id, seq).await;
        log_result("checkpoint", identity, &result);
        result
    }

    async fn checkpoint_inner(
        &self,
        identity: &Identity,
        replication_id: Option<&str>,
        seq: Option<&str>,
    ) -> Result<CheckpointAck, PurgeError> {
        let replication_id = replication_id
            .and_then(|value| ReplicationId::new(value).ok())
            .ok_or(ClientInputError::MissingReplicationId)?;
        let seq = parse_seq(seq)?;

        validate_identity(identity)?;

        self.write_checkpoint(&identity.roles, &replication_id, seq)
            .await?;

        Ok(CheckpointAck::success())
    }
}

fn parse_seq(value: Option<&str>) -> Result<SeqNum, ClientInputError> {
    let value = match value.map(str::trim) {
        None | Some("") => return Err(ClientInputError::MissingSeq),
        Some(value) => value,
    };

    match value.parse::<SeqNum>() {
        Ok(seq) if seq <= MAX_SEQ => Ok(seq),
        _ => Err(ClientInputError::InvalidSeq(value.to_owned())),
    }
}

fn log_result<T>(operation: &str, identity: &Identity, result: &Result<T, PurgeError>) {
    match result {
        Ok(_) => debug!(operation, name = %identity.name, "request handled"),
        Err(err) if err.is_client_error() => {
            debug!(operation, name = %identity.name, "rejected request: {err}")
        }
        Err(err) => warn!(operation, name = %identity.name, "request failed: {err}"),
    }
}
