// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording purges for every role set which could observe the purged documents.
use std::collections::BTreeSet;

use purgelog_core::{DocumentId, Identity, PurgeEvent, Roles};
use purgelog_store::Transaction;
use purgelog_store::purge_log::PurgeLogStore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::auth::{DocumentIndex, PermissionProvider, ResolveOptions, build_context, resolve};
use crate::config::Config;
use crate::error::{PurgeRecordError, boxed};

/// Name of the identity purges are resolved on behalf of.
const RECORDING_IDENTITY: &str = "purgelog";

/// Append one purge event per (purged document, role set) pair where the role set can see the
/// document.
///
/// Role sets with the same signature are handled once. Documents are resolved including
/// tombstones, as a document is usually soft-deleted before it gets purged. All events are
/// appended in one transaction, when any append fails nothing is recorded.
pub async fn record_purges<P, D, S>(
    permissions: &P,
    documents: &D,
    store: &S,
    config: &Config,
    role_sets: &[Roles],
    doc_ids: &BTreeSet<DocumentId>,
) -> Result<Vec<PurgeEvent>, PurgeRecordError>
where
    P: PermissionProvider,
    D: DocumentIndex,
    S: PurgeLogStore + Transaction,
{
    // Equal role sets have equal signatures.
    let role_sets: BTreeSet<&Roles> = role_sets.iter().collect();

    let mut pending = Vec::new();
    for roles in role_sets {
        let identity = Identity::new(RECORDING_IDENTITY, roles.clone());
        let context = build_context(permissions, &identity).await?;
        let visible = resolve(
            documents,
            &context,
            ResolveOptions::with_tombstones(),
            config.unconditional_doc_ids(),
        )
        .await?;

        let signature = roles.signature();
        pending.extend(
            doc_ids
                .iter()
                .filter(|document_id| visible.contains(*document_id))
                .map(|document_id| (signature, document_id)),
        );
    }

    if pending.is_empty() {
        debug!(documents = doc_ids.len(), "no role set observes purged documents");
        return Ok(Vec::new());
    }

    let permit = timeout(config.store_timeout, store.begin())
        .await
        .map_err(|_| PurgeRecordError::Timeout(config.store_timeout))?
        .map_err(|err| PurgeRecordError::Store(boxed(err)))?;

    let mut events = Vec::with_capacity(pending.len());
    for (signature, document_id) in pending {
        let result = match timeout(
            config.store_timeout,
            store.append_purge(&signature, document_id),
        )
        .await
        {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(err)) => Err(PurgeRecordError::Store(boxed(err))),
            Err(_) => Err(PurgeRecordError::Timeout(config.store_timeout)),
        };

        match result {
            Ok(event) => events.push(event),
            Err(err) => {
                if let Err(rollback_err) = store.rollback(permit).await {
                    warn!("rolling back purge events failed: {rollback_err}");
                }
                return Err(err);
            }
        }
    }

    timeout(config.store_timeout, store.commit(permit))
        .await
        .map_err(|_| PurgeRecordError::Timeout(config.store_timeout))?
        .map_err(|err| PurgeRecordError::Store(boxed(err)))?;

    debug!(
        documents = doc_ids.len(),
        events = events.len(),
        "recorded purge events"
    );

    Ok(events)
}
