// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::error::Error;

use purgelog_core::{DocumentId, SubjectId};
use tracing::debug;

use crate::auth::AuthorizationContext;
use crate::error::{ResolutionError, boxed};

/// Index of documents reachable through access-control subjects.
pub trait DocumentIndex {
    type Error: Error + Send + Sync + 'static;

    /// Return ids of all documents the given subjects reach.
    ///
    /// Soft-deleted (tombstoned) documents are only included when `include_tombstones` is set.
    fn documents(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        include_tombstones: bool,
    ) -> impl Future<Output = Result<BTreeSet<DocumentId>, Self::Error>>;
}

/// Options for resolving allowed document ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Include documents which are deleted but not purged yet.
    ///
    /// Default: `false`.
    pub include_tombstones: bool,
}

impl ResolveOptions {
    pub fn with_tombstones() -> Self {
        Self {
            include_tombstones: true,
        }
    }
}

/// Expand an authorization context into the ids of all documents it may currently observe.
///
/// The result is computed from scratch on every call. `unconditional` ids are part of every
/// result.
pub async fn resolve<D>(
    index: &D,
    context: &AuthorizationContext,
    options: ResolveOptions,
    unconditional: &BTreeSet<DocumentId>,
) -> Result<BTreeSet<DocumentId>, ResolutionError>
where
    D: DocumentIndex,
{
    context.validate()?;

    let mut allowed = index
        .documents(&context.subject_ids, options.include_tombstones)
        .await
        .map_err(|err| ResolutionError::DocumentIndex(boxed(err)))?;
    allowed.extend(unconditional.iter().cloned());

    debug!(
        name = %context.identity.name,
        include_tombstones = options.include_tombstones,
        allowed = allowed.len(),
        "resolved allowed document ids"
    );

    Ok(allowed)
}
