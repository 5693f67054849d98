// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory permission data and document index.
//!
//! Useful for tests, development and deployments where the role table is static configuration.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::convert::Infallible;
use std::sync::Arc;

use purgelog_core::{DocumentId, Roles, SubjectId};
use tokio::sync::RwLock;

use crate::auth::{DocumentIndex, PermissionProvider};

/// Fixed table of which subjects every role grants.
#[derive(Clone, Debug, Default)]
pub struct StaticPermissions {
    grants: HashMap<String, BTreeSet<SubjectId>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role access to the given subjects, in addition to earlier grants.
    pub fn grant<I, S>(mut self, role: impl Into<String>, subject_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SubjectId>,
    {
        self.grants
            .entry(role.into())
            .or_default()
            .extend(subject_ids.into_iter().map(Into::into));
        self
    }
}

impl PermissionProvider for StaticPermissions {
    type Error = Infallible;

    async fn subjects(&self, roles: &Roles) -> Result<BTreeSet<SubjectId>, Self::Error> {
        Ok(roles
            .iter()
            .filter_map(|role| self.grants.get(role))
            .flatten()
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct DocumentIndexState {
    documents: HashMap<SubjectId, BTreeSet<DocumentId>>,
    tombstones: HashSet<DocumentId>,
}

/// Mutable mapping of subjects to documents with soft-delete markers.
///
/// Cloned instances share the same state.
#[derive(Clone, Debug, Default)]
pub struct MemoryDocumentIndex {
    inner: Arc<RwLock<DocumentIndexState>>,
}

impl MemoryDocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a document reachable through a subject.
    pub async fn insert(&self, subject_id: impl Into<SubjectId>, document_id: impl Into<DocumentId>) {
        self.inner
            .write()
            .await
            .documents
            .entry(subject_id.into())
            .or_default()
            .insert(document_id.into());
    }

    /// Soft-delete a document. It stays reachable, but only when tombstones are requested.
    pub async fn tombstone(&self, document_id: impl Into<DocumentId>) {
        self.inner.write().await.tombstones.insert(document_id.into());
    }

    /// Remove every trace of a document, as after a purge.
    pub async fn remove(&self, document_id: &DocumentId) {
        let mut state = self.inner.write().await;
        for documents in state.documents.values_mut() {
            documents.remove(document_id);
        }
        state.tombstones.remove(document_id);
    }
}

impl DocumentIndex for MemoryDocumentIndex {
    type Error = Infallible;

    async fn documents(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        include_tombstones: bool,
    ) -> Result<BTreeSet<DocumentId>, Self::Error> {
        let state = self.inner.read().await;
        Ok(subject_ids
            .iter()
            .filter_map(|subject_id| state.documents.get(subject_id))
            .flatten()
            .filter(|document_id| include_tombstones || !state.tombstones.contains(*document_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use purgelog_core::{DocumentId, Roles, SubjectId};

    use super::{MemoryDocumentIndex, StaticPermissions};
    use crate::auth::{DocumentIndex, PermissionProvider};

    #[tokio::test]
    async fn union_of_role_grants() {
        let permissions = StaticPermissions::new()
            .grant("chw", ["district-1"])
            .grant("supervisor", ["district-1", "district-2"])
            .grant("chw", ["clinic-7"]);

        let subjects = permissions
            .subjects(&Roles::from(["chw", "supervisor", "unknown"]))
            .await
            .unwrap();
        assert_eq!(
            subjects,
            BTreeSet::from([
                SubjectId::from("clinic-7"),
                SubjectId::from("district-1"),
                SubjectId::from("district-2"),
            ])
        );

        assert!(permissions.subjects(&Roles::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tombstones_are_opt_in() {
        let index = MemoryDocumentIndex::new();
        index.insert("district-1", "a").await;
        index.insert("district-1", "b").await;
        index.insert("district-2", "c").await;
        index.tombstone("b").await;

        let subjects = BTreeSet::from([SubjectId::from("district-1")]);
        assert_eq!(
            index.documents(&subjects, false).await.unwrap(),
            BTreeSet::from([DocumentId::from("a")])
        );
        assert_eq!(
            index.documents(&subjects, true).await.unwrap(),
            BTreeSet::from([DocumentId::from("a"), DocumentId::from("b")])
        );

        index.remove(&DocumentId::from("b")).await;
        assert_eq!(
            index.documents(&subjects, true).await.unwrap(),
            BTreeSet::from([DocumentId::from("a")])
        );
    }
}
