// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging setup and collaborator doubles for tests.
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use purgelog_core::{
    DocumentId, PermissionSignature, PurgeEvent, ReplicationId, Roles, SeqNum, SubjectId,
};
use purgelog_store::Transaction;
use purgelog_store::checkpoints::CheckpointStore;
use purgelog_store::purge_log::PurgeLogStore;
use thiserror::Error;

use crate::auth::{DocumentIndex, PermissionProvider};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Error raised by collaborator doubles.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0} unavailable")]
pub struct Unavailable(pub &'static str);

/// Permission provider which always fails.
#[derive(Clone, Debug, Default)]
pub struct FailingPermissions;

impl PermissionProvider for FailingPermissions {
    type Error = Unavailable;

    async fn subjects(&self, _roles: &Roles) -> Result<BTreeSet<SubjectId>, Self::Error> {
        Err(Unavailable("permission data"))
    }
}

/// Document index which always fails.
#[derive(Clone, Debug, Default)]
pub struct FailingDocumentIndex;

impl DocumentIndex for FailingDocumentIndex {
    type Error = Unavailable;

    async fn documents(
        &self,
        _subject_ids: &BTreeSet<SubjectId>,
        _include_tombstones: bool,
    ) -> Result<BTreeSet<DocumentId>, Self::Error> {
        Err(Unavailable("document index"))
    }
}

/// Document index which answers with a fixed set of ids and remembers how it was asked.
#[derive(Clone, Debug, Default)]
pub struct FixedDocumentIndex {
    documents: BTreeSet<DocumentId>,
    calls: Arc<AtomicUsize>,
    included_tombstones: Arc<AtomicBool>,
}

impl FixedDocumentIndex {
    pub fn new<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DocumentId>,
    {
        Self {
            documents: documents.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn included_tombstones(&self) -> bool {
        self.included_tombstones.load(Ordering::SeqCst)
    }
}

impl DocumentIndex for FixedDocumentIndex {
    type Error = Unavailable;

    async fn documents(
        &self,
        _subject_ids: &BTreeSet<SubjectId>,
        include_tombstones: bool,
    ) -> Result<BTreeSet<DocumentId>, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.included_tombstones
            .store(include_tombstones, Ordering::SeqCst);
        Ok(self.documents.clone())
    }
}

/// Scan request as it reached the purge log storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanCall {
    pub signature: PermissionSignature,
    pub after: SeqNum,
    pub limit: Option<usize>,
}

#[derive(Debug, Default)]
struct ObserverState {
    scans: std::sync::Mutex<Vec<ScanCall>>,
    checkpoint_reads: AtomicUsize,
    checkpoint_writes: AtomicUsize,
    appends: AtomicUsize,
    fail_scans: AtomicBool,
    fail_checkpoints: AtomicBool,
    append_budget: std::sync::Mutex<Option<usize>>,
    delay: std::sync::Mutex<Option<Duration>>,
}

/// Wraps a store, records every call made into it and can be told to fail or stall.
#[derive(Clone, Debug)]
pub struct ObservedStore<S> {
    inner: S,
    state: Arc<ObserverState>,
}

impl<S> ObservedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            state: Arc::default(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn scans(&self) -> Vec<ScanCall> {
        self.state.scans.lock().expect("lock not poisoned").clone()
    }

    pub fn checkpoint_reads(&self) -> usize {
        self.state.checkpoint_reads.load(Ordering::SeqCst)
    }

    pub fn checkpoint_writes(&self) -> usize {
        self.state.checkpoint_writes.load(Ordering::SeqCst)
    }

    pub fn appends(&self) -> usize {
        self.state.appends.load(Ordering::SeqCst)
    }

    pub fn fail_scans(&self, fail: bool) {
        self.state.fail_scans.store(fail, Ordering::SeqCst);
    }

    pub fn fail_checkpoints(&self, fail: bool) {
        self.state.fail_checkpoints.store(fail, Ordering::SeqCst);
    }

    /// Let the given number of appends through, fail every one after. `None` lifts the limit.
    pub fn fail_appends_after(&self, budget: Option<usize>) {
        *self.state.append_budget.lock().expect("lock not poisoned") = budget;
    }

    /// Stall every storage call for the given duration before answering.
    pub fn delay(&self, delay: Option<Duration>) {
        *self.state.delay.lock().expect("lock not poisoned") = delay;
    }

    async fn stall(&self) {
        let delay = *self.state.delay.lock().expect("lock not poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Error raised by an `ObservedStore`, either injected or coming from the wrapped store.
#[derive(Debug, Error)]
pub enum ObservedStoreError {
    #[error(transparent)]
    Injected(#[from] Unavailable),

    #[error("wrapped store failed: {0}")]
    Inner(String),
}

impl<S> PurgeLogStore for ObservedStore<S>
where
    S: PurgeLogStore,
{
    type Error = ObservedStoreError;

    async fn append_purge(
        &self,
        signature: &PermissionSignature,
        document_id: &DocumentId,
    ) -> Result<PurgeEvent, Self::Error> {
        self.stall().await;
        self.state.appends.fetch_add(1, Ordering::SeqCst);
        {
            let mut budget = self.state.append_budget.lock().expect("lock not poisoned");
            match budget.as_mut() {
                Some(0) => return Err(Unavailable("purge log").into()),
                Some(remaining) => *remaining -= 1,
                None => (),
            }
        }
        self.inner
            .append_purge(signature, document_id)
            .await
            .map_err(|err| ObservedStoreError::Inner(err.to_string()))
    }

    async fn scan(
        &self,
        signature: &PermissionSignature,
        after: SeqNum,
        limit: Option<usize>,
    ) -> Result<Vec<PurgeEvent>, Self::Error> {
        self.stall().await;
        self.state
            .scans
            .lock()
            .expect("lock not poisoned")
            .push(ScanCall {
                signature: *signature,
                after,
                limit,
            });
        if self.state.fail_scans.load(Ordering::SeqCst) {
            return Err(Unavailable("purge log").into());
        }
        self.inner
            .scan(signature, after, limit)
            .await
            .map_err(|err| ObservedStoreError::Inner(err.to_string()))
    }

    async fn latest_seq(
        &self,
        signature: &PermissionSignature,
    ) -> Result<Option<SeqNum>, Self::Error> {
        self.stall().await;
        if self.state.fail_scans.load(Ordering::SeqCst) {
            return Err(Unavailable("purge log").into());
        }
        self.inner
            .latest_seq(signature)
            .await
            .map_err(|err| ObservedStoreError::Inner(err.to_string()))
    }
}

impl<S> CheckpointStore for ObservedStore<S>
where
    S: CheckpointStore,
{
    type Error = ObservedStoreError;

    async fn get_checkpoint(
        &self,
        signature: &PermissionSignature,
        replication_id: &ReplicationId,
    ) -> Result<Option<SeqNum>, Self::Error> {
        self.stall().await;
        self.state.checkpoint_reads.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_checkpoints.load(Ordering::SeqCst) {
            return Err(Unavailable("checkpoint store").into());
        }
        self.inner
            .get_checkpoint(signature, replication_id)
            .await
            .map_err(|err| ObservedStoreError::Inner(err.to_string()))
    }

    async fn set_checkpoint(
        &self,
        signature: &PermissionSignature,
        replication_id: &ReplicationId,
        seq: SeqNum,
    ) -> Result<(), Self::Error> {
        self.stall().await;
        self.state.checkpoint_writes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_checkpoints.load(Ordering::SeqCst) {
            return Err(Unavailable("checkpoint store").into());
        }
        self.inner
            .set_checkpoint(signature, replication_id, seq)
            .await
            .map_err(|err| ObservedStoreError::Inner(err.to_string()))
    }
}

impl<S> Transaction for ObservedStore<S>
where
    S: Transaction,
{
    type Error = ObservedStoreError;

    type Permit = S::Permit;

    async fn begin(&self) -> Result<Self::Permit, Self::Error> {
        self.inner
            .begin()
            .await
            .map_err(|err| ObservedStoreError::Inner(err.to_string()))
    }

    async fn rollback(&self, permit: Self::Permit) -> Result<(), Self::Error> {
        self.inner
            .rollback(permit)
            .await
            .map_err(|err| ObservedStoreError::Inner(err.to_string()))
    }

    async fn commit(&self, permit: Self::Permit) -> Result<(), Self::Error> {
        self.inner
            .commit(permit)
            .await
            .map_err(|err| ObservedStoreError::Inner(err.to_string()))
    }
}
