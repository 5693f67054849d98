// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use crate::checkpoints::CheckpointMemoryStore;
use crate::purge_log::PurgeLogMemoryStore;
use crate::traits::Transaction;

/// In-memory store.
///
/// This does not persist data permamently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
///
/// Cloned instances share the same underlying state.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pub purge_log: PurgeLogMemoryStore,
    pub checkpoints: CheckpointMemoryStore,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// Trait implementations are in the regarding modules, see for example `purge_log` or
// `checkpoints`.

/// Every write to the in-memory store is applied immediately, transactions only exist to offer the
/// same interface as persistent backends.
impl Transaction for MemoryStore {
    type Error = Infallible;

    type Permit = ();

    async fn begin(&self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn rollback(&self, _permit: ()) -> Result<(), Infallible> {
        Ok(())
    }

    async fn commit(&self, _permit: ()) -> Result<(), Infallible> {
        Ok(())
    }
}
