// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::time::Duration;

use purgelog_core::DocumentId;
use serde::{Deserialize, Serialize};

const SCAN_BATCH_SIZE: usize = 256;
const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of a purge service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Limit applied to purge queries which don't carry one.
    ///
    /// Default: `None` (unbounded).
    pub(crate) default_limit: Option<usize>,

    /// Number of purge events fetched from storage per page while scanning a partition.
    ///
    /// Default: 256.
    pub(crate) scan_batch_size: usize,

    /// Upper bound for every call into storage. Calls exceeding it fail instead of waiting.
    ///
    /// Default: 5 seconds.
    pub(crate) store_timeout: Duration,

    /// Documents every identity is allowed to see, independent of its roles.
    ///
    /// Default: empty.
    pub(crate) unconditional_doc_ids: BTreeSet<DocumentId>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the limit applied to purge queries which don't carry one.
    pub fn default_limit(mut self, limit: Option<usize>) -> Self {
        self.default_limit = limit;
        self
    }

    /// Define the number of events fetched per storage page, at least one.
    pub fn scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size.max(1);
        self
    }

    /// Define the upper bound for every call into storage.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Add a document every identity is allowed to see.
    pub fn unconditional_doc_id(mut self, document_id: impl Into<DocumentId>) -> Self {
        self.unconditional_doc_ids.insert(document_id.into());
        self
    }

    pub fn unconditional_doc_ids(&self) -> &BTreeSet<DocumentId> {
        &self.unconditional_doc_ids
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_limit: None,
            scan_batch_size: SCAN_BATCH_SIZE,
            store_timeout: STORE_TIMEOUT,
            unconditional_doc_ids: BTreeSet::new(),
        }
    }
}
