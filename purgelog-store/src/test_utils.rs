// SPDX-License-Identifier: MIT OR Apache-2.0

/// Macro to run the same test logic against all store backend implementations.
///
/// This macro takes a closure that will be executed against each store type:
/// - In-memory store (`MemoryStore`)
/// - SQLite store (`SqliteStore`)
///
/// Writes need to be wrapped in a transaction (`begin` and `commit`) by the test body itself, the
/// SQLite store uses a single connection and reads block while a transaction is held.
///
/// ## Example
///
/// ```rust
/// # use purgelog_core::{DocumentId, Roles};
/// # use purgelog_store::assert_all_stores;
/// # use purgelog_store::purge_log::PurgeLogStore;
/// # use purgelog_store::Transaction;
/// # async fn run() {
/// assert_all_stores!(|store| async {
///     let signature = Roles::from(["role1"]).signature();
///
///     let permit = store.begin().await.unwrap();
///     store.append_purge(&signature, &DocumentId::from("a")).await.unwrap();
///     store.commit(permit).await.unwrap();
///
///     assert_eq!(store.latest_seq(&signature).await.unwrap(), Some(1));
/// });
/// # }
/// ```
#[macro_export]
macro_rules! assert_all_stores {
    (|$store:ident| $test_body:expr) => {
        // Test with MemoryStore.
        {
            let $store = $crate::memory::MemoryStore::default();
            $test_body.await;
        }

        // Test with SqliteStore.
        {
            let $store = $crate::sqlite::SqliteStore::temporary().await;
            $test_body.await;
        }
    };
}
