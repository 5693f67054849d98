// SPDX-License-Identifier: MIT OR Apache-2.0

//! Acknowledging positions in the purge log.
use purgelog_core::{Checkpoint, ReplicationId, Roles, SeqNum};
use purgelog_store::Transaction;
use purgelog_store::checkpoints::CheckpointStore;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CheckpointWriteError, LogQueryError, boxed};

/// Answer to an acknowledged checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointAck {
    pub success: bool,
}

impl CheckpointAck {
    pub fn success() -> Self {
        Self { success: true }
    }
}

/// Persist `seq` as the last acknowledged position of a replica for the signature of `roles`.
///
/// Overwrites any earlier checkpoint, including one with a higher sequence. Writing the same
/// checkpoint again is a no-op.
pub async fn write_checkpoint<S>(
    store: &S,
    config: &Config,
    roles: &Roles,
    replication_id: &ReplicationId,
    seq: SeqNum,
) -> Result<(), CheckpointWriteError>
where
    S: CheckpointStore + Transaction,
{
    let signature = roles.signature();

    let permit = timeout(config.store_timeout, store.begin())
        .await
        .map_err(|_| CheckpointWriteError::Timeout(config.store_timeout))?
        .map_err(|err| CheckpointWriteError::Store(boxed(err)))?;

    let result = match timeout(
        config.store_timeout,
        store.set_checkpoint(&signature, replication_id, seq),
    )
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(CheckpointWriteError::Store(boxed(err))),
        Err(_) => Err(CheckpointWriteError::Timeout(config.store_timeout)),
    };

    if let Err(err) = result {
        if let Err(rollback_err) = store.rollback(permit).await {
            warn!(
                %signature,
                %replication_id,
                "rolling back checkpoint write failed: {rollback_err}"
            );
        }
        return Err(err);
    }

    timeout(config.store_timeout, store.commit(permit))
        .await
        .map_err(|_| CheckpointWriteError::Timeout(config.store_timeout))?
        .map_err(|err| CheckpointWriteError::Store(boxed(err)))?;

    debug!(%signature, %replication_id, seq, "wrote checkpoint");

    Ok(())
}

/// Last acknowledged position of a replica for the signature of `roles`, if it ever acknowledged
/// one.
pub async fn read_checkpoint<S>(
    store: &S,
    config: &Config,
    roles: &Roles,
    replication_id: &ReplicationId,
) -> Result<Option<Checkpoint>, LogQueryError>
where
    S: CheckpointStore,
{
    let signature = roles.signature();
    let last_seq = timeout(
        config.store_timeout,
        store.get_checkpoint(&signature, replication_id),
    )
    .await
    .map_err(|_| LogQueryError::Timeout(config.store_timeout))?
    .map_err(|err| LogQueryError::Store(boxed(err)))?;

    Ok(last_seq.map(|last_seq| Checkpoint {
        signature,
        replication_id: replication_id.to_owned(),
        last_seq,
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use purgelog_core::{Checkpoint, ReplicationId, Roles};
    use purgelog_store::checkpoints::CheckpointStore;
    use purgelog_store::{MemoryStore, SqliteStore};

    use super::{CheckpointAck, read_checkpoint, write_checkpoint};
    use crate::config::Config;
    use crate::error::CheckpointWriteError;
    use crate::test_utils::{ObservedStore, setup_logging};

    #[tokio::test]
    async fn upsert_and_overwrite() {
        setup_logging();

        let store = SqliteStore::temporary().await;
        let config = Config::default();
        let roles = Roles::from(["role1", "role2"]);
        let replication_id = ReplicationId::new("localDbId").unwrap();

        write_checkpoint(&store, &config, &roles, &replication_id, 123)
            .await
            .unwrap();
        write_checkpoint(&store, &config, &roles, &replication_id, 123)
            .await
            .unwrap();
        assert_eq!(
            store
                .get_checkpoint(&Roles::from(["role2", "role1"]).signature(), &replication_id)
                .await
                .unwrap(),
            Some(123)
        );

        // Lower sequences are accepted.
        write_checkpoint(&store, &config, &roles, &replication_id, 7)
            .await
            .unwrap();
        assert_eq!(
            store
                .get_checkpoint(&roles.signature(), &replication_id)
                .await
                .unwrap(),
            Some(7)
        );
    }

    #[tokio::test]
    async fn storage_failure_is_not_acknowledged() {
        let store = ObservedStore::new(MemoryStore::new());
        let roles = Roles::from(["chw"]);
        let replication_id = ReplicationId::new("phone-1").unwrap();
        store.fail_checkpoints(true);

        let result =
            write_checkpoint(&store, &Config::default(), &roles, &replication_id, 5).await;
        assert!(matches!(result, Err(CheckpointWriteError::Store(_))));

        // Retrying is safe.
        store.fail_checkpoints(false);
        write_checkpoint(&store, &Config::default(), &roles, &replication_id, 5)
            .await
            .unwrap();
        assert_eq!(
            store
                .inner()
                .get_checkpoint(&roles.signature(), &replication_id)
                .await
                .unwrap(),
            Some(5)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_storage_times_out() {
        let store = ObservedStore::new(MemoryStore::new());
        store.delay(Some(Duration::from_secs(60)));

        let config = Config::new().store_timeout(Duration::from_millis(500));
        let result = write_checkpoint(
            &store,
            &config,
            &Roles::from(["chw"]),
            &ReplicationId::new("phone-1").unwrap(),
            1,
        )
        .await;
        assert!(matches!(result, Err(CheckpointWriteError::Timeout(_))));
    }

    #[tokio::test]
    async fn read_back() {
        let store = MemoryStore::new();
        let config = Config::default();
        let roles = Roles::from(["chw"]);
        let replication_id = ReplicationId::new("phone-1").unwrap();

        assert_eq!(
            read_checkpoint(&store, &config, &roles, &replication_id)
                .await
                .unwrap(),
            None
        );

        write_checkpoint(&store, &config, &roles, &replication_id, 9)
            .await
            .unwrap();
        assert_eq!(
            read_checkpoint(&store, &config, &roles, &replication_id)
                .await
                .unwrap(),
            Some(Checkpoint {
                signature: roles.signature(),
                replication_id,
                last_seq: 9,
            })
        );
    }

    #[test]
    fn ack_shape() {
        assert_eq!(
            serde_json::to_string(&CheckpointAck::success()).unwrap(),
            r#"{"success":true}"#
        );
    }
}
