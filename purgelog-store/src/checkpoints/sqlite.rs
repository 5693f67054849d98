// SPDX-License-Identifier: MIT OR Apache-2.0

use purgelog_core::{PermissionSignature, ReplicationId, SeqNum};
use sqlx::{query, query_as};

use crate::checkpoints::CheckpointStore;
use crate::sqlite::{SqliteError, SqliteStore, decode_seq, encode_seq};

impl<'a> CheckpointStore for SqliteStore<'a> {
    type Error = SqliteError;

    async fn get_checkpoint(
        &self,
        signature: &PermissionSignature,
        replication_id: &ReplicationId,
    ) -> Result<Option<SeqNum>, Self::Error> {
        let row = self
            .execute(async |pool| {
                query_as::<_, (i64,)>(
                    "
                    SELECT
                        last_seq
                    FROM
                        checkpoints_v1
                    WHERE
                        signature = ?
                        AND replication_id = ?
                    ",
                )
                .bind(signature.to_hex())
                .bind(replication_id.as_str())
                .fetch_optional(pool)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        row.map(|(last_seq,)| decode_seq(last_seq)).transpose()
    }

    async fn set_checkpoint(
        &self,
        signature: &PermissionSignature,
        replication_id: &ReplicationId,
        seq: SeqNum,
    ) -> Result<(), Self::Error> {
        let seq = encode_seq(seq)?;

        self.tx(async |tx| {
            query(
                "
                INSERT
                INTO
                    checkpoints_v1 (
                        signature,
                        replication_id,
                        last_seq
                    )
                VALUES
                    (?, ?, ?)
                ON CONFLICT (signature, replication_id)
                DO UPDATE SET
                    last_seq = excluded.last_seq
                ",
            )
            .bind(signature.to_hex())
            .bind(replication_id.as_str())
            .bind(seq)
            .execute(&mut **tx)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await?;

        Ok(())
    }
}
