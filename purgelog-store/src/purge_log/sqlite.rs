// SPDX-License-Identifier: MIT OR Apache-2.0

use purgelog_core::{DocumentId, PermissionSignature, PurgeEvent, SeqNum};
use sqlx::{FromRow, query_as};

use crate::purge_log::PurgeLogStore;
use crate::sqlite::{DecodeError, SqliteError, SqliteStore, decode_seq, encode_seq};

impl<'a> PurgeLogStore for SqliteStore<'a> {
    type Error = SqliteError;

    async fn append_purge(
        &self,
        signature: &PermissionSignature,
        document_id: &DocumentId,
    ) -> Result<PurgeEvent, Self::Error> {
        let row = self
            .tx(async |tx| {
                query_as::<_, (i64,)>(
                    "
                    INSERT
                    INTO
                        purge_log_v1 (
                            signature,
                            document_id
                        )
                    VALUES
                        (?, ?)
                    RETURNING
                        seq
                    ",
                )
                .bind(signature.to_hex())
                .bind(document_id.as_str())
                .fetch_one(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(PurgeEvent {
            document_id: document_id.to_owned(),
            signature: *signature,
            seq: decode_seq(row.0)?,
        })
    }

    async fn scan(
        &self,
        signature: &PermissionSignature,
        after: SeqNum,
        limit: Option<usize>,
    ) -> Result<Vec<PurgeEvent>, Self::Error> {
        let after = encode_seq(after)?;
        // SQLite treats a negative limit as "no limit".
        let limit = match limit {
            Some(limit) => i64::try_from(limit)
                .map_err(|err| SqliteError::Encode("limit".into(), err))?,
            None => -1,
        };

        let rows = self
            .execute(async |pool| {
                query_as::<_, PurgeEventRow>(
                    "
                    SELECT
                        seq,
                        signature,
                        document_id
                    FROM
                        purge_log_v1
                    WHERE
                        signature = ?
                        AND seq > ?
                    ORDER BY
                        seq ASC
                    LIMIT
                        ?
                    ",
                )
                .bind(signature.to_hex())
                .bind(after)
                .bind(limit)
                .fetch_all(pool)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        rows.into_iter().map(PurgeEvent::try_from).collect()
    }

    async fn latest_seq(
        &self,
        signature: &PermissionSignature,
    ) -> Result<Option<SeqNum>, Self::Error> {
        let row = self
            .execute(async |pool| {
                query_as::<_, (Option<i64>,)>(
                    "
                    SELECT
                        MAX(seq)
                    FROM
                        purge_log_v1
                    WHERE
                        signature = ?
                    ",
                )
                .bind(signature.to_hex())
                .fetch_one(pool)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        row.0.map(decode_seq).transpose()
    }
}

/// Single purge event row as it is inserted in the SQLite database.
#[derive(Debug, FromRow)]
struct PurgeEventRow {
    seq: i64,
    signature: String,
    document_id: String,
}

impl TryFrom<PurgeEventRow> for PurgeEvent {
    type Error = SqliteError;

    fn try_from(row: PurgeEventRow) -> Result<Self, Self::Error> {
        Ok(PurgeEvent {
            document_id: DocumentId::from(row.document_id),
            signature: row
                .signature
                .parse::<PermissionSignature>()
                .map_err(|err| SqliteError::Decode("signature".into(), DecodeError::from(err)))?,
            seq: decode_seq(row.seq)?,
        })
    }
}
