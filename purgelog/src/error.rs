// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy of the purge protocol.
//!
//! Every stage has its own error type. Failures of collaborators (permission data, document
//! index, storage) are kept as the boxed `source` of these errors without being rendered into a
//! string, callers can still downcast to the original error.
use std::error::Error;
use std::time::Duration;

use thiserror::Error;

/// Original error of a collaborator.
pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

pub(crate) fn boxed<E>(err: E) -> BoxedError
where
    E: Error + Send + Sync + 'static,
{
    Box::new(err)
}

/// Permissions of the calling identity could not be resolved.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("permission data unavailable: {0}")]
    PermissionData(#[source] BoxedError),
}

/// Subjects could not be expanded into document ids.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("document index expansion failed: {0}")]
    DocumentIndex(#[source] BoxedError),
}

/// Purge log storage failed to answer a query.
#[derive(Debug, Error)]
pub enum LogQueryError {
    #[error("purge log storage unavailable: {0}")]
    Store(#[source] BoxedError),

    #[error("purge log query did not complete within {0:?}")]
    Timeout(Duration),
}

/// Checkpoint could not be persisted. The checkpoint counts as not acknowledged and writing it
/// again is safe.
#[derive(Debug, Error)]
pub enum CheckpointWriteError {
    #[error("checkpoint storage unavailable: {0}")]
    Store(#[source] BoxedError),

    #[error("checkpoint write did not complete within {0:?}")]
    Timeout(Duration),
}

/// Request from a replicating client is missing or carries malformed input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientInputError {
    #[error("missing required header {}", crate::REPLICATION_ID_HEADER)]
    MissingReplicationId,

    #[error("missing required parameter seq")]
    MissingSeq,

    #[error("invalid parameter seq: '{0}' is not a sequence number")]
    InvalidSeq(String),

    #[error("invalid parameter limit: must be greater than zero")]
    InvalidLimit,
}

/// Purge events could not be recorded. Nothing was appended to the log.
#[derive(Debug, Error)]
pub enum PurgeRecordError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("purge log storage unavailable: {0}")]
    Store(#[source] BoxedError),

    #[error("appending purge events did not complete within {0:?}")]
    Timeout(Duration),
}

/// Error returned by the request-level operations.
///
/// The variant tells which stage failed, the inner error is passed through untouched.
#[derive(Debug, Error)]
pub enum PurgeError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Resolution(ResolutionError),

    #[error(transparent)]
    LogQuery(#[from] LogQueryError),

    #[error(transparent)]
    CheckpointWrite(#[from] CheckpointWriteError),

    #[error(transparent)]
    ClientInput(#[from] ClientInputError),
}

impl From<ResolutionError> for PurgeError {
    fn from(err: ResolutionError) -> Self {
        match err {
            // Authorization failures keep their class no matter which stage detected them.
            ResolutionError::Authorization(err) => Self::Authorization(err),
            err => Self::Resolution(err),
        }
    }
}

impl PurgeError {
    /// Returns `true` if the request itself was at fault and retrying it unchanged is pointless.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ClientInput(_))
    }

    /// Returns `true` if the caller's permissions could not be established.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Authorization(_))
    }

    /// HTTP status class a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ClientInput(_) => 400,
            Self::Authorization(_) => 403,
            Self::Resolution(_) | Self::LogQuery(_) | Self::CheckpointWrite(_) => 500,
        }
    }
}
