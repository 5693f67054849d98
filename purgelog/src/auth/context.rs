// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::error::Error;

use purgelog_core::{Identity, Roles, SubjectId};
use tracing::debug;

use crate::error::{AuthorizationError, boxed};

/// Source of permission data: which subjects a role set grants access to.
pub trait PermissionProvider {
    type Error: Error + Send + Sync + 'static;

    /// Return all subjects the given roles may observe.
    fn subjects(
        &self,
        roles: &Roles,
    ) -> impl Future<Output = Result<BTreeSet<SubjectId>, Self::Error>>;
}

/// Identity of a caller together with the subjects it may observe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub identity: Identity,
    pub subject_ids: BTreeSet<SubjectId>,
}

impl AuthorizationContext {
    /// Check that the context belongs to an identity which is allowed to ask for anything.
    pub(crate) fn validate(&self) -> Result<(), AuthorizationError> {
        validate_identity(&self.identity)
    }
}

pub(crate) fn validate_identity(identity: &Identity) -> Result<(), AuthorizationError> {
    if identity.name.is_empty() {
        return Err(AuthorizationError::InvalidIdentity(
            "identity has no name".into(),
        ));
    }
    Ok(())
}

/// Derive the authorization context of an identity.
///
/// An empty role set is valid and usually grants no subjects. Failures of the permission provider
/// are returned as they are and not retried.
pub async fn build_context<P>(
    provider: &P,
    identity: &Identity,
) -> Result<AuthorizationContext, AuthorizationError>
where
    P: PermissionProvider,
{
    validate_identity(identity)?;

    let subject_ids = provider
        .subjects(&identity.roles)
        .await
        .map_err(|err| AuthorizationError::PermissionData(boxed(err)))?;

    debug!(
        name = %identity.name,
        roles = identity.roles.len(),
        subjects = subject_ids.len(),
        "built authorization context"
    );

    Ok(AuthorizationContext {
        identity: identity.to_owned(),
        subject_ids,
    })
}
