// SPDX-License-Identifier: MIT OR Apache-2.0

//! Calling identities, their roles and the permission signature derived from them.
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hash::{Hash, HashError};

/// Ordered set of role labels an identity holds.
///
/// Roles are kept sorted and de-duplicated, so two role sets containing the same labels are equal
/// no matter in which order they were supplied.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(BTreeSet<String>);

impl Roles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: impl Into<String>) -> bool {
        self.0.insert(role.into())
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Permission signature of this role set.
    pub fn signature(&self) -> PermissionSignature {
        PermissionSignature::from_roles(self)
    }
}

impl<S> FromIterator<S> for Roles
where
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S, const N: usize> From<[S; N]> for Roles
where
    S: Into<String>,
{
    fn from(value: [S; N]) -> Self {
        value.into_iter().collect()
    }
}

/// Caller on whose behalf purge queries and checkpoint writes are made.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub roles: Roles,
}

impl Identity {
    pub fn new(name: impl Into<String>, roles: impl Into<Roles>) -> Self {
        Self {
            name: name.into(),
            roles: roles.into(),
        }
    }

    pub fn signature(&self) -> PermissionSignature {
        self.roles.signature()
    }
}

/// Deterministic digest of a role set.
///
/// Purge visibility is a function of permissions and not of a single user: every identity holding
/// the same roles reads the same partition of the purge log and shares checkpoint keys with its
/// peers. The digest is the BLAKE3 hash over the sorted roles, each prefixed with its byte length
/// so no two distinct role sets produce the same input.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSignature(Hash);

impl PermissionSignature {
    pub fn from_roles(roles: &Roles) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(roles.len() as u64).to_be_bytes());
        for role in roles.iter() {
            hasher.update(&(role.len() as u64).to_be_bytes());
            hasher.update(role.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub fn hash(&self) -> Hash {
        self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl From<Hash> for PermissionSignature {
    fn from(value: Hash) -> Self {
        Self(value)
    }
}

impl FromStr for PermissionSignature {
    type Err = HashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(value.parse()?))
    }
}

impl fmt::Display for PermissionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PermissionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PermissionSignature")
            .field(&self.to_hex())
            .finish()
    }
}
