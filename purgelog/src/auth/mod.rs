// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization context of a caller and the documents it may observe.
mod context;
pub mod memory;
mod resolver;

pub(crate) use context::validate_identity;
pub use context::{AuthorizationContext, PermissionProvider, build_context};
pub use resolver::{DocumentIndex, ResolveOptions, resolve};
