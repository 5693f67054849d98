// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

#[cfg(feature = "memory")]
pub use memory::CheckpointMemoryStore;
pub use traits::CheckpointStore;
