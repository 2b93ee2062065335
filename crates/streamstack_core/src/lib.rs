//! streamstack core types
//!
//! Pure types with no I/O: logical ids, resource kinds, content digests
//! and the core error type shared by the planner and the CLI.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod id;
pub mod kind;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use hash::Digest;
pub use id::LogicalId;
pub use kind::ResourceKind;
