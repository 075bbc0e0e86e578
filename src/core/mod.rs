//! Core types - pure data shared across the codebase.

mod delta;
mod module_id;
mod types;

pub use delta::{Delta, DeltaFormatError, encode_batch, parse_batch, read_batch};
pub use module_id::ModuleId;
pub use types::{TypeRef, TypeToken};
