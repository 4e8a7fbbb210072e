//! soundforged-core: shared types, ids, errors, and audio format parameters.
//!
//! This crate is the foundational dependency for the other soundforged
//! crates. It owns the job identifier, the unified error type, the target
//! format and encoding parameter model, and the source-file metadata that the
//! naming and scheduling layers consume.

pub mod error;
pub mod format;
pub mod ids;
pub mod metadata;

pub use error::{Error, Result};
pub use format::*;
pub use ids::*;
pub use metadata::*;
