//! # soundforged-naming
//!
//! Turns source files into destination paths.
//!
//! - **Fields** ([`Field`]) -- the closed set of placeholders a pattern may use.
//! - **Templates** ([`Template`]) -- parsed patterns such as
//!   `{album_artist}/{album}/{track_number:02} - {title}.{target_extension}`.
//! - **Sanitization** ([`sanitize`]) -- a fixed replacement table applied to
//!   tag values and to the rendered path.
//! - **Resolution** ([`Resolver`]) -- renders a template for one source and
//!   appends `_2`, `_3`, ... until the path is free.
//! - **Claims** ([`DestinationClaims`]) -- a shared claim set so that
//!   resolutions running on several threads never hand out the same path.

pub mod claims;
pub mod field;
pub mod resolver;
pub mod sanitize;
pub mod template;

pub use claims::DestinationClaims;
pub use field::Field;
pub use resolver::{ClaimedPaths, NamingOptions, OutputRoot, Resolver};
pub use template::{Segment, Template};
