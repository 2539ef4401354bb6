//! In-process cache and concurrency coordinator between an editor and
//! libclang.
//!
//! Editors issue high-frequency requests (completion on each keystroke,
//! as-you-type diagnostics, go-to-definition, find-uses) against partially
//! saved buffers. Calling libclang for every keystroke is intolerable, so
//! this crate keeps one long-lived, serialized translation unit per file,
//! coalesces keystroke bursts into at most one outstanding completion per
//! cursor position, and never blocks a caller beyond its own timeout.
//!
//! The outward surface is a C ABI ([`abi`]); results cross it as opaque
//! integer handles to process-owned strings and string lists.

pub mod abi;
pub mod clang;
pub mod completion;
pub mod config;
mod logging;
pub mod registry;
pub mod tu;

pub use clang::{Cursor, Index, ParseError, ParsedUnit};
pub use completion::{Chunk, ChunkKind, Completion, RawCompletion, shape};
pub use registry::Registry;
pub use tu::TranslationUnit;
