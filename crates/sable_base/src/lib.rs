//! # sable-base
//!
//! Structural atoms for the Sable compiler.
//!
//! Every later stage of the pipeline builds on four primitives defined
//! here:
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Arena`] | Bump allocation for syntax-tree nodes |
//! | [`Interner`] / [`Symbol`] | O(1) identifier comparison |
//! | [`SourceLocation`] | File + 1-based line/column ranges |
//! | [`CompileError`] / [`Diagnostics`] | Collected per-compilation errors |
//!
//! The crate has no dependency besides `bumpalo` and carries no pipeline
//! logic; it exists so that the syntax, semantic, and IR crates can share
//! vocabulary without depending on each other.

pub mod arena;
pub mod error;
pub mod intern;
pub mod location;

pub use arena::Arena;
pub use error::{CompileError, Diagnostics, ErrorKind};
pub use intern::{Interner, Symbol};
pub use location::SourceLocation;
