//! # sable-semantic
//!
//! The semantic middle of the Sable compiler.
//!
//! Three passes run over the parsed syntax tree, in order:
//!
//! 1. **Symbol-table construction** ([`declare`]) - one walk that
//!    declares every name into a scope tree ([`symbols::SymbolTable`])
//!    and records node-to-symbol maps. Forward references are free
//!    because nothing is resolved yet.
//!
//! 2. **Binding** ([`binder`]) - mirrors the syntax tree into the
//!    [`bound::BoundTree`], decoding literals, attaching declared types
//!    to symbols, rewriting implicit `this.x` accesses, and resolving
//!    whatever the scope tree can answer locally.
//!
//! 3. **Symbol resolution** ([`resolve`]) - fills in the references
//!    binding had to leave null: member lookups through object types,
//!    overload selection, constructors, indexers, `using` targets.
//!
//! Shared by all passes: the hash-consed [`types::TypeSystem`] and the
//! conversion classifier ([`convert`]), which is the single authority on
//! implicit conversions for the binder, the resolver, and the HLIR
//! lowerer downstream.

pub mod binder;
pub mod bound;
pub mod convert;
pub mod declare;
pub mod resolve;
pub mod symbols;
pub mod types;

pub use binder::bind;
pub use bound::{BoundDeclId, BoundExprId, BoundStmtId, BoundTree, ConstantValue, ValueCategory};
pub use convert::{classify, ConversionKind};
pub use declare::build_symbol_table;
pub use resolve::resolve;
pub use symbols::{SymbolId, SymbolKind, SymbolTable};
pub use types::{PrimitiveKind, Type, TypeId, TypeSystem};
