//! # sable-compile
//!
//! The Sable compilation pipeline.
//!
//! One call to [`compile`] runs every stage in order and returns a
//! [`Compilation`] holding the products and the collected diagnostics:
//!
//! | Stage | Output |
//! |-------|--------|
//! | Lexer | token stream |
//! | Parser | syntax tree (dropped after binding) |
//! | Symbol-table builder | scope tree |
//! | Binder | bound tree |
//! | Symbol resolution | bound tree, references filled |
//! | HLIR lowering | SSA module |
//!
//! The pipeline never aborts early: every stage runs over whatever its
//! predecessor produced, so a file with a parse error still yields
//! symbol and resolution diagnostics for the parts that survived.
//!
//! ```
//! let result = sable_compile::compile(
//!     "class C { int add(int a, int b) { return a + b; } }",
//!     "demo.sb",
//! );
//! assert!(result.success());
//! assert!(result.module.is_some());
//! ```

pub mod compile;
pub mod diagnostic;

pub use compile::{compile, Compilation};
pub use diagnostic::render_diagnostics;
