//! # sable-syntax
//!
//! Tokens, lexer, syntax tree, and parser for the Sable language.
//!
//! The crate implements the first two pipeline stages:
//!
//! 1. **Lexer** ([`lexer`]) - Turns UTF-8 source text into a token stream
//!    with precise 1-based line/column locations. Single pass, greedy,
//!    never fatal: malformed lexemes become `Error` tokens and lexing
//!    continues.
//!
//! 2. **Parser** ([`parser`]) - Recursive descent over the token stream,
//!    producing an arena-allocated [`ast::CompilationUnit`]. Parse errors
//!    are recorded and the parser synchronizes at the next statement or
//!    declaration boundary, so a damaged file still yields a partial tree
//!    for the later stages to diagnose.
//!
//! ## Example
//!
//! ```
//! use sable_base::{Arena, Diagnostics, Interner};
//! use sable_syntax::{ast::SynContext, lexer::Lexer, parser::Parser};
//!
//! let mut interner = Interner::new();
//! let mut diags = Diagnostics::new();
//! let tokens = Lexer::new("class C { }", "demo.sb", &mut interner).tokenize(&mut diags);
//!
//! let exprs = Arena::new();
//! let stmts = Arena::new();
//! let decls = Arena::new();
//! let types = Arena::new();
//! let accessors = Arena::new();
//! let ctx = SynContext::new(&exprs, &stmts, &decls, &types, &accessors);
//!
//! let unit = Parser::new(tokens, ctx, &interner, &mut diags).parse();
//! assert_eq!(unit.decls.len(), 1);
//! assert!(!diags.has_errors());
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{CompilationUnit, NodeId, SynContext};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{LiteralValue, Token, TokenKind};
