//! Recursive-descent parser for Sable.
//!
//! The parser consumes the token stream produced by the lexer and builds
//! an arena-allocated [`CompilationUnit`]. It never aborts on a
//! recoverable error: each problem is recorded in the [`Diagnostics`]
//! sink and the parser synchronizes at the next statement or declaration
//! boundary, producing a best-effort partial tree.
//!
//! The grammar is split across three submodules mirroring its altitude:
//!
//! - [`decl`] - compilation unit, using directives, namespaces, types,
//!   members, parameters, type references
//! - [`stmt`] - statements and blocks, including the local-variable vs.
//!   expression-statement lookahead
//! - [`expr`] - precedence-climbing expression parsing and the bounded
//!   trial parse that disambiguates `<` at call sites
//!
//! Trial parses save and restore the token position explicitly; no parse
//! rule signals failure by unwinding.

mod decl;
mod expr;
mod stmt;

use crate::ast::{CompilationUnit, Expr, ExprKind, NodeId, Stmt, StmtKind, SynContext};
use crate::token::{Token, TokenKind};
use sable_base::{Diagnostics, ErrorKind, Interner, SourceLocation, Symbol};

/// Saved cursor state for bounded trial parsing.
#[derive(Clone, Copy)]
pub(crate) struct Snapshot {
    pos: usize,
    last_end: (u32, u32),
}

pub struct Parser<'a, 'i> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: SynContext<'a>,
    interner: &'i Interner,
    diags: &'i mut Diagnostics,
    next_id: u32,
    /// End position of the most recently consumed token; node locations
    /// are finalized against it when a rule returns.
    last_end: (u32, u32),
    file: Symbol,
}

impl<'a, 'i> Parser<'a, 'i> {
    /// `tokens` must be terminated by an `Eof` token (the lexer
    /// guarantees this).
    pub fn new(
        tokens: Vec<Token>,
        ctx: SynContext<'a>,
        interner: &'i Interner,
        diags: &'i mut Diagnostics,
    ) -> Self {
        let file = tokens
            .first()
            .map(|t| t.location.file)
            .unwrap_or(Symbol::EMPTY);
        Parser {
            tokens,
            pos: 0,
            ctx,
            interner,
            diags,
            next_id: 0,
            last_end: (1, 1),
            file,
        }
    }

    /// Parses the whole unit; always succeeds structurally, with errors
    /// collected in the diagnostics sink.
    pub fn parse(mut self) -> CompilationUnit<'a> {
        self.parse_unit()
    }

    // === Cursor ===

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = *self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        self.last_end = (token.location.line_end, token.location.col_end);
        token
    }

    /// Consumes the next token if it has the given kind.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consumes a token of the given kind or records a parse error.
    ///
    /// On failure the cursor does not move; the caller decides how to
    /// recover.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let found = *self.peek();
            self.error(format!(
                "expected {}, found {}",
                kind.describe(),
                describe_token(&found, self.interner),
            ));
            None
        }
    }

    /// Consumes the closing token of a bracketed construct.
    ///
    /// If the closer is missing, the error names the opener's position
    /// and parsing continues at the implicit close position (the cursor
    /// does not skip forward looking for it).
    pub(crate) fn expect_closer(&mut self, kind: TokenKind, open: SourceLocation) {
        if self.eat(kind).is_none() {
            self.error(format!(
                "missing {} to match opening at {}",
                kind.describe(),
                open
            ));
        }
    }

    pub(crate) fn error(&mut self, message: String) {
        let location = self.peek().location;
        self.diags.report(ErrorKind::Parse, message, location);
    }

    pub(crate) fn error_at(&mut self, message: String, location: SourceLocation) {
        self.diags.report(ErrorKind::Parse, message, location);
    }

    pub(crate) fn error_count(&self) -> usize {
        self.diags.len()
    }

    // === Trial parsing ===

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            pos: self.pos,
            last_end: self.last_end,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        self.pos = snapshot.pos;
        self.last_end = snapshot.last_end;
    }

    // === Locations and ids ===

    pub(crate) fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Start point of the current token, captured before a rule consumes
    /// anything.
    pub(crate) fn start(&self) -> SourceLocation {
        let loc = self.peek().location;
        SourceLocation::point(self.file, loc.line_start, loc.col_start)
    }

    /// Finalizes a node location: from `start` to the end of the most
    /// recently consumed token.
    pub(crate) fn span_from(&self, start: SourceLocation) -> SourceLocation {
        SourceLocation::new(
            self.file,
            start.line_start,
            start.col_start,
            self.last_end.0,
            self.last_end.1,
        )
    }

    // === Recovery ===

    /// Skips to just after the next `;`, or stops before `}`/EOF or a
    /// token that can begin a statement boundary.
    pub(crate) fn sync_statement(&mut self) {
        while !self.at_eof() {
            match self.peek_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace
                | TokenKind::LBrace
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skips to the next plausible member/declaration start: a modifier
    /// keyword, a type keyword, `}`, or EOF.
    pub(crate) fn sync_member(&mut self) {
        while !self.at_eof() {
            let kind = self.peek_kind();
            if kind.is_modifier()
                || kind.is_primitive_type()
                || matches!(
                    kind,
                    TokenKind::Class
                        | TokenKind::Struct
                        | TokenKind::Namespace
                        | TokenKind::Using
                        | TokenKind::RBrace
                        | TokenKind::Tilde
                )
            {
                return;
            }
            self.advance();
        }
    }

    /// Consumes tokens until the brace depth returns to zero; leaves the
    /// matching `}` for the caller. Assumes the opening `{` was already
    /// consumed.
    pub(crate) fn skip_to_matching_rbrace(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.peek_kind() {
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // === Shared allocation helpers ===

    pub(crate) fn alloc_expr(&mut self, start: SourceLocation, kind: ExprKind<'a>) -> &'a Expr<'a> {
        let id = self.next_node_id();
        self.ctx.exprs.alloc(Expr {
            id,
            location: self.span_from(start),
            kind,
        })
    }

    pub(crate) fn alloc_stmt(&mut self, start: SourceLocation, kind: StmtKind<'a>) -> &'a Stmt<'a> {
        let id = self.next_node_id();
        self.ctx.stmts.alloc(Stmt {
            id,
            location: self.span_from(start),
            kind,
        })
    }

    /// `true` if the identifier token is this contextual keyword.
    pub(crate) fn is_contextual(&self, token: &Token, word: &str) -> bool {
        token.kind == TokenKind::Identifier
            && self.interner.lookup(word) == Some(token.lexeme)
    }
}

fn describe_token(token: &Token, interner: &Interner) -> String {
    match token.kind {
        TokenKind::Eof => "end of file".to_string(),
        TokenKind::Identifier
        | TokenKind::IntLiteral
        | TokenKind::LongLiteral
        | TokenKind::FloatLiteral
        | TokenKind::DoubleLiteral
        | TokenKind::CharLiteral => format!("'{}'", interner.resolve(token.lexeme)),
        TokenKind::StringLiteral => "string literal".to_string(),
        _ => format!("'{}'", interner.resolve(token.lexeme)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared scaffolding for parser unit tests: lex + parse a source
    //! string with arenas owned by a caller-provided closure.

    use super::*;
    use crate::ast::Accessor;
    use crate::ast::{Decl, TypeRef};
    use crate::lexer::Lexer;
    use sable_base::Arena;

    pub fn with_unit<R>(
        source: &str,
        f: impl for<'a> FnOnce(&CompilationUnit<'a>, &Diagnostics, &Interner) -> R,
    ) -> R {
        let mut interner = Interner::new();
        let mut diags = Diagnostics::new();
        let tokens = Lexer::new(source, "test.sb", &mut interner).tokenize(&mut diags);

        let exprs: Arena<Expr> = Arena::new();
        let stmts: Arena<Stmt> = Arena::new();
        let decls: Arena<Decl> = Arena::new();
        let types: Arena<TypeRef> = Arena::new();
        let accessors: Arena<Accessor> = Arena::new();
        let ctx = SynContext::new(&exprs, &stmts, &decls, &types, &accessors);

        let unit = Parser::new(tokens, ctx, &interner, &mut diags).parse();
        f(&unit, &diags, &interner)
    }
}
