//! Statement grammar: blocks, control flow, and the local-variable vs.
//! expression-statement lookahead.

use super::Parser;
use crate::ast::{Stmt, StmtKind};
use crate::token::TokenKind;

/// Errors tolerated inside one block before the parser gives up on it
/// and skips to the matching `}`.
const BLOCK_ERROR_LIMIT: usize = 10;

impl<'a, 'i> Parser<'a, 'i> {
    /// Parses a `{ ... }` block. Recovery: on repeated errors inside the
    /// same block, the rest of the block is skipped wholesale.
    pub(crate) fn parse_block(&mut self) -> &'a Stmt<'a> {
        let start = self.start();
        let open = self.start();
        let mut statements = Vec::new();

        if self.expect(TokenKind::LBrace).is_none() {
            return self.alloc_stmt(start, StmtKind::Block(statements));
        }

        let errors_at_entry = self.error_count();
        while !self.at_eof() && !self.check(TokenKind::RBrace) {
            if self.error_count() - errors_at_entry >= BLOCK_ERROR_LIMIT {
                self.skip_to_matching_rbrace();
                break;
            }
            statements.push(self.parse_statement());
        }
        self.expect_closer(TokenKind::RBrace, open);

        self.alloc_stmt(start, StmtKind::Block(statements))
    }

    pub(crate) fn parse_statement(&mut self) -> &'a Stmt<'a> {
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                let start = self.start();
                self.advance();
                self.expect(TokenKind::Semicolon);
                self.alloc_stmt(start, StmtKind::Break)
            }
            TokenKind::Continue => {
                let start = self.start();
                self.advance();
                self.expect(TokenKind::Semicolon);
                self.alloc_stmt(start, StmtKind::Continue)
            }
            TokenKind::Semicolon => {
                let start = self.start();
                self.advance();
                self.alloc_stmt(start, StmtKind::Block(Vec::new()))
            }
            _ if self.looks_like_local_decl() => self.parse_local_var(),
            _ => self.parse_expression_statement(),
        }
    }

    /// One-token-class lookahead for `Type Identifier ...` declaration
    /// starts. `var` always starts a declaration; a primitive keyword
    /// always does; an identifier does when, after an optional dotted
    /// path and any `*` / `[...]` suffixes, the next token is another
    /// identifier.
    fn looks_like_local_decl(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Var => true,
            kind if kind.is_primitive_type() => true,
            TokenKind::Identifier => {
                let mut i = 1;
                // Dotted path: A.B.C
                while self.peek_at(i).kind == TokenKind::Dot
                    && self.peek_at(i + 1).kind == TokenKind::Identifier
                {
                    i += 2;
                }
                // Pointer / array suffixes
                loop {
                    match self.peek_at(i).kind {
                        TokenKind::Star => i += 1,
                        TokenKind::LBracket => {
                            let mut j = i + 1;
                            if self.peek_at(j).kind == TokenKind::IntLiteral {
                                j += 1;
                            }
                            if self.peek_at(j).kind != TokenKind::RBracket {
                                return false;
                            }
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
                self.peek_at(i).kind == TokenKind::Identifier
            }
            _ => false,
        }
    }

    /// `T a = x, b;` or `var a = x;` - the terminating `;` is consumed.
    fn parse_local_var(&mut self) -> &'a Stmt<'a> {
        let start = self.start();
        let ty = if self.eat(TokenKind::Var).is_some() {
            None
        } else {
            self.parse_type_ref()
        };

        let mut declarators = Vec::new();
        loop {
            let decl_start = self.start();
            let Some(name_token) = self.expect(TokenKind::Identifier) else {
                self.sync_statement();
                break;
            };
            declarators.push(self.parse_declarator_with_name(decl_start, name_token.lexeme));
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        if !declarators.is_empty() {
            self.expect(TokenKind::Semicolon);
        }

        self.alloc_stmt(start, StmtKind::LocalVar { ty, declarators })
    }

    fn parse_if(&mut self) -> &'a Stmt<'a> {
        let start = self.start();
        self.advance(); // if
        let open = self.start();
        self.expect(TokenKind::LParen);
        let cond = self.parse_expression();
        self.expect_closer(TokenKind::RParen, open);
        let then_branch = self.parse_statement();
        let else_branch = if self.eat(TokenKind::Else).is_some() {
            Some(self.parse_statement())
        } else {
            None
        };
        self.alloc_stmt(
            start,
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
        )
    }

    fn parse_while(&mut self) -> &'a Stmt<'a> {
        let start = self.start();
        self.advance(); // while
        let open = self.start();
        self.expect(TokenKind::LParen);
        let cond = self.parse_expression();
        self.expect_closer(TokenKind::RParen, open);
        let body = self.parse_statement();
        self.alloc_stmt(start, StmtKind::While { cond, body })
    }

    /// `for (init; cond; update, update) body` - every header slot is
    /// optional.
    fn parse_for(&mut self) -> &'a Stmt<'a> {
        let start = self.start();
        self.advance(); // for
        let open = self.start();
        self.expect(TokenKind::LParen);

        let init = if self.eat(TokenKind::Semicolon).is_some() {
            None
        } else if self.looks_like_local_decl() {
            Some(self.parse_local_var())
        } else {
            let stmt = self.parse_expression_statement();
            Some(stmt)
        };

        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(TokenKind::Semicolon);

        let mut update = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                update.push(self.parse_expression());
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect_closer(TokenKind::RParen, open);

        let body = self.parse_statement();
        self.alloc_stmt(
            start,
            StmtKind::For {
                init,
                cond,
                update,
                body,
            },
        )
    }

    fn parse_return(&mut self) -> &'a Stmt<'a> {
        let start = self.start();
        self.advance(); // return
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(TokenKind::Semicolon);
        self.alloc_stmt(start, StmtKind::Return(value))
    }

    /// Expression statement, guaranteeing cursor progress even when the
    /// expression itself fails to parse.
    fn parse_expression_statement(&mut self) -> &'a Stmt<'a> {
        let start = self.start();
        let pos_before = self.snapshot();

        let expr = self.parse_expression();

        if matches!(expr.kind, crate::ast::ExprKind::Error) {
            // The primary already reported; resynchronize at the
            // statement boundary. Advance at least one token so the
            // block loop cannot spin.
            if self.pos == pos_before.pos {
                self.advance();
            }
            self.sync_statement();
            return self.alloc_stmt(start, StmtKind::Error);
        }

        self.expect(TokenKind::Semicolon);
        self.alloc_stmt(start, StmtKind::Expr(expr))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::with_unit;
    use crate::ast::{DeclKind, ExprKind, StmtKind};

    fn body_of_first_fn<'u, 'a>(
        unit: &'u crate::ast::CompilationUnit<'a>,
    ) -> &'a crate::ast::Stmt<'a> {
        let DeclKind::Method { body, .. } = &unit.decls[0].kind else {
            panic!("expected method");
        };
        body.expect("expected body")
    }

    #[test]
    fn if_else_nests() {
        with_unit("void f(int x) { if (x == 0) return; else x = 1; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let StmtKind::Block(stmts) = &body_of_first_fn(unit).kind else {
                panic!("expected block");
            };
            let StmtKind::If { else_branch, .. } = &stmts[0].kind else {
                panic!("expected if");
            };
            assert!(else_branch.is_some());
        });
    }

    #[test]
    fn for_header_slots_all_optional() {
        with_unit("void f() { for (;;) { break; } }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let StmtKind::Block(stmts) = &body_of_first_fn(unit).kind else {
                panic!("expected block");
            };
            let StmtKind::For {
                init,
                cond,
                update,
                ..
            } = &stmts[0].kind
            else {
                panic!("expected for");
            };
            assert!(init.is_none());
            assert!(cond.is_none());
            assert!(update.is_empty());
        });
    }

    #[test]
    fn for_with_declaration_and_update() {
        with_unit(
            "void f() { for (int i = 0; i < 10; i++) { } }",
            |unit, diags, _| {
                assert!(!diags.has_errors());
                let StmtKind::Block(stmts) = &body_of_first_fn(unit).kind else {
                    panic!("expected block");
                };
                let StmtKind::For {
                    init,
                    cond,
                    update,
                    ..
                } = &stmts[0].kind
                else {
                    panic!("expected for");
                };
                assert!(matches!(
                    init.unwrap().kind,
                    StmtKind::LocalVar { ty: Some(_), .. }
                ));
                assert!(cond.is_some());
                assert_eq!(update.len(), 1);
            },
        );
    }

    #[test]
    fn var_declaration_has_no_type_ref() {
        with_unit("void f() { var p = 1; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let StmtKind::Block(stmts) = &body_of_first_fn(unit).kind else {
                panic!("expected block");
            };
            assert!(matches!(
                stmts[0].kind,
                StmtKind::LocalVar { ty: None, .. }
            ));
        });
    }

    #[test]
    fn member_assignment_is_expression_not_declaration() {
        with_unit("void f() { a.b = 3; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let StmtKind::Block(stmts) = &body_of_first_fn(unit).kind else {
                panic!("expected block");
            };
            let StmtKind::Expr(expr) = &stmts[0].kind else {
                panic!("expected expression statement");
            };
            assert!(matches!(expr.kind, ExprKind::Assign { .. }));
        });
    }

    #[test]
    fn qualified_type_local_declaration() {
        with_unit("void f() { A.B c = null; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let StmtKind::Block(stmts) = &body_of_first_fn(unit).kind else {
                panic!("expected block");
            };
            assert!(matches!(stmts[0].kind, StmtKind::LocalVar { .. }));
        });
    }

    #[test]
    fn bad_statement_recovers_at_boundary() {
        with_unit("void f() { ) ; int x = 1; }", |unit, diags, _| {
            assert!(diags.has_errors());
            let StmtKind::Block(stmts) = &body_of_first_fn(unit).kind else {
                panic!("expected block");
            };
            // The declaration after the damage still parses.
            assert!(stmts
                .iter()
                .any(|s| matches!(s.kind, StmtKind::LocalVar { .. })));
        });
    }

    #[test]
    fn error_flood_skips_to_block_end() {
        // Dozens of lone closers; the block gives up but the parser
        // still finishes the unit and the following class parses.
        let src = "void f() { ) ) ) ) ) ) ) ) ) ) ) ) ) ) } class C { }";
        with_unit(src, |unit, diags, _| {
            assert!(diags.has_errors());
            assert_eq!(unit.decls.len(), 2);
        });
    }
}
