//! Expression grammar: precedence climbing from assignment down to
//! primaries, postfix chains, and the bounded trial parse that decides
//! whether `<` begins a generic-style call or is the less-than operator.

use super::Parser;
use crate::ast::{AssignOp, BinaryOp, Expr, ExprKind, LiteralKind, PostfixOp, UnaryOp};
use crate::token::{LiteralValue, TokenKind};

impl<'a, 'i> Parser<'a, 'i> {
    /// Entry point: assignment is the lowest tier and right-associative.
    pub(crate) fn parse_expression(&mut self) -> &'a Expr<'a> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let target = self.parse_logical_or();

        let op = match self.peek_kind() {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            TokenKind::StarAssign => AssignOp::Mul,
            TokenKind::SlashAssign => AssignOp::Div,
            TokenKind::PercentAssign => AssignOp::Rem,
            TokenKind::AmpAssign => AssignOp::And,
            TokenKind::PipeAssign => AssignOp::Or,
            TokenKind::CaretAssign => AssignOp::Xor,
            TokenKind::ShlAssign => AssignOp::Shl,
            TokenKind::ShrAssign => AssignOp::Shr,
            _ => return target,
        };
        self.advance();
        let value = self.parse_assignment();
        self.alloc_expr(start, ExprKind::Assign { op, target, value })
    }

    fn parse_logical_or(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_logical_and();
        while self.eat(TokenKind::OrOr).is_some() {
            let right = self.parse_logical_and();
            left = self.alloc_expr(
                start,
                ExprKind::Binary {
                    op: BinaryOp::LogicalOr,
                    left,
                    right,
                },
            );
        }
        left
    }

    fn parse_logical_and(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_bit_or();
        while self.eat(TokenKind::AndAnd).is_some() {
            let right = self.parse_bit_or();
            left = self.alloc_expr(
                start,
                ExprKind::Binary {
                    op: BinaryOp::LogicalAnd,
                    left,
                    right,
                },
            );
        }
        left
    }

    fn parse_bit_or(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_bit_xor();
        while self.eat(TokenKind::Pipe).is_some() {
            let right = self.parse_bit_xor();
            left = self.alloc_expr(
                start,
                ExprKind::Binary {
                    op: BinaryOp::BitOr,
                    left,
                    right,
                },
            );
        }
        left
    }

    fn parse_bit_xor(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_bit_and();
        while self.eat(TokenKind::Caret).is_some() {
            let right = self.parse_bit_and();
            left = self.alloc_expr(
                start,
                ExprKind::Binary {
                    op: BinaryOp::BitXor,
                    left,
                    right,
                },
            );
        }
        left
    }

    fn parse_bit_and(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_equality();
        while self.eat(TokenKind::Amp).is_some() {
            let right = self.parse_equality();
            left = self.alloc_expr(
                start,
                ExprKind::Binary {
                    op: BinaryOp::BitAnd,
                    left,
                    right,
                },
            );
        }
        left
    }

    fn parse_equality(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_relational();
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational();
            left = self.alloc_expr(start, ExprKind::Binary { op, left, right });
        }
        left
    }

    fn parse_relational(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_shift();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_shift();
            left = self.alloc_expr(start, ExprKind::Binary { op, left, right });
        }
        left
    }

    fn parse_shift(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_additive();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive();
            left = self.alloc_expr(start, ExprKind::Binary { op, left, right });
        }
        left
    }

    fn parse_additive(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative();
            left = self.alloc_expr(start, ExprKind::Binary { op, left, right });
        }
        left
    }

    fn parse_multiplicative(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut left = self.parse_unary();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary();
            left = self.alloc_expr(start, ExprKind::Binary { op, left, right });
        }
        left
    }

    fn parse_unary(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let op = match self.peek_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Increment => UnaryOp::PreIncrement,
            TokenKind::Decrement => UnaryOp::PreDecrement,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary();
        self.alloc_expr(start, ExprKind::Unary { op, operand })
    }

    fn parse_postfix(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let mut expr = self.parse_primary();
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    match self.expect(TokenKind::Identifier) {
                        Some(token) => {
                            expr = self.alloc_expr(
                                start,
                                ExprKind::Member {
                                    object: expr,
                                    name: token.lexeme,
                                },
                            );
                        }
                        None => break,
                    }
                }
                TokenKind::LBracket => {
                    let open = self.start();
                    self.advance();
                    let index = self.parse_expression();
                    self.expect_closer(TokenKind::RBracket, open);
                    expr = self.alloc_expr(
                        start,
                        ExprKind::Index {
                            object: expr,
                            index,
                        },
                    );
                }
                TokenKind::LParen => {
                    let args = self.parse_argument_list();
                    expr = self.alloc_expr(start, ExprKind::Call { callee: expr, args });
                }
                TokenKind::Increment => {
                    self.advance();
                    expr = self.alloc_expr(
                        start,
                        ExprKind::Postfix {
                            op: PostfixOp::Increment,
                            operand: expr,
                        },
                    );
                }
                TokenKind::Decrement => {
                    self.advance();
                    expr = self.alloc_expr(
                        start,
                        ExprKind::Postfix {
                            op: PostfixOp::Decrement,
                            operand: expr,
                        },
                    );
                }
                TokenKind::Lt if self.generic_arguments_ahead() => {
                    // The trial parse proved `<types>(`. Generic calls
                    // are not part of the surface; report once, skip the
                    // argument list, and keep the callee so the call
                    // still binds.
                    let lt_location = self.peek().location;
                    self.error_at(
                        "generic type arguments are not supported".to_string(),
                        lt_location,
                    );
                    self.skip_generic_arguments();
                    let args = self.parse_argument_list();
                    expr = self.alloc_expr(start, ExprKind::Call { callee: expr, args });
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_argument_list(&mut self) -> Vec<&'a Expr<'a>> {
        let open = self.start();
        let mut args = Vec::new();
        self.expect(TokenKind::LParen);
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression());
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect_closer(TokenKind::RParen, open);
        args
    }

    /// Bounded trial parse starting at `<`: true iff a comma-separated
    /// type list closed by `>` immediately followed by `(` lies ahead.
    /// The cursor is always restored; nothing is reported.
    fn generic_arguments_ahead(&mut self) -> bool {
        let snapshot = self.snapshot();
        debug_assert!(self.check(TokenKind::Lt));
        self.advance();

        let mut well_formed = true;
        loop {
            if !self.scan_type_shape() {
                well_formed = false;
                break;
            }
            match self.peek_kind() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::Gt => {
                    self.advance();
                    break;
                }
                _ => {
                    well_formed = false;
                    break;
                }
            }
        }
        let result = well_formed && self.check(TokenKind::LParen);
        self.restore(snapshot);
        result
    }

    /// Consumes one type-shaped token run: primitive or dotted name plus
    /// `*` / `[]` / `[n]` suffixes. Pure cursor movement, no allocation.
    fn scan_type_shape(&mut self) -> bool {
        match self.peek_kind() {
            kind if kind.is_primitive_type() => {
                self.advance();
            }
            TokenKind::Identifier => {
                self.advance();
                while self.check(TokenKind::Dot) {
                    self.advance();
                    if self.eat(TokenKind::Identifier).is_none() {
                        return false;
                    }
                }
            }
            _ => return false,
        }
        loop {
            match self.peek_kind() {
                TokenKind::Star => {
                    self.advance();
                }
                TokenKind::LBracket => {
                    self.advance();
                    if self.check(TokenKind::IntLiteral) {
                        self.advance();
                    }
                    if self.eat(TokenKind::RBracket).is_none() {
                        return false;
                    }
                }
                _ => break,
            }
        }
        true
    }

    /// Skips a `<types>` run the trial parse already validated.
    fn skip_generic_arguments(&mut self) {
        self.advance(); // `<`
        let mut depth = 1usize;
        while depth > 0 && !self.at_eof() {
            match self.peek_kind() {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_primary(&mut self) -> &'a Expr<'a> {
        let start = self.start();
        let token = *self.peek();
        match token.kind {
            TokenKind::IntLiteral => self.literal(start, LiteralKind::Int),
            TokenKind::LongLiteral => self.literal(start, LiteralKind::Long),
            TokenKind::FloatLiteral => self.literal(start, LiteralKind::Float),
            TokenKind::DoubleLiteral => self.literal(start, LiteralKind::Double),
            TokenKind::StringLiteral => self.literal(start, LiteralKind::Str),
            TokenKind::CharLiteral => self.literal(start, LiteralKind::Char),
            TokenKind::True | TokenKind::False => self.literal(start, LiteralKind::Bool),
            TokenKind::Null => self.literal(start, LiteralKind::Null),
            TokenKind::Identifier => {
                self.advance();
                self.alloc_expr(start, ExprKind::Name(token.lexeme))
            }
            TokenKind::This => {
                self.advance();
                self.alloc_expr(start, ExprKind::This)
            }
            TokenKind::LParen => {
                let open = self.start();
                self.advance();
                let inner = self.parse_expression();
                self.expect_closer(TokenKind::RParen, open);
                self.alloc_expr(start, ExprKind::Paren(inner))
            }
            TokenKind::New => {
                self.advance();
                match self.parse_type_ref() {
                    Some(ty) => {
                        let args = self.parse_argument_list();
                        self.alloc_expr(start, ExprKind::New { ty, args })
                    }
                    None => self.alloc_expr(start, ExprKind::Error),
                }
            }
            _ => {
                self.error(format!(
                    "expected an expression, found {}",
                    token.kind.describe()
                ));
                self.alloc_expr(start, ExprKind::Error)
            }
        }
    }

    fn literal(&mut self, start: sable_base::SourceLocation, kind: LiteralKind) -> &'a Expr<'a> {
        let token = self.advance();
        let value = token.literal.unwrap_or(LiteralValue::Null);
        self.alloc_expr(start, ExprKind::Literal { kind, value })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::with_unit;
    use crate::ast::{BinaryOp, DeclKind, Expr, ExprKind, StmtKind};

    fn first_expr<'u, 'a>(unit: &'u crate::ast::CompilationUnit<'a>) -> &'a Expr<'a> {
        let DeclKind::Method { body, .. } = &unit.decls[0].kind else {
            panic!("expected method");
        };
        let StmtKind::Block(stmts) = &body.unwrap().kind else {
            panic!("expected block");
        };
        match &stmts[0].kind {
            StmtKind::Expr(expr) => expr,
            StmtKind::Return(Some(expr)) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        with_unit("int f() { return 1 + 2 * 3; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let ExprKind::Binary { op, right, .. } = &first_expr(unit).kind else {
                panic!("expected binary");
            };
            assert_eq!(*op, BinaryOp::Add);
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        });
    }

    #[test]
    fn assignment_is_right_associative() {
        with_unit("void f() { a = b = 1; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let ExprKind::Assign { value, .. } = &first_expr(unit).kind else {
                panic!("expected assignment");
            };
            assert!(matches!(value.kind, ExprKind::Assign { .. }));
        });
    }

    #[test]
    fn comparison_chain_with_logical_ops() {
        with_unit("void f() { x = a < b && b <= c || !d; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let ExprKind::Assign { value, .. } = &first_expr(unit).kind else {
                panic!("expected assignment");
            };
            assert!(matches!(
                value.kind,
                ExprKind::Binary {
                    op: BinaryOp::LogicalOr,
                    ..
                }
            ));
        });
    }

    #[test]
    fn postfix_chain_member_index_call() {
        with_unit("void f() { a.b[0].c(1, 2); }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let ExprKind::Call { callee, args } = &first_expr(unit).kind else {
                panic!("expected call");
            };
            assert_eq!(args.len(), 2);
            assert!(matches!(callee.kind, ExprKind::Member { .. }));
        });
    }

    #[test]
    fn new_with_constructor_arguments() {
        with_unit("void f() { var p = new Pt(3); }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let DeclKind::Method { body, .. } = &unit.decls[0].kind else {
                panic!("expected method");
            };
            let StmtKind::Block(stmts) = &body.unwrap().kind else {
                panic!("expected block");
            };
            let StmtKind::LocalVar { declarators, .. } = &stmts[0].kind else {
                panic!("expected local var");
            };
            let DeclKind::Declarator { initializer, .. } = &declarators[0].kind else {
                panic!("expected declarator");
            };
            assert!(matches!(
                initializer.unwrap().kind,
                ExprKind::New { .. }
            ));
        });
    }

    #[test]
    fn less_than_is_comparison_without_call_parens() {
        with_unit("void f() { x = a < b; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let ExprKind::Assign { value, .. } = &first_expr(unit).kind else {
                panic!("expected assignment");
            };
            assert!(matches!(
                value.kind,
                ExprKind::Binary {
                    op: BinaryOp::Lt,
                    ..
                }
            ));
        });
    }

    #[test]
    fn nested_comparisons_are_not_mistaken_for_generics() {
        // `a < b > c` parses as (a < b) > c, not a generic call.
        with_unit("void f() { x = a < b > c; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let ExprKind::Assign { value, .. } = &first_expr(unit).kind else {
                panic!("expected assignment");
            };
            assert!(matches!(
                value.kind,
                ExprKind::Binary {
                    op: BinaryOp::Gt,
                    ..
                }
            ));
        });
    }

    #[test]
    fn generic_looking_call_reports_and_recovers() {
        with_unit("void f() { m<int>(1); }", |unit, diags, _| {
            assert_eq!(diags.len(), 1);
            assert!(diags
                .iter()
                .next()
                .unwrap()
                .message
                .contains("generic"));
            // The call node survived with its argument.
            let DeclKind::Method { body, .. } = &unit.decls[0].kind else {
                panic!("expected method");
            };
            let StmtKind::Block(stmts) = &body.unwrap().kind else {
                panic!("expected block");
            };
            assert!(matches!(stmts[0].kind, StmtKind::Expr(_)));
        });
    }

    #[test]
    fn unary_operators_nest() {
        with_unit("void f() { x = -~!y; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let ExprKind::Assign { value, .. } = &first_expr(unit).kind else {
                panic!("expected assignment");
            };
            let ExprKind::Unary { operand, .. } = &value.kind else {
                panic!("expected unary");
            };
            assert!(matches!(operand.kind, ExprKind::Unary { .. }));
        });
    }
}
