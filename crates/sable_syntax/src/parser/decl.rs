//! Declaration-level grammar: compilation units, using directives,
//! namespaces, type declarations, members, parameters, and type
//! references.

use super::Parser;
use crate::ast::{
    Accessor, AccessorBody, CompilationUnit, Decl, DeclKind, Modifiers, PrimitiveName, TypeRef,
    TypeRefKind,
};
use crate::token::TokenKind;
use sable_base::{SourceLocation, Symbol};

impl<'a, 'i> Parser<'a, 'i> {
    pub(crate) fn parse_unit(&mut self) -> CompilationUnit<'a> {
        let start = self.start();
        let mut usings = Vec::new();
        let mut decls = Vec::new();

        while self.check(TokenKind::Using) {
            if let Some(using) = self.parse_using() {
                usings.push(using);
            }
        }

        while !self.at_eof() {
            match self.peek_kind() {
                TokenKind::Using => {
                    self.error("using directives must precede declarations".to_string());
                    if let Some(using) = self.parse_using() {
                        usings.push(using);
                    }
                }
                _ => {
                    if let Some(decl) = self.parse_top_level() {
                        decls.push(decl);
                    }
                }
            }
        }

        let id = self.next_node_id();
        CompilationUnit {
            id,
            location: self.span_from(start),
            usings,
            decls,
        }
    }

    fn parse_using(&mut self) -> Option<&'a Decl<'a>> {
        let start = self.start();
        self.expect(TokenKind::Using)?;
        let path = self.parse_qualified_name()?;
        self.expect(TokenKind::Semicolon);
        let id = self.next_node_id();
        Some(self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Using { path },
        }))
    }

    /// Namespace, type, or free function. On an unrecognized token,
    /// records one error and synchronizes to the next declaration
    /// boundary.
    fn parse_top_level(&mut self) -> Option<&'a Decl<'a>> {
        let modifiers = self.parse_modifiers();

        match self.peek_kind() {
            TokenKind::Namespace => {
                if !modifiers.is_empty() {
                    self.error("modifiers are not valid on a namespace".to_string());
                }
                self.parse_namespace()
            }
            TokenKind::Class | TokenKind::Struct => self.parse_type_decl(modifiers),
            kind if kind.starts_type() => self.parse_function(modifiers),
            _ => {
                let found = *self.peek();
                self.error(format!(
                    "expected a namespace, type, or function declaration, found {}",
                    found.kind.describe()
                ));
                self.advance();
                self.sync_member();
                None
            }
        }
    }

    fn parse_namespace(&mut self) -> Option<&'a Decl<'a>> {
        let start = self.start();
        self.expect(TokenKind::Namespace)?;
        let path = self.parse_qualified_name()?;

        if self.eat(TokenKind::Semicolon).is_some() {
            // File-scoped form: the rest of the file belongs to this
            // namespace.
            let mut members = Vec::new();
            while !self.at_eof() {
                if let Some(member) = self.parse_top_level() {
                    members.push(member);
                }
            }
            let id = self.next_node_id();
            return Some(self.ctx.decls.alloc(Decl {
                id,
                location: self.span_from(start),
                kind: DeclKind::Namespace {
                    path,
                    members,
                    file_scoped: true,
                },
            }));
        }

        let open = self.start();
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.at_eof() && !self.check(TokenKind::RBrace) {
            if let Some(member) = self.parse_top_level() {
                members.push(member);
            }
        }
        self.expect_closer(TokenKind::RBrace, open);

        let id = self.next_node_id();
        Some(self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Namespace {
                path,
                members,
                file_scoped: false,
            },
        }))
    }

    fn parse_type_decl(&mut self, modifiers: Modifiers) -> Option<&'a Decl<'a>> {
        let start = self.start();
        let is_struct = self.peek_kind() == TokenKind::Struct;
        self.advance(); // class / struct
        let name = self.expect(TokenKind::Identifier)?.lexeme;

        let mut bases = Vec::new();
        if self.eat(TokenKind::Colon).is_some() {
            loop {
                if let Some(base) = self.parse_type_ref() {
                    bases.push(base);
                }
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        let open = self.start();
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.at_eof() && !self.check(TokenKind::RBrace) {
            if let Some(member) = self.parse_member(name) {
                members.push(member);
            }
        }
        self.expect_closer(TokenKind::RBrace, open);

        let id = self.next_node_id();
        Some(self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Type {
                modifiers,
                is_struct,
                name,
                bases,
                members,
            },
        }))
    }

    /// One member of a class body. `type_name` is the enclosing type's
    /// name, used to recognize constructors and destructors.
    fn parse_member(&mut self, type_name: Symbol) -> Option<&'a Decl<'a>> {
        let modifiers = self.parse_modifiers();

        // Destructor: `~Name() { ... }`
        if self.check(TokenKind::Tilde) {
            return self.parse_destructor(type_name);
        }

        // Constructor: `Name(` where Name is the enclosing type.
        if self.peek_kind() == TokenKind::Identifier
            && self.peek().lexeme == type_name
            && self.peek_at(1).kind == TokenKind::LParen
        {
            return self.parse_constructor(modifiers);
        }

        let start = self.start();
        let Some(ty) = self.parse_type_ref() else {
            self.recover_member();
            return None;
        };
        let Some(name_token) = self.expect(TokenKind::Identifier) else {
            self.recover_member();
            return None;
        };
        let name = name_token.lexeme;
        let name_start = SourceLocation::point(
            name_token.location.file,
            name_token.location.line_start,
            name_token.location.col_start,
        );

        match self.peek_kind() {
            TokenKind::LParen => self.parse_method_rest(start, modifiers, ty, name),
            TokenKind::LBrace => self.parse_property_rest(start, modifiers, ty, name),
            _ => self.parse_field_rest(start, modifiers, ty, name, name_start),
        }
    }

    /// After a member failed to parse: make sure the cursor moved, then
    /// skip to a declaration boundary.
    fn recover_member(&mut self) {
        self.advance();
        self.sync_member();
    }

    fn parse_destructor(&mut self, type_name: Symbol) -> Option<&'a Decl<'a>> {
        let start = self.start();
        self.expect(TokenKind::Tilde)?;
        let name_token = self.expect(TokenKind::Identifier)?;
        if name_token.lexeme != type_name {
            self.error_at(
                "destructor name must match the enclosing class".to_string(),
                name_token.location,
            );
        }
        let open = self.start();
        self.expect(TokenKind::LParen)?;
        self.expect_closer(TokenKind::RParen, open);
        let body = if self.check(TokenKind::LBrace) {
            Some(self.parse_block())
        } else {
            self.expect(TokenKind::Semicolon);
            None
        };
        let id = self.next_node_id();
        Some(self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Destructor {
                name: name_token.lexeme,
                body,
            },
        }))
    }

    fn parse_constructor(&mut self, modifiers: Modifiers) -> Option<&'a Decl<'a>> {
        let start = self.start();
        let name = self.expect(TokenKind::Identifier)?.lexeme;
        let params = self.parse_parameter_list();
        let body = if self.check(TokenKind::LBrace) {
            Some(self.parse_block())
        } else {
            self.expect(TokenKind::Semicolon);
            None
        };
        let id = self.next_node_id();
        Some(self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Constructor {
                modifiers,
                name,
                params,
                body,
            },
        }))
    }

    /// Free function or method: shared by top-level and member grammar.
    fn parse_function(&mut self, modifiers: Modifiers) -> Option<&'a Decl<'a>> {
        let start = self.start();
        let ty = self.parse_type_ref()?;
        let Some(name_token) = self.expect(TokenKind::Identifier) else {
            self.advance();
            self.sync_member();
            return None;
        };
        self.parse_method_rest(start, modifiers, ty, name_token.lexeme)
    }

    fn parse_method_rest(
        &mut self,
        start: SourceLocation,
        modifiers: Modifiers,
        return_type: &'a TypeRef<'a>,
        name: Symbol,
    ) -> Option<&'a Decl<'a>> {
        let params = self.parse_parameter_list();
        let body = if self.check(TokenKind::LBrace) {
            Some(self.parse_block())
        } else {
            // Extern and abstract methods end in `;` with no body.
            self.expect(TokenKind::Semicolon);
            None
        };
        let id = self.next_node_id();
        Some(self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Method {
                modifiers,
                return_type,
                name,
                params,
                body,
            },
        }))
    }

    fn parse_property_rest(
        &mut self,
        start: SourceLocation,
        modifiers: Modifiers,
        ty: &'a TypeRef<'a>,
        name: Symbol,
    ) -> Option<&'a Decl<'a>> {
        let open = self.start();
        self.expect(TokenKind::LBrace)?;

        let mut getter: Option<&'a Accessor<'a>> = None;
        let mut setter: Option<&'a Accessor<'a>> = None;

        while !self.at_eof() && !self.check(TokenKind::RBrace) {
            let token = *self.peek();
            let is_get = self.is_contextual(&token, "get");
            let is_set = self.is_contextual(&token, "set");
            if !is_get && !is_set {
                self.error("expected 'get' or 'set' accessor".to_string());
                self.advance();
                continue;
            }
            let accessor = self.parse_accessor(is_get);
            let duplicate = if is_get {
                getter.is_some()
            } else {
                setter.is_some()
            };
            if duplicate {
                let which = if is_get { "get" } else { "set" };
                self.error_at(format!("duplicate '{which}' accessor"), token.location);
            } else if is_get {
                getter = accessor;
            } else {
                setter = accessor;
            }
        }
        self.expect_closer(TokenKind::RBrace, open);

        let id = self.next_node_id();
        Some(self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Property {
                modifiers,
                ty,
                name,
                getter,
                setter,
            },
        }))
    }

    fn parse_accessor(&mut self, is_getter: bool) -> Option<&'a Accessor<'a>> {
        let start = self.start();
        self.advance(); // get / set identifier

        let body = if self.eat(TokenKind::Semicolon).is_some() {
            AccessorBody::Auto
        } else if self.eat(TokenKind::FatArrow).is_some() {
            let expr = self.parse_expression();
            self.expect(TokenKind::Semicolon);
            AccessorBody::Expr(expr)
        } else if self.check(TokenKind::LBrace) {
            AccessorBody::Block(self.parse_block())
        } else {
            self.error("expected ';', '=>', or a block after accessor".to_string());
            self.sync_statement();
            AccessorBody::Auto
        };

        let id = self.next_node_id();
        Some(self.ctx.accessors.alloc(Accessor {
            id,
            location: self.span_from(start),
            is_getter,
            body,
        }))
    }

    fn parse_field_rest(
        &mut self,
        start: SourceLocation,
        modifiers: Modifiers,
        ty: &'a TypeRef<'a>,
        first_name: Symbol,
        first_name_start: SourceLocation,
    ) -> Option<&'a Decl<'a>> {
        let mut declarators = Vec::new();
        declarators.push(self.parse_declarator_with_name(first_name_start, first_name));
        while self.eat(TokenKind::Comma).is_some() {
            let decl_start = self.start();
            match self.expect(TokenKind::Identifier) {
                Some(token) => {
                    declarators.push(self.parse_declarator_with_name(decl_start, token.lexeme))
                }
                None => break,
            }
        }
        self.expect(TokenKind::Semicolon);

        let id = self.next_node_id();
        Some(self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Field {
                modifiers,
                ty,
                declarators,
            },
        }))
    }

    /// One `name (= initializer)?` declarator; used by fields and local
    /// variable statements.
    pub(crate) fn parse_declarator_with_name(
        &mut self,
        start: SourceLocation,
        name: Symbol,
    ) -> &'a Decl<'a> {
        let initializer = if self.eat(TokenKind::Assign).is_some() {
            Some(self.parse_expression())
        } else {
            None
        };
        let id = self.next_node_id();
        self.ctx.decls.alloc(Decl {
            id,
            location: self.span_from(start),
            kind: DeclKind::Declarator { name, initializer },
        })
    }

    pub(crate) fn parse_parameter_list(&mut self) -> Vec<&'a Decl<'a>> {
        let open = self.start();
        let mut params = Vec::new();
        if self.expect(TokenKind::LParen).is_none() {
            return params;
        }
        if !self.check(TokenKind::RParen) {
            loop {
                let start = self.start();
                let Some(ty) = self.parse_type_ref() else {
                    break;
                };
                let Some(name_token) = self.expect(TokenKind::Identifier) else {
                    break;
                };
                let id = self.next_node_id();
                params.push(&*self.ctx.decls.alloc(Decl {
                    id,
                    location: self.span_from(start),
                    kind: DeclKind::Parameter {
                        ty,
                        name: name_token.lexeme,
                    },
                }));
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect_closer(TokenKind::RParen, open);
        params
    }

    // === Modifiers, names, type references ===

    pub(crate) fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::NONE;
        loop {
            let flag = match self.peek_kind() {
                TokenKind::Public => Modifiers::PUBLIC,
                TokenKind::Private => Modifiers::PRIVATE,
                TokenKind::Protected => Modifiers::PROTECTED,
                TokenKind::Internal => Modifiers::INTERNAL,
                TokenKind::Static => Modifiers::STATIC,
                TokenKind::Readonly => Modifiers::READONLY,
                TokenKind::Virtual => Modifiers::VIRTUAL,
                TokenKind::Override => Modifiers::OVERRIDE,
                TokenKind::Abstract => Modifiers::ABSTRACT,
                TokenKind::Extern => Modifiers::EXTERN,
                _ => break,
            };
            if modifiers.contains(flag) {
                let loc = self.peek().location;
                self.error_at("duplicate modifier".to_string(), loc);
            }
            modifiers.insert(flag);
            self.advance();
        }
        modifiers
    }

    /// `Ident (. Ident)*`
    pub(crate) fn parse_qualified_name(&mut self) -> Option<Vec<Symbol>> {
        let mut parts = vec![self.expect(TokenKind::Identifier)?.lexeme];
        while self.eat(TokenKind::Dot).is_some() {
            match self.expect(TokenKind::Identifier) {
                Some(token) => parts.push(token.lexeme),
                None => break,
            }
        }
        Some(parts)
    }

    /// Primitive keyword or qualified name, followed by any number of
    /// `*` (pointer) and `[]` / `[n]` (array) suffixes.
    pub(crate) fn parse_type_ref(&mut self) -> Option<&'a TypeRef<'a>> {
        let start = self.start();
        let base_kind = match self.peek_kind() {
            TokenKind::Void => Some(PrimitiveName::Void),
            TokenKind::Bool => Some(PrimitiveName::Bool),
            TokenKind::Char => Some(PrimitiveName::Char),
            TokenKind::Int => Some(PrimitiveName::Int),
            TokenKind::Long => Some(PrimitiveName::Long),
            TokenKind::Float => Some(PrimitiveName::Float),
            TokenKind::Double => Some(PrimitiveName::Double),
            TokenKind::String => Some(PrimitiveName::String),
            _ => None,
        };

        let mut ty = if let Some(primitive) = base_kind {
            self.advance();
            let id = self.next_node_id();
            &*self.ctx.types.alloc(TypeRef {
                id,
                location: self.span_from(start),
                kind: TypeRefKind::Primitive(primitive),
            })
        } else if self.check(TokenKind::Identifier) {
            let parts = self.parse_qualified_name()?;
            let id = self.next_node_id();
            &*self.ctx.types.alloc(TypeRef {
                id,
                location: self.span_from(start),
                kind: TypeRefKind::Named(parts),
            })
        } else {
            let found = self.peek_kind();
            self.error(format!("expected a type, found {}", found.describe()));
            return None;
        };

        loop {
            if self.eat(TokenKind::Star).is_some() {
                let id = self.next_node_id();
                ty = self.ctx.types.alloc(TypeRef {
                    id,
                    location: self.span_from(start),
                    kind: TypeRefKind::Pointer(ty),
                });
            } else if self.check(TokenKind::LBracket) {
                let open = self.start();
                self.advance();
                let size = match self.peek_kind() {
                    TokenKind::IntLiteral => {
                        let token = self.advance();
                        match token.literal {
                            Some(crate::token::LiteralValue::Int(v)) if v >= 0 => Some(v as u32),
                            _ => {
                                self.error_at(
                                    "array size must be a non-negative integer".to_string(),
                                    token.location,
                                );
                                None
                            }
                        }
                    }
                    _ => None,
                };
                self.expect_closer(TokenKind::RBracket, open);
                let id = self.next_node_id();
                ty = self.ctx.types.alloc(TypeRef {
                    id,
                    location: self.span_from(start),
                    kind: TypeRefKind::Array(ty, size),
                });
            } else {
                break;
            }
        }
        Some(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::with_unit;
    use crate::ast::{AccessorBody, DeclKind, StmtKind, TypeRefKind};

    #[test]
    fn empty_file_parses_to_empty_unit() {
        with_unit("", |unit, diags, _| {
            assert!(unit.usings.is_empty());
            assert!(unit.decls.is_empty());
            assert!(!diags.has_errors());
        });
    }

    #[test]
    fn using_directives_collect_in_order() {
        with_unit("using A.B; using C;", |unit, diags, interner| {
            assert_eq!(unit.usings.len(), 2);
            let DeclKind::Using { path } = &unit.usings[0].kind else {
                panic!("expected using");
            };
            let names: Vec<_> = path.iter().map(|s| interner.resolve(*s)).collect();
            assert_eq!(names, vec!["A", "B"]);
            assert!(!diags.has_errors());
        });
    }

    #[test]
    fn class_with_field_method_constructor() {
        let src = "class Pt { int x; Pt(int v) { x = v; } int get_x() { return x; } }";
        with_unit(src, |unit, diags, _| {
            assert!(!diags.has_errors());
            let DeclKind::Type { members, .. } = &unit.decls[0].kind else {
                panic!("expected type");
            };
            assert_eq!(members.len(), 3);
            assert!(matches!(members[0].kind, DeclKind::Field { .. }));
            assert!(matches!(members[1].kind, DeclKind::Constructor { .. }));
            assert!(matches!(members[2].kind, DeclKind::Method { .. }));
        });
    }

    #[test]
    fn destructor_requires_matching_name() {
        with_unit("class A { ~B() { } }", |_, diags, _| {
            assert_eq!(diags.len(), 1);
            assert!(diags
                .iter()
                .next()
                .unwrap()
                .message
                .contains("destructor name"));
        });
    }

    #[test]
    fn property_accessor_forms() {
        let src = "class C { int auto_prop { get; set; } int arrow { get => 1; } }";
        with_unit(src, |unit, diags, _| {
            assert!(!diags.has_errors(), "{:?}", diags.iter().collect::<Vec<_>>());
            let DeclKind::Type { members, .. } = &unit.decls[0].kind else {
                panic!("expected type");
            };
            let DeclKind::Property { getter, setter, .. } = &members[0].kind else {
                panic!("expected property");
            };
            assert!(matches!(getter.unwrap().body, AccessorBody::Auto));
            assert!(matches!(setter.unwrap().body, AccessorBody::Auto));
            let DeclKind::Property { getter, setter, .. } = &members[1].kind else {
                panic!("expected property");
            };
            assert!(matches!(getter.unwrap().body, AccessorBody::Expr(_)));
            assert!(setter.is_none());
        });
    }

    #[test]
    fn method_named_get_is_not_a_property() {
        with_unit("class C { int x; int get() { return x; } }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let DeclKind::Type { members, .. } = &unit.decls[0].kind else {
                panic!("expected type");
            };
            assert!(matches!(members[1].kind, DeclKind::Method { .. }));
        });
    }

    #[test]
    fn missing_close_brace_reports_once_and_keeps_members() {
        with_unit("class C { int x;", |unit, diags, _| {
            assert_eq!(diags.len(), 1);
            let DeclKind::Type { members, .. } = &unit.decls[0].kind else {
                panic!("expected type");
            };
            assert_eq!(members.len(), 1);
        });
    }

    #[test]
    fn namespace_block_and_file_scoped() {
        with_unit("namespace A.B { class C { } }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let DeclKind::Namespace {
                members,
                file_scoped,
                ..
            } = &unit.decls[0].kind
            else {
                panic!("expected namespace");
            };
            assert!(!*file_scoped);
            assert_eq!(members.len(), 1);
        });
        with_unit("namespace A; class C { } class D { }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let DeclKind::Namespace {
                members,
                file_scoped,
                ..
            } = &unit.decls[0].kind
            else {
                panic!("expected namespace");
            };
            assert!(*file_scoped);
            assert_eq!(members.len(), 2);
        });
    }

    #[test]
    fn pointer_and_array_type_suffixes() {
        with_unit("class C { int*[] xs; }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let DeclKind::Type { members, .. } = &unit.decls[0].kind else {
                panic!("expected type");
            };
            let DeclKind::Field { ty, .. } = &members[0].kind else {
                panic!("expected field");
            };
            let TypeRefKind::Array(element, None) = &ty.kind else {
                panic!("expected array type");
            };
            assert!(matches!(element.kind, TypeRefKind::Pointer(_)));
        });
    }

    #[test]
    fn extern_top_level_function_has_no_body() {
        with_unit("extern void print(string s);", |unit, diags, _| {
            assert!(!diags.has_errors());
            let DeclKind::Method {
                modifiers, body, ..
            } = &unit.decls[0].kind
            else {
                panic!("expected method");
            };
            assert!(modifiers.is_extern());
            assert!(body.is_none());
        });
    }

    #[test]
    fn top_level_function_with_body_parses() {
        with_unit("void g() { while (true) { break; } }", |unit, diags, _| {
            assert!(!diags.has_errors());
            let DeclKind::Method { body, .. } = &unit.decls[0].kind else {
                panic!("expected method");
            };
            assert!(matches!(body.unwrap().kind, StmtKind::Block(_)));
        });
    }
}
