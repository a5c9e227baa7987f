//! Bound-tree construction.
//!
//! One walk over the syntax tree that mirrors it into the bound arena,
//! resolving what is locally resolvable: declared types are attached to
//! their symbols, literals are decoded into constants, names are looked
//! up through the scope tree, and an identifier that resolves to a
//! non-static member of the enclosing type is rewritten into an explicit
//! `this.x` member access. Everything that needs full type information -
//! overload selection, member lookup through arbitrary object types,
//! indexers - is left `None` for the resolution pass.
//!
//! Implicit conversions chosen by the classifier are made explicit as
//! [`BoundExprKind::Conversion`] wrappers so the lowerer never has to
//! re-derive them.

use crate::bound::{
    BoundAccessor, BoundDecl, BoundDeclId, BoundDeclKind, BoundExpr, BoundExprId, BoundExprKind,
    BoundStmt, BoundStmtId, BoundStmtKind, BoundTree, ConstantValue, ValueCategory, VariableFlavor,
};
use crate::convert::{classify, ConversionKind};
use crate::symbols::{SymbolId, SymbolKind, SymbolTable};
use crate::types::{PrimitiveKind, TypeId, TypeSystem};
use sable_base::{Diagnostics, ErrorKind, Interner, SourceLocation, Symbol};
use sable_syntax::ast::{
    Accessor, AccessorBody, BinaryOp, CompilationUnit, Decl, DeclKind, Expr, ExprKind, LiteralKind,
    PostfixOp, Stmt, StmtKind, TypeRef, TypeRefKind, UnaryOp,
};
use sable_syntax::token::LiteralValue;

/// Binds one compilation unit over an already-built scope tree.
pub fn bind(
    unit: &CompilationUnit<'_>,
    symbols: &mut SymbolTable,
    types: &mut TypeSystem,
    interner: &mut Interner,
    diags: &mut Diagnostics,
) -> BoundTree {
    let mut binder = Binder {
        tree: BoundTree::new(),
        symbols,
        types,
        interner,
        diags,
        scopes: Vec::new(),
    };
    binder.bind_unit(unit);
    binder.tree
}

struct Binder<'s> {
    tree: BoundTree,
    symbols: &'s mut SymbolTable,
    types: &'s mut TypeSystem,
    interner: &'s mut Interner,
    diags: &'s mut Diagnostics,
    scopes: Vec<SymbolId>,
}

impl<'s> Binder<'s> {
    fn scope(&self) -> SymbolId {
        *self.scopes.last().expect("scope stack never empty")
    }

    fn error(&mut self, message: String, location: SourceLocation) {
        self.diags.report(ErrorKind::Bind, message, location);
    }

    fn alloc(
        &mut self,
        location: SourceLocation,
        ty: Option<TypeId>,
        value_category: ValueCategory,
        constant: Option<ConstantValue>,
        kind: BoundExprKind,
    ) -> BoundExprId {
        self.tree.alloc_expr(BoundExpr {
            location,
            ty,
            value_category,
            constant,
            kind,
        })
    }

    fn rvalue(
        &mut self,
        location: SourceLocation,
        ty: Option<TypeId>,
        kind: BoundExprKind,
    ) -> BoundExprId {
        self.alloc(location, ty, ValueCategory::RValue, None, kind)
    }

    // === Types ===

    /// Resolves a syntactic type reference against the scope tree.
    fn resolve_type_ref(&mut self, ty: &TypeRef<'_>) -> Option<TypeId> {
        match &ty.kind {
            TypeRefKind::Primitive(name) => {
                Some(self.types.primitive(PrimitiveKind::from_name(*name)))
            }
            TypeRefKind::Named(parts) => {
                match self.symbols.resolve_path(self.scope(), parts) {
                    Some(symbol) => match self.symbols.as_type(symbol) {
                        Some(data) => data.ty,
                        None => {
                            let name = self.path_text(parts);
                            let described = self.symbols.get(symbol).kind.describe();
                            self.error(
                                format!("'{name}' is a {described}, not a type"),
                                ty.location,
                            );
                            None
                        }
                    },
                    None => {
                        let name = self.path_text(parts);
                        self.error(format!("unknown type '{name}'"), ty.location);
                        None
                    }
                }
            }
            TypeRefKind::Pointer(inner) => {
                let pointee = self.resolve_type_ref(inner)?;
                Some(self.types.pointer(pointee))
            }
            TypeRefKind::Array(element, size) => {
                let element = self.resolve_type_ref(element)?;
                Some(self.types.array(element, *size))
            }
        }
    }

    fn path_text(&self, parts: &[Symbol]) -> String {
        let names: Vec<&str> = parts.iter().map(|p| self.interner.resolve(*p)).collect();
        names.join(".")
    }

    /// Wraps `expr` in a conversion to `target` when the classifier
    /// requires one; reports a bind error when no implicit conversion
    /// exists.
    fn coerce(&mut self, expr: BoundExprId, target: TypeId, location: SourceLocation) -> BoundExprId {
        let Some(source) = self.tree.expr(expr).ty else {
            return expr;
        };
        let conversion = classify(self.types, self.symbols, source, target);
        match conversion {
            ConversionKind::Identity => expr,
            kind if kind.is_implicit() => self.alloc(
                location,
                Some(target),
                ValueCategory::RValue,
                None,
                BoundExprKind::Conversion {
                    operand: expr,
                    conversion: kind,
                },
            ),
            _ => {
                let from = self.type_text(source);
                let to = self.type_text(target);
                self.error(
                    format!("cannot implicitly convert '{from}' to '{to}'"),
                    location,
                );
                expr
            }
        }
    }

    fn type_text(&self, ty: TypeId) -> String {
        self.types.display(ty, self.symbols, self.interner)
    }

    // === Unit and declarations ===

    fn bind_unit(&mut self, unit: &CompilationUnit<'_>) {
        self.scopes.push(self.symbols.root());

        for using in &unit.usings {
            if let DeclKind::Using { path } = &using.kind {
                let stmt = self.tree.alloc_stmt(BoundStmt {
                    location: using.location,
                    kind: BoundStmtKind::Using {
                        path: path.clone(),
                        target_namespace: None,
                    },
                });
                self.tree.usings.push(stmt);
            }
        }

        let mut root = Vec::new();
        for decl in &unit.decls {
            self.bind_decl_into(decl, &mut root);
        }
        self.tree.root = root;

        self.scopes.pop();
    }

    fn bind_decl_into(&mut self, decl: &Decl<'_>, out: &mut Vec<BoundDeclId>) {
        match &decl.kind {
            DeclKind::Namespace { path, members, .. } => {
                let symbol = self.symbols.node_symbols.get(&decl.id).copied();
                let Some(symbol) = symbol else {
                    return;
                };
                self.scopes.push(symbol);
                let mut bound_members = Vec::new();
                for member in members {
                    self.bind_decl_into(member, &mut bound_members);
                }
                self.scopes.pop();
                out.push(self.tree.alloc_decl(BoundDecl {
                    location: decl.location,
                    name: *path.last().unwrap_or(&Symbol::EMPTY),
                    symbol: Some(symbol),
                    kind: BoundDeclKind::Namespace {
                        members: bound_members,
                    },
                }));
            }
            DeclKind::Type { name, members, .. } => {
                let Some(symbol) = self.symbols.node_symbols.get(&decl.id).copied() else {
                    // Duplicate definition: first symbol won, this
                    // declaration is dropped.
                    return;
                };
                self.scopes.push(symbol);
                let mut bound_members = Vec::new();
                for member in members {
                    self.bind_decl_into(member, &mut bound_members);
                }
                self.scopes.pop();
                out.push(self.tree.alloc_decl(BoundDecl {
                    location: decl.location,
                    name: *name,
                    symbol: Some(symbol),
                    kind: BoundDeclKind::Type {
                        members: bound_members,
                    },
                }));
            }
            DeclKind::Field {
                ty, declarators, ..
            } => {
                let field_type = self.resolve_type_ref(ty);
                for declarator in declarators {
                    let DeclKind::Declarator { name, initializer } = &declarator.kind else {
                        continue;
                    };
                    let symbol = self.symbols.node_symbols.get(&declarator.id).copied();
                    if let (Some(symbol), Some(field_type)) = (symbol, field_type) {
                        self.symbols.set_value_type(symbol, field_type);
                    }
                    let bound_init = initializer.map(|init| {
                        let bound = self.bind_expr(init);
                        match field_type {
                            Some(target) => self.coerce(bound, target, init.location),
                            None => bound,
                        }
                    });
                    out.push(self.tree.alloc_decl(BoundDecl {
                        location: declarator.location,
                        name: *name,
                        symbol,
                        kind: BoundDeclKind::Variable {
                            type_expr: None,
                            initializer: bound_init,
                            flavor: VariableFlavor::Field,
                        },
                    }));
                }
            }
            DeclKind::Method {
                return_type,
                name,
                params,
                body,
                ..
            } => {
                if let Some(id) = self.bind_function(decl, Some(*return_type), name, params, *body, false) {
                    out.push(id);
                }
            }
            DeclKind::Constructor {
                name, params, body, ..
            } => {
                if let Some(id) = self.bind_function(decl, None, name, params, *body, true) {
                    out.push(id);
                }
            }
            DeclKind::Destructor { body, .. } => {
                let name = self.interner.intern("dtor");
                if let Some(id) = self.bind_function(decl, None, &name, &[], *body, false) {
                    out.push(id);
                }
            }
            DeclKind::Property {
                ty,
                name,
                getter,
                setter,
                modifiers,
            } => {
                if modifiers.is_static() {
                    self.error(
                        "static properties are not supported".to_string(),
                        decl.location,
                    );
                    return;
                }
                if let Some(id) = self.bind_property(decl, ty, *name, *getter, *setter) {
                    out.push(id);
                }
            }
            DeclKind::Using { .. } | DeclKind::Declarator { .. } | DeclKind::Parameter { .. } => {}
        }
    }

    fn bind_function(
        &mut self,
        decl: &Decl<'_>,
        return_type: Option<&TypeRef<'_>>,
        name: &Symbol,
        params: &[&Decl<'_>],
        body: Option<&Stmt<'_>>,
        is_constructor: bool,
    ) -> Option<BoundDeclId> {
        let symbol = self.symbols.node_symbols.get(&decl.id).copied()?;

        // Annotate the symbol: return type and parameter types.
        let ret = match return_type {
            Some(ty) => self.resolve_type_ref(ty),
            // Constructors and destructors return void.
            None => Some(self.types.void()),
        };
        if let Some(ret) = ret {
            if let Some(data) = self.symbols.as_function_mut(symbol) {
                data.return_type = Some(ret);
            }
        }

        self.scopes.push(symbol);

        let mut bound_params = Vec::with_capacity(params.len());
        for param in params {
            let DeclKind::Parameter { ty, name } = &param.kind else {
                continue;
            };
            let param_symbol = self.symbols.node_symbols.get(&param.id).copied();
            let param_type = self.resolve_type_ref(ty);
            if let (Some(param_symbol), Some(param_type)) = (param_symbol, param_type) {
                self.symbols.set_value_type(param_symbol, param_type);
            }
            bound_params.push(self.tree.alloc_decl(BoundDecl {
                location: param.location,
                name: *name,
                symbol: param_symbol,
                kind: BoundDeclKind::Variable {
                    type_expr: None,
                    initializer: None,
                    flavor: VariableFlavor::Parameter,
                },
            }));
        }

        let bound_body = body.map(|b| self.bind_stmt(b));
        self.scopes.pop();

        Some(self.tree.alloc_decl(BoundDecl {
            location: decl.location,
            name: *name,
            symbol: Some(symbol),
            kind: BoundDeclKind::Function {
                params: bound_params,
                body: bound_body,
                is_constructor,
            },
        }))
    }

    fn bind_property(
        &mut self,
        decl: &Decl<'_>,
        ty: &TypeRef<'_>,
        name: Symbol,
        getter: Option<&Accessor<'_>>,
        setter: Option<&Accessor<'_>>,
    ) -> Option<BoundDeclId> {
        let symbol = self.symbols.node_symbols.get(&decl.id).copied()?;
        let prop_type = self.resolve_type_ref(ty);

        if let Some(prop_type) = prop_type {
            self.symbols.set_value_type(symbol, prop_type);
            let backing = self.symbols.as_property(symbol).and_then(|p| p.backing_field);
            if let Some(backing) = backing {
                self.symbols.set_value_type(backing, prop_type);
            }
        }

        self.scopes.push(symbol);
        let bound_getter = getter.and_then(|a| self.bind_accessor(symbol, a, prop_type, true));
        let bound_setter = setter.and_then(|a| self.bind_accessor(symbol, a, prop_type, false));
        self.scopes.pop();

        Some(self.tree.alloc_decl(BoundDecl {
            location: decl.location,
            name,
            symbol: Some(symbol),
            kind: BoundDeclKind::Property {
                getter: bound_getter,
                setter: bound_setter,
            },
        }))
    }

    fn bind_accessor(
        &mut self,
        property: SymbolId,
        accessor: &Accessor<'_>,
        prop_type: Option<TypeId>,
        is_getter: bool,
    ) -> Option<BoundAccessor> {
        let function = self.symbols.node_symbols.get(&accessor.id).copied();

        // Finish the accessor function's signature.
        if let Some(function) = function {
            let ret = if is_getter {
                prop_type.unwrap_or_else(|| self.types.void())
            } else {
                self.types.void()
            };
            if let Some(data) = self.symbols.as_function_mut(function) {
                data.return_type = Some(ret);
            }
            if !is_getter {
                let value_param = self
                    .symbols
                    .as_function(function)
                    .and_then(|d| d.params.first().copied());
                if let (Some(value_param), Some(prop_type)) = (value_param, prop_type) {
                    self.symbols.set_value_type(value_param, prop_type);
                }
            }
        }

        let function_scope = function?;
        self.scopes.push(function_scope);
        let body = match &accessor.body {
            AccessorBody::Auto => self.synthesize_auto_accessor(property, accessor, is_getter),
            AccessorBody::Expr(expr) => {
                let bound = self.bind_expr(expr);
                let kind = if is_getter {
                    BoundStmtKind::Return(Some(bound))
                } else {
                    BoundStmtKind::Expr(bound)
                };
                Some(self.tree.alloc_stmt(BoundStmt {
                    location: accessor.location,
                    kind,
                }))
            }
            AccessorBody::Block(block) => Some(self.bind_stmt(block)),
        };
        self.scopes.pop();

        Some(BoundAccessor { function, body })
    }

    /// `get;` becomes `return this.$backing;`, `set;` becomes
    /// `this.$backing = value;`.
    fn synthesize_auto_accessor(
        &mut self,
        property: SymbolId,
        accessor: &Accessor<'_>,
        is_getter: bool,
    ) -> Option<BoundStmtId> {
        let backing = self.symbols.as_property(property).and_then(|p| p.backing_field)?;
        let backing_name = self.symbols.get(backing).name;
        let backing_type = self.symbols.value_type(backing);
        let containing_type = self.symbols.get(property).parent;
        let location = accessor.location;

        let this_type = containing_type
            .and_then(|t| self.symbols.as_type(t))
            .and_then(|data| data.ty);
        let this_expr = self.alloc(
            location,
            this_type,
            ValueCategory::RValue,
            None,
            BoundExprKind::This { containing_type },
        );
        let field_access = self.alloc(
            location,
            backing_type,
            ValueCategory::LValue,
            None,
            BoundExprKind::MemberAccess {
                object: this_expr,
                member_name: backing_name,
                member: Some(backing),
            },
        );

        let kind = if is_getter {
            BoundStmtKind::Return(Some(field_access))
        } else {
            let value_symbol = self
                .symbols
                .members_named(self.scope(), self.interner.lookup("value")?)
                .first()
                .copied();
            let value_name = self.interner.intern("value");
            let value_expr = self.alloc(
                location,
                backing_type,
                ValueCategory::LValue,
                None,
                BoundExprKind::Name {
                    parts: vec![value_name],
                    symbol: value_symbol,
                },
            );
            let assignment = self.alloc(
                location,
                backing_type,
                ValueCategory::RValue,
                None,
                BoundExprKind::Assignment {
                    op: sable_syntax::ast::AssignOp::Assign,
                    target: field_access,
                    value: value_expr,
                },
            );
            BoundStmtKind::Expr(assignment)
        };

        Some(self.tree.alloc_stmt(BoundStmt { location, kind }))
    }

    // === Statements ===

    fn bind_stmt(&mut self, stmt: &Stmt<'_>) -> BoundStmtId {
        let kind = match &stmt.kind {
            StmtKind::Block(statements) => {
                let scope = self.symbols.node_scopes.get(&stmt.id).copied();
                if let Some(scope) = scope {
                    self.scopes.push(scope);
                }
                let bound: Vec<BoundStmtId> =
                    statements.iter().map(|s| self.bind_stmt(s)).collect();
                if scope.is_some() {
                    self.scopes.pop();
                }
                BoundStmtKind::Block {
                    statements: bound,
                    scope,
                }
            }
            StmtKind::Expr(expr) => BoundStmtKind::Expr(self.bind_expr(expr)),
            StmtKind::LocalVar { ty, declarators } => {
                let declared = ty.map(|t| self.resolve_type_ref(t));
                let mut decls = Vec::new();
                for declarator in declarators {
                    let DeclKind::Declarator { name, initializer } = &declarator.kind else {
                        continue;
                    };
                    let symbol = self.symbols.node_symbols.get(&declarator.id).copied();
                    let bound_init = initializer.map(|e| self.bind_expr(e));

                    // Declared type wins; `var` infers from the
                    // initializer.
                    let var_type = match declared {
                        Some(declared_type) => declared_type,
                        None => bound_init.and_then(|init| self.tree.expr(init).ty),
                    };
                    if let (Some(symbol), Some(var_type)) = (symbol, var_type) {
                        self.symbols.set_value_type(symbol, var_type);
                    }
                    if ty.is_none() && var_type.is_none() {
                        self.error(
                            "cannot infer a type for 'var' declaration".to_string(),
                            declarator.location,
                        );
                    }

                    let bound_init = match (bound_init, var_type) {
                        (Some(init), Some(target)) => {
                            Some(self.coerce(init, target, declarator.location))
                        }
                        (init, _) => init,
                    };

                    decls.push(self.tree.alloc_decl(BoundDecl {
                        location: declarator.location,
                        name: *name,
                        symbol,
                        kind: BoundDeclKind::Variable {
                            type_expr: None,
                            initializer: bound_init,
                            flavor: VariableFlavor::Local,
                        },
                    }));
                }
                BoundStmtKind::Local { decls }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.bind_condition(cond);
                let then_stmt = self.bind_stmt(then_branch);
                let else_stmt = else_branch.map(|e| self.bind_stmt(e));
                BoundStmtKind::If {
                    cond,
                    then_stmt,
                    else_stmt,
                }
            }
            StmtKind::While { cond, body } => {
                let cond = self.bind_condition(cond);
                let body = self.bind_stmt(body);
                BoundStmtKind::While { cond, body }
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let scope = self.symbols.node_scopes.get(&stmt.id).copied();
                if let Some(scope) = scope {
                    self.scopes.push(scope);
                }
                let init = init.map(|i| self.bind_stmt(i));
                let cond = cond.map(|c| self.bind_condition(c));
                let update: Vec<BoundExprId> =
                    update.iter().map(|u| self.bind_expr(u)).collect();
                let body = self.bind_stmt(body);
                if scope.is_some() {
                    self.scopes.pop();
                }
                BoundStmtKind::For {
                    init,
                    cond,
                    update,
                    body,
                    scope,
                }
            }
            StmtKind::Return(value) => {
                let bound = value.map(|v| self.bind_expr(v));
                // Coerce to the enclosing function's return type when
                // both sides are known.
                let bound = match (bound, self.enclosing_return_type()) {
                    (Some(expr), Some(ret)) if !self.types.is_void(ret) => {
                        Some(self.coerce(expr, ret, stmt.location))
                    }
                    (b, _) => b,
                };
                BoundStmtKind::Return(bound)
            }
            StmtKind::Break => BoundStmtKind::Break,
            StmtKind::Continue => BoundStmtKind::Continue,
            StmtKind::Error => BoundStmtKind::Error,
        };
        self.tree.alloc_stmt(BoundStmt {
            location: stmt.location,
            kind,
        })
    }

    fn enclosing_return_type(&self) -> Option<TypeId> {
        let function = self.symbols.enclosing_function(self.scope())?;
        self.symbols.as_function(function)?.return_type
    }

    /// Binds a loop/branch condition and checks it is boolean.
    fn bind_condition(&mut self, expr: &Expr<'_>) -> BoundExprId {
        let bound = self.bind_expr(expr);
        if let Some(ty) = self.tree.expr(bound).ty {
            if !self.types.is_bool(ty) {
                let text = self.type_text(ty);
                self.error(
                    format!("condition must be 'bool', found '{text}'"),
                    expr.location,
                );
            }
        }
        bound
    }

    // === Expressions ===

    fn bind_expr(&mut self, expr: &Expr<'_>) -> BoundExprId {
        match &expr.kind {
            ExprKind::Literal { kind, value } => self.bind_literal(expr, *kind, *value),
            ExprKind::Name(name) => self.bind_name(expr, *name),
            ExprKind::This => self.bind_this(expr),
            ExprKind::Paren(inner) => self.bind_expr(inner),
            ExprKind::Member { object, name } => self.bind_member(expr, object, *name),
            ExprKind::Index { object, index } => {
                let object = self.bind_expr(object);
                let index = self.bind_expr(index);
                let ty = self
                    .tree
                    .expr(object)
                    .ty
                    .and_then(|t| self.types.element_of(t));
                self.alloc(
                    expr.location,
                    ty,
                    ValueCategory::LValue,
                    None,
                    BoundExprKind::Index {
                        object,
                        index,
                        indexer_property: None,
                    },
                )
            }
            ExprKind::Call { callee, args } => {
                let callee = self.bind_expr(callee);
                let args: Vec<BoundExprId> = args.iter().map(|a| self.bind_expr(a)).collect();
                self.rvalue(
                    expr.location,
                    None,
                    BoundExprKind::Call {
                        callee,
                        args,
                        method: None,
                    },
                )
            }
            ExprKind::New { ty, args } => self.bind_new(expr, ty, args),
            ExprKind::Unary { op, operand } => self.bind_unary(expr, *op, operand),
            ExprKind::Postfix { op, operand } => {
                let target = self.bind_expr(operand);
                self.require_lvalue(target, expr.location);
                let ty = self.tree.expr(target).ty;
                self.rvalue(
                    expr.location,
                    ty,
                    BoundExprKind::IncDec {
                        target,
                        increment: *op == PostfixOp::Increment,
                        prefix: false,
                    },
                )
            }
            ExprKind::Binary { op, left, right } => self.bind_binary(expr, *op, left, right),
            ExprKind::Assign { op, target, value } => {
                let target = self.bind_expr(target);
                let value = self.bind_expr(value);
                self.require_lvalue(target, expr.location);
                let target_type = self.tree.expr(target).ty;
                let value = match (*op, target_type) {
                    (sable_syntax::ast::AssignOp::Assign, Some(target_type)) => {
                        self.coerce(value, target_type, expr.location)
                    }
                    _ => value,
                };
                self.alloc(
                    expr.location,
                    target_type,
                    ValueCategory::RValue,
                    None,
                    BoundExprKind::Assignment {
                        op: *op,
                        target,
                        value,
                    },
                )
            }
            ExprKind::Error => self.rvalue(expr.location, None, BoundExprKind::Error),
        }
    }

    fn bind_literal(
        &mut self,
        expr: &Expr<'_>,
        kind: LiteralKind,
        value: LiteralValue,
    ) -> BoundExprId {
        let (ty, constant) = match (kind, value) {
            (LiteralKind::Int, LiteralValue::Int(v)) => {
                (Some(self.types.int_type()), Some(ConstantValue::Int(v)))
            }
            (LiteralKind::Long, LiteralValue::Int(v)) => (
                Some(self.types.primitive(PrimitiveKind::Long)),
                Some(ConstantValue::Int(v)),
            ),
            (LiteralKind::Float, LiteralValue::Float(v)) => (
                Some(self.types.primitive(PrimitiveKind::Float)),
                Some(ConstantValue::Float(v)),
            ),
            (LiteralKind::Double, LiteralValue::Float(v)) => (
                Some(self.types.primitive(PrimitiveKind::Double)),
                Some(ConstantValue::Float(v)),
            ),
            (LiteralKind::Bool, LiteralValue::Bool(v)) => {
                (Some(self.types.bool_type()), Some(ConstantValue::Bool(v)))
            }
            (LiteralKind::Char, LiteralValue::Char(v)) => (
                Some(self.types.primitive(PrimitiveKind::Char)),
                Some(ConstantValue::Int(v as i64)),
            ),
            (LiteralKind::Str, LiteralValue::Str(v)) => {
                (Some(self.types.string_type()), Some(ConstantValue::Str(v)))
            }
            (LiteralKind::Null, _) => (None, Some(ConstantValue::Null)),
            // Error-token literals arrive without a decoded value.
            _ => (None, None),
        };
        self.alloc(
            expr.location,
            ty,
            ValueCategory::RValue,
            constant,
            BoundExprKind::Literal { literal_kind: kind },
        )
    }

    fn bind_this(&mut self, expr: &Expr<'_>) -> BoundExprId {
        let containing_type = self.symbols.enclosing_type(self.scope());
        let ty = containing_type
            .and_then(|t| self.symbols.as_type(t))
            .and_then(|data| data.ty);
        self.alloc(
            expr.location,
            ty,
            ValueCategory::RValue,
            None,
            BoundExprKind::This { containing_type },
        )
    }

    /// Name binding with the implicit-`this` rewrite: an identifier that
    /// resolves to a non-static member of the enclosing type, used
    /// inside one of its instance functions, becomes `this.x`.
    fn bind_name(&mut self, expr: &Expr<'_>, name: Symbol) -> BoundExprId {
        let symbol = self.symbols.lookup(self.scope(), name);

        if let Some(symbol) = symbol {
            if self.needs_implicit_this(symbol) {
                let containing_type = self.symbols.enclosing_type(self.scope());
                let this_type = containing_type
                    .and_then(|t| self.symbols.as_type(t))
                    .and_then(|data| data.ty);
                let this_expr = self.alloc(
                    expr.location,
                    this_type,
                    ValueCategory::RValue,
                    None,
                    BoundExprKind::This { containing_type },
                );
                let member_type = self.symbols.value_type(symbol);
                return self.alloc(
                    expr.location,
                    member_type,
                    ValueCategory::LValue,
                    None,
                    BoundExprKind::MemberAccess {
                        object: this_expr,
                        member_name: name,
                        member: Some(symbol),
                    },
                );
            }

            let (ty, category) = match &self.symbols.get(symbol).kind {
                SymbolKind::Parameter(data) | SymbolKind::Variable(data) => {
                    (data.ty, ValueCategory::LValue)
                }
                SymbolKind::Field(data) => (data.ty, ValueCategory::LValue),
                _ => (None, ValueCategory::RValue),
            };
            return self.alloc(
                expr.location,
                ty,
                category,
                None,
                BoundExprKind::Name {
                    parts: vec![name],
                    symbol: Some(symbol),
                },
            );
        }

        // Unknown here; the resolution pass gets a second chance (using
        // directives, forward references).
        self.rvalue(
            expr.location,
            None,
            BoundExprKind::Name {
                parts: vec![name],
                symbol: None,
            },
        )
    }

    /// `true` when `symbol` is a non-static field/property/method of the
    /// enclosing type (or an ancestor) and the current scope is one of
    /// that type's instance functions.
    fn needs_implicit_this(&self, symbol: SymbolId) -> bool {
        let member_kind_ok = matches!(
            self.symbols.get(symbol).kind,
            SymbolKind::Field(_) | SymbolKind::Property(_) | SymbolKind::Function(_)
        );
        if !member_kind_ok || self.symbols.get(symbol).modifiers.is_static() {
            return false;
        }
        let Some(owner) = self.symbols.get(symbol).parent else {
            return false;
        };
        if !matches!(self.symbols.get(owner).kind, SymbolKind::Type(_)) {
            return false;
        }
        // Function members that are static were excluded above via
        // modifiers; also skip constructors named like the type.
        let Some(function) = self.symbols.enclosing_function(self.scope()) else {
            return false;
        };
        if self
            .symbols
            .as_function(function)
            .is_some_and(|d| d.is_static)
        {
            return false;
        }
        let Some(enclosing) = self.symbols.enclosing_type(self.scope()) else {
            return false;
        };
        enclosing == owner || self.symbols.derives_from(enclosing, owner)
    }

    fn bind_member(&mut self, expr: &Expr<'_>, object: &Expr<'_>, name: Symbol) -> BoundExprId {
        let bound_object = self.bind_expr(object);

        // A namespace or type prefix folds into a longer dotted name
        // instead of a member access on a runtime value.
        if let BoundExprKind::Name {
            parts,
            symbol: Some(prefix),
        } = &self.tree.expr(bound_object).kind
        {
            let prefix = *prefix;
            if matches!(
                self.symbols.get(prefix).kind,
                SymbolKind::Namespace | SymbolKind::Type(_)
            ) {
                let mut new_parts = parts.clone();
                new_parts.push(name);
                let resolved = self.symbols.members_named(prefix, name).first().copied();
                let ty = resolved.and_then(|s| self.symbols.value_type(s));
                let category = match resolved.map(|s| &self.symbols.get(s).kind) {
                    Some(SymbolKind::Field(_)) | Some(SymbolKind::Variable(_)) => {
                        ValueCategory::LValue
                    }
                    _ => ValueCategory::RValue,
                };
                return self.alloc(
                    expr.location,
                    ty,
                    category,
                    None,
                    BoundExprKind::Name {
                        parts: new_parts,
                        symbol: resolved,
                    },
                );
            }
        }

        // Ordinary member access; resolve now if the object type is
        // already known, otherwise the resolution pass fills it in.
        let member = self
            .tree
            .expr(bound_object)
            .ty
            .and_then(|t| self.types.as_named(t))
            .and_then(|type_symbol| self.lookup_member(type_symbol, name));
        let ty = member.and_then(|m| self.symbols.value_type(m));
        self.alloc(
            expr.location,
            ty,
            ValueCategory::LValue,
            None,
            BoundExprKind::MemberAccess {
                object: bound_object,
                member_name: name,
                member,
            },
        )
    }

    /// Member lookup through the base chain.
    fn lookup_member(&self, type_symbol: SymbolId, name: Symbol) -> Option<SymbolId> {
        let mut current = Some(type_symbol);
        while let Some(ty) = current {
            if let Some(found) = self.symbols.members_named(ty, name).first() {
                return Some(*found);
            }
            current = self.symbols.as_type(ty).and_then(|d| d.base);
        }
        None
    }

    fn bind_new(
        &mut self,
        expr: &Expr<'_>,
        ty: &TypeRef<'_>,
        args: &[&Expr<'_>],
    ) -> BoundExprId {
        let resolved = self.resolve_type_ref(ty);
        let parts = match &ty.kind {
            TypeRefKind::Named(parts) => parts.clone(),
            _ => Vec::new(),
        };
        let type_expr = self.alloc(
            ty.location,
            resolved,
            ValueCategory::RValue,
            None,
            BoundExprKind::TypeExpr {
                parts,
                resolved,
            },
        );
        let args: Vec<BoundExprId> = args.iter().map(|a| self.bind_expr(a)).collect();
        self.rvalue(
            expr.location,
            resolved,
            BoundExprKind::New {
                type_expr,
                args,
                constructor: None,
            },
        )
    }

    fn bind_unary(&mut self, expr: &Expr<'_>, op: UnaryOp, operand: &Expr<'_>) -> BoundExprId {
        match op {
            UnaryOp::PreIncrement | UnaryOp::PreDecrement => {
                let target = self.bind_expr(operand);
                self.require_lvalue(target, expr.location);
                let ty = self.tree.expr(target).ty;
                return self.rvalue(
                    expr.location,
                    ty,
                    BoundExprKind::IncDec {
                        target,
                        increment: op == UnaryOp::PreIncrement,
                        prefix: true,
                    },
                );
            }
            _ => {}
        }

        let bound = self.bind_expr(operand);
        let operand_type = self.tree.expr(bound).ty;

        let ty = match op {
            UnaryOp::Not => {
                if let Some(t) = operand_type {
                    if !self.types.is_bool(t) {
                        let text = self.type_text(t);
                        self.error(
                            format!("operator '!' requires 'bool', found '{text}'"),
                            expr.location,
                        );
                    }
                }
                Some(self.types.bool_type())
            }
            UnaryOp::Neg | UnaryOp::Plus => {
                if let Some(t) = operand_type {
                    if !self.types.is_numeric(t) {
                        let text = self.type_text(t);
                        self.error(
                            format!("unary arithmetic requires a numeric operand, found '{text}'"),
                            expr.location,
                        );
                    }
                }
                operand_type
            }
            UnaryOp::BitNot => {
                if let Some(t) = operand_type {
                    let integral = self
                        .types
                        .as_primitive(t)
                        .is_some_and(PrimitiveKind::is_integral);
                    if !integral {
                        let text = self.type_text(t);
                        self.error(
                            format!("operator '~' requires an integer operand, found '{text}'"),
                            expr.location,
                        );
                    }
                }
                operand_type
            }
            UnaryOp::PreIncrement | UnaryOp::PreDecrement => unreachable!(),
        };

        // `+x` is a no-op; keep the operand.
        if op == UnaryOp::Plus {
            return bound;
        }

        self.rvalue(expr.location, ty, BoundExprKind::Unary { op, operand: bound })
    }

    fn bind_binary(
        &mut self,
        expr: &Expr<'_>,
        op: BinaryOp,
        left: &Expr<'_>,
        right: &Expr<'_>,
    ) -> BoundExprId {
        let mut left = self.bind_expr(left);
        let mut right = self.bind_expr(right);
        let left_type = self.tree.expr(left).ty;
        let right_type = self.tree.expr(right).ty;

        let result = match op {
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                for ty in [left_type, right_type].into_iter().flatten() {
                    if !self.types.is_bool(ty) {
                        let text = self.type_text(ty);
                        self.error(
                            format!("logical operator requires 'bool', found '{text}'"),
                            expr.location,
                        );
                    }
                }
                Some(self.types.bool_type())
            }
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                if let (Some(lt), Some(rt)) = (left_type, right_type) {
                    match self.promote(lt, rt) {
                        Some(common) => {
                            left = self.coerce(left, common, expr.location);
                            right = self.coerce(right, common, expr.location);
                        }
                        None => self.report_operand_mismatch(op, lt, rt, expr.location),
                    }
                }
                Some(self.types.bool_type())
            }
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem => match (left_type, right_type) {
                (Some(lt), Some(rt)) => match self.promote(lt, rt) {
                    Some(common) => {
                        let numeric_ok = self.types.is_numeric(common)
                            || (op == BinaryOp::Add && common == self.types.string_type());
                        if !numeric_ok {
                            self.report_operand_mismatch(op, lt, rt, expr.location);
                        }
                        left = self.coerce(left, common, expr.location);
                        right = self.coerce(right, common, expr.location);
                        Some(common)
                    }
                    None => {
                        self.report_operand_mismatch(op, lt, rt, expr.location);
                        None
                    }
                },
                _ => None,
            },
            BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr => match (left_type, right_type) {
                (Some(lt), Some(rt)) => {
                    let both_integral = [lt, rt].iter().all(|t| {
                        self.types
                            .as_primitive(*t)
                            .is_some_and(PrimitiveKind::is_integral)
                    });
                    if !both_integral {
                        self.report_operand_mismatch(op, lt, rt, expr.location);
                        None
                    } else if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                        // Shifts keep the left operand's type.
                        Some(lt)
                    } else {
                        match self.promote(lt, rt) {
                            Some(common) => {
                                left = self.coerce(left, common, expr.location);
                                right = self.coerce(right, common, expr.location);
                                Some(common)
                            }
                            None => None,
                        }
                    }
                }
                _ => None,
            },
        };

        self.rvalue(
            expr.location,
            result,
            BoundExprKind::Binary { op, left, right },
        )
    }

    /// Common type of two operands under the implicit-conversion rules,
    /// if one exists.
    fn promote(&self, left: TypeId, right: TypeId) -> Option<TypeId> {
        if left == right {
            return Some(left);
        }
        if classify(self.types, self.symbols, left, right).is_implicit() {
            return Some(right);
        }
        if classify(self.types, self.symbols, right, left).is_implicit() {
            return Some(left);
        }
        None
    }

    fn report_operand_mismatch(
        &mut self,
        op: BinaryOp,
        left: TypeId,
        right: TypeId,
        location: SourceLocation,
    ) {
        let lt = self.type_text(left);
        let rt = self.type_text(right);
        self.error(
            format!("operator '{op:?}' cannot be applied to '{lt}' and '{rt}'"),
            location,
        );
    }

    fn require_lvalue(&mut self, expr: BoundExprId, location: SourceLocation) {
        let target = self.tree.skip_conversions(expr);
        let node = self.tree.expr(target);
        let is_lvalue = node.value_category == ValueCategory::LValue
            || matches!(
                node.kind,
                BoundExprKind::MemberAccess { .. }
                    | BoundExprKind::Index { .. }
                    // Unresolved names may still turn out to be
                    // variables; the resolver has the final word.
                    | BoundExprKind::Name { symbol: None, .. }
            );
        if !is_lvalue && !matches!(node.kind, BoundExprKind::Error) {
            self.error("expression is not assignable".to_string(), location);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bound::{BoundDeclId, BoundDeclKind, BoundExprKind, BoundStmtKind, BoundTree, ConstantValue};
    use crate::test_util::{bind_source, Analysis};
    use sable_base::{ErrorKind, Interner};

    /// Depth-first search for a bound function declaration by name.
    fn find_function(tree: &BoundTree, interner: &Interner, name: &str) -> Option<BoundDeclId> {
        fn walk(
            tree: &BoundTree,
            interner: &Interner,
            name: &str,
            id: BoundDeclId,
        ) -> Option<BoundDeclId> {
            let decl = tree.decl(id);
            match &decl.kind {
                BoundDeclKind::Function { .. } if interner.resolve(decl.name) == name => Some(id),
                BoundDeclKind::Type { members } | BoundDeclKind::Namespace { members } => members
                    .iter()
                    .find_map(|m| walk(tree, interner, name, *m)),
                _ => None,
            }
        }
        tree.root
            .iter()
            .find_map(|d| walk(tree, interner, name, *d))
    }

    fn body_statements(analysis: &Analysis, function: &str) -> Vec<crate::bound::BoundStmtId> {
        let id = find_function(&analysis.tree, &analysis.interner, function).expect("function");
        let BoundDeclKind::Function { body, .. } = &analysis.tree.decl(id).kind else {
            panic!("expected function decl");
        };
        let BoundStmtKind::Block { statements, .. } = &analysis.tree.stmt(body.unwrap()).kind
        else {
            panic!("expected block body");
        };
        statements.clone()
    }

    #[test]
    fn implicit_this_rewrites_field_reference() {
        let analysis = bind_source("class C { int x; int get() { return x; } }");
        assert!(!analysis.diags.has_errors());
        let stmts = body_statements(&analysis, "get");
        let BoundStmtKind::Return(Some(value)) = &analysis.tree.stmt(stmts[0]).kind else {
            panic!("expected return with value");
        };
        let BoundExprKind::MemberAccess { object, member, .. } =
            &analysis.tree.expr(*value).kind
        else {
            panic!("expected member access, got {:?}", analysis.tree.expr(*value).kind);
        };
        assert!(matches!(
            analysis.tree.expr(*object).kind,
            BoundExprKind::This { .. }
        ));
        assert!(member.is_some());
    }

    #[test]
    fn local_reference_stays_a_name() {
        let analysis = bind_source("class C { int get(int x) { return x; } }");
        assert!(!analysis.diags.has_errors());
        let stmts = body_statements(&analysis, "get");
        let BoundStmtKind::Return(Some(value)) = &analysis.tree.stmt(stmts[0]).kind else {
            panic!("expected return with value");
        };
        assert!(matches!(
            analysis.tree.expr(*value).kind,
            BoundExprKind::Name { symbol: Some(_), .. }
        ));
    }

    #[test]
    fn literals_decode_into_constants() {
        let analysis = bind_source("void f() { int x = 42; }");
        assert!(!analysis.diags.has_errors());
        let constant = analysis
            .tree
            .expr_ids()
            .find_map(|id| analysis.tree.expr(id).constant);
        assert_eq!(constant, Some(ConstantValue::Int(42)));
    }

    #[test]
    fn var_infers_from_new_expression() {
        let analysis =
            bind_source("class Pt { int x; } void h() { var p = new Pt(); p = p; }");
        assert!(!analysis.diags.has_errors());
        let p = analysis.interner.lookup("p").unwrap();
        let symbol = analysis
            .symbols
            .iter_ids()
            .find(|id| analysis.symbols.get(*id).name == p)
            .unwrap();
        let ty = analysis.symbols.value_type(symbol).expect("inferred type");
        let type_symbol = analysis.types.as_named(ty).expect("named type");
        assert_eq!(
            analysis.interner.resolve(analysis.symbols.get(type_symbol).name),
            "Pt"
        );
    }

    #[test]
    fn mixed_arithmetic_inserts_widening_conversion() {
        let analysis = bind_source("void f() { double d = 1 + 2.5; }");
        assert!(!analysis.diags.has_errors());
        let has_conversion = analysis.tree.expr_ids().any(|id| {
            matches!(
                analysis.tree.expr(id).kind,
                BoundExprKind::Conversion { .. }
            )
        });
        assert!(has_conversion, "expected an implicit int->double conversion");
    }

    #[test]
    fn narrowing_initializer_is_a_bind_error() {
        let analysis = bind_source("void f() { int x = 1.5; }");
        assert_eq!(analysis.diags.of_kind(ErrorKind::Bind).count(), 1);
        assert!(analysis
            .diags
            .iter()
            .next()
            .unwrap()
            .message
            .contains("convert"));
    }

    #[test]
    fn non_bool_condition_is_a_bind_error() {
        let analysis = bind_source("void f() { if (1) { } }");
        assert_eq!(analysis.diags.of_kind(ErrorKind::Bind).count(), 1);
    }

    #[test]
    fn assignment_to_rvalue_is_a_bind_error() {
        let analysis = bind_source("void f() { 1 = 2; }");
        assert_eq!(analysis.diags.of_kind(ErrorKind::Bind).count(), 1);
        assert!(analysis
            .diags
            .iter()
            .next()
            .unwrap()
            .message
            .contains("not assignable"));
    }

    #[test]
    fn auto_property_synthesizes_backing_access() {
        let analysis = bind_source("class C { int total { get; set; } }");
        assert!(!analysis.diags.has_errors(), "{:?}", analysis.diags.iter().collect::<Vec<_>>());
        // The synthesized getter body reads this.$total_backing.
        let has_backing_access = analysis.tree.expr_ids().any(|id| {
            if let BoundExprKind::MemberAccess { member: Some(m), .. } =
                &analysis.tree.expr(id).kind
            {
                analysis
                    .interner
                    .resolve(analysis.symbols.get(*m).name)
                    .contains("backing")
            } else {
                false
            }
        });
        assert!(has_backing_access);
    }

    #[test]
    fn namespace_prefix_folds_into_dotted_name() {
        let analysis = bind_source(
            "namespace N { class C { } } void f() { N.C x = null; x = x; }",
        );
        assert!(!analysis.diags.has_errors());
    }
}
