//! Symbol-table construction: one walk over the syntax tree that
//! declares every name into the scope tree and records the
//! node-to-symbol maps the later passes navigate by.
//!
//! A stack of open scopes is maintained while walking; entering a
//! namespace, type, function, property accessor, block, or for-loop
//! pushes the corresponding scope symbol. Duplicate definitions keep the
//! first symbol and report the rest. Base-class references and vtable
//! layout are finalized after the walk, once every type symbol exists,
//! so forward references cost nothing.

use crate::symbols::{
    FieldData, FunctionData, PropertyData, SymbolId, SymbolKind, SymbolTable, TypeData, VarData,
};
use crate::types::TypeSystem;
use rustc_hash::FxHashSet;
use sable_base::{Diagnostics, ErrorKind, Interner, SourceLocation, Symbol};
use sable_syntax::ast::{
    Accessor, AccessorBody, CompilationUnit, Decl, DeclKind, Modifiers, Stmt, StmtKind,
};

/// Builds the scope tree for one compilation unit.
pub fn build_symbol_table(
    unit: &CompilationUnit<'_>,
    types: &mut TypeSystem,
    interner: &mut Interner,
    diags: &mut Diagnostics,
) -> SymbolTable {
    let mut builder = SymbolTableBuilder {
        table: SymbolTable::new(&mut *interner),
        types,
        interner,
        diags,
        scopes: Vec::new(),
        block_ordinal: 0,
        pending_bases: Vec::new(),
    };
    builder.run(unit);
    builder.table
}

struct PendingBase {
    type_symbol: SymbolId,
    scope: SymbolId,
    path: Vec<Symbol>,
    location: SourceLocation,
}

struct SymbolTableBuilder<'t, 'i, 'd> {
    table: SymbolTable,
    types: &'t mut TypeSystem,
    interner: &'i mut Interner,
    diags: &'d mut Diagnostics,
    scopes: Vec<SymbolId>,
    /// Disambiguates the synthetic `$block`/`$for` scope names so
    /// qualified names stay unique.
    block_ordinal: u32,
    pending_bases: Vec<PendingBase>,
}

impl<'t, 'i, 'd> SymbolTableBuilder<'t, 'i, 'd> {
    fn run(&mut self, unit: &CompilationUnit<'_>) {
        self.scopes.push(self.table.root());
        for decl in &unit.decls {
            self.declare_decl(decl);
        }
        self.scopes.pop();

        self.resolve_bases();
        self.layout_vtables();
    }

    fn current(&self) -> SymbolId {
        *self.scopes.last().expect("scope stack never empty")
    }

    fn error(&mut self, message: String, location: SourceLocation) {
        self.diags.report(ErrorKind::Symbol, message, location);
    }

    /// Reports a duplicate unless the name only collides with other
    /// functions (overload sets are legal).
    fn check_duplicate(&mut self, name: Symbol, location: SourceLocation, is_function: bool) -> bool {
        let existing = self.table.members_named(self.current(), name);
        let clash = if is_function {
            existing
                .iter()
                .any(|s| !matches!(self.table.get(*s).kind, SymbolKind::Function(_)))
        } else {
            !existing.is_empty()
        };
        if clash {
            let text = self.interner.resolve(name).to_string();
            self.error(format!("duplicate definition of '{text}'"), location);
        }
        clash
    }

    // === Declarations ===

    fn declare_decl(&mut self, decl: &Decl<'_>) {
        match &decl.kind {
            DeclKind::Using { .. } => {}
            DeclKind::Namespace { path, members, .. } => {
                self.declare_namespace(decl, path, members)
            }
            DeclKind::Type {
                modifiers,
                is_struct,
                name,
                bases,
                members,
            } => self.declare_type(decl, *modifiers, *is_struct, *name, bases, members),
            DeclKind::Field {
                modifiers,
                declarators,
                ..
            } => self.declare_field(*modifiers, declarators),
            DeclKind::Method {
                modifiers,
                name,
                params,
                body,
                ..
            } => self.declare_function(decl, *modifiers, *name, params, *body, FunctionFlavor::Method),
            DeclKind::Constructor {
                modifiers,
                name,
                params,
                body,
            } => self.declare_function(
                decl,
                *modifiers,
                *name,
                params,
                *body,
                FunctionFlavor::Constructor,
            ),
            DeclKind::Destructor { body, .. } => {
                let name = self.interner.intern("dtor");
                self.declare_function(
                    decl,
                    Modifiers::NONE,
                    name,
                    &[],
                    *body,
                    FunctionFlavor::Destructor,
                );
            }
            DeclKind::Property {
                modifiers,
                name,
                getter,
                setter,
                ..
            } => self.declare_property(decl, *modifiers, *name, *getter, *setter),
            DeclKind::Declarator { .. } | DeclKind::Parameter { .. } => {
                // Declared by their owning field/function.
            }
        }
    }

    fn declare_namespace(&mut self, decl: &Decl<'_>, path: &[Symbol], members: &[&Decl<'_>]) {
        // Reuse existing namespace symbols so split namespace blocks
        // merge into one scope.
        let mut scope = self.current();
        for part in path {
            let existing = self
                .table
                .members_named(scope, *part)
                .iter()
                .copied()
                .find(|s| matches!(self.table.get(*s).kind, SymbolKind::Namespace));
            scope = match existing {
                Some(ns) => ns,
                None => {
                    if !self.table.members_named(scope, *part).is_empty() {
                        let text = self.interner.resolve(*part).to_string();
                        self.error(
                            format!("'{text}' is already defined and is not a namespace"),
                            decl.location,
                        );
                    }
                    self.table.declare(
                        scope,
                        *part,
                        SymbolKind::Namespace,
                        Modifiers::NONE,
                        decl.location,
                    )
                }
            };
        }

        self.table.node_scopes.insert(decl.id, scope);
        self.table.node_symbols.insert(decl.id, scope);

        self.scopes.push(scope);
        for member in members {
            self.declare_decl(member);
        }
        self.scopes.pop();
    }

    fn declare_type(
        &mut self,
        decl: &Decl<'_>,
        modifiers: Modifiers,
        is_struct: bool,
        name: Symbol,
        bases: &[&sable_syntax::ast::TypeRef<'_>],
        members: &[&Decl<'_>],
    ) {
        if self.check_duplicate(name, decl.location, false) {
            return;
        }

        let symbol = self.table.declare(
            self.current(),
            name,
            SymbolKind::Type(TypeData {
                is_struct,
                ..TypeData::default()
            }),
            modifiers,
            decl.location,
        );
        let canonical = self.types.named(symbol);
        self.table.as_type_mut(symbol).unwrap().ty = Some(canonical);

        self.table.node_scopes.insert(decl.id, symbol);
        self.table.node_symbols.insert(decl.id, symbol);

        // Single inheritance: the first base is the class; extra bases
        // are reported and ignored.
        if let Some(base) = bases.first() {
            match &base.kind {
                sable_syntax::ast::TypeRefKind::Named(parts) => {
                    self.pending_bases.push(PendingBase {
                        type_symbol: symbol,
                        scope: self.current(),
                        path: parts.clone(),
                        location: base.location,
                    });
                }
                _ => self.error("base type must be a class".to_string(), base.location),
            }
        }
        if bases.len() > 1 {
            self.error(
                "only single inheritance is supported".to_string(),
                bases[1].location,
            );
        }

        self.scopes.push(symbol);
        for member in members {
            self.declare_decl(member);
        }
        self.scopes.pop();
    }

    fn declare_field(&mut self, modifiers: Modifiers, declarators: &[&Decl<'_>]) {
        for declarator in declarators {
            let DeclKind::Declarator { name, .. } = &declarator.kind else {
                continue;
            };
            if self.check_duplicate(*name, declarator.location, false) {
                continue;
            }
            let owner = self.current();
            let index = self
                .table
                .as_type(owner)
                .map(|t| t.fields.len() as u32)
                .unwrap_or(0);
            let field = self.table.declare(
                owner,
                *name,
                SymbolKind::Field(FieldData { ty: None, index }),
                modifiers,
                declarator.location,
            );
            if let Some(type_data) = self.table.as_type_mut(owner) {
                type_data.fields.push(field);
            }
            self.table.node_symbols.insert(declarator.id, field);
        }
    }

    fn declare_function(
        &mut self,
        decl: &Decl<'_>,
        modifiers: Modifiers,
        name: Symbol,
        params: &[&Decl<'_>],
        body: Option<&Stmt<'_>>,
        flavor: FunctionFlavor,
    ) {
        if self.check_duplicate(name, decl.location, true) {
            return;
        }

        let data = FunctionData {
            is_static: modifiers.is_static(),
            is_virtual: modifiers.is_virtual(),
            is_override: modifiers.is_override(),
            is_constructor: flavor == FunctionFlavor::Constructor,
            is_destructor: flavor == FunctionFlavor::Destructor,
            is_external: modifiers.is_extern(),
            ..FunctionData::default()
        };
        let symbol = self.table.declare(
            self.current(),
            name,
            SymbolKind::Function(data),
            modifiers,
            decl.location,
        );
        self.table.node_scopes.insert(decl.id, symbol);
        self.table.node_symbols.insert(decl.id, symbol);

        self.scopes.push(symbol);
        let mut param_ids = Vec::with_capacity(params.len());
        for param in params {
            let DeclKind::Parameter { name, .. } = &param.kind else {
                continue;
            };
            if self.check_duplicate(*name, param.location, false) {
                continue;
            }
            let param_symbol = self.table.declare(
                symbol,
                *name,
                SymbolKind::Parameter(VarData::default()),
                Modifiers::NONE,
                param.location,
            );
            param_ids.push(param_symbol);
            self.table.node_symbols.insert(param.id, param_symbol);
        }
        self.table.as_function_mut(symbol).unwrap().params = param_ids;

        if let Some(body) = body {
            self.declare_stmt(body);
        }
        self.scopes.pop();
    }

    fn declare_property(
        &mut self,
        decl: &Decl<'_>,
        modifiers: Modifiers,
        name: Symbol,
        getter: Option<&Accessor<'_>>,
        setter: Option<&Accessor<'_>>,
    ) {
        if self.check_duplicate(name, decl.location, false) {
            return;
        }
        let owner = self.current();
        let symbol = self.table.declare(
            owner,
            name,
            SymbolKind::Property(PropertyData::default()),
            modifiers,
            decl.location,
        );
        self.table.node_scopes.insert(decl.id, symbol);
        self.table.node_symbols.insert(decl.id, symbol);

        // Auto-accessors read and write a synthesized private field on
        // the owning type.
        let needs_backing = getter.is_some_and(|a| matches!(a.body, AccessorBody::Auto))
            || setter.is_some_and(|a| matches!(a.body, AccessorBody::Auto));
        if needs_backing {
            let backing_name = {
                let text = format!("${}_backing", self.interner.resolve(name));
                self.interner.intern(&text)
            };
            let index = self
                .table
                .as_type(owner)
                .map(|t| t.fields.len() as u32)
                .unwrap_or(0);
            let field = self.table.declare(
                owner,
                backing_name,
                SymbolKind::Field(FieldData { ty: None, index }),
                Modifiers::PRIVATE,
                decl.location,
            );
            if let Some(type_data) = self.table.as_type_mut(owner) {
                type_data.fields.push(field);
            }
            if let Some(prop) = match &mut self.table.get_mut(symbol).kind {
                SymbolKind::Property(data) => Some(data),
                _ => None,
            } {
                prop.backing_field = Some(field);
            }
        }

        self.scopes.push(symbol);
        if let Some(accessor) = getter {
            self.declare_accessor(accessor, modifiers, "get", false);
        }
        if let Some(accessor) = setter {
            self.declare_accessor(accessor, modifiers, "set", true);
        }
        self.scopes.pop();
    }

    fn declare_accessor(
        &mut self,
        accessor: &Accessor<'_>,
        property_modifiers: Modifiers,
        name: &str,
        has_value_param: bool,
    ) {
        let fn_name = self.interner.intern(name);
        let data = FunctionData {
            is_static: property_modifiers.is_static(),
            ..FunctionData::default()
        };
        let symbol = self.table.declare(
            self.current(),
            fn_name,
            SymbolKind::Function(data),
            property_modifiers,
            accessor.location,
        );
        self.table.node_scopes.insert(accessor.id, symbol);
        self.table.node_symbols.insert(accessor.id, symbol);

        self.scopes.push(symbol);
        if has_value_param {
            let value_name = self.interner.intern("value");
            let value = self.table.declare(
                symbol,
                value_name,
                SymbolKind::Parameter(VarData::default()),
                Modifiers::NONE,
                accessor.location,
            );
            self.table.as_function_mut(symbol).unwrap().params = vec![value];
        }
        match &accessor.body {
            AccessorBody::Auto | AccessorBody::Expr(_) => {}
            AccessorBody::Block(block) => self.declare_stmt(block),
        }
        self.scopes.pop();
    }

    // === Statements ===

    fn declare_stmt(&mut self, stmt: &Stmt<'_>) {
        match &stmt.kind {
            StmtKind::Block(statements) => {
                self.open_synthetic_scope("$block", stmt);
                for s in statements {
                    self.declare_stmt(s);
                }
                self.scopes.pop();
            }
            StmtKind::LocalVar { declarators, .. } => {
                for declarator in declarators {
                    let DeclKind::Declarator { name, .. } = &declarator.kind else {
                        continue;
                    };
                    if self.check_duplicate(*name, declarator.location, false) {
                        continue;
                    }
                    let symbol = self.table.declare(
                        self.current(),
                        *name,
                        SymbolKind::Variable(VarData::default()),
                        Modifiers::NONE,
                        declarator.location,
                    );
                    self.table.node_symbols.insert(declarator.id, symbol);
                }
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.declare_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.declare_stmt(else_branch);
                }
            }
            StmtKind::While { body, .. } => self.declare_stmt(body),
            StmtKind::For { init, body, .. } => {
                // The loop variable lives in a `$for` scope that
                // encloses the body.
                self.open_synthetic_scope("$for", stmt);
                if let Some(init) = init {
                    self.declare_stmt(init);
                }
                self.declare_stmt(body);
                self.scopes.pop();
            }
            StmtKind::Expr(_)
            | StmtKind::Return(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Error => {}
        }
    }

    fn open_synthetic_scope(&mut self, prefix: &str, stmt: &Stmt<'_>) {
        let name = {
            let text = format!("{prefix}{}", self.block_ordinal);
            self.interner.intern(&text)
        };
        self.block_ordinal += 1;
        let scope = self.table.declare(
            self.current(),
            name,
            SymbolKind::Block,
            Modifiers::NONE,
            stmt.location,
        );
        self.table.node_scopes.insert(stmt.id, scope);
        self.scopes.push(scope);
    }

    // === Post passes ===

    fn resolve_bases(&mut self) {
        let pending = std::mem::take(&mut self.pending_bases);
        for base in pending {
            match self.table.resolve_path(base.scope, &base.path) {
                Some(resolved) if matches!(self.table.get(resolved).kind, SymbolKind::Type(_)) => {
                    self.table.as_type_mut(base.type_symbol).unwrap().base = Some(resolved);
                }
                _ => {
                    let path: Vec<&str> =
                        base.path.iter().map(|p| self.interner.resolve(*p)).collect();
                    self.error(
                        format!("unknown base type '{}'", path.join(".")),
                        base.location,
                    );
                }
            }
        }

        // Break inheritance cycles so vtable layout terminates.
        let type_ids: Vec<SymbolId> = self
            .table
            .iter_ids()
            .filter(|id| matches!(self.table.get(*id).kind, SymbolKind::Type(_)))
            .collect();
        for id in type_ids {
            let mut seen = FxHashSet::default();
            seen.insert(id);
            let mut current = self.table.as_type(id).and_then(|t| t.base);
            while let Some(next) = current {
                if !seen.insert(next) {
                    let location = self.table.get(id).location;
                    let name = self.table.get(id).name;
                    let text = self.interner.resolve(name).to_string();
                    self.error(format!("cyclic inheritance involving '{text}'"), location);
                    self.table.as_type_mut(id).unwrap().base = None;
                    break;
                }
                current = self.table.as_type(next).and_then(|t| t.base);
            }
        }
    }

    /// Computes every type's vtable: inherited slots first; an override
    /// that matches an inherited slot by name replaces it, everything
    /// else appends.
    fn layout_vtables(&mut self) {
        let type_ids: Vec<SymbolId> = self
            .table
            .iter_ids()
            .filter(|id| matches!(self.table.get(*id).kind, SymbolKind::Type(_)))
            .collect();
        let mut done = FxHashSet::default();
        for id in type_ids {
            self.layout_vtable(id, &mut done);
        }
    }

    fn layout_vtable(&mut self, type_id: SymbolId, done: &mut FxHashSet<SymbolId>) {
        if done.contains(&type_id) {
            return;
        }
        done.insert(type_id);

        let base = self.table.as_type(type_id).and_then(|t| t.base);
        let mut layout: Vec<SymbolId> = match base {
            Some(base_id) => {
                self.layout_vtable(base_id, done);
                self.table.as_type(base_id).unwrap().virtual_methods.clone()
            }
            None => Vec::new(),
        };

        let methods: Vec<SymbolId> = self.table.get(type_id).members.clone();
        for method in methods {
            let Some(data) = self.table.as_function(method) else {
                continue;
            };
            let (is_virtual, is_override) = (data.is_virtual, data.is_override);
            if !is_virtual && !is_override {
                continue;
            }
            let name = self.table.get(method).name;
            let slot = if is_override {
                layout
                    .iter()
                    .position(|m| self.table.get(*m).name == name)
            } else {
                None
            };
            let slot = match slot {
                Some(slot) => {
                    layout[slot] = method;
                    slot
                }
                None => {
                    layout.push(method);
                    layout.len() - 1
                }
            };
            self.table.as_function_mut(method).unwrap().vtable_slot = Some(slot as u32);
        }

        self.table.as_type_mut(type_id).unwrap().virtual_methods = layout;
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum FunctionFlavor {
    Method,
    Constructor,
    Destructor,
}
