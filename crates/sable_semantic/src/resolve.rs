//! The symbol-resolution pass: a second traversal over the bound tree
//! that fills in every reference the binder had to leave null.
//!
//! The scope stack is rebuilt from the declaration symbols while
//! walking, so lookups here see exactly what the binder saw plus the
//! resolved `using` namespaces. Each resolution field is written at most
//! once (`None` checks guard every store), which makes the pass
//! idempotent: running it twice produces identical references.

use crate::bound::{
    BoundDeclId, BoundDeclKind, BoundExpr, BoundExprId, BoundExprKind, BoundStmtId, BoundStmtKind,
    BoundTree, ValueCategory,
};
use crate::convert::{classify, ConversionKind};
use crate::symbols::{SymbolId, SymbolKind, SymbolTable};
use crate::types::{TypeId, TypeSystem};
use sable_base::{Diagnostics, ErrorKind, Interner, SourceLocation, Symbol};

/// Runs symbol resolution over the whole bound tree.
pub fn resolve(
    tree: &mut BoundTree,
    symbols: &SymbolTable,
    types: &TypeSystem,
    interner: &Interner,
    diags: &mut Diagnostics,
) {
    let mut resolver = Resolver {
        tree,
        symbols,
        types,
        interner,
        diags,
        scopes: vec![symbols.root()],
        usings: Vec::new(),
    };
    resolver.run();
}

struct Resolver<'a> {
    tree: &'a mut BoundTree,
    symbols: &'a SymbolTable,
    types: &'a TypeSystem,
    interner: &'a Interner,
    diags: &'a mut Diagnostics,
    scopes: Vec<SymbolId>,
    /// Namespaces named by resolved `using` directives; consulted as a
    /// lookup fallback after the scope chain.
    usings: Vec<SymbolId>,
}

impl<'a> Resolver<'a> {
    fn run(&mut self) {
        for using in self.tree.usings.clone() {
            self.resolve_using(using);
        }
        for decl in self.tree.root.clone() {
            self.resolve_decl(decl);
        }
    }

    fn scope(&self) -> SymbolId {
        *self.scopes.last().expect("scope stack never empty")
    }

    fn error(&mut self, message: String, location: SourceLocation) {
        self.diags.report(ErrorKind::Resolution, message, location);
    }

    fn name_text(&self, parts: &[Symbol]) -> String {
        let names: Vec<&str> = parts.iter().map(|p| self.interner.resolve(*p)).collect();
        names.join(".")
    }

    fn type_text(&self, ty: TypeId) -> String {
        self.types.display(ty, self.symbols, self.interner)
    }

    fn resolve_using(&mut self, id: BoundStmtId) {
        let BoundStmtKind::Using {
            path,
            target_namespace,
        } = self.tree.stmt(id).kind.clone()
        else {
            return;
        };
        if let Some(ns) = target_namespace {
            self.usings.push(ns);
            return;
        }
        match self.symbols.resolve_path(self.symbols.root(), &path) {
            Some(symbol) if matches!(self.symbols.get(symbol).kind, SymbolKind::Namespace) => {
                if let BoundStmtKind::Using {
                    target_namespace, ..
                } = &mut self.tree.stmt_mut(id).kind
                {
                    *target_namespace = Some(symbol);
                }
                self.usings.push(symbol);
            }
            _ => {
                let location = self.tree.stmt(id).location;
                let name = self.name_text(&path);
                self.error(format!("unknown namespace '{name}'"), location);
            }
        }
    }

    // === Lookup with using fallback ===

    fn lookup(&self, name: Symbol) -> Option<SymbolId> {
        if let Some(found) = self.symbols.lookup(self.scope(), name) {
            return Some(found);
        }
        for ns in &self.usings {
            if let Some(found) = self.symbols.members_named(*ns, name).first() {
                return Some(*found);
            }
        }
        None
    }

    fn resolve_parts(&self, parts: &[Symbol]) -> Option<SymbolId> {
        let (first, rest) = parts.split_first()?;
        let mut current = self.lookup(*first)?;
        for part in rest {
            current = *self.symbols.members_named(current, *part).first()?;
        }
        Some(current)
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

    /// All function overloads named `name` on a type, walking the base
    /// chain; the nearest type with any wins.
    fn member_functions(&self, type_symbol: SymbolId, name: Symbol) -> Vec<SymbolId> {
        let mut current = Some(type_symbol);
        while let Some(ty) = current {
            let functions: Vec<SymbolId> = self
                .symbols
                .members_named(ty, name)
                .iter()
                .copied()
                .filter(|s| self.symbols.as_function(*s).is_some())
                .collect();
            if !functions.is_empty() {
                return functions;
            }
            current = self.symbols.as_type(ty).and_then(|d| d.base);
        }
        Vec::new()
    }

    // === Declarations ===

    fn resolve_decl(&mut self, id: BoundDeclId) {
        let symbol = self.tree.decl(id).symbol;
        let kind = self.tree.decl(id).kind.clone();
        match kind {
            BoundDeclKind::Namespace { members } | BoundDeclKind::Type { members } => {
                if let Some(symbol) = symbol {
                    self.scopes.push(symbol);
                }
                for member in members {
                    self.resolve_decl(member);
                }
                if symbol.is_some() {
                    self.scopes.pop();
                }
            }
            BoundDeclKind::Function { body, .. } => {
                if let Some(symbol) = symbol {
                    self.scopes.push(symbol);
                }
                if let Some(body) = body {
                    self.resolve_stmt(body);
                }
                if symbol.is_some() {
                    self.scopes.pop();
                }
            }
            BoundDeclKind::Property { getter, setter } => {
                if let Some(symbol) = symbol {
                    self.scopes.push(symbol);
                }
                for accessor in [getter, setter].into_iter().flatten() {
                    if let Some(function) = accessor.function {
                        self.scopes.push(function);
                    }
                    if let Some(body) = accessor.body {
                        self.resolve_stmt(body);
                    }
                    if accessor.function.is_some() {
                        self.scopes.pop();
                    }
                }
                if symbol.is_some() {
                    self.scopes.pop();
                }
            }
            BoundDeclKind::Variable { initializer, .. } => {
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
            }
        }
    }

    // === Statements ===

    fn resolve_stmt(&mut self, id: BoundStmtId) {
        let kind = self.tree.stmt(id).kind.clone();
        match kind {
            BoundStmtKind::Block { statements, scope } => {
                if let Some(scope) = scope {
                    self.scopes.push(scope);
                }
                for stmt in statements {
                    self.resolve_stmt(stmt);
                }
                if scope.is_some() {
                    self.scopes.pop();
                }
            }
            BoundStmtKind::Expr(expr) => self.resolve_expr(expr),
            BoundStmtKind::Local { decls } => {
                for decl in decls {
                    self.resolve_decl(decl);
                }
            }
            BoundStmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.resolve_expr(cond);
                self.resolve_stmt(then_stmt);
                if let Some(else_stmt) = else_stmt {
                    self.resolve_stmt(else_stmt);
                }
            }
            BoundStmtKind::While { cond, body } => {
                self.resolve_expr(cond);
                self.resolve_stmt(body);
            }
            BoundStmtKind::For {
                init,
                cond,
                update,
                body,
                scope,
            } => {
                if let Some(scope) = scope {
                    self.scopes.push(scope);
                }
                if let Some(init) = init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = cond {
                    self.resolve_expr(cond);
                }
                for expr in update {
                    self.resolve_expr(expr);
                }
                self.resolve_stmt(body);
                if scope.is_some() {
                    self.scopes.pop();
                }
            }
            BoundStmtKind::Return(value) => {
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            BoundStmtKind::Using { .. }
            | BoundStmtKind::Break
            | BoundStmtKind::Continue
            | BoundStmtKind::Error => {}
        }
    }

    // === Expressions ===

    fn resolve_expr(&mut self, id: BoundExprId) {
        let kind = self.tree.expr(id).kind.clone();
        match kind {
            BoundExprKind::Literal { .. } | BoundExprKind::Error => {}
            BoundExprKind::Name { parts, symbol } => {
                if symbol.is_some() {
                    return;
                }
                match self.resolve_parts(&parts) {
                    Some(found) => {
                        let ty = self.symbols.value_type(found);
                        let node = self.tree.expr_mut(id);
                        if let BoundExprKind::Name { symbol, .. } = &mut node.kind {
                            *symbol = Some(found);
                        }
                        if node.ty.is_none() {
                            node.ty = ty;
                        }
                        if matches!(
                            self.symbols.get(found).kind,
                            SymbolKind::Variable(_) | SymbolKind::Parameter(_) | SymbolKind::Field(_)
                        ) {
                            self.tree.expr_mut(id).value_category = ValueCategory::LValue;
                        }
                    }
                    None => {
                        let location = self.tree.expr(id).location;
                        let name = self.name_text(&parts);
                        self.error(format!("unknown name '{name}'"), location);
                    }
                }
            }
            BoundExprKind::This { containing_type } => {
                if containing_type.is_none() {
                    match self.symbols.enclosing_type(self.scope()) {
                        Some(enclosing) => {
                            let ty = self.symbols.as_type(enclosing).and_then(|d| d.ty);
                            let node = self.tree.expr_mut(id);
                            if let BoundExprKind::This { containing_type } = &mut node.kind {
                                *containing_type = Some(enclosing);
                            }
                            if node.ty.is_none() {
                                node.ty = ty;
                            }
                        }
                        None => {
                            let location = self.tree.expr(id).location;
                            self.error("'this' used outside of a type".to_string(), location);
                        }
                    }
                }
            }
            BoundExprKind::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            BoundExprKind::Unary { operand, .. } => self.resolve_expr(operand),
            BoundExprKind::IncDec { target, .. } => self.resolve_expr(target),
            BoundExprKind::Assignment { target, value, .. } => {
                self.resolve_expr(target);
                self.resolve_expr(value);
            }
            BoundExprKind::Conversion { operand, .. } => self.resolve_expr(operand),
            BoundExprKind::MemberAccess {
                object,
                member_name,
                member,
            } => {
                self.resolve_expr(object);
                if member.is_some() {
                    return;
                }
                let object_type = self.tree.expr(object).ty;
                let Some(object_type) = object_type else {
                    // An earlier error already left the object untyped.
                    return;
                };
                let type_symbol = self.types.as_named(object_type);
                let found = type_symbol.and_then(|t| self.lookup_member(t, member_name));
                match found {
                    Some(found) => {
                        let ty = self.symbols.value_type(found);
                        let node = self.tree.expr_mut(id);
                        if let BoundExprKind::MemberAccess { member, .. } = &mut node.kind {
                            *member = Some(found);
                        }
                        if node.ty.is_none() {
                            node.ty = ty;
                        }
                    }
                    None => {
                        let location = self.tree.expr(id).location;
                        let type_name = self.type_text(object_type);
                        let member_text = self.interner.resolve(member_name).to_string();
                        self.error(
                            format!("type '{type_name}' has no member '{member_text}'"),
                            location,
                        );
                    }
                }
            }
            BoundExprKind::Index {
                object,
                index,
                indexer_property,
            } => {
                self.resolve_expr(object);
                self.resolve_expr(index);
                if indexer_property.is_some() || self.tree.expr(id).ty.is_some() {
                    return;
                }
                let Some(object_type) = self.tree.expr(object).ty else {
                    return;
                };
                if let Some(element) = self.types.element_of(object_type) {
                    self.tree.expr_mut(id).ty = Some(element);
                    return;
                }
                // The `Item` property is the indexer hook.
                let item = self.interner.lookup("Item");
                let indexer = self
                    .types
                    .as_named(object_type)
                    .zip(item)
                    .and_then(|(t, item)| self.lookup_member(t, item))
                    .filter(|s| self.symbols.as_property(*s).is_some());
                match indexer {
                    Some(indexer) => {
                        let ty = self.symbols.value_type(indexer);
                        let node = self.tree.expr_mut(id);
                        if let BoundExprKind::Index {
                            indexer_property, ..
                        } = &mut node.kind
                        {
                            *indexer_property = Some(indexer);
                        }
                        if node.ty.is_none() {
                            node.ty = ty;
                        }
                    }
                    None => {
                        let location = self.tree.expr(id).location;
                        let type_name = self.type_text(object_type);
                        self.error(format!("type '{type_name}' cannot be indexed"), location);
                    }
                }
            }
            BoundExprKind::TypeExpr { parts, resolved } => {
                if resolved.is_some() {
                    return;
                }
                let found = self
                    .resolve_parts(&parts)
                    .and_then(|s| self.symbols.as_type(s))
                    .and_then(|d| d.ty);
                match found {
                    Some(ty) => {
                        let node = self.tree.expr_mut(id);
                        if let BoundExprKind::TypeExpr { resolved, .. } = &mut node.kind {
                            *resolved = Some(ty);
                        }
                        if node.ty.is_none() {
                            node.ty = Some(ty);
                        }
                    }
                    None => {
                        let location = self.tree.expr(id).location;
                        let name = self.name_text(&parts);
                        self.error(format!("unknown type '{name}'"), location);
                    }
                }
            }
            BoundExprKind::Call {
                callee,
                args,
                method,
            } => {
                self.resolve_expr(callee);
                for arg in &args {
                    self.resolve_expr(*arg);
                }
                if method.is_none() {
                    self.resolve_call(id, callee, &args);
                }
            }
            BoundExprKind::New {
                type_expr,
                args,
                constructor,
            } => {
                self.resolve_expr(type_expr);
                for arg in &args {
                    self.resolve_expr(*arg);
                }
                // Propagate the (possibly just-resolved) type.
                if self.tree.expr(id).ty.is_none() {
                    self.tree.expr_mut(id).ty = self.tree.expr(type_expr).ty;
                }
                if constructor.is_none() {
                    self.resolve_constructor(id, type_expr, &args);
                }
            }
        }
    }

    // === Calls and overloads ===

    fn resolve_call(&mut self, id: BoundExprId, callee: BoundExprId, args: &[BoundExprId]) {
        let location = self.tree.expr(id).location;
        let arg_types: Vec<Option<TypeId>> =
            args.iter().map(|a| self.tree.expr(*a).ty).collect();

        let (candidates, display_name) = match self.tree.expr(callee).kind.clone() {
            // The callee name never resolved; that was already reported.
            BoundExprKind::Name { symbol: None, .. } => return,
            BoundExprKind::Name { parts, .. } => {
                let display = self.name_text(&parts);
                let candidates = if parts.len() == 1 {
                    let mut found = self.symbols.functions_named(self.scope(), parts[0]);
                    if found.is_empty() {
                        for ns in &self.usings {
                            found = self
                                .symbols
                                .members_named(*ns, parts[0])
                                .iter()
                                .copied()
                                .filter(|s| self.symbols.as_function(*s).is_some())
                                .collect();
                            if !found.is_empty() {
                                break;
                            }
                        }
                    }
                    found
                } else {
                    let (last, prefix) = parts.split_last().expect("parts non-empty");
                    match self.resolve_parts(prefix) {
                        Some(container) => self
                            .symbols
                            .members_named(container, *last)
                            .iter()
                            .copied()
                            .filter(|s| self.symbols.as_function(*s).is_some())
                            .collect(),
                        None => Vec::new(),
                    }
                };
                (candidates, display)
            }
            BoundExprKind::MemberAccess {
                object,
                member_name,
                member,
            } => {
                let display = self.interner.resolve(member_name).to_string();
                let candidates = match member {
                    Some(member) if self.symbols.as_function(member).is_some() => {
                        // Re-collect the full overload set from the
                        // object's type so overloads are considered.
                        match self
                            .tree
                            .expr(object)
                            .ty
                            .and_then(|t| self.types.as_named(t))
                        {
                            Some(type_symbol) => self.member_functions(type_symbol, member_name),
                            None => vec![member],
                        }
                    }
                    Some(_) => Vec::new(),
                    None => self
                        .tree
                        .expr(object)
                        .ty
                        .and_then(|t| self.types.as_named(t))
                        .map(|t| self.member_functions(t, member_name))
                        .unwrap_or_default(),
                };
                (candidates, display)
            }
            BoundExprKind::Error => return,
            _ => {
                self.error("expression is not callable".to_string(), location);
                return;
            }
        };

        if candidates.is_empty() {
            self.error(
                format!("no matching overload for '{display_name}'"),
                location,
            );
            return;
        }

        match self.pick_overload(&candidates, &arg_types) {
            OverloadOutcome::Match(chosen) => {
                let ret = self.symbols.as_function(chosen).and_then(|d| d.return_type);
                self.apply_argument_conversions(id, chosen, args);
                let node = self.tree.expr_mut(id);
                if let BoundExprKind::Call { method, .. } = &mut node.kind {
                    *method = Some(chosen);
                }
                if node.ty.is_none() {
                    node.ty = ret;
                }
            }
            OverloadOutcome::Ambiguous => {
                self.error(format!("ambiguous call to '{display_name}'"), location);
            }
            OverloadOutcome::NoMatch => {
                self.error(
                    format!("no matching overload for '{display_name}'"),
                    location,
                );
            }
        }
    }

    fn resolve_constructor(&mut self, id: BoundExprId, type_expr: BoundExprId, args: &[BoundExprId]) {
        let location = self.tree.expr(id).location;
        let Some(type_symbol) = self
            .tree
            .expr(type_expr)
            .ty
            .and_then(|t| self.types.as_named(t))
        else {
            return;
        };

        let type_name = self.symbols.get(type_symbol).name;
        let constructors: Vec<SymbolId> = self
            .symbols
            .members_named(type_symbol, type_name)
            .iter()
            .copied()
            .filter(|s| {
                self.symbols
                    .as_function(*s)
                    .is_some_and(|d| d.is_constructor)
            })
            .collect();

        if constructors.is_empty() {
            // No constructor at all: default initialization is fine for
            // an empty argument list.
            if !args.is_empty() {
                let name = self.interner.resolve(type_name).to_string();
                self.error(
                    format!("type '{name}' has no constructor taking arguments"),
                    location,
                );
            }
            return;
        }

        let arg_types: Vec<Option<TypeId>> =
            args.iter().map(|a| self.tree.expr(*a).ty).collect();
        match self.pick_overload(&constructors, &arg_types) {
            OverloadOutcome::Match(chosen) => {
                self.apply_argument_conversions(id, chosen, args);
                if let BoundExprKind::New { constructor, .. } = &mut self.tree.expr_mut(id).kind {
                    *constructor = Some(chosen);
                }
            }
            OverloadOutcome::Ambiguous => {
                let name = self.interner.resolve(type_name).to_string();
                self.error(format!("ambiguous constructor call for '{name}'"), location);
            }
            OverloadOutcome::NoMatch => {
                let name = self.interner.resolve(type_name).to_string();
                self.error(
                    format!("no matching constructor for '{name}'"),
                    location,
                );
            }
        }
    }

    /// Minimal overload resolution: arity must match, and each argument
    /// must convert to the parameter type by identity or an implicit
    /// conversion. Exact (all-identity) matches beat conversion matches;
    /// remaining ties are ambiguous.
    fn pick_overload(
        &self,
        candidates: &[SymbolId],
        arg_types: &[Option<TypeId>],
    ) -> OverloadOutcome {
        let mut matches: Vec<(SymbolId, bool)> = Vec::new();

        'candidates: for &candidate in candidates {
            let Some(data) = self.symbols.as_function(candidate) else {
                continue;
            };
            if data.params.len() != arg_types.len() {
                continue;
            }
            let mut exact = true;
            for (param, arg) in data.params.iter().zip(arg_types) {
                let Some(param_type) = self.symbols.value_type(*param) else {
                    continue;
                };
                let Some(arg_type) = arg else {
                    // Untyped argument from an earlier error: do not
                    // reject candidates over it.
                    exact = false;
                    continue;
                };
                match classify(self.types, self.symbols, *arg_type, param_type) {
                    ConversionKind::Identity => {}
                    kind if kind.is_implicit() => exact = false,
                    _ => continue 'candidates,
                }
            }
            matches.push((candidate, exact));
        }

        match matches.len() {
            0 => OverloadOutcome::NoMatch,
            1 => OverloadOutcome::Match(matches[0].0),
            _ => {
                let exact: Vec<SymbolId> = matches
                    .iter()
                    .filter(|(_, is_exact)| *is_exact)
                    .map(|(id, _)| *id)
                    .collect();
                if exact.len() == 1 {
                    OverloadOutcome::Match(exact[0])
                } else {
                    OverloadOutcome::Ambiguous
                }
            }
        }
    }

    /// Wraps arguments in conversion nodes where the chosen overload
    /// requires a non-identity implicit conversion. Identity rewraps are
    /// skipped, keeping the pass idempotent.
    fn apply_argument_conversions(
        &mut self,
        call: BoundExprId,
        function: SymbolId,
        args: &[BoundExprId],
    ) {
        let params = match self.symbols.as_function(function) {
            Some(data) => data.params.clone(),
            None => return,
        };
        let mut replacements: Vec<(usize, BoundExprId)> = Vec::new();
        for (i, (arg, param)) in args.iter().zip(&params).enumerate() {
            let Some(arg_type) = self.tree.expr(*arg).ty else {
                continue;
            };
            let Some(param_type) = self.symbols.value_type(*param) else {
                continue;
            };
            let conversion = classify(self.types, self.symbols, arg_type, param_type);
            if conversion == ConversionKind::Identity || !conversion.is_implicit() {
                continue;
            }
            let location = self.tree.expr(*arg).location;
            let wrapped = self.tree.alloc_expr(BoundExpr {
                location,
                ty: Some(param_type),
                value_category: ValueCategory::RValue,
                constant: None,
                kind: BoundExprKind::Conversion {
                    operand: *arg,
                    conversion,
                },
            });
            replacements.push((i, wrapped));
        }
        if replacements.is_empty() {
            return;
        }
        match &mut self.tree.expr_mut(call).kind {
            BoundExprKind::Call { args, .. } | BoundExprKind::New { args, .. } => {
                for (i, wrapped) in replacements {
                    args[i] = wrapped;
                }
            }
            _ => {}
        }
    }
}

enum OverloadOutcome {
    Match(SymbolId),
    Ambiguous,
    NoMatch,
}

#[cfg(test)]
mod tests {
    use crate::bound::BoundExprKind;
    use crate::test_util::{resolve_source, Analysis};
    use sable_base::ErrorKind;

    fn find_call(analysis: &Analysis) -> Option<(Option<crate::SymbolId>, Option<crate::TypeId>)> {
        analysis.tree.expr_ids().find_map(|id| {
            if let BoundExprKind::Call { method, .. } = &analysis.tree.expr(id).kind {
                Some((*method, analysis.tree.expr(id).ty))
            } else {
                None
            }
        })
    }

    #[test]
    fn call_resolves_to_matching_overload() {
        let analysis = resolve_source(
            "int f(int a) { return a; } int f(bool b) { return 0; } void g() { f(1); }",
        );
        assert!(!analysis.diags.has_errors(), "{:?}", analysis.diags.iter().collect::<Vec<_>>());
        let (method, ty) = find_call(&analysis).expect("call present");
        let method = method.expect("method resolved");
        let param = analysis.symbols.as_function(method).unwrap().params[0];
        assert_eq!(
            analysis.symbols.value_type(param),
            Some(analysis.types.int_type())
        );
        assert_eq!(ty, Some(analysis.types.int_type()));
    }

    #[test]
    fn no_matching_overload_is_one_resolution_error() {
        let analysis = resolve_source(
            "int f(int a) { return a; } int f(bool b) { return 0; } void g() { f(1.0); }",
        );
        let errors: Vec<_> = analysis.diags.of_kind(ErrorKind::Resolution).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("no matching overload"));
    }

    #[test]
    fn widening_match_succeeds_when_unambiguous() {
        let analysis =
            resolve_source("int f(long a) { return 0; } void g() { f(1); }");
        assert!(!analysis.diags.has_errors());
        // The int argument is wrapped in an implicit conversion to long.
        let wrapped = analysis.tree.expr_ids().any(|id| {
            matches!(
                analysis.tree.expr(id).kind,
                BoundExprKind::Conversion { .. }
            )
        });
        assert!(wrapped);
    }

    #[test]
    fn two_widening_candidates_are_ambiguous() {
        let analysis = resolve_source(
            "int f(long a) { return 0; } int f(double b) { return 0; } void g() { f(1); }",
        );
        let errors: Vec<_> = analysis.diags.of_kind(ErrorKind::Resolution).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("ambiguous"));
    }

    #[test]
    fn exact_match_beats_widening() {
        let analysis = resolve_source(
            "int f(int a) { return 0; } int f(long b) { return 0; } void g() { f(1); }",
        );
        assert!(!analysis.diags.has_errors());
        let (method, _) = find_call(&analysis).expect("call present");
        let param = analysis.symbols.as_function(method.unwrap()).unwrap().params[0];
        assert_eq!(
            analysis.symbols.value_type(param),
            Some(analysis.types.int_type())
        );
    }

    #[test]
    fn member_call_resolves_through_object_type() {
        let analysis = resolve_source(
            "class C { int m(int a) { return a; } } void g(C c) { c.m(3); }",
        );
        assert!(!analysis.diags.has_errors(), "{:?}", analysis.diags.iter().collect::<Vec<_>>());
        let (method, _) = find_call(&analysis).expect("call present");
        assert!(method.is_some());
    }

    #[test]
    fn constructor_resolves_on_new() {
        let analysis = resolve_source(
            "class Pt { int x; Pt(int v) { x = v; } } void h() { var p = new Pt(3); p = p; }",
        );
        assert!(!analysis.diags.has_errors(), "{:?}", analysis.diags.iter().collect::<Vec<_>>());
        let ctor = analysis.tree.expr_ids().find_map(|id| {
            if let BoundExprKind::New { constructor, .. } = &analysis.tree.expr(id).kind {
                Some(*constructor)
            } else {
                None
            }
        });
        assert!(ctor.expect("new present").is_some());
    }

    #[test]
    fn new_without_constructor_defaults_when_no_args() {
        let analysis = resolve_source("class C { int x; } void g() { var c = new C(); c = c; }");
        assert!(!analysis.diags.has_errors());
        let analysis = resolve_source("class C { int x; } void g() { var c = new C(5); c = c; }");
        assert_eq!(analysis.diags.of_kind(ErrorKind::Resolution).count(), 1);
    }

    #[test]
    fn this_outside_a_type_is_reported() {
        let analysis = resolve_source("void f() { this.x = 1; }");
        assert!(analysis
            .diags
            .of_kind(ErrorKind::Resolution)
            .any(|e| e.message.contains("'this'")));
    }

    #[test]
    fn unknown_name_is_reported_once() {
        let analysis = resolve_source("void f() { missing = 1; }");
        let errors: Vec<_> = analysis.diags.of_kind(ErrorKind::Resolution).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing"));
    }

    #[test]
    fn using_directive_resolves_and_enables_lookup() {
        let analysis = resolve_source(
            "using N; namespace N { class C { } } void f() { N.C c = null; c = c; }",
        );
        assert!(!analysis.diags.has_errors());
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut analysis = resolve_source(
            "class Pt { int x; Pt(int v) { x = v; } int get() { return x; } } \
             void h() { var p = new Pt(3); p.get(); }",
        );
        assert!(!analysis.diags.has_errors());

        let snapshot: Vec<String> = analysis
            .tree
            .expr_ids()
            .map(|id| format!("{:?}", analysis.tree.expr(id).kind))
            .collect();
        let errors_before = analysis.diags.len();

        crate::resolve::resolve(
            &mut analysis.tree,
            &analysis.symbols,
            &analysis.types,
            &analysis.interner,
            &mut analysis.diags,
        );

        let after: Vec<String> = analysis
            .tree
            .expr_ids()
            .map(|id| format!("{:?}", analysis.tree.expr(id).kind))
            .collect();
        assert_eq!(snapshot.len(), after.len(), "no nodes were re-allocated");
        assert_eq!(snapshot, after);
        assert_eq!(analysis.diags.len(), errors_before);
    }

    #[test]
    fn indexing_array_typed_values_resolves_element_type() {
        let analysis = resolve_source("int first(int[] xs) { return xs[0]; }");
        assert!(!analysis.diags.has_errors());
    }
}
