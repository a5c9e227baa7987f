//! Bound-tree to HLIR lowering.
//!
//! The module is pre-populated with one function per function symbol and
//! one type definition per type symbol, so every call site can find its
//! target. Each function body is then lowered independently: a
//! symbol-to-SSA-value map tracks the current value of every parameter
//! and local, a loop stack carries `break`/`continue` targets, and loop
//! headers get phi nodes for the symbols the body reassigns. Phi
//! incomings for back edges are completed when the branch to the header
//! is emitted, so the finished function is valid SSA.
//!
//! Lowering errors (unresolved references, `break` outside a loop,
//! `this` in a static context) are reported and replaced with typed
//! poison values or skipped branches; the CFG stays well-formed either
//! way.

use crate::builder::FunctionBuilder;
use crate::hlir::{BinOp, BlockId, FuncId, InstId, Module, UnOp, ValueId};
use rustc_hash::{FxHashMap, FxHashSet};
use sable_base::{Diagnostics, ErrorKind, Interner, SourceLocation, Symbol};
use sable_semantic::bound::{
    BoundDeclId, BoundDeclKind, BoundExprId, BoundExprKind, BoundStmtId, BoundStmtKind, BoundTree,
    ConstantValue,
};
use sable_semantic::{
    ConversionKind, SymbolId, SymbolKind, SymbolTable, TypeId, TypeSystem,
};
use sable_syntax::ast::{AssignOp, BinaryOp, UnaryOp};

/// Lowers a resolved bound tree into an HLIR module.
pub fn lower(
    tree: &BoundTree,
    symbols: &SymbolTable,
    types: &mut TypeSystem,
    interner: &mut Interner,
    diags: &mut Diagnostics,
    module_name: &str,
) -> Module {
    let mut module = Module::new(module_name, symbols);
    let names = WellKnownNames {
        this: interner.intern("this"),
        get: interner.intern("get"),
        set: interner.intern("set"),
    };

    let mut work = Vec::new();
    for decl in &tree.root {
        collect_functions(tree, *decl, &mut work);
    }

    for (symbol, body) in work {
        let Some(func_id) = module.find_function(symbol) else {
            continue;
        };
        let Some(body) = body else {
            // Extern and abstract functions have no blocks.
            continue;
        };
        lower_function(
            tree, symbols, types, diags, &mut module, func_id, symbol, body, names,
        );
    }

    module
}

/// Interned names the lowerer needs for synthesized values and
/// accessor lookup.
#[derive(Clone, Copy)]
struct WellKnownNames {
    this: Symbol,
    get: Symbol,
    set: Symbol,
}

/// Collects `(function symbol, body)` pairs, including property
/// accessors, in declaration order.
fn collect_functions(
    tree: &BoundTree,
    decl: BoundDeclId,
    out: &mut Vec<(SymbolId, Option<BoundStmtId>)>,
) {
    match &tree.decl(decl).kind {
        BoundDeclKind::Namespace { members } | BoundDeclKind::Type { members } => {
            for member in members {
                collect_functions(tree, *member, out);
            }
        }
        BoundDeclKind::Function { body, .. } => {
            if let Some(symbol) = tree.decl(decl).symbol {
                out.push((symbol, *body));
            }
        }
        BoundDeclKind::Property { getter, setter } => {
            for accessor in [getter, setter].into_iter().flatten() {
                if let Some(function) = accessor.function {
                    out.push((function, accessor.body));
                }
            }
        }
        BoundDeclKind::Variable { .. } => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn lower_function(
    tree: &BoundTree,
    symbols: &SymbolTable,
    types: &mut TypeSystem,
    diags: &mut Diagnostics,
    module: &mut Module,
    func_id: FuncId,
    symbol: SymbolId,
    body: BoundStmtId,
    names: WellKnownNames,
) {
    // Take the function out of the module so the builder can borrow it
    // mutably while call lowering still reads the module's function map.
    let mut func = std::mem::take(module.function_mut(func_id));
    if func.is_external {
        *module.function_mut(func_id) = func;
        return;
    }

    let entry = func.create_block("entry");
    func.entry = Some(entry);

    {
        let b = FunctionBuilder::new(&mut func, types, entry);
        let mut lowering = FunctionLowering {
            b,
            tree,
            symbols,
            diags,
            module,
            symbol_values: FxHashMap::default(),
            loop_stack: Vec::new(),
            this_value: None,
            names,
        };

        // Instance functions reserve the first parameter for `this`.
        let data = symbols.as_function(symbol);
        let is_instance = symbols.get(symbol).parent.is_some_and(|p| {
            matches!(symbols.get(p).kind, SymbolKind::Type(_))
        }) && data.is_some_and(|d| !d.is_static);
        // Accessor functions sit one level deeper, under the property.
        let is_accessor_instance = symbols
            .get(symbol)
            .parent
            .is_some_and(|p| matches!(symbols.get(p).kind, SymbolKind::Property(_)))
            && data.is_some_and(|d| !d.is_static);

        if is_instance || is_accessor_instance {
            let owner = lowering.enclosing_type_of(symbol);
            let this_ty = owner
                .and_then(|t| lowering.symbols.as_type(t))
                .and_then(|d| d.ty)
                .map(|t| lowering.b.types.pointer(t))
                .unwrap_or_else(|| lowering.b.types.fresh_unresolved());
            let this_value = lowering.b.func.create_value(this_ty, Some(names.this));
            lowering.b.func.params.push(this_value);
            lowering.this_value = Some(this_value);
        }

        let params = data.map(|d| d.params.clone()).unwrap_or_default();
        for param in params {
            let ty = lowering
                .symbols
                .value_type(param)
                .unwrap_or_else(|| lowering.b.types.fresh_unresolved());
            let name = lowering.symbols.get(param).name;
            let value = lowering.b.func.create_value(ty, Some(name));
            lowering.b.func.params.push(value);
            lowering.symbol_values.insert(param, value);
        }

        lowering.lower_stmt(body);

        // Implicit return for a fall-through function end. An
        // unreachable trailing block (a merge both branches returned
        // out of) is left empty; a reachable fall-through returns void,
        // or a typed zero when the function is non-void, keeping the
        // CFG well-formed.
        if !lowering.b.is_terminated() {
            let current = lowering.b.current_block();
            let reachable =
                current == entry || !lowering.b.func.block(current).predecessors.is_empty();
            if reachable {
                let ret_ty = lowering
                    .symbols
                    .as_function(symbol)
                    .and_then(|d| d.return_type)
                    .filter(|t| !lowering.b.types.is_void(*t));
                match ret_ty {
                    Some(ty) => {
                        let location = tree.stmt(body).location;
                        lowering.error(
                            "not all paths return a value".to_string(),
                            location,
                        );
                        let zero = lowering.b.zero_value(ty);
                        lowering.b.ret(Some(zero));
                    }
                    None => lowering.b.ret(None),
                }
            }
        }
    }

    *module.function_mut(func_id) = func;
}

struct LoopContext {
    /// The phi-carrying block every back edge targets.
    header: BlockId,
    continue_target: BlockId,
    break_target: BlockId,
    /// Header phis for symbols reassigned inside the loop; completed at
    /// every branch back to the header.
    phis: Vec<(InstId, SymbolId)>,
    /// While-loops continue straight to the header, so `continue` edges
    /// feed the phis; for-loops continue to the update block instead.
    continue_feeds_phis: bool,
}

struct FunctionLowering<'a, 'b> {
    b: FunctionBuilder<'a>,
    tree: &'b BoundTree,
    symbols: &'b SymbolTable,
    diags: &'a mut Diagnostics,
    module: &'b Module,
    symbol_values: FxHashMap<SymbolId, ValueId>,
    loop_stack: Vec<LoopContext>,
    this_value: Option<ValueId>,
    names: WellKnownNames,
}

impl<'a, 'b> FunctionLowering<'a, 'b> {
    fn error(&mut self, message: String, location: SourceLocation) {
        self.diags.report(ErrorKind::Lowering, message, location);
    }

    fn enclosing_type_of(&self, symbol: SymbolId) -> Option<SymbolId> {
        let parent = self.symbols.get(symbol).parent?;
        self.symbols.enclosing_type(parent)
    }

    /// Typed zero standing in for a value lowering could not produce.
    fn poison(&mut self, ty: Option<TypeId>) -> ValueId {
        let ty = ty.unwrap_or_else(|| self.b.types.int_type());
        self.b.zero_value(ty)
    }

    /// Lowers an expression that must produce a value.
    fn expect_value(&mut self, id: BoundExprId) -> ValueId {
        match self.lower_expr(id) {
            Some(value) => value,
            None => {
                let ty = self.tree.expr(id).ty;
                self.poison(ty)
            }
        }
    }

    // === Statements ===

    fn lower_stmt(&mut self, id: BoundStmtId) {
        match self.tree.stmt(id).kind.clone() {
            BoundStmtKind::Block { statements, .. } => {
                let count = statements.len();
                for (i, stmt) in statements.into_iter().enumerate() {
                    self.lower_stmt(stmt);
                    // Statements after a terminator are unreachable;
                    // give them a fresh block rather than appending past
                    // the terminator.
                    if self.b.is_terminated() && i + 1 < count {
                        let cont = self.b.create_block("unreachable");
                        self.b.set_block(cont);
                    }
                }
            }
            BoundStmtKind::Expr(expr) => {
                self.lower_expr(expr);
            }
            BoundStmtKind::Local { decls } => {
                for decl in decls {
                    self.lower_local(decl);
                }
            }
            BoundStmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.lower_if(cond, then_stmt, else_stmt),
            BoundStmtKind::While { cond, body } => self.lower_while(cond, body),
            BoundStmtKind::For {
                init,
                cond,
                update,
                body,
                ..
            } => self.lower_for(init, cond, update, body),
            BoundStmtKind::Break => {
                let location = self.tree.stmt(id).location;
                match self.loop_stack.last() {
                    Some(ctx) => {
                        let target = ctx.break_target;
                        self.b.br(target);
                    }
                    None => {
                        self.error("'break' outside of a loop".to_string(), location)
                    }
                }
            }
            BoundStmtKind::Continue => {
                let location = self.tree.stmt(id).location;
                match self.loop_stack.last() {
                    Some(ctx) if ctx.continue_feeds_phis => {
                        self.branch_to_loop_header();
                    }
                    Some(ctx) => {
                        let target = ctx.continue_target;
                        self.b.br(target);
                    }
                    None => {
                        self.error("'continue' outside of a loop".to_string(), location)
                    }
                }
            }
            BoundStmtKind::Return(value) => {
                let value = value.map(|v| self.expect_value(v));
                self.b.ret(value);
            }
            BoundStmtKind::Using { .. } | BoundStmtKind::Error => {}
        }
    }

    fn lower_local(&mut self, id: BoundDeclId) {
        let decl = self.tree.decl(id);
        let symbol = decl.symbol;
        let initializer = match &decl.kind {
            BoundDeclKind::Variable { initializer, .. } => *initializer,
            _ => return,
        };
        let value = match initializer {
            Some(init) => self.expect_value(init),
            None => {
                // Default-initialize to the typed zero.
                let ty = symbol.and_then(|s| self.symbols.value_type(s));
                self.poison(ty)
            }
        };
        if let Some(symbol) = symbol {
            self.symbol_values.insert(symbol, value);
        }
    }

    fn lower_if(
        &mut self,
        cond: BoundExprId,
        then_stmt: BoundStmtId,
        else_stmt: Option<BoundStmtId>,
    ) {
        let cond_value = self.expect_value(cond);

        let then_block = self.b.create_block("if.then");
        let else_block = else_stmt.map(|_| self.b.create_block("if.else"));
        let merge_block = self.b.create_block("if.merge");

        self.b
            .cond_br(cond_value, then_block, else_block.unwrap_or(merge_block));

        self.b.set_block(then_block);
        self.lower_stmt(then_stmt);
        if !self.b.is_terminated() {
            self.b.br(merge_block);
        }

        if let (Some(else_block), Some(else_stmt)) = (else_block, else_stmt) {
            self.b.set_block(else_block);
            self.lower_stmt(else_stmt);
            if !self.b.is_terminated() {
                self.b.br(merge_block);
            }
        }

        self.b.set_block(merge_block);
    }

    fn lower_while(&mut self, cond: BoundExprId, body: BoundStmtId) {
        let preheader = self.b.current_block();
        let header = self.b.create_block("while.header");
        let body_block = self.b.create_block("while.body");
        let exit = self.b.create_block("while.exit");

        self.b.br(header);
        self.b.set_block(header);

        let mut assigned = FxHashSet::default();
        self.collect_assigned_stmt(body, &mut assigned);
        self.collect_assigned_expr(cond, &mut assigned);
        let phis = self.install_loop_phis(header, preheader, &assigned);

        let cond_value = self.expect_value(cond);
        self.b.cond_br(cond_value, body_block, exit);

        self.loop_stack.push(LoopContext {
            header,
            continue_target: header,
            break_target: exit,
            phis,
            continue_feeds_phis: true,
        });

        self.b.set_block(body_block);
        self.lower_stmt(body);
        if !self.b.is_terminated() {
            self.branch_to_loop_header();
        }

        let ctx = self.loop_stack.pop().expect("loop context pushed above");
        self.rebind_phi_values(&ctx);
        self.b.set_block(exit);
    }

    fn lower_for(
        &mut self,
        init: Option<BoundStmtId>,
        cond: Option<BoundExprId>,
        update: Vec<BoundExprId>,
        body: BoundStmtId,
    ) {
        if let Some(init) = init {
            self.lower_stmt(init);
        }

        let preheader = self.b.current_block();
        let header = self.b.create_block("for.header");
        let body_block = self.b.create_block("for.body");
        let update_block = self.b.create_block("for.update");
        let exit = self.b.create_block("for.exit");

        self.b.br(header);
        self.b.set_block(header);

        let mut assigned = FxHashSet::default();
        self.collect_assigned_stmt(body, &mut assigned);
        if let Some(cond) = cond {
            self.collect_assigned_expr(cond, &mut assigned);
        }
        for expr in &update {
            self.collect_assigned_expr(*expr, &mut assigned);
        }
        let phis = self.install_loop_phis(header, preheader, &assigned);

        match cond {
            Some(cond) => {
                let cond_value = self.expect_value(cond);
                self.b.cond_br(cond_value, body_block, exit);
            }
            None => self.b.br(body_block),
        }

        self.loop_stack.push(LoopContext {
            header,
            continue_target: update_block,
            break_target: exit,
            phis,
            continue_feeds_phis: false,
        });

        self.b.set_block(body_block);
        self.lower_stmt(body);
        if !self.b.is_terminated() {
            self.b.br(update_block);
        }

        self.b.set_block(update_block);
        for expr in update {
            self.lower_expr(expr);
        }
        self.branch_to_loop_header();

        let ctx = self.loop_stack.pop().expect("loop context pushed above");
        self.rebind_phi_values(&ctx);
        self.b.set_block(exit);
    }

    /// One phi per reassigned symbol that already has an SSA binding;
    /// the preheader value is the first incoming.
    fn install_loop_phis(
        &mut self,
        header: BlockId,
        preheader: BlockId,
        assigned: &FxHashSet<SymbolId>,
    ) -> Vec<(InstId, SymbolId)> {
        let mut tracked: Vec<SymbolId> = assigned
            .iter()
            .copied()
            .filter(|s| self.symbol_values.contains_key(s))
            .collect();
        tracked.sort_by_key(|s| s.index());

        let mut phis = Vec::with_capacity(tracked.len());
        for symbol in tracked {
            let current = self.symbol_values[&symbol];
            let ty = self.b.func.value(current).ty;
            let (value, inst) = self.b.phi(header, ty);
            self.b.phi_add_incoming(inst, current, preheader);
            self.symbol_values.insert(symbol, value);
            phis.push((inst, symbol));
        }
        phis
    }

    /// Feeds the header phis from the current block, then branches to
    /// the header. Used for every back edge of a phi-carrying loop.
    fn branch_to_loop_header(&mut self) {
        let ctx = self.loop_stack.last().expect("inside a loop");
        let header = ctx.header;
        let phis = ctx.phis.clone();
        let from = self.b.current_block();
        for (inst, symbol) in phis {
            let value = self.symbol_values[&symbol];
            self.b.phi_add_incoming(inst, value, from);
        }
        self.b.br(header);
    }

    /// After the loop, the live value of each tracked symbol is its
    /// header phi.
    fn rebind_phi_values(&mut self, ctx: &LoopContext) {
        for (inst, symbol) in &ctx.phis {
            if let Some(result) = self.b.func.inst(*inst).result {
                self.symbol_values.insert(*symbol, result);
            }
        }
    }

    // === Assigned-symbol scan ===

    fn collect_assigned_stmt(&self, id: BoundStmtId, out: &mut FxHashSet<SymbolId>) {
        match &self.tree.stmt(id).kind {
            BoundStmtKind::Block { statements, .. } => {
                for stmt in statements {
                    self.collect_assigned_stmt(*stmt, out);
                }
            }
            BoundStmtKind::Expr(expr) => self.collect_assigned_expr(*expr, out),
            BoundStmtKind::Local { decls } => {
                for decl in decls {
                    if let BoundDeclKind::Variable {
                        initializer: Some(init),
                        ..
                    } = &self.tree.decl(*decl).kind
                    {
                        self.collect_assigned_expr(*init, out);
                    }
                }
            }
            BoundStmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.collect_assigned_expr(*cond, out);
                self.collect_assigned_stmt(*then_stmt, out);
                if let Some(else_stmt) = else_stmt {
                    self.collect_assigned_stmt(*else_stmt, out);
                }
            }
            BoundStmtKind::While { cond, body } => {
                self.collect_assigned_expr(*cond, out);
                self.collect_assigned_stmt(*body, out);
            }
            BoundStmtKind::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.collect_assigned_stmt(*init, out);
                }
                if let Some(cond) = cond {
                    self.collect_assigned_expr(*cond, out);
                }
                for expr in update {
                    self.collect_assigned_expr(*expr, out);
                }
                self.collect_assigned_stmt(*body, out);
            }
            BoundStmtKind::Return(Some(value)) => self.collect_assigned_expr(*value, out),
            BoundStmtKind::Return(None)
            | BoundStmtKind::Break
            | BoundStmtKind::Continue
            | BoundStmtKind::Using { .. }
            | BoundStmtKind::Error => {}
        }
    }

    fn collect_assigned_expr(&self, id: BoundExprId, out: &mut FxHashSet<SymbolId>) {
        match &self.tree.expr(id).kind {
            BoundExprKind::Assignment { target, value, .. } => {
                self.note_assigned_target(*target, out);
                self.collect_assigned_expr(*value, out);
            }
            BoundExprKind::IncDec { target, .. } => {
                self.note_assigned_target(*target, out);
            }
            BoundExprKind::Binary { left, right, .. } => {
                self.collect_assigned_expr(*left, out);
                self.collect_assigned_expr(*right, out);
            }
            BoundExprKind::Unary { operand, .. }
            | BoundExprKind::Conversion { operand, .. } => {
                self.collect_assigned_expr(*operand, out);
            }
            BoundExprKind::Call { callee, args, .. } => {
                self.collect_assigned_expr(*callee, out);
                for arg in args {
                    self.collect_assigned_expr(*arg, out);
                }
            }
            BoundExprKind::New { args, .. } => {
                for arg in args {
                    self.collect_assigned_expr(*arg, out);
                }
            }
            BoundExprKind::MemberAccess { object, .. } => {
                self.collect_assigned_expr(*object, out);
            }
            BoundExprKind::Index { object, index, .. } => {
                self.collect_assigned_expr(*object, out);
                self.collect_assigned_expr(*index, out);
            }
            BoundExprKind::Literal { .. }
            | BoundExprKind::Name { .. }
            | BoundExprKind::This { .. }
            | BoundExprKind::TypeExpr { .. }
            | BoundExprKind::Error => {}
        }
    }

    fn note_assigned_target(&self, target: BoundExprId, out: &mut FxHashSet<SymbolId>) {
        let target = self.tree.skip_conversions(target);
        if let BoundExprKind::Name {
            symbol: Some(symbol),
            ..
        } = &self.tree.expr(target).kind
        {
            if matches!(
                self.symbols.get(*symbol).kind,
                SymbolKind::Variable(_) | SymbolKind::Parameter(_)
            ) {
                out.insert(*symbol);
            }
        }
    }

    // === Expressions ===

    fn lower_expr(&mut self, id: BoundExprId) -> Option<ValueId> {
        let node_ty = self.tree.expr(id).ty;
        let location = self.tree.expr(id).location;
        match self.tree.expr(id).kind.clone() {
            BoundExprKind::Literal { .. } => {
                let constant = self.tree.expr(id).constant;
                Some(self.lower_constant(constant, node_ty))
            }
            BoundExprKind::Name { symbol, .. } => match symbol {
                Some(symbol) => match self.symbol_values.get(&symbol) {
                    Some(value) => Some(*value),
                    None => {
                        self.error(
                            "name has no value in this context".to_string(),
                            location,
                        );
                        Some(self.poison(node_ty))
                    }
                },
                None => {
                    self.error("unresolved name reached lowering".to_string(), location);
                    Some(self.poison(node_ty))
                }
            },
            BoundExprKind::This { .. } => match self.this_value {
                Some(value) => Some(value),
                None => {
                    self.error("'this' is not available in a static context".to_string(), location);
                    Some(self.poison(node_ty))
                }
            },
            BoundExprKind::Binary { op, left, right } => {
                let left = self.expect_value(left);
                let right = self.expect_value(right);
                Some(self.b.binary(binary_opcode(op), left, right))
            }
            BoundExprKind::Unary { op, operand } => {
                let operand = self.expect_value(operand);
                let opcode = match op {
                    UnaryOp::Neg => UnOp::Neg,
                    UnaryOp::Not => UnOp::Not,
                    UnaryOp::BitNot => UnOp::BitNot,
                    // `+x` and pre-inc/dec never reach here; the binder
                    // rewrites them.
                    UnaryOp::Plus | UnaryOp::PreIncrement | UnaryOp::PreDecrement => {
                        return Some(operand);
                    }
                };
                Some(self.b.unary(opcode, operand))
            }
            BoundExprKind::IncDec {
                target,
                increment,
                prefix,
            } => Some(self.lower_incdec(target, increment, prefix, location)),
            BoundExprKind::Assignment { op, target, value } => {
                Some(self.lower_assignment(op, target, value, location))
            }
            BoundExprKind::Call {
                callee,
                args,
                method,
            } => self.lower_call(callee, &args, method, node_ty, location),
            BoundExprKind::MemberAccess { object, member, .. } => {
                Some(self.lower_member_load(object, member, node_ty, location))
            }
            BoundExprKind::Index {
                object,
                index,
                indexer_property,
            } => Some(self.lower_index_load(object, index, indexer_property, node_ty, location)),
            BoundExprKind::New {
                type_expr,
                args,
                constructor,
            } => Some(self.lower_new(type_expr, &args, constructor, location)),
            BoundExprKind::Conversion {
                operand,
                conversion,
            } => {
                let value = self.expect_value(operand);
                match conversion {
                    ConversionKind::Identity => Some(value),
                    _ => {
                        let target = node_ty.unwrap_or_else(|| self.b.types.fresh_unresolved());
                        Some(self.b.cast(value, target))
                    }
                }
            }
            BoundExprKind::TypeExpr { .. } => None,
            BoundExprKind::Error => Some(self.poison(node_ty)),
        }
    }

    fn lower_constant(&mut self, constant: Option<ConstantValue>, ty: Option<TypeId>) -> ValueId {
        match constant {
            Some(ConstantValue::Int(v)) => {
                let ty = ty.unwrap_or_else(|| self.b.types.int_type());
                self.b.const_int(v, ty)
            }
            Some(ConstantValue::Float(v)) => {
                let ty = ty.unwrap_or_else(|| {
                    self.b
                        .types
                        .primitive(sable_semantic::PrimitiveKind::Double)
                });
                self.b.const_float(v, ty)
            }
            Some(ConstantValue::Bool(v)) => {
                let ty = ty.unwrap_or_else(|| self.b.types.bool_type());
                self.b.const_bool(v, ty)
            }
            Some(ConstantValue::Str(v)) => {
                let ty = ty.unwrap_or_else(|| self.b.types.string_type());
                self.b.const_string(v, ty)
            }
            Some(ConstantValue::Null) | None => {
                let ty = ty.unwrap_or_else(|| self.b.types.int_type());
                self.b.const_null(ty)
            }
        }
    }

    /// `++x`/`x--`: load, add or subtract one, store back. The
    /// expression's value is the new value for the prefix forms and the
    /// original for the postfix forms.
    fn lower_incdec(
        &mut self,
        target: BoundExprId,
        increment: bool,
        prefix: bool,
        location: SourceLocation,
    ) -> ValueId {
        let (current, ty) = self.load_target(target, location);
        let one = match self.b.types.as_primitive(ty) {
            Some(k) if k.is_floating() => self.b.const_float(1.0, ty),
            _ => self.b.const_int(1, ty),
        };
        let op = if increment { BinOp::Add } else { BinOp::Sub };
        let updated = self.b.binary(op, current, one);
        self.store_target(target, updated, location);
        if prefix {
            updated
        } else {
            current
        }
    }

    fn lower_assignment(
        &mut self,
        op: AssignOp,
        target: BoundExprId,
        value: BoundExprId,
        location: SourceLocation,
    ) -> ValueId {
        let rhs = self.expect_value(value);

        // Compound assignment desugars to load-op-store.
        let final_value = match compound_opcode(op) {
            Some(opcode) => {
                let (current, _) = self.load_target(target, location);
                self.b.binary(opcode, current, rhs)
            }
            None => rhs,
        };

        self.store_target(target, final_value, location);
        final_value
    }

    /// Reads the current value of an assignable expression.
    fn load_target(&mut self, target: BoundExprId, location: SourceLocation) -> (ValueId, TypeId) {
        let target = self.tree.skip_conversions(target);
        let node_ty = self.tree.expr(target).ty;
        match self.tree.expr(target).kind.clone() {
            BoundExprKind::Name {
                symbol: Some(symbol),
                ..
            } => match self.symbol_values.get(&symbol) {
                Some(value) => {
                    let value = *value;
                    (value, self.b.func.value(value).ty)
                }
                None => {
                    self.error("variable read before assignment".to_string(), location);
                    let poison = self.poison(node_ty);
                    (poison, self.b.func.value(poison).ty)
                }
            },
            BoundExprKind::MemberAccess { object, member, .. } => {
                let value = self.lower_member_load(object, member, node_ty, location);
                (value, self.b.func.value(value).ty)
            }
            BoundExprKind::Index {
                object,
                index,
                indexer_property,
            } => {
                let value =
                    self.lower_index_load(object, index, indexer_property, node_ty, location);
                (value, self.b.func.value(value).ty)
            }
            _ => {
                self.error("expression is not assignable".to_string(), location);
                let poison = self.poison(node_ty);
                (poison, self.b.func.value(poison).ty)
            }
        }
    }

    /// Writes `value` into an assignable expression.
    fn store_target(&mut self, target: BoundExprId, value: ValueId, location: SourceLocation) {
        let target = self.tree.skip_conversions(target);
        match self.tree.expr(target).kind.clone() {
            BoundExprKind::Name {
                symbol: Some(symbol),
                ..
            } => {
                self.symbol_values.insert(symbol, value);
            }
            BoundExprKind::MemberAccess { object, member, .. } => {
                let Some(member) = member else {
                    self.error("assignment target was not resolved".to_string(), location);
                    return;
                };
                match &self.symbols.get(member).kind {
                    SymbolKind::Field(field) => {
                        let index = field.index;
                        let field_ty = field
                            .ty
                            .unwrap_or_else(|| self.b.types.fresh_unresolved());
                        let object_value = self.expect_value(object);
                        let address = self.b.field_addr(object_value, index, field_ty);
                        self.b.store(value, address);
                    }
                    SymbolKind::Property(_) => {
                        let setter = self.accessor_function(member, self.names.set);
                        match setter {
                            Some(setter) => {
                                let object_value = self.expect_value(object);
                                self.call_function(setter, vec![object_value, value], location);
                            }
                            None => self.error(
                                "property has no setter".to_string(),
                                location,
                            ),
                        }
                    }
                    _ => self.error("member is not assignable".to_string(), location),
                }
            }
            BoundExprKind::Index { object, index, .. } => {
                let object_ty = self.tree.expr(object).ty;
                let element = object_ty.and_then(|t| self.b.types.element_of(t));
                match element {
                    Some(element) => {
                        let object_value = self.expect_value(object);
                        let index_value = self.expect_value(index);
                        let address = self.b.element_addr(object_value, index_value, element);
                        self.b.store(value, address);
                    }
                    None => self.error(
                        "indexed assignment requires an array or pointer".to_string(),
                        location,
                    ),
                }
            }
            _ => self.error("expression is not assignable".to_string(), location),
        }
    }

    /// `get`/`set` child function of a property symbol.
    fn accessor_function(&self, property: SymbolId, which: Symbol) -> Option<SymbolId> {
        self.symbols
            .get(property)
            .members
            .iter()
            .copied()
            .find(|m| self.symbols.get(*m).name == which && self.symbols.as_function(*m).is_some())
    }

    fn call_function(
        &mut self,
        function: SymbolId,
        args: Vec<ValueId>,
        location: SourceLocation,
    ) -> Option<ValueId> {
        let Some(func_id) = self.module.find_function(function) else {
            self.error("call target has no lowered function".to_string(), location);
            return None;
        };
        let ret = self
            .symbols
            .as_function(function)
            .and_then(|d| d.return_type);
        self.b.call(func_id, args, ret)
    }

    fn lower_member_load(
        &mut self,
        object: BoundExprId,
        member: Option<SymbolId>,
        node_ty: Option<TypeId>,
        location: SourceLocation,
    ) -> ValueId {
        let Some(member) = member else {
            self.error("member access was not resolved".to_string(), location);
            return self.poison(node_ty);
        };
        match &self.symbols.get(member).kind {
            SymbolKind::Field(field) => {
                let index = field.index;
                let field_ty = field.ty.unwrap_or_else(|| self.b.types.fresh_unresolved());
                let object_value = self.expect_value(object);
                let address = self.b.field_addr(object_value, index, field_ty);
                self.b.load(address, field_ty)
            }
            SymbolKind::Property(_) => {
                let getter = self.accessor_function(member, self.names.get);
                match getter {
                    Some(getter) => {
                        let object_value = self.expect_value(object);
                        match self.call_function(getter, vec![object_value], location) {
                            Some(value) => value,
                            None => self.poison(node_ty),
                        }
                    }
                    None => {
                        self.error("property has no getter".to_string(), location);
                        self.poison(node_ty)
                    }
                }
            }
            // Method references produce the receiver; the call site
            // consumes it.
            SymbolKind::Function(_) => self.expect_value(object),
            _ => {
                self.error("member cannot be read as a value".to_string(), location);
                self.poison(node_ty)
            }
        }
    }

    fn lower_index_load(
        &mut self,
        object: BoundExprId,
        index: BoundExprId,
        indexer_property: Option<SymbolId>,
        node_ty: Option<TypeId>,
        location: SourceLocation,
    ) -> ValueId {
        let object_ty = self.tree.expr(object).ty;
        let element = object_ty.and_then(|t| self.b.types.element_of(t));
        match element {
            Some(element) => {
                let object_value = self.expect_value(object);
                let index_value = self.expect_value(index);
                let address = self.b.element_addr(object_value, index_value, element);
                self.b.load(address, element)
            }
            None if indexer_property.is_some() => {
                self.error(
                    "indexer properties are not lowered".to_string(),
                    location,
                );
                self.poison(node_ty)
            }
            None => {
                self.error("value cannot be indexed".to_string(), location);
                self.poison(node_ty)
            }
        }
    }

    fn lower_call(
        &mut self,
        callee: BoundExprId,
        args: &[BoundExprId],
        method: Option<SymbolId>,
        node_ty: Option<TypeId>,
        location: SourceLocation,
    ) -> Option<ValueId> {
        let Some(method) = method else {
            self.error("call target was not resolved".to_string(), location);
            return Some(self.poison(node_ty));
        };
        let data = self.symbols.as_function(method)?;
        let is_static = data.is_static;
        let vtable_slot = data.vtable_slot;
        let ret = data.return_type;

        // Instance calls pass the receiver first.
        let receiver = match self.tree.expr(callee).kind.clone() {
            BoundExprKind::MemberAccess { object, .. } if !is_static => {
                Some(self.expect_value(object))
            }
            _ => None,
        };

        let mut arg_values = Vec::with_capacity(args.len() + 1);
        if let Some(receiver) = receiver {
            arg_values.push(receiver);
        }
        for arg in args {
            arg_values.push(self.expect_value(*arg));
        }

        // Virtual dispatch goes through the vtable slot; everything
        // else is a direct call.
        if let (Some(slot), Some(receiver)) = (vtable_slot, receiver) {
            let param_tys: Vec<TypeId> = arg_values
                .iter()
                .map(|v| self.b.func.value(*v).ty)
                .collect();
            let ret_ty = ret.unwrap_or_else(|| self.b.types.void());
            let fn_ty = self.b.types.function(ret_ty, param_tys);
            let target = self.b.vtable_lookup(receiver, slot, fn_ty);
            return self.b.call_indirect(target, arg_values, ret);
        }

        match self.module.find_function(method) {
            Some(func_id) => self.b.call(func_id, arg_values, ret),
            None => {
                self.error("call target has no lowered function".to_string(), location);
                Some(self.poison(node_ty))
            }
        }
    }

    fn lower_new(
        &mut self,
        type_expr: BoundExprId,
        args: &[BoundExprId],
        constructor: Option<SymbolId>,
        location: SourceLocation,
    ) -> ValueId {
        let Some(object_ty) = self.tree.expr(type_expr).ty else {
            self.error("object type was not resolved".to_string(), location);
            return self.poison(None);
        };

        let allocation = self.b.alloc(object_ty);

        if let Some(constructor) = constructor {
            let mut arg_values = Vec::with_capacity(args.len() + 1);
            arg_values.push(allocation);
            for arg in args {
                arg_values.push(self.expect_value(*arg));
            }
            self.call_function(constructor, arg_values, location);
        }
        // Without a constructor the fields stay default-initialized.

        allocation
    }
}

fn binary_opcode(op: BinaryOp) -> BinOp {
    match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Rem => BinOp::Rem,
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::Ne => BinOp::Ne,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::Le => BinOp::Le,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::Ge => BinOp::Ge,
        BinaryOp::LogicalAnd => BinOp::And,
        BinaryOp::LogicalOr => BinOp::Or,
        BinaryOp::BitAnd => BinOp::BitAnd,
        BinaryOp::BitOr => BinOp::BitOr,
        BinaryOp::BitXor => BinOp::BitXor,
        BinaryOp::Shl => BinOp::Shl,
        BinaryOp::Shr => BinOp::Shr,
    }
}

/// Opcode for a compound assignment; `None` for plain `=`.
fn compound_opcode(op: AssignOp) -> Option<BinOp> {
    match op {
        AssignOp::Assign => None,
        AssignOp::Add => Some(BinOp::Add),
        AssignOp::Sub => Some(BinOp::Sub),
        AssignOp::Mul => Some(BinOp::Mul),
        AssignOp::Div => Some(BinOp::Div),
        AssignOp::Rem => Some(BinOp::Rem),
        AssignOp::And => Some(BinOp::BitAnd),
        AssignOp::Or => Some(BinOp::BitOr),
        AssignOp::Xor => Some(BinOp::BitXor),
        AssignOp::Shl => Some(BinOp::Shl),
        AssignOp::Shr => Some(BinOp::Shr),
    }
}
