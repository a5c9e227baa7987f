//! The HLIR data model: modules, functions, basic blocks, SSA values,
//! and instructions.
//!
//! Every function owns its values, instructions, and blocks in dense
//! arenas addressed by typed ids. A [`Value`] is defined by exactly one
//! instruction (`def`) and lists every instruction that reads it
//! (`uses`). A block's last instruction is its terminator; predecessor
//! and successor edges are maintained by the builder at the moment a
//! terminator is emitted, so the CFG is consistent after every step.
//!
//! The module is a pure data structure: iteration and the text dump are
//! the whole consumer surface.

use rustc_hash::FxHashMap;
use sable_base::{Interner, Symbol};
use sable_semantic::{SymbolId, SymbolKind, SymbolTable, TypeId, TypeSystem};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arithmetic, comparison, logical, and bitwise opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Rem => "rem",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::BitAnd => "bitand",
            BinOp::BitOr => "bitor",
            BinOp::BitXor => "bitxor",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

impl UnOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnOp::Neg => "neg",
            UnOp::Not => "not",
            UnOp::BitNot => "bitnot",
        }
    }
}

#[derive(Debug, Clone)]
pub enum InstKind {
    ConstInt { value: i64 },
    ConstFloat { value: f64 },
    ConstBool { value: bool },
    ConstString { value: Symbol },
    ConstNull,

    Alloc { ty: TypeId },
    Load { address: ValueId },
    Store { value: ValueId, address: ValueId },
    FieldAddr { object: ValueId, field_index: u32 },
    ElementAddr { array: ValueId, index: ValueId },

    Binary { op: BinOp, left: ValueId, right: ValueId },
    Unary { op: UnOp, operand: ValueId },
    Cast { value: ValueId, target: TypeId },

    Call { callee: FuncId, args: Vec<ValueId> },
    /// Loads the function pointer at a statically known vtable slot of
    /// the object.
    VtableLookup { object: ValueId, slot: u32 },
    CallIndirect { target: ValueId, args: Vec<ValueId> },

    Ret { value: Option<ValueId> },
    Br { target: BlockId },
    CondBr {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Switch {
        value: ValueId,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },
    Phi { incoming: Vec<(ValueId, BlockId)> },
}

impl InstKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Ret { .. }
                | InstKind::Br { .. }
                | InstKind::CondBr { .. }
                | InstKind::Switch { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub kind: InstKind,
    pub result: Option<ValueId>,
}

/// An SSA value: one definition, a complete use list.
#[derive(Debug)]
pub struct Value {
    pub ty: TypeId,
    /// Defining instruction; `None` only for function parameters.
    pub def: Option<InstId>,
    pub uses: Vec<InstId>,
    /// Debug name (parameter or local it was bound to).
    pub name: Option<Symbol>,
}

#[derive(Debug, Default)]
pub struct BasicBlock {
    pub name: String,
    pub insts: Vec<InstId>,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
}

#[derive(Debug, Default)]
pub struct Function {
    pub symbol: Option<SymbolId>,
    pub params: Vec<ValueId>,
    pub entry: Option<BlockId>,
    pub is_external: bool,
    values: Vec<Value>,
    insts: Vec<Instruction>,
    blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn create_value(&mut self, ty: TypeId, name: Option<Symbol>) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value {
            ty,
            def: None,
            uses: Vec::new(),
            name,
        });
        id
    }

    pub fn create_block(&mut self, name: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock {
            name: name.to_string(),
            ..BasicBlock::default()
        });
        id
    }

    pub fn add_inst(&mut self, inst: Instruction) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(inst);
        id
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.index()]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Instruction {
        &mut self.insts[id.index()]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn value_ids(&self) -> impl Iterator<Item = ValueId> {
        (0..self.values.len() as u32).map(ValueId)
    }

    pub fn inst_ids(&self) -> impl Iterator<Item = InstId> {
        (0..self.insts.len() as u32).map(InstId)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The block's terminator, when its last instruction is one.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.block(block).insts.last()?;
        if self.inst(last).kind.is_terminator() {
            Some(last)
        } else {
            None
        }
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.terminator(block).is_some()
    }
}

/// A lowered user type: base link plus vtable layout.
#[derive(Debug)]
pub struct TypeDefinition {
    pub symbol: SymbolId,
    pub base: Option<SymbolId>,
    /// Function ids in the owning type's virtual-method order.
    pub vtable: Vec<FuncId>,
}

/// The lowered program: one function per function symbol, one type
/// definition per type symbol.
#[derive(Debug, Default)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub types: Vec<TypeDefinition>,
    function_map: FxHashMap<SymbolId, FuncId>,
}

impl Module {
    /// Pre-creates a function and a type definition for every function
    /// and type symbol reachable from the global namespace, so call
    /// sites always find their target. Vtables are filled once all
    /// functions exist.
    pub fn new(name: &str, symbols: &SymbolTable) -> Module {
        let mut module = Module {
            name: name.to_string(),
            functions: Vec::new(),
            types: Vec::new(),
            function_map: FxHashMap::default(),
        };
        module.collect_scope(symbols, symbols.root());

        // Vtables reference functions, so resolve them second.
        for def in &mut module.types {
            if let Some(data) = symbols.as_type(def.symbol) {
                def.vtable = data
                    .virtual_methods
                    .iter()
                    .filter_map(|m| module.function_map.get(m).copied())
                    .collect();
            }
        }
        module
    }

    fn collect_scope(&mut self, symbols: &SymbolTable, scope: SymbolId) {
        for member in symbols.get(scope).members.clone() {
            match &symbols.get(member).kind {
                SymbolKind::Namespace => self.collect_scope(symbols, member),
                SymbolKind::Type(data) => {
                    self.types.push(TypeDefinition {
                        symbol: member,
                        base: data.base,
                        vtable: Vec::new(),
                    });
                    self.collect_scope(symbols, member);
                }
                SymbolKind::Function(data) => {
                    let id = FuncId(self.functions.len() as u32);
                    self.functions.push(Function {
                        symbol: Some(member),
                        is_external: data.is_external,
                        ..Function::default()
                    });
                    self.function_map.insert(member, id);
                }
                // A property's accessors are its function children.
                SymbolKind::Property(_) => self.collect_scope(symbols, member),
                _ => {}
            }
        }
    }

    pub fn find_function(&self, symbol: SymbolId) -> Option<FuncId> {
        self.function_map.get(&symbol).copied()
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.functions.len() as u32).map(FuncId)
    }

    // === Text dump ===

    /// Human-readable text form of the whole module.
    pub fn dump(&self, symbols: &SymbolTable, types: &TypeSystem, interner: &Interner) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "module {}", self.name);
        let _ = writeln!(out, "===============================================");
        out.push('\n');

        for def in &self.types {
            self.dump_type(def, symbols, types, interner, &mut out);
            out.push('\n');
        }
        for func in &self.functions {
            self.dump_function(func, symbols, types, interner, &mut out);
            out.push('\n');
        }
        out
    }

    fn dump_type(
        &self,
        def: &TypeDefinition,
        symbols: &SymbolTable,
        types: &TypeSystem,
        interner: &Interner,
        out: &mut String,
    ) {
        let _ = write!(out, "type @{}", symbols.qualified_name(def.symbol, interner));
        if let Some(base) = def.base {
            let _ = write!(out, " extends @{}", symbols.qualified_name(base, interner));
        }
        out.push_str(" {\n");

        if !def.vtable.is_empty() {
            out.push_str("  vtable:\n");
            for (slot, func) in def.vtable.iter().enumerate() {
                let name = self
                    .function(*func)
                    .symbol
                    .map(|s| symbols.qualified_name(s, interner))
                    .unwrap_or_else(|| "<unknown>".to_string());
                let _ = writeln!(out, "    [{slot}] @{name}");
            }
        }

        if let Some(data) = symbols.as_type(def.symbol) {
            for field in &data.fields {
                let field_name = interner.resolve(symbols.get(*field).name);
                let ty_text = symbols
                    .value_type(*field)
                    .map(|t| types.display(t, symbols, interner))
                    .unwrap_or_else(|| "?".to_string());
                let _ = writeln!(out, "  {field_name}: {ty_text};");
            }
        }
        out.push_str("}\n");
    }

    fn dump_function(
        &self,
        func: &Function,
        symbols: &SymbolTable,
        types: &TypeSystem,
        interner: &Interner,
        out: &mut String,
    ) {
        let name = func
            .symbol
            .map(|s| symbols.qualified_name(s, interner))
            .unwrap_or_else(|| "<unknown>".to_string());
        let _ = write!(out, "function @{name}(");
        for (i, param) in func.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "%{}", param.index());
            if let Some(n) = func.value(*param).name {
                let _ = write!(out, " <{}>", interner.resolve(n));
            }
            let _ = write!(
                out,
                ": {}",
                types.display(func.value(*param).ty, symbols, interner)
            );
        }
        let ret = func
            .symbol
            .and_then(|s| symbols.as_function(s))
            .and_then(|d| d.return_type)
            .map(|t| types.display(t, symbols, interner))
            .unwrap_or_else(|| "void".to_string());
        let _ = write!(out, ") -> {ret}");

        if func.is_external {
            out.push_str(" [external]\n");
            return;
        }
        out.push_str(" {\n");
        for block_id in func.block_ids() {
            self.dump_block(func, block_id, symbols, interner, out);
        }
        out.push_str("}\n");
    }

    fn dump_block(
        &self,
        func: &Function,
        id: BlockId,
        symbols: &SymbolTable,
        interner: &Interner,
        out: &mut String,
    ) {
        let block = func.block(id);
        let _ = write!(out, "  bb{}", id.index());
        if !block.name.is_empty() {
            let _ = write!(out, " <{}>", block.name);
        }
        if !block.predecessors.is_empty() {
            out.push_str("  ; preds: ");
            for (i, pred) in block.predecessors.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "bb{}", pred.index());
            }
        }
        out.push_str(":\n");
        for inst in &block.insts {
            out.push_str("    ");
            self.dump_inst(func, *inst, symbols, interner, out);
            out.push('\n');
        }
    }

    fn dump_inst(
        &self,
        func: &Function,
        id: InstId,
        symbols: &SymbolTable,
        interner: &Interner,
        out: &mut String,
    ) {
        let inst = func.inst(id);
        if let Some(result) = inst.result {
            let _ = write!(out, "%{}", result.index());
            if let Some(name) = func.value(result).name {
                let _ = write!(out, " <{}>", interner.resolve(name));
            }
            out.push_str(" = ");
        }
        let value_ref = |v: ValueId| format!("%{}", v.index());
        match &inst.kind {
            InstKind::ConstInt { value } => {
                let _ = write!(out, "const.int {value}");
            }
            InstKind::ConstFloat { value } => {
                let _ = write!(out, "const.float {value}");
            }
            InstKind::ConstBool { value } => {
                let _ = write!(out, "const.bool {value}");
            }
            InstKind::ConstString { value } => {
                let _ = write!(out, "const.string \"{}\"", interner.resolve(*value));
            }
            InstKind::ConstNull => out.push_str("const.null"),
            InstKind::Alloc { .. } => {
                let _ = write!(out, "alloc");
            }
            InstKind::Load { address } => {
                let _ = write!(out, "load {}", value_ref(*address));
            }
            InstKind::Store { value, address } => {
                let _ = write!(out, "store {}, {}", value_ref(*value), value_ref(*address));
            }
            InstKind::FieldAddr {
                object,
                field_index,
            } => {
                let _ = write!(out, "fieldaddr {}, {field_index}", value_ref(*object));
            }
            InstKind::ElementAddr { array, index } => {
                let _ = write!(out, "elementaddr {}, {}", value_ref(*array), value_ref(*index));
            }
            InstKind::Binary { op, left, right } => {
                let _ = write!(
                    out,
                    "{} {}, {}",
                    op.mnemonic(),
                    value_ref(*left),
                    value_ref(*right)
                );
            }
            InstKind::Unary { op, operand } => {
                let _ = write!(out, "{} {}", op.mnemonic(), value_ref(*operand));
            }
            InstKind::Cast { value, .. } => {
                let _ = write!(out, "cast {}", value_ref(*value));
            }
            InstKind::Call { callee, args } => {
                let name = self
                    .function(*callee)
                    .symbol
                    .map(|s| symbols.qualified_name(s, interner))
                    .unwrap_or_else(|| format!("f{}", callee.index()));
                let _ = write!(out, "call @{name}(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&value_ref(*arg));
                }
                out.push(')');
            }
            InstKind::VtableLookup { object, slot } => {
                let _ = write!(out, "vtable_lookup {}, {slot}", value_ref(*object));
            }
            InstKind::CallIndirect { target, args } => {
                let _ = write!(out, "call_indirect {}(", value_ref(*target));
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&value_ref(*arg));
                }
                out.push(')');
            }
            InstKind::Ret { value } => {
                out.push_str("ret");
                if let Some(value) = value {
                    let _ = write!(out, " {}", value_ref(*value));
                }
            }
            InstKind::Br { target } => {
                let _ = write!(out, "br bb{}", target.index());
            }
            InstKind::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                let _ = write!(
                    out,
                    "condbr {}, bb{}, bb{}",
                    value_ref(*cond),
                    then_block.index(),
                    else_block.index()
                );
            }
            InstKind::Switch {
                value,
                cases,
                default,
            } => {
                let _ = write!(out, "switch {}", value_ref(*value));
                for (case, block) in cases {
                    let _ = write!(out, ", [{case}, bb{}]", block.index());
                }
                let _ = write!(out, ", default bb{}", default.index());
            }
            InstKind::Phi { incoming } => {
                out.push_str("phi ");
                for (i, (value, block)) in incoming.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "[{}, bb{}]", value_ref(*value), block.index());
                }
            }
        }
    }
}
