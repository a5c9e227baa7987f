//! Shared helpers for the pipeline integration tests.

use sable_compile::Compilation;
use sable_hlir::{FuncId, Function, InstKind, ValueId};

/// Finds a lowered function by its qualified name (`C.add`).
pub fn function_named<'c>(result: &'c Compilation, name: &str) -> &'c Function {
    let module = result.module.as_ref().expect("module produced");
    for id in module.func_ids() {
        let func = module.function(id);
        if let Some(symbol) = func.symbol {
            if result.symbols.qualified_name(symbol, &result.interner) == name {
                return func;
            }
        }
    }
    panic!("no function named {name}");
}

pub fn func_id_named(result: &Compilation, name: &str) -> FuncId {
    let module = result.module.as_ref().expect("module produced");
    for id in module.func_ids() {
        if let Some(symbol) = module.function(id).symbol {
            if result.symbols.qualified_name(symbol, &result.interner) == name {
                return id;
            }
        }
    }
    panic!("no function named {name}");
}

/// The value operands an instruction reads.
pub fn operands(kind: &InstKind) -> Vec<ValueId> {
    match kind {
        InstKind::ConstInt { .. }
        | InstKind::ConstFloat { .. }
        | InstKind::ConstBool { .. }
        | InstKind::ConstString { .. }
        | InstKind::ConstNull
        | InstKind::Alloc { .. }
        | InstKind::Br { .. } => Vec::new(),
        InstKind::Load { address } => vec![*address],
        InstKind::Store { value, address } => vec![*value, *address],
        InstKind::FieldAddr { object, .. } => vec![*object],
        InstKind::ElementAddr { array, index } => vec![*array, *index],
        InstKind::Binary { left, right, .. } => vec![*left, *right],
        InstKind::Unary { operand, .. } => vec![*operand],
        InstKind::Cast { value, .. } => vec![*value],
        InstKind::Call { args, .. } => args.clone(),
        InstKind::VtableLookup { object, .. } => vec![*object],
        InstKind::CallIndirect { target, args } => {
            let mut all = vec![*target];
            all.extend(args.iter().copied());
            all
        }
        InstKind::Ret { value } => value.iter().copied().collect(),
        InstKind::CondBr { cond, .. } => vec![*cond],
        InstKind::Switch { value, .. } => vec![*value],
        InstKind::Phi { incoming } => incoming.iter().map(|(v, _)| *v).collect(),
    }
}
