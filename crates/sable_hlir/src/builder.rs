//! Instruction builder for one function under construction.
//!
//! The builder tracks the current block and centralizes the bookkeeping
//! every emission needs: creating the result value, back-linking its
//! defining instruction, appending operand uses, and - for terminators -
//! updating predecessor/successor edges in the same step, so the CFG is
//! consistent after every emitted instruction.

use crate::hlir::{BinOp, BlockId, FuncId, Function, InstId, InstKind, Instruction, UnOp, ValueId};
use sable_base::Symbol;
use sable_semantic::{TypeId, TypeSystem};

pub struct FunctionBuilder<'a> {
    pub func: &'a mut Function,
    pub types: &'a mut TypeSystem,
    current: BlockId,
}

impl<'a> FunctionBuilder<'a> {
    /// Positions the builder at `block`, usually the fresh entry block.
    pub fn new(func: &'a mut Function, types: &'a mut TypeSystem, block: BlockId) -> Self {
        FunctionBuilder {
            func,
            types,
            current: block,
        }
    }

    pub fn set_block(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn create_block(&mut self, name: &str) -> BlockId {
        self.func.create_block(name)
    }

    pub fn is_terminated(&self) -> bool {
        self.func.is_terminated(self.current)
    }

    /// Core emission: allocate the result value (when `result_ty` is
    /// given), record the definition, append operand uses, and push the
    /// instruction onto the current block.
    fn emit(
        &mut self,
        kind: InstKind,
        result_ty: Option<TypeId>,
        operands: &[ValueId],
    ) -> Option<ValueId> {
        let result = result_ty.map(|ty| self.func.create_value(ty, None));
        let inst = self.func.add_inst(Instruction { kind, result });
        if let Some(result) = result {
            self.func.value_mut(result).def = Some(inst);
        }
        for operand in operands {
            self.func.value_mut(*operand).uses.push(inst);
        }
        self.func.block_mut(self.current).insts.push(inst);
        result
    }

    // === Constants ===

    pub fn const_int(&mut self, value: i64, ty: TypeId) -> ValueId {
        self.emit(InstKind::ConstInt { value }, Some(ty), &[])
            .expect("const has a result")
    }

    pub fn const_float(&mut self, value: f64, ty: TypeId) -> ValueId {
        self.emit(InstKind::ConstFloat { value }, Some(ty), &[])
            .expect("const has a result")
    }

    pub fn const_bool(&mut self, value: bool, ty: TypeId) -> ValueId {
        self.emit(InstKind::ConstBool { value }, Some(ty), &[])
            .expect("const has a result")
    }

    pub fn const_string(&mut self, value: Symbol, ty: TypeId) -> ValueId {
        self.emit(InstKind::ConstString { value }, Some(ty), &[])
            .expect("const has a result")
    }

    pub fn const_null(&mut self, ty: TypeId) -> ValueId {
        self.emit(InstKind::ConstNull, Some(ty), &[])
            .expect("const has a result")
    }

    /// Typed zero for the given type; the poison value lowering emits
    /// after an error so the CFG stays well-formed.
    pub fn zero_value(&mut self, ty: TypeId) -> ValueId {
        use sable_semantic::PrimitiveKind;
        match self.types.as_primitive(ty) {
            Some(PrimitiveKind::Bool) => self.const_bool(false, ty),
            Some(PrimitiveKind::Float) | Some(PrimitiveKind::Double) => self.const_float(0.0, ty),
            Some(PrimitiveKind::Char)
            | Some(PrimitiveKind::Int)
            | Some(PrimitiveKind::Long) => self.const_int(0, ty),
            _ => self.const_null(ty),
        }
    }

    // === Memory ===

    /// Allocates an object of `ty`; the result is a pointer to it.
    pub fn alloc(&mut self, ty: TypeId) -> ValueId {
        let ptr = self.types.pointer(ty);
        self.emit(InstKind::Alloc { ty }, Some(ptr), &[])
            .expect("alloc has a result")
    }

    pub fn load(&mut self, address: ValueId, ty: TypeId) -> ValueId {
        self.emit(InstKind::Load { address }, Some(ty), &[address])
            .expect("load has a result")
    }

    pub fn store(&mut self, value: ValueId, address: ValueId) {
        self.emit(InstKind::Store { value, address }, None, &[value, address]);
    }

    /// Address of a field; result is a pointer to the field type.
    pub fn field_addr(&mut self, object: ValueId, field_index: u32, field_ty: TypeId) -> ValueId {
        let ptr = self.types.pointer(field_ty);
        self.emit(
            InstKind::FieldAddr {
                object,
                field_index,
            },
            Some(ptr),
            &[object],
        )
        .expect("fieldaddr has a result")
    }

    pub fn element_addr(&mut self, array: ValueId, index: ValueId, element_ty: TypeId) -> ValueId {
        let ptr = self.types.pointer(element_ty);
        self.emit(
            InstKind::ElementAddr { array, index },
            Some(ptr),
            &[array, index],
        )
        .expect("elementaddr has a result")
    }

    // === Arithmetic ===

    /// Comparisons produce bool; everything else keeps the left
    /// operand's type.
    pub fn binary(&mut self, op: BinOp, left: ValueId, right: ValueId) -> ValueId {
        let result_ty = if op.is_comparison() {
            self.types.bool_type()
        } else {
            self.func.value(left).ty
        };
        self.emit(InstKind::Binary { op, left, right }, Some(result_ty), &[left, right])
            .expect("binary has a result")
    }

    pub fn unary(&mut self, op: UnOp, operand: ValueId) -> ValueId {
        let result_ty = self.func.value(operand).ty;
        self.emit(InstKind::Unary { op, operand }, Some(result_ty), &[operand])
            .expect("unary has a result")
    }

    pub fn cast(&mut self, value: ValueId, target: TypeId) -> ValueId {
        self.emit(InstKind::Cast { value, target }, Some(target), &[value])
            .expect("cast has a result")
    }

    // === Calls ===

    /// `return_type` of `None` (or void) produces no result value.
    pub fn call(
        &mut self,
        callee: FuncId,
        args: Vec<ValueId>,
        return_type: Option<TypeId>,
    ) -> Option<ValueId> {
        let result_ty = return_type.filter(|t| !self.types.is_void(*t));
        let operands = args.clone();
        self.emit(InstKind::Call { callee, args }, result_ty, &operands)
    }

    pub fn vtable_lookup(&mut self, object: ValueId, slot: u32, fn_ty: TypeId) -> ValueId {
        self.emit(InstKind::VtableLookup { object, slot }, Some(fn_ty), &[object])
            .expect("vtable_lookup has a result")
    }

    pub fn call_indirect(
        &mut self,
        target: ValueId,
        args: Vec<ValueId>,
        return_type: Option<TypeId>,
    ) -> Option<ValueId> {
        let result_ty = return_type.filter(|t| !self.types.is_void(*t));
        let mut operands = vec![target];
        operands.extend(args.iter().copied());
        self.emit(InstKind::CallIndirect { target, args }, result_ty, &operands)
    }

    // === Terminators ===

    pub fn ret(&mut self, value: Option<ValueId>) {
        let operands: Vec<ValueId> = value.into_iter().collect();
        self.emit(InstKind::Ret { value }, None, &operands);
    }

    pub fn br(&mut self, target: BlockId) {
        self.emit(InstKind::Br { target }, None, &[]);
        let from = self.current;
        self.func.block_mut(from).successors.push(target);
        self.func.block_mut(target).predecessors.push(from);
    }

    pub fn cond_br(&mut self, cond: ValueId, then_block: BlockId, else_block: BlockId) {
        self.emit(
            InstKind::CondBr {
                cond,
                then_block,
                else_block,
            },
            None,
            &[cond],
        );
        let from = self.current;
        self.func.block_mut(from).successors.push(then_block);
        self.func.block_mut(from).successors.push(else_block);
        self.func.block_mut(then_block).predecessors.push(from);
        self.func.block_mut(else_block).predecessors.push(from);
    }

    // === Phis ===

    /// Inserts an empty phi at the top of `block` (phis must precede all
    /// other instructions).
    pub fn phi(&mut self, block: BlockId, ty: TypeId) -> (ValueId, InstId) {
        let result = self.func.create_value(ty, None);
        let inst = self.func.add_inst(Instruction {
            kind: InstKind::Phi {
                incoming: Vec::new(),
            },
            result: Some(result),
        });
        self.func.value_mut(result).def = Some(inst);
        let position = {
            let block_ref = self.func.block(block);
            block_ref
                .insts
                .iter()
                .position(|i| !matches!(self.func.inst(*i).kind, InstKind::Phi { .. }))
                .unwrap_or(block_ref.insts.len())
        };
        self.func.block_mut(block).insts.insert(position, inst);
        (result, inst)
    }

    /// Adds one incoming edge to a phi and records the use.
    pub fn phi_add_incoming(&mut self, phi: InstId, value: ValueId, pred: BlockId) {
        if let InstKind::Phi { incoming } = &mut self.func.inst_mut(phi).kind {
            incoming.push((value, pred));
        }
        self.func.value_mut(value).uses.push(phi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Function, TypeSystem) {
        (Function::default(), TypeSystem::new())
    }

    #[test]
    fn constants_define_their_results() {
        let (mut func, mut types) = setup();
        let entry = func.create_block("entry");
        let int = types.int_type();
        let mut b = FunctionBuilder::new(&mut func, &mut types, entry);
        let v = b.const_int(7, int);
        let def = func.value(v).def.expect("defined");
        assert!(matches!(
            func.inst(def).kind,
            InstKind::ConstInt { value: 7 }
        ));
    }

    #[test]
    fn binary_records_uses_on_both_operands() {
        let (mut func, mut types) = setup();
        let entry = func.create_block("entry");
        let int = types.int_type();
        let mut b = FunctionBuilder::new(&mut func, &mut types, entry);
        let l = b.const_int(1, int);
        let r = b.const_int(2, int);
        let sum = b.binary(BinOp::Add, l, r);
        let def = func.value(sum).def.unwrap();
        assert_eq!(func.value(l).uses, vec![def]);
        assert_eq!(func.value(r).uses, vec![def]);
    }

    #[test]
    fn comparisons_produce_bool() {
        let (mut func, mut types) = setup();
        let entry = func.create_block("entry");
        let int = types.int_type();
        let bool_ty = types.bool_type();
        let mut b = FunctionBuilder::new(&mut func, &mut types, entry);
        let l = b.const_int(1, int);
        let r = b.const_int(2, int);
        let lt = b.binary(BinOp::Lt, l, r);
        assert_eq!(func.value(lt).ty, bool_ty);
    }

    #[test]
    fn branch_updates_cfg_edges_with_emission() {
        let (mut func, mut types) = setup();
        let entry = func.create_block("entry");
        let target = func.create_block("exit");
        let mut b = FunctionBuilder::new(&mut func, &mut types, entry);
        b.br(target);
        assert_eq!(func.block(entry).successors, vec![target]);
        assert_eq!(func.block(target).predecessors, vec![entry]);
        assert!(func.is_terminated(entry));
    }

    #[test]
    fn cond_br_has_two_successors() {
        let (mut func, mut types) = setup();
        let entry = func.create_block("entry");
        let then_block = func.create_block("then");
        let else_block = func.create_block("else");
        let bool_ty = types.bool_type();
        let mut b = FunctionBuilder::new(&mut func, &mut types, entry);
        let cond = b.const_bool(true, bool_ty);
        b.cond_br(cond, then_block, else_block);
        assert_eq!(func.block(entry).successors, vec![then_block, else_block]);
        assert_eq!(func.block(then_block).predecessors, vec![entry]);
        assert_eq!(func.block(else_block).predecessors, vec![entry]);
    }

    #[test]
    fn alloc_produces_a_pointer() {
        let (mut func, mut types) = setup();
        let entry = func.create_block("entry");
        let int = types.int_type();
        let mut b = FunctionBuilder::new(&mut func, &mut types, entry);
        let p = b.alloc(int);
        let expected = types.pointer(int);
        assert_eq!(func.value(p).ty, expected);
    }

    #[test]
    fn phis_insert_before_other_instructions() {
        let (mut func, mut types) = setup();
        let entry = func.create_block("entry");
        let header = func.create_block("header");
        let int = types.int_type();
        let mut b = FunctionBuilder::new(&mut func, &mut types, entry);
        let init = b.const_int(0, int);
        b.br(header);
        b.set_block(header);
        let probe = b.const_int(9, int);
        let (phi_value, phi_inst) = b.phi(header, int);
        b.phi_add_incoming(phi_inst, init, entry);
        let _ = probe;

        let first = func.block(header).insts[0];
        assert!(matches!(func.inst(first).kind, InstKind::Phi { .. }));
        assert_eq!(func.value(phi_value).def, Some(phi_inst));
        assert_eq!(func.value(init).uses.len(), 1);
    }

    #[test]
    fn void_indirect_call_has_no_result() {
        let (mut func, mut types) = setup();
        let entry = func.create_block("entry");
        let void = types.void();
        let int = types.int_type();
        let mut b = FunctionBuilder::new(&mut func, &mut types, entry);
        let target = b.const_null(int);
        let none = b.call_indirect(target, vec![], Some(void));
        assert!(none.is_none());
        let some = b.call_indirect(target, vec![], Some(int));
        assert!(some.is_some());
    }
}
