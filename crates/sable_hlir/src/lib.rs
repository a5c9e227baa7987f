//! # sable-hlir
//!
//! The typed SSA intermediate representation of the Sable compiler and
//! the lowering pass that produces it.
//!
//! ## Shape of the IR
//!
//! A [`hlir::Module`] owns one [`hlir::Function`] per function symbol
//! and one [`hlir::TypeDefinition`] per type symbol. Functions own
//! their basic blocks, instructions, and SSA values in dense arenas;
//! every value has exactly one defining instruction and a use list
//! naming every instruction that reads it. A block's last instruction
//! is its terminator (`ret`, `br`, `condbr`, or `switch`), and
//! predecessor/successor lists are updated in the same step as
//! terminator emission.
//!
//! ## Lowering
//!
//! [`lower::lower`] walks the resolved bound tree function by function:
//! straight-line code maps to instructions via the
//! [`builder::FunctionBuilder`], control flow to the block shapes of
//! §if/§while/§for, and reassigned loop variables to header phis whose
//! back-edge incomings are completed as each branch to the header is
//! emitted. Virtual calls dispatch through a vtable slot lookup plus an
//! indirect call.

pub mod builder;
pub mod hlir;
pub mod lower;

pub use builder::FunctionBuilder;
pub use hlir::{
    BasicBlock, BinOp, BlockId, FuncId, Function, InstId, InstKind, Instruction, Module,
    TypeDefinition, UnOp, Value, ValueId,
};
pub use lower::lower;
