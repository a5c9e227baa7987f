//! Hash-consed canonical type values.
//!
//! The [`TypeSystem`] interns every structural type exactly once and
//! hands out [`TypeId`] handles, so type equality is id equality by
//! construction. `Unresolved` types are the one exception: each carries
//! a unique ordinal and never compares equal to anything else, which is
//! what lets a failed resolution flow through later stages without
//! accidentally unifying with a real type.
//!
//! The table is per-compilation and single-threaded; it is shared
//! between bound-tree annotation and HLIR lowering.

use crate::symbols::{SymbolId, SymbolTable};
use rustc_hash::FxHashMap;
use sable_base::Interner;
use sable_syntax::ast::PrimitiveName;
use std::fmt::Write as _;

/// Handle into the type table. Equality is hash-consed identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Char,
    Int,
    Long,
    Float,
    Double,
    Str,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Void,
        PrimitiveKind::Bool,
        PrimitiveKind::Char,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Str,
    ];

    pub fn from_name(name: PrimitiveName) -> PrimitiveKind {
        match name {
            PrimitiveName::Void => PrimitiveKind::Void,
            PrimitiveName::Bool => PrimitiveKind::Bool,
            PrimitiveName::Char => PrimitiveKind::Char,
            PrimitiveName::Int => PrimitiveKind::Int,
            PrimitiveName::Long => PrimitiveKind::Long,
            PrimitiveName::Float => PrimitiveKind::Float,
            PrimitiveName::Double => PrimitiveKind::Double,
            PrimitiveName::String => PrimitiveKind::Str,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Str => "string",
        }
    }

    /// Integer and floating kinds (char counts as integral).
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Char
                | PrimitiveKind::Int
                | PrimitiveKind::Long
                | PrimitiveKind::Float
                | PrimitiveKind::Double
        )
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Char | PrimitiveKind::Int | PrimitiveKind::Long
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }
}

/// Structural description of one canonical type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveKind),
    /// A user type, identified by its type symbol.
    Named(SymbolId),
    Pointer(TypeId),
    /// Element type plus optional static size.
    Array(TypeId, Option<u32>),
    Function { ret: TypeId, params: Vec<TypeId> },
    /// Placeholder for a failed resolution; unique per allocation.
    Unresolved(u32),
}

pub struct TypeSystem {
    table: Vec<Type>,
    intern: FxHashMap<Type, TypeId>,
    primitives: [TypeId; 8],
    next_unresolved: u32,
}

impl TypeSystem {
    pub fn new() -> Self {
        let mut ts = TypeSystem {
            table: Vec::new(),
            intern: FxHashMap::default(),
            primitives: [TypeId(0); 8],
            next_unresolved: 0,
        };
        for (i, kind) in PrimitiveKind::ALL.into_iter().enumerate() {
            ts.primitives[i] = ts.intern_type(Type::Primitive(kind));
        }
        ts
    }

    fn intern_type(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.intern.get(&ty) {
            return id;
        }
        let id = TypeId(self.table.len() as u32);
        self.table.push(ty.clone());
        self.intern.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.table[id.index()]
    }

    // === Constructors ===

    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        let idx = PrimitiveKind::ALL.iter().position(|k| *k == kind).unwrap();
        self.primitives[idx]
    }

    pub fn void(&self) -> TypeId {
        self.primitive(PrimitiveKind::Void)
    }

    pub fn bool_type(&self) -> TypeId {
        self.primitive(PrimitiveKind::Bool)
    }

    pub fn int_type(&self) -> TypeId {
        self.primitive(PrimitiveKind::Int)
    }

    pub fn string_type(&self) -> TypeId {
        self.primitive(PrimitiveKind::Str)
    }

    pub fn named(&mut self, symbol: SymbolId) -> TypeId {
        self.intern_type(Type::Named(symbol))
    }

    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        self.intern_type(Type::Pointer(pointee))
    }

    pub fn array(&mut self, element: TypeId, size: Option<u32>) -> TypeId {
        self.intern_type(Type::Array(element, size))
    }

    pub fn function(&mut self, ret: TypeId, params: Vec<TypeId>) -> TypeId {
        self.intern_type(Type::Function { ret, params })
    }

    /// A fresh placeholder that equals nothing, not even other
    /// placeholders.
    pub fn fresh_unresolved(&mut self) -> TypeId {
        let ordinal = self.next_unresolved;
        self.next_unresolved += 1;
        let id = TypeId(self.table.len() as u32);
        self.table.push(Type::Unresolved(ordinal));
        id
    }

    // === Queries ===

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Primitive(PrimitiveKind::Void))
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Primitive(PrimitiveKind::Bool))
    }

    pub fn as_primitive(&self, id: TypeId) -> Option<PrimitiveKind> {
        match self.get(id) {
            Type::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn as_named(&self, id: TypeId) -> Option<SymbolId> {
        match self.get(id) {
            Type::Named(symbol) => Some(*symbol),
            _ => None,
        }
    }

    /// Element type for arrays, pointee for pointers.
    pub fn element_of(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Array(element, _) => Some(*element),
            Type::Pointer(pointee) => Some(*pointee),
            _ => None,
        }
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.as_primitive(id).is_some_and(PrimitiveKind::is_numeric)
    }

    /// Human-readable name, used by diagnostics and the IR dump.
    pub fn display(&self, id: TypeId, symbols: &SymbolTable, interner: &Interner) -> String {
        let mut out = String::new();
        self.write_display(id, symbols, interner, &mut out);
        out
    }

    fn write_display(
        &self,
        id: TypeId,
        symbols: &SymbolTable,
        interner: &Interner,
        out: &mut String,
    ) {
        match self.get(id) {
            Type::Primitive(kind) => out.push_str(kind.keyword()),
            Type::Named(symbol) => out.push_str(&symbols.qualified_name(*symbol, interner)),
            Type::Pointer(pointee) => {
                self.write_display(*pointee, symbols, interner, out);
                out.push('*');
            }
            Type::Array(element, size) => {
                self.write_display(*element, symbols, interner, out);
                match size {
                    Some(n) => {
                        let _ = write!(out, "[{n}]");
                    }
                    None => out.push_str("[]"),
                }
            }
            Type::Function { ret, params } => {
                out.push('(');
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_display(*p, symbols, interner, out);
                }
                out.push_str(") -> ");
                self.write_display(*ret, symbols, interner, out);
            }
            Type::Unresolved(ordinal) => {
                let _ = write!(out, "<unresolved:{ordinal}>");
            }
        }
    }
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}
