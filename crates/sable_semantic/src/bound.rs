//! The bound tree: the semantically annotated mirror of the syntax tree.
//!
//! Nodes live in dense per-category arenas owned by one [`BoundTree`]
//! and reference each other by typed ids. Expression nodes carry a
//! resolved type, a value category, and an optional compile-time
//! constant; name-shaped nodes carry resolution fields that the binder
//! fills where locally possible and the resolution pass completes.
//! The bound tree shares no ownership with the syntax tree - once built,
//! the syntax arenas can drop.

use crate::convert::ConversionKind;
use crate::symbols::SymbolId;
use crate::types::TypeId;
use sable_base::{SourceLocation, Symbol};
use sable_syntax::ast::{AssignOp, BinaryOp, LiteralKind, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundExprId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundStmtId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundDeclId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueCategory {
    #[default]
    RValue,
    LValue,
}

/// Compile-time constant attached to a bound expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Symbol),
    Null,
}

#[derive(Debug)]
pub struct BoundExpr {
    pub location: SourceLocation,
    pub ty: Option<TypeId>,
    pub value_category: ValueCategory,
    pub constant: Option<ConstantValue>,
    pub kind: BoundExprKind,
}

#[derive(Debug, Clone)]
pub enum BoundExprKind {
    /// Literal token; the decoded value sits in `constant`.
    Literal { literal_kind: LiteralKind },
    /// A (possibly dotted) name whose prefix is a namespace or type.
    Name {
        parts: Vec<Symbol>,
        symbol: Option<SymbolId>,
    },
    This {
        containing_type: Option<SymbolId>,
    },
    Binary {
        op: BinaryOp,
        left: BoundExprId,
        right: BoundExprId,
    },
    Unary {
        op: UnaryOp,
        operand: BoundExprId,
    },
    /// `++`/`--` in either position; lowering loads, adjusts by one, and
    /// stores back.
    IncDec {
        target: BoundExprId,
        increment: bool,
        prefix: bool,
    },
    Assignment {
        op: AssignOp,
        target: BoundExprId,
        value: BoundExprId,
    },
    Call {
        callee: BoundExprId,
        args: Vec<BoundExprId>,
        method: Option<SymbolId>,
    },
    MemberAccess {
        object: BoundExprId,
        member_name: Symbol,
        member: Option<SymbolId>,
    },
    Index {
        object: BoundExprId,
        index: BoundExprId,
        indexer_property: Option<SymbolId>,
    },
    New {
        type_expr: BoundExprId,
        args: Vec<BoundExprId>,
        constructor: Option<SymbolId>,
    },
    /// A type used in expression position (`new` targets, qualified
    /// statics).
    TypeExpr {
        parts: Vec<Symbol>,
        resolved: Option<TypeId>,
    },
    /// Implicit conversion inserted by the classifier.
    Conversion {
        operand: BoundExprId,
        conversion: ConversionKind,
    },
    /// Binding failed below this point; lowering emits a poison value.
    Error,
}

#[derive(Debug)]
pub struct BoundStmt {
    pub location: SourceLocation,
    pub kind: BoundStmtKind,
}

#[derive(Debug, Clone)]
pub enum BoundStmtKind {
    Block {
        statements: Vec<BoundStmtId>,
        /// The `$block` scope symbol, when the block opened one.
        scope: Option<SymbolId>,
    },
    Expr(BoundExprId),
    /// One statement's worth of local declarations (`int a, b = 2;`).
    Local { decls: Vec<BoundDeclId> },
    If {
        cond: BoundExprId,
        then_stmt: BoundStmtId,
        else_stmt: Option<BoundStmtId>,
    },
    While {
        cond: BoundExprId,
        body: BoundStmtId,
    },
    For {
        init: Option<BoundStmtId>,
        cond: Option<BoundExprId>,
        update: Vec<BoundExprId>,
        body: BoundStmtId,
        /// The `$for` scope enclosing the loop variable.
        scope: Option<SymbolId>,
    },
    Break,
    Continue,
    Return(Option<BoundExprId>),
    /// `using Ns;` - target filled by resolution.
    Using {
        path: Vec<Symbol>,
        target_namespace: Option<SymbolId>,
    },
    /// Binding failed; lowering skips it.
    Error,
}

/// Getter or setter body, lowered as a standalone function.
#[derive(Debug, Clone)]
pub struct BoundAccessor {
    pub function: Option<SymbolId>,
    pub body: Option<BoundStmtId>,
}

#[derive(Debug)]
pub struct BoundDecl {
    pub location: SourceLocation,
    pub name: Symbol,
    pub symbol: Option<SymbolId>,
    pub kind: BoundDeclKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableFlavor {
    Local,
    Field,
    Parameter,
}

#[derive(Debug, Clone)]
pub enum BoundDeclKind {
    Variable {
        type_expr: Option<BoundExprId>,
        initializer: Option<BoundExprId>,
        flavor: VariableFlavor,
    },
    Function {
        params: Vec<BoundDeclId>,
        body: Option<BoundStmtId>,
        is_constructor: bool,
    },
    Property {
        getter: Option<BoundAccessor>,
        setter: Option<BoundAccessor>,
    },
    Type {
        members: Vec<BoundDeclId>,
    },
    Namespace {
        members: Vec<BoundDeclId>,
    },
}

/// Owns every bound node of one compilation.
#[derive(Debug, Default)]
pub struct BoundTree {
    exprs: Vec<BoundExpr>,
    stmts: Vec<BoundStmt>,
    decls: Vec<BoundDecl>,
    /// Bound `using` directives, in source order.
    pub usings: Vec<BoundStmtId>,
    /// Top-level declarations, in source order.
    pub root: Vec<BoundDeclId>,
}

impl BoundTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, expr: BoundExpr) -> BoundExprId {
        let id = BoundExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: BoundStmt) -> BoundStmtId {
        let id = BoundStmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn alloc_decl(&mut self, decl: BoundDecl) -> BoundDeclId {
        let id = BoundDeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn expr(&self, id: BoundExprId) -> &BoundExpr {
        &self.exprs[id.0 as usize]
    }

    pub fn expr_mut(&mut self, id: BoundExprId) -> &mut BoundExpr {
        &mut self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: BoundStmtId) -> &BoundStmt {
        &self.stmts[id.0 as usize]
    }

    pub fn stmt_mut(&mut self, id: BoundStmtId) -> &mut BoundStmt {
        &mut self.stmts[id.0 as usize]
    }

    pub fn decl(&self, id: BoundDeclId) -> &BoundDecl {
        &self.decls[id.0 as usize]
    }

    pub fn decl_mut(&mut self, id: BoundDeclId) -> &mut BoundDecl {
        &mut self.decls[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    pub fn decl_ids(&self) -> impl Iterator<Item = BoundDeclId> {
        (0..self.decls.len() as u32).map(BoundDeclId)
    }

    pub fn expr_ids(&self) -> impl Iterator<Item = BoundExprId> {
        (0..self.exprs.len() as u32).map(BoundExprId)
    }

    /// Unwraps parenthesization artifacts: conversions are kept,
    /// but the assignment/lowering logic often needs the shape of the
    /// underlying expression.
    pub fn skip_conversions(&self, mut id: BoundExprId) -> BoundExprId {
        while let BoundExprKind::Conversion { operand, .. } = &self.expr(id).kind {
            id = *operand;
        }
        id
    }
}
