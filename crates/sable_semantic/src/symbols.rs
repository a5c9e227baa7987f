//! The symbol tree: one [`SymbolData`] per declared name, owned by a
//! [`SymbolTable`] and addressed by [`SymbolId`] handles.
//!
//! The tree has exactly one root, the global namespace. Every symbol
//! knows its parent (the scope it was inserted into), its ordered member
//! list, and a name-keyed lookup index. Within a scope names are unique
//! except for function overload sets, which share a simple name and are
//! disambiguated later by argument types.
//!
//! Scope-bearing symbols are namespaces, types, functions, properties,
//! and the anonymous `$block`/`$for` scopes synthesized for blocks and
//! for-loop headers (suffixed with an ordinal so qualified names stay
//! unique).

use crate::types::TypeId;
use rustc_hash::FxHashMap;
use sable_base::{Interner, SourceLocation, Symbol};
use sable_syntax::ast::{Modifiers, NodeId};

/// Handle into the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of a type symbol.
#[derive(Debug, Default)]
pub struct TypeData {
    /// Canonical `Named` type for this symbol.
    pub ty: Option<TypeId>,
    /// Resolved base type symbol, if the declaration names one.
    pub base: Option<SymbolId>,
    pub is_struct: bool,
    /// Field symbols in declaration order; a field's `index` is its
    /// position here.
    pub fields: Vec<SymbolId>,
    /// Vtable layout: inherited slots first, own virtuals appended,
    /// overrides replacing the slot they match.
    pub virtual_methods: Vec<SymbolId>,
}

#[derive(Debug, Default)]
pub struct FunctionData {
    pub params: Vec<SymbolId>,
    pub return_type: Option<TypeId>,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_constructor: bool,
    pub is_destructor: bool,
    pub is_external: bool,
    /// Slot in the owning type's vtable, for virtual methods and
    /// overrides.
    pub vtable_slot: Option<u32>,
}

#[derive(Debug, Default)]
pub struct FieldData {
    pub ty: Option<TypeId>,
    /// Position in the owning type's field order.
    pub index: u32,
}

#[derive(Debug, Default)]
pub struct PropertyData {
    pub ty: Option<TypeId>,
    /// Backing field synthesized for auto-accessors.
    pub backing_field: Option<SymbolId>,
}

#[derive(Debug, Default)]
pub struct VarData {
    pub ty: Option<TypeId>,
}

#[derive(Debug)]
pub enum SymbolKind {
    Namespace,
    Type(TypeData),
    Field(FieldData),
    Property(PropertyData),
    Function(FunctionData),
    Parameter(VarData),
    Variable(VarData),
    Block,
}

impl SymbolKind {
    pub fn describe(&self) -> &'static str {
        match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Type(_) => "type",
            SymbolKind::Field(_) => "field",
            SymbolKind::Property(_) => "property",
            SymbolKind::Function(_) => "function",
            SymbolKind::Parameter(_) => "parameter",
            SymbolKind::Variable(_) => "variable",
            SymbolKind::Block => "block",
        }
    }
}

#[derive(Debug)]
pub struct SymbolData {
    pub name: Symbol,
    pub parent: Option<SymbolId>,
    pub kind: SymbolKind,
    pub modifiers: Modifiers,
    pub location: SourceLocation,
    /// Members in declaration order.
    pub members: Vec<SymbolId>,
    /// Name-keyed lookup index; a multi-map to hold overload sets.
    index: FxHashMap<Symbol, Vec<SymbolId>>,
}

pub struct SymbolTable {
    symbols: Vec<SymbolData>,
    root: SymbolId,
    /// Scope-bearing syntax node -> its scope symbol.
    pub node_scopes: FxHashMap<NodeId, SymbolId>,
    /// Name-introducing syntax node -> its symbol.
    pub node_symbols: FxHashMap<NodeId, SymbolId>,
}

impl SymbolTable {
    /// Creates a table containing only the global namespace.
    pub fn new(interner: &mut Interner) -> Self {
        let root_name = interner.intern("$global");
        let root_data = SymbolData {
            name: root_name,
            parent: None,
            kind: SymbolKind::Namespace,
            modifiers: Modifiers::NONE,
            location: SourceLocation::default(),
            members: Vec::new(),
            index: FxHashMap::default(),
        };
        SymbolTable {
            symbols: vec![root_data],
            root: SymbolId(0),
            node_scopes: FxHashMap::default(),
            node_symbols: FxHashMap::default(),
        }
    }

    pub fn root(&self) -> SymbolId {
        self.root
    }

    pub fn get(&self, id: SymbolId) -> &SymbolData {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolData {
        &mut self.symbols[id.index()]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = SymbolId> {
        (0..self.symbols.len() as u32).map(SymbolId)
    }

    /// Creates a symbol and inserts it into `parent`'s member list and
    /// lookup index.
    pub fn declare(
        &mut self,
        parent: SymbolId,
        name: Symbol,
        kind: SymbolKind,
        modifiers: Modifiers,
        location: SourceLocation,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolData {
            name,
            parent: Some(parent),
            kind,
            modifiers,
            location,
            members: Vec::new(),
            index: FxHashMap::default(),
        });
        let parent_data = &mut self.symbols[parent.index()];
        parent_data.members.push(id);
        parent_data.index.entry(name).or_default().push(id);
        id
    }

    // === Lookup ===

    /// All symbols with `name` directly inside `scope`.
    pub fn members_named(&self, scope: SymbolId, name: Symbol) -> &[SymbolId] {
        self.get(scope)
            .index
            .get(&name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First symbol with `name` in `scope`, walking parents outward.
    pub fn lookup(&self, scope: SymbolId, name: Symbol) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(found) = self.members_named(id, name).first() {
                return Some(*found);
            }
            current = self.get(id).parent;
        }
        None
    }

    /// Resolves a dotted path: the first part by outward scope walk,
    /// the rest as direct members.
    pub fn resolve_path(&self, scope: SymbolId, parts: &[Symbol]) -> Option<SymbolId> {
        let (first, rest) = parts.split_first()?;
        let mut current = self.lookup(scope, *first)?;
        for part in rest {
            current = *self.members_named(current, *part).first()?;
        }
        Some(current)
    }

    /// All function symbols named `name`, collected from `scope`
    /// outward. The nearest scope with at least one function of that
    /// name wins; outer overloads are shadowed.
    pub fn functions_named(&self, scope: SymbolId, name: Symbol) -> Vec<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let functions: Vec<SymbolId> = self
                .members_named(id, name)
                .iter()
                .copied()
                .filter(|s| matches!(self.get(*s).kind, SymbolKind::Function(_)))
                .collect();
            if !functions.is_empty() {
                return functions;
            }
            current = self.get(id).parent;
        }
        Vec::new()
    }

    /// Nearest enclosing type symbol, starting at `scope` itself.
    pub fn enclosing_type(&self, scope: SymbolId) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if matches!(self.get(id).kind, SymbolKind::Type(_)) {
                return Some(id);
            }
            current = self.get(id).parent;
        }
        None
    }

    /// Nearest enclosing function symbol, starting at `scope` itself.
    pub fn enclosing_function(&self, scope: SymbolId) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if matches!(self.get(id).kind, SymbolKind::Function(_)) {
                return Some(id);
            }
            current = self.get(id).parent;
        }
        None
    }

    /// `true` if `derived` has `base` somewhere on its base chain
    /// (strict: a type does not derive from itself).
    pub fn derives_from(&self, derived: SymbolId, base: SymbolId) -> bool {
        let mut current = match &self.get(derived).kind {
            SymbolKind::Type(data) => data.base,
            _ => None,
        };
        while let Some(id) = current {
            if id == base {
                return true;
            }
            current = match &self.get(id).kind {
                SymbolKind::Type(data) => data.base,
                _ => None,
            };
        }
        false
    }

    /// Dotted path from the root (the root itself is omitted).
    pub fn qualified_name(&self, id: SymbolId, interner: &Interner) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(sym) = current {
            if sym == self.root {
                break;
            }
            parts.push(self.get(sym).name);
            current = self.get(sym).parent;
        }
        parts.reverse();
        let names: Vec<&str> = parts.iter().map(|s| interner.resolve(*s)).collect();
        names.join(".")
    }

    // === Typed accessors ===

    pub fn as_function(&self, id: SymbolId) -> Option<&FunctionData> {
        match &self.get(id).kind {
            SymbolKind::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self, id: SymbolId) -> Option<&mut FunctionData> {
        match &mut self.get_mut(id).kind {
            SymbolKind::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_type(&self, id: SymbolId) -> Option<&TypeData> {
        match &self.get(id).kind {
            SymbolKind::Type(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_type_mut(&mut self, id: SymbolId) -> Option<&mut TypeData> {
        match &mut self.get_mut(id).kind {
            SymbolKind::Type(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_field(&self, id: SymbolId) -> Option<&FieldData> {
        match &self.get(id).kind {
            SymbolKind::Field(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_property(&self, id: SymbolId) -> Option<&PropertyData> {
        match &self.get(id).kind {
            SymbolKind::Property(data) => Some(data),
            _ => None,
        }
    }

    /// Declared value type of a field, property, parameter, or variable.
    pub fn value_type(&self, id: SymbolId) -> Option<TypeId> {
        match &self.get(id).kind {
            SymbolKind::Field(data) => data.ty,
            SymbolKind::Property(data) => data.ty,
            SymbolKind::Parameter(data) | SymbolKind::Variable(data) => data.ty,
            _ => None,
        }
    }

    /// Sets the declared value type on a field, property, parameter, or
    /// variable symbol.
    pub fn set_value_type(&mut self, id: SymbolId, ty: TypeId) {
        match &mut self.get_mut(id).kind {
            SymbolKind::Field(data) => data.ty = Some(ty),
            SymbolKind::Property(data) => data.ty = Some(ty),
            SymbolKind::Parameter(data) | SymbolKind::Variable(data) => data.ty = Some(ty),
            _ => {}
        }
    }

    /// `true` for symbols that introduce a lookup scope.
    pub fn is_scope(&self, id: SymbolId) -> bool {
        matches!(
            self.get(id).kind,
            SymbolKind::Namespace
                | SymbolKind::Type(_)
                | SymbolKind::Function(_)
                | SymbolKind::Property(_)
                | SymbolKind::Block
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_base::Interner;

    fn table() -> (SymbolTable, Interner) {
        let mut interner = Interner::new();
        let table = SymbolTable::new(&mut interner);
        (table, interner)
    }

    #[test]
    fn root_is_the_only_initial_symbol() {
        let (table, _) = table();
        assert_eq!(table.len(), 1);
        assert!(table.get(table.root()).parent.is_none());
    }

    #[test]
    fn declare_links_parent_and_member_order() {
        let (mut table, mut interner) = table();
        let a = interner.intern("A");
        let b = interner.intern("B");
        let root = table.root();
        let ty = table.declare(
            root,
            a,
            SymbolKind::Type(TypeData::default()),
            Modifiers::NONE,
            SourceLocation::default(),
        );
        let ns = table.declare(
            root,
            b,
            SymbolKind::Namespace,
            Modifiers::NONE,
            SourceLocation::default(),
        );
        assert_eq!(table.get(ty).parent, Some(root));
        assert_eq!(table.get(root).members, vec![ty, ns]);
    }

    #[test]
    fn lookup_walks_outward() {
        let (mut table, mut interner) = table();
        let outer = interner.intern("outer");
        let inner_name = interner.intern("Inner");
        let root = table.root();
        let var = table.declare(
            root,
            outer,
            SymbolKind::Variable(VarData::default()),
            Modifiers::NONE,
            SourceLocation::default(),
        );
        let inner = table.declare(
            root,
            inner_name,
            SymbolKind::Namespace,
            Modifiers::NONE,
            SourceLocation::default(),
        );
        assert_eq!(table.lookup(inner, outer), Some(var));
        assert_eq!(table.lookup(root, outer), Some(var));
    }

    #[test]
    fn resolve_path_requires_exact_members() {
        let (mut table, mut interner) = table();
        let a = interner.intern("A");
        let b = interner.intern("B");
        let c = interner.intern("C");
        let root = table.root();
        let ns_a = table.declare(
            root,
            a,
            SymbolKind::Namespace,
            Modifiers::NONE,
            SourceLocation::default(),
        );
        let ns_b = table.declare(
            ns_a,
            b,
            SymbolKind::Namespace,
            Modifiers::NONE,
            SourceLocation::default(),
        );
        assert_eq!(table.resolve_path(root, &[a, b]), Some(ns_b));
        assert_eq!(table.resolve_path(root, &[a, c]), None);
    }

    #[test]
    fn overload_sets_share_a_name() {
        let (mut table, mut interner) = table();
        let f = interner.intern("f");
        let root = table.root();
        let f1 = table.declare(
            root,
            f,
            SymbolKind::Function(FunctionData::default()),
            Modifiers::NONE,
            SourceLocation::default(),
        );
        let f2 = table.declare(
            root,
            f,
            SymbolKind::Function(FunctionData::default()),
            Modifiers::NONE,
            SourceLocation::default(),
        );
        assert_eq!(table.members_named(root, f), &[f1, f2]);
        assert_eq!(table.functions_named(root, f), vec![f1, f2]);
    }

    #[test]
    fn qualified_names_skip_the_root() {
        let (mut table, mut interner) = table();
        let ns = interner.intern("Ns");
        let cls = interner.intern("C");
        let root = table.root();
        let ns_id = table.declare(
            root,
            ns,
            SymbolKind::Namespace,
            Modifiers::NONE,
            SourceLocation::default(),
        );
        let cls_id = table.declare(
            ns_id,
            cls,
            SymbolKind::Type(TypeData::default()),
            Modifiers::NONE,
            SourceLocation::default(),
        );
        assert_eq!(table.qualified_name(cls_id, &interner), "Ns.C");
        assert_eq!(table.qualified_name(root, &interner), "");
    }

    #[test]
    fn derives_from_walks_the_base_chain() {
        let (mut table, mut interner) = table();
        let root = table.root();
        let a = table.declare(
            root,
            interner.intern("A"),
            SymbolKind::Type(TypeData::default()),
            Modifiers::NONE,
            SourceLocation::default(),
        );
        let b = table.declare(
            root,
            interner.intern("B"),
            SymbolKind::Type(TypeData::default()),
            Modifiers::NONE,
            SourceLocation::default(),
        );
        let c = table.declare(
            root,
            interner.intern("C"),
            SymbolKind::Type(TypeData::default()),
            Modifiers::NONE,
            SourceLocation::default(),
        );
        table.as_type_mut(b).unwrap().base = Some(a);
        table.as_type_mut(c).unwrap().base = Some(b);
        assert!(table.derives_from(c, a));
        assert!(table.derives_from(b, a));
        assert!(!table.derives_from(a, c));
        assert!(!table.derives_from(a, a));
    }
}
