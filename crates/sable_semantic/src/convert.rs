//! The conversion classifier.
//!
//! One function decides, for every (source, target) type pair, which
//! conversion applies. The binder uses it to type mixed-operand
//! arithmetic, the resolver uses it for overload matching, and the
//! lowerer consults it when deciding whether to emit a cast - all three
//! see the same answer.
//!
//! The primitive matrix allows the usual widenings implicitly
//! (char -> int -> long, int/long -> float/double, float -> double) and
//! requires an explicit cast for every narrowing. `bool` never converts
//! to or from a numeric type implicitly, and `string` converts only to
//! itself.

use crate::symbols::SymbolTable;
use crate::types::{PrimitiveKind, Type, TypeId, TypeSystem};

/// Outcome of classifying a (source, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    Identity,
    ImplicitNumeric,
    ExplicitNumeric,
    ImplicitReference,
    ExplicitReference,
    Boxing,
    Unboxing,
    UserDefined,
    NoConversion,
}

impl ConversionKind {
    /// May the conversion be applied without a cast?
    pub fn is_implicit(self) -> bool {
        matches!(
            self,
            ConversionKind::Identity
                | ConversionKind::ImplicitNumeric
                | ConversionKind::ImplicitReference
        )
    }
}

// Short names keep the matrix readable.
const NOC: ConversionKind = ConversionKind::NoConversion;
const IDN: ConversionKind = ConversionKind::Identity;
const IMP: ConversionKind = ConversionKind::ImplicitNumeric;
const EXP: ConversionKind = ConversionKind::ExplicitNumeric;

/// Rows are the source kind, columns the target, both in
/// [`PrimitiveKind::ALL`] order: void bool char int long float double string.
const PRIMITIVE_MATRIX: [[ConversionKind; 8]; 8] = [
    /* void   */ [IDN, NOC, NOC, NOC, NOC, NOC, NOC, NOC],
    /* bool   */ [NOC, IDN, NOC, NOC, NOC, NOC, NOC, NOC],
    /* char   */ [NOC, NOC, IDN, IMP, IMP, IMP, IMP, NOC],
    /* int    */ [NOC, NOC, EXP, IDN, IMP, IMP, IMP, NOC],
    /* long   */ [NOC, NOC, EXP, EXP, IDN, IMP, IMP, NOC],
    /* float  */ [NOC, NOC, EXP, EXP, EXP, IDN, IMP, NOC],
    /* double */ [NOC, NOC, EXP, EXP, EXP, EXP, IDN, NOC],
    /* string */ [NOC, NOC, NOC, NOC, NOC, NOC, NOC, IDN],
];

fn primitive_index(kind: PrimitiveKind) -> usize {
    PrimitiveKind::ALL.iter().position(|k| *k == kind).unwrap()
}

/// Classifies converting a primitive `source` into a primitive `target`.
pub fn classify_primitive(source: PrimitiveKind, target: PrimitiveKind) -> ConversionKind {
    PRIMITIVE_MATRIX[primitive_index(source)][primitive_index(target)]
}

/// Classifies converting `source` into `target`.
pub fn classify(
    types: &TypeSystem,
    symbols: &SymbolTable,
    source: TypeId,
    target: TypeId,
) -> ConversionKind {
    if source == target {
        return ConversionKind::Identity;
    }

    match (types.get(source), types.get(target)) {
        (Type::Primitive(s), Type::Primitive(t)) => classify_primitive(*s, *t),

        // Sized arrays convert to the unsized view of the same element;
        // different sizes never convert.
        (Type::Array(se, ss), Type::Array(te, ts)) => {
            if se != te {
                return ConversionKind::NoConversion;
            }
            match (ss, ts) {
                (_, None) | (None, _) => ConversionKind::Identity,
                (Some(a), Some(b)) if a == b => ConversionKind::Identity,
                _ => ConversionKind::NoConversion,
            }
        }

        // Array-to-pointer decay over the same element type.
        (Type::Array(se, _), Type::Pointer(tp)) if se == tp => ConversionKind::Identity,

        // Same-pointee pointers are the same interned id, so any pair
        // reaching here differs; pointers are unsafe, allow with a cast.
        (Type::Pointer(_), Type::Pointer(_)) => ConversionKind::ExplicitReference,

        // Derived-to-base reference conversion is implicit, the reverse
        // needs a cast.
        (Type::Named(s), Type::Named(t)) => {
            if symbols.derives_from(*s, *t) {
                ConversionKind::ImplicitReference
            } else if symbols.derives_from(*t, *s) {
                ConversionKind::ExplicitReference
            } else {
                ConversionKind::NoConversion
            }
        }

        _ => ConversionKind::NoConversion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_on_the_diagonal() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(classify_primitive(kind, kind), ConversionKind::Identity);
        }
    }

    #[test]
    fn widening_is_implicit_narrowing_is_explicit() {
        assert_eq!(
            classify_primitive(PrimitiveKind::Int, PrimitiveKind::Long),
            ConversionKind::ImplicitNumeric
        );
        assert_eq!(
            classify_primitive(PrimitiveKind::Long, PrimitiveKind::Int),
            ConversionKind::ExplicitNumeric
        );
        assert_eq!(
            classify_primitive(PrimitiveKind::Char, PrimitiveKind::Int),
            ConversionKind::ImplicitNumeric
        );
        assert_eq!(
            classify_primitive(PrimitiveKind::Float, PrimitiveKind::Double),
            ConversionKind::ImplicitNumeric
        );
        assert_eq!(
            classify_primitive(PrimitiveKind::Double, PrimitiveKind::Int),
            ConversionKind::ExplicitNumeric
        );
    }

    #[test]
    fn bool_and_string_do_not_cross_convert() {
        assert_eq!(
            classify_primitive(PrimitiveKind::Bool, PrimitiveKind::Int),
            ConversionKind::NoConversion
        );
        assert_eq!(
            classify_primitive(PrimitiveKind::Int, PrimitiveKind::Bool),
            ConversionKind::NoConversion
        );
        assert_eq!(
            classify_primitive(PrimitiveKind::Str, PrimitiveKind::Int),
            ConversionKind::NoConversion
        );
    }

    #[test]
    fn void_converts_to_nothing() {
        for kind in PrimitiveKind::ALL {
            if kind != PrimitiveKind::Void {
                assert_eq!(
                    classify_primitive(PrimitiveKind::Void, kind),
                    ConversionKind::NoConversion
                );
            }
        }
    }

    #[test]
    fn implicit_set_is_exactly_three_kinds() {
        assert!(ConversionKind::Identity.is_implicit());
        assert!(ConversionKind::ImplicitNumeric.is_implicit());
        assert!(ConversionKind::ImplicitReference.is_implicit());
        assert!(!ConversionKind::ExplicitNumeric.is_implicit());
        assert!(!ConversionKind::ExplicitReference.is_implicit());
        assert!(!ConversionKind::NoConversion.is_implicit());
    }

    #[test]
    fn structural_rules_over_the_type_system() {
        use crate::symbols::SymbolTable;
        let mut interner = sable_base::Interner::new();
        let symbols = SymbolTable::new(&mut interner);
        let mut ts = TypeSystem::new();
        let int = ts.int_type();
        let sized = ts.array(int, Some(12));
        let unsized_ = ts.array(int, None);
        let other_sized = ts.array(int, Some(10));
        let ptr = ts.pointer(int);

        assert_eq!(
            classify(&ts, &symbols, sized, unsized_),
            ConversionKind::Identity
        );
        assert_eq!(
            classify(&ts, &symbols, sized, other_sized),
            ConversionKind::NoConversion
        );
        assert_eq!(classify(&ts, &symbols, sized, ptr), ConversionKind::Identity);

        let long = ts.primitive(PrimitiveKind::Long);
        let long_ptr = ts.pointer(long);
        assert_eq!(
            classify(&ts, &symbols, ptr, long_ptr),
            ConversionKind::ExplicitReference
        );
    }
}
