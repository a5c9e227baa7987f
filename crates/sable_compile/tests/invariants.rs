//! Universal invariants checked over a corpus of lowered programs:
//! CFG well-formedness, SSA definition/use exactness, qualified-name
//! uniqueness, and lexer determinism.

mod common;

use common::operands;
use rustc_hash::FxHashSet;
use sable_compile::compile;
use sable_hlir::{Function, InstKind, Module};
use std::collections::HashMap;

const CORPUS: &[&str] = &[
    "class C { int add(int a, int b) { return a + b; } }",
    "int f(int x) { if (x == 0) return 1; else return 2; }",
    "void g() { while (true) { break; } }",
    "class C { int x; int get() { return x; } }",
    "class Pt { int x; Pt(int v) { x = v; } } void h() { var p = new Pt(3); }",
    "int sum(int n) { int total = 0; for (int i = 0; i < n; i++) { total += i; } return total; }",
    "int collatz(int n) { int steps = 0; while (n != 1) { if (n % 2 == 0) { n = n / 2; } else { n = 3 * n + 1; } steps++; } return steps; }",
    "class A { virtual int f() { return 1; } } class B : A { override int f() { return 2; } } int call_it(A a) { return a.f(); }",
    "class C { int total { get; set; } } int read(C c) { return c.total; }",
    "namespace Outer.Inner { class Thing { int value; Thing(int v) { value = v; } } } \
     void make() { var t = new Outer.Inner.Thing(9); }",
    "int first(int[] xs) { return xs[0]; }",
    "void nested() { int acc = 0; for (int i = 0; i < 3; i++) { int j = 0; while (j < i) { acc += j; j++; if (acc > 10) { continue; } } } }",
];

fn reachable_blocks(func: &Function) -> FxHashSet<sable_hlir::BlockId> {
    let mut seen = FxHashSet::default();
    let Some(entry) = func.entry else {
        return seen;
    };
    let mut stack = vec![entry];
    while let Some(block) = stack.pop() {
        if !seen.insert(block) {
            continue;
        }
        for succ in &func.block(block).successors {
            stack.push(*succ);
        }
    }
    seen
}

fn check_cfg(func: &Function) {
    let reachable = reachable_blocks(func);
    for block_id in func.block_ids() {
        let block = func.block(block_id);

        if reachable.contains(&block_id) {
            // Exactly one terminator, and it is the last instruction.
            let terminators: Vec<_> = block
                .insts
                .iter()
                .filter(|i| func.inst(**i).kind.is_terminator())
                .collect();
            assert_eq!(
                terminators.len(),
                1,
                "reachable block {} must have exactly one terminator",
                block.name
            );
            assert_eq!(terminators[0], block.insts.last().unwrap());
        }

        // Every successor edge has a matching predecessor edge.
        for succ in &block.successors {
            assert!(
                func.block(*succ).predecessors.contains(&block_id),
                "edge {} -> {} missing back edge",
                block.name,
                func.block(*succ).name
            );
        }
        for pred in &block.predecessors {
            assert!(
                func.block(*pred).successors.contains(&block_id),
                "pred edge of {} not mirrored",
                block.name
            );
        }
    }
}

fn check_ssa(func: &Function) {
    // Each value: at most one definition, and the use list is exactly
    // the multiset of instructions whose operands mention it.
    let mut expected_uses: HashMap<sable_hlir::ValueId, Vec<sable_hlir::InstId>> = HashMap::new();
    for inst_id in func.inst_ids() {
        for operand in operands(&func.inst(inst_id).kind) {
            expected_uses.entry(operand).or_default().push(inst_id);
        }
        if let Some(result) = func.inst(inst_id).result {
            assert_eq!(
                func.value(result).def,
                Some(inst_id),
                "result value must point back at its defining instruction"
            );
        }
    }
    for value_id in func.value_ids() {
        let value = func.value(value_id);
        if value.def.is_none() {
            assert!(
                func.params.contains(&value_id),
                "only parameters may lack a defining instruction"
            );
        }
        let mut actual = value.uses.clone();
        let mut expected = expected_uses.remove(&value_id).unwrap_or_default();
        actual.sort_by_key(|i| i.index());
        expected.sort_by_key(|i| i.index());
        assert_eq!(actual, expected, "use list must exactly match operands");
    }
}

fn check_module(module: &Module) {
    for id in module.func_ids() {
        let func = module.function(id);
        check_cfg(func);
        check_ssa(func);
    }
}

#[test]
fn corpus_lowers_clean_and_well_formed() {
    for source in CORPUS {
        let result = compile(source, "corpus.sb");
        assert!(
            result.success(),
            "corpus program failed: {source}\n{:?}",
            result.errors
        );
        let module = result.module.as_ref().expect("module");
        check_module(module);
    }
}

#[test]
fn qualified_names_are_unique_per_compilation() {
    for source in CORPUS {
        let result = compile(source, "corpus.sb");
        let mut seen = std::collections::HashSet::new();
        for id in result.symbols.iter_ids() {
            let name = result.symbols.qualified_name(id, &result.interner);
            assert!(seen.insert(name.clone()), "duplicate qualified name {name}");
        }
    }
}

#[test]
fn lexing_is_deterministic_across_runs() {
    for source in CORPUS {
        let a = compile(source, "corpus.sb");
        let b = compile(source, "corpus.sb");
        assert_eq!(a.errors.len(), b.errors.len());
        assert_eq!(
            a.dump_hlir().unwrap_or_default(),
            b.dump_hlir().unwrap_or_default()
        );
    }
}

#[test]
fn cfg_stays_well_formed_even_with_errors() {
    let damaged = [
        "void f() { break; }",
        "void f() { missing(1); }",
        "class C { int x; } void g(C c) { c.y = 1; }",
        "int f() { }",
    ];
    for source in damaged {
        let result = compile(source, "damaged.sb");
        assert!(!result.success(), "expected errors for: {source}");
        if let Some(module) = &result.module {
            check_module(module);
        }
    }
}
