//! Boundary behaviors: partial input still produces partial products
//! and precisely located diagnostics.

use sable_base::ErrorKind;
use sable_compile::compile;

#[test]
fn empty_file_is_clean() {
    let result = compile("", "empty.sb");
    assert!(result.success());
    assert!(result.module.is_none());
    assert_eq!(result.bound.decl_count(), 0);
}

#[test]
fn whitespace_and_comments_only_is_clean() {
    let result = compile("  // nothing here\n/* still nothing */\n", "empty.sb");
    assert!(result.success());
    assert!(result.module.is_none());
}

#[test]
fn unterminated_string_is_one_lex_error_at_the_quote() {
    let source = "class C { void f() { string s = \"oops; } }";
    let result = compile(source, "str.sb");

    let lex: Vec<_> = result
        .errors
        .iter()
        .filter(|e| e.kind == ErrorKind::Lex)
        .collect();
    assert_eq!(lex.len(), 1);
    assert!(lex[0].message.contains("unterminated string"));
    let quote_col = source.find('"').unwrap() as u32 + 1;
    assert_eq!(lex[0].location.col_start, quote_col);
}

#[test]
fn missing_class_close_brace_keeps_parsed_members() {
    let source = "class C { int x; void f() { }";
    let result = compile(source, "brace.sb");

    let parse: Vec<_> = result
        .errors
        .iter()
        .filter(|e| e.kind == ErrorKind::Parse)
        .collect();
    assert_eq!(parse.len(), 1);

    // The members parsed so far made it into the scope tree.
    let c = result.interner.lookup("C").unwrap();
    let class_symbol = result
        .symbols
        .iter_ids()
        .find(|id| result.symbols.get(*id).name == c)
        .expect("class symbol exists");
    assert_eq!(result.symbols.get(class_symbol).members.len(), 2);
}

#[test]
fn break_outside_loop_is_one_lowering_error_with_no_branch() {
    let result = compile("void f() { break; }", "brk.sb");

    let lowering: Vec<_> = result
        .errors
        .iter()
        .filter(|e| e.kind == ErrorKind::Lowering)
        .collect();
    assert_eq!(lowering.len(), 1);
    assert!(lowering[0].message.contains("break"));

    // No branch was emitted: the entry block ends in the implicit ret.
    let module = result.module.as_ref().unwrap();
    let func = module
        .func_ids()
        .map(|id| module.function(id))
        .find(|f| f.entry.is_some())
        .unwrap();
    let entry = func.entry.unwrap();
    assert_eq!(func.block(entry).insts.len(), 1);
    assert!(matches!(
        func.inst(func.block(entry).insts[0]).kind,
        sable_hlir::InstKind::Ret { value: None }
    ));
}

#[test]
fn continue_outside_loop_is_reported() {
    let result = compile("void f() { continue; }", "cont.sb");
    assert_eq!(
        result
            .errors
            .iter()
            .filter(|e| e.kind == ErrorKind::Lowering)
            .count(),
        1
    );
}

#[test]
fn statement_damage_recovers_at_the_boundary() {
    let source = "void f() { ] ; int x = 1; x = x + 1; }";
    let result = compile(source, "recover.sb");

    // The damage is reported, but the statements after the boundary
    // still compile and lower.
    assert!(result.errors.iter().any(|e| e.kind == ErrorKind::Parse));
    assert!(result.module.is_some());
}

#[test]
fn duplicate_definitions_keep_the_first() {
    let source = "class C { int x; bool x; } void f(C c) { int y = c.x; }";
    let result = compile(source, "dup.sb");

    assert_eq!(
        result
            .errors
            .iter()
            .filter(|e| e.kind == ErrorKind::Symbol)
            .count(),
        1
    );
    // `c.x` still resolves to the surviving int field.
    assert!(!result
        .errors
        .iter()
        .any(|e| e.kind == ErrorKind::Resolution));
}

#[test]
fn unresolved_reference_does_not_reach_a_crash() {
    let result = compile("void f() { missing(1, 2); }", "missing.sb");
    assert!(!result.success());
    // Lowering still produced a function with a well-formed CFG.
    let module = result.module.as_ref().unwrap();
    let func = module
        .func_ids()
        .map(|id| module.function(id))
        .find(|f| f.entry.is_some())
        .unwrap();
    assert!(func.is_terminated(func.entry.unwrap()));
}

#[test]
fn errors_carry_ordered_locations() {
    let source = "class C {\n  int x = \"not an int\";\n  ~D() { }\n}";
    let result = compile(source, "ord.sb");
    assert!(!result.success());
    for error in &result.errors {
        assert!(error.location.is_ordered(), "{error}");
        assert!(error.location.line_start >= 1);
        assert!(error.location.col_start >= 1);
    }
}

#[test]
fn exit_status_contract_over_error_list() {
    // No errors: success. Any error: failure. The CLI's exit code
    // follows `success()` directly.
    assert!(compile("class C { }", "ok.sb").success());
    assert!(!compile("class C {", "bad.sb").success());
}
