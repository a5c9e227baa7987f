//! Pipeline orchestration: source text in, HLIR module and diagnostics
//! out.

use sable_base::{Arena, CompileError, Diagnostics, Interner};
use sable_hlir::Module;
use sable_semantic::{BoundTree, SymbolTable, TypeSystem};
use sable_syntax::ast::SynContext;
use sable_syntax::{Lexer, Parser};

/// Everything one compilation produced.
///
/// The syntax tree and its arenas are dropped before this is returned;
/// the bound tree, scope tree, and type system carry all downstream
/// information.
pub struct Compilation {
    pub interner: Interner,
    pub symbols: SymbolTable,
    pub types: TypeSystem,
    pub bound: BoundTree,
    /// `None` when parsing produced no top-level declarations.
    pub module: Option<Module>,
    pub errors: Vec<CompileError>,
}

impl Compilation {
    /// `true` iff no stage reported an error.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Text form of the lowered module, if one was produced.
    pub fn dump_hlir(&self) -> Option<String> {
        self.module
            .as_ref()
            .map(|m| m.dump(&self.symbols, &self.types, &self.interner))
    }
}

/// Runs the whole pipeline over one source file.
pub fn compile(source: &str, filename: &str) -> Compilation {
    let mut interner = Interner::new();
    let mut diags = Diagnostics::new();

    let tokens = Lexer::new(source, filename, &mut interner).tokenize(&mut diags);
    log::debug!("lexed {} tokens ({} diagnostics)", tokens.len(), diags.len());

    let exprs = Arena::new();
    let stmts = Arena::new();
    let decls = Arena::new();
    let type_refs = Arena::new();
    let accessors = Arena::new();
    let ctx = SynContext::new(&exprs, &stmts, &decls, &type_refs, &accessors);
    let unit = Parser::new(tokens, ctx, &interner, &mut diags).parse();
    log::debug!(
        "parsed {} top-level declarations ({} diagnostics)",
        unit.decls.len(),
        diags.len()
    );

    let mut types = TypeSystem::new();
    let mut symbols =
        sable_semantic::build_symbol_table(&unit, &mut types, &mut interner, &mut diags);
    log::debug!("declared {} symbols", symbols.len());

    let mut bound = sable_semantic::bind(
        &unit,
        &mut symbols,
        &mut types,
        &mut interner,
        &mut diags,
    );
    sable_semantic::resolve(&mut bound, &symbols, &types, &interner, &mut diags);
    log::debug!(
        "bound {} expressions ({} diagnostics)",
        bound.expr_count(),
        diags.len()
    );

    // A file with no top-level declarations produces no module.
    let module = if unit.decls.is_empty() {
        None
    } else {
        let name = module_name(filename);
        Some(sable_hlir::lower(
            &bound,
            &symbols,
            &mut types,
            &mut interner,
            &mut diags,
            &name,
        ))
    };
    log::debug!("finished with {} diagnostics", diags.len());

    Compilation {
        interner,
        symbols,
        types,
        bound,
        module,
        errors: diags.into_vec(),
    }
}

/// Module name: the file stem of the input path.
fn module_name(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    base.strip_suffix(".sb").unwrap_or(base).to_string()
}
