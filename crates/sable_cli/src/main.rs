//! `sablec` - the Sable compiler driver.
//!
//! Compiles one source file per invocation and prints diagnostics to
//! stderr, either as rendered text (default) or as a JSON array
//! (`--json`) for editor and tooling integration. `--dump-hlir` writes
//! the lowered module's text form to stdout. The exit status is nonzero
//! iff any error was recorded.

use clap::Parser;
use sable_base::CompileError;
use sable_compile::{compile, render_diagnostics, Compilation};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "sablec", version, about = "Sable compiler")]
struct Args {
    /// Source file to compile.
    input: PathBuf,

    /// Print the lowered HLIR module to stdout.
    #[arg(long)]
    dump_hlir: bool,

    /// Print the symbol tree to stdout.
    #[arg(long)]
    dump_symbols: bool,

    /// Emit diagnostics as a JSON array instead of rendered text.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// JSON mirror of a diagnostic; kept local to the CLI so the core types
/// stay serialization-free.
#[derive(Debug, Serialize)]
struct JsonDiagnostic {
    kind: String,
    message: String,
    file: String,
    line_start: u32,
    col_start: u32,
    line_end: u32,
    col_end: u32,
}

impl JsonDiagnostic {
    fn from_error(error: &CompileError, result: &Compilation) -> Self {
        JsonDiagnostic {
            kind: error.kind.as_str().to_string(),
            message: error.message.clone(),
            file: result.interner.resolve(error.location.file).to_string(),
            line_start: error.location.line_start,
            col_start: error.location.col_start,
            line_end: error.location.line_end,
            col_end: error.location.col_end,
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn dump_symbols(result: &Compilation) -> String {
    let mut out = String::new();
    for id in result.symbols.iter_ids() {
        let name = result.symbols.qualified_name(id, &result.interner);
        if name.is_empty() {
            continue;
        }
        let kind = result.symbols.get(id).kind.describe();
        out.push_str(&format!("{kind:<10} {name}\n"));
    }
    out
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("sablec: cannot read {}: {err}", args.input.display());
            return ExitCode::FAILURE;
        }
    };
    let filename = args.input.display().to_string();

    log::debug!("compiling {filename} ({} bytes)", source.len());
    let result = compile(&source, &filename);

    if args.json {
        let diagnostics: Vec<JsonDiagnostic> = result
            .errors
            .iter()
            .map(|e| JsonDiagnostic::from_error(e, &result))
            .collect();
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => eprintln!("{json}"),
            Err(err) => eprintln!("sablec: failed to serialize diagnostics: {err}"),
        }
    } else if !result.errors.is_empty() {
        eprint!(
            "{}",
            render_diagnostics(&source, &result.errors, &result.interner)
        );
    }

    if args.dump_symbols {
        print!("{}", dump_symbols(&result));
    }
    if args.dump_hlir {
        match result.dump_hlir() {
            Some(dump) => print!("{dump}"),
            None => log::warn!("no module was produced; nothing to dump"),
        }
    }

    if result.success() {
        ExitCode::SUCCESS
    } else {
        log::debug!("{} diagnostics", result.errors.len());
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn json_mirror_carries_location_fields() {
        let result = compile("class C {", "bad.sb");
        assert!(!result.success());
        let json: Vec<JsonDiagnostic> = result
            .errors
            .iter()
            .map(|e| JsonDiagnostic::from_error(e, &result))
            .collect();
        assert!(!json.is_empty());
        assert_eq!(json[0].file, "bad.sb");
        assert!(json[0].line_start >= 1);
        let text = serde_json::to_string(&json).unwrap();
        assert!(text.contains("\"kind\""));
        assert!(text.contains("\"parse error\""));
    }

    #[test]
    fn symbol_dump_lists_qualified_names() {
        let result = compile("class C { int x; }", "ok.sb");
        let dump = dump_symbols(&result);
        assert!(dump.contains("type       C"));
        assert!(dump.contains("field      C.x"));
    }

    #[test]
    fn reads_source_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "class C {{ }}").unwrap();
        let source = std::fs::read_to_string(file.path()).unwrap();
        let result = compile(&source, &file.path().display().to_string());
        assert!(result.success());
    }
}
