//! Statement compilation end to end: type stripping, source maps, suspension

use std::sync::Arc;

use tsrepl::repl::{
    from_fn, CompileError, CompilerCapability, EvalError, Repl, ReplOptions, StatementCompiler,
    Value,
};
use tsrepl::util::Console;

/// Drops `: number` annotations and appends a source map comment
struct Stripper;

impl CompilerCapability for Stripper {
    fn compile(
        &self,
        code: &str,
        filename: &str,
    ) -> Result<String, CompileError> {
        if code.contains("@@") {
            return Err(CompileError::Diagnostic(format!(
                "{filename}: Unexpected token '@@'"
            )));
        }
        if code.contains("!!") {
            return Err(CompileError::Diagnostic(format!(
                "{filename}: Type 'string' is not assignable to type 'number'"
            )));
        }
        Ok(format!(
            "{}\n//# sourceMappingURL={filename}.map",
            code.replace(": number", "")
        ))
    }

    fn supports_typescript(&self) -> bool {
        true
    }
}

#[test]
fn test_stripped_code_keeps_a_block_source_map() {
    let compiler = StatementCompiler::new(Some(Arc::new(Stripper)));
    let unit = compiler.compile("const n: number = 1", "REPL1").unwrap();
    assert_eq!(unit.code, "const n = 1\n/**# sourceMappingURL=REPL1.ts.map */");
    assert!(!unit.suspends);
}

#[test]
fn test_await_is_rewritten_after_stripping() {
    let compiler = StatementCompiler::new(Some(Arc::new(Stripper)));
    let unit = compiler
        .compile("const db: number = await getDb()", "REPL4")
        .unwrap();
    assert!(unit.suspends);
    assert!(unit.code.starts_with("var db; (async () => { void (db = await getDb());"));
    assert!(unit.code.contains("/**# sourceMappingURL=REPL4.ts.map */"));
}

#[test]
fn test_plain_javascript_suspension() {
    let compiler = StatementCompiler::new(None);
    let unit = compiler.compile("const db = await getDb()", "REPL1").unwrap();
    assert_eq!(
        unit.code,
        "var db; (async () => { void (db = await getDb());\n })()"
    );
    assert!(unit.suspends);
}

#[test]
fn test_compile_errors_are_classified() {
    let (console, _capture) = Console::capture();
    let host = from_fn(|_, _| Ok(Value::Undefined));
    let options = ReplOptions::default()
        .with_console(console)
        .with_compiler(Arc::new(Stripper));
    let mut repl = Repl::new(host, options).unwrap();

    match repl.eval("let x = 1 @@") {
        Err(EvalError::Statement(err)) => {
            assert_eq!(err.name, "SyntaxError");
            assert!(err.message.starts_with("REPL1.ts"));
        }
        other => panic!("expected a statement error, got {other:?}"),
    }
    match repl.eval("let y: number = 'a' !!") {
        Err(EvalError::Statement(err)) => assert!(err.message.contains("not assignable")),
        other => panic!("expected a statement error, got {other:?}"),
    }
}
