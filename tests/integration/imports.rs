//! Import rewriting seen through the statement compiler

use std::sync::Arc;

use parking_lot::Mutex;
use tsrepl::repl::{
    CompileError, CompilerCapability, ImportKind, ImportRewriter, StatementCompiler,
};

/// Passes code through, remembering what it was given
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl CompilerCapability for Recorder {
    fn compile(
        &self,
        code: &str,
        _filename: &str,
    ) -> Result<String, CompileError> {
        self.seen.lock().push(code.to_string());
        Ok(code.to_string())
    }

    fn supports_typescript(&self) -> bool {
        true
    }
}

#[test]
fn test_imports_rewritten_before_type_stripping() {
    let recorder = Arc::new(Recorder::default());
    let compiler = StatementCompiler::new(Some(recorder.clone()));

    let unit = compiler
        .compile("import main, { foo } from './m'", "REPL1")
        .unwrap();
    assert_eq!(
        unit.code,
        "import repl_main,{foo as repl_foo} from './m'; var main = repl_main; var foo = repl_foo"
    );
    assert!(!unit.suspends);
    assert_eq!(recorder.seen.lock().as_slice(), [unit.code.as_str()]);
}

#[test]
fn test_long_statements_keep_their_imports() {
    let recorder = Arc::new(Recorder::default());
    let compiler = StatementCompiler::new(Some(recorder.clone()));

    let statement = "import foo from 'a'\nimport bar from 'b'\nfoo(bar)";
    let unit = compiler.compile(statement, "REPL2").unwrap();
    assert_eq!(unit.code, statement);

    let statement = "import foo from 'a'\nfoo()";
    let unit = compiler.compile(statement, "REPL3").unwrap();
    assert_eq!(unit.code, "import repl_foo from 'a'; var foo = repl_foo;\nfoo()");
}

#[test]
fn test_no_capability_leaves_imports_alone() {
    let compiler = StatementCompiler::new(None);
    let unit = compiler.compile("import foo from './m'", "REPL1").unwrap();
    assert_eq!(unit.code, "import foo from './m'");
}

#[test]
fn test_bindings_list_every_generated_name() {
    let bindings =
        ImportRewriter::new().bindings("import d, * as ns from 'm'; import { x as y } from 'n'");
    let names: Vec<_> = bindings
        .iter()
        .map(|b| (b.local_name.as_str(), b.generated_name.as_str(), b.specifier.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("d", "repl_d", "'m'"),
            ("ns", "repl_ns", "'m'"),
            ("y", "repl_y", "'n'"),
        ]
    );
    assert!(matches!(bindings[0].kind, ImportKind::Default));
    assert!(matches!(bindings[1].kind, ImportKind::Namespace));
    assert!(matches!(&bindings[2].kind, ImportKind::Named { original, .. } if original == "x"));
}
