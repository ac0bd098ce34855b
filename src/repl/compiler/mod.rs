//! Statement compiler
//!
//! Turns one REPL statement into a [`CompiledUnit`]:
//!
//! 1. With a type-stripping capability configured, short statements first go
//!    through the [`ImportRewriter`], then the capability compiles the code
//!    and a trailing `//# sourceMappingURL=` comment is turned into a block
//!    comment so later wrapping cannot comment out generated code.
//! 2. Top-level `await` is always rewritten by [`await_rewrite`].

pub mod await_rewrite;
pub mod command;
pub mod lexer;

use std::sync::Arc;

use tracing::debug;

use super::errors::CompileError;
use super::imports::ImportRewriter;

pub use command::CommandCompiler;

/// Statements longer than this are handed to the capability without import rewriting
pub const IMPORT_REWRITE_MAX_LINES: usize = 2;

const SOURCE_MAP_LINE: &str = "//# sourceMappingURL=";

/// Pluggable type-stripping compiler
pub trait CompilerCapability: Send + Sync {
    /// Compile `code` as if it were the contents of `filename`
    fn compile(
        &self,
        code: &str,
        filename: &str,
    ) -> Result<String, CompileError>;

    /// Whether `code` may contain TypeScript syntax
    fn supports_typescript(&self) -> bool;
}

/// Output of [`StatementCompiler::compile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    pub code: String,
    /// The code evaluates to a promise that must settle before the result is known
    pub suspends: bool,
}

/// Compiler chain applied to every statement before execution
#[derive(Clone, Default)]
pub struct StatementCompiler {
    capability: Option<Arc<dyn CompilerCapability>>,
    imports: ImportRewriter,
}

impl std::fmt::Debug for StatementCompiler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StatementCompiler")
            .field("capability", &self.capability.is_some())
            .field("typescript", &self.supports_typescript())
            .finish()
    }
}

impl StatementCompiler {
    pub fn new(capability: Option<Arc<dyn CompilerCapability>>) -> Self {
        Self {
            capability,
            imports: ImportRewriter::new(),
        }
    }

    /// Whether a configured capability strips TypeScript
    pub fn supports_typescript(&self) -> bool {
        self.capability
            .as_ref()
            .is_some_and(|c| c.supports_typescript())
    }

    /// Compile a statement. `label` names the evaluation, e.g. `REPL3`.
    pub fn compile(
        &self,
        statement: &str,
        label: &str,
    ) -> Result<CompiledUnit, CompileError> {
        let code = match &self.capability {
            Some(capability) => self.strip_types(capability.as_ref(), statement, label)?,
            None => statement.to_string(),
        };

        match await_rewrite::rewrite(&code) {
            Some(wrapped) => Ok(CompiledUnit {
                code: wrapped,
                suspends: true,
            }),
            None => Ok(CompiledUnit {
                code,
                suspends: false,
            }),
        }
    }

    fn strip_types(
        &self,
        capability: &dyn CompilerCapability,
        statement: &str,
        label: &str,
    ) -> Result<String, CompileError> {
        let line_count = statement.split('\n').count();
        let source = if line_count <= IMPORT_REWRITE_MAX_LINES {
            self.imports.rewrite(statement)
        } else {
            statement.to_string()
        };

        let extension = if capability.supports_typescript() {
            "ts"
        } else {
            "js"
        };
        let filename = format!("{label}.{extension}");
        debug!(filename = %filename, lines = line_count, "compiling statement");

        let compiled = capability.compile(&source, &filename)?;
        Ok(patch_source_map(compiled))
    }
}

/// Turn a trailing `//# sourceMappingURL=...` line comment into a block comment
pub fn patch_source_map(mut compiled: String) -> String {
    let Some(at) = compiled.find(SOURCE_MAP_LINE) else {
        return compiled;
    };
    let line_end = compiled[at..]
        .find('\n')
        .map(|offset| at + offset)
        .unwrap_or(compiled.len());
    let comment = compiled[at + 2..line_end].trim_end().to_string();
    compiled.replace_range(at..line_end, &format!("/**{comment} */"));
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records its input and returns it with a source map trailer
    struct Recording {
        typescript: bool,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Recording {
        fn new(typescript: bool) -> Arc<Self> {
            Arc::new(Self {
                typescript,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl CompilerCapability for Recording {
        fn compile(
            &self,
            code: &str,
            filename: &str,
        ) -> Result<String, CompileError> {
            self.calls
                .lock()
                .push((code.to_string(), filename.to_string()));
            Ok(format!("{code}\n//# sourceMappingURL=data:abc"))
        }

        fn supports_typescript(&self) -> bool {
            self.typescript
        }
    }

    struct Failing;

    impl CompilerCapability for Failing {
        fn compile(
            &self,
            _code: &str,
            _filename: &str,
        ) -> Result<String, CompileError> {
            Err(CompileError::Diagnostic(
                "Unexpected end of input".to_string(),
            ))
        }

        fn supports_typescript(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_without_capability_code_is_untouched() {
        let compiler = StatementCompiler::new(None);
        assert!(!compiler.supports_typescript());
        let unit = compiler.compile("import foo from './m'", "REPL1").unwrap();
        assert_eq!(unit.code, "import foo from './m'");
        assert!(!unit.suspends);
    }

    #[test]
    fn test_short_statement_rewrites_imports_before_capability() {
        let capability = Recording::new(true);
        let compiler = StatementCompiler::new(Some(capability.clone()));
        compiler.compile("import foo from './m'", "REPL1").unwrap();

        let calls = capability.calls.lock();
        assert_eq!(calls[0].0, "import repl_foo from './m'; var foo = repl_foo");
        assert_eq!(calls[0].1, "REPL1.ts");
    }

    #[test]
    fn test_long_statement_skips_import_rewrite() {
        let capability = Recording::new(false);
        let compiler = StatementCompiler::new(Some(capability.clone()));
        let statement = "import foo from './m'\n\nfoo()";
        compiler.compile(statement, "REPL2").unwrap();

        let calls = capability.calls.lock();
        assert_eq!(calls[0].0, statement);
        assert_eq!(calls[0].1, "REPL2.js");
    }

    #[test]
    fn test_two_line_statement_rewrites_imports() {
        let capability = Recording::new(true);
        let compiler = StatementCompiler::new(Some(capability.clone()));
        compiler.compile("import foo from './m'\nfoo()", "REPL3").unwrap();

        let calls = capability.calls.lock();
        assert_eq!(calls[0].0, "import repl_foo from './m'; var foo = repl_foo;\nfoo()");
    }

    #[test]
    fn test_crlf_counts_as_one_line_break() {
        let capability = Recording::new(true);
        let compiler = StatementCompiler::new(Some(capability.clone()));
        compiler.compile("import foo from './m'\r\nfoo()", "REPL4").unwrap();
        compiler.compile("import foo from './m'\r\n\r\nfoo()", "REPL5").unwrap();

        let calls = capability.calls.lock();
        assert_eq!(calls[0].0, "import repl_foo from './m'; var foo = repl_foo;\r\nfoo()");
        assert_eq!(calls[1].0, "import foo from './m'\r\n\r\nfoo()");
    }

    #[test]
    fn test_source_map_comment_is_patched() {
        let compiler = StatementCompiler::new(Some(Recording::new(true)));
        let unit = compiler.compile("1 + 1", "REPL1").unwrap();
        assert_eq!(unit.code, "1 + 1\n/**# sourceMappingURL=data:abc */");
    }

    #[test]
    fn test_await_is_wrapped_after_capability() {
        let compiler = StatementCompiler::new(Some(Recording::new(true)));
        let unit = compiler.compile("await load()", "REPL1").unwrap();
        assert!(unit.suspends);
        assert!(unit.code.starts_with("(async () => { return (await load());"));
        assert!(unit.code.ends_with("\n })()"));
    }

    #[test]
    fn test_capability_error_propagates() {
        let compiler = StatementCompiler::new(Some(Arc::new(Failing)));
        let err = compiler.compile("{", "REPL1").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected end of input");
    }

    #[test]
    fn test_patch_source_map_keeps_text_after_line() {
        assert_eq!(
            patch_source_map("a\n//# sourceMappingURL=x.map\nb".to_string()),
            "a\n/**# sourceMappingURL=x.map */\nb"
        );
        assert_eq!(patch_source_map("a".to_string()), "a");
    }
}
