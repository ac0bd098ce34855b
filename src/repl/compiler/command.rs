//! External type-stripping command
//!
//! Pipes each statement through a tool such as
//! `esbuild --loader=ts --format=cjs` and reads the compiled code from its
//! standard output. A `{filename}` argument is replaced with the synthetic
//! file name of the statement.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use super::CompilerCapability;
use crate::repl::errors::CompileError;

const FILENAME_PLACEHOLDER: &str = "{filename}";

/// [`CompilerCapability`] backed by a child process per statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    typescript: bool,
}

impl CommandCompiler {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        typescript: bool,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            typescript,
        }
    }

    /// Parse a shell-style command line such as `esbuild --loader=ts`
    pub fn from_command_line(
        command_line: &str,
        typescript: bool,
    ) -> Result<Self, CompileError> {
        let mut words = shell_words::split(command_line)
            .map_err(|e| CompileError::Diagnostic(format!("invalid compiler command: {e}")))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| CompileError::Diagnostic("empty compiler command".to_string()))?;
        Ok(Self::new(program, words.collect(), typescript))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl CompilerCapability for CommandCompiler {
    fn compile(
        &self,
        code: &str,
        filename: &str,
    ) -> Result<String, CompileError> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(FILENAME_PLACEHOLDER, filename))
            .collect();
        debug!(program = %self.program, ?args, "spawning compiler");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A tool that exits before reading reports through its status
            match stdin.write_all(code.as_bytes()) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(program = %self.program, status = %output.status, "compiler rejected statement");
            let message = if stderr.is_empty() {
                format!("`{}` exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(CompileError::Diagnostic(message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn supports_typescript(&self) -> bool {
        self.typescript
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let compiler =
            CommandCompiler::from_command_line("esbuild --loader=ts 'a b'", true).unwrap();
        assert_eq!(compiler.program(), "esbuild");
        assert_eq!(compiler.args(), ["--loader=ts", "a b"]);
        assert!(compiler.supports_typescript());
    }

    #[test]
    fn test_empty_command_line_is_rejected() {
        assert!(CommandCompiler::from_command_line("   ", false).is_err());
        assert!(CommandCompiler::from_command_line("esbuild 'unterminated", false).is_err());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let compiler = CommandCompiler::new("tsrepl-no-such-compiler", Vec::new(), true);
        let err = compiler.compile("1", "REPL1.ts").unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_is_piped_through() {
        let compiler = CommandCompiler::new("cat", Vec::new(), false);
        assert_eq!(compiler.compile("const a = 1", "REPL1.js").unwrap(), "const a = 1");
    }

    #[cfg(unix)]
    #[test]
    fn test_filename_placeholder_and_failure() {
        let compiler = CommandCompiler::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo \"$0: Unexpected end of input\" >&2; exit 1".to_string(),
                "{filename}".to_string(),
            ],
            true,
        );
        let err = compiler.compile("{", "REPL7.ts").unwrap_err();
        assert_eq!(err.to_string(), "REPL7.ts: Unexpected end of input");
    }
}
