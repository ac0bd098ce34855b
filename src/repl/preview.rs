//! Preview host
//!
//! Stand-in evaluator for running the REPL without an embedded engine. It
//! checks bracket balance, reporting incomplete input the way engines do so
//! multi-line buffering works, and evaluates every unit to its compiled
//! source.

use super::backend_trait::{Host, HostError};
use super::compiler::lexer::{tokenize, TokenKind};
use super::compiler::CompiledUnit;
use super::engine::{Promise, ReplScope, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewHost;

impl PreviewHost {
    pub fn new() -> Self {
        Self
    }
}

impl Host for PreviewHost {
    fn execute(
        &mut self,
        unit: &CompiledUnit,
        _filename: &str,
        _scope: &mut ReplScope<'_>,
    ) -> Result<Value, HostError> {
        check_complete(&unit.code)?;
        let value = Value::String(unit.code.clone());
        if unit.suspends {
            Ok(Value::Promise(Promise::resolved(value)))
        } else {
            Ok(value)
        }
    }
}

/// Report unbalanced brackets and unterminated literals as syntax errors
pub fn check_complete(code: &str) -> Result<(), HostError> {
    let mut open: Vec<&str> = Vec::new();

    for token in tokenize(code) {
        match token.kind {
            TokenKind::Template if token.text.len() < 2 || !token.text.ends_with('`') => {
                return Err(HostError::syntax("Unexpected end of input"));
            }
            TokenKind::Str if token.text.len() < 2 || !token.text.ends_with(&token.text[..1]) => {
                return Err(HostError::syntax("Invalid or unexpected token"));
            }
            TokenKind::Punct if token.is_opener() => open.push(token.text),
            TokenKind::Punct if token.is_closer() => {
                let expected = match open.pop() {
                    Some("(") => ")",
                    Some("[") => "]",
                    Some(_) => "}",
                    None => "",
                };
                if token.text != expected {
                    return Err(HostError::syntax(format!(
                        "Unexpected token '{}'",
                        token.text
                    )));
                }
            }
            _ => {}
        }
    }

    if open.is_empty() {
        Ok(())
    } else {
        Err(HostError::syntax("Unexpected end of input"))
    }
}
