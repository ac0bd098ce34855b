//! REPL error types

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::backend_trait::HostError;

/// Messages that mean "the statement is not finished yet"
static RECOVERABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Unexpected end of input|Unexpected token|' expected)").expect("valid regex")
});

/// Whether an error message asks for more input instead of reporting a failure
pub fn is_recoverable(message: &str) -> bool {
    RECOVERABLE.is_match(message)
}

/// Failure of the statement compiler chain
#[derive(Debug, Error)]
pub enum CompileError {
    /// Diagnostic reported by the type-stripping compiler
    #[error("{0}")]
    Diagnostic(String),
    #[error("failed to run compiler `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("compiler I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CompileError> for HostError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Diagnostic(message) => HostError::syntax(message),
            other => HostError::error(other.to_string()),
        }
    }
}

/// Outcome of a failed evaluation
#[derive(Debug, Error)]
pub enum EvalError {
    /// Incomplete statement, keep buffering
    #[error("{0}")]
    Recoverable(HostError),
    /// Statement failed, report it and continue
    #[error("{0}")]
    Statement(HostError),
}

impl EvalError {
    /// Classify a host error through [`is_recoverable`]
    pub fn classify(error: HostError) -> Self {
        if is_recoverable(&error.message) {
            EvalError::Recoverable(error)
        } else {
            EvalError::Statement(error)
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, EvalError::Recoverable(_))
    }

    pub fn host_error(&self) -> &HostError {
        match self {
            EvalError::Recoverable(e) | EvalError::Statement(e) => e,
        }
    }
}

/// History file could not be used
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("cannot open history file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot load history from {}: {message}", path.display())]
    Load { path: PathBuf, message: String },
    #[error("cannot save history to {}: {message}", path.display())]
    Save { path: PathBuf, message: String },
}

/// Error raised inside a helper command
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Host(#[from] HostError),
}

impl From<HelperError> for HostError {
    fn from(err: HelperError) -> Self {
        match err {
            HelperError::InvalidArgument(message) => HostError::type_error(message),
            HelperError::Failed(message) => HostError::error(message),
            HelperError::Host(error) => error,
        }
    }
}

/// Session level errors
#[derive(Debug, Error)]
pub enum ReplError {
    #[error("REPL session already started")]
    AlreadyStarted,
    #[error("REPL session not started")]
    NotStarted,
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("readline error: {0}")]
    Readline(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rustyline::error::ReadlineError> for ReplError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        match err {
            rustyline::error::ReadlineError::Io(io) => ReplError::Io(io),
            other => ReplError::Readline(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_messages() {
        assert!(is_recoverable("Unexpected end of input"));
        assert!(is_recoverable("Unexpected token '}'"));
        assert!(is_recoverable("' expected"));
        assert!(!is_recoverable("foo is not defined"));
        assert!(!is_recoverable("SyntaxError: Unexpected end of input"));
    }

    #[test]
    fn test_classify() {
        assert!(EvalError::classify(HostError::syntax("Unexpected end of input")).is_recoverable());
        let err = EvalError::classify(HostError::error("boom"));
        assert!(!err.is_recoverable());
        assert_eq!(err.host_error().message, "boom");
    }

    #[test]
    fn test_helper_error_becomes_host_error() {
        let host: HostError = HelperError::InvalidArgument("bad".into()).into();
        assert_eq!(host.name, "TypeError");
        let host: HostError = HelperError::Failed("oops".into()).into();
        assert_eq!(host.name, "Error");
    }

    #[test]
    fn test_compiler_diagnostic_is_syntax_error() {
        let host: HostError = CompileError::Diagnostic("Unexpected token".into()).into();
        assert_eq!(host.name, "SyntaxError");
        assert!(is_recoverable(&host.message));
    }
}
