//! Host evaluator trait
//!
//! The REPL never executes code itself. Compiled units are handed to a
//! [`Host`] (an embedded JavaScript engine, a remote runtime, a test double)
//! together with a [`ReplScope`] giving access to the session namespace.

use thiserror::Error;

use super::compiler::CompiledUnit;
use super::engine::{ReplScope, Value};

/// Error object thrown by evaluated code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct HostError {
    /// Constructor name, e.g. `SyntaxError`
    pub name: String,
    pub message: String,
}

impl HostError {
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new("SyntaxError", message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Error for a rejected promise. Error-like objects keep their name.
    pub fn from_rejection(reason: &Value) -> Self {
        if let Value::Object(fields) = reason {
            if let Some(Value::String(message)) = fields.get("message") {
                let name = match fields.get("name") {
                    Some(Value::String(name)) => name.clone(),
                    _ => "Error".to_string(),
                };
                return Self::new(name, message.clone());
            }
        }
        Self::error(reason.to_string())
    }

    /// Error-like object value carrying this error
    pub fn to_value(&self) -> Value {
        Value::error(&self.name, &self.message)
    }
}

/// Host evaluator
///
/// `execute` runs a compiled unit against the namespace exposed by `scope`.
/// A unit with `suspends` set evaluates to a [`Value::Promise`] that the
/// session awaits before reporting the result.
pub trait Host: Send {
    fn execute(
        &mut self,
        unit: &CompiledUnit,
        filename: &str,
        scope: &mut ReplScope<'_>,
    ) -> Result<Value, HostError>;
}

impl Host for Box<dyn Host> {
    fn execute(
        &mut self,
        unit: &CompiledUnit,
        filename: &str,
        scope: &mut ReplScope<'_>,
    ) -> Result<Value, HostError> {
        (**self).execute(unit, filename, scope)
    }
}

/// Host built from a closure, see [`from_fn`]
pub struct FnHost<F>(F);

/// Create a [`Host`] from a closure receiving the unit and the scope
pub fn from_fn<F>(f: F) -> FnHost<F>
where
    F: FnMut(&CompiledUnit, &mut ReplScope<'_>) -> Result<Value, HostError> + Send,
{
    FnHost(f)
}

impl<F> Host for FnHost<F>
where
    F: FnMut(&CompiledUnit, &mut ReplScope<'_>) -> Result<Value, HostError> + Send,
{
    fn execute(
        &mut self,
        unit: &CompiledUnit,
        _filename: &str,
        scope: &mut ReplScope<'_>,
    ) -> Result<Value, HostError> {
        (self.0)(unit, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            HostError::syntax("Unexpected end of input").to_string(),
            "SyntaxError: Unexpected end of input"
        );
    }

    #[test]
    fn test_rejection_of_error_object_keeps_name() {
        let reason = Value::error("RangeError", "too far");
        assert_eq!(HostError::from_rejection(&reason), HostError::new("RangeError", "too far"));
    }

    #[test]
    fn test_rejection_of_plain_value() {
        let reason = Value::String("nope".into());
        assert_eq!(HostError::from_rejection(&reason), HostError::error("nope"));
    }
}
