//! Runtime values exchanged with the host
//!
//! Only the shapes the REPL itself needs to inspect: primitives, arrays,
//! plain objects, callables and promises.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::scope::ReplScope;
use crate::repl::backend_trait::HostError;
use crate::repl::compiler::lexer::{is_ident_continue, is_ident_start};
use crate::util::Palette;

/// Host-native callable
pub type NativeFn =
    Arc<dyn Fn(&mut ReplScope<'_>, Vec<Value>) -> Result<Value, HostError> + Send + Sync>;

/// A runtime value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Function(Function),
    Promise(Promise),
}

impl Value {
    /// Error-like object `{ name, message }`
    pub fn error(
        name: &str,
        message: &str,
    ) -> Value {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), Value::String(name.to_string()));
        fields.insert("message".to_string(), Value::String(message.to_string()));
        Value::Object(fields)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl PartialEq for Value {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.same(b),
            (Value::Promise(a), Value::Promise(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&inspect(self, usize::MAX, &Palette::plain()))
    }
}

/// `String(value)` semantics
impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !matches!(item, Value::Undefined | Value::Null) {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Object(_) | Value::Promise(_) => f.write_str("[object Object]"),
            other => f.write_str(&inspect(other, 0, &Palette::plain())),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 && n.is_sign_negative() {
        "-0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else if n.abs() >= 1e21 {
        // 1e+21, not 1e21
        format!("{n:e}").replacen('e', "e+", 1)
    } else {
        format!("{n}")
    }
}

/// Render `value` the way the console shows evaluation results.
///
/// Objects and arrays nested deeper than `depth` collapse to `[Object]` and
/// `[Array]`.
pub fn inspect(
    value: &Value,
    depth: usize,
    palette: &Palette,
) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0, depth, palette);
    out
}

fn write_value(
    out: &mut String,
    value: &Value,
    level: usize,
    depth: usize,
    palette: &Palette,
) {
    match value {
        Value::Undefined => out.push_str(&palette.gray("undefined")),
        Value::Null => out.push_str(&palette.bold("null")),
        Value::Bool(b) => out.push_str(&palette.yellow(&b.to_string())),
        Value::Number(n) => out.push_str(&palette.yellow(&format_number(*n))),
        Value::String(s) => out.push_str(&palette.green(&quote(s))),
        Value::Function(function) => {
            let label = if function.name.is_empty() {
                "[Function (anonymous)]".to_string()
            } else {
                format!("[Function: {}]", function.name)
            };
            out.push_str(&palette.cyan(&label));
        }
        Value::Promise(promise) => {
            out.push_str("Promise { ");
            match promise.state() {
                PromiseState::Pending => out.push_str(&palette.cyan("<pending>")),
                PromiseState::Fulfilled(value) => {
                    write_value(out, &value, level + 1, depth, palette)
                }
                PromiseState::Rejected(reason) => {
                    out.push_str(&palette.red("<rejected>"));
                    out.push(' ');
                    write_value(out, &reason, level + 1, depth, palette);
                }
            }
            out.push_str(" }");
        }
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
            } else if level > depth {
                out.push_str(&palette.cyan("[Array]"));
            } else {
                out.push_str("[ ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_value(out, item, level + 1, depth, palette);
                }
                out.push_str(" ]");
            }
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                out.push_str("{}");
            } else if level > depth {
                out.push_str(&palette.cyan("[Object]"));
            } else {
                out.push_str("{ ");
                for (i, (key, item)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&property_key(key));
                    out.push_str(": ");
                    write_value(out, item, level + 1, depth, palette);
                }
                out.push_str(" }");
            }
        }
    }
}

fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{escaped}'")
}

fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let plain = chars.next().is_some_and(is_ident_start) && chars.all(is_ident_continue);
    if plain {
        key.to_string()
    } else {
        quote(key)
    }
}

/// A callable value
#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
}

#[derive(Clone)]
pub enum FunctionKind {
    /// Implemented by the host or by Rust code
    Native(NativeFn),
    /// Context-bound wrapper of the named helper command
    Helper(String),
    /// Node-style callback function turned into a promise-returning one
    Promisified(Box<Function>),
}

impl Function {
    pub fn native<F>(
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(&mut ReplScope<'_>, Vec<Value>) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: FunctionKind::Native(Arc::new(f)),
        }
    }

    pub fn helper(
        helper: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            name: display_name.into(),
            kind: FunctionKind::Helper(helper.into()),
        }
    }

    pub fn promisified(original: Function) -> Self {
        Self {
            name: original.name.clone(),
            kind: FunctionKind::Promisified(Box::new(original)),
        }
    }

    /// Same callable: identical native closure or wrapper of the same target
    pub fn same(
        &self,
        other: &Function,
    ) -> bool {
        match (&self.kind, &other.kind) {
            (FunctionKind::Native(a), FunctionKind::Native(b)) => Arc::ptr_eq(a, b),
            (FunctionKind::Helper(a), FunctionKind::Helper(b)) => a == b,
            (FunctionKind::Promisified(a), FunctionKind::Promisified(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let kind = match &self.kind {
            FunctionKind::Native(_) => "native",
            FunctionKind::Helper(_) => "helper",
            FunctionKind::Promisified(_) => "promisified",
        };
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// Settlement state of a [`Promise`]
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

struct PromiseInner {
    state: Mutex<PromiseState>,
    settled: Notify,
}

/// Settle-once cell awaited by the session
#[derive(Clone)]
pub struct Promise {
    inner: Arc<PromiseInner>,
}

/// Write side of a pending [`Promise`]
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<PromiseInner>,
}

impl Promise {
    fn with_state(state: PromiseState) -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                state: Mutex::new(state),
                settled: Notify::new(),
            }),
        }
    }

    pub fn pending() -> (Promise, Resolver) {
        let promise = Self::with_state(PromiseState::Pending);
        let resolver = Resolver {
            inner: promise.inner.clone(),
        };
        (promise, resolver)
    }

    pub fn resolved(value: Value) -> Self {
        Self::with_state(PromiseState::Fulfilled(value))
    }

    pub fn rejected(reason: Value) -> Self {
        Self::with_state(PromiseState::Rejected(reason))
    }

    pub fn state(&self) -> PromiseState {
        self.inner.state.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.state.lock(), PromiseState::Pending)
    }

    fn outcome(&self) -> Option<Result<Value, Value>> {
        match &*self.inner.state.lock() {
            PromiseState::Pending => None,
            PromiseState::Fulfilled(value) => Some(Ok(value.clone())),
            PromiseState::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Wait until the promise settles. `Err` carries the rejection reason.
    pub async fn settled(&self) -> Result<Value, Value> {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for Promise {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("Promise").field(&self.state()).finish()
    }
}

impl Resolver {
    /// Fulfill the promise. Returns `false` if it was already settled.
    pub fn resolve(
        &self,
        value: Value,
    ) -> bool {
        self.settle(PromiseState::Fulfilled(value))
    }

    /// Reject the promise. Returns `false` if it was already settled.
    pub fn reject(
        &self,
        reason: Value,
    ) -> bool {
        self.settle(PromiseState::Rejected(reason))
    }

    fn settle(
        &self,
        outcome: PromiseState,
    ) -> bool {
        {
            let mut state = self.inner.state.lock();
            if !matches!(*state, PromiseState::Pending) {
                return false;
            }
            *state = outcome;
        }
        self.inner.settled.notify_waiters();
        true
    }
}
