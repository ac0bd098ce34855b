//! Session view handed to hosts and helpers
//!
//! A [`ReplScope`] lives for one evaluation. It borrows the namespace
//! mutably, so everything that touches the namespace during that evaluation
//! goes through it.

use indexmap::IndexMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::context::{HelperCommand, Namespace};
use super::value::{Function, FunctionKind, Promise, Value};
use crate::repl::backend_trait::HostError;
use crate::repl::line::ReplServer;
use crate::util::{Console, Palette};

pub struct ReplScope<'a> {
    namespace: &'a mut Namespace,
    helpers: &'a IndexMap<String, HelperCommand>,
    console: &'a Console,
    palette: Palette,
    server: Option<&'a mut ReplServer>,
    runtime: Handle,
}

impl<'a> ReplScope<'a> {
    pub fn new(
        namespace: &'a mut Namespace,
        helpers: &'a IndexMap<String, HelperCommand>,
        console: &'a Console,
        palette: Palette,
        server: Option<&'a mut ReplServer>,
        runtime: Handle,
    ) -> Self {
        Self {
            namespace,
            helpers,
            console,
            palette,
            server,
            runtime,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Namespace {
        self.namespace
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.namespace.get(name)
    }

    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: Value,
    ) {
        self.namespace.insert(name.into(), value);
    }

    /// Remove a namespace entry, keeping the order of the others
    pub fn remove(
        &mut self,
        name: &str,
    ) -> Option<Value> {
        self.namespace.shift_remove(name)
    }

    pub fn helpers(&self) -> &IndexMap<String, HelperCommand> {
        self.helpers
    }

    pub fn console(&self) -> &Console {
        self.console
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Whether the read loop is running
    pub fn is_live(&self) -> bool {
        self.server.is_some()
    }

    pub fn server(&mut self) -> Option<&mut ReplServer> {
        self.server.as_deref_mut()
    }

    pub fn println(
        &self,
        line: &str,
    ) {
        self.console.println(line);
    }

    pub fn display_prompt(&mut self) {
        if let Some(server) = self.server.as_deref_mut() {
            server.display_prompt();
        }
    }

    /// Print a notice and re-display the prompt
    pub fn notify(
        &mut self,
        message: &str,
    ) {
        self.console.println(&self.palette.notice(message));
        self.display_prompt();
    }

    /// Run a future on the session runtime. It makes progress while the
    /// session awaits a suspended statement or between statements.
    pub fn spawn<F>(
        &self,
        future: F,
    ) -> JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Call a function value
    pub fn call(
        &mut self,
        function: &Function,
        args: Vec<Value>,
    ) -> Result<Value, HostError> {
        match &function.kind {
            FunctionKind::Native(native) => {
                let native = native.clone();
                native(self, args)
            }
            FunctionKind::Helper(name) => {
                let helper = self.helpers.get(name).ok_or_else(|| {
                    HostError::type_error(format!("{name} is not a function"))
                })?;
                let handler = helper.handler.clone();
                handler(self, &args).map_err(HostError::from)
            }
            FunctionKind::Promisified(original) => {
                let (promise, resolver) = Promise::pending();
                let settle = resolver.clone();
                let callback = Function::native("callback", move |_, args| {
                    let mut args = args.into_iter();
                    let error = args.next().unwrap_or_default();
                    if matches!(error, Value::Undefined | Value::Null) {
                        settle.resolve(args.next().unwrap_or_default());
                    } else {
                        settle.reject(error);
                    }
                    Ok(Value::Undefined)
                });

                let mut args = args;
                args.push(Value::Function(callback));
                if let Err(error) = self.call(original, args) {
                    resolver.reject(error.to_value());
                }
                Ok(Value::Promise(promise))
            }
        }
    }

    /// Call the namespace entry `name`
    pub fn call_by_name(
        &mut self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, HostError> {
        match self.namespace.get(name) {
            Some(Value::Function(function)) => {
                let function = function.clone();
                self.call(&function, args)
            }
            Some(_) => Err(HostError::type_error(format!("{name} is not a function"))),
            None => Err(HostError::new(
                "ReferenceError",
                format!("{name} is not defined"),
            )),
        }
    }
}
