//! REPL Evaluation Context
//!
//! Owns the session namespace and the catalog of helper commands. Helpers
//! are installed into the namespace as context-bound function values once
//! the session goes live.

use std::sync::Arc;

use indexmap::IndexMap;

use super::scope::ReplScope;
use super::value::{inspect, Function, Value};
use crate::repl::errors::HelperError;
use crate::util::{display_width, Palette};

/// Session namespace: name to value, in definition order
pub type Namespace = IndexMap<String, Value>;

/// Helper command handler
///
/// Receives the session scope followed by the call arguments. A handler that
/// spawns work on [`ReplScope::spawn`] returns before that work finishes;
/// the work keeps running while later statements are evaluated and nothing
/// orders it against them.
pub type Handler =
    Arc<dyn Fn(&mut ReplScope<'_>, &[Value]) -> Result<Value, HelperError> + Send + Sync>;

/// Host globals never listed by `.ls`
pub const HOST_GLOBALS: &[&str] = &[
    "performance",
    "global",
    "clearInterval",
    "clearTimeout",
    "setInterval",
    "setTimeout",
    "queueMicrotask",
    "clearImmediate",
    "setImmediate",
    "structuredClone",
    "atob",
    "btoa",
    "fetch",
    "crypto",
    "exports",
];

/// Helpers emitted by TypeScript down-leveling, hidden when type stripping is active
pub const COMPILER_HELPERS: &[&str] = &[
    "__extends",
    "__assign",
    "__rest",
    "__decorate",
    "__param",
    "__esDecorate",
    "__runInitializers",
    "__propKey",
    "__setFunctionName",
    "__metadata",
    "__awaiter",
    "__generator",
    "__exportStar",
    "__createBinding",
    "__values",
    "__read",
    "__spread",
    "__spreadArrays",
    "__spreadArray",
    "__await",
    "__asyncGenerator",
    "__asyncDelegator",
    "__asyncValues",
    "__makeTemplateObject",
    "__importStar",
    "__importDefault",
    "__classPrivateFieldGet",
    "__classPrivateFieldSet",
    "__classPrivateFieldIn",
];

/// Registration options of a helper command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperOptions {
    pub description: Option<String>,
    /// Usage line shown instead of the name, may carry styling
    pub usage: Option<String>,
    /// Name of the function value installed in the namespace
    pub handler_name: Option<String>,
}

impl HelperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(
        mut self,
        description: impl Into<String>,
    ) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn usage(
        mut self,
        usage: impl Into<String>,
    ) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn handler_name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.handler_name = Some(name.into());
        self
    }
}

/// A registered helper command
#[derive(Clone)]
pub struct HelperCommand {
    pub name: String,
    pub handler: Handler,
    pub handler_name: String,
    pub description: Option<String>,
    pub usage: Option<String>,
    /// Terminal columns of `usage`, or of `name` without one
    pub display_width: usize,
}

impl std::fmt::Debug for HelperCommand {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HelperCommand")
            .field("name", &self.name)
            .field("handler_name", &self.handler_name)
            .field("description", &self.description)
            .field("usage", &self.usage)
            .field("display_width", &self.display_width)
            .finish()
    }
}

impl HelperCommand {
    /// Function value installed in the namespace under the helper name
    pub fn bound_function(&self) -> Function {
        Function::helper(&self.name, &self.handler_name)
    }
}

/// REPL Evaluation Context
///
/// Stores the namespace and helper commands across evaluations.
#[derive(Debug, Default)]
pub struct ReplContext {
    namespace: Namespace,
    helpers: IndexMap<String, HelperCommand>,
    longest_helper_width: usize,
    /// Helpers are installed into the namespace as soon as they are added
    live: bool,
}

impl ReplContext {
    /// Create a new context
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a helper command
    pub fn add_method<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
        options: HelperOptions,
    ) -> &mut Self
    where
        F: Fn(&mut ReplScope<'_>, &[Value]) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.add_handler(name, Arc::new(handler), options)
    }

    /// Register or replace a helper command with a shared handler
    pub fn add_handler(
        &mut self,
        name: impl Into<String>,
        handler: Handler,
        options: HelperOptions,
    ) -> &mut Self {
        let name = name.into();
        let display_width = display_width(options.usage.as_deref().unwrap_or(&name));
        self.longest_helper_width = self.longest_helper_width.max(display_width);

        let helper = HelperCommand {
            handler_name: options.handler_name.unwrap_or_else(|| name.clone()),
            name: name.clone(),
            handler,
            description: options.description,
            usage: options.usage,
            display_width,
        };
        if self.live {
            self.namespace
                .insert(name.clone(), Value::Function(helper.bound_function()));
        }
        self.helpers.insert(name, helper);
        self
    }

    /// Install every registered helper and keep installing new ones
    pub fn go_live(&mut self) {
        self.live = true;
        for helper in self.helpers.values() {
            self.namespace
                .insert(helper.name.clone(), Value::Function(helper.bound_function()));
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn get_methods(&self) -> &IndexMap<String, HelperCommand> {
        &self.helpers
    }

    pub fn longest_method_width(&self) -> usize {
        self.longest_helper_width
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }

    /// Namespace and helper catalog borrowed together, for building a scope
    pub fn split(&mut self) -> (&mut Namespace, &IndexMap<String, HelperCommand>) {
        (&mut self.namespace, &self.helpers)
    }

    /// Namespace entries worth showing to the user.
    ///
    /// Leaves out helpers, host globals and, when `hide_compiler_helpers` is
    /// set, the TypeScript runtime helpers.
    pub fn inspect_properties(
        &self,
        hide_compiler_helpers: bool,
    ) -> Namespace {
        self.namespace
            .iter()
            .filter(|(key, _)| {
                !self.helpers.contains_key(key.as_str())
                    && !HOST_GLOBALS.contains(&key.as_str())
                    && !(hide_compiler_helpers && COMPILER_HELPERS.contains(&key.as_str()))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// One aligned line per helper: usage, padding, description
    pub fn method_listing(
        &self,
        palette: &Palette,
    ) -> Vec<String> {
        self.helpers
            .values()
            .map(|helper| {
                let usage = palette.yellow(helper.usage.as_deref().unwrap_or(&helper.name));
                let spaces = " ".repeat(self.longest_helper_width - helper.display_width + 2);
                let description = palette.dim(helper.description.as_deref().unwrap_or(""));
                format!("{usage}{spaces}{description}")
            })
            .collect()
    }

    /// Filtered namespace rendered like `util.inspect(context, false, 1)`
    pub fn render_properties(
        &self,
        hide_compiler_helpers: bool,
        palette: &Palette,
    ) -> String {
        inspect(
            &Value::Object(self.inspect_properties(hide_compiler_helpers)),
            1,
            palette,
        )
    }

    /// Register the `clear` and `p` built-ins
    pub fn install_builtins(
        &mut self,
        palette: &Palette,
    ) -> &mut Self {
        self.add_method(
            "clear",
            |scope, args| {
                match args.first() {
                    Some(Value::String(key)) if !key.is_empty() => {
                        scope.remove(key);
                    }
                    _ => {
                        let notice = scope
                            .palette()
                            .red("Define a property name to remove from the context");
                        scope.println(&notice);
                    }
                }
                scope.display_prompt();
                Ok(Value::Undefined)
            },
            HelperOptions::new()
                .description("Clear a property from the REPL context")
                .usage(format!("clear {}", palette.gray("(propertyName)"))),
        );

        self.add_method(
            "p",
            |_, args| match args.first() {
                Some(Value::Function(original)) => {
                    Ok(Value::Function(Function::promisified(original.clone())))
                }
                _ => Err(HelperError::InvalidArgument(
                    "The \"original\" argument must be of type function".to_string(),
                )),
            },
            HelperOptions::new()
                .description("Promisify a function. Similar to Node.js \"util.promisify\"")
                .usage(format!("p {}", palette.gray("(function)")))
                .handler_name("promisify"),
        )
    }
}
