//! REPL Engine Module
//!
//! Values, the session namespace and the scope evaluations run in.

pub mod context;
pub mod scope;
pub mod value;

pub use context::{Handler, HelperCommand, HelperOptions, Namespace, ReplContext};
pub use scope::ReplScope;
pub use value::{inspect, Function, FunctionKind, NativeFn, Promise, PromiseState, Resolver, Value};
