//! REPL layer
//!
//! Source typed at the prompt goes through the [`StatementCompiler`]
//! (import rewriting, optional type stripping, top-level await), is run by a
//! [`Host`] against the session namespace, and the result or error is
//! printed by the read loop.

pub mod backend_trait;
pub mod compiler;
pub mod engine;
pub mod errors;
pub mod imports;
pub mod line;
pub mod preview;
pub mod session;

pub use backend_trait::{from_fn, FnHost, Host, HostError};
pub use compiler::{CommandCompiler, CompiledUnit, CompilerCapability, StatementCompiler};
pub use engine::{HelperCommand, HelperOptions, ReplContext, ReplScope, Value};
pub use errors::{CompileError, EvalError, HelperError, HistoryError, ReplError};
pub use imports::{ImportBinding, ImportKind, ImportRewriter};
pub use line::{LineEditor, ReplServer, ScriptedEditor};
pub use preview::PreviewHost;
pub use session::{Repl, ReplOptions, SessionState};
