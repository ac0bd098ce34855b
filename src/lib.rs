//! tsrepl
//!
//! An interactive REPL layer for ECMAScript and TypeScript statements: static
//! imports become persistent bindings, top-level `await` works, and helper
//! commands registered by the embedder live in the session namespace.
//!
//! # Example
//!
//! ```no_run
//! use tsrepl::repl::{HelperOptions, PreviewHost, Repl, ReplOptions, Value};
//!
//! fn main() -> tsrepl::Result<()> {
//!     let mut repl = Repl::new(PreviewHost::new(), ReplOptions::default())?;
//!     repl.add_method(
//!         "hello",
//!         |_, _| Ok(Value::from("world")),
//!         HelperOptions::new().description("Say hello"),
//!     );
//!     repl.start()?.run()?;
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod repl;
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name
pub const NAME: &str = "tsrepl";
