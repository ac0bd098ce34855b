//! REPL session
//!
//! [`Repl`] wires the statement compiler, the host and the evaluation
//! context into the read loop. The session is `NotStarted` until
//! [`Repl::start`] succeeds, `Running` while the loop reads input, and
//! `Terminated` once input ends. It never goes back.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, warn};

use super::backend_trait::{Host, HostError};
use super::compiler::{CompilerCapability, StatementCompiler};
use super::engine::{Handler, HelperCommand, HelperOptions, Namespace, ReplContext, ReplScope, Value};
use super::errors::{EvalError, HelperError, ReplError};
use super::line::{LineEditor, ReplServer, ServerInput, ServerOptions};
use crate::util::{Console, Palette};

const START_NOTICE: &str = "Type \".ls\" to a view list of available context methods/properties";
const LS_HELP: &str = "View list of available context methods/properties";
const HISTORY_FAILURE: &str = "Unable to write to the history file. Exiting";

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Terminated,
}

/// Callback run once the session is wired
pub type ReadyCallback = Box<dyn FnOnce(&mut Repl)>;

/// Session construction options
pub struct ReplOptions {
    pub compiler: Option<Arc<dyn CompilerCapability>>,
    pub history_file: Option<PathBuf>,
    pub console: Console,
    pub colors: bool,
    /// Line editor to read from instead of the terminal or stdin
    pub editor: Option<Box<dyn LineEditor>>,
    /// Force terminal mode on or off instead of detecting it
    pub terminal: Option<bool>,
    pub history_size: usize,
}

impl Default for ReplOptions {
    fn default() -> Self {
        Self {
            compiler: None,
            history_file: None,
            console: Console::stdio(),
            colors: true,
            editor: None,
            terminal: None,
            history_size: 1000,
        }
    }
}

impl ReplOptions {
    pub fn with_compiler(
        mut self,
        compiler: Arc<dyn CompilerCapability>,
    ) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn with_history_file(
        mut self,
        path: Option<PathBuf>,
    ) -> Self {
        self.history_file = path;
        self
    }

    pub fn with_console(
        mut self,
        console: Console,
    ) -> Self {
        self.console = console;
        self
    }

    pub fn with_colors(
        mut self,
        colors: bool,
    ) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_editor(
        mut self,
        editor: Box<dyn LineEditor>,
    ) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn with_terminal(
        mut self,
        terminal: bool,
    ) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn with_history_size(
        mut self,
        history_size: usize,
    ) -> Self {
        self.history_size = history_size;
        self
    }
}

/// REPL session
pub struct Repl {
    compiler: StatementCompiler,
    host: Box<dyn Host>,
    context: ReplContext,
    history_file: Option<PathBuf>,
    on_ready: Vec<ReadyCallback>,
    palette: Palette,
    console: Console,
    editor: Option<Box<dyn LineEditor>>,
    terminal: Option<bool>,
    history_size: usize,
    server: Option<ReplServer>,
    state: SessionState,
    runtime: Runtime,
    eval_count: usize,
}

impl Repl {
    pub fn new(
        host: impl Host + 'static,
        options: ReplOptions,
    ) -> Result<Self, ReplError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            compiler: StatementCompiler::new(options.compiler),
            host: Box::new(host),
            context: ReplContext::new(),
            history_file: options.history_file,
            on_ready: Vec::new(),
            palette: Palette::new(options.colors),
            console: options.console,
            editor: options.editor,
            terminal: options.terminal,
            history_size: options.history_size,
            server: None,
            state: SessionState::NotStarted,
            runtime,
            eval_count: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn context(&self) -> &ReplContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ReplContext {
        &mut self.context
    }

    pub fn namespace(&self) -> &Namespace {
        self.context.namespace()
    }

    pub fn history_file(&self) -> Option<&Path> {
        self.history_file.as_deref()
    }

    /// Read loop, available once started
    pub fn server(&self) -> Option<&ReplServer> {
        self.server.as_ref()
    }

    pub fn server_mut(&mut self) -> Option<&mut ReplServer> {
        self.server.as_mut()
    }

    /// Register a helper command, installed right away when running
    pub fn add_method<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
        options: HelperOptions,
    ) -> &mut Self
    where
        F: Fn(&mut ReplScope<'_>, &[Value]) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.context.add_method(name, handler, options);
        self
    }

    pub fn add_handler(
        &mut self,
        name: impl Into<String>,
        handler: Handler,
        options: HelperOptions,
    ) -> &mut Self {
        self.context.add_handler(name, handler, options);
        self
    }

    pub fn get_methods(&self) -> &IndexMap<String, HelperCommand> {
        self.context.get_methods()
    }

    /// Replace the compiler. The prompt label is fixed at start.
    pub fn use_compiler(
        &mut self,
        compiler: Arc<dyn CompilerCapability>,
    ) -> &mut Self {
        if self.state != SessionState::NotStarted {
            warn!("compiler replaced after start, prompt label unchanged");
        }
        self.compiler = StatementCompiler::new(Some(compiler));
        self
    }

    /// Run `callback` once the session has started
    pub fn ready(
        &mut self,
        callback: impl FnOnce(&mut Repl) + 'static,
    ) -> &mut Self {
        self.on_ready.push(Box::new(callback));
        self
    }

    /// Print a notice, then the prompt again when running
    pub fn notify(
        &mut self,
        message: &str,
    ) {
        self.console.println(&self.palette.notice(message));
        if let Some(server) = self.server.as_mut() {
            server.display_prompt();
        }
    }

    /// Start the session: create the read loop, install helpers, set up
    /// history and run the ready callbacks.
    pub fn start(&mut self) -> Result<&mut Self, ReplError> {
        if self.state != SessionState::NotStarted {
            return Err(ReplError::AlreadyStarted);
        }

        self.console.println("");
        self.notify(START_NOTICE);

        let language = if self.compiler.supports_typescript() {
            "(ts) "
        } else {
            "(js) "
        };
        let options = ServerOptions {
            prompt: format!("> {language}"),
            terminal: self.terminal.unwrap_or_else(detect_terminal),
            history_size: self.history_size,
            ..ServerOptions::default()
        };
        let editor = match self.editor.take() {
            Some(editor) => editor,
            None => ReplServer::default_editor(&options, &self.console)?,
        };
        debug!(prompt = %options.prompt, terminal = options.terminal, "starting read loop");

        let mut server = ReplServer::new(options, editor, self.console.clone(), self.palette);
        server.define_command(
            "ls",
            LS_HELP,
            Arc::new(|repl: &mut Repl, _: &str| {
                repl.ls();
                Ok(())
            }),
        );
        self.server = Some(server);
        self.state = SessionState::Running;

        self.setup_context();
        if let Err(err) = self.setup_history() {
            self.state = SessionState::Terminated;
            return Err(err);
        }

        for callback in std::mem::take(&mut self.on_ready) {
            callback(self);
        }

        self.publish_completions();
        if let Some(server) = self.server.as_mut() {
            server.display_prompt();
        }
        Ok(self)
    }

    fn setup_context(&mut self) {
        let palette = self.palette;
        self.context.install_builtins(&palette).go_live();
    }

    fn setup_history(&mut self) -> Result<(), ReplError> {
        let (Some(path), Some(server)) = (self.history_file.as_deref(), self.server.as_mut()) else {
            return Ok(());
        };
        if let Err(err) = server.setup_history(path) {
            self.console.println(&self.palette.red(HISTORY_FAILURE));
            self.console.eprintln(&err.to_string());
            error!(path = %path.display(), error = %err, "history setup failed");
            return Err(err.into());
        }
        Ok(())
    }

    /// Evaluate one statement under the next `REPL<n>` name
    pub fn eval(
        &mut self,
        code: &str,
    ) -> Result<Value, EvalError> {
        self.eval_count += 1;
        let filename = format!("REPL{}", self.eval_count);
        self.eval_named(code, &filename)
    }

    /// Compile, execute through the host, and await a suspended result
    pub fn eval_named(
        &mut self,
        code: &str,
        filename: &str,
    ) -> Result<Value, EvalError> {
        let unit = self
            .compiler
            .compile(code, filename)
            .map_err(|err| EvalError::classify(HostError::from(err)))?;

        let (namespace, helpers) = self.context.split();
        let mut scope = ReplScope::new(
            namespace,
            helpers,
            &self.console,
            self.palette,
            self.server.as_mut(),
            self.runtime.handle().clone(),
        );
        let value = self
            .host
            .execute(&unit, filename, &mut scope)
            .map_err(EvalError::classify)?;

        match value {
            Value::Promise(promise) if unit.suspends => {
                debug!(filename, "awaiting suspended statement");
                self.runtime
                    .block_on(promise.settled())
                    .map_err(|reason| EvalError::classify(HostError::from_rejection(&reason)))
            }
            value => Ok(value),
        }
    }

    /// Drive the read loop until input ends
    pub fn run(&mut self) -> Result<(), ReplError> {
        match self.state {
            SessionState::NotStarted => return Err(ReplError::NotStarted),
            SessionState::Terminated => return Ok(()),
            SessionState::Running => {}
        }

        loop {
            let input = self
                .server
                .as_mut()
                .ok_or(ReplError::NotStarted)?
                .read_input()?;

            match input {
                ServerInput::Exit => break,
                ServerInput::Directive { action, args } => action(self, &args)?,
                ServerInput::Statement(code) => self.handle_statement(&code),
            }

            // Background work spawned by helpers gets a turn between statements
            self.runtime.block_on(tokio::task::yield_now());
            self.publish_completions();
        }

        self.close()
    }

    fn handle_statement(
        &mut self,
        code: &str,
    ) {
        let outcome = self.eval(code);
        let Some(server) = self.server.as_mut() else {
            return;
        };
        match outcome {
            Ok(value) => {
                server.clear_buffer();
                server.print_result(&value);
            }
            Err(EvalError::Recoverable(err)) => {
                debug!(message = %err.message, "statement incomplete, waiting for more input");
            }
            Err(EvalError::Statement(err)) => {
                server.clear_buffer();
                server.print_error(&err);
            }
        }
    }

    /// End the session and persist history
    pub fn close(&mut self) -> Result<(), ReplError> {
        self.state = SessionState::Terminated;
        if let Some(server) = self.server.as_mut() {
            server.close()?;
        }
        Ok(())
    }

    /// `.ls`: helper catalog, then the filtered namespace
    pub fn ls(&mut self) {
        self.console.println("");
        self.console.println(&self.palette.green("GLOBAL METHODS:"));
        for line in self.context.method_listing(&self.palette) {
            self.console.println(&line);
        }

        self.console.println("");
        self.console
            .println(&self.palette.green("CONTEXT PROPERTIES/METHODS:"));
        let properties = self
            .context
            .render_properties(self.compiler.supports_typescript(), &self.palette);
        self.console.println(&properties);

        if let Some(server) = self.server.as_mut() {
            server.display_prompt();
        }
    }

    fn publish_completions(&mut self) {
        let Some(server) = self.server.as_mut() else {
            return;
        };
        let mut names: Vec<String> = self.context.namespace().keys().cloned().collect();
        names.extend(server.directives().keys().map(|name| format!(".{name}")));
        server.set_completions(names);
    }
}

/// Line editing only on a terminal, and not when `NODE_NO_READLINE` is set
/// to a non-zero number
fn detect_terminal() -> bool {
    let readline_allowed = std::env::var("NODE_NO_READLINE")
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map_or(true, |v| v == 0);
    std::io::stdout().is_terminal() && readline_allowed
}
