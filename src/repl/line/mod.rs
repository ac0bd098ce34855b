//! Line-based read loop
//!
//! [`ReplServer`] owns the line editor, buffers multi-line statements and
//! dispatches `.`-directives. Evaluation itself belongs to the session.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};
use tracing::debug;

use crate::repl::backend_trait::HostError;
use crate::repl::engine::{inspect, Value};
use crate::repl::errors::{HistoryError, ReplError};
use crate::repl::session::Repl;
use crate::util::{Console, Palette};

mod completer;
mod editor;

pub use completer::ReplCompleter;
pub use editor::{HistoryLog, LineEditor, PlainEditor, ReadLine, ScriptedEditor};

/// Printed on Ctrl-C at an empty prompt
const EXIT_HINT: &str = "(To exit, press Ctrl+C again or Ctrl+D or type .exit)";

/// Depth used when printing evaluation results
const RESULT_DEPTH: usize = 2;

/// Read loop configuration
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Prompt to display
    pub prompt: String,
    /// Prompt while a statement is incomplete
    pub continuation_prompt: String,
    /// Line editing on a terminal
    pub terminal: bool,
    /// Maximum history size
    pub history_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            prompt: "> ".into(),
            continuation_prompt: "... ".into(),
            terminal: false,
            history_size: 1000,
        }
    }
}

/// Session-defined directive callback, receives the text after the keyword
pub type DirectiveFn = Arc<dyn Fn(&mut Repl, &str) -> Result<(), ReplError>>;

#[derive(Clone)]
pub enum DirectiveAction {
    /// Drop the pending multi-line buffer
    Break,
    Exit,
    Help,
    Custom(DirectiveFn),
}

/// A `.name` command of the read loop
#[derive(Clone)]
pub struct Directive {
    pub help: String,
    pub action: DirectiveAction,
}

/// What the read loop produced
#[derive(Clone)]
pub enum ServerInput {
    /// Complete or partial statement: the buffered lines joined by `\n`
    Statement(String),
    /// Session directive with its arguments
    Directive { action: DirectiveFn, args: String },
    /// `.exit`, Ctrl-D, or Ctrl-C twice
    Exit,
}

/// Terminal editor backed by rustyline
pub struct RustylineEditor {
    editor: Editor<ReplCompleter, DefaultHistory>,
    completer: ReplCompleter,
}

impl RustylineEditor {
    pub fn new(history_size: usize) -> Result<Self, ReplError> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .max_history_size(history_size)?
            .build();

        let mut editor = Editor::with_config(config)?;
        let completer = ReplCompleter::new();
        editor.set_helper(Some(completer.clone()));
        Ok(Self { editor, completer })
    }

    pub fn completer(&self) -> &ReplCompleter {
        &self.completer
    }
}

impl LineEditor for RustylineEditor {
    fn readline(
        &mut self,
        prompt: &str,
    ) -> Result<ReadLine, ReplError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadLine::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadLine::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadLine::Eof),
            Err(e) => Err(e.into()),
        }
    }

    fn add_history_entry(
        &mut self,
        line: &str,
    ) {
        let _ = self.editor.add_history_entry(line);
    }

    fn load_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        match self.editor.load_history(path) {
            Ok(()) => Ok(()),
            Err(ReadlineError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HistoryError::Load {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    fn save_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        self.editor
            .save_history(path)
            .map_err(|e| HistoryError::Save {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    fn set_completions(
        &mut self,
        names: Vec<String>,
    ) {
        let (directives, names): (Vec<String>, Vec<String>) =
            names.into_iter().partition(|name| name.starts_with('.'));
        self.completer.set_directives(
            directives
                .into_iter()
                .map(|name| name.trim_start_matches('.').to_string())
                .collect(),
        );
        self.completer.set_names(names);
    }
}

/// Console read loop
pub struct ReplServer {
    options: ServerOptions,
    editor: Box<dyn LineEditor>,
    console: Console,
    palette: Palette,
    buffer: Vec<String>,
    directives: IndexMap<String, Directive>,
    history_path: Option<PathBuf>,
    interrupted: bool,
}

impl ReplServer {
    pub fn new(
        options: ServerOptions,
        editor: Box<dyn LineEditor>,
        console: Console,
        palette: Palette,
    ) -> Self {
        let mut server = Self {
            options,
            editor,
            console,
            palette,
            buffer: Vec::new(),
            directives: IndexMap::new(),
            history_path: None,
            interrupted: false,
        };
        server.install_default_directives();
        server
    }

    /// Editor for the configured mode: rustyline on a terminal, stdin otherwise
    pub fn default_editor(
        options: &ServerOptions,
        console: &Console,
    ) -> Result<Box<dyn LineEditor>, ReplError> {
        if options.terminal {
            Ok(Box::new(RustylineEditor::new(options.history_size)?))
        } else {
            Ok(Box::new(PlainEditor::stdin(
                console.clone(),
                options.history_size,
            )))
        }
    }

    fn install_default_directives(&mut self) {
        let defaults = [
            ("break", "Sometimes you get stuck, this gets you out", DirectiveAction::Break),
            ("clear", "Alias for .break", DirectiveAction::Break),
            ("exit", "Exit the REPL", DirectiveAction::Exit),
            ("help", "Print this help message", DirectiveAction::Help),
        ];
        for (name, help, action) in defaults {
            self.directives.insert(
                name.to_string(),
                Directive {
                    help: help.to_string(),
                    action,
                },
            );
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn prompt(&self) -> &str {
        &self.options.prompt
    }

    /// Define or replace a `.name` directive
    pub fn define_command(
        &mut self,
        name: &str,
        help: &str,
        action: DirectiveFn,
    ) {
        self.directives.insert(
            name.to_string(),
            Directive {
                help: help.to_string(),
                action: DirectiveAction::Custom(action),
            },
        );
        self.directives.sort_keys();
    }

    pub fn directives(&self) -> &IndexMap<String, Directive> {
        &self.directives
    }

    /// Lines of the statement being typed
    pub fn buffer(&self) -> &[String] {
        &self.buffer
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    fn current_prompt(&self) -> &str {
        if self.buffer.is_empty() {
            &self.options.prompt
        } else {
            &self.options.continuation_prompt
        }
    }

    pub fn display_prompt(&mut self) {
        let prompt = self.current_prompt().to_string();
        self.editor.display_prompt(&prompt);
    }

    /// Read until there is a statement to evaluate, a directive for the
    /// session, or the end of input.
    pub fn read_input(&mut self) -> Result<ServerInput, ReplError> {
        loop {
            let prompt = self.current_prompt().to_string();
            let line = match self.editor.readline(&prompt)? {
                ReadLine::Line(line) => line,
                ReadLine::Eof => return Ok(ServerInput::Exit),
                ReadLine::Interrupted => {
                    if !self.buffer.is_empty() {
                        self.buffer.clear();
                        self.interrupted = false;
                    } else if std::mem::replace(&mut self.interrupted, true) {
                        return Ok(ServerInput::Exit);
                    } else {
                        self.console.println(EXIT_HINT);
                    }
                    continue;
                }
            };
            self.interrupted = false;

            let trimmed = line.trim();
            if let Some((keyword, args)) = parse_directive(trimmed) {
                match self.directives.get(keyword).map(|d| d.action.clone()) {
                    Some(action) => {
                        self.editor.add_history_entry(trimmed);
                        debug!(directive = keyword, "running directive");
                        match action {
                            DirectiveAction::Break => self.buffer.clear(),
                            DirectiveAction::Exit => return Ok(ServerInput::Exit),
                            DirectiveAction::Help => self.print_help(),
                            DirectiveAction::Custom(action) => {
                                self.buffer.clear();
                                return Ok(ServerInput::Directive {
                                    action,
                                    args: args.to_string(),
                                });
                            }
                        }
                        continue;
                    }
                    None if self.buffer.is_empty() => {
                        self.console.println("Invalid REPL keyword");
                        continue;
                    }
                    None => {}
                }
            }

            if self.buffer.is_empty() && trimmed.is_empty() {
                continue;
            }

            self.editor.add_history_entry(&line);
            self.buffer.push(line);
            return Ok(ServerInput::Statement(self.buffer.join("\n")));
        }
    }

    fn print_help(&self) {
        let longest = self.directives.keys().map(String::len).max().unwrap_or(0);
        for (name, directive) in &self.directives {
            let spaces = " ".repeat(longest - name.len() + 4);
            self.console.println(&format!(".{name}{spaces}{}", directive.help));
        }
        self.console.println("");
        self.console
            .println("Press Ctrl+C to abort current expression, Ctrl+D to exit the REPL");
    }

    pub fn print_result(
        &self,
        value: &Value,
    ) {
        self.console.println(&inspect(value, RESULT_DEPTH, &self.palette));
    }

    pub fn print_error(
        &self,
        error: &HostError,
    ) {
        self.console.println(&self.palette.red(&format!("Uncaught {error}")));
    }

    /// Make `path` the history file: it must be writable, then it is loaded
    pub fn setup_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| HistoryError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        self.editor.load_history(path)?;
        self.history_path = Some(path.to_path_buf());
        debug!(path = %path.display(), "history ready");
        Ok(())
    }

    pub fn history_path(&self) -> Option<&Path> {
        self.history_path.as_deref()
    }

    pub fn set_completions(
        &mut self,
        names: Vec<String>,
    ) {
        self.editor.set_completions(names);
    }

    /// Persist history. Called once the loop ends.
    pub fn close(&mut self) -> Result<(), HistoryError> {
        match &self.history_path {
            Some(path) => self.editor.save_history(path),
            None => Ok(()),
        }
    }
}

/// Split `.name args` into keyword and arguments
fn parse_directive(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('.')?;
    if !rest.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(match rest.split_once(char::is_whitespace) {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (rest, ""),
    })
}
