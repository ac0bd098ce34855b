//! Line sources for the read loop
//!
//! [`RustylineEditor`](super::RustylineEditor) is used on a terminal. The
//! editors here serve piped input and scripted sessions.

use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, ErrorKind};
use std::path::Path;

use crate::repl::errors::{HistoryError, ReplError};
use crate::util::Console;

/// One read attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    Line(String),
    /// Ctrl-C
    Interrupted,
    /// Ctrl-D or end of input
    Eof,
}

/// Source of input lines with history
pub trait LineEditor {
    fn readline(
        &mut self,
        prompt: &str,
    ) -> Result<ReadLine, ReplError>;

    /// Show `prompt` ahead of the next read
    fn display_prompt(
        &mut self,
        _prompt: &str,
    ) {
    }

    fn add_history_entry(
        &mut self,
        line: &str,
    );

    /// Load history from `path`. A missing file is an empty history.
    fn load_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError>;

    fn save_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError>;

    /// Names offered for completion
    fn set_completions(
        &mut self,
        _names: Vec<String>,
    ) {
    }
}

/// In-memory history persisted as one entry per line
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: Vec<String>,
    max_size: usize,
}

impl HistoryLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn add(
        &mut self,
        line: &str,
    ) {
        if line.trim().is_empty() || self.entries.last().is_some_and(|last| last == line) {
            return;
        }
        self.entries.push(line.to_string());
        if self.entries.len() > self.max_size {
            let excess = self.entries.len() - self.max_size;
            self.entries.drain(..excess);
        }
    }

    pub fn load(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(HistoryError::Load {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        for line in content.lines() {
            self.add(line);
        }
        Ok(())
    }

    pub fn save(
        &self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        let mut content = self.entries.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(path, content).map_err(|e| HistoryError::Save {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Reads lines from a buffered reader, writing prompts to the console
pub struct PlainEditor {
    input: Box<dyn BufRead>,
    console: Console,
    history: HistoryLog,
    prompt_shown: bool,
}

impl PlainEditor {
    pub fn new(
        input: Box<dyn BufRead>,
        console: Console,
        history_size: usize,
    ) -> Self {
        Self {
            input,
            console,
            history: HistoryLog::new(history_size),
            prompt_shown: false,
        }
    }

    pub fn stdin(
        console: Console,
        history_size: usize,
    ) -> Self {
        Self::new(
            Box::new(std::io::BufReader::new(std::io::stdin())),
            console,
            history_size,
        )
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }
}

impl LineEditor for PlainEditor {
    fn readline(
        &mut self,
        prompt: &str,
    ) -> Result<ReadLine, ReplError> {
        if !std::mem::take(&mut self.prompt_shown) {
            self.console.print(prompt);
        }
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(ReadLine::Eof);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(ReadLine::Line(line))
    }

    fn display_prompt(
        &mut self,
        prompt: &str,
    ) {
        self.console.print(prompt);
        self.prompt_shown = true;
    }

    fn add_history_entry(
        &mut self,
        line: &str,
    ) {
        self.history.add(line);
    }

    fn load_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        self.history.load(path)
    }

    fn save_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        self.history.save(path)
    }
}

/// Replays a fixed script, echoing each line after its prompt
pub struct ScriptedEditor {
    script: VecDeque<ReadLine>,
    console: Console,
    history: HistoryLog,
    prompt_shown: bool,
    completions: Vec<String>,
}

impl ScriptedEditor {
    pub fn new<I, S>(
        lines: I,
        console: Console,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: lines
                .into_iter()
                .map(|line| ReadLine::Line(line.into()))
                .collect(),
            console,
            history: HistoryLog::new(1000),
            prompt_shown: false,
            completions: Vec::new(),
        }
    }

    /// Queue a Ctrl-C
    pub fn interrupt(mut self) -> Self {
        self.script.push_back(ReadLine::Interrupted);
        self
    }

    /// Queue another line
    pub fn line(
        mut self,
        line: impl Into<String>,
    ) -> Self {
        self.script.push_back(ReadLine::Line(line.into()));
        self
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn completions(&self) -> &[String] {
        &self.completions
    }
}

impl LineEditor for ScriptedEditor {
    fn readline(
        &mut self,
        prompt: &str,
    ) -> Result<ReadLine, ReplError> {
        if !std::mem::take(&mut self.prompt_shown) {
            self.console.print(prompt);
        }
        let next = self.script.pop_front().unwrap_or(ReadLine::Eof);
        match &next {
            ReadLine::Line(line) => self.console.println(line),
            ReadLine::Interrupted => self.console.println("^C"),
            ReadLine::Eof => self.console.println(""),
        }
        Ok(next)
    }

    fn display_prompt(
        &mut self,
        prompt: &str,
    ) {
        self.console.print(prompt);
        self.prompt_shown = true;
    }

    fn add_history_entry(
        &mut self,
        line: &str,
    ) {
        self.history.add(line);
    }

    fn load_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        self.history.load(path)
    }

    fn save_history(
        &mut self,
        path: &Path,
    ) -> Result<(), HistoryError> {
        self.history.save(path)
    }

    fn set_completions(
        &mut self,
        names: Vec<String>,
    ) {
        self.completions = names;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_log_dedups_and_caps() {
        let mut log = HistoryLog::new(2);
        log.add("a");
        log.add("a");
        log.add("   ");
        log.add("b");
        log.add("c");
        assert_eq!(log.entries(), ["b", "c"]);
    }

    #[test]
    fn test_history_log_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");

        let mut log = HistoryLog::new(10);
        log.load(&path).unwrap();
        assert!(log.entries().is_empty());

        log.add("const a = 1");
        log.add("a + 1");
        log.save(&path).unwrap();

        let mut reloaded = HistoryLog::new(10);
        reloaded.load(&path).unwrap();
        assert_eq!(reloaded.entries(), ["const a = 1", "a + 1"]);
    }

    #[test]
    fn test_plain_editor_reads_lines() {
        let (console, capture) = Console::capture();
        let input = std::io::Cursor::new("one\r\ntwo\n");
        let mut editor = PlainEditor::new(Box::new(input), console, 10);

        assert_eq!(editor.readline("> ").unwrap(), ReadLine::Line("one".into()));
        editor.display_prompt("> ");
        assert_eq!(editor.readline("> ").unwrap(), ReadLine::Line("two".into()));
        assert_eq!(editor.readline("> ").unwrap(), ReadLine::Eof);
        assert_eq!(capture.stdout(), "> > > ");
    }

    #[test]
    fn test_scripted_editor_echoes() {
        let (console, capture) = Console::capture();
        let mut editor = ScriptedEditor::new(["1 + 1"], console).interrupt();
        assert_eq!(editor.readline("> ").unwrap(), ReadLine::Line("1 + 1".into()));
        assert_eq!(editor.readline("> ").unwrap(), ReadLine::Interrupted);
        assert_eq!(editor.readline("> ").unwrap(), ReadLine::Eof);
        assert_eq!(capture.stdout(), "> 1 + 1\n> ^C\n> \n");
    }
}
