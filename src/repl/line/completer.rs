//! REPL Completer
//!
//! Provides completion candidates for rustyline from the session namespace.

use std::sync::Arc;

use parking_lot::RwLock;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;

use crate::repl::compiler::lexer::is_ident_continue;

/// ECMAScript keywords offered alongside namespace names
const KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "false", "finally", "for",
    "function", "if", "import", "in", "instanceof", "let", "new", "null", "of", "return",
    "static", "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var",
    "void", "while", "yield",
];

/// REPL Completer
///
/// Completes identifiers from the namespace names last published by the
/// session, keywords, and `.`-directives at the start of a line.
#[derive(Debug, Clone, Default)]
pub struct ReplCompleter {
    names: Arc<RwLock<Vec<String>>>,
    directives: Arc<RwLock<Vec<String>>>,
}

impl ReplCompleter {
    /// Create a new completer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_names(
        &self,
        names: Vec<String>,
    ) {
        *self.names.write() = names;
    }

    pub fn set_directives(
        &self,
        directives: Vec<String>,
    ) {
        *self.directives.write() = directives;
    }

    /// Candidates for the word ending at `pos`
    pub fn candidates(
        &self,
        line: &str,
        pos: usize,
    ) -> (usize, Vec<String>) {
        let before = &line[..pos];

        if let Some(partial) = before.trim_start().strip_prefix('.') {
            if before.trim_start().len() == before.len()
                && partial.chars().all(|c| c.is_ascii_alphabetic())
            {
                let matches = self
                    .directives
                    .read()
                    .iter()
                    .filter(|d| d.starts_with(partial))
                    .map(|d| format!(".{d}"))
                    .collect();
                return (0, matches);
            }
        }

        let start = before
            .char_indices()
            .rev()
            .find(|(_, c)| !is_ident_continue(*c))
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let word = &before[start..];
        if word.is_empty() {
            return (start, Vec::new());
        }

        // Member access completes nothing from the global namespace
        if before[..start].ends_with('.') {
            return (start, Vec::new());
        }

        let mut matches: Vec<String> = self
            .names
            .read()
            .iter()
            .map(String::as_str)
            .chain(KEYWORDS.iter().copied())
            .filter(|candidate| candidate.starts_with(word))
            .map(str::to_string)
            .collect();

        // Sort and deduplicate
        matches.sort();
        matches.dedup();
        (start, matches)
    }
}

impl Completer for ReplCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let (start, matches) = self.candidates(line, pos);
        let pairs = matches
            .into_iter()
            .map(|m| Pair {
                display: m.clone(),
                replacement: m,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ReplCompleter {
    type Hint = String;
}

impl Highlighter for ReplCompleter {}

impl Validator for ReplCompleter {}

impl Helper for ReplCompleter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn completer() -> ReplCompleter {
        let completer = ReplCompleter::new();
        completer.set_names(vec!["users".into(), "userCount".into(), "clear".into()]);
        completer.set_directives(vec!["ls".into(), "help".into(), "exit".into()]);
        completer
    }

    #[test]
    fn test_namespace_and_keywords() {
        let (start, matches) = completer().candidates("1 + use", 7);
        assert_eq!(start, 4);
        assert_eq!(matches, vec!["userCount", "users"]);

        let (_, matches) = completer().candidates("cl", 2);
        assert_eq!(matches, vec!["class", "clear"]);
    }

    #[test]
    fn test_member_access_is_skipped() {
        let (_, matches) = completer().candidates("db.us", 5);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_directives() {
        let (start, matches) = completer().candidates(".l", 2);
        assert_eq!(start, 0);
        assert_eq!(matches, vec![".ls"]);
    }
}
