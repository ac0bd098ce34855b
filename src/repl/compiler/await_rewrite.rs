//! Top-level await rewriting
//!
//! A unit containing `await` outside of any function body is wrapped into an
//! async arrow that is invoked immediately:
//!
//! ```text
//! const db = await getDb()
//! var db; (async () => { void (db = await getDb());
//!  })()
//! ```
//!
//! Declared names are hoisted into a leading `var` list so they land in the
//! session namespace, and the final expression statement is returned so the
//! unit settles with its value.

use tracing::debug;

use super::lexer::{template_substitutions, tokenize, Token, TokenKind};

/// Keywords whose parenthesized header is followed by a body
const CONTROL_HEADERS: &[&str] = &["if", "for", "while", "with", "catch", "switch"];

/// Identifiers after which `(` cannot start a parameter list
const NON_CALLABLE: &[&str] = &[
    "if", "for", "while", "with", "catch", "switch", "return", "typeof", "await", "yield", "in",
    "of", "new", "void", "delete", "instanceof", "case", "do", "else", "throw",
];

/// Keywords that never end a statement
const NON_TERMINAL: &[&str] = &[
    "else", "do", "try", "finally", "new", "typeof", "void", "delete", "in", "instanceof", "of",
    "case", "extends", "await", "yield", "var", "let", "const", "function", "class", "async",
    "export", "import", "throw",
];

/// Identifiers that continue the expression of the previous line
const CONTINUATION_WORDS: &[&str] = &[
    "in",
    "instanceof",
    "of",
    "else",
    "catch",
    "finally",
    "as",
    "satisfies",
];

/// Rewrite `source` for top-level await.
///
/// Returns `None` when the source has no top-level suspension point, in which
/// case it must be evaluated unchanged.
pub fn rewrite(source: &str) -> Option<String> {
    let tokens = tokenize(source);
    if !has_top_level_await(&tokens) {
        return None;
    }

    let statements = split_statements(&tokens);
    let mut hoisted: Vec<String> = Vec::new();
    let mut body = String::with_capacity(source.len() + 16);
    let mut cursor = 0;

    for (index, statement) in statements.iter().enumerate() {
        let start = tokens[statement.first].start;
        let end = tokens[statement.last].end;
        let text = &source[start..end];
        let is_last = index + 1 == statements.len();

        body.push_str(&source[cursor..start]);

        let needs_terminator = match statement.kind {
            StatementKind::Declaration => {
                match declaration_parts(source, &tokens[statement.first..=statement.last]) {
                    Some((names, assignments)) => {
                        push_unique(&mut hoisted, names);
                        if assignments.is_empty() {
                            false
                        } else {
                            body.push_str("void (");
                            body.push_str(&assignments.join(", "));
                            body.push(')');
                            true
                        }
                    }
                    // Left for the host to reject
                    None => {
                        body.push_str(text);
                        false
                    }
                }
            }
            StatementKind::Function | StatementKind::Class => {
                match declared_name(&tokens[statement.first..=statement.last]) {
                    Some(name) => {
                        body.push_str(name);
                        body.push_str(" = ");
                        body.push_str(text);
                        push_unique(&mut hoisted, vec![name.to_string()]);
                        true
                    }
                    None => {
                        body.push_str(text);
                        false
                    }
                }
            }
            StatementKind::Expression if is_last => {
                body.push_str("return (");
                body.push_str(text);
                body.push(')');
                true
            }
            StatementKind::Expression => {
                body.push_str(text);
                true
            }
            StatementKind::Block | StatementKind::Do | StatementKind::Other => {
                body.push_str(text);
                false
            }
        };

        match statement.semi {
            Some(semi) => {
                body.push_str(&source[end..tokens[semi].end]);
                cursor = tokens[semi].end;
            }
            None => {
                if needs_terminator {
                    body.push(';');
                }
                cursor = end;
            }
        }
    }
    body.push_str(&source[cursor..]);

    let prefix = if hoisted.is_empty() {
        String::new()
    } else {
        format!("var {}; ", hoisted.join(", "))
    };
    let wrapped = format!("{prefix}(async () => {{ {body}\n }})()");

    debug!(hoisted = ?hoisted, "wrapped top-level await");
    Some(wrapped)
}

/// `true` when an `await` operator appears outside every function body
pub fn has_top_level_await(tokens: &[Token<'_>]) -> bool {
    struct Frame {
        function: bool,
        params: bool,
    }

    let mut frames: Vec<Frame> = Vec::new();
    let mut concise_arrows: Vec<usize> = Vec::new();
    let mut class_bodies: Vec<usize> = Vec::new();
    let mut closed_params = false;

    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| &tokens[p]);
        let next = tokens.get(i + 1);

        while concise_arrows.last() == Some(&frames.len()) {
            let ends = token.is_punct(",")
                || token.is_punct(";")
                || (token.newline_before && prev.is_some_and(|p| asi_break(p, token)));
            if !ends {
                break;
            }
            concise_arrows.pop();
        }

        let nested = !concise_arrows.is_empty() || frames.iter().any(|f| f.function);

        if token.is_opener() {
            let function = token.is_punct("{")
                && (prev.is_some_and(|p| p.is_punct("=>"))
                    || (closed_params && prev.is_some_and(|p| p.is_punct(")")))
                    || class_bodies.last() == Some(&frames.len()));
            if token.is_punct("{") && class_bodies.last() == Some(&frames.len()) {
                class_bodies.pop();
            }
            let params = token.is_punct("(") && opens_parameters(tokens, i);
            frames.push(Frame { function, params });
            closed_params = false;
            continue;
        }

        if token.is_closer() {
            closed_params = frames.pop().is_some_and(|f| f.params) && token.is_punct(")");
            while concise_arrows.last().is_some_and(|&d| d > frames.len()) {
                concise_arrows.pop();
            }
            class_bodies.retain(|&d| d <= frames.len());
            continue;
        }
        closed_params = false;

        if token.is_punct("=>") && !next.is_some_and(|n| n.is_punct("{")) {
            concise_arrows.push(frames.len());
        } else if token.is_ident("class") {
            class_bodies.push(frames.len());
        } else if token.is_ident("await") && !nested && is_await_operator(prev, next) {
            return true;
        } else if token.kind == TokenKind::Template
            && !nested
            && template_substitutions(token.text)
                .into_iter()
                .any(|substitution| has_top_level_await(&tokenize(substitution)))
        {
            return true;
        }
    }

    false
}

/// `(` at `index` starts a parameter list if a method or function name precedes it
fn opens_parameters(
    tokens: &[Token<'_>],
    index: usize,
) -> bool {
    let Some(prev) = index.checked_sub(1).map(|p| &tokens[p]) else {
        return false;
    };
    match prev.kind {
        TokenKind::Ident => !NON_CALLABLE.contains(&prev.text),
        // function* (
        TokenKind::Punct if prev.text == "*" => index
            .checked_sub(2)
            .is_some_and(|p| tokens[p].is_ident("function")),
        _ => false,
    }
}

fn is_await_operator(
    prev: Option<&Token<'_>>,
    next: Option<&Token<'_>>,
) -> bool {
    if prev.is_some_and(|p| p.is_punct(".") || p.is_punct("?.")) {
        return false;
    }
    match next {
        None => false,
        Some(n) => !(n.kind == TokenKind::Punct
            && matches!(n.text, ":" | "=" | "," | ";" | ")" | "]" | "}" | "=>" | "." | "?.")),
    }
}

fn can_end_statement(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Punct => matches!(token.text, ")" | "]" | "}" | "++" | "--"),
        TokenKind::Ident => !NON_TERMINAL.contains(&token.text),
        TokenKind::Number | TokenKind::Str | TokenKind::Template | TokenKind::Regex => true,
    }
}

fn continues_expression(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Template => true,
        TokenKind::Punct => !matches!(token.text, "{" | "!" | "~" | "++" | "--" | "@"),
        TokenKind::Ident => CONTINUATION_WORDS.contains(&token.text),
        _ => false,
    }
}

/// A line break between `prev` and `next` inserts a semicolon
fn asi_break(
    prev: &Token<'_>,
    next: &Token<'_>,
) -> bool {
    can_end_statement(prev) && !continues_expression(next)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    /// `var`, `let` or `const`
    Declaration,
    /// Named function declaration, possibly async or a generator
    Function,
    /// Named class declaration
    Class,
    /// Statement ending with a block: `if`, `for`, `try`, labels, bare blocks
    Block,
    /// `do ... while (...)`
    Do,
    /// Expression statement
    Expression,
    /// Any other keyword statement
    Other,
}

impl StatementKind {
    fn ends_with_block(self) -> bool {
        matches!(
            self,
            StatementKind::Function | StatementKind::Class | StatementKind::Block | StatementKind::Do
        )
    }
}

/// Top-level statement as an inclusive token range
#[derive(Debug, Clone, Copy)]
struct Statement {
    first: usize,
    last: usize,
    /// Index of the terminating `;`
    semi: Option<usize>,
    kind: StatementKind,
}

fn classify(
    tokens: &[Token<'_>],
    index: usize,
) -> StatementKind {
    let token = &tokens[index];
    let next = tokens.get(index + 1);

    if token.is_punct("{") {
        return StatementKind::Block;
    }
    if token.kind != TokenKind::Ident {
        return StatementKind::Expression;
    }

    let named_function = |at: usize| {
        let mut at = at + 1;
        if tokens.get(at).is_some_and(|t| t.is_punct("*")) {
            at += 1;
        }
        tokens.get(at).is_some_and(|t| t.kind == TokenKind::Ident)
    };

    match token.text {
        "var" | "const" => StatementKind::Declaration,
        "let"
            if next.is_some_and(|n| {
                n.kind == TokenKind::Ident || n.is_punct("{") || n.is_punct("[")
            }) =>
        {
            StatementKind::Declaration
        }
        "function" if named_function(index) => StatementKind::Function,
        "function" => StatementKind::Block,
        "async"
            if next.is_some_and(|n| n.is_ident("function") && !n.newline_before)
                && named_function(index + 1) =>
        {
            StatementKind::Function
        }
        "class" if next.is_some_and(|n| n.kind == TokenKind::Ident && n.text != "extends") => {
            StatementKind::Class
        }
        "class" | "if" | "for" | "while" | "try" | "switch" | "with" => StatementKind::Block,
        "do" => StatementKind::Do,
        "import" if next.is_some_and(|n| n.is_punct("(") || n.is_punct(".")) => {
            StatementKind::Expression
        }
        "return" | "throw" | "break" | "continue" | "debugger" | "import" | "export" => {
            StatementKind::Other
        }
        _ if next.is_some_and(|n| n.is_punct(":")) => StatementKind::Block,
        _ => StatementKind::Expression,
    }
}

fn split_statements(tokens: &[Token<'_>]) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current: Option<(usize, StatementKind)> = None;
    let mut depth = 0usize;
    let mut header_open = false;
    let mut header_close: Option<usize> = None;

    for (i, token) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1);

        if depth == 0 {
            if let Some((first, kind)) = current {
                let prev = &tokens[i - 1];
                let do_while = kind == StatementKind::Do && token.is_ident("while");
                if i > first
                    && token.newline_before
                    && header_close != Some(i - 1)
                    && !do_while
                    && asi_break(prev, token)
                {
                    statements.push(Statement {
                        first,
                        last: i - 1,
                        semi: None,
                        kind,
                    });
                    current = None;
                }
            }
            if current.is_none() {
                if token.is_punct(";") {
                    continue;
                }
                current = Some((i, classify(tokens, i)));
            }
        }

        if token.is_opener() {
            if depth == 0 && token.is_punct("(") && is_control_header(tokens, i) {
                header_open = true;
            }
            depth += 1;
        } else if token.is_closer() {
            depth = depth.saturating_sub(1);
            if depth != 0 {
                continue;
            }
            if token.is_punct(")") && header_open {
                header_open = false;
                header_close = Some(i);
            }
            if let Some((first, kind)) = current {
                if token.is_punct("}") && kind.ends_with_block() && !continues_block(kind, next) {
                    statements.push(Statement {
                        first,
                        last: i,
                        semi: None,
                        kind,
                    });
                    current = None;
                }
            }
        } else if depth == 0 && token.is_punct(";") {
            if let Some((first, kind)) = current {
                if !next.is_some_and(|n| n.is_ident("else")) {
                    statements.push(Statement {
                        first,
                        last: i - 1,
                        semi: Some(i),
                        kind,
                    });
                    current = None;
                }
            }
        }
    }

    if let Some((first, kind)) = current {
        statements.push(Statement {
            first,
            last: tokens.len() - 1,
            semi: None,
            kind,
        });
    }
    statements
}

fn is_control_header(
    tokens: &[Token<'_>],
    index: usize,
) -> bool {
    let Some(prev) = index.checked_sub(1).map(|p| &tokens[p]) else {
        return false;
    };
    if prev.kind == TokenKind::Ident && CONTROL_HEADERS.contains(&prev.text) {
        return true;
    }
    // for await (
    prev.is_ident("await")
        && index
            .checked_sub(2)
            .is_some_and(|p| tokens[p].is_ident("for"))
}

fn continues_block(
    kind: StatementKind,
    next: Option<&Token<'_>>,
) -> bool {
    let Some(next) = next else {
        return false;
    };
    match kind {
        StatementKind::Do => next.is_ident("while"),
        StatementKind::Block => {
            next.is_ident("else") || next.is_ident("catch") || next.is_ident("finally")
        }
        _ => false,
    }
}

/// Name bound by a function or class declaration
fn declared_name<'a>(tokens: &[Token<'a>]) -> Option<&'a str> {
    tokens
        .iter()
        .skip_while(|t| t.is_ident("async") || t.is_ident("function") || t.is_ident("class"))
        .find(|t| !t.is_punct("*"))
        .filter(|t| t.kind == TokenKind::Ident)
        .map(|t| t.text)
}

/// Names and `pattern = init` assignments of a declaration statement.
/// `None` when a declarator has no binding pattern, as in `const = x`.
fn declaration_parts(
    source: &str,
    tokens: &[Token<'_>],
) -> Option<(Vec<String>, Vec<String>)> {
    let mut names = Vec::new();
    let mut assignments = Vec::new();

    for declarator in split_top_level(&tokens[1..], ",") {
        let Some(first) = declarator.first() else {
            continue;
        };
        let eq = top_level_position(declarator, "=");
        let pattern = &declarator[..eq.unwrap_or(declarator.len())];
        PatternNames::collect(pattern, &mut names);

        if let (Some(eq), Some(last)) = (eq, declarator.last()) {
            let pattern_end = declarator[..eq].last()?.end;
            if eq + 1 < declarator.len() {
                let pattern_text = &source[first.start..pattern_end];
                let init_text = &source[declarator[eq + 1].start..last.end];
                assignments.push(format!("{pattern_text} = {init_text}"));
            }
        }
    }

    Some((names, assignments))
}

fn split_top_level<'t, 'a>(
    tokens: &'t [Token<'a>],
    separator: &str,
) -> Vec<&'t [Token<'a>]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_opener() {
            depth += 1;
        } else if token.is_closer() {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && token.is_punct(separator) {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

fn top_level_position(
    tokens: &[Token<'_>],
    punct: &str,
) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_opener() {
            depth += 1;
        } else if token.is_closer() {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && token.is_punct(punct) {
            return Some(i);
        }
    }
    None
}

/// Binding names of a destructuring pattern
struct PatternNames<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'t, 'a> PatternNames<'t, 'a> {
    fn collect(
        tokens: &'t [Token<'a>],
        names: &mut Vec<String>,
    ) {
        let mut parser = Self { tokens, pos: 0 };
        parser.target(names);
    }

    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_is(
        &self,
        punct: &str,
    ) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn target(
        &mut self,
        names: &mut Vec<String>,
    ) {
        let Some(token) = self.peek().copied() else {
            return;
        };
        if token.kind == TokenKind::Ident {
            names.push(token.text.to_string());
            self.pos += 1;
        } else if token.is_punct("{") {
            self.object(names);
        } else if token.is_punct("[") {
            self.array(names);
        } else {
            self.skip_element();
        }
        if self.peek_is("=") {
            self.skip_element();
        }
    }

    fn object(
        &mut self,
        names: &mut Vec<String>,
    ) {
        self.pos += 1;
        while let Some(token) = self.peek().copied() {
            if token.is_punct("}") {
                self.pos += 1;
                return;
            }
            let before = self.pos;
            if token.is_punct("...") {
                self.pos += 1;
                self.target(names);
            } else if token.is_punct("[") {
                self.skip_balanced();
                if self.peek_is(":") {
                    self.pos += 1;
                    self.target(names);
                }
            } else if self.tokens.get(self.pos + 1).is_some_and(|t| t.is_punct(":")) {
                self.pos += 2;
                self.target(names);
            } else {
                self.target(names);
            }
            if self.peek_is(",") {
                self.pos += 1;
            } else if self.pos == before {
                self.pos += 1;
            }
        }
    }

    fn array(
        &mut self,
        names: &mut Vec<String>,
    ) {
        self.pos += 1;
        while let Some(token) = self.peek().copied() {
            if token.is_punct("]") {
                self.pos += 1;
                return;
            }
            if token.is_punct(",") {
                self.pos += 1;
                continue;
            }
            let before = self.pos;
            if token.is_punct("...") {
                self.pos += 1;
            }
            self.target(names);
            if self.peek_is(",") {
                self.pos += 1;
            } else if self.pos == before {
                self.pos += 1;
            }
        }
    }

    /// Skip a default value or unknown element up to the next `,` or closer
    fn skip_element(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if token.is_opener() {
                depth += 1;
            } else if token.is_closer() {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            } else if depth == 0 && token.is_punct(",") {
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_balanced(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            if token.is_opener() {
                depth += 1;
            } else if token.is_closer() {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            }
        }
    }
}

fn push_unique(
    hoisted: &mut Vec<String>,
    names: Vec<String>,
) {
    for name in names {
        if !hoisted.contains(&name) {
            hoisted.push(name);
        }
    }
}
