//! Import statement rewriter
//!
//! A type-stripping compiler drops imports whose bindings are never used in
//! the compiled unit. In a REPL every import is entered on its own line, so
//! they would all vanish. Each binding is therefore imported under a
//! generated name and re-declared with a plain `var`, which the compiler has
//! to keep:
//!
//! ```text
//! import User from 'App/Models/User'
//! import repl_User from 'App/Models/User'; var User = repl_User
//! ```
//!
//! The four clause forms are handled, whitespace tolerant:
//!
//! ```text
//! import v from "mod"            default
//! import * as ns from "mod"      namespace
//! import {x} from "mod"          named
//! import {x as v} from "mod"     named with alias
//! ```
//!
//! plus a default binding combined with a namespace or a named group.

use tracing::debug;

use super::compiler::lexer::{is_ident_continue, is_ident_start};

/// Prefix of every generated binding name
pub const GENERATED_PREFIX: &str = "repl_";

/// How a binding is introduced by its import clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// `import v from "m"`
    Default,
    /// `import * as ns from "m"`
    Namespace,
    /// `import {x} from "m"` or `import {x as v} from "m"`
    Named {
        original: String,
        alias: Option<String>,
    },
}

/// One binding introduced by a rewritten import clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Name the user refers to after the import
    pub local_name: String,
    /// Name actually bound by the rewritten import
    pub generated_name: String,
    /// Module specifier as written, quotes included
    pub specifier: String,
    pub kind: ImportKind,
}

impl ImportBinding {
    fn new(
        local_name: &str,
        specifier: &str,
        kind: ImportKind,
    ) -> Self {
        Self {
            local_name: local_name.to_string(),
            generated_name: format!("{GENERATED_PREFIX}{local_name}"),
            specifier: specifier.to_string(),
            kind,
        }
    }
}

/// Stateless rewriter. Every call works on its own input only.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportRewriter;

impl ImportRewriter {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite every import clause of `statement`.
    ///
    /// A statement that does not start with the `import` keyword is returned
    /// untouched. Otherwise it is split on `;`, import sub-statements are
    /// rewritten, the others are kept, and the pieces are joined with `"; "`.
    /// Code on the lines after an import clause follows its aliases.
    pub fn rewrite(
        &self,
        statement: &str,
    ) -> String {
        if !starts_with_import(statement) {
            return statement.to_string();
        }

        let rewritten = statement
            .split(';')
            .map(|part| {
                let part = part.trim();
                match ImportDecl::parse(part) {
                    Some(decl) => decl.render(),
                    None => part.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("; ");

        debug!(input = statement, output = %rewritten, "rewrote import bindings");
        rewritten
    }

    /// Bindings a call to [`rewrite`](Self::rewrite) would introduce, in order
    pub fn bindings(
        &self,
        statement: &str,
    ) -> Vec<ImportBinding> {
        if !starts_with_import(statement) {
            return Vec::new();
        }
        statement
            .split(';')
            .filter_map(|part| ImportDecl::parse(part.trim()))
            .flat_map(ImportDecl::all_bindings)
            .collect()
    }
}

/// `true` when `source` begins with the `import` keyword as a whole word
pub fn starts_with_import(source: &str) -> bool {
    source
        .trim_start()
        .strip_prefix("import")
        .is_some_and(|rest| !rest.chars().next().is_some_and(is_ident_continue))
}

/// A parsed import declaration that binds at least one name
#[derive(Debug)]
struct ImportDecl<'a> {
    bindings: Vec<ImportBinding>,
    specifier: &'a str,
    /// `with { ... }` or `assert { ... }` clause, leading whitespace included
    attributes: &'a str,
    /// Code on the following lines, leading line break included
    tail: &'a str,
}

impl<'a> ImportDecl<'a> {
    /// Parse one `;`-free statement. `None` when it is not a binding import
    /// or is malformed; such statements are passed through as written.
    fn parse(statement: &'a str) -> Option<Self> {
        let mut cur = Cursor::new(statement);
        if !cur.eat_keyword("import") {
            return None;
        }
        cur.skip_ws();

        // import(...), import.meta, import 'side-effect'
        if matches!(cur.peek(), Some('(' | '.' | '\'' | '"')) {
            return None;
        }
        if cur.at_type_only_import() {
            return None;
        }

        let mut default = None;
        let mut namespace = None;
        let mut named: Vec<(&str, Option<&str>)> = Vec::new();

        if cur.peek().is_some_and(is_ident_start) {
            default = Some(cur.ident()?);
            cur.skip_ws();
            if cur.eat(',') {
                cur.skip_ws();
                if !matches!(cur.peek(), Some('*' | '{')) {
                    return None;
                }
            }
        }

        if cur.eat('*') {
            cur.skip_ws();
            if !cur.eat_keyword("as") {
                return None;
            }
            cur.skip_ws();
            namespace = Some(cur.ident()?);
        } else if cur.eat('{') {
            named = cur.named_list()?;
        }

        cur.skip_ws();
        if !cur.eat_keyword("from") {
            return None;
        }
        cur.skip_ws();
        let specifier = cur.string_literal()?;

        let after_specifier = cur.pos;
        cur.skip_ws();
        let attributes = if cur.eat_keyword("with") || cur.eat_keyword("assert") {
            cur.skip_ws();
            cur.braced()?;
            &statement[after_specifier..cur.pos]
        } else {
            cur.pos = after_specifier;
            ""
        };

        // Anything else must start on a new line
        let rest = cur.rest();
        let tail = if rest.trim().is_empty() {
            ""
        } else if rest.trim_start_matches([' ', '\t']).starts_with(['\n', '\r']) {
            rest.trim_end()
        } else {
            return None;
        };

        let mut bindings = Vec::new();
        if let Some(name) = default {
            bindings.push(ImportBinding::new(name, specifier, ImportKind::Default));
        }
        if let Some(name) = namespace {
            bindings.push(ImportBinding::new(name, specifier, ImportKind::Namespace));
        }
        for (original, alias) in named {
            bindings.push(ImportBinding::new(
                alias.unwrap_or(original),
                specifier,
                ImportKind::Named {
                    original: original.to_string(),
                    alias: alias.map(str::to_string),
                },
            ));
        }

        if bindings.is_empty() {
            return None;
        }

        Some(Self {
            bindings,
            specifier,
            attributes,
            tail,
        })
    }

    fn render(&self) -> String {
        let mut tokens: Vec<String> = Vec::new();
        let named_count = self
            .bindings
            .iter()
            .filter(|b| matches!(b.kind, ImportKind::Named { .. }))
            .count();
        let mut named_index = 0;

        for binding in &self.bindings {
            match &binding.kind {
                ImportKind::Default => tokens.push(binding.generated_name.clone()),
                ImportKind::Namespace => tokens.push(format!("* as {}", binding.generated_name)),
                ImportKind::Named { original, .. } => {
                    let mut expression = String::new();
                    if named_index == 0 {
                        expression.push('{');
                    }
                    expression.push_str(original);
                    expression.push_str(" as ");
                    expression.push_str(&binding.generated_name);
                    named_index += 1;
                    if named_index == named_count {
                        expression.push('}');
                    }
                    tokens.push(expression);
                }
            }
        }

        let locals = self
            .bindings
            .iter()
            .map(|b| format!("var {} = {}", b.local_name, b.generated_name))
            .collect::<Vec<_>>()
            .join("; ");

        let mut rendered = format!(
            "import {} from {}{}; {}",
            tokens.join(","),
            self.specifier,
            self.attributes,
            locals
        );
        if !self.tail.is_empty() {
            // The aliases must run before the code that follows
            let code = self.tail.trim_start();
            rendered.push(';');
            rendered.push_str(&self.tail[..self.tail.len() - code.len()]);
            rendered.push_str(&ImportRewriter::new().rewrite(code));
        }
        rendered
    }

    /// Bindings of this declaration and of imports in its tail
    fn all_bindings(self) -> Vec<ImportBinding> {
        let mut bindings = self.bindings;
        bindings.extend(ImportRewriter::new().bindings(self.tail.trim_start()));
        bindings
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(
        &mut self,
        c: char,
    ) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn at_keyword(
        &self,
        keyword: &str,
    ) -> bool {
        self.rest()
            .strip_prefix(keyword)
            .is_some_and(|after| !after.chars().next().is_some_and(is_ident_continue))
    }

    fn eat_keyword(
        &mut self,
        keyword: &str,
    ) -> bool {
        if self.at_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_ident_start(c) => {}
            _ => return None,
        }
        let end = chars
            .find(|(_, c)| !is_ident_continue(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += end;
        Some(&rest[..end])
    }

    /// Quoted string, returned with its quotes
    fn string_literal(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let quote = rest.chars().next().filter(|c| matches!(c, '\'' | '"'))?;
        let mut escaped = false;
        for (i, c) in rest.char_indices().skip(1) {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                let end = i + c.len_utf8();
                self.pos += end;
                return Some(&rest[..end]);
            }
        }
        None
    }

    /// A `{ ... }` group, strings skipped, up to and including its `}`
    fn braced(&mut self) -> Option<()> {
        if self.peek() != Some('{') {
            return None;
        }
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '\'' | '"' => {
                    self.string_literal()?;
                    continue;
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Some(());
                    }
                }
                _ => {}
            }
            self.pos += c.len_utf8();
        }
        None
    }

    /// `import type X from`, `import type {X} from`, `import type * as X from`
    fn at_type_only_import(&self) -> bool {
        if !self.at_keyword("type") {
            return false;
        }
        let mut probe = Cursor {
            src: self.src,
            pos: self.pos + "type".len(),
        };
        probe.skip_ws();
        if probe.at_keyword("from") {
            return false;
        }
        matches!(probe.peek(), Some('{' | '*')) || probe.peek().is_some_and(is_ident_start)
    }

    /// Entries of a named group, after its `{` up to and including `}`
    fn named_list(&mut self) -> Option<Vec<(&'a str, Option<&'a str>)>> {
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Some(entries);
            }

            let original = match self.peek() {
                Some('\'' | '"') => self.string_literal()?,
                _ => self.ident()?,
            };
            self.skip_ws();

            // `{ type Foo }` names a type only, which the compiler erases
            let type_only = original == "type"
                && !self.at_keyword("as")
                && self.peek().is_some_and(is_ident_start);
            if type_only {
                self.ident()?;
                self.skip_ws();
            } else {
                let alias = if self.eat_keyword("as") {
                    self.skip_ws();
                    Some(self.ident()?)
                } else {
                    None
                };
                entries.push((original, alias));
            }

            self.skip_ws();
            if !self.eat(',') {
                self.skip_ws();
                return if self.eat('}') { Some(entries) } else { None };
            }
        }
    }
}
