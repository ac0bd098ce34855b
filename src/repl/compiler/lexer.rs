//! Token scanner for statement rewriting
//!
//! Just enough of ECMAScript lexical grammar to find statement boundaries,
//! bracket nesting and keywords. Comments and whitespace are skipped but
//! remembered through [`Token::newline_before`]. Lexing never fails: an
//! unterminated string, template or comment simply runs to the end of input.

use unicode_ident::{is_xid_continue, is_xid_start};

/// Token category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword
    Ident,
    /// Numeric literal
    Number,
    /// Single or double quoted string
    Str,
    /// Template literal, substitutions included
    Template,
    /// Regular expression literal
    Regex,
    /// Punctuator
    Punct,
}

/// A token with its byte span in the scanned source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    /// A line terminator precedes this token (inside whitespace or comments)
    pub newline_before: bool,
}

impl<'a> Token<'a> {
    pub fn is_punct(
        &self,
        text: &str,
    ) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }

    pub fn is_ident(
        &self,
        text: &str,
    ) -> bool {
        self.kind == TokenKind::Ident && self.text == text
    }

    pub fn is_opener(&self) -> bool {
        self.kind == TokenKind::Punct && matches!(self.text, "(" | "[" | "{")
    }

    pub fn is_closer(&self) -> bool {
        self.kind == TokenKind::Punct && matches!(self.text, ")" | "]" | "}")
    }
}

/// Punctuators, longest first so scanning is greedy
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>",
];

/// Keywords after which a `/` starts a regular expression
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

pub fn is_ident_start(c: char) -> bool {
    c == '$' || c == '_' || is_xid_start(c)
}

pub fn is_ident_continue(c: char) -> bool {
    c == '$' || c == '\u{200c}' || c == '\u{200d}' || is_xid_continue(c)
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Scan `source` into tokens.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    Scanner::new(source).run()
}

/// Source of each `${...}` substitution of a template literal token.
/// Substitutions of nested templates stay inside their enclosing one.
pub fn template_substitutions(template: &str) -> Vec<&str> {
    let mut scanner = Scanner::new(template);
    let mut substitutions = Vec::new();
    if scanner.bump() != Some('`') {
        return substitutions;
    }
    while let Some(c) = scanner.bump() {
        match c {
            '\\' => {
                scanner.bump();
            }
            '`' => break,
            '$' if scanner.peek() == Some('{') => {
                scanner.bump();
                let start = scanner.pos;
                let end = if scanner.scan_substitution() {
                    scanner.pos - 1
                } else {
                    scanner.pos
                };
                substitutions.push(&template[start..end]);
            }
            _ => {}
        }
    }
    substitutions
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(
        &self,
        offset: usize,
    ) -> Option<char> {
        self.src[self.pos..].chars().nth(offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn run(mut self) -> Vec<Token<'a>> {
        loop {
            let newline_before = self.skip_trivia();
            let Some(c) = self.peek() else {
                break;
            };
            let start = self.pos;
            let kind = self.scan_token(c);
            self.tokens.push(Token {
                kind,
                text: &self.src[start..self.pos],
                start,
                end: self.pos,
                newline_before,
            });
        }
        self.tokens
    }

    /// Skip whitespace and comments, reporting whether a line break was crossed
    fn skip_trivia(&mut self) -> bool {
        let mut newline = false;
        while let Some(c) = self.peek() {
            if is_line_terminator(c) {
                newline = true;
                self.bump();
            } else if c.is_whitespace() || c == '\u{feff}' {
                self.bump();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if is_line_terminator(c) {
                        break;
                    }
                    self.bump();
                }
            } else if c == '/' && self.peek_at(1) == Some('*') {
                self.pos += 2;
                loop {
                    match self.bump() {
                        None => break,
                        Some('*') if self.peek() == Some('/') => {
                            self.bump();
                            break;
                        }
                        Some(c) if is_line_terminator(c) => newline = true,
                        Some(_) => {}
                    }
                }
            } else {
                break;
            }
        }
        newline
    }

    fn scan_token(
        &mut self,
        c: char,
    ) -> TokenKind {
        if is_ident_start(c) || (c == '#' && self.peek_at(1).is_some_and(is_ident_start)) {
            self.bump();
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            return TokenKind::Ident;
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
        {
            let start = self.pos;
            self.bump();
            while let Some(d) = self.peek() {
                let scanned = &self.src[start..self.pos];
                let exponent_sign = matches!(d, '+' | '-')
                    && scanned.ends_with(['e', 'E'])
                    && !scanned.starts_with("0x")
                    && !scanned.starts_with("0X");
                if d.is_ascii_alphanumeric() || d == '.' || d == '_' || exponent_sign {
                    self.bump();
                } else {
                    break;
                }
            }
            return TokenKind::Number;
        }

        match c {
            '\'' | '"' => {
                self.scan_string(c);
                TokenKind::Str
            }
            '`' => {
                self.bump();
                self.scan_template_rest();
                TokenKind::Template
            }
            '/' if self.regex_allowed() => {
                if self.scan_regex() {
                    TokenKind::Regex
                } else {
                    self.bump();
                    TokenKind::Punct
                }
            }
            _ => {
                let rest = &self.src[self.pos..];
                let len = PUNCTUATORS
                    .iter()
                    .find(|p| rest.starts_with(**p))
                    .map(|p| p.len())
                    .unwrap_or(c.len_utf8());
                self.pos += len;
                TokenKind::Punct
            }
        }
    }

    fn scan_string(
        &mut self,
        quote: char,
    ) {
        self.bump();
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                c if c == quote => return,
                c if c == '\n' => return,
                _ => {}
            }
        }
    }

    /// Scan after the opening backtick up to and including the closing one
    fn scan_template_rest(&mut self) {
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '`' => return,
                '$' if self.peek() == Some('{') => {
                    self.bump();
                    self.scan_substitution();
                }
                _ => {}
            }
        }
    }

    /// Scan a `${ ... }` body, honouring nested braces, strings and templates.
    /// Returns whether the closing brace was found.
    fn scan_substitution(&mut self) -> bool {
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            match c {
                '{' => {
                    depth += 1;
                    self.bump();
                }
                '}' => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return true;
                    }
                }
                '\'' | '"' => self.scan_string(c),
                '`' => {
                    self.bump();
                    self.scan_template_rest();
                }
                _ => {
                    self.bump();
                }
            }
        }
        false
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(prev) => match prev.kind {
                TokenKind::Punct => !matches!(prev.text, ")" | "]" | "++" | "--"),
                TokenKind::Ident => REGEX_PRECEDING_KEYWORDS.contains(&prev.text),
                _ => false,
            },
        }
    }

    /// Scan a regex literal; on a line break before the closing slash the
    /// position is restored and `false` returned.
    fn scan_regex(&mut self) -> bool {
        let start = self.pos;
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                None => break,
                Some(c) if is_line_terminator(c) => break,
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => {
                    while self.peek().is_some_and(is_ident_continue) {
                        self.bump();
                    }
                    return true;
                }
                Some(_) => {}
            }
        }
        self.pos = start;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<&str> {
        tokenize(source).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_identifiers_and_punctuators() {
        assert_eq!(
            texts("const x = a?.b ?? 1;"),
            vec!["const", "x", "=", "a", "?.", "b", "??", "1", ";"]
        );
        assert_eq!(texts("(a) => { ...b }"), vec!["(", "a", ")", "=>", "{", "...", "b", "}"]);
    }

    #[test]
    fn test_strings_hide_keywords() {
        let tokens = tokenize(r#"log('await x', "it's")"#);
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].text, "'await x'");
        assert_eq!(tokens[4].text, r#""it's""#);
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("a /* await */ b // await\nc");
        let names: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(!tokens[1].newline_before);
        assert!(tokens[2].newline_before);
    }

    #[test]
    fn test_newline_inside_block_comment() {
        let tokens = tokenize("a /*\n*/ b");
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn test_template_with_substitution() {
        let tokens = tokenize("`a ${ {b: `c${d}`}.b } e` + 1");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, TokenKind::Template);
        assert_eq!(tokens[2].text, "1");
    }

    #[test]
    fn test_template_substitution_sources() {
        assert_eq!(
            template_substitutions("`a ${x} b ${ {k: `${y}`}.k } c`"),
            vec!["x", " {k: `${y}`}.k "]
        );
        assert_eq!(template_substitutions("`\\${no} ${yes}`"), vec!["yes"]);
        assert_eq!(template_substitutions("`open ${tail"), vec!["tail"]);
        assert!(template_substitutions("`plain`").is_empty());
    }

    #[test]
    fn test_regex_versus_division() {
        let tokens = tokenize("x = /a[/]b/g.test(y) / 2");
        assert_eq!(tokens[2].kind, TokenKind::Regex);
        assert_eq!(tokens[2].text, "/a[/]b/g");
        let division = tokens.iter().filter(|t| t.is_punct("/")).count();
        assert_eq!(division, 1);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("1e-3 + .5 + 0xff"), vec!["1e-3", "+", ".5", "+", "0xff"]);
    }

    #[test]
    fn test_unterminated_input_does_not_panic() {
        assert_eq!(tokenize("'abc").len(), 1);
        assert_eq!(tokenize("`abc ${").len(), 1);
        assert_eq!(tokenize("a /* b").len(), 1);
    }

    #[test]
    fn test_unicode_identifiers() {
        assert_eq!(texts("const 名前 = $x"), vec!["const", "名前", "=", "$x"]);
    }
}
