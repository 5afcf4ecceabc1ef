//! Tokenizer for TypeScript source.
//!
//! Produces just enough structure for type stripping: identifiers, literals
//! and punctuators with byte spans, a newline flag for ASI decisions, and the
//! partner index of every `(`, `[` and `{`. Comments are skipped, template
//! literals are single opaque tokens, and `<` / `>` are always emitted one
//! character at a time so nested generic lists close cleanly.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Template,
    Regex,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub newline_before: bool,
}

/// A lexical or structural fault, positioned at a 1-based line and column.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({line}:{column})")]
pub struct TranspileError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl TranspileError {
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map(|tail| tail.chars().count())
            .unwrap_or(0)
            + 1;
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

#[derive(Debug)]
pub struct TokenStream<'a> {
    pub source: &'a str,
    pub tokens: Vec<Token>,
    partners: Vec<Option<usize>>,
}

impl<'a> TokenStream<'a> {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn text(&self, index: usize) -> &'a str {
        self.tokens
            .get(index)
            .and_then(|t| self.source.get(t.start..t.end))
            .unwrap_or("")
    }

    /// Index of the bracket matching the opener at `index`.
    pub fn partner(&self, index: usize) -> Option<usize> {
        self.partners.get(index).copied().flatten()
    }
}

// Operators that may precede an expression, so a following `/` opens a regex
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

// Longest first; `<` and `>` never start a multi-character punctuator
const PUNCTUATORS: &[&str] = &[
    "...", "===", "!==", "**=", "&&=", "||=", "??=", "=>", "==", "!=", "**", "++", "--", "&&",
    "||", "??", "?.", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
];

pub fn tokenize(source: &str) -> Result<TokenStream<'_>, TranspileError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        lexer.skip_trivia()?;
        if lexer.at_end() {
            break;
        }
        let token = lexer.scan_token()?;
        tokens.push(token);
    }
    let partners = match_brackets(source, &tokens)?;
    Ok(TokenStream {
        source,
        tokens,
        partners,
    })
}

fn match_brackets(source: &str, tokens: &[Token]) -> Result<Vec<Option<usize>>, TranspileError> {
    let mut partners = vec![None; tokens.len()];
    let mut open: Vec<(usize, &str)> = Vec::new();

    for (index, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Punct {
            continue;
        }
        let text = &source[token.start..token.end];
        match text {
            "(" | "[" | "{" => open.push((index, text)),
            ")" | "]" | "}" => {
                let expected = match text {
                    ")" => "(",
                    "]" => "[",
                    _ => "{",
                };
                match open.pop() {
                    Some((opener, opener_text)) if opener_text == expected => {
                        partners[opener] = Some(index);
                        partners[index] = Some(opener);
                    }
                    Some((opener, opener_text)) => {
                        return Err(TranspileError::at(
                            source,
                            token.start,
                            format!(
                                "'{}' does not match '{}' opened at line {}",
                                text,
                                opener_text,
                                TranspileError::at(source, tokens[opener].start, "").line
                            ),
                        ))
                    }
                    None => {
                        return Err(TranspileError::at(
                            source,
                            token.start,
                            format!("Unexpected '{}'", text),
                        ))
                    }
                }
            }
            _ => {}
        }
    }

    if let Some((opener, text)) = open.pop() {
        return Err(TranspileError::at(
            source,
            tokens[opener].start,
            format!("'{}' is never closed", text),
        ));
    }
    Ok(partners)
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    newline: bool,
    // Kind and text of the previous token, for regex detection
    previous: Option<(TokenKind, &'a str)>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        let mut pos = 0;
        if source.starts_with('\u{feff}') {
            pos = '\u{feff}'.len_utf8();
        }
        if source[pos..].starts_with("#!") {
            pos = source[pos..].find('\n').map(|n| pos + n).unwrap_or(source.len());
        }
        Self {
            source,
            bytes: source.as_bytes(),
            pos,
            newline: false,
            previous: None,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error(&self, offset: usize, message: &str) -> TranspileError {
        TranspileError::at(self.source, offset, message)
    }

    fn skip_trivia(&mut self) -> Result<(), TranspileError> {
        while let Some(byte) = self.peek(0) {
            match byte {
                b'\n' => {
                    self.newline = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => {
                    self.pos = self.source[self.pos..]
                        .find('\n')
                        .map(|n| self.pos + n)
                        .unwrap_or(self.bytes.len());
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    let body_start = self.pos + 2;
                    let Some(close) = self.source[body_start..].find("*/") else {
                        return Err(self.error(self.pos, "Unterminated comment"));
                    };
                    if self.source[body_start..body_start + close].contains('\n') {
                        self.newline = true;
                    }
                    self.pos = body_start + close + 2;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_token(&mut self) -> Result<Token, TranspileError> {
        let start = self.pos;
        let newline_before = std::mem::take(&mut self.newline);
        let byte = self.bytes[start];

        let kind = if is_ident_start(byte) || (byte == b'#' && self.peek(1).map_or(false, is_ident_start)) {
            self.pos += 1;
            while self.peek(0).map_or(false, is_ident_part) {
                self.pos += 1;
            }
            TokenKind::Ident
        } else if byte.is_ascii_digit() || (byte == b'.' && self.peek(1).map_or(false, |b| b.is_ascii_digit())) {
            self.scan_number();
            TokenKind::Number
        } else if byte == b'"' || byte == b'\'' {
            self.scan_string(byte)?;
            TokenKind::Str
        } else if byte == b'`' {
            self.scan_template()?;
            TokenKind::Template
        } else if byte == b'/' && self.regex_allowed() {
            self.scan_regex()?;
            TokenKind::Regex
        } else {
            self.scan_punct();
            TokenKind::Punct
        };

        self.previous = Some((kind, &self.source[start..self.pos]));
        Ok(Token {
            kind,
            start,
            end: self.pos,
            newline_before,
        })
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        let radix_prefixed = self.bytes[start] == b'0'
            && matches!(self.peek(1), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B'));
        while let Some(byte) = self.peek(0) {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' {
                self.pos += 1;
            } else if (byte == b'+' || byte == b'-')
                && !radix_prefixed
                && matches!(self.bytes[self.pos - 1], b'e' | b'E')
            {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn scan_string(&mut self, quote: u8) -> Result<(), TranspileError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => return Err(self.error(start, "Unterminated string literal")),
                Some(b'\\') => self.pos += 2,
                Some(byte) if byte == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn scan_template(&mut self) -> Result<(), TranspileError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "Unterminated template literal")),
                Some(b'\\') => self.pos += 2,
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'$') if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.scan_substitution(start)?;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Skip the expression inside `${ ... }`, including nested templates.
    fn scan_substitution(&mut self, template_start: usize) -> Result<(), TranspileError> {
        let mut depth = 0usize;
        self.previous = None;
        loop {
            self.skip_trivia()?;
            match self.peek(0) {
                None => return Err(self.error(template_start, "Unterminated template literal")),
                Some(b'}') if depth == 0 => {
                    self.pos += 1;
                    self.newline = false;
                    return Ok(());
                }
                _ => {
                    let token = self.scan_token()?;
                    match &self.source[token.start..token.end] {
                        "{" => depth += 1,
                        "}" => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                }
            }
        }
    }

    fn regex_allowed(&self) -> bool {
        match self.previous {
            None => true,
            Some((TokenKind::Punct, text)) => !matches!(text, ")" | "]"),
            Some((TokenKind::Ident, text)) => REGEX_PRECEDING_KEYWORDS.contains(&text),
            Some(_) => false,
        }
    }

    fn scan_regex(&mut self) -> Result<(), TranspileError> {
        let start = self.pos;
        self.pos += 1;
        let mut in_class = false;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => {
                    return Err(self.error(start, "Unterminated regular expression"))
                }
                Some(b'\\') => self.pos += 2,
                Some(b'[') => {
                    in_class = true;
                    self.pos += 1;
                }
                Some(b']') => {
                    in_class = false;
                    self.pos += 1;
                }
                Some(b'/') if !in_class => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }
        while self.peek(0).map_or(false, |b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        Ok(())
    }

    fn scan_punct(&mut self) {
        let rest = &self.source[self.pos..];
        if !rest.starts_with('<') && !rest.starts_with('>') {
            for punct in PUNCTUATORS {
                if rest.starts_with(punct) {
                    // `a?.5:b` is a ternary, not optional chaining
                    if *punct == "?." && self.peek(2).map_or(false, |b| b.is_ascii_digit()) {
                        continue;
                    }
                    self.pos += punct.len();
                    return;
                }
            }
        }
        self.pos += rest.chars().next().map(char::len_utf8).unwrap_or(1);
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$' || byte >= 0x80
}

fn is_ident_part(byte: u8) -> bool {
    is_ident_start(byte) || byte.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<String> {
        let stream = tokenize(source).unwrap();
        (0..stream.len()).map(|i| stream.text(i).to_string()).collect()
    }

    #[test]
    fn test_generic_closers_are_split() {
        assert_eq!(
            texts("let a: Array<Array<number>>= x => y;"),
            vec!["let", "a", ":", "Array", "<", "Array", "<", "number", ">", ">", "=", "x", "=>", "y", ";"]
        );
    }

    #[test]
    fn test_comments_and_newlines() {
        let stream = tokenize("a // one\n/* two\n */ b c").unwrap();
        assert_eq!(stream.len(), 3);
        assert!(!stream.tokens[0].newline_before);
        assert!(stream.tokens[1].newline_before);
        assert!(!stream.tokens[2].newline_before);
    }

    #[test]
    fn test_template_is_one_token() {
        assert_eq!(
            texts("`Hello ${user.name} and ${`nested ${ {a: 1}.a }`}!` + 1"),
            vec!["`Hello ${user.name} and ${`nested ${ {a: 1}.a }`}!`", "+", "1"]
        );
    }

    #[test]
    fn test_regex_versus_division() {
        assert_eq!(texts("x = a / b / c"), vec!["x", "=", "a", "/", "b", "/", "c"]);
        assert_eq!(texts("x = /a[/]b/gi.test(s)")[2], "/a[/]b/gi");
        assert_eq!(texts("return /x/")[1], "/x/");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("1e-5 0xFF 1_000 .5 10n"), vec!["1e-5", "0xFF", "1_000", ".5", "10n"]);
    }

    #[test]
    fn test_partners() {
        let stream = tokenize("f(a[0], { b: () => {} })").unwrap();
        assert_eq!(stream.partner(1), Some(stream.len() - 1));
        assert_eq!(stream.text(stream.partner(3).unwrap()), "]");
    }

    #[test]
    fn test_lexical_faults() {
        let err = tokenize("let s = 'open\nnext").unwrap_err();
        assert_eq!(err.to_string(), "Unterminated string literal (1:9)");

        let err = tokenize("a /* never closed").unwrap_err();
        assert_eq!(err.message, "Unterminated comment");

        let err = tokenize("`abc ${x").unwrap_err();
        assert_eq!(err.message, "Unterminated template literal");

        let err = tokenize("function f() {\n  return 1;\n").unwrap_err();
        assert_eq!(err.to_string(), "'{' is never closed (1:14)");

        let err = tokenize("f(a]").unwrap_err();
        assert_eq!(err.message, "']' does not match '(' opened at line 1");

        let err = tokenize("x)").unwrap_err();
        assert_eq!(err.message, "Unexpected ')'");
    }
}
