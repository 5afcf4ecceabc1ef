//! Type stripping over the token stream.
//!
//! A light recursive walk recognises the places where TypeScript adds syntax
//! on top of JavaScript and records byte-range edits against the original
//! text. Everything it does not recognise is left untouched, so plain
//! JavaScript passes through byte for byte. Removed ranges keep their line
//! breaks, which keeps runtime line numbers pointing at the TypeScript source.

use super::lexer::{tokenize, TokenKind, TokenStream, TranspileError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// Lower TypeScript source to JavaScript.
pub fn lower(source: &str) -> Result<String, TranspileError> {
    let stream = tokenize(source)?;
    let mut lowerer = Lowerer {
        ts: &stream,
        pos: 0,
        edits: Vec::new(),
        namespaces: Vec::new(),
        scope: Vec::new(),
    };
    lowerer.program()?;
    Ok(render(source, lowerer.edits))
}

fn render(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.replacement);
        out.extend(source[edit.start..edit.end].chars().filter(|c| *c == '\n'));
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    out
}

#[derive(Debug, Clone, Copy)]
struct Stops {
    comma: bool,
    colon: bool,
    newline: bool,
}

impl Stops {
    const GROUP: Stops = Stops {
        comma: false,
        colon: false,
        newline: false,
    };
    const STATEMENT: Stops = Stops {
        comma: false,
        colon: false,
        newline: true,
    };
    const DECLARATOR: Stops = Stops {
        comma: true,
        colon: false,
        newline: true,
    };
    const ELEMENT: Stops = Stops {
        comma: true,
        colon: false,
        newline: false,
    };
    const CASE: Stops = Stops {
        comma: false,
        colon: true,
        newline: false,
    };
}

// Identifiers that cannot end an expression
const OPERATOR_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await", "extends", "implements", "as", "satisfies", "if", "while", "for",
    "switch", "let", "const", "var", "export", "import",
];

// Punctuators that continue an expression onto the next line
const CONTINUATION_PUNCT: &[&str] = &[
    ".", "?.", ",", "?", ":", "=", "==", "===", "!=", "!==", "+", "-", "*", "/", "%", "**", "&&",
    "||", "??", "&", "|", "^", "<", ">", "=>", "+=", "-=", "*=", "/=", "%=", "**=", "&=", "|=",
    "^=", "&&=", "||=", "??=", ")", "]", "}", ";",
];

const PARAMETER_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override"];

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "override", "declare", "abstract",
];

struct Lowerer<'s, 'a> {
    ts: &'s TokenStream<'a>,
    pos: usize,
    edits: Vec<Edit>,
    /// Qualified names of namespaces already given a `var`.
    namespaces: Vec<String>,
    /// Enclosing namespaces, outermost first.
    scope: Vec<&'a str>,
}

type Lowered = Result<(), TranspileError>;

impl<'s, 'a> Lowerer<'s, 'a> {
    // ----- token helpers -----

    fn eof(&self) -> bool {
        self.pos >= self.ts.len()
    }

    fn text(&self, i: usize) -> &'a str {
        self.ts.text(i)
    }

    fn kind(&self, i: usize) -> Option<TokenKind> {
        self.ts.tokens.get(i).map(|t| t.kind)
    }

    fn is(&self, i: usize, text: &str) -> bool {
        i < self.ts.len() && self.text(i) == text && self.kind(i) != Some(TokenKind::Str)
    }

    fn at(&self, text: &str) -> bool {
        self.is(self.pos, text)
    }

    fn is_ident(&self, i: usize) -> bool {
        self.kind(i) == Some(TokenKind::Ident)
    }

    fn same_line(&self, i: usize) -> bool {
        self.ts.tokens.get(i).map_or(false, |t| !t.newline_before)
    }

    fn start_of(&self, i: usize) -> usize {
        self.ts
            .tokens
            .get(i)
            .map(|t| t.start)
            .unwrap_or(self.ts.source.len())
    }

    fn end_of(&self, i: usize) -> usize {
        self.ts
            .tokens
            .get(i)
            .map(|t| t.end)
            .unwrap_or(self.ts.source.len())
    }

    fn partner(&self, i: usize) -> Result<usize, TranspileError> {
        self.ts
            .partner(i)
            .ok_or_else(|| self.error(i, format!("Unbalanced '{}'", self.text(i))))
    }

    fn error(&self, i: usize, message: impl Into<String>) -> TranspileError {
        TranspileError::at(self.ts.source, self.start_of(i), message)
    }

    fn unexpected(&self, i: usize, context: &str) -> TranspileError {
        if i >= self.ts.len() {
            self.error(i, format!("Unexpected end of input in {}", context))
        } else {
            self.error(i, format!("Unexpected '{}' in {}", self.text(i), context))
        }
    }

    fn ends_expression(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::Ident) => !OPERATOR_KEYWORDS.contains(&self.text(i)),
            Some(TokenKind::Punct) => matches!(self.text(i), ")" | "]" | "}"),
            Some(_) => true,
            None => false,
        }
    }

    // ----- edits -----

    /// Remove source text, dropping any smaller edits already recorded inside it.
    fn remove_span(&mut self, start: usize, end: usize) {
        self.replace_span(start, end, String::new());
    }

    fn replace_span(&mut self, start: usize, end: usize, replacement: String) {
        // Edits inside the span are superseded; an insertion at its start survives
        self.edits.retain(|e| {
            let inside = e.start >= start && e.end <= end;
            !inside || (e.start == start && e.end == start)
        });
        self.edits.push(Edit {
            start,
            end,
            replacement,
        });
    }

    /// Remove tokens `from..to` (exclusive).
    fn remove_tokens(&mut self, from: usize, to: usize) {
        if to > from {
            self.remove_span(self.start_of(from), self.end_of(to - 1));
        }
    }

    /// Remove a keyword together with the whitespace after it.
    fn remove_keyword(&mut self, i: usize) {
        self.remove_span(self.start_of(i), self.start_of(i + 1));
    }

    fn insert(&mut self, at: usize, text: String) {
        self.edits.push(Edit {
            start: at,
            end: at,
            replacement: text,
        });
    }

    // ----- type skipping (pure lookahead) -----

    fn skip_type(&self, i: usize) -> Option<usize> {
        let after = self.skip_union(i)?;
        if self.is(after, "extends") && self.same_line(after) {
            let check = self.skip_union(after + 1)?;
            if self.is(check, "?") {
                let yes = self.skip_type(check + 1)?;
                if self.is(yes, ":") {
                    return self.skip_type(yes + 1);
                }
            }
            return None;
        }
        Some(after)
    }

    fn skip_union(&self, mut i: usize) -> Option<usize> {
        if self.is(i, "|") || self.is(i, "&") {
            i += 1;
        }
        i = self.skip_operand(i)?;
        while self.is(i, "|") || self.is(i, "&") {
            i = self.skip_operand(i + 1)?;
        }
        Some(i)
    }

    fn starts_type(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::Punct) => matches!(self.text(i), "(" | "[" | "{" | "<" | "-"),
            Some(_) => true,
            None => false,
        }
    }

    fn skip_operand(&self, i: usize) -> Option<usize> {
        let mut j = match self.text(i) {
            "keyof" | "unique" | "readonly" | "infer" if self.starts_type(i + 1) => {
                return self.skip_operand(i + 1)
            }
            "typeof" if self.is_ident(i + 1) => {
                let mut j = i + 2;
                while self.is(j, ".") && self.is_ident(j + 1) {
                    j += 2;
                }
                if self.is(j, "<") && self.same_line(j) {
                    j = self.skip_type_args(j)?;
                }
                j
            }
            _ => self.skip_primary(i)?,
        };
        while self.is(j, "[") && self.same_line(j) {
            j = self.ts.partner(j)? + 1;
        }
        Some(j)
    }

    fn skip_primary(&self, i: usize) -> Option<usize> {
        match self.kind(i)? {
            TokenKind::Ident => {
                let text = self.text(i);
                if text == "new" && (self.is(i + 1, "(") || self.is(i + 1, "<")) {
                    return self.skip_primary(i + 1);
                }
                if text == "asserts" && self.is_ident(i + 1) && self.same_line(i + 1) {
                    let j = i + 2;
                    return if self.is(j, "is") {
                        self.skip_type(j + 1)
                    } else {
                        Some(j)
                    };
                }
                if self.is(i + 1, "is") && self.same_line(i + 1) {
                    return self.skip_type(i + 2);
                }
                let mut j = i + 1;
                while self.is(j, ".") && self.is_ident(j + 1) {
                    j += 2;
                }
                if self.is(j, "<") && self.same_line(j) {
                    j = self.skip_type_args(j)?;
                }
                Some(j)
            }
            TokenKind::Str | TokenKind::Number | TokenKind::Template => Some(i + 1),
            TokenKind::Regex => None,
            TokenKind::Punct => match self.text(i) {
                "-" if self.kind(i + 1) == Some(TokenKind::Number) => Some(i + 2),
                "(" => {
                    let close = self.ts.partner(i)?;
                    if self.is(close + 1, "=>") {
                        self.skip_type(close + 2)
                    } else {
                        Some(close + 1)
                    }
                }
                "<" => {
                    let open = self.skip_type_params(i)?;
                    if !self.is(open, "(") {
                        return None;
                    }
                    let close = self.ts.partner(open)?;
                    if self.is(close + 1, "=>") {
                        self.skip_type(close + 2)
                    } else {
                        None
                    }
                }
                "{" | "[" => Some(self.ts.partner(i)? + 1),
                _ => None,
            },
        }
    }

    /// `<A, B<C>>` in type-argument position.
    fn skip_type_args(&self, i: usize) -> Option<usize> {
        if !self.is(i, "<") {
            return None;
        }
        let mut j = i + 1;
        loop {
            j = self.skip_type(j)?;
            if self.is(j, ",") {
                j += 1;
                if self.is(j, ">") {
                    return Some(j + 1);
                }
            } else if self.is(j, ">") {
                return Some(j + 1);
            } else {
                return None;
            }
        }
    }

    /// `<T extends U = V, const K>` in declaration position.
    fn skip_type_params(&self, i: usize) -> Option<usize> {
        if !self.is(i, "<") {
            return None;
        }
        let mut j = i + 1;
        loop {
            while matches!(self.text(j), "const" | "in" | "out") && self.is_ident(j + 1) {
                j += 1;
            }
            if !self.is_ident(j) {
                return None;
            }
            j += 1;
            if self.is(j, "extends") {
                j = self.skip_type(j + 1)?;
            }
            if self.is(j, "=") {
                j = self.skip_type(j + 1)?;
            }
            if self.is(j, ",") {
                j += 1;
                if self.is(j, ">") {
                    return Some(j + 1);
                }
            } else if self.is(j, ">") {
                return Some(j + 1);
            } else {
                return None;
            }
        }
    }

    /// At `:`, drop the annotation that follows.
    fn strip_annotation(&mut self) -> Lowered {
        let end = self
            .skip_type(self.pos + 1)
            .ok_or_else(|| self.unexpected(self.pos + 1, "type annotation"))?;
        self.remove_tokens(self.pos, end);
        self.pos = end;
        Ok(())
    }

    /// At `<`, drop a generic parameter list.
    fn strip_type_params(&mut self) -> Lowered {
        let end = self
            .skip_type_params(self.pos)
            .ok_or_else(|| self.unexpected(self.pos + 1, "type parameter list"))?;
        self.remove_tokens(self.pos, end);
        self.pos = end;
        Ok(())
    }

    // ----- statements -----

    fn program(&mut self) -> Lowered {
        while !self.eof() {
            let before = self.pos;
            self.statement()?;
            if self.pos == before {
                self.pos += 1;
            }
        }
        Ok(())
    }

    fn block(&mut self) -> Lowered {
        let close = self.partner(self.pos)?;
        self.pos += 1;
        while self.pos < close {
            let before = self.pos;
            self.statement()?;
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.pos = close + 1;
        Ok(())
    }

    fn statement(&mut self) -> Lowered {
        let start = self.pos;
        let next_is_name = self.is_ident(start + 1) && self.same_line(start + 1);

        if self.kind(start) == Some(TokenKind::Punct) {
            return match self.text(start) {
                "{" => self.block(),
                ";" => {
                    self.pos += 1;
                    Ok(())
                }
                _ => self.expression_statement(),
            };
        }
        if !self.is_ident(start) {
            return self.expression_statement();
        }

        match self.text(start) {
            "if" | "while" | "with" | "switch" if self.is(start + 1, "(") => {
                self.pos += 1;
                self.group()
            }
            "for" => {
                self.pos += 1;
                if self.at("await") {
                    self.pos += 1;
                }
                if self.at("(") {
                    self.group()?;
                }
                Ok(())
            }
            "else" | "do" | "try" | "finally" => {
                self.pos += 1;
                Ok(())
            }
            "catch" => {
                self.pos += 1;
                if self.at("(") {
                    self.parameters()?;
                }
                Ok(())
            }
            "case" => {
                self.pos += 1;
                self.expression(Stops::CASE)?;
                if self.at(":") {
                    self.pos += 1;
                }
                Ok(())
            }
            "default" if self.is(start + 1, ":") => {
                self.pos += 2;
                Ok(())
            }
            "function" => self.function(start, true),
            "async" if self.is(start + 1, "function") && self.same_line(start + 1) => {
                self.pos += 1;
                self.function(start, true)
            }
            "class" => self.class(),
            "abstract" if self.is(start + 1, "class") => {
                self.remove_keyword(start);
                self.pos += 1;
                self.class()
            }
            "const" if self.is(start + 1, "enum") => {
                self.pos += 1;
                self.enumeration(start)
            }
            "let" | "const" | "var"
                if self.is_ident(start + 1) || self.is(start + 1, "{") || self.is(start + 1, "[") =>
            {
                self.declaration()?;
                if self.at(";") {
                    self.pos += 1;
                }
                Ok(())
            }
            "enum" if next_is_name && self.is(start + 2, "{") => self.enumeration(start),
            "namespace" | "module" if next_is_name && self.is(start + 2, "{") => {
                self.namespace(start)
            }
            "namespace" if next_is_name && self.is(start + 2, ".") => Err(self.error(
                start + 2,
                "Dotted namespace names are not supported; nest the namespaces instead",
            )),
            "interface" if next_is_name => self.interface(start),
            "type" if next_is_name && (self.is(start + 2, "=") || self.is(start + 2, "<")) => {
                self.type_alias(start)
            }
            "declare" if next_is_name => self.ambient(start),
            "import" => self.import(start),
            "export" => self.export(start),
            text if self.is(start + 1, ":") && !OPERATOR_KEYWORDS.contains(&text) => {
                // label
                self.pos += 2;
                Ok(())
            }
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> Lowered {
        self.expression(Stops::STATEMENT)?;
        if self.at(";") {
            self.pos += 1;
        }
        Ok(())
    }

    /// A parenthesised header or argument list. Declarations are allowed so
    /// `for (let i: number = 0; ...)` is covered.
    fn group(&mut self) -> Lowered {
        let close = self.partner(self.pos)?;
        self.pos += 1;
        while self.pos < close {
            let before = self.pos;
            if matches!(self.text(self.pos), "let" | "const" | "var")
                && (self.is_ident(self.pos + 1) || self.is(self.pos + 1, "{") || self.is(self.pos + 1, "["))
            {
                self.declaration()?;
            } else {
                self.expression(Stops::GROUP)?;
            }
            if self.at(";") {
                self.pos += 1;
            }
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.pos = close + 1;
        Ok(())
    }

    fn declaration(&mut self) -> Lowered {
        self.pos += 1;
        loop {
            match self.text(self.pos) {
                "{" => self.object()?,
                "[" => self.bracketed()?,
                _ if self.is_ident(self.pos) => self.pos += 1,
                _ => break,
            }
            if self.at("!") && self.is(self.pos + 1, ":") {
                self.remove_tokens(self.pos, self.pos + 1);
                self.pos += 1;
            }
            if self.at(":") {
                self.strip_annotation()?;
            }
            if self.at("=") {
                self.pos += 1;
                self.expression(Stops::DECLARATOR)?;
            }
            if self.at(",") {
                self.pos += 1;
                continue;
            }
            break;
        }
        Ok(())
    }

    /// Scan to the end of a statement without looking inside it.
    fn statement_end(&self, from: usize) -> usize {
        let mut i = from;
        while i < self.ts.len() {
            if self.is(i, ";") {
                return i + 1;
            }
            if i > from && !self.same_line(i) {
                return i;
            }
            i = match self.ts.partner(i) {
                Some(close) if close > i => close + 1,
                _ => i + 1,
            };
        }
        i
    }

    fn import(&mut self, start: usize) -> Lowered {
        let end = self.statement_end(start);
        if self.is(start + 1, "type") && !self.is(start + 2, "=") && !self.is(start + 2, "from") {
            self.remove_tokens(start, end);
            self.pos = end;
            return Ok(());
        }
        // `import { type A, B }` drops the type-only specifiers
        if let Some(open) = (start..end).find(|&i| self.is(i, "{")) {
            let close = self.partner(open)?;
            let mut i = open + 1;
            while i < close {
                if self.is(i, "type") && self.is_ident(i + 1) && !self.is(i + 1, "as") {
                    let mut j = i + 2;
                    if self.is(j, "as") {
                        j += 2;
                    }
                    if self.is(j, ",") {
                        j += 1;
                    }
                    self.remove_span(self.start_of(i), self.start_of(j));
                    i = j;
                } else {
                    i += 1;
                }
            }
        }
        self.pos = end;
        Ok(())
    }

    fn export(&mut self, start: usize) -> Lowered {
        let next = start + 1;
        match self.text(next) {
            "type" if self.is(next + 1, "{") || self.is(next + 1, "*") => {
                let end = self.statement_end(start);
                self.remove_tokens(start, end);
                self.pos = end;
            }
            "{" | "*" | "=" | "as" => self.pos = self.statement_end(start),
            "default" => {
                self.remove_span(self.start_of(start), self.start_of(next + 1));
                self.pos = next + 1;
            }
            _ => {
                self.remove_keyword(start);
                self.pos = next;
            }
        }
        Ok(())
    }

    fn interface(&mut self, start: usize) -> Lowered {
        let mut i = start + 2;
        while !self.is(i, "{") {
            if i >= self.ts.len() {
                return Err(self.unexpected(i, "interface declaration"));
            }
            i = if self.is(i, "<") {
                self.skip_type_params(i)
                    .or_else(|| self.skip_type_args(i))
                    .unwrap_or(i + 1)
            } else {
                i + 1
            };
        }
        let mut end = self.partner(i)? + 1;
        if self.is(end, ";") && self.same_line(end) {
            end += 1;
        }
        self.remove_tokens(start, end);
        self.pos = end;
        Ok(())
    }

    fn type_alias(&mut self, start: usize) -> Lowered {
        let mut i = start + 2;
        if self.is(i, "<") {
            i = self
                .skip_type_params(i)
                .ok_or_else(|| self.unexpected(i + 1, "type parameter list"))?;
        }
        if !self.is(i, "=") {
            return Err(self.unexpected(i, "type alias"));
        }
        let mut end = self
            .skip_type(i + 1)
            .ok_or_else(|| self.unexpected(i + 1, "type alias"))?;
        if self.is(end, ";") {
            end += 1;
        }
        self.remove_tokens(start, end);
        self.pos = end;
        Ok(())
    }

    /// `declare ...` has no runtime presence at all.
    fn ambient(&mut self, start: usize) -> Lowered {
        let mut i = start + 1;
        while i < self.ts.len() {
            if self.is(i, ";") {
                i += 1;
                break;
            }
            if i > start + 1 && !self.same_line(i) {
                let previous = i - 1;
                let continues = self.kind(previous) == Some(TokenKind::Punct)
                    && !matches!(self.text(previous), ")" | "]" | "}" | ">");
                if !continues {
                    break;
                }
            }
            i = match self.ts.partner(i) {
                Some(close) if close > i => close + 1,
                _ => i + 1,
            };
        }
        self.remove_tokens(start, i);
        self.pos = i;
        Ok(())
    }

    // ----- functions -----

    /// At `function`; `start` is where the declaration began (for overloads).
    fn function(&mut self, start: usize, statement_level: bool) -> Lowered {
        self.pos += 1;
        if self.at("*") {
            self.pos += 1;
        }
        if self.is_ident(self.pos) {
            self.pos += 1;
        }
        if self.at("<") {
            self.strip_type_params()?;
        }
        if !self.at("(") {
            return Err(self.unexpected(self.pos, "function declaration"));
        }
        self.parameters()?;
        if self.at(":") {
            self.strip_annotation()?;
        }
        if self.at("{") {
            return self.block();
        }
        if !statement_level {
            return Err(self.unexpected(self.pos, "function expression"));
        }
        // Overload signature
        let end = if self.at(";") { self.pos + 1 } else { self.pos };
        self.remove_tokens(start, end);
        self.pos = end;
        Ok(())
    }

    /// At `(` of a parameter list. Returns the names of constructor
    /// parameter properties (`private x: T`).
    fn parameters(&mut self) -> Result<Vec<String>, TranspileError> {
        let close = self.partner(self.pos)?;
        self.pos += 1;
        let mut properties = Vec::new();
        let mut index = 0;

        while self.pos < close {
            let before = self.pos;
            if index == 0 && self.at("this") && self.is(self.pos + 1, ":") {
                let end = self
                    .skip_type(self.pos + 2)
                    .ok_or_else(|| self.unexpected(self.pos + 2, "parameter list"))?;
                if self.is(end, ",") {
                    self.remove_span(self.start_of(self.pos), self.start_of(end + 1));
                    self.pos = end + 1;
                } else {
                    self.remove_tokens(self.pos, end);
                    self.pos = end;
                }
                index += 1;
                continue;
            }

            let mut is_property = false;
            while PARAMETER_MODIFIERS.contains(&self.text(self.pos))
                && (self.is_ident(self.pos + 1)
                    || matches!(self.text(self.pos + 1), "{" | "[" | "..."))
            {
                is_property = true;
                self.remove_keyword(self.pos);
                self.pos += 1;
            }
            if self.at("...") {
                self.pos += 1;
            }

            let mut name = None;
            match self.text(self.pos) {
                "{" => self.object()?,
                "[" => self.bracketed()?,
                text if self.is_ident(self.pos) => {
                    name = Some(text.to_string());
                    self.pos += 1;
                }
                _ => {}
            }
            if self.at("?") {
                self.remove_tokens(self.pos, self.pos + 1);
                self.pos += 1;
            }
            if self.at(":") {
                self.strip_annotation()?;
            }
            if self.at("=") {
                self.pos += 1;
                self.expression(Stops::ELEMENT)?;
            }
            if let (true, Some(name)) = (is_property, name) {
                properties.push(name);
            }
            if self.at(",") {
                self.pos += 1;
            }
            index += 1;
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.pos = close + 1;
        Ok(properties)
    }

    // ----- expressions -----

    fn expression(&mut self, stops: Stops) -> Lowered {
        let start = self.pos;
        let mut ternary = 0usize;

        while !self.eof() {
            let i = self.pos;
            if i > start && stops.newline && !self.same_line(i) && self.asi_break(i) {
                break;
            }
            let text = self.text(i);
            match self.kind(i) {
                Some(TokenKind::Punct) => match text {
                    ")" | "]" | "}" | ";" => break,
                    "," if stops.comma => break,
                    "?" => {
                        ternary += 1;
                        self.pos += 1;
                    }
                    ":" => {
                        if ternary > 0 {
                            ternary -= 1;
                        } else if stops.colon {
                            break;
                        }
                        self.pos += 1;
                    }
                    "(" => self.paren_or_arrow()?,
                    "[" => self.bracketed()?,
                    "{" => {
                        if i > 0 && self.is(i - 1, "=>") {
                            self.block()?;
                        } else {
                            self.object()?;
                        }
                    }
                    "<" => self.angle()?,
                    "!" if self.is_non_null(i) => {
                        self.remove_tokens(i, i + 1);
                        self.pos += 1;
                    }
                    _ => self.pos += 1,
                },
                Some(TokenKind::Ident) => match text {
                    "function" => self.function(i, false)?,
                    "class" => self.class()?,
                    "as" | "satisfies" if i > start && self.ends_expression(i - 1) && self.same_line(i) => {
                        let end = self
                            .skip_type(i + 1)
                            .ok_or_else(|| self.unexpected(i + 1, "type assertion"))?;
                        self.remove_span(self.end_of(i - 1), self.end_of(end - 1));
                        self.pos = end;
                    }
                    _ => self.pos += 1,
                },
                _ => self.pos += 1,
            }
        }
        Ok(())
    }

    /// Whether a line break before token `i` ends the current expression.
    fn asi_break(&self, i: usize) -> bool {
        let previous = i - 1;
        if !(self.ends_expression(previous) || matches!(self.text(previous), "++" | "--")) {
            return false;
        }
        match self.kind(i) {
            Some(TokenKind::Punct) => !CONTINUATION_PUNCT.contains(&self.text(i)),
            Some(TokenKind::Ident) => {
                !matches!(self.text(i), "as" | "satisfies" | "instanceof" | "in" | "of")
            }
            _ => true,
        }
    }

    fn is_non_null(&self, i: usize) -> bool {
        if i == 0 || self.end_of(i - 1) != self.start_of(i) {
            return false;
        }
        match self.kind(i - 1) {
            Some(TokenKind::Ident) => !OPERATOR_KEYWORDS.contains(&self.text(i - 1)),
            Some(TokenKind::Punct) => matches!(self.text(i - 1), ")" | "]"),
            _ => false,
        }
    }

    fn bracketed(&mut self) -> Lowered {
        let close = self.partner(self.pos)?;
        self.pos += 1;
        while self.pos < close {
            let before = self.pos;
            self.expression(Stops::GROUP)?;
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.pos = close + 1;
        Ok(())
    }

    /// At `(` inside an expression: arrow parameters or a plain group.
    fn paren_or_arrow(&mut self) -> Lowered {
        let close = self.partner(self.pos)?;
        if self.is(close + 1, "=>") {
            self.parameters()?;
            return Ok(());
        }
        if self.is(close + 1, ":") {
            if let Some(end) = self.skip_type(close + 2) {
                if self.is(end, "=>") {
                    self.parameters()?;
                    self.remove_tokens(close + 1, end);
                    self.pos = end;
                    return Ok(());
                }
            }
        }
        self.group()
    }

    /// At `<` inside an expression: call type arguments, a type assertion,
    /// a generic arrow, or a plain comparison.
    fn angle(&mut self) -> Lowered {
        let i = self.pos;
        if i > 0 && self.ends_expression(i - 1) {
            if let Some(end) = self.skip_type_args(i) {
                if self.is(end, "(") || self.kind(end) == Some(TokenKind::Template) {
                    self.remove_tokens(i, end);
                    self.pos = end;
                    return Ok(());
                }
            }
            self.pos += 1;
            return Ok(());
        }
        match self.skip_type_args(i).or_else(|| self.skip_type_params(i)) {
            Some(end) => {
                self.remove_tokens(i, end);
                self.pos = end;
            }
            None => self.pos += 1,
        }
        Ok(())
    }

    /// Object literal or destructuring pattern.
    fn object(&mut self) -> Lowered {
        let close = self.partner(self.pos)?;
        self.pos += 1;
        while self.pos < close {
            let before = self.pos;
            match self.text(self.pos) {
                "," => {
                    self.pos += 1;
                    continue;
                }
                "..." => {
                    self.pos += 1;
                    self.expression(Stops::ELEMENT)?;
                    continue;
                }
                _ => {}
            }

            while (matches!(self.text(self.pos), "async" | "get" | "set")
                && !matches!(self.text(self.pos + 1), "(" | ":" | "," | "}" | "=" | "<"))
                || self.at("*")
            {
                self.pos += 1;
            }

            match self.kind(self.pos) {
                Some(TokenKind::Punct) if self.at("[") => self.bracketed()?,
                Some(TokenKind::Ident | TokenKind::Str | TokenKind::Number) => self.pos += 1,
                _ => {
                    self.expression(Stops::ELEMENT)?;
                    if self.pos == before {
                        self.pos += 1;
                    }
                    continue;
                }
            }

            if self.at("(") || self.at("<") {
                self.method_tail(false, false)?;
            } else if self.at(":") || self.at("=") {
                self.pos += 1;
                self.expression(Stops::ELEMENT)?;
            }
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.pos = close + 1;
        Ok(())
    }

    /// Type parameters, parameters, return type and body of a method. Returns
    /// false if the method had no body (a signature).
    fn method_tail(&mut self, constructor: bool, derived: bool) -> Result<bool, TranspileError> {
        if self.at("<") {
            self.strip_type_params()?;
        }
        if !self.at("(") {
            return Err(self.unexpected(self.pos, "method"));
        }
        let properties = self.parameters()?;
        if self.at(":") {
            self.strip_annotation()?;
        }
        if !self.at("{") {
            return Ok(false);
        }
        if constructor && !properties.is_empty() {
            self.assign_parameter_properties(derived, &properties)?;
        }
        self.block()?;
        Ok(true)
    }

    // ----- classes -----

    /// At `class`.
    fn class(&mut self) -> Lowered {
        self.pos += 1;
        if self.is_ident(self.pos) && !self.at("extends") && !self.at("implements") {
            self.pos += 1;
        }
        if self.at("<") {
            self.strip_type_params()?;
        }
        let derived = self.at("extends");
        if derived {
            self.pos += 1;
            while !self.eof() && !self.at("{") && !self.at("implements") {
                if self.at("<") {
                    match self.skip_type_args(self.pos) {
                        Some(end) => {
                            self.remove_tokens(self.pos, end);
                            self.pos = end;
                        }
                        None => self.pos += 1,
                    }
                } else if self.at("(") {
                    self.group()?;
                } else {
                    self.pos += 1;
                }
            }
        }
        if self.at("implements") {
            let mut end = self.pos + 1;
            loop {
                end = self
                    .skip_type(end)
                    .ok_or_else(|| self.unexpected(end, "implements clause"))?;
                if self.is(end, ",") {
                    end += 1;
                } else {
                    break;
                }
            }
            self.remove_span(self.start_of(self.pos), self.start_of(end));
            self.pos = end;
        }
        if !self.at("{") {
            return Err(self.unexpected(self.pos, "class declaration"));
        }

        let close = self.partner(self.pos)?;
        self.pos += 1;
        while self.pos < close {
            let before = self.pos;
            if self.at(";") {
                self.pos += 1;
                continue;
            }
            self.class_member(derived)?;
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.pos = close + 1;
        Ok(())
    }

    fn member_name_follows(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::Punct) => matches!(self.text(i), "[" | "*"),
            Some(TokenKind::Ident | TokenKind::Str | TokenKind::Number) => true,
            _ => false,
        }
    }

    fn class_member(&mut self, derived: bool) -> Lowered {
        let start = self.pos;

        // Index signature: `[key: string]: T;`
        if self.at("[") && self.is_ident(self.pos + 1) && self.is(self.pos + 2, ":") {
            let mut end = self.partner(self.pos)? + 1;
            if self.is(end, ":") {
                end = self
                    .skip_type(end + 1)
                    .ok_or_else(|| self.unexpected(end + 1, "index signature"))?;
            }
            if self.is(end, ";") {
                end += 1;
            }
            self.remove_tokens(start, end);
            self.pos = end;
            return Ok(());
        }

        let mut bodiless = false;
        loop {
            let text = self.text(self.pos);
            if MEMBER_MODIFIERS.contains(&text) && self.member_name_follows(self.pos + 1) {
                if matches!(text, "declare" | "abstract") {
                    bodiless = true;
                }
                self.remove_keyword(self.pos);
                self.pos += 1;
            } else if text == "static" && self.is(self.pos + 1, "{") {
                self.pos += 1;
                return self.block();
            } else if matches!(text, "static" | "async" | "get" | "set" | "accessor")
                && self.member_name_follows(self.pos + 1)
            {
                self.pos += 1;
            } else if text == "*" {
                self.pos += 1;
            } else {
                break;
            }
        }

        let mut key = "";
        match self.kind(self.pos) {
            Some(TokenKind::Punct) if self.at("[") => self.bracketed()?,
            Some(TokenKind::Ident | TokenKind::Str | TokenKind::Number) => {
                key = self.text(self.pos);
                self.pos += 1;
            }
            _ => return Err(self.unexpected(self.pos, "class body")),
        }
        if self.at("?") || self.at("!") {
            self.remove_tokens(self.pos, self.pos + 1);
            self.pos += 1;
        }

        if self.at("(") || self.at("<") {
            let constructor = key == "constructor";
            if !self.method_tail(constructor, derived)? {
                let end = if self.at(";") { self.pos + 1 } else { self.pos };
                self.remove_tokens(start, end);
                self.pos = end;
            }
            return Ok(());
        }

        if self.at(":") {
            self.strip_annotation()?;
        }
        if self.at("=") {
            self.pos += 1;
            self.expression(Stops::STATEMENT)?;
        }
        if self.at(";") {
            self.pos += 1;
        }
        if bodiless {
            self.remove_tokens(start, self.pos);
        }
        Ok(())
    }

    /// At the `{` of a constructor body: add `this.x = x;` for each
    /// parameter property, after `super(...)` in derived classes.
    fn assign_parameter_properties(&mut self, derived: bool, names: &[String]) -> Lowered {
        let open = self.pos;
        let close = self.partner(open)?;
        let mut at = self.end_of(open);
        if derived {
            let mut i = open + 1;
            while i < close {
                if self.is(i, "super") && self.is(i + 1, "(") {
                    let call_close = self.partner(i + 1)?;
                    at = self.end_of(call_close);
                    if self.is(call_close + 1, ";") {
                        at = self.end_of(call_close + 1);
                    }
                    break;
                }
                i = match self.ts.partner(i) {
                    Some(partner) if partner > i => partner + 1,
                    _ => i + 1,
                };
            }
        }
        let assignments: String = names
            .iter()
            .map(|name| format!(" this.{0} = {0};", name))
            .collect();
        self.insert(at, assignments);
        Ok(())
    }

    // ----- enums -----

    /// At `enum`; `start` covers any leading `const`.
    fn enumeration(&mut self, start: usize) -> Lowered {
        self.pos += 1;
        if !self.is_ident(self.pos) {
            return Err(self.unexpected(self.pos, "enum declaration"));
        }
        let name = self.text(self.pos);
        self.pos += 1;
        if !self.at("{") {
            return Err(self.unexpected(self.pos, "enum declaration"));
        }
        let close = self.partner(self.pos)?;

        let mut body = String::new();
        let mut members: Vec<&str> = Vec::new();
        let mut next = AutoValue::Number(0.0);
        let mut i = self.pos + 1;

        while i < close {
            if self.is(i, ",") {
                i += 1;
                continue;
            }
            let member = match self.kind(i) {
                Some(TokenKind::Ident) => self.text(i),
                Some(TokenKind::Str) => {
                    let quoted = self.text(i);
                    &quoted[1..quoted.len() - 1]
                }
                _ => return Err(self.unexpected(i, "enum body")),
            };
            let key = serde_json::to_string(member).unwrap_or_else(|_| format!("\"{}\"", member));
            i += 1;

            if self.is(i, "=") {
                let value_start = i + 1;
                let mut value_end = value_start;
                while value_end < close && !self.is(value_end, ",") {
                    value_end = match self.ts.partner(value_end) {
                        Some(partner) if partner > value_end => partner + 1,
                        _ => value_end + 1,
                    };
                }
                if value_end == value_start {
                    return Err(self.unexpected(value_start, "enum member initializer"));
                }
                i = value_end;

                let single = value_end - value_start == 1;
                if single
                    && matches!(self.kind(value_start), Some(TokenKind::Str | TokenKind::Template))
                {
                    body.push_str(&format!("{}[{}] = {}; ", name, key, self.text(value_start)));
                    next = AutoValue::None;
                } else if let Some(value) = self.numeric_literal(value_start, value_end) {
                    body.push_str(&numeric_member(name, &key, &format_number(value)));
                    next = AutoValue::Number(value + 1.0);
                } else {
                    let expression = self.qualify_members(value_start, value_end, name, &members);
                    body.push_str(&numeric_member(name, &key, &expression));
                    next = AutoValue::After(key.clone());
                }
            } else {
                match &next {
                    AutoValue::Number(value) => {
                        body.push_str(&numeric_member(name, &key, &format_number(*value)));
                        next = AutoValue::Number(value + 1.0);
                    }
                    AutoValue::After(previous) => {
                        let expression = format!("{}[{}] + 1", name, previous);
                        body.push_str(&numeric_member(name, &key, &expression));
                        next = AutoValue::After(key.clone());
                    }
                    AutoValue::None => {
                        return Err(self.error(i - 1, "Enum member must have initializer"))
                    }
                }
            }
            members.push(member);
        }

        let replacement = format!(
            "var {0}; (function ({0}) {{ {1}}})({0} || ({0} = {{}}));",
            name, body
        );
        self.replace_span(self.start_of(start), self.end_of(close), replacement);
        self.pos = close + 1;
        Ok(())
    }

    // ----- namespaces -----

    /// At `namespace Name {`. The body becomes a function over the namespace
    /// object, and each exported declaration is copied onto that object
    /// right after it.
    fn namespace(&mut self, start: usize) -> Lowered {
        let name = self.text(start + 1);
        let open = start + 2;
        let close = self.partner(open)?;

        let qualified = self
            .scope
            .iter()
            .chain(std::iter::once(&name))
            .copied()
            .collect::<Vec<_>>()
            .join(".");
        let declare = if self.namespaces.contains(&qualified) {
            String::new()
        } else {
            self.namespaces.push(qualified);
            format!("var {}; ", name)
        };
        self.replace_span(
            self.start_of(start),
            self.start_of(open),
            format!("{}(function ({}) ", declare, name),
        );

        self.scope.push(name);
        self.pos = open + 1;
        while self.pos < close {
            let before = self.pos;
            let exporting = self.at("export");
            self.statement()?;
            if exporting && self.pos == before + 1 {
                // Only the keyword went; lower the declaration it marked
                self.statement()?;
            }
            if self.pos == before {
                self.pos += 1;
                continue;
            }
            if exporting && self.pos > before + 1 {
                let exported = self.exported_names(before + 1, self.pos);
                if !exported.is_empty() {
                    let last = self.pos - 1;
                    // A variable declaration may end without a semicolon
                    let unterminated = matches!(self.text(before + 1), "const" | "let" | "var")
                        && !self.is(before + 2, "enum")
                        && !self.is(last, ";");
                    let mut copies = if unterminated { ";".to_string() } else { String::new() };
                    for local in exported {
                        copies.push_str(&format!(" {0}.{1} = {1};", name, local));
                    }
                    self.insert(self.end_of(last), copies);
                }
            }
        }
        self.scope.pop();

        self.insert(
            self.end_of(close),
            format!(")({0} || ({0} = {{}}));", name),
        );
        self.pos = close + 1;
        Ok(())
    }

    /// Runtime names bound by the declaration in tokens `from..to`, the part
    /// after `export`. Type-only declarations bind nothing.
    fn exported_names(&self, from: usize, to: usize) -> Vec<&'a str> {
        let named = |i: usize| {
            if self.is_ident(i) && i < to {
                vec![self.text(i)]
            } else {
                Vec::new()
            }
        };
        match self.text(from) {
            "function" if self.is(from + 1, "*") => named(from + 2),
            "function" | "class" | "enum" | "namespace" | "module" => named(from + 1),
            "async" if self.is(from + 1, "function") => named(from + 2),
            "abstract" | "const" if self.is(from + 1, "class") || self.is(from + 1, "enum") => {
                named(from + 2)
            }
            "const" | "let" | "var" => {
                // Simple declarators only: the first name, then every name
                // after a top-level comma that is itself declared
                let mut names = named(from + 1);
                let mut i = from + 1;
                while i < to {
                    if self.is(i, ",")
                        && self.is_ident(i + 1)
                        && (i + 2 >= to || matches!(self.text(i + 2), "=" | ":" | "," | ";" | "!"))
                    {
                        names.push(self.text(i + 1));
                    }
                    i = match self.ts.partner(i) {
                        Some(close) if close > i => close + 1,
                        _ => i + 1,
                    };
                }
                names
            }
            _ => Vec::new(),
        }
    }

    fn numeric_literal(&self, from: usize, to: usize) -> Option<f64> {
        let (negative, at) = if self.is(from, "-") { (true, from + 1) } else { (false, from) };
        if at + 1 != to || self.kind(at) != Some(TokenKind::Number) {
            return None;
        }
        let text = self.text(at).replace('_', "");
        let lower = text.to_ascii_lowercase();
        let value = if let Some(hex) = lower.strip_prefix("0x") {
            i64::from_str_radix(hex, 16).ok()? as f64
        } else if let Some(octal) = lower.strip_prefix("0o") {
            i64::from_str_radix(octal, 8).ok()? as f64
        } else if let Some(binary) = lower.strip_prefix("0b") {
            i64::from_str_radix(binary, 2).ok()? as f64
        } else {
            text.parse::<f64>().ok()?
        };
        Some(if negative { -value } else { value })
    }

    /// Source of tokens `from..to` with bare references to earlier members
    /// rewritten to `Enum.member`.
    fn qualify_members(&self, from: usize, to: usize, name: &str, members: &[&str]) -> String {
        let mut out = String::new();
        for i in from..to {
            if i > from {
                out.push_str(&self.ts.source[self.end_of(i - 1)..self.start_of(i)]);
            }
            let text = self.text(i);
            let qualifies = self.is_ident(i) && members.contains(&text) && !(i > from && self.is(i - 1, "."));
            if qualifies {
                out.push_str(&format!("{}.{}", name, text));
            } else {
                out.push_str(text);
            }
        }
        out
    }
}

enum AutoValue {
    Number(f64),
    After(String),
    None,
}

fn numeric_member(name: &str, key: &str, value: &str) -> String {
    format!("{0}[{0}[{1}] = {2}] = {1}; ", name, key, value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lowered(source: &str) -> String {
        lower(source).unwrap()
    }

    #[test]
    fn test_plain_javascript_is_untouched() {
        let source = "const a = b < c ? d : e;\nfor (let i = 0; i < n; i++) { x = y > 2 && z; }\nlabel: while (x) { break label; }\nconst r = /a<b>/g;";
        assert_eq!(lowered(source), source);
    }

    #[test]
    fn test_variable_and_function_annotations() {
        assert_eq!(
            lowered("let count: number = 5;\nfunction add(a: number, b?: number): number { return a + (b ?? 0); }"),
            "let count = 5;\nfunction add(a, b) { return a + (b ?? 0); }"
        );
        assert_eq!(
            lowered("const names: Array<string> = [], lookup: Map<string, number[]> = new Map();"),
            "const names = [], lookup = new Map();"
        );
    }

    #[test]
    fn test_interfaces_and_aliases_keep_line_count() {
        let source = "interface User {\n  name: string;\n  age: number;\n}\ntype Id = string | number;\nconst u = 1;";
        assert_eq!(lowered(source), "\n\n\n\n\nconst u = 1;");
    }

    #[test]
    fn test_arrow_functions() {
        assert_eq!(
            lowered("const double = (x: number): number => x * 2;"),
            "const double = (x) => x * 2;"
        );
        assert_eq!(
            lowered("items.map((item: Item, i: number) => item.id + i);"),
            "items.map((item, i) => item.id + i);"
        );
        assert_eq!(
            lowered("const id = <T,>(value: T): T => value;"),
            "const id = (value) => value;"
        );
        assert_eq!(
            lowered("const pick = ({ a, b }: Props) => a;"),
            "const pick = ({ a, b }) => a;"
        );
    }

    #[test]
    fn test_ternary_with_parentheses_is_not_an_arrow() {
        let source = "const v = ok ? (a) : b;";
        assert_eq!(lowered(source), source);
    }

    #[test]
    fn test_assertions_and_non_null() {
        assert_eq!(lowered("const el = document.getElementById('x')!;"), "const el = document.getElementById('x');");
        assert_eq!(lowered("const n = (value as unknown as number) + 1;"), "const n = (value) + 1;");
        assert_eq!(lowered("const cfg = { a: 1 } as const;"), "const cfg = { a: 1 };");
        assert_eq!(lowered("const s = <string>input;"), "const s = input;");
        assert_eq!(lowered("user!.name"), "user.name");
        assert_eq!(lowered("if (!done) go();"), "if (!done) go();");
    }

    #[test]
    fn test_generic_calls_and_declarations() {
        assert_eq!(
            lowered("const m = new Map<string, Array<number>>();"),
            "const m = new Map();"
        );
        assert_eq!(
            lowered("function first<T extends object = {}>(xs: T[]): T | undefined { return xs[0]; }"),
            "function first(xs) { return xs[0]; }"
        );
        assert_eq!(lowered("useState<string>('')"), "useState('')");
    }

    #[test]
    fn test_classes() {
        let source = "abstract class Shape implements Drawable, Named {\n  private readonly id: string;\n  static count: number = 0;\n  abstract area(): number;\n  constructor(public name: string, private size?: number) {}\n  describe(): string { return this.name; }\n}";
        let expected = "class Shape {\n  id;\n  static count = 0;\n  \n  constructor(name, size) { this.name = name; this.size = size;}\n  describe() { return this.name; }\n}";
        assert_eq!(lowered(source), expected);
    }

    #[test]
    fn test_parameter_properties_follow_super() {
        let source = "class B extends A<number> { constructor(private x: number) { super(); log(x); } }";
        assert_eq!(
            lowered(source),
            "class B extends A { constructor(x) { super(); this.x = x; log(x); } }"
        );
    }

    #[test]
    fn test_enums() {
        assert_eq!(
            lowered("enum Color { Red, Green = 5, Blue }"),
            "var Color; (function (Color) { Color[Color[\"Red\"] = 0] = \"Red\"; Color[Color[\"Green\"] = 5] = \"Green\"; Color[Color[\"Blue\"] = 6] = \"Blue\"; })(Color || (Color = {}));"
        );
        assert_eq!(
            lowered("const enum Mode { On = \"on\" }"),
            "var Mode; (function (Mode) { Mode[\"On\"] = \"on\"; })(Mode || (Mode = {}));"
        );
        assert_eq!(
            lowered("enum Flags { A = 1, B = A << 1, C }"),
            "var Flags; (function (Flags) { Flags[Flags[\"A\"] = 1] = \"A\"; Flags[Flags[\"B\"] = Flags.A << 1] = \"B\"; Flags[Flags[\"C\"] = Flags[\"B\"] + 1] = \"C\"; })(Flags || (Flags = {}));"
        );
    }

    #[test]
    fn test_namespaces() {
        let source = "namespace Geometry {\n  export const unit: number = 1;\n  export function area(r: number): number { return PI * r * r; }\n  const PI = 3;\n}\nconsole.log(Geometry.area(Geometry.unit));";
        assert_eq!(
            lowered(source),
            "var Geometry; (function (Geometry) {\n  const unit = 1; Geometry.unit = unit;\n  function area(r) { return PI * r * r; } Geometry.area = area;\n  const PI = 3;\n})(Geometry || (Geometry = {}));\nconsole.log(Geometry.area(Geometry.unit));"
        );
        assert_eq!(
            lowered("namespace A { export namespace B { export enum E { X } } }"),
            "var A; (function (A) { var B; (function (B) { var E; (function (E) { E[E[\"X\"] = 0] = \"X\"; })(E || (E = {})); B.E = E; })(B || (B = {})); A.B = B; })(A || (A = {}));"
        );
        assert_eq!(
            lowered("namespace N { export let a = 1, b: number; export interface I {} export type T = string; }"),
            "var N; (function (N) { let a = 1, b; N.a = a; N.b = b;   })(N || (N = {}));"
        );
    }

    #[test]
    fn test_repeated_namespace_declares_once() {
        assert_eq!(
            lowered("namespace N { export const a = 1 }\nnamespace N { export const b = 2 }"),
            "var N; (function (N) { const a = 1; N.a = a; })(N || (N = {}));\n(function (N) { const b = 2; N.b = b; })(N || (N = {}));"
        );
    }

    #[test]
    fn test_dotted_namespace_is_a_transform_fault() {
        let err = lower("namespace A.B {\n}").unwrap_err();
        assert_eq!(
            err.message,
            "Dotted namespace names are not supported; nest the namespaces instead"
        );
        assert_eq!((err.line, err.column), (1, 12));
    }

    #[test]
    fn test_enum_member_after_string_needs_initializer() {
        let err = lower("enum E { A = \"a\", B }").unwrap_err();
        assert_eq!(err.message, "Enum member must have initializer");
    }

    #[test]
    fn test_overloads_declare_and_type_imports() {
        let source = "function f(a: string): void;\nfunction f(a: any) { return a; }\ndeclare const VERSION: string;\nimport type { Foo } from './foo';\nexport const x: number = 1;";
        assert_eq!(
            lowered(source),
            "\nfunction f(a) { return a; }\n\n\nconst x = 1;"
        );
    }

    #[test]
    fn test_object_methods_and_catch() {
        assert_eq!(
            lowered("const o = { get(key: string): number { return 1; }, name: 'x' as string };"),
            "const o = { get(key) { return 1; }, name: 'x' };"
        );
        assert_eq!(
            lowered("try { run(); } catch (e: unknown) { report(e); }"),
            "try { run(); } catch (e) { report(e); }"
        );
    }

    #[test]
    fn test_templates_pass_through() {
        let source = "function greet(user: User): string {\n  return `Hello ${user.name}! You are ${user.age} years old.`;\n}";
        assert_eq!(
            lowered(source),
            "function greet(user) {\n  return `Hello ${user.name}! You are ${user.age} years old.`;\n}"
        );
    }

    #[test]
    fn test_type_errors_are_not_reported() {
        // Lowering never type-checks
        assert_eq!(lowered("const n: number = 'not a number';"), "const n = 'not a number';");
    }

    #[test]
    fn test_lexical_fault_surfaces() {
        let err = lower("const s: string = \"open;\n").unwrap_err();
        assert_eq!(err.message, "Unterminated string literal");
    }
}
