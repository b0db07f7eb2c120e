//! Header-level Cadence parser.
//!
//! Only the parts of a program that ChainFlow needs are modelled: import
//! declarations, top-level function signatures, and transaction declarations
//! (their parameter lists and `prepare` parameters). Bodies are skipped, but
//! the whole input is tokenized so unterminated literals and unbalanced
//! delimiters are still reported as [`ParseError`]s.

use crate::error::ParseError;
use crate::types::{Address, TypeAnnotation};

/// Name of the designated script entry point.
pub const ENTRY_POINT: &str = "main";

// ─── Syntax tree ──────────────────────────────────────────────────────────────

/// One declared parameter, e.g. `to recipient: Address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Argument label, when one precedes the name (`_` included).
    pub label: Option<String>,
    pub name: String,
    pub type_annotation: TypeAnnotation,
}

/// Where an import is resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportLocation {
    /// `import X from 0x01`
    Address(Address),
    /// `import "X"` / `import X from "./X.cdc"`
    String(String),
    /// `import X`
    Identifier(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDeclaration {
    pub identifiers: Vec<String>,
    pub location: ImportLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionDeclaration {
    pub parameters: Vec<Parameter>,
    /// Parameters of the `prepare` block; one per authorizer.
    pub prepare_parameters: Vec<Parameter>,
}

/// The declarations of a parsed program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub imports: Vec<ImportDeclaration>,
    pub functions: Vec<FunctionDeclaration>,
    pub transactions: Vec<TransactionDeclaration>,
}

impl Program {
    /// The top-level `main` function, if any.
    pub fn entry_point(&self) -> Option<&FunctionDeclaration> {
        self.functions.iter().find(|f| f.name == ENTRY_POINT)
    }

    /// Parameters an invocation of this program must be given.
    ///
    /// A program with exactly one transaction uses that transaction's
    /// parameters; otherwise the entry point's; otherwise none.
    pub fn parameter_list(&self) -> &[Parameter] {
        if let [transaction] = self.transactions.as_slice() {
            return &transaction.parameters;
        }
        self.entry_point()
            .map(|f| f.parameters.as_slice())
            .unwrap_or(&[])
    }

    /// Parameter order and authorizer types, used to name positional arguments.
    pub fn declaration_info(&self) -> DeclarationInfo {
        let authorizers = match self.transactions.as_slice() {
            [transaction] => transaction
                .prepare_parameters
                .iter()
                .map(|p| p.type_annotation.clone())
                .collect(),
            _ => Vec::new(),
        };
        DeclarationInfo {
            parameter_order: self.parameter_list().iter().map(|p| p.name.clone()).collect(),
            authorizers,
        }
    }
}

/// Declared parameter names in order, plus the declared authorizer types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationInfo {
    pub parameter_order: Vec<String>,
    pub authorizers: Vec<TypeAnnotation>,
}

/// Parse source bytes into a [`Program`].
pub fn parse_program(code: &[u8]) -> Result<Program, ParseError> {
    let source = std::str::from_utf8(code).map_err(|e| {
        let (line, column) = position_of(code, e.valid_up_to());
        ParseError::new(line, column, "source is not valid UTF-8")
    })?;
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(source, tokens).parse()
}

fn position_of(code: &[u8], offset: usize) -> (usize, usize) {
    let before = &code[..offset.min(code.len())];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let column = before.iter().rev().take_while(|b| **b != b'\n').count() + 1;
    (line, column)
}

// ─── Lexer ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    /// `0x…` literal, kept as written.
    Hex(String),
    Number,
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next()?;
        if next.1 == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(next)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.source.len())
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek_char() {
            let (line, column) = (self.line, self.column);
            let start = self.offset();

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            let kind = match c {
                '/' if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
                '/' if self.peek_second() == Some('*') => {
                    self.block_comment(line, column)?;
                    continue;
                }
                '"' => TokenKind::Str(self.string_literal(line, column)?),
                c if c.is_ascii_digit() => {
                    self.bump();
                    let is_hex = c == '0' && self.peek_char() == Some('x');
                    while let Some(c) = self.peek_char() {
                        if c.is_ascii_alphanumeric() || c == '_' || (!is_hex && c == '.') {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let end = self.offset();
                    let text = &self.source[start..end];
                    if is_hex {
                        TokenKind::Hex(text.to_string())
                    } else {
                        TokenKind::Number
                    }
                }
                c if c.is_alphabetic() || c == '_' => {
                    while let Some(c) = self.peek_char() {
                        if c.is_alphanumeric() || c == '_' {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let end = self.offset();
                    TokenKind::Ident(self.source[start..end].to_string())
                }
                other => {
                    self.bump();
                    TokenKind::Punct(other)
                }
            };

            tokens.push(Token {
                kind,
                start,
                end: self.offset(),
                line,
                column,
            });
        }
        Ok(tokens)
    }

    fn block_comment(&mut self, line: usize, column: usize) -> Result<(), ParseError> {
        // Block comments nest.
        let mut depth = 0usize;
        loop {
            match (self.peek_char(), self.peek_second()) {
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    depth += 1;
                }
                (Some('*'), Some('/')) => {
                    self.bump();
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                (Some(_), _) => {
                    self.bump();
                }
                (None, _) => {
                    return Err(ParseError::new(line, column, "unterminated block comment"));
                }
            }
        }
    }

    fn string_literal(&mut self, line: usize, column: usize) -> Result<String, ParseError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some((_, '"')) => return Ok(out),
                Some((_, '\\')) => match self.bump() {
                    Some((_, '\n')) | None => break,
                    Some((_, escaped)) => {
                        out.push('\\');
                        out.push(escaped);
                    }
                },
                Some((_, '\n')) | None => break,
                Some((_, c)) => out.push(c),
            }
        }
        Err(ParseError::new(line, column, "unterminated string literal"))
    }
}

// ─── Parser ───────────────────────────────────────────────────────────────────

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Open delimiters, for balance checking.
    open: Vec<Token>,
    program: Program,
    /// Set between a transaction header and its opening brace.
    transaction_pending: bool,
    /// Nesting depth of the current transaction body, if inside one.
    transaction_body: Option<usize>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            open: Vec::new(),
            program: Program::default(),
            transaction_pending: false,
            transaction_body: None,
        }
    }

    fn parse(mut self) -> Result<Program, ParseError> {
        while let Some(token) = self.next() {
            let top_level = self.open.is_empty();
            match token.kind.clone() {
                TokenKind::Punct(c @ ('{' | '(' | '[')) => {
                    if c == '{' && top_level && self.transaction_pending {
                        self.transaction_pending = false;
                        self.transaction_body = Some(1);
                    }
                    self.open.push(token);
                }
                TokenKind::Punct(c @ ('}' | ')' | ']')) => self.close(&token, c)?,
                TokenKind::Ident(word) if top_level => match word.as_str() {
                    "import" => self.import(&token)?,
                    "fun" => self.function()?,
                    "transaction" if self.peek_punct('(') || self.peek_punct('{') => {
                        let parameters = if self.peek_punct('(') {
                            self.parameter_list()?
                        } else {
                            Vec::new()
                        };
                        self.program.transactions.push(TransactionDeclaration {
                            parameters,
                            prepare_parameters: Vec::new(),
                        });
                        self.transaction_pending = true;
                    }
                    _ => {}
                },
                TokenKind::Ident(word)
                    if word == "prepare"
                        && self.transaction_body == Some(self.open.len())
                        && self.peek_punct('(') =>
                {
                    let parameters = self.parameter_list()?;
                    if let Some(transaction) = self.program.transactions.last_mut() {
                        transaction.prepare_parameters = parameters;
                    }
                }
                _ => {}
            }
        }

        if let Some(unclosed) = self.open.last() {
            return Err(ParseError::new(
                unclosed.line,
                unclosed.column,
                format!("unclosed delimiter {:?}", punct_of(unclosed).unwrap_or(' ')),
            ));
        }
        Ok(self.program)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Punct(p), .. }) if *p == c)
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Ident(w), .. }) if w == word)
    }

    fn close(&mut self, token: &Token, c: char) -> Result<(), ParseError> {
        let expected = match c {
            '}' => '{',
            ')' => '(',
            _ => '[',
        };
        match self.open.pop() {
            Some(open) if punct_of(&open) == Some(expected) => {
                if self.transaction_body.is_some_and(|depth| self.open.len() < depth) {
                    self.transaction_body = None;
                }
                Ok(())
            }
            Some(open) => Err(ParseError::new(
                token.line,
                token.column,
                format!(
                    "mismatched {c:?}: delimiter opened at {}:{} is {:?}",
                    open.line,
                    open.column,
                    punct_of(&open).unwrap_or(' ')
                ),
            )),
            None => Err(ParseError::new(
                token.line,
                token.column,
                format!("unexpected closing {c:?}"),
            )),
        }
    }

    fn import(&mut self, keyword: &Token) -> Result<(), ParseError> {
        let mut identifiers = Vec::new();

        let location = loop {
            let token = self
                .next()
                .ok_or_else(|| error_at(keyword, "expected import location"))?;
            match &token.kind {
                TokenKind::Str(path) if identifiers.is_empty() => {
                    break ImportLocation::String(path.clone())
                }
                TokenKind::Hex(literal) if identifiers.is_empty() => {
                    break ImportLocation::Address(address_literal(&token, literal)?)
                }
                TokenKind::Ident(name) => {
                    identifiers.push(name.clone());
                    if self.peek_punct(',') {
                        self.pos += 1;
                        continue;
                    }
                    if self.peek_ident("from") {
                        self.pos += 1;
                        break self.import_location(keyword)?;
                    }
                    if identifiers.len() == 1 {
                        let name = identifiers.remove(0);
                        break ImportLocation::Identifier(name);
                    }
                    return Err(error_at(&token, "expected 'from' after import list"));
                }
                _ => return Err(error_at(&token, "malformed import declaration")),
            }
        };

        self.program.imports.push(ImportDeclaration {
            identifiers,
            location,
        });
        Ok(())
    }

    fn import_location(&mut self, keyword: &Token) -> Result<ImportLocation, ParseError> {
        let token = self
            .next()
            .ok_or_else(|| error_at(keyword, "expected import location"))?;
        match &token.kind {
            TokenKind::Hex(literal) => Ok(ImportLocation::Address(address_literal(&token, literal)?)),
            TokenKind::Str(path) => Ok(ImportLocation::String(path.clone())),
            TokenKind::Ident(name) => Ok(ImportLocation::Identifier(name.clone())),
            _ => Err(error_at(&token, "expected import location")),
        }
    }

    fn function(&mut self) -> Result<(), ParseError> {
        let name = match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => name.clone(),
            _ => return Ok(()),
        };
        self.pos += 1;
        if !self.peek_punct('(') {
            return Ok(());
        }
        let parameters = self.parameter_list()?;
        self.program.functions.push(FunctionDeclaration { name, parameters });
        Ok(())
    }

    /// Parse `( param, ... )`; the next token must be the opening paren.
    fn parameter_list(&mut self) -> Result<Vec<Parameter>, ParseError> {
        let open = self.next().ok_or_else(|| ParseError::new(0, 0, "expected '('"))?;
        let mut parameters = Vec::new();

        if self.peek_punct(')') {
            self.pos += 1;
            return Ok(parameters);
        }

        loop {
            let first = self.expect_ident(&open)?;
            let (label, name) = match self.peek() {
                Some(Token {
                    kind: TokenKind::Ident(second),
                    ..
                }) => {
                    let second = second.clone();
                    self.pos += 1;
                    (Some(first), second)
                }
                _ => (None, first),
            };

            match self.next() {
                Some(Token {
                    kind: TokenKind::Punct(':'),
                    ..
                }) => {}
                Some(other) => return Err(error_at(&other, format!("expected ':' after parameter '{name}'"))),
                None => return Err(error_at(&open, "unterminated parameter list")),
            }

            let (type_annotation, terminator) = self.type_annotation(&open, &name)?;
            parameters.push(Parameter {
                label,
                name,
                type_annotation,
            });

            if terminator == ')' {
                return Ok(parameters);
            }
            if self.peek_punct(')') {
                // Trailing comma.
                self.pos += 1;
                return Ok(parameters);
            }
        }
    }

    /// Consume a type up to a top-level `,` or `)`, returning the terminator.
    fn type_annotation(&mut self, open: &Token, name: &str) -> Result<(TypeAnnotation, char), ParseError> {
        let mut depth = 0usize;
        let mut span: Option<(usize, usize)> = None;

        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::Punct(c @ (',' | ')')) if depth == 0 => {
                    let (start, end) = span
                        .ok_or_else(|| error_at(&token, format!("missing type for parameter '{name}'")))?;
                    let text = self.source[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
                    return Ok((TypeAnnotation::new(text), c));
                }
                TokenKind::Punct('(' | '[' | '{' | '<') => depth += 1,
                TokenKind::Punct(c @ (')' | ']' | '}' | '>')) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| error_at(&token, format!("unexpected {c:?} in type")))?;
                }
                _ => {}
            }
            span = Some((span.map_or(token.start, |(s, _)| s), token.end));
        }

        Err(error_at(open, "unterminated parameter list"))
    }

    fn expect_ident(&mut self, open: &Token) -> Result<String, ParseError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Ok(name),
            Some(other) => Err(error_at(&other, "expected parameter name")),
            None => Err(error_at(open, "unterminated parameter list")),
        }
    }
}

fn punct_of(token: &Token) -> Option<char> {
    match token.kind {
        TokenKind::Punct(c) => Some(c),
        _ => None,
    }
}

fn error_at(token: &Token, reason: impl Into<String>) -> ParseError {
    ParseError::new(token.line, token.column, reason)
}

fn address_literal(token: &Token, literal: &str) -> Result<Address, ParseError> {
    let digits = &literal[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(error_at(token, format!("invalid address literal {literal}")));
    }
    Address::from_hex(literal).map_err(|e| error_at(token, e.to_string()))
}
