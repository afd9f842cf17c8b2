//! Formula lexer and recursive-descent parser.
//!
//! References are resolved while parsing, so the tree only ever holds
//! concrete column positions.

use crate::error::{FormulaError, Result};
use crate::expr::{BinaryOperator, ColumnRef, FormulaExpr, RangeRef, SheetScope, UnaryOperator};
use crate::functions::Function;
use crate::refs::{read_reference, RefTarget, Reference, ReferenceResolver};
use recalc_primitives::{CellValue, ErrorValue};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number { value: f64, is_int: bool },
    String(String),
    Identifier(String),
    SheetName(String),
    Error(ErrorValue),
    CellRef(String),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    Percent,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Colon,
    Bang,
    Eof,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) pos: usize,
}

struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> FormulaError {
        FormulaError::malformed(self.input, reason)
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: self.pos,
            });
        };

        let kind = match ch {
            '(' => self.simple(TokenKind::LParen),
            ')' => self.simple(TokenKind::RParen),
            ',' => self.simple(TokenKind::Comma),
            ';' => self.simple(TokenKind::Semicolon),
            '+' => self.simple(TokenKind::Plus),
            '-' => self.simple(TokenKind::Minus),
            '*' => self.simple(TokenKind::Star),
            '/' => self.simple(TokenKind::Slash),
            '^' => self.simple(TokenKind::Caret),
            '&' => self.simple(TokenKind::Ampersand),
            '%' => self.simple(TokenKind::Percent),
            ':' => self.simple(TokenKind::Colon),
            '!' => self.simple(TokenKind::Bang),
            '=' => self.simple(TokenKind::Equal),
            '<' => {
                self.advance();
                if self.consume('=') {
                    TokenKind::LessEqual
                } else if self.consume('>') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                self.advance();
                if self.consume('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '"' => self.quoted('"').map(TokenKind::String)?,
            '\'' => self.quoted('\'').map(TokenKind::SheetName)?,
            '#' => self.error_token()?,
            '.' | '0'..='9' => self.number_token()?,
            '$' | 'A'..='Z' | 'a'..='z' | '_' => self.identifier_or_cell_token()?,
            _ => {
                return Err(self.error(format!("unexpected character '{}' at {}", ch, start)));
            }
        };

        Ok(Token { kind, pos: start })
    }

    fn simple(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Read a `"string"` or `'sheet name'`; a doubled quote escapes itself.
    fn quoted(&mut self, quote: char) -> Result<String> {
        self.advance();
        let mut result = String::new();
        while let Some(ch) = self.peek() {
            self.advance();
            if ch == quote {
                if self.consume(quote) {
                    result.push(quote);
                    continue;
                }
                return Ok(result);
            }
            result.push(ch);
        }
        Err(self.error(if quote == '"' {
            "unterminated string literal"
        } else {
            "unterminated sheet name"
        }))
    }

    fn error_token(&mut self) -> Result<TokenKind> {
        let rest = &self.input[self.byte_pos(self.pos)..];
        for error in ErrorValue::ALL {
            let label = error.label();
            if rest
                .get(..label.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(label))
            {
                self.pos += label.chars().count();
                return Ok(TokenKind::Error(error));
            }
        }
        let literal: String = rest.chars().take_while(|ch| !ch.is_whitespace()).collect();
        Err(self.error(format!("unknown error literal '{}'", literal)))
    }

    fn number_token(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_exp = false;

        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => self.advance(),
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    self.advance();
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    self.advance();
                    if !self.consume('+') {
                        self.consume('-');
                    }
                }
                _ => break,
            }
        }

        let text = self.slice(start, self.pos);
        let value: f64 = text
            .parse()
            .map_err(|_| self.error(format!("invalid number literal '{}'", text)))?;
        Ok(TokenKind::Number {
            value,
            is_int: !seen_dot && !seen_exp,
        })
    }

    fn identifier_or_cell_token(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        self.consume('$');
        let letters_start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_alphabetic()) {
            self.advance();
        }
        if self.pos > letters_start {
            self.consume('$');
            let digits_start = self.pos;
            while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                self.advance();
            }
            if self.pos > digits_start
                && is_boundary(self.peek())
                && self.peek() != Some('!')
                && !self.call_follows()
            {
                return Ok(TokenKind::CellRef(self.slice(start, self.pos).to_string()));
            }
        }

        // Not a cell reference: re-read as an identifier.
        self.pos = start;
        self.consume('$');
        let ident_start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
        {
            self.advance();
        }
        if self.pos == ident_start {
            return Err(self.error(format!("unexpected character '$' at {}", start)));
        }
        Ok(TokenKind::Identifier(
            self.slice(ident_start, self.pos).to_string(),
        ))
    }

    /// Next non-space character is `(`, so the name being read is a
    /// function even when it looks like a cell ("LOG10(").
    fn call_follows(&self) -> bool {
        self.chars[self.pos..]
            .iter()
            .map(|(_, ch)| *ch)
            .find(|ch| !ch.is_whitespace())
            == Some('(')
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, ch)| *ch)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn consume(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn byte_pos(&self, idx: usize) -> usize {
        self.chars
            .get(idx)
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[self.byte_pos(start)..self.byte_pos(end)]
    }
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace()
        || matches!(
            ch,
            '(' | ')'
                | ','
                | ';'
                | '+'
                | '-'
                | '*'
                | '/'
                | '^'
                | '&'
                | '%'
                | ':'
                | '!'
                | '='
                | '<'
                | '>'
        )
}

fn is_boundary(ch: Option<char>) -> bool {
    ch.map_or(true, is_delimiter)
}

/// Split a formula body into tokens, ending with `Eof`.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            return Ok(tokens);
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    idx: usize,
    source: &'a str,
    resolver: ReferenceResolver<'a>,
    sheet: &'a str,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> FormulaError {
        FormulaError::malformed(self.source, reason)
    }

    fn parse_expression(&mut self) -> Result<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<FormulaExpr> {
        let mut expr = self.parse_concat()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Equal => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::Less => BinaryOperator::LessThan,
                TokenKind::LessEqual => BinaryOperator::LessThanOrEqual,
                TokenKind::Greater => BinaryOperator::GreaterThan,
                TokenKind::GreaterEqual => BinaryOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_concat()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_concat(&mut self) -> Result<FormulaExpr> {
        let mut expr = self.parse_add_sub()?;
        while matches!(self.peek_kind(), TokenKind::Ampersand) {
            self.advance();
            let right = self.parse_add_sub()?;
            expr = binary(BinaryOperator::Concat, expr, right);
        }
        Ok(expr)
    }

    fn parse_add_sub(&mut self) -> Result<FormulaExpr> {
        let mut expr = self.parse_mul_div()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_mul_div()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_mul_div(&mut self) -> Result<FormulaExpr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<FormulaExpr> {
        match self.peek_kind() {
            TokenKind::Plus => {
                self.advance();
                self.parse_unary()
            }
            TokenKind::Minus => {
                self.advance();
                let expr = self.parse_unary()?;
                Ok(FormulaExpr::Unary {
                    op: UnaryOperator::Negate,
                    expr: Box::new(expr),
                })
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<FormulaExpr> {
        let mut expr = self.parse_postfix()?;
        while matches!(self.peek_kind(), TokenKind::Caret) {
            self.advance();
            let right = self.parse_postfix()?;
            expr = binary(BinaryOperator::Power, expr, right);
        }
        Ok(expr)
    }

    fn parse_postfix(&mut self) -> Result<FormulaExpr> {
        let mut expr = self.parse_primary()?;
        while matches!(self.peek_kind(), TokenKind::Percent) {
            self.advance();
            expr = FormulaExpr::Unary {
                op: UnaryOperator::Percent,
                expr: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<FormulaExpr> {
        if let Some((reference, next)) = read_reference(&self.tokens, self.idx) {
            self.idx = next;
            return self.bind(&reference);
        }

        let token = self.advance().clone();
        match token.kind {
            TokenKind::Number { value, is_int } => {
                if is_int && value.abs() < 9.0e15 {
                    Ok(FormulaExpr::Literal(CellValue::Int(value as i64)))
                } else {
                    Ok(FormulaExpr::Literal(CellValue::Float(value)))
                }
            }
            TokenKind::String(value) => Ok(FormulaExpr::Literal(CellValue::Text(value))),
            TokenKind::Error(err) => Ok(FormulaExpr::Literal(CellValue::Error(err))),
            TokenKind::Identifier(name) => self.parse_identifier(name),
            TokenKind::SheetName(name) => Err(self.error(format!(
                "sheet name '{}' must be followed by '!' and a reference",
                name
            ))),
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Eof => Err(self.error("unexpected end of input")),
            other => Err(self.error(format!(
                "unexpected token {:?} at {}",
                other, token.pos
            ))),
        }
    }

    fn parse_identifier(&mut self, name: String) -> Result<FormulaExpr> {
        if matches!(self.peek_kind(), TokenKind::LParen) {
            self.advance();
            let function = Function::from_name(&name).ok_or_else(|| {
                self.error(format!("unsupported function {}", name.to_ascii_uppercase()))
            })?;
            let args = self.parse_arguments()?;
            if !function.accepts(args.len()) {
                return Err(self.error(format!(
                    "{} does not accept {} argument(s)",
                    function,
                    args.len()
                )));
            }
            return Ok(FormulaExpr::Call { function, args });
        }

        match name.to_ascii_uppercase().as_str() {
            "TRUE" => Ok(FormulaExpr::Literal(CellValue::Bool(true))),
            "FALSE" => Ok(FormulaExpr::Literal(CellValue::Bool(false))),
            _ if matches!(self.peek_kind(), TokenKind::Bang) => Err(self.error(format!(
                "expected a reference after sheet name '{}'",
                name
            ))),
            _ => Err(self.error(format!("unexpected identifier '{}'", name))),
        }
    }

    /// Turn a reference token into a column or range access.
    fn bind(&self, reference: &Reference) -> Result<FormulaExpr> {
        let keys = self.resolver.resolve(reference, self.sheet)?;
        let scope = match &reference.sheet {
            Some(sheet) if sheet != self.sheet => SheetScope::Named(sheet.clone()),
            _ => SheetScope::Current,
        };
        match reference.target {
            RefTarget::Cell(_) | RefTarget::Name(_) => {
                let key = keys
                    .into_iter()
                    .next()
                    .ok_or_else(|| self.error(format!("reference '{}' is empty", reference)))?;
                Ok(FormulaExpr::Column(ColumnRef {
                    scope,
                    index: key.index,
                    name: key.name,
                }))
            }
            RefTarget::Range { .. } | RefTarget::Columns { .. } => Ok(FormulaExpr::Range(RangeRef {
                scope,
                columns: keys.iter().map(|key| key.index).collect(),
                names: keys.into_iter().map(|key| key.name).collect(),
            })),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<FormulaExpr>> {
        let mut args = Vec::new();
        if matches!(self.peek_kind(), TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            match self.peek_kind() {
                TokenKind::Comma | TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        let found = self.advance().kind.clone();
        if std::mem::discriminant(&found) == std::mem::discriminant(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, got {:?}", kind, found)))
        }
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.idx].kind
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.idx];
        if !matches!(token.kind, TokenKind::Eof) {
            self.idx += 1;
        }
        token
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Parse already-lexed tokens of `source` for a formula owned by `sheet`.
pub(crate) fn parse_tokens(
    tokens: Vec<Token>,
    source: &str,
    resolver: ReferenceResolver<'_>,
    sheet: &str,
) -> Result<FormulaExpr> {
    let mut parser = Parser {
        tokens,
        idx: 0,
        source,
        resolver,
        sheet,
    };
    let expr = parser.parse_expression()?;
    if !matches!(parser.peek_kind(), TokenKind::Eof) {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

/// Parse a formula body (leading `=` optional) into an expression tree.
pub fn parse_formula(
    formula: &str,
    resolver: ReferenceResolver<'_>,
    sheet: &str,
) -> Result<FormulaExpr> {
    let body = formula.trim_start();
    let body = body.strip_prefix('=').unwrap_or(body);
    if body.trim().is_empty() {
        return Err(FormulaError::malformed(formula, "empty formula"));
    }
    let tokens = tokenize(body)?;
    parse_tokens(tokens, body, resolver, sheet)
}
