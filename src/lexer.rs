use std::fmt;

use thiserror::Error;

use crate::ast::Token;
use crate::temporal;
use crate::value::Link;

/// A location in the input. Line and column are 1-based; `offset` counts
/// characters from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {position}")]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

/// A token and the character range it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    /// Line/column of a character offset.
    pub fn position_at(&self, offset: usize) -> Position {
        let mut line = 1;
        let mut column = 1;
        for ch in self.input.iter().take(offset) {
            if *ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Position {
            line,
            column,
            offset,
        }
    }

    /// Source text between two character offsets.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.input.len());
        let start = start.min(end);
        self.input[start..end].iter().collect()
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> LexError {
        LexError {
            message: message.into(),
            position: self.position_at(offset),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some(other) => result.push(other),
                        None => break,
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(self.error("Unterminated string: missing closing quote", start))
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let mut number = String::new();
        let mut seen_dot = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !seen_dot
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                seen_dot = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        number
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("Invalid number '{}'", number), start))
    }

    fn read_link(&mut self, embed: bool) -> Result<Token, LexError> {
        let start = self.position;
        // skip "[["
        self.advance();
        self.advance();

        let mut inner = String::new();
        loop {
            match self.current_char() {
                Some(']') if self.peek_char(1) == Some(']') => {
                    self.advance();
                    self.advance();
                    break;
                }
                Some(ch) => {
                    inner.push(ch);
                    self.advance();
                }
                None => return Err(self.error("Unterminated link: missing ']]'", start)),
            }
        }

        if inner.trim().is_empty() {
            return Err(self.error("Empty link", start));
        }
        Ok(Token::Link(Link::parse_inner(&inner).to_embed(embed)))
    }

    fn read_tag(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        self.advance(); // '#'

        let mut tag = String::from("#");
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '/') {
                tag.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if tag.len() == 1 {
            return Err(self.error("Expected a tag name after '#'", start));
        }
        Ok(Token::Tag(tag))
    }

    /// After `date` or `dur`, tries to read a literal body such as
    /// `(2021-04-18)` or `(3 days)`. Restores the position and returns `None`
    /// when the parenthesized text is not a literal, so the name is read as
    /// an ordinary function call instead.
    fn try_temporal_literal(&mut self, name: &str) -> Option<Token> {
        if self.current_char() != Some('(') {
            return None;
        }

        let saved = self.position;
        self.advance();
        let mut body = String::new();
        loop {
            match self.current_char() {
                Some(')') => {
                    self.advance();
                    break;
                }
                Some('(') | Some('"') | Some('\'') | None => {
                    self.position = saved;
                    return None;
                }
                Some(ch) => {
                    body.push(ch);
                    self.advance();
                }
            }
        }

        let token = match name {
            "date" => temporal::parse_date(&body).map(Token::Date),
            "dur" => temporal::parse_duration_literal(&body).map(Token::Duration),
            _ => None,
        };
        if token.is_none() {
            self.position = saved;
        }
        token
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.next_spanned().map(|spanned| spanned.token)
    }

    pub fn next_spanned(&mut self) -> Result<Spanned, LexError> {
        self.skip_whitespace();
        let start = self.position;
        let token = self.scan()?;
        Ok(Spanned {
            token,
            start,
            end: self.position,
        })
    }

    fn single(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        Ok(token)
    }

    fn double(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        self.advance();
        Ok(token)
    }

    fn scan(&mut self) -> Result<Token, LexError> {
        match self.current_char() {
            None => Ok(Token::Eof),
            Some('&') => self.single(Token::And),
            Some('|') => self.single(Token::Or),
            Some('.') => self.single(Token::Dot),
            Some(',') => self.single(Token::Comma),
            Some(':') => self.single(Token::Colon),
            Some('+') => self.single(Token::Plus),
            Some('-') => self.single(Token::Minus),
            Some('*') => self.single(Token::Star),
            Some('/') => self.single(Token::Slash),
            Some('%') => self.single(Token::Percent),
            Some('(') => self.single(Token::LParen),
            Some(')') => self.single(Token::RParen),
            Some('{') => self.single(Token::LBrace),
            Some('}') => self.single(Token::RBrace),
            Some(']') => self.single(Token::RBracket),
            Some('[') => {
                if self.peek_char(1) == Some('[') {
                    self.read_link(false)
                } else {
                    self.single(Token::LBracket)
                }
            }
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::Eq)
                } else {
                    self.single(Token::Eq)
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::GtEq)
                } else {
                    self.single(Token::Gt)
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::LtEq)
                } else {
                    self.single(Token::Lt)
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::NotEq)
                } else if self.peek_char(1) == Some('[') && self.peek_char(2) == Some('[') {
                    self.advance();
                    self.read_link(true)
                } else {
                    self.single(Token::Bang)
                }
            }
            Some('#') => self.read_tag(),
            Some('"') => Ok(Token::String(self.read_string('"')?)),
            Some('\'') => Ok(Token::String(self.read_string('\'')?)),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();

                if ident == "date" || ident == "dur" {
                    if let Some(token) = self.try_temporal_literal(&ident) {
                        return Ok(token);
                    }
                }

                let token = match ident.to_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "null" => Token::Null,
                    _ => Token::Identifier(ident),
                };
                Ok(token)
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(self.error(format!("Unexpected character '{}'", ch), self.position)),
        }
    }
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("and OR true False null");
    assert_eq!(lexer.next_token().unwrap(), Token::And);
    assert_eq!(lexer.next_token().unwrap(), Token::Or);
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(false));
    assert_eq!(lexer.next_token().unwrap(), Token::Null);
}

#[test]
fn test_where_clause() {
    let mut lexer = Lexer::new("WHERE file.day >= date(2021-01-01)");
    assert_eq!(lexer.next_token().unwrap(), Token::Identifier("WHERE".to_string()));
    assert_eq!(lexer.next_token().unwrap(), Token::Identifier("file".to_string()));
    assert_eq!(lexer.next_token().unwrap(), Token::Dot);
    assert_eq!(lexer.next_token().unwrap(), Token::Identifier("day".to_string()));
    assert_eq!(lexer.next_token().unwrap(), Token::GtEq);
    assert!(matches!(lexer.next_token().unwrap(), Token::Date(_)));
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}

#[test]
fn test_error_position() {
    let mut lexer = Lexer::new("a +\n  \"open");
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.position.line, 2);
    assert_eq!(err.position.column, 3);
}
